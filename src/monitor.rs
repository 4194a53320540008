use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

use crate::bar::format_progress_bar;
use crate::client::SnapshotSource;
use crate::format::{
    format_count, format_count_rate, format_data_rate, format_data_size, format_time,
};
use crate::query::{ExecutionStats, QuerySnapshot, QueryState, StageSnapshot};
use crate::stats::{aggregate, sum_task_stats, unique_nodes, SumPolicy};
use crate::term::{LineWriter, TerminalMode};
use crate::utils::plurals::pluralize;

/// Polling cadence; bounds coordinator load independent of render cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Minimum time between redrawn frames.
const RENDER_INTERVAL: Duration = Duration::from_millis(500);
/// 42 keeps the whole progress line under 100 characters.
const BAR_WIDTH: usize = 42;
const STAGE_ID_WIDTH: usize = 10;

/// Owns the poll/render loop for one query. All state that survives across
/// frames lives here: the start timestamp and the writer's line count.
pub struct StatusMonitor<'a, W: Write> {
    source: &'a mut dyn SnapshotSource,
    writer: LineWriter<W>,
    start: Instant,
}

impl<'a, W: Write> StatusMonitor<'a, W> {
    pub fn new(source: &'a mut dyn SnapshotSource, writer: LineWriter<W>) -> Self {
        StatusMonitor {
            source,
            writer,
            start: Instant::now(),
        }
    }

    /// Poll and redraw until the query reaches a terminal state, disappears,
    /// or has results buffered and ready to stream. Transient fetch/render
    /// errors are logged and the loop keeps going; the terminal is reset on
    /// every exit path.
    pub fn watch(&mut self) {
        self.poll_loop();
        if let Err(err) = self.writer.reset_screen() {
            debug!("error resetting terminal: {err:#}");
        }
    }

    fn poll_loop(&mut self) {
        let mut last_render = Instant::now();
        loop {
            match self.source.fetch_snapshot(false) {
                Ok(None) => return,
                Ok(Some(snapshot)) => {
                    if snapshot.state.is_done() {
                        return;
                    }
                    // Results waiting to be read: progress display is moot.
                    if has_buffered_output(&snapshot) {
                        return;
                    }
                    if last_render.elapsed() >= RENDER_INTERVAL {
                        if let Err(err) = self.render_frame(&snapshot) {
                            debug!("error printing status: {err:#}");
                        }
                        last_render = Instant::now();
                    }
                }
                Err(err) => debug!("error fetching snapshot: {err:#}"),
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn render_frame(&mut self, snapshot: &QuerySnapshot) -> Result<()> {
        self.writer.reposition_cursor()?;

        let wall_time = self.start.elapsed();
        let stage = snapshot.output_stage.as_ref();
        let input = aggregate(stage, SumPolicy::LeafOnly);
        let global = aggregate(stage, SumPolicy::AllStages);
        let nodes = unique_nodes(stage).len();

        match self.writer.mode() {
            TerminalMode::Ansi => {
                self.render_full_frame(snapshot, wall_time, &input, &global, nodes)
            }
            TerminalMode::Plain => self.render_compact_frame(snapshot, wall_time, &global),
        }
    }

    /// The interactive multi-line frame:
    ///
    /// ```text
    /// Query q4, RUNNING, 1 node, 707 splits
    /// 0:16 [ 802K rows,  103MB] [44.9K rows/s, 5.74MB/s] [=====>>        ] 10%
    ///
    ///      STAGE S   ROWS  ROWS/s  BYTES  BYTES/s   PEND    RUN   DONE
    /// 0.........R  13.8M    336K  1.99G    49.5M      0      1    706
    ///   1.......R   666K   41.5K  82.1M    5.12M    563     65     79
    /// ```
    fn render_full_frame(
        &mut self,
        snapshot: &QuerySnapshot,
        wall_time: Duration,
        input: &ExecutionStats,
        global: &ExecutionStats,
        nodes: usize,
    ) -> Result<()> {
        self.writer.reprint_line("")?;

        let query_summary = format!(
            "Query {}, {}, {} {}, {} splits",
            snapshot.query_id,
            snapshot.state,
            nodes,
            pluralize(&nodes, "node", None),
            global.splits,
        );
        self.writer.reprint_line(&query_summary)?;

        // No stages to show yet.
        if snapshot.state == QueryState::Planning {
            return Ok(());
        }

        if self.source.verbose() {
            let splits_summary = format!(
                "Splits:   {} pending, {} running, {} done",
                global.pending_splits(),
                global.running_splits(),
                global.completed_splits,
            );
            self.writer.reprint_line(&splits_summary)?;

            let cpu_time = Duration::from_millis(global.split_cpu_time_ms);
            let cpu_summary = format!(
                "CPU Time: {:.1}s total, {:>5} rows/s, {:>8}, {}% active",
                cpu_time.as_secs_f64(),
                format_count_rate(input.completed_position_count, cpu_time, false),
                format_data_rate(input.completed_data_size, cpu_time, true),
                active_percent(global),
            );
            self.writer.reprint_line(&cpu_summary)?;

            let parallelism = format!("Parallelism: {:.1}", parallelism(global, wall_time));
            self.writer.reprint_line(&parallelism)?;
        }

        let progress_bar = format_progress_bar(
            BAR_WIDTH,
            global.completed_splits,
            global.running_splits(),
            global.splits,
        );
        let progress_line = format!(
            "{} [{:>5} rows, {:>6}] [{:>5} rows/s, {:>8}] [{}] {}%",
            format_time(wall_time),
            format_count(input.completed_position_count),
            format_data_size(input.completed_data_size, true),
            format_count_rate(input.input_position_count, wall_time, false),
            format_data_rate(input.completed_data_size, wall_time, true),
            progress_bar,
            // Cap at 99% while running; 100% would look finished when it isn't.
            completed_percent(global).min(99),
        );
        self.writer.reprint_line(&progress_line)?;

        self.writer.reprint_line("")?;
        let stages_header = format!(
            "{:>10}{}  {:>5}  {:>6}  {:>5}  {:>7}  {:>5}  {:>5}  {:>5}",
            "STAGE", "S", "ROWS", "ROWS/s", "BYTES", "BYTES/s", "PEND", "RUN", "DONE",
        );
        self.writer.reprint_line(&stages_header)?;

        if let Some(stage) = snapshot.output_stage.as_ref() {
            self.render_stage_tree(&snapshot.query_id, stage, "")?;
        }
        Ok(())
    }

    fn render_stage_tree(
        &mut self,
        query_id: &str,
        stage: &StageSnapshot,
        indent: &str,
    ) -> Result<()> {
        let elapsed = self.start.elapsed();
        let stats = sum_task_stats(stage);

        let mut name = format!("{indent}{}", stage.short_id(query_id));
        while name.len() < STAGE_ID_WIDTH {
            name.push('.');
        }

        let row = format!(
            "{:>10}{}  {:>5}  {:>6}  {:>5}  {:>7}  {:>5}  {:>5}  {:>5}",
            name,
            stage.state.glyph(),
            format_count(stats.input_position_count),
            format_count_rate(stats.input_position_count, elapsed, false),
            format_data_size(stats.input_data_size, false),
            format_data_rate(stats.completed_data_size, elapsed, false),
            stats.pending_splits(),
            stats.running_splits(),
            stats.completed_splits,
        );
        self.writer.reprint_line(&row)?;

        for sub_stage in &stage.sub_stages {
            self.render_stage_tree(query_id, sub_stage, &format!("{indent}  "))?;
        }
        Ok(())
    }

    /// One line per frame for piped output:
    /// `Query 31 [R] i[2.7M 67.3M 62.7M] o[35 6.1K 1K] splits[252/16/380]`
    fn render_compact_frame(
        &mut self,
        snapshot: &QuerySnapshot,
        wall_time: Duration,
        global: &ExecutionStats,
    ) -> Result<()> {
        let line = format!(
            "Query {} [{}] i[{} {} {}] o[{} {} {}] splits[{}/{}/{}]",
            snapshot.query_id,
            snapshot.state.glyph(),
            format_count(global.input_position_count),
            format_data_size(global.input_data_size, false),
            format_data_rate(global.completed_data_size, wall_time, false),
            format_count(global.output_position_count),
            format_data_size(global.output_data_size, false),
            format_data_rate(global.output_data_size, wall_time, false),
            global.pending_splits(),
            global.running_splits(),
            global.completed_splits,
        );
        self.writer.reprint_line(&line)?;
        Ok(())
    }

    /// One-shot summary after the loop has exited. Forces a consistent
    /// fetch; a failure here is a genuine inability to report results and
    /// propagates, unlike the transient errors swallowed while polling.
    pub fn print_final_summary(&mut self) -> Result<QuerySnapshot> {
        let wall_time = self.start.elapsed();
        let snapshot = self
            .source
            .fetch_snapshot(true)
            .context("fetching final query state")?
            .context("query is gone: no final state to report")?;

        let stage = snapshot.output_stage.as_ref();
        let input = aggregate(stage, SumPolicy::LeafOnly);
        let global = aggregate(stage, SumPolicy::AllStages);
        let nodes = unique_nodes(stage).len();

        self.writer.print_line("")?;

        let query_summary = format!(
            "Query {}, {}, {} {}",
            snapshot.query_id,
            snapshot.state,
            nodes,
            pluralize(&nodes, "node", None),
        );
        self.writer.print_line(&query_summary)?;

        let splits_summary = format!(
            "Splits: {} total, {} done ({:.2}%)",
            global.splits,
            global.completed_splits,
            completed_fraction(&global).min(100.0),
        );
        self.writer.print_line(&splits_summary)?;

        if self.source.verbose() {
            let cpu_time = Duration::from_millis(global.split_cpu_time_ms);
            let cpu_summary = format!(
                "CPU Time: {:.1}s total, {:>5} rows/s, {:>8}, {}% active",
                cpu_time.as_secs_f64(),
                format_count_rate(input.completed_position_count, cpu_time, false),
                format_data_rate(input.completed_data_size, cpu_time, true),
                active_percent(&global),
            );
            self.writer.print_line(&cpu_summary)?;

            let parallelism = format!("Parallelism: {:.1}", parallelism(&global, wall_time));
            self.writer.print_line(&parallelism)?;
        }

        let stats_line = format!(
            "{} [{} rows, {}] [{} rows/s, {}]",
            format_time(wall_time),
            format_count(input.completed_position_count),
            format_data_size(input.completed_data_size, true),
            format_count_rate(input.input_position_count, wall_time, false),
            format_data_rate(input.completed_data_size, wall_time, true),
        );
        self.writer.print_line(&stats_line)?;

        self.writer.print_line("")?;
        Ok(snapshot)
    }
}

fn has_buffered_output(snapshot: &QuerySnapshot) -> bool {
    let Some(stage) = snapshot.output_stage.as_ref() else {
        return false;
    };
    stage
        .tasks
        .iter()
        .flat_map(|task| task.output_buffers.iter())
        .any(|buffer| buffer.buffered_pages > 0)
}

/// Completed splits as a truncated whole percentage; zero before any splits
/// are scheduled.
fn completed_percent(stats: &ExecutionStats) -> u64 {
    if stats.splits == 0 {
        return 0;
    }
    stats.completed_splits * 100 / stats.splits
}

fn completed_fraction(stats: &ExecutionStats) -> f64 {
    if stats.splits == 0 {
        return 0.0;
    }
    stats.completed_splits as f64 * 100.0 / stats.splits as f64
}

/// Fraction of scheduled wall time the splits spent on CPU.
fn active_percent(stats: &ExecutionStats) -> u64 {
    if stats.split_wall_time_ms == 0 {
        return 0;
    }
    stats.split_cpu_time_ms * 100 / stats.split_wall_time_ms
}

/// Cumulative CPU time over elapsed wall time: effective worker count.
fn parallelism(stats: &ExecutionStats, wall_time: Duration) -> f64 {
    let wall_ms = wall_time.as_millis() as f64;
    if wall_ms == 0.0 {
        return 0.0;
    }
    stats.split_cpu_time_ms as f64 / wall_ms
}
