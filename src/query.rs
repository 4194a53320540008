use std::fmt;

use serde::Deserialize;

/// Overall query state as reported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Planning,
    Starting,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl QueryState {
    /// Terminal states: the query will never produce another snapshot that
    /// differs in outcome.
    pub fn is_done(self) -> bool {
        matches!(
            self,
            QueryState::Finished | QueryState::Failed | QueryState::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Planning => "PLANNING",
            QueryState::Starting => "STARTING",
            QueryState::Running => "RUNNING",
            QueryState::Finished => "FINISHED",
            QueryState::Failed => "FAILED",
            QueryState::Canceled => "CANCELED",
        }
    }

    /// Single-letter form used in the compact piped-output frame.
    pub fn glyph(self) -> char {
        self.as_str().chars().next().unwrap_or('?')
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageState {
    Planned,
    Scheduling,
    Scheduled,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl StageState {
    /// Single-letter form shown next to each stage row.
    pub fn glyph(self) -> char {
        match self {
            StageState::Planned => 'P',
            StageState::Scheduling => 'G',
            StageState::Scheduled => 'S',
            StageState::Running => 'R',
            StageState::Finished => 'F',
            StageState::Failed => 'X',
            StageState::Canceled => 'C',
        }
    }
}

/// Immutable point-in-time view of a query, fetched from the coordinator.
/// The output stage is absent until planning completes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySnapshot {
    pub query_id: String,
    pub state: QueryState,
    #[serde(default)]
    pub output_stage: Option<StageSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    /// Full stage id, prefixed by the query id (e.g. "20260830_001.0.1").
    pub stage_id: String,
    pub state: StageState,
    #[serde(default)]
    pub tasks: Vec<TaskSnapshot>,
    #[serde(default)]
    pub sub_stages: Vec<StageSnapshot>,
}

impl StageSnapshot {
    /// A stage with no children reads from source data rather than from
    /// upstream exchanges.
    pub fn is_leaf(&self) -> bool {
        self.sub_stages.is_empty()
    }

    /// The stage id with the query-id prefix stripped, for display.
    pub fn short_id<'a>(&'a self, query_id: &str) -> &'a str {
        self.stage_id
            .strip_prefix(query_id)
            .map(|rest| rest.trim_start_matches('.'))
            .unwrap_or(&self.stage_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// Worker address, host:port.
    pub node: String,
    #[serde(default)]
    pub stats: ExecutionStats,
    #[serde(default)]
    pub output_buffers: Vec<OutputBufferSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBufferSnapshot {
    /// Pages produced but not yet read by the downstream consumer.
    #[serde(default)]
    pub buffered_pages: u64,
}

/// Per-task execution counters. Accumulates by addition only; a fresh
/// accumulator is built from zero for every render frame.
///
/// `started_splits >= completed_splits` is not guaranteed by the source, so
/// derived pending/running figures are clamped at presentation time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionStats {
    pub splits: u64,
    pub started_splits: u64,
    pub completed_splits: u64,
    pub input_position_count: u64,
    pub input_data_size: u64,
    pub output_position_count: u64,
    pub output_data_size: u64,
    pub completed_position_count: u64,
    pub completed_data_size: u64,
    pub split_cpu_time_ms: u64,
    pub split_wall_time_ms: u64,
}

impl ExecutionStats {
    pub fn add(&mut self, other: &ExecutionStats) {
        self.splits += other.splits;
        self.started_splits += other.started_splits;
        self.completed_splits += other.completed_splits;
        self.input_position_count += other.input_position_count;
        self.input_data_size += other.input_data_size;
        self.output_position_count += other.output_position_count;
        self.output_data_size += other.output_data_size;
        self.completed_position_count += other.completed_position_count;
        self.completed_data_size += other.completed_data_size;
        self.split_cpu_time_ms += other.split_cpu_time_ms;
        self.split_wall_time_ms += other.split_wall_time_ms;
    }

    /// Splits not yet started, clamped: the source does not guarantee
    /// internal consistency between the counters.
    pub fn pending_splits(&self) -> u64 {
        self.splits.saturating_sub(self.started_splits)
    }

    /// Splits started but not yet completed, clamped likewise.
    pub fn running_splits(&self) -> u64 {
        self.started_splits.saturating_sub(self.completed_splits)
    }
}
