use std::io;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod bar;
mod client;
mod format;
mod monitor;
mod query;
mod stats;
mod term;
mod utils;

use crate::client::{HttpSnapshotSource, ReplaySource, SnapshotSource};
use crate::monitor::StatusMonitor;
use crate::query::QueryState;
use crate::term::{LineWriter, TerminalMode};

#[derive(Debug, Parser)]
#[command(
    name = "qtop",
    about = "Live terminal status for distributed queries",
    version
)]
struct Cli {
    /// Query to monitor.
    query_id: Option<String>,

    /// Coordinator base URL (or via QTOP_COORDINATOR).
    #[arg(
        long,
        env = "QTOP_COORDINATOR",
        default_value = "http://localhost:8080"
    )]
    coordinator: String,

    /// Replay snapshots from a JSON-lines file instead of polling a
    /// coordinator, one snapshot per poll.
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Show CPU time and parallelism lines.
    #[arg(short = 'd', long)]
    debug: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut source: Box<dyn SnapshotSource> = match (&cli.replay, &cli.query_id) {
        (Some(path), _) => Box::new(ReplaySource::from_file(path, cli.debug)?),
        (None, Some(query_id)) => Box::new(HttpSnapshotSource::new(
            &cli.coordinator,
            query_id,
            cli.debug,
        )?),
        (None, None) => bail!("either a query id or --replay is required"),
    };

    // Mode is decided once, up front, and injected; the renderer itself
    // never consults the environment.
    let mode = TerminalMode::detect();
    let stdout = io::stdout();
    let mut monitor = StatusMonitor::new(source.as_mut(), LineWriter::new(stdout.lock(), mode));

    monitor.watch();
    let final_snapshot = monitor.print_final_summary()?;

    match final_snapshot.state {
        QueryState::Failed => bail!("query {} failed", final_snapshot.query_id),
        QueryState::Canceled => bail!("query {} was canceled", final_snapshot.query_id),
        _ => Ok(()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QTOP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);
    tracing_subscriber::registry().with(filter).with(layer).init();
}
