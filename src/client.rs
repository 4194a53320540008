use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::query::QuerySnapshot;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where query snapshots come from. The monitor polls this; fetch failures
/// during the live loop are treated as transient and retried on the next
/// poll, so implementations should just report errors honestly.
pub trait SnapshotSource {
    /// Fetch the current snapshot. `force_consistent` requests an
    /// authoritative read (used once, for the final summary); the live loop
    /// settles for cheap incremental reads. `None` means the coordinator no
    /// longer knows the query.
    fn fetch_snapshot(&mut self, force_consistent: bool) -> Result<Option<QuerySnapshot>>;

    /// Whether the CPU-time and parallelism lines should be shown.
    fn verbose(&self) -> bool;
}

/// Polls the coordinator's query REST endpoint.
pub struct HttpSnapshotSource {
    client: Client,
    coordinator: String,
    query_id: String,
    verbose: bool,
}

impl HttpSnapshotSource {
    pub fn new(coordinator: &str, query_id: &str, verbose: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(HttpSnapshotSource {
            client,
            coordinator: coordinator.trim_end_matches('/').to_string(),
            query_id: query_id.to_string(),
            verbose,
        })
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch_snapshot(&mut self, force_consistent: bool) -> Result<Option<QuerySnapshot>> {
        let url = format!("{}/v1/query/{}", self.coordinator, self.query_id);
        let response = self
            .client
            .get(&url)
            .query(&[("consistent", force_consistent)])
            .send()
            .with_context(|| format!("fetching {url}"))?;

        // The coordinator forgets finished queries after a retention window.
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .with_context(|| format!("fetching {url}"))?;
        let snapshot = response
            .json::<QuerySnapshot>()
            .context("decoding query snapshot")?;
        Ok(Some(snapshot))
    }

    fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Feeds pre-recorded snapshots from a JSON-lines file, one per poll. Once
/// the recording is exhausted the last snapshot repeats, so the final
/// consistent fetch still has an authoritative answer.
#[derive(Debug)]
pub struct ReplaySource {
    frames: VecDeque<QuerySnapshot>,
    last: Option<QuerySnapshot>,
    verbose: bool,
}

impl ReplaySource {
    pub fn from_file(path: &Path, verbose: bool) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening replay file {}", path.display()))?;
        Self::from_reader(BufReader::new(file), verbose)
    }

    pub fn from_reader(reader: impl BufRead, verbose: bool) -> Result<Self> {
        let mut frames = VecDeque::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.context("reading replay file")?;
            if line.trim().is_empty() {
                continue;
            }
            let snapshot: QuerySnapshot = serde_json::from_str(&line)
                .with_context(|| format!("replay line {}", index + 1))?;
            frames.push_back(snapshot);
        }
        Ok(ReplaySource {
            frames,
            last: None,
            verbose,
        })
    }
}

impl SnapshotSource for ReplaySource {
    fn fetch_snapshot(&mut self, _force_consistent: bool) -> Result<Option<QuerySnapshot>> {
        if let Some(snapshot) = self.frames.pop_front() {
            self.last = Some(snapshot.clone());
            return Ok(Some(snapshot));
        }
        Ok(self.last.clone())
    }

    fn verbose(&self) -> bool {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryState;
    use std::io::Cursor;

    #[test]
    fn replay_yields_frames_in_order_then_repeats_the_last() {
        let lines = concat!(
            r#"{"queryId": "q1", "state": "RUNNING"}"#,
            "\n\n",
            r#"{"queryId": "q1", "state": "FINISHED"}"#,
            "\n",
        );
        let mut source = ReplaySource::from_reader(Cursor::new(lines), false).unwrap();

        let first = source.fetch_snapshot(false).unwrap().unwrap();
        assert_eq!(first.state, QueryState::Running);
        let second = source.fetch_snapshot(false).unwrap().unwrap();
        assert_eq!(second.state, QueryState::Finished);

        // Exhausted: the terminal snapshot keeps answering, consistent or not.
        let replayed = source.fetch_snapshot(true).unwrap().unwrap();
        assert_eq!(replayed.state, QueryState::Finished);
    }

    #[test]
    fn empty_replay_yields_absent_snapshots() {
        let mut source = ReplaySource::from_reader(Cursor::new(""), false).unwrap();
        assert!(source.fetch_snapshot(false).unwrap().is_none());
    }

    #[test]
    fn malformed_replay_line_is_reported_with_its_number() {
        let lines = "{\"queryId\": \"q1\", \"state\": \"RUNNING\"}\nnot json\n";
        let err = ReplaySource::from_reader(Cursor::new(lines), false).unwrap_err();
        assert!(format!("{err:#}").contains("replay line 2"));
    }
}
