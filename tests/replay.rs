use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

fn snapshot(query_id: &str, state: &str, completed: u64) -> Value {
    json!({
        "queryId": query_id,
        "state": state,
        "outputStage": {
            "stageId": format!("{query_id}.0"),
            "state": if state == "FINISHED" { "FINISHED" } else { "RUNNING" },
            "tasks": [{
                "node": "worker1:8080",
                "stats": {
                    "splits": 500,
                    "startedSplits": completed,
                    "completedSplits": completed,
                    "inputPositionCount": 1_000_000,
                    "inputDataSize": 50 * 1024 * 1024,
                    "completedPositionCount": 900_000,
                    "completedDataSize": 40 * 1024 * 1024,
                    "splitCpuTimeMs": 12_000,
                    "splitWallTimeMs": 30_000
                },
                "outputBuffers": [{"bufferedPages": 0}]
            }],
            "subStages": [{
                "stageId": format!("{query_id}.1"),
                "state": if state == "FINISHED" { "FINISHED" } else { "RUNNING" },
                "tasks": [{
                    "node": "worker1:8080",
                    "stats": {
                        "splits": 500,
                        "startedSplits": completed,
                        "completedSplits": completed,
                        "inputPositionCount": 2_000_000,
                        "inputDataSize": 100 * 1024 * 1024,
                        "completedPositionCount": 1_800_000,
                        "completedDataSize": 90 * 1024 * 1024
                    },
                    "outputBuffers": []
                }],
                "subStages": []
            }]
        }
    })
}

fn replay_file(frames: &[Value]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("creating replay file");
    for frame in frames {
        writeln!(file, "{frame}").expect("writing replay frame");
    }
    file.flush().expect("flushing replay file");
    file
}

fn qtop() -> Command {
    let mut cmd = Command::cargo_bin("qtop").expect("binary built");
    cmd.env_remove("QTOP_FORCE_ANSI")
        .env_remove("QTOP_NO_ANSI")
        .env_remove("QTOP_COORDINATOR")
        .env_remove("QTOP_LOG");
    cmd
}

#[test]
fn replay_monitors_to_completion_through_a_pipe() {
    // Enough RUNNING frames (one per 100ms poll) for at least one rendered
    // frame past the 500ms render interval.
    let mut frames: Vec<Value> = (0..7).map(|_| snapshot("q_0830", "RUNNING", 250)).collect();
    frames.push(snapshot("q_0830", "FINISHED", 500));
    let file = replay_file(&frames);

    qtop()
        .arg("--replay")
        .arg(file.path())
        .assert()
        .success()
        // Piped stdout is Plain mode: compact frame, then the summary.
        .stdout(predicate::str::contains("Query q_0830 [R] i[3M 150M "))
        .stdout(predicate::str::contains("splits[500/0/500]"))
        .stdout(predicate::str::contains("Query q_0830, FINISHED, 1 node\n"))
        .stdout(predicate::str::contains(
            "Splits: 1000 total, 1000 done (100.00%)",
        ));
}

#[test]
fn failed_query_exits_nonzero_after_the_summary() {
    let file = replay_file(&[snapshot("q_bad", "FAILED", 100)]);

    qtop()
        .arg("--replay")
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Query q_bad, FAILED, 1 node"))
        .stderr(predicate::str::contains("query q_bad failed"));
}

#[test]
fn debug_flag_adds_cpu_summary_lines() {
    let file = replay_file(&[snapshot("q_dbg", "FINISHED", 500)]);

    qtop()
        .arg("--debug")
        .arg("--replay")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("CPU Time: 12.0s total,"))
        .stdout(predicate::str::contains("Parallelism: "));
}

#[test]
fn empty_replay_cannot_produce_a_final_summary() {
    let file = replay_file(&[]);

    qtop()
        .arg("--replay")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no final state"));
}

#[test]
fn query_id_or_replay_is_required() {
    qtop()
        .assert()
        .failure()
        .stderr(predicate::str::contains("either a query id or --replay"));
}
