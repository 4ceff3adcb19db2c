use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::{json, Value};

const BIN: &str = env!("CARGO_BIN_EXE_ores-scoring");

const JOB: &str = r#"
{
    "request": { "context_name": "enwiki" },
    "missing": [
        { "models": ["wp10", "damaging"], "rev_ids": [100, 101] },
        { "models": ["wp10"], "rev_ids": [102] }
    ],
    "root_caches": {
        "100": { "scores": { "wp10": 0.87, "damaging": { "probability": 0.03 } } },
        "102": { "error": { "type": "TextDeleted", "message": "Text deleted" } }
    }
}
"#;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = json!({
        "defaults": { "timeout": 10 },
        "scoring_systems": {
            "processes": {
                "type": "process_pool",
                "workers": 2,
                "worker_command": { "program": BIN, "args": ["worker"] }
            },
            "threads": { "type": "thread_pool", "workers": 2 }
        }
    });
    let path = dir.join("config.json");
    fs::write(&path, config.to_string()).unwrap();
    path
}

fn run_score(system: &str) -> Value {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let job = dir.path().join("job.json");
    fs::write(&job, JOB).unwrap();

    let output = Command::new(BIN)
        .args(["score", "--system", system, "--config"])
        .arg(&config)
        .arg("--job")
        .arg(&job)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn expected() -> Value {
    json!({
        "scores": {
            "100": { "wp10": 0.87, "damaging": { "probability": 0.03 } }
        },
        "errors": {
            "102": { "wp10": { "type": "TextDeleted", "message": "Text deleted" } }
        }
    })
}

#[test]
fn test_score_with_process_pool_of_cli_workers() {
    assert_eq!(run_score("processes"), expected());
}

#[test]
fn test_score_with_thread_pool() {
    assert_eq!(run_score("threads"), expected());
}

#[test]
fn test_unknown_system_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let job = dir.path().join("job.json");
    fs::write(&job, JOB).unwrap();

    let status = Command::new(BIN)
        .args(["score", "--system", "missing", "--config"])
        .arg(&config)
        .arg("--job")
        .arg(&job)
        .status()
        .unwrap();
    assert!(!status.success());
}
