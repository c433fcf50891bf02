//! End-to-end tests of the `roundkeeper` binary.

mod common;

use serde_json::Value;

use common::{fixture_path, run_cli, run_cli_with_env};

fn fixture(name: &str) -> String {
    fixture_path(name).display().to_string()
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn summary_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "summary is not JSON ({e}); stdout:\n{}\nstderr:\n{}",
            stdout(output),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

// ============================================================================
// version / completions
// ============================================================================

#[test]
fn version_prints_package_version() {
    let output = run_cli(&["version"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("roundkeeper "), "got: {text}");
    assert!(text.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_json_is_parseable() {
    let output = run_cli(&["version", "--format", "json"]);
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "roundkeeper");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn completions_mention_subcommands() {
    let output = run_cli(&["completions", "bash"]);
    assert!(output.status.success());
    let script = stdout(&output);
    assert!(script.contains("roundkeeper"));
    assert!(script.contains("validate"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = run_cli(&["referee"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn validate_accepts_fixtures() {
    let output = run_cli(&[
        "validate",
        &fixture("elimination.yaml"),
        &fixture("bomb.yaml"),
    ]);
    assert!(
        output.status.success(),
        "stdout:\n{}",
        stdout(&output)
    );
    let text = stdout(&output);
    assert_eq!(text.lines().filter(|l| l.starts_with("ok")).count(), 2);
}

#[test]
fn validate_reports_every_error() {
    let output = run_cli(&["validate", "--format", "json", &fixture("invalid.yaml")]);
    assert_eq!(output.status.code(), Some(2));

    let reports: Value = serde_json::from_slice(&output.stdout).unwrap();
    let report = &reports[0];
    assert_eq!(report["valid"], false);
    let errors: Vec<&str> = report["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(errors.iter().any(|e| e.contains("match.name")));
    assert!(errors.iter().any(|e| e.contains("match.tick")));
    assert!(errors.iter().any(|e| e.contains("round_limit")));
    assert!(errors.iter().any(|e| e.contains("bomb_defusal")));
    assert!(errors.len() >= 5, "errors: {errors:?}");
}

#[test]
fn validate_strict_turns_warnings_into_failures() {
    let path = fixture("warnings.yaml");

    let lenient = run_cli(&["validate", &path]);
    assert!(lenient.status.success());
    assert!(stdout(&lenient).contains("warning:"));

    let strict = run_cli(&["validate", "--strict", &path]);
    assert_eq!(strict.status.code(), Some(2));
    assert!(stdout(&strict).starts_with("FAIL"));
}

#[test]
fn validate_missing_file_fails() {
    let output = run_cli(&["validate", "/definitely/not/here.yaml"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("file not found"));
}

// ============================================================================
// run
// ============================================================================

#[test]
fn run_plays_to_round_limit() {
    let output = run_cli(&[
        "-q",
        "run",
        "--config",
        &fixture("elimination.yaml"),
        "--seed",
        "42",
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("match:   elimination-scrim"), "got: {text}");
    assert!(text.contains("rounds:  3"), "got: {text}");
}

#[test]
fn run_json_summary_is_reproducible() {
    let args = [
        "-q",
        "run",
        "-c",
        &fixture("elimination.yaml"),
        "--seed",
        "42",
        "--format",
        "json",
    ];
    let first = summary_json(&run_cli(&args));
    let second = summary_json(&run_cli(&args));

    assert_eq!(first["rounds"], 3);
    assert_eq!(first["forced"], false);
    let total = first["scores"]["a"].as_u64().unwrap() + first["scores"]["b"].as_u64().unwrap();
    assert_eq!(total, 3);

    assert_eq!(first["scores"], second["scores"]);
    assert_eq!(first["winner"], second["winner"]);
    assert_ne!(first["match_id"], second["match_id"]);
}

#[test]
fn run_bomb_match_writes_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let output = run_cli(&[
        "-q",
        "run",
        "--config",
        &fixture("bomb.yaml"),
        "--events-file",
        events.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(output.status.success());
    assert_eq!(summary_json(&output)["rounds"], 4);

    let lines: Vec<Value> = std::fs::read_to_string(&events)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.first().unwrap()["type"], "MatchStarted");
    assert_eq!(lines.last().unwrap()["type"], "MatchEnded");
    assert!(lines.iter().any(|e| e["type"] == "TeamsSwapped"));
    assert_eq!(
        lines.iter().filter(|e| e["type"] == "RoundEnded").count(),
        4
    );
    for (i, event) in lines.iter().enumerate() {
        assert_eq!(event["sequence"], i);
    }
}

#[test]
fn run_substitutes_environment() {
    let output = run_cli_with_env(
        &["-q", "run", "-c", &fixture("env.yaml"), "--format", "json"],
        &[
            ("ROUNDKEEPER_TEST_MATCH_NAME", "from-env"),
            ("ROUNDKEEPER_TEST_ROUNDS", "1"),
        ],
    );
    assert!(output.status.success());
    let summary = summary_json(&output);
    assert_eq!(summary["name"], "from-env");
    assert_eq!(summary["rounds"], 1);
}

#[test]
fn run_rejects_invalid_config() {
    let output = run_cli(&["run", "--config", &fixture("invalid.yaml")]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
    assert!(output.stdout.is_empty());
}
