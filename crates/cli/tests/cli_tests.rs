//! CLI integration tests

use std::io::Write;
use std::process::{Command, Output};

fn pinsight(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "perf-insight-cli", "--"])
        .args(args)
        .env_remove("PINSIGHT_CONFIG")
        .output()
        .expect("Failed to execute command")
}

fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const HOT_SNAPSHOT: &str = r#"{
  "hostname": "db-1",
  "cpu": { "utilization": 96.0, "load_1m": 2.0, "core_count": 4 },
  "memory": { "utilization": 50.0 }
}"#;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = pinsight(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Performance Insight Engine"),
        "Should show app name"
    );
    assert!(stdout.contains("analyze"), "Should show analyze command");
    assert!(stdout.contains("use"), "Should show use command");
    assert!(stdout.contains("latency"), "Should show latency command");
    assert!(stdout.contains("bottlenecks"), "Should show bottlenecks command");
    assert!(stdout.contains("query"), "Should show query command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = pinsight(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("pinsight"), "Should show binary name");
}

/// Test analyze subcommand help
#[test]
fn test_analyze_help() {
    let output = pinsight(&["analyze", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Analyze help should succeed");
    assert!(stdout.contains("--snapshot"), "Should show snapshot option");
    assert!(stdout.contains("--latency"), "Should show latency option");
    assert!(stdout.contains("--external"), "Should show external option");
}

/// Test query subcommand help
#[test]
fn test_query_help() {
    let output = pinsight(&["query", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Query help should succeed");
    assert!(stdout.contains("--report"), "Should show report option");
    assert!(stdout.contains("--severity"), "Should show severity option");
    assert!(stdout.contains("--component"), "Should show component option");
    assert!(stdout.contains("--limit"), "Should show limit option");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = pinsight(&["--format", "json", "--help"]);
    assert!(output.status.success(), "Format option should be accepted");

    let output = pinsight(&["--format", "yaml", "--help"]);
    assert!(!output.status.success(), "Unknown format should fail");
}

/// Test invalid command
#[test]
fn test_invalid_command() {
    let output = pinsight(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");
}

/// Test missing required argument
#[test]
fn test_missing_argument() {
    let output = pinsight(&["bottlenecks"]);
    assert!(
        !output.status.success(),
        "Missing snapshot argument should fail"
    );
}

/// Test missing snapshot file
#[test]
fn test_missing_snapshot_file() {
    let output = pinsight(&["use", "--snapshot", "/nonexistent/snapshot.json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing file should fail");
    assert!(
        stderr.contains("Failed to load snapshot"),
        "Should explain which input failed"
    );
}

/// Test full analysis as JSON
#[test]
fn test_analyze_json_report() {
    let snapshot = write_temp(HOT_SNAPSHOT, ".json");
    let samples = write_temp("12\n15\n18\n22\n400\n", ".txt");
    let output = pinsight(&[
        "--format",
        "json",
        "analyze",
        "--snapshot",
        snapshot.path().to_str().unwrap(),
        "--latency",
        samples.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Analyze should succeed");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let score = report["consensus_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));

    let insights = report["insights"].as_array().unwrap();
    assert!(!insights.is_empty());
    assert!(insights.iter().any(|i| i["source"] == "use_method"));
    assert!(insights.iter().any(|i| i["source"] == "latency"));
    assert_eq!(report["sources"].as_array().unwrap().len(), 9);
}

/// Test saving a report and querying it back
#[test]
fn test_analyze_then_query() {
    let snapshot = write_temp(HOT_SNAPSHOT, ".json");
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");

    let output = pinsight(&[
        "analyze",
        "--snapshot",
        snapshot.path().to_str().unwrap(),
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Analyze should succeed");
    assert!(report_path.exists(), "Report file should be written");

    let output = pinsight(&[
        "--format",
        "json",
        "query",
        "--report",
        report_path.to_str().unwrap(),
        "--component",
        "CPU",
        "--limit",
        "1",
    ]);
    assert!(output.status.success(), "Query should succeed");

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["insights"].as_array().unwrap().len(), 1);
    assert!(result["total"].as_u64().unwrap() >= 1);
}

/// Test bottleneck detection as JSON
#[test]
fn test_bottlenecks_json() {
    let snapshot = write_temp(HOT_SNAPSHOT, ".json");
    let output = pinsight(&[
        "--format",
        "json",
        "bottlenecks",
        "--snapshot",
        snapshot.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Bottlenecks should succeed");

    let insights: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let insights = insights.as_array().unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0]["component"], "cpu");
}

/// Test latency analysis in table format
#[test]
fn test_latency_table() {
    let samples = write_temp("[5, 6, 7, 8, 9]", ".json");
    let output = pinsight(&[
        "latency",
        "--samples",
        samples.path().to_str().unwrap(),
        "--percentiles",
        "50,99",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Latency should succeed");
    assert!(stdout.contains("EXCELLENT"), "Should show performance class");
    assert!(stdout.contains("p50"), "Should show requested percentile");
    assert!(stdout.contains("p99"), "Should show requested percentile");
}
