//! CLI integration tests
//!
//! Run the `idsync` binary against snapshot files in a temp directory.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_lines(path: &Path, lines: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body).unwrap();
}

#[test]
fn test_cli_diff_writes_change_file() {
    // Scenario: baseline [u1], current [u1, u2(mgr=u1)]
    // When: `idsync diff --key id --out changes.jsonl`
    // Then: one CREATE for u2 is written and summarized

    let temp_dir = TempDir::new().unwrap();
    let baseline = temp_dir.path().join("baseline.jsonl");
    let current = temp_dir.path().join("current.jsonl");
    let out = temp_dir.path().join("changes.jsonl");
    write_lines(&baseline, &[r#"{"id":"u1"}"#]);
    write_lines(&current, &[r#"{"id":"u1"}"#, r#"{"id":"u2","mgr":"u1"}"#]);

    let cli_bin = env!("CARGO_BIN_EXE_idsync");
    let output = Command::new(cli_bin)
        .args([
            "diff",
            "--baseline",
            baseline.to_str().unwrap(),
            "--current",
            current.to_str().unwrap(),
            "--key",
            "id",
            "--out",
            out.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute CLI");

    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 created"), "unexpected summary: {}", stdout);

    let changes = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = changes.lines().collect();
    assert_eq!(lines.len(), 1);
    let entry: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(entry["natural_key"], "u2");
    assert_eq!(entry["kind"], "CREATE");
    assert_eq!(entry["payload"]["mgr"], "u1");
}

#[test]
fn test_cli_diff_rejects_ambiguous_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let current = temp_dir.path().join("current.jsonl");
    write_lines(&current, &[r#"{"id":"u1"}"#, r#"{"id":"u1","cn":"dup"}"#]);

    let output = Command::new(env!("CARGO_BIN_EXE_idsync"))
        .args([
            "diff",
            "--baseline",
            temp_dir.path().join("none.jsonl").to_str().unwrap(),
            "--current",
            current.to_str().unwrap(),
            "--key",
            "id",
        ])
        .output()
        .expect("Failed to execute CLI");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERR_AMBIGUOUS_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_cli_reconcile_resolves_forward_reference() {
    // Scenario: u5 reports to mgrX, which sorts after it in the snapshot
    // When: `idsync reconcile --owner-field mgr`
    // Then: both are journaled, nothing is unresolved, the baseline is committed

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    let config = temp_dir.path().join("users.toml");
    fs::write(&config, "bulk_size = 10\nmax_attempts = 3\n\n[key]\nfields = [\"id\"]\n").unwrap();
    write_lines(
        &root.join("data").join("users.current.jsonl"),
        &[r#"{"id":"u5","mgr":"x9"}"#, r#"{"id":"x9","mgr":null}"#],
    );

    let output = Command::new(env!("CARGO_BIN_EXE_idsync"))
        .args([
            "reconcile",
            "--config",
            config.to_str().unwrap(),
            "--root",
            root.to_str().unwrap(),
            "--owner-field",
            "mgr",
        ])
        .output()
        .expect("Failed to execute CLI");

    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["success_count"], 2);
    assert_eq!(summary["unresolved_count"], 0);
    assert_eq!(summary["passes"], 2);

    let journal = fs::read_to_string(root.join("working").join("journal.jsonl")).unwrap();
    let keys: Vec<String> = journal
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["natural_key"].to_string())
        .collect();
    assert_eq!(keys, vec!["\"x9\"", "\"u5\""]);
    assert!(root.join("proceed").join("users.proceed.json").exists());
    assert!(root.join("data").join("users.baseline.jsonl").exists());
}

#[test]
fn test_cli_reconcile_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("users.toml");
    fs::write(&config, "bulk_size = 0\n\n[key]\nfields = [\"id\"]\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_idsync"))
        .args([
            "reconcile",
            "--config",
            config.to_str().unwrap(),
            "--root",
            temp_dir.path().to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute CLI");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERR_INVALID_CONFIG"), "stderr: {}", stderr);
}
