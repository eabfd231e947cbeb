//! End-to-end tests of the `engen` binary (run with `--features cli`).

#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup(config: &str, docs: &str) -> (TempDir, String, String) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config_path = dir.path().join("engen.toml");
    let docs_path = dir.path().join("docs.jsonl");
    fs::write(&config_path, config).expect("Failed to write config");
    fs::write(&docs_path, docs).expect("Failed to write documents");
    (
        dir,
        config_path.to_string_lossy().to_string(),
        docs_path.to_string_lossy().to_string(),
    )
}

const CONFIG: &str = "vocab_size = 12\nembedding_dim = 4\nhidden_dim = 6\nentity_dim = 3\n";

#[test]
fn test_score_human_output() {
    let (_dir, config, docs) = setup(
        CONFIG,
        r#"{"id":"doc-1","tokens":[{"token":3,"entity_type":1,"entity":0},{"token":4},{"token":5}]}"#,
    );
    Command::cargo_bin("engen")
        .unwrap()
        .args(["--config", &config, "score", &docs])
        .assert()
        .success()
        .stdout(predicate::str::contains("doc-1"));
}

#[test]
fn test_score_reports_failing_document() {
    let (_dir, config, docs) = setup(CONFIG, r#"{"id":"oov","tokens":[{"token":1},{"token":99}]}"#);
    Command::cargo_bin("engen")
        .unwrap()
        .args(["--config", &config, "score", &docs, "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("oov"));
}

#[test]
fn test_generate_json() {
    let (_dir, config, _docs) = setup(CONFIG, "");
    let output = Command::cargo_bin("engen")
        .unwrap()
        .args([
            "--config",
            &config,
            "generate",
            "--prefix",
            "1,2",
            "--max-steps",
            "5",
            "--format",
            "json",
            "--quiet",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["tokens"].as_array().unwrap().len() <= 5);
}

#[test]
fn test_config_prints_toml() {
    Command::cargo_bin("engen")
        .unwrap()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("vocab_size"));
}

#[test]
fn test_bad_config_path_fails() {
    Command::cargo_bin("engen")
        .unwrap()
        .args(["--config", "/nonexistent/engen.toml", "config"])
        .assert()
        .failure();
}
