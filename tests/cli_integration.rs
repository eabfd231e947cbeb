//! CLI command tests (run with `--features cli`).

#![cfg(feature = "cli")]

use engen::cli::commands::{cmd_generate, cmd_score, GenerateArgs, ScoreArgs};
use engen::cli::parser::OutputFormat;
use std::io::Write;

const DOCS: &str = r#"{"id":"a","tokens":[{"token":3,"entity_type":1,"entity":0,"sentence":0},{"token":4},{"token":3,"entity_type":1,"entity":0,"sentence":1}]}
{"id":"b","tokens":[{"token":5},{"token":6}]}
"#;

fn config_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "vocab_size = 10\nembedding_dim = 4\nhidden_dim = 6\nentity_dim = 3").unwrap();
    file
}

#[test]
fn score_writes_json_summaries() {
    let config = config_file();
    let mut docs = tempfile::NamedTempFile::new().unwrap();
    docs.write_all(DOCS.as_bytes()).unwrap();
    let out = tempfile::NamedTempFile::new().unwrap();

    cmd_score(
        ScoreArgs {
            input: docs.path().to_string_lossy().into_owned(),
            format: OutputFormat::Json,
            steps: false,
            output: Some(out.path().to_string_lossy().into_owned()),
            quiet: true,
        },
        config.path().to_str(),
    )
    .unwrap();

    let written = std::fs::read_to_string(out.path()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    let rows = parsed.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "a");
    assert_eq!(rows[0]["entities"], 1);
}

#[test]
fn score_fails_on_bad_document() {
    let config = config_file();
    let mut docs = tempfile::NamedTempFile::new().unwrap();
    docs.write_all(br#"{"id":"bad","tokens":[{"token":1},{"token":42}]}"#)
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let err = cmd_score(
        ScoreArgs {
            input: docs.path().to_string_lossy().into_owned(),
            format: OutputFormat::Json,
            steps: false,
            output: Some(dir.path().join("out.json").to_string_lossy().into_owned()),
            quiet: true,
        },
        config.path().to_str(),
    )
    .unwrap_err();
    assert!(err.contains("bad"), "{err}");
}

#[test]
fn generate_rejects_bad_temperature() {
    let err = cmd_generate(
        GenerateArgs {
            prefix: vec![1],
            prefix_file: None,
            max_steps: Some(2),
            temperature: Some(-1.0),
            seed: None,
            format: OutputFormat::Json,
            quiet: true,
        },
        None,
    )
    .unwrap_err();
    assert!(err.contains("temperature"), "{err}");
}
