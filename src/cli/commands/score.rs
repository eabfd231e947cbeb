//! Score command: teacher-forced scoring of annotated documents

use clap::Parser;
use serde::Serialize;
use std::time::Instant;

use super::super::output::{bold, format_error, log_info, to_json, to_jsonl, write_output};
use super::super::parser::OutputFormat;
use super::super::{load_config, read_input};

use crate::{Document, EnGen, ScoredDocument};

/// Score annotated documents
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// JSONL file with one document per line (`-` for stdin)
    #[arg(value_name = "PATH")]
    pub input: String,

    /// Output format
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,

    /// Include per-step distributions in JSON output
    #[arg(long)]
    pub steps: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Per-document result without the per-step distributions.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    /// Document id.
    pub id: String,
    /// Number of positions.
    pub tokens: usize,
    /// Entities tracked.
    pub entities: usize,
    /// Total negative log-likelihood.
    pub nll: f32,
    /// Per-prediction perplexity.
    pub perplexity: f32,
}

impl From<&ScoredDocument> for ScoreSummary {
    fn from(scored: &ScoredDocument) -> Self {
        Self {
            id: scored.id.clone(),
            tokens: scored.steps.len(),
            entities: scored.entities,
            nll: scored.nll,
            perplexity: scored.perplexity(),
        }
    }
}

/// Run `engen score`.
pub fn cmd_score(args: ScoreArgs, config_path: Option<&str>) -> Result<(), String> {
    let config = load_config(config_path)?;
    let model = EnGen::new(config).map_err(|e| format_error("building model", &e.to_string()))?;

    let raw = read_input(&args.input)?;
    let documents =
        Document::from_jsonl(&raw).map_err(|e| format_error("parsing documents", &e.to_string()))?;
    if documents.is_empty() {
        return Err(format!("No documents found in {}", args.input));
    }

    let start = Instant::now();
    let mut scored = Vec::with_capacity(documents.len());
    let mut failures = Vec::new();
    for result in model.score_batch(&documents) {
        match result {
            Ok(s) => scored.push(s),
            Err(e) => failures.push(e.to_string()),
        }
    }
    let elapsed = start.elapsed();

    let summaries: Vec<ScoreSummary> = scored.iter().map(ScoreSummary::from).collect();
    let output = match args.format {
        OutputFormat::Human => {
            let mut out = String::new();
            for s in &summaries {
                out.push_str(&format!(
                    "{}  tokens={} entities={} nll={:.4} ppl={:.3}\n",
                    bold(&s.id),
                    s.tokens,
                    s.entities,
                    s.nll,
                    s.perplexity
                ));
            }
            out
        }
        OutputFormat::Json if args.steps => to_json(&scored)?,
        OutputFormat::Json => to_json(&summaries)?,
        OutputFormat::Jsonl if args.steps => to_jsonl(&scored)?,
        OutputFormat::Jsonl => to_jsonl(&summaries)?,
    };
    write_output(&output, args.output.as_deref())?;

    log_info(
        &format!(
            "Scored {} of {} documents in {:.2}ms",
            scored.len(),
            documents.len(),
            elapsed.as_secs_f64() * 1000.0
        ),
        args.quiet,
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format_error("scoring", &failures.join("\n  ")))
    }
}
