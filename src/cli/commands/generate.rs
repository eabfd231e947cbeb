//! Generate command: autoregressive generation after an optional prefix

use clap::Parser;
use std::time::Instant;

use super::super::output::{bold, format_error, log_info, to_json, to_jsonl, write_output};
use super::super::parser::OutputFormat;
use super::super::{load_config, read_input};

use crate::{AnnotatedToken, Document, EnGen, Sampler, SamplingStrategy};

/// Generate a continuation
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Plain prefix tokens, comma separated
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub prefix: Vec<usize>,

    /// Annotated prefix: a JSON document whose tokens are used as the prefix
    #[arg(long, value_name = "PATH", conflicts_with = "prefix")]
    pub prefix_file: Option<String>,

    /// Maximum number of generated tokens (defaults to the config value)
    #[arg(long, value_name = "N")]
    pub max_steps: Option<usize>,

    /// Sampling temperature; greedy when omitted
    #[arg(long, value_name = "T")]
    pub temperature: Option<f32>,

    /// Sampling seed (defaults to the config seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

fn prefix_tokens(args: &GenerateArgs) -> Result<Vec<AnnotatedToken>, String> {
    match &args.prefix_file {
        Some(path) => {
            let doc = Document::from_json(&read_input(path)?)
                .map_err(|e| format_error("parsing prefix", &e.to_string()))?;
            Ok(doc.tokens)
        }
        None => Ok(args
            .prefix
            .iter()
            .map(|&t| AnnotatedToken::plain(t, 0))
            .collect()),
    }
}

/// Run `engen generate`.
pub fn cmd_generate(args: GenerateArgs, config_path: Option<&str>) -> Result<(), String> {
    let config = load_config(config_path)?;
    let max_steps = args.max_steps.unwrap_or(config.max_steps);
    let seed = args.seed.unwrap_or(config.seed);
    let strategy = match args.temperature {
        Some(temperature) => SamplingStrategy::Temperature { temperature },
        None => SamplingStrategy::Greedy,
    };
    let sampler =
        Sampler::new(strategy, seed).map_err(|e| format_error("sampler", &e.to_string()))?;
    let model = EnGen::new(config).map_err(|e| format_error("building model", &e.to_string()))?;
    let prefix = prefix_tokens(&args)?;

    let start = Instant::now();
    let generated = model
        .generate_with(sampler, &prefix, max_steps)
        .map_err(|e| format_error("generation", &e.to_string()))?;
    let elapsed = start.elapsed();

    let output = match args.format {
        OutputFormat::Human => {
            let mut out = String::new();
            for t in &generated.tokens {
                match t.label {
                    Some(label) => out.push_str(&format!(
                        "{}[{} {}] ",
                        t.token,
                        bold(&t.entity_type.to_string()),
                        label
                    )),
                    None => out.push_str(&format!("{} ", t.token)),
                }
            }
            out.push('\n');
            out
        }
        OutputFormat::Json => to_json(&generated)?,
        OutputFormat::Jsonl => to_jsonl(&generated.tokens)?,
    };
    write_output(&output, None)?;

    log_info(
        &format!(
            "Generated {} tokens ({:?}), {} entities in {:.2}ms",
            generated.tokens.len(),
            generated.finish_reason,
            generated.entities,
            elapsed.as_secs_f64() * 1000.0
        ),
        args.quiet,
    );
    Ok(())
}
