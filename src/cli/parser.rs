//! CLI argument parsing and structure definitions

use clap::{Parser, Subcommand, ValueEnum};

use super::commands::{ConfigArgs, GenerateArgs, ScoreArgs};

/// Entity-tracking language model CLI
#[derive(Parser)]
#[command(name = "engen")]
#[command(
    author,
    version,
    about = "Entity-tracking language model: score annotated documents or generate new ones",
    long_about = r#"
engen - entity-tracking neural language generation

COMMANDS:
  score     Teacher-forced scoring of annotated JSONL documents
  generate  Generate tokens (with entity annotations) after a prefix
  config    Print the effective configuration

Models are randomly initialised from the configuration seed, so runs are
reproducible for a given --config.

EXAMPLES:
  engen score docs.jsonl --format json
  engen generate --prefix 4,8,15 --max-steps 20 --temperature 0.8
  engen config --json > engen.json
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Score annotated documents
    #[command(visible_alias = "s")]
    Score(ScoreArgs),

    /// Generate a continuation
    #[command(visible_alias = "g")]
    Generate(GenerateArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Output format selection shared by all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
    /// JSON lines (one object per line)
    Jsonl,
}
