//! engen - entity-tracking language model CLI
//!
//! # Usage
//!
//! ```bash
//! # Score annotated documents (JSONL, one document per line)
//! engen score docs.jsonl
//!
//! # Generate 20 tokens after a plain prefix, sampling at temperature 0.8
//! engen generate --prefix 4,8,15 --max-steps 20 --temperature 0.8
//!
//! # Dump the default configuration, edit it, and use it
//! engen config > engen.toml
//! engen --config engen.toml score docs.jsonl --format json
//! ```

use std::process::ExitCode;

use clap::Parser;

use engen::cli::commands::{cmd_config, cmd_generate, cmd_score};
use engen::cli::parser::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result: Result<(), String> = match cli.command {
        Commands::Score(args) => cmd_score(args, config),
        Commands::Generate(args) => cmd_generate(args, config),
        Commands::Config(args) => cmd_config(args, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
