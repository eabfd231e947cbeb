//! Config command: print the effective configuration

use clap::Parser;

use super::super::load_config;
use super::super::output::{format_error, to_json, write_output};

/// Print the effective configuration
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Print JSON instead of TOML
    #[arg(long)]
    pub json: bool,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,
}

/// Run `engen config`.
pub fn cmd_config(args: ConfigArgs, config_path: Option<&str>) -> Result<(), String> {
    let config = load_config(config_path)?;
    let rendered = if args.json {
        to_json(&config)?
    } else {
        config
            .to_toml_string()
            .map_err(|e| format_error("rendering config", &e.to_string()))?
    };
    write_output(&rendered, args.output.as_deref())
}
