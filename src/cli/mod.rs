//! CLI library modules for the engen binary.
//!
//! Kept in the library so the commands can be tested without spawning the
//! binary. Every command returns `Result<(), String>`; the binary prints the
//! error and sets the exit code.

pub mod commands;
pub mod output;
pub mod parser;

use crate::EnGenConfig;

/// Load the configuration named by `--config`, or the defaults.
pub fn load_config(path: Option<&str>) -> Result<EnGenConfig, String> {
    match path {
        Some(p) => EnGenConfig::from_path(p)
            .map_err(|e| output::format_error(&format!("loading config {p}"), &e.to_string())),
        None => Ok(EnGenConfig::default()),
    }
}

/// Read a file, or stdin for `-`.
pub fn read_input(path: &str) -> Result<String, String> {
    if path == "-" {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file {}: {}", path, e))
    }
}
