//! Output formatting utilities for CLI commands

use is_terminal::IsTerminal;
use std::io::{self, Write};

/// Format error message for display
pub fn format_error(operation: &str, details: &str) -> String {
    format!("ERROR: {} - {}", operation, details)
}

/// Log info message to stderr (respects quiet flag)
pub fn log_info(msg: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", msg);
    }
}

/// True when stdout is an interactive terminal.
pub fn stdout_is_tty() -> bool {
    io::stdout().is_terminal()
}

/// Bold text when writing to a terminal, plain otherwise.
pub fn bold(text: &str) -> String {
    if stdout_is_tty() {
        format!("\x1b[1m{}\x1b[0m", text)
    } else {
        text.to_string()
    }
}

/// Write output to file or stdout
pub fn write_output(content: &str, path: Option<&str>) -> Result<(), String> {
    if let Some(path) = path {
        std::fs::write(path, content).map_err(|e| format!("Failed to write to {}: {}", path, e))?;
    } else {
        print!("{}", content);
        io::stdout()
            .flush()
            .map_err(|e| format!("Failed to flush stdout: {}", e))?;
    }
    Ok(())
}

/// Serialize as pretty JSON with a trailing newline.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value)
        .map(|s| s + "\n")
        .map_err(|e| format!("Failed to serialize output: {}", e))
}

/// Serialize each item as one JSON line.
pub fn to_jsonl<T: serde::Serialize>(items: &[T]) -> Result<String, String> {
    let lines = items
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to serialize output: {}", e))?;
    Ok(lines.into_iter().map(|l| l + "\n").collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonl_one_line_per_item() {
        let out = to_jsonl(&[1, 2, 3]).unwrap();
        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn test_format_error() {
        assert_eq!(format_error("scoring", "bad"), "ERROR: scoring - bad");
    }
}
