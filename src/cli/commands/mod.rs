//! Command implementations for engen CLI
//!
//! Each command has its own module/file.

pub mod config;
pub mod generate;
pub mod score;

// Re-export argument types for parser
pub use config::{cmd_config, ConfigArgs};
pub use generate::{cmd_generate, GenerateArgs};
pub use score::{cmd_score, ScoreArgs};
