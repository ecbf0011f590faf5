//! CLI module for aliasgen
//!
//! ## Commands
//!
//! - `generate [PATH]...` - Generate serde impls for every annotated record
//! - `check [PATH]...` - Fail when a generated file is missing or out of date
//!
//! Debug flags `--emit FILE` and `--directives FILE` print the generated output or the parsed directives of one file.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use crate::config::{Config, DEFAULT_CONFIG_FILE};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Generate serde impls from per-field alias directives
#[derive(Parser, Debug)]
#[command(name = "aliasgen")]
#[command(version = VERSION)]
#[command(about = "Generate serde impls from per-field alias directives", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file (default: aliasgen.toml when present)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Field attribute carrying directives (overrides the configuration)
    #[arg(long, value_name = "NAME", global = true)]
    pub attribute: Option<String>,

    // Debug/development flags
    /// Print the generated output for one file (debug)
    #[arg(long = "emit", value_name = "FILE", conflicts_with = "directives_file")]
    pub emit_file: Option<PathBuf>,

    /// Print parsed directives and inferred types for one file (debug)
    #[arg(long = "directives", value_name = "FILE")]
    pub directives_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate serde impls for every annotated record
    Generate {
        /// Files or directories to scan
        #[arg(value_name = "PATH", default_value = ".")]
        paths: Vec<PathBuf>,
    },

    /// Check that generated files are up to date without writing
    Check {
        /// Files or directories to scan
        #[arg(value_name = "PATH", default_value = ".")]
        paths: Vec<PathBuf>,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = resolve_config(cli.config.as_deref(), cli.attribute)?;

    // Handle debug flags first
    if let Some(file) = cli.emit_file {
        return commands::emit(&file, &config);
    }
    if let Some(file) = cli.directives_file {
        return commands::directives(&file, &config);
    }

    match cli.command {
        Some(Command::Generate { paths }) => commands::generate(&paths, &config),
        Some(Command::Check { paths }) => commands::check(&paths, &config),
        // No command - show help
        None => Err(CliError::new("", ExitCode::FAILURE)),
    }
}

/// Load the configuration file (explicit, or the default when present) and apply flag overrides.
fn resolve_config(path: Option<&Path>, attribute: Option<String>) -> CliResult<Config> {
    let loaded = match path {
        Some(path) => Some(Config::load(path)),
        None => Config::load_optional(DEFAULT_CONFIG_FILE).transpose(),
    };
    let mut config = loaded
        .transpose()
        .map_err(|e| CliError::failure(format!("Error: {e}")))?
        .unwrap_or_default();

    if let Some(attribute) = attribute {
        config.attribute = attribute;
    }
    config
        .validate()
        .map_err(|e| CliError::failure(format!("Error: {e}")))?;
    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================
