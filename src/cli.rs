// src/cli.rs

//! Argument parsing for embedding build scripts, using `clap`.
//!
//! A build script is itself a program; these are the flags such a program
//! typically accepts. The embedder calls [`parse`], decides whether to
//! initialise tracing (`--trace`), and folds the rest into its options
//! with [`ScriptArgs::apply`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{self, Options};
use crate::errors::BuildError;
use crate::logging::Level;

/// Command-line arguments accepted by a needmake build script.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "needmake",
    version,
    about = "Build the requested targets from the script's rule set.",
    long_about = None
)]
pub struct ScriptArgs {
    /// Targets to build instead of the script-declared wants.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Worker budget: number of rule bodies allowed to run at once.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Console verbosity of the build log.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<CliLevel>,

    /// Write a plain-text build log to this path.
    #[arg(long, value_name = "PATH")]
    pub file_log: Option<PathBuf>,

    /// Path to a TOML options overlay, applied before the other flags.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Turn a failing build into a fatal error from `run`.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Enable engine diagnostics (tracing at debug level); the embedder is
    /// expected to call `logging::init_tracing` when set.
    #[arg(long)]
    pub trace: bool,
}

/// Build-log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum CliLevel {
    Error,
    Warn,
    Message,
    Command,
    Normal,
    Verbose,
    Chatty,
}

impl From<CliLevel> for Level {
    fn from(level: CliLevel) -> Self {
        match level {
            CliLevel::Error => Level::Error,
            CliLevel::Warn => Level::Warn,
            CliLevel::Message => Level::Message,
            CliLevel::Command => Level::Command,
            CliLevel::Normal => Level::Normal,
            CliLevel::Verbose => Level::Verbose,
            CliLevel::Chatty => Level::Chatty,
        }
    }
}

impl ScriptArgs {
    /// Fold the parsed arguments into an options record: config file first,
    /// then individual flags, then the positional targets as want override.
    pub fn apply(self, mut options: Options) -> Result<Options, BuildError> {
        if let Some(path) = &self.config {
            options = config::load_and_apply(options, path)?;
        }

        if let Some(threads) = self.threads {
            options.threads = threads;
        }
        if let Some(level) = self.log_level {
            options.console_level = level.into();
        }
        if let Some(path) = self.file_log {
            options.file_log_path = Some(path);
        }
        if self.fail_on_error {
            options.fail_on_error = true;
        }
        if !self.targets.is_empty() {
            options.want = self.targets;
        }

        Ok(options)
    }
}

/// Convenience wrapper around `ScriptArgs::parse()`.
pub fn parse() -> ScriptArgs {
    ScriptArgs::parse()
}
