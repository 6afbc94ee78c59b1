// src/logging.rs

//! The build log and diagnostic logging for `needmake`.
//!
//! Two layers live here:
//!
//! - [`BuildLog`] is the user-facing log every rule body can write to via
//!   `ctx.write_log(..)`. It fans each line out to a console sink, an
//!   optional plain-text file sink, and an optional custom sink, each with
//!   its own verbosity threshold.
//! - [`init_tracing`] installs a `tracing-subscriber` for the engine's
//!   internal diagnostics. Priority for the level:
//!   1. explicit level (e.g. from the `--trace` flag)
//!   2. `NEEDMAKE_LOG` environment variable (e.g. "info", "debug")
//!   3. default to `info`

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt as tracing_fmt;

use crate::errors::BuildError;

/// Verbosity of a build-log line, ascending.
///
/// A sink configured at some level emits every line at that level or below,
/// so `Error` is never filtered and `Chatty` only shows up on the most
/// verbose sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Message,
    Command,
    Normal,
    Verbose,
    Chatty,
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "message" => Ok(Level::Message),
            "command" => Ok(Level::Command),
            "normal" => Ok(Level::Normal),
            "verbose" => Ok(Level::Verbose),
            "chatty" => Ok(Level::Chatty),
            other => Err(format!(
                "unknown log level '{other}' (expected error, warn, message, command, normal, verbose, or chatty)"
            )),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Message => "message",
            Level::Command => "command",
            Level::Normal => "normal",
            Level::Verbose => "verbose",
            Level::Chatty => "chatty",
        };
        f.write_str(name)
    }
}

/// A destination for build-log lines.
///
/// Implementations filter by level themselves and must be safe for
/// concurrent emission; the engine calls `write` from many tasks at once.
/// This is also the interface behind `Options::custom_logger`.
pub trait LogSink: Send + Sync {
    fn write(&self, level: Level, line: &str);
}

/// Console sink: writes to stderr, filtered by `console_level`.
struct ConsoleSink {
    level: Level,
}

impl LogSink for ConsoleSink {
    fn write(&self, level: Level, line: &str) {
        if level <= self.level {
            eprintln!("{line}");
        }
    }
}

/// File sink: plain text lines, filtered by `file_level`.
///
/// Writes are serialized through a mutex. IO errors while logging are
/// reported once via `tracing` and otherwise swallowed; a broken log file
/// must not fail the build.
struct FileSink {
    level: Level,
    file: Mutex<File>,
}

impl FileSink {
    fn open(path: &Path, level: Level) -> Result<Self, BuildError> {
        let file = File::create(path).map_err(|err| {
            BuildError::Config(format!(
                "cannot open file log at {}: {err}",
                path.display()
            ))
        })?;
        Ok(Self {
            level,
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn write(&self, level: Level, line: &str) {
        if level > self.level {
            return;
        }
        let mut file = self.file.lock().unwrap();
        if let Err(err) = writeln!(file, "[{level}] {line}") {
            tracing::warn!(error = %err, "failed to write to file log");
        }
    }
}

/// The aggregate build log handed to every rule body.
///
/// Cloning is cheap; all clones fan out to the same sinks.
#[derive(Clone)]
pub struct BuildLog {
    sinks: Arc<Vec<Arc<dyn LogSink>>>,
}

impl BuildLog {
    /// Assemble the log from options: console + optional file + optional
    /// custom sink.
    pub fn from_options(options: &crate::config::Options) -> Result<Self, BuildError> {
        let mut sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(ConsoleSink {
            level: options.console_level,
        })];

        if let Some(path) = &options.file_log_path {
            sinks.push(Arc::new(FileSink::open(path, options.file_level)?));
        }

        if let Some(custom) = &options.custom_logger {
            sinks.push(custom.clone());
        }

        Ok(Self {
            sinks: Arc::new(sinks),
        })
    }

    /// A log with no sinks; nothing is emitted. Useful in tests.
    pub fn discard() -> Self {
        Self {
            sinks: Arc::new(Vec::new()),
        }
    }

    /// Emit one line to every sink.
    pub fn write(&self, level: Level, line: impl fmt::Display) {
        let line = line.to_string();
        for sink in self.sinks.iter() {
            sink.write(level, &line);
        }
    }
}

impl fmt::Debug for BuildLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildLog")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Initialise the global tracing subscriber for engine diagnostics.
///
/// Safe to call once at startup; embedding programs that install their own
/// subscriber should skip this.
pub fn init_tracing(level: Option<tracing::Level>) {
    let level = match level {
        Some(lvl) => lvl,
        None => std::env::var("NEEDMAKE_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    // Ignore the error if a subscriber is already installed.
    let _ = tracing_fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
