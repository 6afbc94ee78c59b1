// src/config/model.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::logging::{Level, LogSink};

/// Engine options, owned by the embedding script.
///
/// Scripts usually start from `Options::default()`, adjust fields in code,
/// and optionally let a TOML overlay ([`OptionsFile`]) or command-line
/// arguments (`cli::ScriptArgs`) override them.
#[derive(Clone)]
pub struct Options {
    /// Directory all relative target names and masks resolve against.
    pub project_root: PathBuf,

    /// Worker budget: the number of rule bodies allowed to run at once.
    pub threads: usize,

    /// Verbosity threshold of the console sink.
    pub console_level: Level,

    /// Verbosity threshold of the file sink.
    pub file_level: Level,

    /// Path of the plain-text file log; `None` disables the file sink.
    pub file_log_path: Option<PathBuf>,

    /// An additional sink receiving every build-log line.
    pub custom_logger: Option<Arc<dyn LogSink>>,

    /// Targets to build instead of the script-declared wants; empty means
    /// use the script's list.
    pub want: Vec<String>,

    /// Whether a failing build surfaces as a fatal error from `run` or is
    /// only reported through the log and the build report.
    pub fail_on_error: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            threads: 4,
            console_level: Level::Normal,
            file_level: Level::Verbose,
            file_log_path: None,
            custom_logger: None,
            want: Vec::new(),
            fail_on_error: false,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("project_root", &self.project_root)
            .field("threads", &self.threads)
            .field("console_level", &self.console_level)
            .field("file_level", &self.file_level)
            .field("file_log_path", &self.file_log_path)
            .field("custom_logger", &self.custom_logger.is_some())
            .field("want", &self.want)
            .field("fail_on_error", &self.fail_on_error)
            .finish()
    }
}

/// Top-level option overlay as read from a TOML file.
///
/// All sections are optional; absent fields leave the in-code options
/// untouched:
///
/// ```toml
/// want = ["all"]
///
/// [build]
/// threads = 8
/// fail_on_error = true
///
/// [log]
/// console = "message"
/// file = "chatty"
/// path = "build.log"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OptionsFile {
    /// Want-list override, beating the script-declared wants.
    #[serde(default)]
    pub want: Vec<String>,

    /// `[build]` section.
    #[serde(default)]
    pub build: BuildSection,

    /// `[log]` section.
    #[serde(default)]
    pub log: LogSection,
}

/// `[build]` section of the overlay.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuildSection {
    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default)]
    pub fail_on_error: Option<bool>,

    #[serde(default)]
    pub project_root: Option<PathBuf>,
}

/// `[log]` section of the overlay. Levels are spelled by name
/// (e.g. `"message"`, `"verbose"`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogSection {
    #[serde(default)]
    pub console: Option<String>,

    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub path: Option<PathBuf>,
}
