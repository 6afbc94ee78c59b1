// src/rules/pattern.rs

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::errors::BuildError;

/// The left-hand side of a rule: a file mask or an exact phony name.
#[derive(Debug, Clone)]
pub enum TargetPattern {
    File(FileMask),
    Phony(String),
}

impl TargetPattern {
    /// Compile a file mask pattern.
    pub fn file(mask: &str) -> Result<Self, BuildError> {
        Ok(TargetPattern::File(FileMask::new(mask)?))
    }

    /// An exact-match phony pattern. The name must be non-empty.
    pub fn phony(name: &str) -> Result<Self, BuildError> {
        if name.is_empty() {
            return Err(BuildError::Config(
                "phony target name must not be empty".to_string(),
            ));
        }
        Ok(TargetPattern::Phony(name.to_string()))
    }
}

/// Two patterns are the same declaration slot when their normalized sources
/// match; re-declaring a slot replaces the earlier rule.
impl PartialEq for TargetPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TargetPattern::File(a), TargetPattern::File(b)) => a.source() == b.source(),
            (TargetPattern::Phony(a), TargetPattern::Phony(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TargetPattern {}

impl fmt::Display for TargetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPattern::File(mask) => f.write_str(mask.source()),
            TargetPattern::Phony(name) => f.write_str(name),
        }
    }
}

/// A compiled shell-style file mask.
///
/// Semantics differ from common glob libraries, so the mask is translated
/// to a regex by hand:
///
/// - `*`  matches one or more characters within a single path segment
/// - `**` matches zero or more whole path segments
/// - `?`  matches exactly one character within a segment
/// - `.` and every other character are literal
///
/// Both `/` and `\` are accepted as separators in the mask and normalized
/// before compilation. Matching is case-sensitive and applies to paths
/// relative to the project root.
#[derive(Debug, Clone)]
pub struct FileMask {
    source: String,
    regex: Regex,
}

impl FileMask {
    pub fn new(mask: &str) -> Result<Self, BuildError> {
        let source = mask.replace('\\', "/");
        if source.is_empty() {
            return Err(BuildError::Config(
                "file rule mask must not be empty".to_string(),
            ));
        }

        let regex = Regex::new(&compile(&source)).map_err(|err| {
            BuildError::Config(format!("invalid file mask '{mask}': {err}"))
        })?;

        Ok(Self { source, regex })
    }

    /// The normalized mask text as declared.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a path relative to the project root.
    pub fn matches_path(&self, relative: &Path) -> bool {
        let normalized = normalize_path(relative);
        self.regex.is_match(&normalized)
    }

    /// Match an already-normalized relative path string (`/` separators).
    pub fn matches(&self, relative: &str) -> bool {
        self.regex.is_match(relative)
    }
}

/// Render a path with forward slashes so masks match the same way on every
/// platform.
pub(crate) fn normalize_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Translate a normalized mask into an anchored regex.
fn compile(mask: &str) -> String {
    let segments: Vec<&str> = mask.split('/').collect();
    let mut out = String::from("^");

    for (index, segment) in segments.iter().enumerate() {
        let last = index + 1 == segments.len();

        if *segment == "**" {
            // Zero or more whole segments; a trailing `**` must still
            // consume the file name itself.
            out.push_str("(?:[^/]+/)*");
            if last {
                out.push_str("[^/]+");
            }
            continue;
        }

        for ch in segment.chars() {
            match ch {
                '*' => out.push_str("[^/]+"),
                '?' => out.push_str("[^/]"),
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        if !last {
            out.push('/');
        }
    }

    out.push('$');
    out
}
