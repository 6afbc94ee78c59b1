// src/fileset.rs

//! Declarative file sets, expanded against the project root.
//!
//! Filesets use ordinary glob semantics (`globset`), unlike rule masks,
//! which have their own matching rules.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// A set of include/exclude glob patterns describing files under the
/// project root.
#[derive(Debug, Clone, Default)]
pub struct Fileset {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl Fileset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Walk `root` and return the relative paths of every regular file
    /// matched by the includes and not matched by the excludes, sorted for
    /// determinism.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let include_set = build_globset(&self.includes)?;
        let exclude_set = if self.excludes.is_empty() {
            None
        } else {
            Some(build_globset(&self.excludes)?)
        };

        let mut matches = Vec::new();
        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("reading directory {}", dir.display()))?;

            for entry in entries {
                let entry =
                    entry.with_context(|| format!("reading entry in {}", dir.display()))?;
                let path = entry.path();

                if path.is_dir() {
                    stack.push(path);
                    continue;
                }

                let relative = match path.strip_prefix(root) {
                    Ok(relative) => relative,
                    Err(_) => continue,
                };

                if !include_set.is_match(relative) {
                    continue;
                }
                if let Some(exclude) = &exclude_set {
                    if exclude.is_match(relative) {
                        continue;
                    }
                }

                matches.push(relative.to_path_buf());
            }
        }

        matches.sort();
        Ok(matches)
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
