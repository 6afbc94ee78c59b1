// src/rules/target.rs

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Options;
use crate::rules::registry::RuleRegistry;

/// A buildable thing: a file on disk or a named phony action.
///
/// File targets always carry an absolute path rooted at the project root;
/// the file may not exist yet. Equality and hashing are case-sensitive on
/// the payload, which makes targets usable as keys in the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    File(PathBuf),
    Phony(String),
}

impl Target {
    pub fn is_phony(&self) -> bool {
        matches!(self, Target::Phony(_))
    }

    /// The filesystem path of a file target.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Target::File(path) => Some(path),
            Target::Phony(_) => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::File(path) => write!(f, "{}", path.display()),
            Target::Phony(name) => f.write_str(name),
        }
    }
}

/// Something a rule body may `need`: a bare name still to be resolved, or
/// an already-resolved target.
#[derive(Debug, Clone)]
pub enum TargetRef {
    Name(String),
    Resolved(Target),
}

impl From<&str> for TargetRef {
    fn from(name: &str) -> Self {
        TargetRef::Name(name.to_string())
    }
}

impl From<String> for TargetRef {
    fn from(name: String) -> Self {
        TargetRef::Name(name)
    }
}

impl From<&String> for TargetRef {
    fn from(name: &String) -> Self {
        TargetRef::Name(name.clone())
    }
}

impl From<Target> for TargetRef {
    fn from(target: Target) -> Self {
        TargetRef::Resolved(target)
    }
}

/// Resolve a bare name to a target.
///
/// A name that exactly matches a phony rule resolves to that phony target;
/// anything else becomes a file target under `project_root` (absolute names
/// are kept as-is). Phony deliberately takes precedence over a file of the
/// same name.
pub fn make_target(options: &Options, registry: &RuleRegistry, name: &str) -> Target {
    if registry.has_phony(name) {
        return Target::Phony(name.to_string());
    }

    let path = Path::new(name);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        options.project_root.join(path)
    };
    Target::File(absolute)
}

/// Resolve a [`TargetRef`] against the registry and project root.
pub fn resolve_ref(options: &Options, registry: &RuleRegistry, spec: TargetRef) -> Target {
    match spec {
        TargetRef::Name(name) => make_target(options, registry, &name),
        TargetRef::Resolved(target) => target,
    }
}
