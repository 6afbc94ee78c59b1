// src/errors.rs

//! Crate-wide error types.
//!
//! Build results are fanned out to every waiter of a target, so the error
//! type must be cheap to clone. User action failures wrap their
//! `anyhow::Error` in an `Arc` for that reason; everything else is plain
//! data.

use std::sync::Arc;

use thiserror::Error;

use crate::rules::Target;

/// Outcome of building a single target.
pub type BuildResult = Result<(), BuildError>;

/// The engine's error taxonomy.
///
/// `Aggregate` appears when several sibling targets fail inside one `need`
/// or one top-level want set. Aggregates may nest (a failing `need` inside a
/// rule that itself sits under another `need`); use [`BuildError::flatten`]
/// to reduce the tree to its leaves for presentation.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// No rule matches the target and no file with that name exists.
    #[error("no rule to build '{0}' and no such file exists")]
    NoRule(Target),

    /// A rule action returned an error or panicked.
    #[error("action for '{target}' failed: {cause:#}")]
    Action {
        target: Target,
        cause: Arc<anyhow::Error>,
    },

    /// The pending build was aborted, e.g. by a pool reset.
    #[error("build of '{0}' was cancelled")]
    Cancelled(Target),

    /// Invalid options or rule declarations.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A broken engine invariant. Seeing this is a bug in the engine.
    #[error("internal error: {0}")]
    Internal(String),

    /// Several targets failed in the same await group.
    #[error("{} targets failed to build", .0.len())]
    Aggregate(Vec<BuildError>),
}

impl BuildError {
    /// Wrap a user action error for a given target.
    pub fn action(target: Target, cause: anyhow::Error) -> Self {
        BuildError::Action {
            target,
            cause: Arc::new(cause),
        }
    }

    /// Collapse a non-empty list of sibling errors into one error.
    ///
    /// A single error stays itself; more become an `Aggregate`. The first
    /// error in the list is the primary one and keeps its position.
    pub fn aggregate(mut errors: Vec<BuildError>) -> Self {
        debug_assert!(!errors.is_empty());
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            BuildError::Aggregate(errors)
        }
    }

    /// Walk the error tree and return every leaf, left to right.
    ///
    /// Aggregates of aggregates are unwound recursively so callers see only
    /// concrete failures.
    pub fn flatten(&self) -> Vec<&BuildError> {
        match self {
            BuildError::Aggregate(errors) => {
                errors.iter().flat_map(BuildError::flatten).collect()
            }
            leaf => vec![leaf],
        }
    }

    /// The primary (first) leaf error.
    pub fn primary(&self) -> &BuildError {
        match self {
            BuildError::Aggregate(errors) => {
                errors.first().map(BuildError::primary).unwrap_or(self)
            }
            leaf => leaf,
        }
    }
}
