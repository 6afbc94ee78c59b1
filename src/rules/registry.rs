// src/rules/registry.rs

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::debug;

use crate::engine::context::Context;
use crate::errors::BuildError;
use crate::rules::pattern::TargetPattern;
use crate::rules::target::Target;

/// Result type every rule action returns.
pub type ActionResult = anyhow::Result<()>;

type BoxedActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// A rule body: given the execution context and the resolved target,
/// produce the target. Stored type-erased so file and phony rules share
/// one registry.
pub type Action = Arc<dyn Fn(Context, Target) -> BoxedActionFuture + Send + Sync>;

/// A target pattern paired with the action that produces matching targets.
#[derive(Clone)]
pub struct Rule {
    pattern: TargetPattern,
    action: Action,
}

impl Rule {
    /// A file rule. The action receives the resolved absolute path of the
    /// file target it is producing.
    pub fn file<F, Fut>(mask: &str, action: F) -> Result<Self, BuildError>
    where
        F: Fn(Context, std::path::PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let pattern = TargetPattern::file(mask)?;
        let action: Action = Arc::new(move |ctx, target| {
            let fut: BoxedActionFuture = match target {
                Target::File(path) => Box::pin(action(ctx, path)),
                Target::Phony(name) => Box::pin(async move {
                    Err(anyhow!("file rule invoked with phony target '{name}'"))
                }),
            };
            fut
        });
        Ok(Self { pattern, action })
    }

    /// A phony rule. The action receives only the context.
    pub fn phony<F, Fut>(name: &str, action: F) -> Result<Self, BuildError>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let pattern = TargetPattern::phony(name)?;
        let action: Action = Arc::new(move |ctx, _target| {
            let fut: BoxedActionFuture = Box::pin(action(ctx));
            fut
        });
        Ok(Self { pattern, action })
    }

    pub fn pattern(&self) -> &TargetPattern {
        &self.pattern
    }

    pub fn action(&self) -> Action {
        self.action.clone()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern.to_string())
            .finish_non_exhaustive()
    }
}

/// The ordered rule collection.
///
/// Declaration order matters: when several file masks match the same path,
/// the first declared wins, so the registry is a vector rather than a map.
/// Re-declaring a pattern replaces the earlier rule in place.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any earlier rule with the same pattern.
    pub fn insert(&mut self, rule: Rule) {
        if let Some(slot) = self
            .rules
            .iter_mut()
            .find(|existing| existing.pattern() == rule.pattern())
        {
            debug!(pattern = %rule.pattern(), "replacing rule declaration");
            *slot = rule;
        } else {
            self.rules.push(rule);
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True if a phony rule with exactly this name is declared.
    pub fn has_phony(&self, name: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| matches!(rule.pattern(), TargetPattern::Phony(n) if n == name))
    }

    /// Find the rule producing `target`.
    ///
    /// Phony targets match by exact name. File targets are matched against
    /// file masks in declaration order using the path relative to
    /// `project_root`; the first match wins.
    pub fn locate(&self, project_root: &Path, target: &Target) -> Option<&Rule> {
        match target {
            Target::Phony(name) => self.rules.iter().find(
                |rule| matches!(rule.pattern(), TargetPattern::Phony(n) if n == name),
            ),
            Target::File(path) => {
                let relative = path.strip_prefix(project_root).unwrap_or(path);
                self.rules.iter().find(|rule| match rule.pattern() {
                    TargetPattern::File(mask) => mask.matches_path(relative),
                    TargetPattern::Phony(_) => false,
                })
            }
        }
    }
}
