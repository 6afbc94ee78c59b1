// src/script.rs

//! The script builder: the surface an embedding program uses to declare
//! rules and wants, then hand everything to the driver.

use std::future::Future;
use std::path::PathBuf;

use crate::config::Options;
use crate::engine::Context;
use crate::errors::BuildError;
use crate::rules::{ActionResult, Rule, RuleRegistry};
use crate::BuildReport;

/// Accumulates options, rule declarations, and the want list.
///
/// Declarations with the same pattern are idempotent: the last writer wins
/// when the registry is frozen at [`Script::run`]. Pattern compile errors
/// are deferred to `run` as well, so the builder itself stays chainable.
///
/// ```no_run
/// # use needmake::{Level, Script};
/// # async fn demo() -> anyhow::Result<()> {
/// let report = Script::new()
///     .phony("all", |ctx| async move {
///         ctx.need(["a.o", "b.o"]).await?;
///         ctx.write_log(Level::Message, "linked everything");
///         Ok(())
///     })
///     .file("*.o", |_ctx, path| async move {
///         tokio::fs::write(&path, b"object").await?;
///         Ok(())
///     })
///     .want(["all"])
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Script {
    options: Options,
    declarations: Vec<Result<Rule, BuildError>>,
    wants: Vec<String>,
    want_overridden: bool,
}

impl Script {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            declarations: Vec::new(),
            wants: Vec::new(),
            want_overridden: false,
        }
    }

    /// Replace the options wholesale.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Add a pre-built rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.declarations.push(Ok(rule));
        self
    }

    /// Add a batch of pre-built rules.
    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.declarations.extend(rules.into_iter().map(Ok));
        self
    }

    /// Declare a file rule: any file target matching `mask` is produced by
    /// `action`, which receives the resolved absolute path.
    pub fn file<F, Fut>(mut self, mask: &str, action: F) -> Self
    where
        F: Fn(Context, PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.declarations.push(Rule::file(mask, action));
        self
    }

    /// Declare a phony rule under an exact name.
    pub fn phony<F, Fut>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.declarations.push(Rule::phony(name, action));
        self
    }

    /// Append default targets to build. Ignored once `want_override` was
    /// called.
    pub fn want<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.want_overridden {
            self.wants.extend(names.into_iter().map(Into::into));
        }
        self
    }

    /// Replace the want list, discarding earlier and later `want` calls.
    pub fn want_override<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wants = names.into_iter().map(Into::into).collect();
        self.want_overridden = true;
        self
    }

    /// Freeze the registry and run the build.
    pub async fn run(self) -> Result<BuildReport, BuildError> {
        let mut registry = RuleRegistry::new();
        for declaration in self.declarations {
            registry.insert(declaration?);
        }

        crate::run(self.options, registry, self.wants).await
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}
