// src/engine/context.rs

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Options;
use crate::engine::pool::{BuildHandle, WorkerPool};
use crate::errors::{BuildError, BuildResult};
use crate::fileset::Fileset;
use crate::logging::{BuildLog, Level};
use crate::rules::target::resolve_ref;
use crate::rules::{RuleRegistry, Target, TargetRef};

/// Whether the current rule must run. Reserved for incremental builds;
/// every rule is currently considered `Valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Valid,
    Rebuild,
}

/// Ambient state visible to every rule action during a run.
///
/// One context exists per run and is shared by reference across all of the
/// run's tasks; cloning is cheap. It carries the options, the frozen rule
/// registry, the build log, and the worker pool, and exposes the
/// dependency-declaring primitives rule bodies are written against.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    options: Options,
    registry: Arc<RuleRegistry>,
    log: BuildLog,
    pool: Arc<WorkerPool>,
    status: RuleStatus,
}

impl Context {
    pub(crate) fn new(
        options: Options,
        registry: Arc<RuleRegistry>,
        log: BuildLog,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                options,
                registry,
                log,
                pool,
                status: RuleStatus::Valid,
            }),
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.inner.registry
    }

    pub fn log(&self) -> &BuildLog {
        &self.inner.log
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.inner.pool
    }

    /// Rebuild status of the current rule. Always `Valid` until
    /// incremental state tracking exists.
    pub fn status(&self) -> RuleStatus {
        self.inner.status
    }

    /// Emit a line to the build log.
    pub fn write_log(&self, level: Level, message: impl std::fmt::Display) {
        self.inner.log.write(level, message);
    }

    /// Require that every listed target is produced before continuing.
    ///
    /// The caller's worker permit is released while the dependencies build
    /// and re-acquired before this returns, so deep dependency chains make
    /// progress even with `threads = 1`. Targets already built (or
    /// building) are joined, not re-run.
    ///
    /// If several dependencies fail, the first error is primary and the
    /// rest are attached as an aggregate.
    pub async fn need<I, T>(&self, targets: I) -> BuildResult
    where
        I: IntoIterator<Item = T>,
        T: Into<TargetRef>,
    {
        let targets: Vec<Target> = targets
            .into_iter()
            .map(|spec| resolve_ref(&self.inner.options, &self.inner.registry, spec.into()))
            .collect();

        if targets.is_empty() {
            return Ok(());
        }

        debug!(count = targets.len(), "need: waiting on dependencies");

        // Hold a permit only while doing real work: give it up before
        // blocking on dependencies, take one back before resuming.
        self.inner.pool.release_slot();

        let handles: Vec<BuildHandle> = targets
            .into_iter()
            .map(|target| self.submit(target))
            .collect();

        // Every dependency is already running in its own spawned task;
        // collecting in listing order only fixes which error is primary.
        let mut errors = Vec::new();
        for handle in handles {
            if let Err(err) = handle.wait().await {
                errors.push(err);
            }
        }

        if let Err(err) = self.inner.pool.acquire_slot().await {
            errors.push(err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BuildError::aggregate(errors))
        }
    }

    /// Expand a fileset against the project root and need every match as a
    /// file target.
    pub async fn need_fileset(&self, fileset: &Fileset) -> anyhow::Result<()> {
        let root = &self.inner.options.project_root;
        let files = fileset.scan(root)?;
        debug!(count = files.len(), "need_fileset: expanded");

        let targets: Vec<TargetRef> = files
            .into_iter()
            .map(|relative| TargetRef::Resolved(Target::File(root.join(relative))))
            .collect();

        self.need(targets).await?;
        Ok(())
    }

    /// Need `file`, then run `body`.
    ///
    /// Reserved for incremental builds: once rebuild tracking exists the
    /// body will be skipped when the file is already up to date. Today the
    /// status is always `Valid` and the body runs unconditionally.
    pub async fn when_needed<F, Fut>(
        &self,
        file: impl Into<TargetRef>,
        body: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.need([file.into()]).await?;
        body().await
    }

    /// Submit a target to the pool, compiling its rule lookup into the
    /// spawned action.
    pub(crate) fn submit(&self, target: Target) -> BuildHandle {
        let ctx = self.clone();
        let task_target = target.clone();
        self.inner
            .pool
            .submit(target, async move { execute(ctx, task_target).await })
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.inner.options)
            .field("rules", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

/// Locate and run the rule for one target.
///
/// A file target with no rule but an existing file is a pre-existing
/// source input and succeeds without running anything.
async fn execute(ctx: Context, target: Target) -> BuildResult {
    let rule = {
        let root = &ctx.inner.options.project_root;
        match ctx.inner.registry.locate(root, &target) {
            Some(rule) => rule.clone(),
            None => {
                if let Target::File(path) = &target {
                    if path.exists() {
                        debug!(target = %target, "no rule but file exists; treating as source input");
                        return Ok(());
                    }
                }
                return Err(BuildError::NoRule(target));
            }
        }
    };

    ctx.write_log(Level::Normal, format!("building {target}"));
    debug!(target = %target, "running rule action");

    let action = rule.action();
    match action(ctx.clone(), target.clone()).await {
        Ok(()) => {
            debug!(target = %target, "target completed");
            Ok(())
        }
        Err(err) => {
            warn!(target = %target, error = %err, "action failed");
            Err(BuildError::action(target, err))
        }
    }
}
