// src/lib.rs

//! needmake — a programmable, demand-driven build engine.
//!
//! A build is described as a set of rules (file masks or phony names, each
//! paired with an async action) plus a list of wanted targets. Dependencies
//! are not declared up front: a running rule calls `ctx.need([...])` for
//! whatever it turns out to require, and the engine builds those targets on
//! demand, each at most once, with the number of concurrently running rule
//! bodies bounded by the worker budget.
//!
//! See [`Script`] for the declaration surface and [`Context`] for the
//! primitives available inside rule bodies.

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fileset;
pub mod logging;
pub mod rules;
pub mod script;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

pub use crate::config::Options;
pub use crate::engine::{BuildHandle, Context, RuleStatus, TaskState, WorkerPool};
pub use crate::errors::{BuildError, BuildResult};
pub use crate::fileset::Fileset;
pub use crate::logging::{BuildLog, Level, LogSink};
pub use crate::rules::{make_target, Rule, RuleRegistry, Target, TargetPattern, TargetRef};
pub use crate::script::Script;

/// What a finished run looked like.
///
/// On the non-fatal path (`fail_on_error = false`) the report carries the
/// flattened leaf errors so embedders can still inspect what went wrong.
#[derive(Debug)]
pub struct BuildReport {
    pub duration: Duration,
    pub errors: Vec<BuildError>,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Drive a build: the terminal operation behind [`Script::run`].
///
/// This wires together:
/// - option validation and best-effort canonicalization of the project
///   root (file targets are identified by absolute path)
/// - the aggregate build log (console + optional file + optional custom)
/// - the worker pool sized to the worker budget
/// - resolution of the requested targets (options override beats the
///   script-declared wants)
/// - concurrent submission of every want, error collection, and reporting
pub async fn run(
    mut options: Options,
    registry: RuleRegistry,
    wants: Vec<String>,
) -> Result<BuildReport, BuildError> {
    config::validate_options(&options)?;

    // Target equality hashes the raw path, so resolve the root once up
    // front rather than depending on the working directory later.
    options.project_root = options
        .project_root
        .canonicalize()
        .unwrap_or_else(|_| options.project_root.clone());

    let log = BuildLog::from_options(&options)?;
    let pool = Arc::new(WorkerPool::new(options.threads));
    let registry = Arc::new(registry);

    let want_names = if options.want.is_empty() {
        wants
    } else {
        options.want.clone()
    };
    if want_names.is_empty() {
        return Err(BuildError::Config(
            "nothing to build: no targets requested and none declared".to_string(),
        ));
    }

    info!(targets = ?want_names, threads = options.threads, "build started");
    let started = Instant::now();

    let ctx = Context::new(options.clone(), registry, log.clone(), pool.clone());

    let handles: Vec<BuildHandle> = want_names
        .iter()
        .map(|name| ctx.submit(make_target(&options, ctx.registry(), name)))
        .collect();

    // The wants all build concurrently in their spawned tasks; waiting in
    // listing order only fixes which error is primary.
    let mut errors = Vec::new();
    for handle in handles {
        let target = handle.target().clone();
        if let Err(err) = handle.wait().await {
            debug!(target = %target, "top-level want failed");
            errors.push(err);
        }
    }

    let duration = started.elapsed();

    if errors.is_empty() {
        log.write(Level::Message, format!("Build completed in {duration:.2?}"));
        info!(?duration, "build succeeded");
        return Ok(BuildReport {
            duration,
            errors: Vec::new(),
        });
    }

    // Flatten nested aggregates so the user sees leaf failures, with full
    // detail going to the verbose sinks.
    let grouped = BuildError::aggregate(errors);
    for leaf in grouped.flatten() {
        log.write(Level::Error, format!("Error: {leaf}"));
        match leaf {
            BuildError::Action { target, cause } => {
                log.write(Level::Verbose, format!("{target}: {cause:?}"));
            }
            other => {
                log.write(Level::Verbose, format!("{other:?}"));
            }
        }
    }
    log.write(
        Level::Error,
        format!("Build failed after running for {duration:.2?}"),
    );
    warn!(?duration, "build failed");

    if options.fail_on_error {
        Err(grouped)
    } else {
        let errors = grouped.flatten().into_iter().cloned().collect();
        Ok(BuildReport { duration, errors })
    }
}
