// src/engine/pool.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::watch;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};
use tracing::debug;

use crate::errors::{BuildError, BuildResult};
use crate::rules::Target;

/// A cheap-to-clone handle to a pending or completed build of one target.
///
/// Every caller interested in the same target holds a clone of the same
/// handle; the underlying action runs at most once.
#[derive(Debug, Clone)]
pub struct BuildHandle {
    target: Target,
    rx: watch::Receiver<Option<BuildResult>>,
}

impl BuildHandle {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Wait for the build to reach a terminal state.
    ///
    /// A handle whose producer disappeared without publishing a result
    /// (the pool was reset, or the runtime is shutting down) resolves to
    /// `Cancelled`.
    pub async fn wait(mut self) -> BuildResult {
        match self.rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => match slot.as_ref() {
                Some(result) => result.clone(),
                None => Err(BuildError::Internal(format!(
                    "empty result slot for '{}'",
                    self.target
                ))),
            },
            Err(_) => Err(BuildError::Cancelled(self.target.clone())),
        }
    }

    /// Non-blocking read: `Some` once the build completed.
    pub fn peek(&self) -> Option<BuildResult> {
        self.rx.borrow().clone()
    }
}

/// Diagnostic view of a pool entry.
#[derive(Debug, Clone)]
pub enum TaskState {
    Running,
    Completed(BuildResult),
}

struct TaskEntry {
    handle: BuildHandle,
    abort: AbortHandle,
}

/// The deduplicating, permit-throttled executor of rule actions.
///
/// For every target ever submitted the pool holds exactly one entry until
/// [`WorkerPool::reset`] clears the table, so a target's action body runs
/// at most once per run no matter how many rules need it. A counting
/// semaphore with `threads` permits bounds how many action bodies execute
/// at once; [`WorkerPool::release_slot`] and [`WorkerPool::acquire_slot`]
/// let a rule body give its permit up while it waits on dependencies.
///
/// All map mutations go through one mutex-guarded section; handles returned
/// to callers are cheap clones of a shared watch channel.
pub struct WorkerPool {
    threads: usize,
    entries: Mutex<HashMap<Target, TaskEntry>>,
    // Replaced wholesale on reset, which re-arms the worker budget even if
    // aborted tasks died between acquiring and returning their permit.
    semaphore: Mutex<Arc<Semaphore>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            entries: Mutex::new(HashMap::new()),
            semaphore: Mutex::new(Arc::new(Semaphore::new(threads))),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Request that `target` be built by `action`.
    ///
    /// If an entry for the target already exists the existing handle is
    /// returned and `action` is dropped unexecuted. Otherwise the action is
    /// spawned (gated on a worker permit) and a new entry installed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&self, target: Target, action: F) -> BuildHandle
    where
        F: std::future::Future<Output = BuildResult> + Send + 'static,
    {
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get(&target) {
            debug!(target = %target, "target already submitted; reusing entry");
            return entry.handle.clone();
        }

        debug!(target = %target, "spawning build task");
        let (tx, rx) = watch::channel(None);
        let semaphore = self.semaphore();

        let worker = tokio::spawn(throttled(semaphore, action));
        let abort = worker.abort_handle();

        // Publish the outcome from a separate task so panics and aborts of
        // the worker still produce a terminal result for every waiter.
        let publish_target = target.clone();
        tokio::spawn(async move {
            let result = match worker.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => Err(BuildError::action(
                    publish_target.clone(),
                    anyhow!("action panicked: {}", panic_message(err)),
                )),
                Err(_) => Err(BuildError::Cancelled(publish_target.clone())),
            };
            let _ = tx.send(Some(result));
        });

        let handle = BuildHandle {
            target: target.clone(),
            rx,
        };
        entries.insert(
            target,
            TaskEntry {
                handle: handle.clone(),
                abort,
            },
        );
        handle
    }

    /// Give up the caller's worker permit. The caller must actually hold
    /// one; the pool does not verify this.
    pub fn release_slot(&self) {
        self.semaphore().add_permits(1);
    }

    /// Re-acquire a worker permit, waiting as long as it takes.
    pub async fn acquire_slot(&self) -> Result<(), BuildError> {
        let semaphore = self.semaphore();
        let result = match semaphore.acquire().await {
            Ok(permit) => {
                permit.forget();
                Ok(())
            }
            Err(_) => Err(BuildError::Internal(
                "worker semaphore closed".to_string(),
            )),
        };
        result
    }

    /// Abort every pending build and clear the table.
    ///
    /// Waiters on aborted builds observe `Cancelled`. The worker budget is
    /// restored to its full size.
    pub fn reset(&self) {
        let mut entries = self.entries.lock().unwrap();
        let cleared = entries.len();
        for (_, entry) in entries.drain() {
            entry.abort.abort();
        }
        *self.semaphore.lock().unwrap() = Arc::new(Semaphore::new(self.threads));
        debug!(cleared, "pool reset; pending builds aborted");
    }

    /// Diagnostic read of a target's handle; never mutates the table.
    pub fn lookup(&self, target: &Target) -> Option<BuildHandle> {
        let entries = self.entries.lock().unwrap();
        entries.get(target).map(|entry| entry.handle.clone())
    }

    /// Diagnostic read of a target's state.
    pub fn state(&self, target: &Target) -> Option<TaskState> {
        self.lookup(target).map(|handle| match handle.peek() {
            Some(result) => TaskState::Completed(result),
            None => TaskState::Running,
        })
    }

    fn semaphore(&self) -> Arc<Semaphore> {
        self.semaphore.lock().unwrap().clone()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("entries", &self.entries.lock().unwrap().len())
            .finish()
    }
}

/// Run an action under the worker budget: one permit is held for the
/// duration of the action, minus any window where the action itself
/// released it via `release_slot`.
async fn throttled<F>(semaphore: Arc<Semaphore>, action: F) -> BuildResult
where
    F: std::future::Future<Output = BuildResult> + Send,
{
    // The permit is an RAII guard: a panicking action still returns it
    // during unwind. Only the cooperative hand-off in `release_slot` /
    // `acquire_slot` manipulates the counter manually.
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return Err(BuildError::Internal(
                "worker semaphore closed".to_string(),
            ))
        }
    };

    action.await
}

fn panic_message(err: JoinError) -> String {
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
