// src/engine/mod.rs

//! The execution engine.
//!
//! This module ties together:
//! - the worker pool, which deduplicates in-flight builds per target and
//!   throttles concurrency against the worker budget
//! - the execution context carried through every rule body, which provides
//!   `need` and friends

pub mod context;
pub mod pool;

pub use context::{Context, RuleStatus};
pub use pool::{BuildHandle, TaskState, WorkerPool};
