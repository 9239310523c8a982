// src/dag/mod.rs

//! Block DAG representation and scheduling.
//!
//! - [`graph`] holds the immutable block-level dependency graph.
//! - [`scheduler`] contains the state machine that decides which blocks
//!   are ready, and what completes or fails as blocks are released.
//! - [`frontier`] tracks the completion wavefront used for readiness checks.
//! - [`precheck`] memoizes the skip check per task.
//! - [`task_state`] provides per-task counters and block collections.
//! - [`scheduler_step`] defines the result type for release steps.

pub mod frontier;
pub mod graph;
pub mod precheck;
pub mod scheduler;
pub mod scheduler_step;
pub mod task_state;

pub use frontier::CompletionFrontier;
pub use graph::{BlockGraph, RootBlocks};
pub use precheck::PrecheckCache;
pub use scheduler::Scheduler;
pub use scheduler_step::{ReleaseStep, UpdatedTasks};
pub use task_state::{TaskBlocks, TaskState};
