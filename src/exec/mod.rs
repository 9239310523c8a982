// src/exec/mod.rs

//! Block execution layer.
//!
//! Workers pull assignments from the coordinator, process blocks through a
//! [`BlockWorker`], and release them with the outcome.
//!
//! - [`backend`] provides the `BlockWorker` trait that the worker loops talk
//!   to; tests can replace it with a fake implementation.
//! - [`task_runner`] runs a task's shell command for a block
//!   (`CommandWorker`) and provides the command-based pre-check.
//! - [`executor_loop`] owns the worker loops that drive a run.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::BlockWorker;
pub use executor_loop::{spawn_workers, worker_loop};
pub use task_runner::{command_pre_check, CommandWorker};
