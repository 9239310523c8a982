// src/engine/mod.rs

//! Driving loop for the block scheduler.
//!
//! This module ties together:
//! - the pure [`CoreRuntime`], which turns scheduler state into assignments
//!   for workers and folds their reports back in
//! - the [`Runtime`] actor, the single writer that owns the core and serves
//!   requests arriving over a channel
//! - [`SchedulerHandle`], the cloneable client side used by workers
//!
//! The pure core state machine lives in [`core`]; the channel shell is
//! implemented in [`runtime`].

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::block::{Block, BlockStatus, TaskId};
use crate::dag::{ReleaseStep, TaskState};
use crate::errors::Result;

/// Outcome of processing a block, as reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Success,
    Failed(i32),
}

impl BlockOutcome {
    /// The status a block should be released with.
    pub fn status(&self) -> BlockStatus {
        match self {
            BlockOutcome::Success => BlockStatus::Success,
            BlockOutcome::Failed(_) => BlockStatus::Failed,
        }
    }
}

/// What a worker should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Process this block and release it.
    Block(Block),
    /// Nothing is ready yet, but blocks in flight may unlock more.
    Wait,
    /// Nothing is ready and nothing is in flight: the run is over.
    Finished,
}

/// Options for a blockwise run.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Number of concurrent worker loops.
    pub num_workers: usize,
    /// How long an idle worker waits before asking again.
    pub poll_interval: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            num_workers: 1,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Requests served by the coordinator actor.
#[derive(Debug)]
pub enum CoordinatorRequest {
    NextAssignment {
        reply: oneshot::Sender<Result<Assignment>>,
    },
    Release {
        block: Block,
        reply: oneshot::Sender<Result<ReleaseStep>>,
    },
    TaskState {
        task: TaskId,
        reply: oneshot::Sender<Option<TaskState>>,
    },
    /// Stop serving requests.
    Shutdown,
}

/// Final per-task counters of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tasks: BTreeMap<TaskId, TaskState>,
}

impl RunSummary {
    pub fn completed_total(&self) -> u64 {
        self.tasks.values().map(|s| s.completed_count).sum()
    }

    pub fn failed_total(&self) -> u64 {
        self.tasks.values().map(|s| s.failed_count).sum()
    }

    pub fn orphaned_total(&self) -> u64 {
        self.tasks.values().map(|s| s.orphaned_count).sum()
    }

    /// Every task finished with no failed or orphaned blocks.
    pub fn is_success(&self) -> bool {
        self.tasks
            .values()
            .all(|s| s.is_done() && s.failed_count == 0 && s.orphaned_count == 0)
    }
}

pub mod core;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use runtime::{Runtime, SchedulerHandle};
