// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core owns the [`Scheduler`] and answers two questions for workers:
//! "what should I run next?" and "here is how my block went". It has no
//! channels and performs no IO, so it can be tested synchronously.

use tracing::{debug, info};

use crate::block::{Block, TaskId};
use crate::dag::{ReleaseStep, Scheduler};
use crate::engine::{Assignment, RunSummary};
use crate::errors::Result;

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    /// Task ids, upstream first.
    order: Vec<TaskId>,
    /// Index in `order` to try first on the next request.
    cursor: usize,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        let order = scheduler.graph().task_order().to_vec();
        Self {
            scheduler,
            order,
            cursor: 0,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn into_scheduler(self) -> Scheduler {
        self.scheduler
    }

    /// Pick the next block for a worker.
    ///
    /// Tasks are tried round-robin starting after the task that last handed
    /// out a block. Pre-check skips can unlock tasks that were already tried
    /// in the same pass, so passes repeat while they complete anything.
    pub fn next_assignment(&mut self) -> Result<Assignment> {
        let n = self.order.len();

        loop {
            let completed_before = self.completed_total();

            for offset in 0..n {
                let idx = (self.cursor + offset) % n;
                if let Some(block) = self.scheduler.acquire_block(&self.order[idx])? {
                    self.cursor = (idx + 1) % n;
                    return Ok(Assignment::Block(block));
                }
            }

            if self.completed_total() == completed_before {
                break;
            }
        }

        if self.scheduler.processing_total() == 0 {
            info!(
                completed = self.completed_total(),
                "no ready or processing blocks left; run finished"
            );
            Ok(Assignment::Finished)
        } else {
            Ok(Assignment::Wait)
        }
    }

    /// Fold a worker's report into the scheduler.
    pub fn report(&mut self, block: &Block) -> Result<ReleaseStep> {
        let step = self.scheduler.step_release(block)?;

        if let Some(state) = self.scheduler.task_state(&block.task_id) {
            debug!(
                task = %block.task_id,
                block = block.block_id,
                status = ?block.status,
                completed = state.completed_count,
                failed = state.failed_count,
                orphaned = state.orphaned_count,
                processing = state.processing_count,
                unlocked = step.updated_tasks.len(),
                "block released"
            );
        }

        Ok(step)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            tasks: self
                .scheduler
                .task_states()
                .map(|(id, state)| (id.to_string(), *state))
                .collect(),
        }
    }

    fn completed_total(&self) -> u64 {
        self.scheduler
            .task_states()
            .map(|(_, s)| s.completed_count)
            .sum()
    }
}
