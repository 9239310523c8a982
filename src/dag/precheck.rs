// src/dag/precheck.rs

//! Single-entry-per-task memo of pre-check results.

use std::collections::HashMap;

use tracing::error;

use crate::block::{Block, BlockKey, TaskId};
use crate::task::Task;

/// Remembers the most recent pre-check answer for each task.
///
/// Only the last block asked about is cached; asking about any other block
/// evaluates the task's pre-check again and replaces the entry.
#[derive(Debug, Clone, Default)]
pub struct PrecheckCache {
    last: HashMap<TaskId, (BlockKey, bool)>,
}

impl PrecheckCache {
    /// Whether `block` can be skipped because its work is already done.
    ///
    /// A pre-check error is logged and counts as "not done".
    pub fn check(&mut self, task: &Task, block: &Block) -> bool {
        if let Some((cached, done)) = self.last.get(task.task_id()) {
            if block.is(cached) {
                return *done;
            }
        }

        let done = match task.pre_check(block) {
            Ok(done) => done,
            Err(err) => {
                error!(
                    task = %task.task_id(),
                    block = block.block_id,
                    error = %err,
                    "pre_check failed; treating block as not done"
                );
                false
            }
        };

        self.last
            .insert(task.task_id().to_string(), (block.key(), done));
        done
    }

    /// The cached entry for a task, if any.
    pub fn cached(&self, task_id: &str) -> Option<(&BlockKey, bool)> {
        self.last.get(task_id).map(|(key, done)| (key, *done))
    }
}
