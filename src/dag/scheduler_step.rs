// src/dag/scheduler_step.rs

//! Result types for a single release step.

use std::collections::BTreeMap;

use crate::block::{BlockKey, TaskId};
use crate::dag::task_state::TaskState;

/// Tasks whose ready queue grew, with their state after the step.
pub type UpdatedTasks = BTreeMap<TaskId, TaskState>;

/// Structured result of releasing one block.
///
/// Useful for tests (and the runtime) that want to see exactly what a
/// release changed.
#[derive(Debug, Clone, Default)]
pub struct ReleaseStep {
    /// Tasks that gained ready blocks as a result of this step.
    pub updated_tasks: UpdatedTasks,
    /// Blocks newly orphaned by a failure in this step, in traversal order.
    pub newly_orphaned: Vec<BlockKey>,
}
