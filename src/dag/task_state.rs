// src/dag/task_state.rs

//! Per-task progress counters and block collections.

use std::collections::{HashSet, VecDeque};

use crate::block::{Block, BlockId};
use crate::types::BlockCount;

/// Public, read-only progress counters for a task.
///
/// Once `total_block_count` is finite,
/// `completed + failed + orphaned + processing <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskState {
    /// Set when the first block is handed to a worker; never reset.
    pub started: bool,
    /// Blocks ready to be acquired, including root blocks not yet pulled
    /// from their source.
    pub ready_count: BlockCount,
    pub total_block_count: BlockCount,
    pub completed_count: u64,
    pub failed_count: u64,
    pub orphaned_count: u64,
    pub processing_count: u64,
}

impl TaskState {
    pub fn new(total_block_count: BlockCount) -> Self {
        Self {
            total_block_count,
            ..Self::default()
        }
    }

    /// Blocks that reached a terminal state (completed, failed or orphaned).
    pub fn finished_count(&self) -> u64 {
        self.completed_count + self.failed_count + self.orphaned_count
    }

    /// Whether every block is terminal and nothing is ready or in flight.
    ///
    /// Never true while the total is unknown and the root supply is open.
    pub fn is_done(&self) -> bool {
        if self.processing_count > 0 || !self.ready_count.is_zero() {
            return false;
        }
        match self.total_block_count {
            BlockCount::Finite(total) => self.finished_count() >= total,
            BlockCount::Unbounded => false,
        }
    }
}

/// Mutable block collections for a single task.
///
/// `processing`, `completed`, `failed` and `orphaned` are pairwise disjoint.
#[derive(Debug, Clone, Default)]
pub struct TaskBlocks {
    pub(crate) ready_queue: VecDeque<Block>,
    pub(crate) processing: HashSet<BlockId>,
    pub(crate) completed: HashSet<BlockId>,
    pub(crate) failed: HashSet<BlockId>,
    pub(crate) orphaned: HashSet<BlockId>,
}

impl TaskBlocks {
    pub fn ready_queue(&self) -> impl Iterator<Item = &Block> {
        self.ready_queue.iter()
    }

    pub fn is_ready(&self, block_id: BlockId) -> bool {
        self.ready_queue.iter().any(|b| b.block_id == block_id)
    }

    /// Whether `block_id` has been seen in any state past pending.
    pub fn is_known(&self, block_id: BlockId) -> bool {
        self.is_ready(block_id)
            || self.processing.contains(&block_id)
            || self.completed.contains(&block_id)
            || self.failed.contains(&block_id)
            || self.orphaned.contains(&block_id)
    }

    pub fn processing(&self) -> &HashSet<BlockId> {
        &self.processing
    }

    pub fn completed(&self) -> &HashSet<BlockId> {
        &self.completed
    }

    pub fn failed(&self) -> &HashSet<BlockId> {
        &self.failed
    }

    pub fn orphaned(&self) -> &HashSet<BlockId> {
        &self.orphaned
    }
}
