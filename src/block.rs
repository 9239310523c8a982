// src/block.rs

//! Blocks: the smallest schedulable units of work.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Block identifier, unique within its task.
pub type BlockId = u64;

/// Lifecycle status of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockStatus {
    /// Not yet handed to a worker.
    Pending,
    /// Checked out by a worker.
    Processing,
    /// Finished (or skipped by the pre-check).
    Success,
    /// The worker reported a failure.
    Failed,
}

/// Identity of a block across all tasks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    pub task_id: TaskId,
    pub block_id: BlockId,
}

impl BlockKey {
    pub fn new(task_id: impl Into<TaskId>, block_id: BlockId) -> Self {
        Self {
            task_id: task_id.into(),
            block_id,
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task_id, self.block_id)
    }
}

/// A block together with its mutable status.
///
/// Equality and hashing only consider `(task_id, block_id)`, so a block keeps
/// its identity while its status moves through the lifecycle.
#[derive(Debug, Clone)]
pub struct Block {
    pub task_id: TaskId,
    pub block_id: BlockId,
    pub status: BlockStatus,
}

impl Block {
    /// A fresh `Pending` block.
    pub fn new(task_id: impl Into<TaskId>, block_id: BlockId) -> Self {
        Self {
            task_id: task_id.into(),
            block_id,
            status: BlockStatus::Pending,
        }
    }

    pub fn from_key(key: &BlockKey) -> Self {
        Self::new(key.task_id.clone(), key.block_id)
    }

    pub fn key(&self) -> BlockKey {
        BlockKey::new(self.task_id.clone(), self.block_id)
    }

    /// Whether this block has the given identity.
    pub fn is(&self, key: &BlockKey) -> bool {
        self.task_id == key.task_id && self.block_id == key.block_id
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.task_id == other.task_id && self.block_id == other.block_id
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.task_id.hash(state);
        self.block_id.hash(state);
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task_id, self.block_id)
    }
}
