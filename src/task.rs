// src/task.rs

//! Task definitions handed to the scheduler.
//!
//! A [`Task`] names a unit of computation, the tasks it requires, how its
//! blocks are laid out (an explicit list with per-block upstream edges, or a
//! lazily produced root stream), and an optional [`PreCheck`] used to skip
//! blocks whose work is already done.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::block::{Block, BlockId, BlockKey, TaskId};
use crate::types::BlockCount;

/// Pull-based supply of root block ids. `None` means exhausted.
pub type BlockStream = Box<dyn Iterator<Item = BlockId> + Send>;

/// Opens a fresh [`BlockStream`] for a streamed root task.
pub trait BlockSource: Send + Sync {
    fn open(&self) -> BlockStream;
}

impl<F> BlockSource for F
where
    F: Fn() -> BlockStream + Send + Sync,
{
    fn open(&self) -> BlockStream {
        self()
    }
}

/// Idempotency probe: reports whether a block's work is already done.
///
/// Errors are tolerated by the scheduler and treated as "not done".
pub trait PreCheck: Send + Sync {
    fn pre_check(&self, block: &Block) -> anyhow::Result<bool>;
}

impl<F> PreCheck for F
where
    F: Fn(&Block) -> anyhow::Result<bool> + Send + Sync,
{
    fn pre_check(&self, block: &Block) -> anyhow::Result<bool> {
        self(block)
    }
}

/// One explicitly declared block and the blocks it waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub block_id: BlockId,
    pub upstream: Vec<BlockKey>,
}

/// How a task's blocks come into existence.
pub enum BlockLayout {
    /// All blocks known up front, with their upstream edges.
    Listed(Vec<BlockSpec>),
    /// A root task whose blocks are produced lazily.
    Streamed {
        count: BlockCount,
        source: Arc<dyn BlockSource>,
    },
}

impl fmt::Debug for BlockLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLayout::Listed(blocks) => f.debug_tuple("Listed").field(blocks).finish(),
            BlockLayout::Streamed { count, .. } => f
                .debug_struct("Streamed")
                .field("count", count)
                .finish_non_exhaustive(),
        }
    }
}

pub struct Task {
    task_id: TaskId,
    requires: Vec<Arc<Task>>,
    layout: BlockLayout,
    pre_check: Option<Arc<dyn PreCheck>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requires: Vec<&str> = self.requires.iter().map(|t| t.task_id()).collect();
        f.debug_struct("Task")
            .field("task_id", &self.task_id)
            .field("requires", &requires)
            .field("layout", &self.layout)
            .field("pre_check", &self.pre_check.is_some())
            .finish()
    }
}

impl Task {
    /// Start building a task with an explicit block list.
    pub fn builder(task_id: impl Into<TaskId>) -> TaskBuilder {
        TaskBuilder {
            task_id: task_id.into(),
            requires: Vec::new(),
            blocks: Vec::new(),
            pre_check: None,
        }
    }

    /// A root task whose blocks are pulled lazily from `source`.
    pub fn streamed(
        task_id: impl Into<TaskId>,
        count: BlockCount,
        source: impl BlockSource + 'static,
    ) -> Arc<Task> {
        Arc::new(Task {
            task_id: task_id.into(),
            requires: Vec::new(),
            layout: BlockLayout::Streamed {
                count,
                source: Arc::new(source),
            },
            pre_check: None,
        })
    }

    /// Same as [`Task::streamed`], with a pre-check.
    pub fn streamed_with_pre_check(
        task_id: impl Into<TaskId>,
        count: BlockCount,
        source: impl BlockSource + 'static,
        pre_check: impl PreCheck + 'static,
    ) -> Arc<Task> {
        Arc::new(Task {
            task_id: task_id.into(),
            requires: Vec::new(),
            layout: BlockLayout::Streamed {
                count,
                source: Arc::new(source),
            },
            pre_check: Some(Arc::new(pre_check)),
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Upstream tasks this task directly requires.
    pub fn requires(&self) -> &[Arc<Task>] {
        &self.requires
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Ids of directly required tasks.
    pub fn required_ids(&self) -> BTreeSet<&str> {
        self.requires.iter().map(|t| t.task_id()).collect()
    }

    /// Run the task's pre-check. Tasks without one never skip.
    pub fn pre_check(&self, block: &Block) -> anyhow::Result<bool> {
        match &self.pre_check {
            Some(check) => check.pre_check(block),
            None => Ok(false),
        }
    }
}

/// Builder for listed tasks.
pub struct TaskBuilder {
    task_id: TaskId,
    requires: Vec<Arc<Task>>,
    blocks: Vec<BlockSpec>,
    pre_check: Option<Arc<dyn PreCheck>>,
}

impl TaskBuilder {
    pub fn requires(mut self, task: &Arc<Task>) -> Self {
        self.requires.push(Arc::clone(task));
        self
    }

    /// Add a block with no upstream edges.
    pub fn block(mut self, block_id: BlockId) -> Self {
        self.blocks.push(BlockSpec {
            block_id,
            upstream: Vec::new(),
        });
        self
    }

    /// Add blocks `0..count` with no upstream edges.
    pub fn blocks(mut self, count: u64) -> Self {
        for block_id in 0..count {
            self = self.block(block_id);
        }
        self
    }

    /// Add a block that waits for the given upstream blocks.
    pub fn block_after<I>(mut self, block_id: BlockId, upstream: I) -> Self
    where
        I: IntoIterator<Item = BlockKey>,
    {
        self.blocks.push(BlockSpec {
            block_id,
            upstream: upstream.into_iter().collect(),
        });
        self
    }

    pub fn pre_check(mut self, check: impl PreCheck + 'static) -> Self {
        self.pre_check = Some(Arc::new(check));
        self
    }

    pub fn build(self) -> Arc<Task> {
        Arc::new(Task {
            task_id: self.task_id,
            requires: self.requires,
            layout: BlockLayout::Listed(self.blocks),
            pre_check: self.pre_check,
        })
    }
}
