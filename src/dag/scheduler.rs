use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::block::{Block, BlockKey, BlockStatus, TaskId};
use crate::dag::frontier::CompletionFrontier;
use crate::dag::graph::BlockGraph;
use crate::dag::precheck::PrecheckCache;
use crate::dag::scheduler_step::{ReleaseStep, UpdatedTasks};
use crate::dag::task_state::{TaskBlocks, TaskState};
use crate::errors::{Result, SchedulerError};
use crate::task::{BlockStream, Task};
use crate::types::BlockCount;

/// Everything the scheduler tracks for one task.
struct TrackedTask {
    task: Arc<Task>,
    state: TaskState,
    blocks: TaskBlocks,
    /// Lazy block supply; only root tasks have one.
    source: Option<BlockStream>,
    /// Blocks pulled from `source` so far.
    pulled: u64,
}

/// Scheduler holds the immutable block graph plus all mutable scheduling
/// state.
///
/// It is responsible for:
/// - handing out blocks whose upstream blocks have all completed
/// - skipping blocks the task's pre-check reports as already done
/// - unlocking downstream blocks when a block completes
/// - orphaning everything downstream of a failed block
///
/// There is no internal locking: all calls must come from a single writer
/// (see [`crate::engine::Runtime`]).
pub struct Scheduler {
    graph: BlockGraph,
    tasks: BTreeMap<TaskId, TrackedTask>,
    frontier: CompletionFrontier,
    prechecks: PrecheckCache,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: BTreeMap<&str, &TaskState> = self.task_states().collect();
        f.debug_struct("Scheduler")
            .field("graph", &self.graph)
            .field("states", &states)
            .field("frontier", &self.frontier.len())
            .finish()
    }
}

impl Scheduler {
    /// Build a scheduler over `tasks` and everything they require.
    pub fn new(tasks: &[Arc<Task>]) -> Result<Self> {
        let graph = BlockGraph::from_tasks(tasks)?;
        let mut roots = graph.roots();
        let mut tracked = BTreeMap::new();

        for task in graph.tasks() {
            let task_id = task.task_id().to_string();
            let mut state = TaskState::new(graph.num_blocks(&task_id));
            let mut blocks = TaskBlocks::default();

            let source = match roots.remove(&task_id) {
                Some(root) => {
                    state.ready_count = root.count;
                    Some(root.stream)
                }
                None => {
                    for block_id in graph.entry_blocks(&task_id) {
                        blocks
                            .ready_queue
                            .push_back(Block::new(task_id.clone(), block_id));
                        state.ready_count.increment();
                    }
                    None
                }
            };

            debug!(
                task = %task_id,
                total = %state.total_block_count,
                ready = %state.ready_count,
                root = source.is_some(),
                "tracking task"
            );

            tracked.insert(
                task_id,
                TrackedTask {
                    task: Arc::clone(task),
                    state,
                    blocks,
                    source,
                    pulled: 0,
                },
            );
        }

        info!(tasks = tracked.len(), "scheduler initialised");

        Ok(Self {
            graph,
            tasks: tracked,
            frontier: CompletionFrontier::default(),
            prechecks: PrecheckCache::default(),
        })
    }

    /// Whether `task_id` has a block ready right now.
    ///
    /// For root tasks this pulls at most one block from the lazy source, and
    /// only while `ready_count` says more are expected. A finite source that
    /// runs dry early is an error; an unbounded one simply ends. A pulled id
    /// the task has already seen is rejected with `DuplicateBlock`.
    pub fn has_next(&mut self, task_id: &str) -> Result<bool> {
        let tracked = self.tracked_mut(task_id)?;

        if !tracked.blocks.ready_queue.is_empty() {
            return Ok(true);
        }
        if tracked.state.ready_count.is_zero() {
            return Ok(false);
        }

        match tracked.source.as_mut().and_then(|stream| stream.next()) {
            Some(block_id) if tracked.blocks.is_known(block_id) => {
                Err(SchedulerError::DuplicateBlock(BlockKey::new(task_id, block_id)))
            }
            Some(block_id) => {
                tracked
                    .blocks
                    .ready_queue
                    .push_back(Block::new(task_id, block_id));
                tracked.pulled += 1;
                Ok(true)
            }
            None if tracked.source.is_some()
                && tracked.state.ready_count == BlockCount::Unbounded =>
            {
                debug!(
                    task = %task_id,
                    pulled = tracked.pulled,
                    "unbounded block source exhausted"
                );
                tracked.source = None;
                tracked.state.ready_count = BlockCount::Finite(0);
                tracked.state.total_block_count = BlockCount::Finite(tracked.pulled);
                Ok(false)
            }
            None => Err(SchedulerError::BlockSourceExhausted {
                task_id: task_id.to_string(),
                remaining: tracked.state.ready_count.finite().unwrap_or(0),
            }),
        }
    }

    /// Check out the next ready block of `task_id`, or `None` if nothing is
    /// ready yet.
    ///
    /// Blocks the pre-check reports as done are completed in place (never
    /// returned) and the next ready block is tried.
    pub fn acquire_block(&mut self, task_id: &str) -> Result<Option<Block>> {
        while self.has_next(task_id)? {
            let tracked = self.tracked_mut(task_id)?;
            let Some(mut block) = tracked.blocks.ready_queue.pop_front() else {
                break;
            };
            tracked.state.ready_count.decrement();
            let task = Arc::clone(&tracked.task);

            if self.prechecks.check(&task, &block) {
                debug!(
                    task = %task_id,
                    block = block.block_id,
                    "skipping block; already processed"
                );
                block.status = BlockStatus::Success;
                let updated = self.complete_block(&block.key())?;
                if !updated.is_empty() {
                    debug!(
                        task = %task_id,
                        block = block.block_id,
                        unlocked = ?updated.keys().collect::<Vec<_>>(),
                        "skipped block unlocked downstream work"
                    );
                }
                continue;
            }

            let tracked = self.tracked_mut(task_id)?;
            tracked.state.started = true;
            tracked.blocks.processing.insert(block.block_id);
            tracked.state.processing_count += 1;
            block.status = BlockStatus::Processing;

            debug!(task = %task_id, block = block.block_id, "block acquired");
            return Ok(Some(block));
        }

        Ok(None)
    }

    /// Report the final status of a processing block.
    ///
    /// Returns the tasks that gained ready blocks, with their new state.
    /// A failed block never unlocks anything.
    pub fn release_block(&mut self, block: &Block) -> Result<UpdatedTasks> {
        Ok(self.step_release(block)?.updated_tasks)
    }

    /// Manual-step variant of [`Scheduler::release_block`] that also reports
    /// newly orphaned blocks.
    pub fn step_release(&mut self, block: &Block) -> Result<ReleaseStep> {
        let key = block.key();
        let tracked = self.tracked_mut(&block.task_id)?;

        if !tracked.blocks.processing.contains(&block.block_id) {
            return Err(SchedulerError::BlockNotProcessing(key));
        }

        match block.status {
            BlockStatus::Success => {
                tracked.blocks.processing.remove(&block.block_id);
                tracked.state.processing_count -= 1;
                debug!(task = %key.task_id, block = key.block_id, "block completed");

                let updated_tasks = self.complete_block(&key)?;
                Ok(ReleaseStep {
                    updated_tasks,
                    newly_orphaned: Vec::new(),
                })
            }
            BlockStatus::Failed => {
                tracked.blocks.processing.remove(&block.block_id);
                tracked.blocks.failed.insert(block.block_id);
                tracked.state.processing_count -= 1;
                tracked.state.failed_count += 1;

                let newly_orphaned = self.orphan_downstream(&key);
                warn!(
                    task = %key.task_id,
                    block = key.block_id,
                    orphaned = newly_orphaned.len(),
                    "block failed; orphaned downstream blocks"
                );

                Ok(ReleaseStep {
                    updated_tasks: UpdatedTasks::new(),
                    newly_orphaned,
                })
            }
            status => Err(SchedulerError::InvalidReleaseStatus { block: key, status }),
        }
    }

    /// Read-only view of a task's counters.
    pub fn task_state(&self, task_id: &str) -> Option<&TaskState> {
        self.tasks.get(task_id).map(|t| &t.state)
    }

    /// Counters of every task, ordered by task id.
    pub fn task_states(&self) -> impl Iterator<Item = (&str, &TaskState)> {
        self.tasks.iter().map(|(id, t)| (id.as_str(), &t.state))
    }

    /// Read-only view of a task's block collections.
    pub fn task_blocks(&self, task_id: &str) -> Option<&TaskBlocks> {
        self.tasks.get(task_id).map(|t| &t.blocks)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    pub fn frontier(&self) -> &CompletionFrontier {
        &self.frontier
    }

    pub fn prechecks(&self) -> &PrecheckCache {
        &self.prechecks
    }

    pub fn is_completed(&self, block: &BlockKey) -> bool {
        block_completed(&self.tasks, block)
    }

    /// Blocks currently checked out, across all tasks.
    pub fn processing_total(&self) -> u64 {
        self.tasks.values().map(|t| t.state.processing_count).sum()
    }

    pub fn is_task_done(&self, task_id: &str) -> bool {
        self.task_state(task_id).is_some_and(TaskState::is_done)
    }

    pub fn all_done(&self) -> bool {
        self.tasks.values().all(|t| t.state.is_done())
    }

    fn tracked_mut(&mut self, task_id: &str) -> Result<&mut TrackedTask> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::UnknownTask(task_id.to_string()))
    }

    /// Mark `key` completed, advance the frontier and enqueue whatever became
    /// ready.
    fn complete_block(&mut self, key: &BlockKey) -> Result<UpdatedTasks> {
        let tracked = self.tracked_mut(&key.task_id)?;
        tracked.blocks.completed.insert(key.block_id);
        tracked.state.completed_count += 1;

        let tasks = &self.tasks;
        self.frontier
            .record_completion(&self.graph, key, |block| block_completed(tasks, block));

        Ok(self.propagate_ready(key))
    }

    fn propagate_ready(&mut self, completed: &BlockKey) -> UpdatedTasks {
        let mut updated = UpdatedTasks::new();

        for down in self.graph.downstream(completed) {
            if !self.frontier.covers_upstream(&self.graph, down) {
                continue;
            }
            let Some(tracked) = self.tasks.get_mut(&down.task_id) else {
                warn!(block = %down, "downstream block belongs to an untracked task");
                continue;
            };

            tracked.blocks.ready_queue.push_back(Block::from_key(down));
            tracked.state.ready_count.increment();
            debug!(task = %down.task_id, block = down.block_id, "block ready");
            updated.insert(down.task_id.clone(), tracked.state);
        }

        updated
    }

    /// Breadth-first walk over everything downstream of `failed`, orphaning
    /// each block once.
    fn orphan_downstream(&mut self, failed: &BlockKey) -> Vec<BlockKey> {
        let mut queue: VecDeque<BlockKey> = self.graph.downstream(failed).iter().cloned().collect();
        let mut visited: HashSet<BlockKey> = queue.iter().cloned().collect();
        let mut newly_orphaned = Vec::new();

        while let Some(orphan) = queue.pop_front() {
            let Some(tracked) = self.tasks.get_mut(&orphan.task_id) else {
                continue;
            };
            // Orphaned by an earlier failure, along with its descendants.
            if !tracked.blocks.orphaned.insert(orphan.block_id) {
                continue;
            }
            tracked.state.orphaned_count += 1;
            debug!(task = %orphan.task_id, block = orphan.block_id, "block orphaned");

            for down in self.graph.downstream(&orphan) {
                if visited.insert(down.clone()) {
                    queue.push_back(down.clone());
                }
            }
            newly_orphaned.push(orphan);
        }

        newly_orphaned
    }
}

fn block_completed(tasks: &BTreeMap<TaskId, TrackedTask>, block: &BlockKey) -> bool {
    tasks
        .get(&block.task_id)
        .is_some_and(|t| t.blocks.completed.contains(&block.block_id))
}
