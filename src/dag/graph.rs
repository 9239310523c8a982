// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::block::{BlockId, BlockKey, TaskId};
use crate::errors::{Result, SchedulerError};
use crate::task::{BlockLayout, BlockStream, Task};
use crate::types::BlockCount;

/// Block supply of a root task: its declared count and a fresh stream.
pub struct RootBlocks {
    pub count: BlockCount,
    pub stream: BlockStream,
}

impl fmt::Debug for RootBlocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootBlocks")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

/// Internal node structure: stores immediate upstream and downstream blocks.
#[derive(Debug, Clone, Default)]
struct BlockNode {
    upstream: Vec<BlockKey>,
    downstream: Vec<BlockKey>,
}

/// Immutable block-level dependency graph spanning every task.
///
/// Built once from the supplied tasks (plus everything they transitively
/// require) and only queried afterwards, so it can be shared freely between
/// readers.
pub struct BlockGraph {
    tasks: BTreeMap<TaskId, Arc<Task>>,
    /// Task ids with upstream tasks first.
    task_order: Vec<TaskId>,
    nodes: HashMap<BlockKey, BlockNode>,
    roots: BTreeSet<TaskId>,
}

impl fmt::Debug for BlockGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockGraph")
            .field("task_order", &self.task_order)
            .field("roots", &self.roots)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl BlockGraph {
    /// Build the graph over `tasks` and their transitive requirements.
    ///
    /// Fails on unknown or unrequired upstream references, duplicate task or
    /// block ids, and cycles.
    pub fn from_tasks(tasks: &[Arc<Task>]) -> Result<Self> {
        let tasks = collect_tasks(tasks)?;
        let mut nodes: HashMap<BlockKey, BlockNode> = HashMap::new();

        // First pass: one node per declared block.
        let mut declared: HashMap<&str, HashSet<BlockId>> = HashMap::new();
        for (task_id, task) in tasks.iter() {
            if let BlockLayout::Listed(blocks) = task.layout() {
                let ids = declared.entry(task_id.as_str()).or_default();
                for spec in blocks {
                    let key = BlockKey::new(task_id.clone(), spec.block_id);
                    if !ids.insert(spec.block_id) {
                        return Err(SchedulerError::DuplicateBlock(key));
                    }
                    nodes.insert(key, BlockNode::default());
                }
            }
        }

        // Second pass: validate and record edges in both directions.
        for (task_id, task) in tasks.iter() {
            let BlockLayout::Listed(blocks) = task.layout() else {
                continue;
            };
            let required = task.required_ids();

            for spec in blocks {
                let key = BlockKey::new(task_id.clone(), spec.block_id);
                let mut seen = HashSet::new();

                for up in spec.upstream.iter() {
                    if !seen.insert(up) {
                        continue;
                    }
                    if up.task_id != *task_id && !required.contains(up.task_id.as_str()) {
                        return Err(SchedulerError::UnknownDependency {
                            block: key,
                            upstream: up.clone(),
                        });
                    }
                    // Blocks of streamed tasks are not known up front.
                    if let Some(ids) = declared.get(up.task_id.as_str()) {
                        if !ids.contains(&up.block_id) {
                            return Err(SchedulerError::UnknownBlock {
                                block: key,
                                upstream: up.clone(),
                            });
                        }
                    }

                    nodes
                        .entry(key.clone())
                        .or_default()
                        .upstream
                        .push(up.clone());
                    nodes
                        .entry(up.clone())
                        .or_default()
                        .downstream
                        .push(key.clone());
                }
            }
        }

        ensure_acyclic(&nodes)?;

        let roots = tasks
            .iter()
            .filter(|(_, task)| match task.layout() {
                BlockLayout::Streamed { .. } => true,
                BlockLayout::Listed(blocks) => blocks.iter().all(|b| b.upstream.is_empty()),
            })
            .map(|(id, _)| id.clone())
            .collect();

        let task_order = order_tasks(&tasks)?;

        Ok(Self {
            tasks,
            task_order,
            nodes,
            roots,
        })
    }

    /// Root tasks (no upstream blocks) with their block supply.
    ///
    /// Every call opens fresh streams.
    pub fn roots(&self) -> BTreeMap<TaskId, RootBlocks> {
        self.roots
            .iter()
            .filter_map(|id| {
                let task = self.tasks.get(id)?;
                let root = match task.layout() {
                    BlockLayout::Listed(blocks) => {
                        let ids: Vec<BlockId> = blocks.iter().map(|b| b.block_id).collect();
                        RootBlocks {
                            count: BlockCount::Finite(ids.len() as u64),
                            stream: Box::new(ids.into_iter()),
                        }
                    }
                    BlockLayout::Streamed { count, source } => RootBlocks {
                        count: *count,
                        stream: source.open(),
                    },
                };
                Some((id.clone(), root))
            })
            .collect()
    }

    pub fn is_root(&self, task_id: &str) -> bool {
        self.roots.contains(task_id)
    }

    /// Total number of blocks of a task. Unknown tasks have none.
    pub fn num_blocks(&self, task_id: &str) -> BlockCount {
        match self.tasks.get(task_id).map(|t| t.layout()) {
            Some(BlockLayout::Listed(blocks)) => BlockCount::Finite(blocks.len() as u64),
            Some(BlockLayout::Streamed { count, .. }) => *count,
            None => BlockCount::Finite(0),
        }
    }

    /// Immediate upstream blocks of `block`.
    pub fn upstream(&self, block: &BlockKey) -> &[BlockKey] {
        self.nodes
            .get(block)
            .map(|n| n.upstream.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate downstream blocks of `block`.
    pub fn downstream(&self, block: &BlockKey) -> &[BlockKey] {
        self.nodes
            .get(block)
            .map(|n| n.downstream.as_slice())
            .unwrap_or(&[])
    }

    /// Blocks of a non-root listed task that wait for nothing.
    ///
    /// These are ready as soon as the scheduler starts.
    pub fn entry_blocks(&self, task_id: &str) -> Vec<BlockId> {
        if self.is_root(task_id) {
            return Vec::new();
        }
        match self.tasks.get(task_id).map(|t| t.layout()) {
            Some(BlockLayout::Listed(blocks)) => blocks
                .iter()
                .filter(|b| b.upstream.is_empty())
                .map(|b| b.block_id)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Arc<Task>> {
        self.tasks.get(task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.tasks.values()
    }

    /// Task ids ordered so that required tasks come first.
    pub fn task_order(&self) -> &[TaskId] {
        &self.task_order
    }
}

/// Gather `tasks` and everything they transitively require, keyed by id.
fn collect_tasks(tasks: &[Arc<Task>]) -> Result<BTreeMap<TaskId, Arc<Task>>> {
    let mut collected: BTreeMap<TaskId, Arc<Task>> = BTreeMap::new();
    let mut stack: Vec<Arc<Task>> = tasks.to_vec();

    while let Some(task) = stack.pop() {
        if let Some(existing) = collected.get(task.task_id()) {
            if !Arc::ptr_eq(existing, &task) {
                return Err(SchedulerError::DuplicateTask(task.task_id().to_string()));
            }
            continue;
        }
        stack.extend(task.requires().iter().cloned());
        collected.insert(task.task_id().to_string(), task);
    }

    Ok(collected)
}

fn ensure_acyclic(nodes: &HashMap<BlockKey, BlockNode>) -> Result<()> {
    // Edge direction: upstream -> block.
    let mut graph: DiGraphMap<&BlockKey, ()> = DiGraphMap::new();

    for (key, node) in nodes.iter() {
        graph.add_node(key);
        for up in node.upstream.iter() {
            graph.add_edge(up, key, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SchedulerError::DagCycle(format!(
            "cycle detected in block DAG involving block '{}'",
            cycle.node_id()
        ))),
    }
}

fn order_tasks(tasks: &BTreeMap<TaskId, Arc<Task>>) -> Result<Vec<TaskId>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for (name, task) in tasks.iter() {
        graph.add_node(name.as_str());
        for dep in task.requires() {
            graph.add_edge(dep.task_id(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(SchedulerError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}
