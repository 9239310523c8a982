// src/config/model.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::Deserialize;

use crate::block::{BlockKey, TaskId};
use crate::engine::RuntimeOptions;
use crate::errors::{Result, SchedulerError};
use crate::exec::command_pre_check;
use crate::task::Task;
use crate::types::BlockLink;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// num_workers = 4
///
/// [task.extract]
/// cmd = "extract --block $BLOCKWISE_BLOCK_ID"
/// blocks = 8
///
/// [task.predict]
/// cmd = "predict --block $BLOCKWISE_BLOCK_ID"
/// blocks = 8
/// after = ["extract"]
/// ```
///
/// This is the unvalidated form; convert it into a [`ConfigFile`] with
/// `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration: known dependencies, no cycles, consistent
/// block counts.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Number of blocks processed concurrently.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// How long an idle worker waits before asking for work again.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_num_workers() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Command run once per block, with `BLOCKWISE_TASK_ID` and
    /// `BLOCKWISE_BLOCK_ID` set.
    pub cmd: String,

    /// Optional pre-check command; exit status 0 marks the block as already
    /// done, so it is skipped.
    #[serde(default)]
    pub check: Option<String>,

    /// Number of blocks; ids run from `0` to `blocks - 1`.
    pub blocks: u64,

    /// Tasks whose blocks this task waits for.
    #[serde(default)]
    pub after: Vec<String>,

    /// How this task's blocks map onto the blocks of the tasks in `after`.
    #[serde(default)]
    pub link: BlockLink,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            num_workers: self.config.num_workers,
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
        }
    }

    /// Shell command per task, for [`crate::exec::CommandWorker`].
    pub fn commands(&self) -> impl Iterator<Item = (TaskId, String)> + '_ {
        self.task
            .iter()
            .map(|(name, task)| (name.clone(), task.cmd.clone()))
    }

    /// Build scheduler tasks, expanding each task's `link` into block edges.
    ///
    /// Tasks are built upstream first so every `after` entry can be
    /// required by reference.
    pub fn build_tasks(&self) -> Result<Vec<Arc<Task>>> {
        let mut built: HashMap<&str, Arc<Task>> = HashMap::new();
        let mut tasks = Vec::with_capacity(self.task.len());

        for name in self.topological_order()? {
            let Some(cfg) = self.task.get(name) else {
                return Err(SchedulerError::UnknownTask(name.to_string()));
            };
            let mut builder = Task::builder(name);

            for dep in cfg.after.iter() {
                let upstream = built
                    .get(dep.as_str())
                    .ok_or_else(|| SchedulerError::UnknownTask(dep.clone()))?;
                builder = builder.requires(upstream);
            }

            for block_id in 0..cfg.blocks {
                let mut upstream = Vec::new();
                for dep in cfg.after.iter() {
                    match cfg.link {
                        BlockLink::Pointwise => upstream.push(BlockKey::new(dep.clone(), block_id)),
                        BlockLink::All => {
                            let dep_blocks = self.task.get(dep).map(|t| t.blocks).unwrap_or(0);
                            upstream.extend((0..dep_blocks).map(|b| BlockKey::new(dep.clone(), b)));
                        }
                    }
                }
                builder = builder.block_after(block_id, upstream);
            }

            if let Some(check) = cfg.check.as_ref() {
                builder = builder.pre_check(command_pre_check(check.clone()));
            }

            let task = builder.build();
            built.insert(name, Arc::clone(&task));
            tasks.push(task);
        }

        Ok(tasks)
    }

    /// Task names with every task after the tasks it depends on.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        task_order(&self.task)
    }
}

/// Order task names so that `after` dependencies come first.
///
/// Edge direction: dep -> task. For
///   [task.B]
///   after = ["A"]
/// we add edge A -> B.
pub(crate) fn task_order(tasks: &BTreeMap<String, TaskConfig>) -> Result<Vec<&str>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in tasks.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    toposort(&graph, None).map_err(|cycle| {
        SchedulerError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))
    })
}
