#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use blockwise::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use blockwise::task::Task;
use blockwise::types::BlockLink;
use blockwise::BlockKey;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.config.config.num_workers = num_workers;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str, blocks: u64) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                check: None,
                blocks,
                after: vec![],
                link: BlockLink::Pointwise,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn link(mut self, link: BlockLink) -> Self {
        self.task.link = link;
        self
    }

    pub fn check(mut self, cmd: &str) -> Self {
        self.task.check = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// A root task with blocks `0..blocks`.
pub fn root_task(id: &str, blocks: u64) -> Arc<Task> {
    Task::builder(id).blocks(blocks).build()
}

/// A task whose block `i` waits for block `i` of `upstream`.
pub fn pointwise_task(id: &str, upstream: &Arc<Task>, blocks: u64) -> Arc<Task> {
    let mut builder = Task::builder(id).requires(upstream);
    for block_id in 0..blocks {
        builder = builder.block_after(block_id, [BlockKey::new(upstream.task_id(), block_id)]);
    }
    builder.build()
}

/// A task with a single block waiting for every listed upstream block.
pub fn join_task(id: &str, upstream: &[&Arc<Task>], keys: &[BlockKey]) -> Arc<Task> {
    let mut builder = Task::builder(id);
    for task in upstream {
        builder = builder.requires(task);
    }
    builder.block_after(0, keys.iter().cloned()).build()
}
