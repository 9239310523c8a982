// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::block::{BlockKey, BlockStatus};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cycle detected in block DAG: {0}")]
    DagCycle(String),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("task '{0}' was supplied twice as different task objects")]
    DuplicateTask(String),

    #[error("block {0} is declared or produced more than once")]
    DuplicateBlock(BlockKey),

    #[error("block {block} depends on {upstream}, whose task is not required")]
    UnknownDependency { block: BlockKey, upstream: BlockKey },

    #[error("block {block} depends on {upstream}, which does not exist")]
    UnknownBlock { block: BlockKey, upstream: BlockKey },

    #[error("block {0} was released but is not currently processing")]
    BlockNotProcessing(BlockKey),

    #[error("block {block} was released with status {status:?}; expected Success or Failed")]
    InvalidReleaseStatus { block: BlockKey, status: BlockStatus },

    #[error(
        "task '{task_id}' expected {remaining} more ready block(s) but its block source is exhausted"
    )]
    BlockSourceExhausted { task_id: String, remaining: u64 },

    #[error("the scheduler coordinator is no longer running")]
    CoordinatorClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedulerError>;
