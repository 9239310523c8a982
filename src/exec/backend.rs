// src/exec/backend.rs

//! Pluggable block worker abstraction.
//!
//! The worker loops talk to a `BlockWorker` instead of spawning processes
//! directly. This makes it easy to swap in a fake worker in tests while
//! keeping the production implementation in [`super::task_runner`].

use std::future::Future;
use std::pin::Pin;

use crate::block::Block;
use crate::engine::BlockOutcome;

/// Trait abstracting how a block's work is executed.
///
/// Production code uses [`super::CommandWorker`]; tests can provide their own
/// implementation that records blocks and picks outcomes.
pub trait BlockWorker: Send + Sync {
    /// Do the work for `block` and report how it went.
    ///
    /// An `Err` means the work could not be carried out at all; the worker
    /// loop releases the block as failed.
    fn process<'a>(
        &'a self,
        block: &'a Block,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BlockOutcome>> + Send + 'a>>;
}
