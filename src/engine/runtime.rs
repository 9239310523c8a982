// src/engine/runtime.rs

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::block::Block;
use crate::dag::{ReleaseStep, TaskState};
use crate::errors::{Result, SchedulerError};

use super::core::CoreRuntime;
use super::{Assignment, CoordinatorRequest};

/// The single writer of scheduler state.
///
/// Owns the [`CoreRuntime`] and serves [`CoordinatorRequest`]s one at a
/// time, so every acquire/release appears atomic to the workers. It runs on
/// a blocking thread because task pre-checks are allowed to block.
#[derive(Debug)]
pub struct Runtime {
    core: CoreRuntime,
    request_rx: mpsc::Receiver<CoordinatorRequest>,
}

impl Runtime {
    pub fn new(core: CoreRuntime, request_rx: mpsc::Receiver<CoordinatorRequest>) -> Self {
        Self { core, request_rx }
    }

    /// Spawn the coordinator on a blocking thread.
    ///
    /// The join handle yields the core back once the coordinator stops, so
    /// the caller can read the final state.
    pub fn spawn(core: CoreRuntime) -> (SchedulerHandle, JoinHandle<CoreRuntime>) {
        let (tx, rx) = mpsc::channel::<CoordinatorRequest>(64);
        let runtime = Runtime::new(core, rx);
        let join = tokio::task::spawn_blocking(move || runtime.run_blocking());
        (SchedulerHandle { tx }, join)
    }

    /// Main request loop.
    ///
    /// Stops on [`CoordinatorRequest::Shutdown`] or once every handle has
    /// been dropped.
    pub fn run_blocking(mut self) -> CoreRuntime {
        info!("coordinator started");

        while let Some(request) = self.request_rx.blocking_recv() {
            match request {
                CoordinatorRequest::NextAssignment { reply } => {
                    let _ = reply.send(self.core.next_assignment());
                }
                CoordinatorRequest::Release { block, reply } => {
                    let _ = reply.send(self.core.report(&block));
                }
                CoordinatorRequest::TaskState { task, reply } => {
                    let _ = reply.send(self.core.scheduler().task_state(&task).copied());
                }
                CoordinatorRequest::Shutdown => {
                    debug!("shutdown requested");
                    break;
                }
            }
        }

        info!("coordinator exiting");
        self.core
    }
}

/// Cloneable client for the coordinator; the only way workers reach the
/// scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<CoordinatorRequest>,
}

impl SchedulerHandle {
    pub async fn next_assignment(&self) -> Result<Assignment> {
        self.request(|reply| CoordinatorRequest::NextAssignment { reply })
            .await?
    }

    /// Release a block carrying its final status.
    pub async fn release(&self, block: Block) -> Result<ReleaseStep> {
        self.request(|reply| CoordinatorRequest::Release { block, reply })
            .await?
    }

    pub async fn task_state(&self, task: &str) -> Result<Option<TaskState>> {
        let task = task.to_string();
        self.request(|reply| CoordinatorRequest::TaskState { task, reply })
            .await
    }

    /// Ask the coordinator to stop. Succeeds if it has already stopped.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(CoordinatorRequest::Shutdown).await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> CoordinatorRequest,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SchedulerError::CoordinatorClosed)?;
        rx.await.map_err(|_| SchedulerError::CoordinatorClosed)
    }
}
