// src/exec/executor_loop.rs

//! Worker loops that pull blocks from the coordinator and run them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::{Assignment, BlockOutcome, RuntimeOptions, SchedulerHandle};
use crate::errors::{Result, SchedulerError};
use crate::exec::BlockWorker;

/// Spawn `options.num_workers` worker loops (at least one).
///
/// Each join handle yields the number of blocks that worker processed.
pub fn spawn_workers(
    handle: &SchedulerHandle,
    worker: Arc<dyn BlockWorker>,
    options: &RuntimeOptions,
) -> Vec<JoinHandle<Result<u64>>> {
    (0..options.num_workers.max(1))
        .map(|id| {
            let handle = handle.clone();
            let worker = Arc::clone(&worker);
            let poll_interval = options.poll_interval;
            tokio::spawn(async move { worker_loop(id, handle, worker, poll_interval).await })
        })
        .collect()
}

/// Pull, process and release blocks until the coordinator reports the run
/// finished.
///
/// A scheduler error stops the whole run: the coordinator is shut down so
/// that the other workers stop too, and the error is returned.
pub async fn worker_loop(
    id: usize,
    handle: SchedulerHandle,
    worker: Arc<dyn BlockWorker>,
    poll_interval: Duration,
) -> Result<u64> {
    debug!(worker = id, "worker started");
    let mut processed = 0;

    loop {
        let assignment = match handle.next_assignment().await {
            Ok(assignment) => assignment,
            Err(err) => return Err(stop_run(&handle, id, err).await),
        };

        let mut block = match assignment {
            Assignment::Block(block) => block,
            Assignment::Wait => {
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            Assignment::Finished => break,
        };

        let outcome = match worker.process(&block).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    worker = id,
                    task = %block.task_id,
                    block = block.block_id,
                    error = %err,
                    "block execution error"
                );
                BlockOutcome::Failed(-1)
            }
        };

        block.status = outcome.status();
        if let Err(err) = handle.release(block).await {
            return Err(stop_run(&handle, id, err).await);
        }
        processed += 1;
    }

    info!(worker = id, processed, "worker finished");
    Ok(processed)
}

async fn stop_run(handle: &SchedulerHandle, id: usize, err: SchedulerError) -> SchedulerError {
    error!(worker = id, error = %err, "scheduler error; stopping run");
    handle.shutdown().await;
    err
}
