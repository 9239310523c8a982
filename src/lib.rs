// src/lib.rs

pub mod block;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod task;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, RunSummary, Runtime, RuntimeOptions};
use crate::errors::SchedulerError;
use crate::exec::{spawn_workers, BlockWorker, CommandWorker};
use crate::task::Task;

pub use crate::block::{Block, BlockId, BlockKey, BlockStatus, TaskId};
pub use crate::task::{BlockLayout, BlockSource, BlockSpec, BlockStream, PreCheck, TaskBuilder};
pub use crate::types::BlockCount;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - task construction
/// - scheduler / coordinator / worker pool
/// - the final summary
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let mut options = cfg.runtime_options();
    if let Some(workers) = args.workers {
        options.num_workers = workers.max(1);
    }

    let tasks = cfg.build_tasks()?;
    let worker = Arc::new(CommandWorker::new(cfg.commands()));

    let summary = run_blockwise(&tasks, worker, options).await?;
    print_summary(&summary);

    if !summary.is_success() {
        bail!(
            "run incomplete: {} block(s) failed, {} orphaned",
            summary.failed_total(),
            summary.orphaned_total()
        );
    }
    Ok(())
}

/// Schedule `tasks` (and everything they require) across a pool of workers
/// until no block can make further progress.
///
/// A failed block does not make this return an error; it shows up in the
/// summary's failed and orphaned counts. Errors are reserved for scheduler
/// misuse and internal invariant violations.
pub async fn run_blockwise(
    tasks: &[Arc<Task>],
    worker: Arc<dyn BlockWorker>,
    options: RuntimeOptions,
) -> errors::Result<RunSummary> {
    let scheduler = Scheduler::new(tasks)?;
    info!(
        tasks = scheduler.task_ids().count(),
        workers = options.num_workers,
        "starting blockwise run"
    );

    let (handle, coordinator) = Runtime::spawn(CoreRuntime::new(scheduler));
    let workers = spawn_workers(&handle, worker, &options);

    let mut first_error: Option<SchedulerError> = None;
    for joined in workers {
        let err = match joined.await {
            Ok(Ok(processed)) => {
                debug!(processed, "worker joined");
                continue;
            }
            Ok(Err(err)) => err,
            Err(join_err) => SchedulerError::Other(join_err.into()),
        };
        // Workers stopped by another worker's failure only report the closed
        // coordinator; keep the root cause.
        let keep = match &first_error {
            None => true,
            Some(SchedulerError::CoordinatorClosed) => {
                !matches!(err, SchedulerError::CoordinatorClosed)
            }
            Some(_) => false,
        };
        if keep {
            first_error = Some(err);
        }
    }

    handle.shutdown().await;
    drop(handle);
    let core = coordinator
        .await
        .map_err(|e| SchedulerError::Other(e.into()))?;

    if let Some(err) = first_error {
        return Err(err);
    }

    let summary = core.summary();
    if summary.is_success() {
        info!(completed = summary.completed_total(), "blockwise run finished");
    } else {
        warn!(
            completed = summary.completed_total(),
            failed = summary.failed_total(),
            orphaned = summary.orphaned_total(),
            "blockwise run finished with failures"
        );
    }
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("blockwise summary");
    for (task, state) in summary.tasks.iter() {
        println!(
            "  {task}: {} completed, {} failed, {} orphaned of {}",
            state.completed_count, state.failed_count, state.orphaned_count, state.total_block_count
        );
    }
}

/// Simple dry-run output: print tasks, blocks, deps and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("blockwise dry-run");
    println!("  config.num_workers = {}", cfg.config.num_workers);
    println!("  config.poll_interval_ms = {}", cfg.config.poll_interval_ms);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        println!("      blocks: {}", task.blocks);
        if !task.after.is_empty() {
            println!("      after: {:?} ({:?})", task.after, task.link);
        }
        if let Some(ref check) = task.check {
            println!("      check: {check}");
        }
    }

    debug!("dry-run complete (no execution)");
}
