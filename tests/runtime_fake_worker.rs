// tests/runtime_fake_worker.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use blockwise::dag::Scheduler;
use blockwise::engine::{Assignment, CoreRuntime, Runtime, RuntimeOptions};
use blockwise::errors::SchedulerError;
use blockwise::task::Task;
use blockwise::{run_blockwise, Block, BlockCount, BlockKey, BlockStatus};
use blockwise_test_utils::builders::{pointwise_task, root_task};
use blockwise_test_utils::fake_worker::FakeWorker;
use blockwise_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn options(num_workers: usize) -> RuntimeOptions {
    RuntimeOptions {
        num_workers,
        poll_interval: Duration::from_millis(5),
    }
}

fn position(order: &[BlockKey], key: &BlockKey) -> usize {
    order
        .iter()
        .position(|k| k == key)
        .unwrap_or_else(|| panic!("{key} was never processed"))
}

#[tokio::test]
async fn test_chain_runs_every_block_in_dependency_order() -> TestResult {
    init_tracing();
    let a = root_task("A", 3);
    let b = pointwise_task("B", &a, 3);

    let worker = FakeWorker::new();
    let processed = worker.processed();

    let summary = with_timeout(run_blockwise(&[b], Arc::new(worker), options(1))).await?;

    assert!(summary.is_success());
    assert_eq!(summary.completed_total(), 6);

    let order = processed.lock().unwrap().clone();
    assert_eq!(order.len(), 6);
    for i in 0..3 {
        assert!(position(&order, &BlockKey::new("A", i)) < position(&order, &BlockKey::new("B", i)));
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_block_orphans_downstream_and_run_still_finishes() -> TestResult {
    let a = root_task("A", 3);
    let b = pointwise_task("B", &a, 3);

    let worker = FakeWorker::new().failing(BlockKey::new("A", 1));
    let processed = worker.processed();

    let summary = with_timeout(run_blockwise(&[b], Arc::new(worker), options(2))).await?;

    assert!(!summary.is_success());
    assert_eq!(summary.failed_total(), 1);
    assert_eq!(summary.orphaned_total(), 1);
    assert_eq!(summary.completed_total(), 4);
    assert_eq!(summary.tasks["B"].orphaned_count, 1);

    let order = processed.lock().unwrap().clone();
    assert!(!order.contains(&BlockKey::new("B", 1)));
    Ok(())
}

#[tokio::test]
async fn test_worker_error_counts_as_failure() -> TestResult {
    let a = root_task("A", 2);
    let worker = FakeWorker::new().erroring(BlockKey::new("A", 0));

    let summary = with_timeout(run_blockwise(&[a], Arc::new(worker), options(1))).await?;

    assert_eq!(summary.tasks["A"].failed_count, 1);
    assert_eq!(summary.tasks["A"].completed_count, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_workers_process_each_block_once() -> TestResult {
    let a = root_task("A", 12);
    let b = pointwise_task("B", &a, 12);
    let join = Task::builder("C")
        .requires(&b)
        .block_after(0, (0..12).map(|i| BlockKey::new("B", i)))
        .build();

    let worker = FakeWorker::new().with_delay(Duration::from_millis(2));
    let processed = worker.processed();

    let summary = with_timeout(run_blockwise(&[join], Arc::new(worker), options(4))).await?;
    assert!(summary.is_success());

    let order = processed.lock().unwrap().clone();
    let unique: HashSet<&BlockKey> = order.iter().collect();
    assert_eq!(order.len(), 25);
    assert_eq!(unique.len(), 25);
    assert_eq!(order.last(), Some(&BlockKey::new("C", 0)));
    Ok(())
}

#[tokio::test]
async fn test_pre_checked_blocks_never_reach_a_worker() -> TestResult {
    let a = Task::builder("A")
        .blocks(2)
        .pre_check(|block: &Block| -> anyhow::Result<bool> { Ok(block.block_id == 0) })
        .build();
    let b = pointwise_task("B", &a, 2);

    let worker = FakeWorker::new();
    let processed = worker.processed();

    let summary = with_timeout(run_blockwise(&[b], Arc::new(worker), options(1))).await?;

    assert!(summary.is_success());
    assert_eq!(summary.completed_total(), 4);
    let order = processed.lock().unwrap().clone();
    assert!(!order.contains(&BlockKey::new("A", 0)));
    assert!(order.contains(&BlockKey::new("B", 0)));
    Ok(())
}

#[tokio::test]
async fn test_exhausted_root_source_aborts_run() {
    let a = Task::streamed("A", BlockCount::Finite(3), || -> blockwise::BlockStream {
        Box::new(0..1u64)
    });

    let result = with_timeout(run_blockwise(&[a], Arc::new(FakeWorker::new()), options(2))).await;

    match result {
        Err(SchedulerError::BlockSourceExhausted { task_id, .. }) => assert_eq!(task_id, "A"),
        other => panic!("Expected BlockSourceExhausted, got: {:?}", other),
    }
}

#[test]
fn test_core_runtime_hands_out_wait_and_finished() -> TestResult {
    let a = root_task("A", 1);
    let b = pointwise_task("B", &a, 1);
    let mut core = CoreRuntime::new(Scheduler::new(&[b])?);

    let Assignment::Block(mut a0) = core.next_assignment()? else {
        panic!("expected A/0");
    };
    assert!(a0.is(&BlockKey::new("A", 0)));
    assert_eq!(core.next_assignment()?, Assignment::Wait);

    a0.status = BlockStatus::Success;
    let step = core.report(&a0)?;
    assert!(step.updated_tasks.contains_key("B"));

    let Assignment::Block(mut b0) = core.next_assignment()? else {
        panic!("expected B/0");
    };
    b0.status = BlockStatus::Success;
    core.report(&b0)?;

    assert_eq!(core.next_assignment()?, Assignment::Finished);
    assert!(core.summary().is_success());
    Ok(())
}

#[test]
fn test_core_runtime_finishes_when_skips_unlock_earlier_tasks() -> TestResult {
    // Skipping A/0 unlocks B/0 within the same request.
    let a = Task::builder("A")
        .blocks(1)
        .pre_check(|_block: &Block| -> anyhow::Result<bool> { Ok(true) })
        .build();
    let b = pointwise_task("B", &a, 1);
    let mut core = CoreRuntime::new(Scheduler::new(&[b])?);

    let Assignment::Block(block) = core.next_assignment()? else {
        panic!("expected B/0 after A/0 was skipped");
    };
    assert!(block.is(&BlockKey::new("B", 0)));
    Ok(())
}

#[tokio::test]
async fn test_handle_reports_task_state_and_closes_after_shutdown() -> TestResult {
    let a = root_task("A", 2);
    let (handle, coordinator) = Runtime::spawn(CoreRuntime::new(Scheduler::new(&[a])?));

    let state = handle.task_state("A").await?.expect("A is tracked");
    assert_eq!(state.ready_count, BlockCount::Finite(2));
    assert!(handle.task_state("missing").await?.is_none());

    let Assignment::Block(mut block) = handle.next_assignment().await? else {
        panic!("expected a block");
    };
    block.status = BlockStatus::Success;
    handle.release(block).await?;

    handle.shutdown().await;
    let core = coordinator.await?;
    assert_eq!(core.scheduler().task_state("A").unwrap().completed_count, 1);

    assert!(matches!(
        handle.next_assignment().await,
        Err(SchedulerError::CoordinatorClosed)
    ));
    Ok(())
}
