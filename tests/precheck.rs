// tests/precheck.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use blockwise::dag::{PrecheckCache, Scheduler};
use blockwise::errors::Result;
use blockwise::task::Task;
use blockwise::{Block, BlockCount, BlockKey, BlockStatus, BlockStream};
use blockwise_test_utils::builders::pointwise_task;
use blockwise_test_utils::init_tracing;

#[test]
fn test_done_block_is_skipped_and_completed_once() -> Result<()> {
    init_tracing();
    let a = Task::builder("A")
        .blocks(3)
        .pre_check(|block: &Block| -> anyhow::Result<bool> { Ok(block.block_id == 1) })
        .build();
    let mut scheduler = Scheduler::new(&[a])?;

    let first = scheduler.acquire_block("A")?.unwrap();
    assert_eq!(first.block_id, 0);

    // A/1 is skipped in place; A/2 comes out instead.
    let second = scheduler.acquire_block("A")?.unwrap();
    assert_eq!(second.block_id, 2);

    let state = scheduler.task_state("A").unwrap();
    assert_eq!(state.completed_count, 1);
    assert_eq!(state.processing_count, 2);
    assert!(scheduler.is_completed(&BlockKey::new("A", 1)));
    assert!(!scheduler.task_blocks("A").unwrap().processing().contains(&1));
    Ok(())
}

#[test]
fn test_skipped_root_unlocks_downstream() -> Result<()> {
    let a = Task::builder("A")
        .blocks(2)
        .pre_check(|_block: &Block| -> anyhow::Result<bool> { Ok(true) })
        .build();
    let b = pointwise_task("B", &a, 2);
    let mut scheduler = Scheduler::new(&[b])?;

    assert!(scheduler.acquire_block("A")?.is_none());
    assert_eq!(scheduler.task_state("A").unwrap().completed_count, 2);
    assert!(!scheduler.task_state("A").unwrap().started);

    let b0 = scheduler.acquire_block("B")?.unwrap();
    let b1 = scheduler.acquire_block("B")?.unwrap();
    assert_eq!((b0.block_id, b1.block_id), (0, 1));
    Ok(())
}

#[test]
fn test_failing_pre_check_does_not_skip() -> Result<()> {
    let a = Task::builder("A")
        .blocks(1)
        .pre_check(|_block: &Block| -> anyhow::Result<bool> {
            anyhow::bail!("status store unreachable")
        })
        .build();
    let mut scheduler = Scheduler::new(&[a])?;

    let block = scheduler.acquire_block("A")?.expect("block must still be dispatched");
    assert_eq!(block.status, BlockStatus::Processing);
    assert_eq!(scheduler.task_state("A").unwrap().completed_count, 0);
    assert_eq!(
        scheduler.prechecks().cached("A"),
        Some((&BlockKey::new("A", 0), false))
    );
    Ok(())
}

#[test]
fn test_cache_remembers_only_last_block_per_task() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let task = Task::builder("A")
        .blocks(2)
        .pre_check(move |block: &Block| -> anyhow::Result<bool> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(block.block_id == 0)
        })
        .build();

    let mut cache = PrecheckCache::default();
    let b0 = Block::new("A", 0);
    let b1 = Block::new("A", 1);

    assert!(cache.check(&task, &b0));
    assert!(cache.check(&task, &b0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(!cache.check(&task, &b1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Capacity one: going back to A/0 asks again.
    assert!(cache.check(&task, &b0));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_streamed_root_with_pre_check() -> Result<()> {
    let source = || -> BlockStream { Box::new(0..4u64) };
    let a = Task::streamed_with_pre_check(
        "A",
        BlockCount::Finite(4),
        source,
        |block: &Block| -> anyhow::Result<bool> { Ok(block.block_id % 2 == 0) },
    );
    let mut scheduler = Scheduler::new(&[a])?;

    let mut dispatched = Vec::new();
    while let Some(block) = scheduler.acquire_block("A")? {
        dispatched.push(block.block_id);
    }

    assert_eq!(dispatched, vec![1, 3]);
    let state = scheduler.task_state("A").unwrap();
    assert_eq!(state.completed_count, 2);
    assert_eq!(state.ready_count, BlockCount::Finite(0));
    Ok(())
}
