// tests/scheduler_scenarios.rs

use std::sync::Arc;

use blockwise::dag::Scheduler;
use blockwise::errors::Result;
use blockwise::task::Task;
use blockwise::{Block, BlockCount, BlockKey, BlockStatus};
use blockwise_test_utils::builders::{pointwise_task, root_task};
use blockwise_test_utils::init_tracing;

/// A (2 root blocks) -> B (1 block waiting on both A blocks) -> C (1 block).
fn chain_abc() -> Vec<Arc<Task>> {
    let a = root_task("A", 2);
    let b = Task::builder("B")
        .requires(&a)
        .block_after(0, [BlockKey::new("A", 0), BlockKey::new("A", 1)])
        .build();
    let c = Task::builder("C")
        .requires(&b)
        .block_after(0, [BlockKey::new("B", 0)])
        .build();
    vec![c]
}

fn succeed(mut block: Block) -> Block {
    block.status = BlockStatus::Success;
    block
}

#[test]
fn test_chain_unlocks_downstream_only_after_last_upstream() -> Result<()> {
    init_tracing();
    // Only C is supplied; A and B come in through `requires`.
    let mut scheduler = Scheduler::new(&chain_abc())?;
    assert_eq!(scheduler.task_ids().collect::<Vec<_>>(), vec!["A", "B", "C"]);

    let a0 = scheduler.acquire_block("A")?.expect("A/0 should be ready");
    let a1 = scheduler.acquire_block("A")?.expect("A/1 should be ready");
    assert_eq!(a0.status, BlockStatus::Processing);
    assert_eq!((a0.block_id, a1.block_id), (0, 1));
    assert!(scheduler.acquire_block("A")?.is_none());
    assert!(scheduler.acquire_block("B")?.is_none());

    let updated = scheduler.release_block(&succeed(a0))?;
    assert!(updated.is_empty(), "B still waits for A/1");
    assert!(scheduler.acquire_block("B")?.is_none());

    let updated = scheduler.release_block(&succeed(a1))?;
    assert_eq!(updated.keys().collect::<Vec<_>>(), vec!["B"]);
    assert_eq!(updated["B"].ready_count, BlockCount::Finite(1));

    let b0 = scheduler.acquire_block("B")?.expect("B/0 should be ready");
    let updated = scheduler.release_block(&succeed(b0))?;
    assert_eq!(updated.keys().collect::<Vec<_>>(), vec!["C"]);

    let c0 = scheduler.acquire_block("C")?.expect("C/0 should be ready");
    let updated = scheduler.release_block(&succeed(c0))?;
    assert!(updated.is_empty());

    assert!(scheduler.all_done());
    assert!(scheduler.frontier().is_empty());
    Ok(())
}

#[test]
fn test_task_state_counters_follow_block_lifecycle() -> Result<()> {
    let a = root_task("A", 3);
    let mut scheduler = Scheduler::new(&[a])?;

    let initial = *scheduler.task_state("A").unwrap();
    assert!(!initial.started);
    assert_eq!(initial.ready_count, BlockCount::Finite(3));
    assert_eq!(initial.total_block_count, BlockCount::Finite(3));

    let first = scheduler.acquire_block("A")?.unwrap();
    let state = *scheduler.task_state("A").unwrap();
    assert!(state.started);
    assert_eq!(state.processing_count, 1);
    assert_eq!(state.ready_count, BlockCount::Finite(2));
    assert!(scheduler.task_blocks("A").unwrap().processing().contains(&0));

    let mut failed = first;
    failed.status = BlockStatus::Failed;
    scheduler.release_block(&failed)?;

    let second = scheduler.acquire_block("A")?.unwrap();
    scheduler.release_block(&succeed(second))?;

    let state = *scheduler.task_state("A").unwrap();
    assert!(state.started, "started never resets");
    assert_eq!(state.processing_count, 0);
    assert_eq!(state.failed_count, 1);
    assert_eq!(state.completed_count, 1);
    assert!(!scheduler.is_task_done("A"));

    let third = scheduler.acquire_block("A")?.unwrap();
    scheduler.release_block(&succeed(third))?;
    assert!(scheduler.is_task_done("A"));
    Ok(())
}

#[test]
fn test_pointwise_blocks_unlock_independently() -> Result<()> {
    let a = root_task("A", 3);
    let b = pointwise_task("B", &a, 3);
    let mut scheduler = Scheduler::new(&[b])?;

    let blocks: Vec<Block> = (0..3)
        .map(|_| scheduler.acquire_block("A").map(|b| b.unwrap()))
        .collect::<Result<_>>()?;

    // Completing A/2 readies only B/2.
    scheduler.release_block(&succeed(blocks[2].clone()))?;
    let ready: Vec<u64> = scheduler
        .task_blocks("B")
        .unwrap()
        .ready_queue()
        .map(|b| b.block_id)
        .collect();
    assert_eq!(ready, vec![2]);

    let b2 = scheduler.acquire_block("B")?.unwrap();
    assert_eq!(b2.block_id, 2);
    assert!(scheduler.acquire_block("B")?.is_none());
    Ok(())
}

#[test]
fn test_entry_blocks_of_non_root_task_are_ready_at_start() -> Result<()> {
    let a = root_task("A", 1);
    // B/0 waits for nothing; B/1 waits for A/0.
    let b = Task::builder("B")
        .requires(&a)
        .block(0)
        .block_after(1, [BlockKey::new("A", 0)])
        .build();
    let mut scheduler = Scheduler::new(&[b])?;

    assert!(!scheduler.graph().is_root("B"));
    assert_eq!(
        scheduler.task_state("B").unwrap().ready_count,
        BlockCount::Finite(1)
    );

    let b0 = scheduler.acquire_block("B")?.unwrap();
    assert_eq!(b0.block_id, 0);
    assert!(scheduler.acquire_block("B")?.is_none());
    Ok(())
}

#[test]
fn test_frontier_keeps_completed_block_with_pending_downstream() -> Result<()> {
    let a = root_task("A", 1);
    let b = Task::builder("B")
        .requires(&a)
        .block_after(0, [BlockKey::new("A", 0)])
        .block_after(1, [BlockKey::new("A", 0)])
        .build();
    let mut scheduler = Scheduler::new(&[b])?;

    let a0 = scheduler.acquire_block("A")?.unwrap();
    scheduler.release_block(&succeed(a0))?;
    assert!(scheduler.frontier().contains(&BlockKey::new("A", 0)));

    let b0 = scheduler.acquire_block("B")?.unwrap();
    scheduler.release_block(&succeed(b0))?;
    assert!(
        scheduler.frontier().contains(&BlockKey::new("A", 0)),
        "B/1 is still outstanding"
    );
    // Leaves never enter the frontier.
    assert!(!scheduler.frontier().contains(&BlockKey::new("B", 0)));

    let b1 = scheduler.acquire_block("B")?.unwrap();
    scheduler.release_block(&succeed(b1))?;
    assert!(scheduler.frontier().is_empty());
    Ok(())
}

#[test]
fn test_lattice_inside_one_task_unlocks_in_order() -> Result<()> {
    // T/0 -> T/1 -> T/3
    //     -> T/2 ->
    let t = Task::builder("T")
        .block(0)
        .block_after(1, [BlockKey::new("T", 0)])
        .block_after(2, [BlockKey::new("T", 0)])
        .block_after(3, [BlockKey::new("T", 1), BlockKey::new("T", 2)])
        .build();
    let mut scheduler = Scheduler::new(&[t])?;
    assert!(!scheduler.graph().is_root("T"));

    let t0 = scheduler.acquire_block("T")?.expect("T/0 is an entry block");
    assert_eq!(t0.block_id, 0);
    assert!(scheduler.acquire_block("T")?.is_none());

    let updated = scheduler.release_block(&succeed(t0))?;
    assert_eq!(updated["T"].ready_count, BlockCount::Finite(2));

    let t1 = scheduler.acquire_block("T")?.unwrap();
    let t2 = scheduler.acquire_block("T")?.unwrap();
    assert_eq!((t1.block_id, t2.block_id), (1, 2));

    let updated = scheduler.release_block(&succeed(t1))?;
    assert!(updated.is_empty(), "T/3 still waits for T/2");
    assert!(scheduler.frontier().contains(&BlockKey::new("T", 0)));

    let updated = scheduler.release_block(&succeed(t2))?;
    assert_eq!(updated.keys().collect::<Vec<_>>(), vec!["T"]);
    assert!(!scheduler.frontier().contains(&BlockKey::new("T", 0)));
    assert!(scheduler.frontier().contains(&BlockKey::new("T", 1)));
    assert!(scheduler.frontier().contains(&BlockKey::new("T", 2)));

    let t3 = scheduler.acquire_block("T")?.unwrap();
    assert_eq!(t3.block_id, 3);
    scheduler.release_block(&succeed(t3))?;

    assert!(scheduler.all_done());
    assert!(scheduler.frontier().is_empty());
    assert_eq!(scheduler.task_state("T").unwrap().completed_count, 4);
    Ok(())
}

#[test]
fn test_lattice_failure_orphans_rest_of_task() -> Result<()> {
    let t = Task::builder("T")
        .block(0)
        .block_after(1, [BlockKey::new("T", 0)])
        .block_after(2, [BlockKey::new("T", 1)])
        .build();
    let mut scheduler = Scheduler::new(&[t])?;

    let mut t0 = scheduler.acquire_block("T")?.unwrap();
    t0.status = BlockStatus::Failed;
    let step = scheduler.step_release(&t0)?;

    assert_eq!(
        step.newly_orphaned,
        vec![BlockKey::new("T", 1), BlockKey::new("T", 2)]
    );
    let state = scheduler.task_state("T").unwrap();
    assert_eq!((state.failed_count, state.orphaned_count), (1, 2));
    assert!(scheduler.is_task_done("T"));
    Ok(())
}
