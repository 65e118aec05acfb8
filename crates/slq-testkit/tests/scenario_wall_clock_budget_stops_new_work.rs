//! Scenario: wall-clock budget.
//!
//! # Invariant under test
//! When the invocation deadline is hit the worker stops issuing new work
//! and returns whatever it has acknowledged; unprocessed messages stay
//! leased and simply redeliver later.

use std::sync::Arc;
use std::time::Duration;

use slq_bridge::{BridgeWorker, IntakeQueue, WorkerOptions};
use slq_schemas::SlotStatus;
use slq_testkit::Harness;

#[tokio::test]
async fn zero_budget_reads_but_processes_nothing() -> anyhow::Result<()> {
    let h = Harness::with_worker_options(WorkerOptions {
        wall_clock_budget: Duration::ZERO,
        ..WorkerOptions::default()
    });
    h.seed_pool("p1", 3).await?;

    let mut claimed = Vec::new();
    for i in 1..=3 {
        claimed.push(h.claim("p1", &format!("u{i}")).await?.expect("available"));
    }

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.dlq, 0);
    assert_eq!(summary.total, 3, "batch was leased before the deadline hit");

    // Nothing committed, nothing consumed, all three still in the queue.
    assert!(h.ledger.is_empty());
    for id in &claimed {
        assert_eq!(h.slots.status_of(*id), Some(SlotStatus::Reserved));
    }
    assert_eq!(h.queues.intake().depth().await?, 3);

    // The batch is still leased, so an immediate second invocation is idle.
    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.total, 0);
    Ok(())
}

#[tokio::test]
async fn budget_starved_batch_redelivers_to_a_normal_worker() -> anyhow::Result<()> {
    let h = Harness::with_worker_options(WorkerOptions {
        wall_clock_budget: Duration::ZERO,
        ..WorkerOptions::default()
    });
    h.seed_pool("p1", 2).await?;
    h.claim("p1", "u1").await?.expect("available");
    h.claim("p1", "u2").await?.expect("available");

    let starved = h.worker.drain_once(None).await?;
    assert_eq!(starved.processed, 0);
    assert_eq!(starved.total, 2);

    // Leases lapse; a default-budget worker over the same stores drains.
    h.queues.expire_leases(slq_schemas::INTAKE_QUEUE);
    let worker = BridgeWorker::new(
        Arc::new(h.slots.clone()),
        Arc::new(h.queues.intake()),
        Arc::new(h.config.clone()),
        Arc::new(h.ledger.clone()),
        WorkerOptions::default(),
    );

    let summary = worker.drain_once(None).await?;
    assert_eq!(summary.processed, 2);
    assert_eq!(h.ledger.len(), 2);
    assert_eq!(h.queues.intake().depth().await?, 0);
    Ok(())
}
