//! Scenario: slot conservation under concurrent load.
//!
//! # Invariant under test
//! `|AVAILABLE| + |RESERVED| + |CONSUMED|` equals the seeded pool size at
//! every stage — after a claim storm, after drains, after reaps — and every
//! CONSUMED slot has exactly one matching ledger row.

use std::collections::HashSet;
use std::time::Duration;

use slq_bridge::{claim_resource_and_queue, IntakeQueue, SlotStore};
use slq_schemas::SlotStatus;
use slq_testkit::Harness;

const POOL_SIZE: u32 = 20;
const CLAIMERS: usize = 30;

fn assert_conserved(h: &Harness, stage: &str) {
    let (available, reserved, consumed) = h.slots.counts("p1");
    assert_eq!(
        available + reserved + consumed,
        POOL_SIZE as usize,
        "conservation violated after {stage}"
    );
}

#[tokio::test]
async fn claim_storm_then_drain_then_reap_conserves_inventory() -> anyhow::Result<()> {
    let h = Harness::new();
    let seeded = h.seed_pool("p1", POOL_SIZE).await?;
    assert_eq!(seeded.len(), POOL_SIZE as usize);

    // Storm: more claimers than inventory.
    let mut tasks = Vec::new();
    for i in 0..CLAIMERS {
        let slots = h.slots.clone();
        let queue = h.queues.intake();
        tasks.push(tokio::spawn(async move {
            claim_resource_and_queue(&slots, &queue, "p1", &format!("u{i}")).await
        }));
    }

    let mut winners = HashSet::new();
    for task in tasks {
        if let Some(id) = task.await?? {
            assert!(winners.insert(id), "slot {id} double-assigned");
        }
    }
    assert_eq!(winners.len(), POOL_SIZE as usize);
    assert_conserved(&h, "claim storm");

    // Drain everything (default batch covers the pool).
    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, POOL_SIZE);
    assert_conserved(&h, "drain");

    // Every CONSUMED slot has exactly one ledger row with its id.
    assert_eq!(h.ledger.len(), POOL_SIZE as usize);
    for id in &winners {
        assert_eq!(h.slots.status_of(*id), Some(SlotStatus::Consumed));
        assert!(h.ledger.record(*id).is_some());
    }

    // A reap pass over a fully consumed pool changes nothing.
    let reaped = h.slots.reap_orphans(Duration::from_secs(0)).await?;
    assert_eq!(reaped, 0);
    assert_conserved(&h, "reap");

    assert_eq!(h.queues.intake().depth().await?, 0);
    Ok(())
}
