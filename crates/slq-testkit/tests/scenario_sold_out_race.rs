//! Scenario: Sold-out race.
//!
//! # Invariant under test
//! Concurrent claims against a bounded pool hand out each slot at most once.
//! Pool `p1` holds 3 AVAILABLE slots; five callers race. Exactly three
//! receive distinct ids, two receive None, and the intake queue holds
//! exactly one intent per winner.

use std::collections::HashSet;

use slq_bridge::{claim_resource_and_queue, IntakeQueue};
use slq_testkit::Harness;

#[tokio::test]
async fn five_claimers_three_slots_exactly_three_win() -> anyhow::Result<()> {
    let h = Harness::new();
    h.seed_pool("p1", 3).await?;

    let mut tasks = Vec::new();
    for i in 1..=5 {
        let slots = h.slots.clone();
        let queue = h.queues.intake();
        tasks.push(tokio::spawn(async move {
            claim_resource_and_queue(&slots, &queue, "p1", &format!("u{i}")).await
        }));
    }

    let mut winners = HashSet::new();
    let mut losers = 0;
    for task in tasks {
        match task.await?? {
            Some(id) => {
                assert!(winners.insert(id), "slot {id} handed out twice");
            }
            None => losers += 1,
        }
    }

    assert_eq!(winners.len(), 3, "exactly three claims succeed");
    assert_eq!(losers, 2, "exactly two claims see sold-out");
    assert_eq!(h.queues.intake().depth().await?, 3);

    // Slot conservation: nothing left AVAILABLE, nothing consumed yet.
    assert_eq!(h.slots.counts("p1"), (0, 3, 0));
    Ok(())
}

#[tokio::test]
async fn empty_pool_claims_null_immediately() -> anyhow::Result<()> {
    let h = Harness::new();
    h.seed_pool("p_empty", 0).await?;

    assert_eq!(h.claim("p_empty", "u1").await?, None);
    // Sold out is not an error and writes nothing to the queue.
    assert_eq!(h.queues.intake().depth().await?, 0);
    Ok(())
}

#[tokio::test]
async fn sold_out_pool_returns_null_after_inventory_drains() -> anyhow::Result<()> {
    let h = Harness::new();
    h.seed_pool("p1", 1).await?;

    assert!(h.claim("p1", "u1").await?.is_some());
    assert_eq!(h.claim("p1", "u2").await?, None);
    assert_eq!(h.queues.intake().depth().await?, 1);
    Ok(())
}
