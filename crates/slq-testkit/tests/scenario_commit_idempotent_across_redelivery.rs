//! Scenario: idempotent commit under redelivery.
//!
//! # Invariant under test
//! `commit(p); commit(p)` leaves exactly one ledger row, and a message
//! redelivered after a crash between "commit ok" and "ack" produces the
//! same final state as no crash: one row, slot CONSUMED, message gone.

use slq_bridge::{IntakeQueue, LedgerSink};
use slq_schemas::{IntakePayload, SlotStatus};
use slq_testkit::{Harness, MemLedger};
use uuid::Uuid;

#[tokio::test]
async fn double_commit_results_in_a_single_row() -> anyhow::Result<()> {
    let ledger = MemLedger::new();
    let payload = IntakePayload::queued("p1", Uuid::new_v4(), "u1");

    ledger.commit("finalize_transaction", &payload).await?;
    ledger.commit("finalize_transaction", &payload).await?;

    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.commit_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn redelivery_after_commit_before_ack_is_a_noop() -> anyhow::Result<()> {
    let h = Harness::new();
    h.seed_pool("p1", 1).await?;
    let claimed = h.claim("p1", "u1").await?.expect("inventory available");

    // First pass commits, consumes, acks.
    h.worker.drain_once(None).await?;
    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Consumed));

    // Simulate the crash window: the same logical intent surfaces again, as
    // if the batched ack had been lost before the delete landed.
    let replayed = IntakePayload::queued("p1", claimed, "u1");
    h.queues.intake().send(&replayed.to_value()).await?;

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 1, "redelivered message still acks");

    // Same final state as no crash.
    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Consumed));
    assert_eq!(h.queues.intake().depth().await?, 0);

    let record = h.ledger.record(claimed).expect("row exists");
    assert_eq!(record.user_id, "u1");
    Ok(())
}
