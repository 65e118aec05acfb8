//! Scenario: terminal failures.
//!
//! # Invariant under test
//! Malformed payloads, unconfigured pools, and inactive pools are terminal
//! for the message — routed to the DLQ with the original failure reason —
//! while transient failures never are.

use serde_json::json;
use slq_bridge::{IntakeQueue, SlotStore};
use slq_schemas::PoolConfig;
use slq_testkit::Harness;

#[tokio::test]
async fn malformed_payload_routes_to_dlq_with_reason() -> anyhow::Result<()> {
    let h = Harness::new();

    // Missing resource_id entirely.
    h.queues
        .intake()
        .send(&json!({"pool_id": "p1", "user_id": "u1", "state": "queued"}))
        .await?;

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.dlq, 1);
    assert_eq!(summary.total, 1);

    let dead = h.queues.dlq().list(10).await?;
    assert_eq!(dead.len(), 1);
    assert!(dead[0].payload["reason"]
        .as_str()
        .unwrap()
        .contains("malformed payload"));
    // The original survives untouched for operator inspection.
    assert_eq!(dead[0].payload["original"]["pool_id"], "p1");
    Ok(())
}

#[tokio::test]
async fn unconfigured_pool_routes_to_dlq() -> anyhow::Result<()> {
    let h = Harness::new();
    let _ = h.slots.create_slots("p_nocfg", 1).await?;

    // The core claim composite does not gate on config; the worker does.
    h.claim("p_nocfg", "u1").await?.expect("inventory available");

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.dlq, 1);

    let dead = h.queues.dlq().list(10).await?;
    assert!(dead[0].payload["reason"]
        .as_str()
        .unwrap()
        .contains("no config"));
    Ok(())
}

#[tokio::test]
async fn inactive_pool_routes_to_dlq() -> anyhow::Result<()> {
    let h = Harness::new();
    let _ = h.slots.create_slots("p_off", 1).await?;
    h.config.put(PoolConfig {
        is_active: false,
        ..PoolConfig::defaults("p_off")
    });

    h.claim("p_off", "u1").await?.expect("inventory available");

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.dlq, 1);

    let dead = h.queues.dlq().list(10).await?;
    assert!(dead[0].payload["reason"]
        .as_str()
        .unwrap()
        .contains("inactive"));
    Ok(())
}

#[tokio::test]
async fn mixed_batch_counts_processed_and_dlq_separately() -> anyhow::Result<()> {
    let h = Harness::new();
    h.seed_pool("p1", 1).await?;
    h.claim("p1", "u1").await?.expect("inventory available");
    h.queues.intake().send(&json!({"garbage": true})).await?;

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.dlq, 1);
    assert_eq!(summary.total, 2);
    Ok(())
}
