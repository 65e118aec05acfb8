//! Scenario: webhook commit mode.
//!
//! # Invariant under test
//! With `commit_webhook_url` configured the worker POSTs the payload with
//! `X-Idempotency-Key: <resource_id>` instead of calling the ledger RPC.
//! 200 consumes the slot and deletes the message; 500 leaves the slot
//! RESERVED and the message to redeliver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use slq_bridge::{IntakeQueue, SlotStore};
use slq_schemas::{PoolConfig, SlotStatus};
use slq_testkit::Harness;

// ---------------------------------------------------------------------------
// Local webhook stub
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct StubState {
    fail: Arc<AtomicBool>,
    seen: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
}

async fn hook(
    State(st): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let key = headers
        .get("X-Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    st.seen.lock().unwrap().push((key, body));
    if st.fail.load(Ordering::SeqCst) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// Bind an ephemeral local port and serve the stub; returns its URL.
async fn spawn_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub serve");
    });
    (format!("http://{addr}/hook"), state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commit_webhook_200_consumes_slot_and_deletes_message() -> anyhow::Result<()> {
    let (url, stub) = spawn_stub().await;

    let h = Harness::new();
    let _ = h.slots.create_slots("p1", 1).await?;
    h.config.put(PoolConfig {
        commit_webhook_url: Some(url),
        ..PoolConfig::defaults("p1")
    });

    let claimed = h.claim("p1", "u1").await?.expect("inventory available");

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.total, 1);

    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Consumed));
    assert_eq!(h.queues.intake().depth().await?, 0);
    // Webhook mode: the ledger RPC is never invoked.
    assert!(h.ledger.is_empty());
    assert_eq!(h.ledger.commit_calls(), 0);

    let seen = stub.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (key, body) = &seen[0];
    assert_eq!(key.as_deref(), Some(claimed.to_string().as_str()));
    assert_eq!(body["resource_id"], claimed.to_string());
    assert_eq!(body["pool_id"], "p1");
    assert_eq!(body["user_id"], "u1");
    Ok(())
}

#[tokio::test]
async fn commit_webhook_500_is_transient_and_redelivers() -> anyhow::Result<()> {
    let (url, stub) = spawn_stub().await;
    stub.fail.store(true, Ordering::SeqCst);

    let h = Harness::new();
    let _ = h.slots.create_slots("p1", 1).await?;
    h.config.put(PoolConfig {
        commit_webhook_url: Some(url),
        ..PoolConfig::defaults("p1")
    });

    let claimed = h.claim("p1", "u1").await?.expect("inventory available");

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.dlq, 0);
    assert_eq!(summary.total, 1);

    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Reserved));
    assert_eq!(h.queues.intake().depth().await?, 1);

    // Restore the webhook; the redelivered message commits with the same
    // idempotency key.
    stub.fail.store(false, Ordering::SeqCst);
    h.queues.expire_leases(slq_schemas::INTAKE_QUEUE);

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 1);
    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Consumed));

    let seen = stub.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, seen[1].0, "same idempotency key across retries");
    Ok(())
}

#[tokio::test]
async fn unreachable_commit_webhook_is_transient_not_terminal() -> anyhow::Result<()> {
    let h = Harness::new();
    let _ = h.slots.create_slots("p1", 1).await?;
    // Nothing listens here; connect failure, not HTTP failure.
    h.config.put(PoolConfig {
        commit_webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
        ..PoolConfig::defaults("p1")
    });

    let claimed = h.claim("p1", "u1").await?.expect("inventory available");

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.dlq, 0);
    assert_eq!(summary.total, 1);
    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Reserved));
    assert_eq!(h.queues.intake().depth().await?, 1);
    Ok(())
}
