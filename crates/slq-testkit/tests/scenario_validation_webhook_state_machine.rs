//! Scenario: validation webhook drives the message state machine.
//!
//! # Invariant under test
//! Only `queued` messages are validated; a successful validation persists
//! `state = validated` into the queue payload, so a redelivery after a
//! commit-side failure resumes at commit without calling the validator
//! again. Validator failures of any kind are transient.

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

#[derive(Clone, Default)]
struct StubState {
    fail: Arc<AtomicBool>,
    seen: Arc<Mutex<Vec<Option<String>>>>,
}

async fn hook(State(st): State<StubState>, headers: HeaderMap) -> StatusCode {
    let key = headers
        .get("X-Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    st.seen.lock().unwrap().push(key);
    if st.fail.load(Ordering::SeqCst) {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    }
}

async fn spawn_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/validate", post(hook))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub serve");
    });
    (format!("http://{addr}/validate"), state)
}

#[tokio::test]
async fn validator_failure_leaves_message_queued() -> anyhow::Result<()> {
    let (url, stub) = spawn_stub().await;
    stub.fail.store(true, Ordering::SeqCst);

    let h = Harness::new();
    let _ = h.slots.create_slots("p1", 1).await?;
    h.config.put(PoolConfig {
        validation_webhook_url: Some(url),
        ..PoolConfig::defaults("p1")
    });

    let claimed = h.claim("p1", "u1").await?.expect("inventory available");

    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.dlq, 0);
    assert_eq!(summary.total, 1);

    // Message untouched: still queued, nothing committed, slot reserved.
    let held = h.queues.intake().list(10).await?;
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].payload["state"], "queued");
    assert!(h.ledger.is_empty());
    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Reserved));
    assert_eq!(stub.seen.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn validated_state_persists_and_validator_is_not_called_again() -> anyhow::Result<()> {
    let (url, stub) = spawn_stub().await;

    let h = Harness::new();
    let _ = h.slots.create_slots("p1", 1).await?;
    h.config.put(PoolConfig {
        validation_webhook_url: Some(url),
        ..PoolConfig::defaults("p1")
    });

    let claimed = h.claim("p1", "u1").await?.expect("inventory available");

    // Validation succeeds, commit fails: the validated state must be durable.
    h.ledger.set_outage(true);
    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 0);

    let held = h.queues.intake().list(10).await?;
    assert_eq!(held[0].payload["state"], "validated");
    assert_eq!(stub.seen.lock().unwrap().len(), 1);

    // Redelivery resumes at commit; the validator sees no second call.
    h.ledger.set_outage(false);
    h.queues.expire_leases(slq_schemas::INTAKE_QUEUE);
    let summary = h.worker.drain_once(None).await?;
    assert_eq!(summary.processed, 1);

    assert_eq!(stub.seen.lock().unwrap().len(), 1, "validated is sticky");
    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Consumed));
    Ok(())
}

#[tokio::test]
async fn validator_receives_resource_id_as_idempotency_key() -> anyhow::Result<()> {
    let (url, stub) = spawn_stub().await;

    let h = Harness::new();
    let _ = h.slots.create_slots("p1", 1).await?;
    h.config.put(PoolConfig {
        validation_webhook_url: Some(url),
        ..PoolConfig::defaults("p1")
    });

    let claimed = h.claim("p1", "u1").await?.expect("inventory available");
    h.worker.drain_once(None).await?;

    let seen = stub.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].as_deref(), Some(claimed.to_string().as_str()));
    Ok(())
}

#[tokio::test]
async fn no_validator_configured_is_vacuously_validated() -> anyhow::Result<()> {
    let h = Harness::new();
    h.seed_pool("p1", 1).await?;

    let claimed = h.claim("p1", "u1").await?.expect("inventory available");
    let summary = h.worker.drain_once(None).await?;

    // Straight to the RPC commit path.
    assert_eq!(summary.processed, 1);
    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.slots.status_of(claimed), Some(SlotStatus::Consumed));
    Ok(())
}
