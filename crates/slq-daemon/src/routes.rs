//! Axum router and all HTTP handlers for slq-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly against testkit stores.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::api_types::{
    ClaimRequest, ClaimResponse, ConfigUpsertRequest, DiscardResponse, DlqEntry, DlqListResponse,
    DlqSelection, DrainResponse, HealthResponse, RefusedResponse, ReplayResponse,
    SeedSlotsRequest, SeedSlotsResponse, StatusResponse,
};
use crate::auth::require_bearer;
use crate::state::{uptime_secs, AppState};

/// Most messages an admin listing will page through in one call.
const DLQ_LIST_LIMIT: i64 = 1000;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (tracing) are **not** applied here; `main.rs` attaches
/// them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/claim", post(claim))
        .route("/v1/worker/drain", post(worker_drain))
        .route("/v1/dlq", get(dlq_list))
        .route("/v1/dlq/replay", post(dlq_replay))
        .route("/v1/dlq/discard", post(dlq_discard))
        .route("/v1/admin/slots", post(admin_seed_slots))
        .route("/v1/admin/config/:pool_id", put(admin_config_put))
        .route("/v1/admin/config/:pool_id", get(admin_config_get))
        .with_state(state)
}

fn store_failure(err: anyhow::Error, gate: &str) -> Response {
    error!(gate, error = %err, "store operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(RefusedResponse {
            error: format!("{gate} failed: {err:#}"),
            gate: gate.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> Response {
    let queue_depth = match st.stores.intake.depth().await {
        Ok(n) => n,
        Err(err) => return store_failure(err, "status"),
    };
    let dlq_depth = match st.stores.dlq.depth().await {
        Ok(n) => n,
        Err(err) => return store_failure(err, "status"),
    };

    (
        StatusCode::OK,
        Json(StatusResponse {
            ok: true,
            daemon_uptime_secs: uptime_secs(),
            queue_depth,
            dlq_depth,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/claim
// ---------------------------------------------------------------------------

/// Reserve one slot and enqueue its intent.
///
/// Null `resource_id` means sold out, unconfigured, or inactive pool — the
/// claim path never errors for an empty pool. 500 only on store failure.
pub(crate) async fn claim(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ClaimRequest>,
) -> Response {
    // Pool gate: a pool with no config row, or one switched off, does not
    // hand out inventory.
    match st.stores.config.get(&req.pool_id).await {
        Ok(Some(cfg)) if cfg.is_active => {}
        Ok(_) => {
            return (StatusCode::OK, Json(ClaimResponse { resource_id: None })).into_response();
        }
        Err(err) => return store_failure(err, "claim"),
    }

    match slq_bridge::claim_resource_and_queue(
        st.stores.slots.as_ref(),
        st.stores.intake.as_ref(),
        &req.pool_id,
        &req.user_id,
    )
    .await
    {
        Ok(resource_id) => {
            if let Some(id) = resource_id {
                info!(pool_id = %req.pool_id, user_id = %req.user_id, resource_id = %id, "claim reserved");
            }
            (StatusCode::OK, Json(ClaimResponse { resource_id })).into_response()
        }
        Err(err) => store_failure(err, "claim"),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/worker/drain
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub(crate) struct DrainParams {
    pool: Option<String>,
}

/// Run one bridge-worker drain. Idempotent; safe to trigger concurrently.
pub(crate) async fn worker_drain(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<DrainParams>,
) -> Response {
    if let Err(resp) = require_bearer(&headers, st.auth.worker_token.as_deref(), "worker_drain") {
        return resp;
    }

    match st.worker.drain_once(params.pool.as_deref()).await {
        Ok(summary) => {
            let status = if summary.total == 0 { "idle" } else { "success" };
            (
                StatusCode::OK,
                Json(DrainResponse {
                    status: status.to_string(),
                    processed: summary.processed,
                    dlq: summary.dlq,
                    total: summary.total,
                }),
            )
                .into_response()
        }
        // Queue read failure: fatal for this invocation, nothing was acked;
        // the next scheduled trigger retries.
        Err(err) => store_failure(err, "worker_drain"),
    }
}

// ---------------------------------------------------------------------------
// DLQ admin — GET /v1/dlq, POST /v1/dlq/replay, POST /v1/dlq/discard
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub(crate) struct DlqListParams {
    pool_id: Option<String>,
}

pub(crate) async fn dlq_list(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<DlqListParams>,
) -> Response {
    if let Err(resp) = require_bearer(&headers, st.auth.admin_token.as_deref(), "dlq_admin") {
        return resp;
    }

    let envelopes = match st.stores.dlq.list(DLQ_LIST_LIMIT).await {
        Ok(v) => v,
        Err(err) => return store_failure(err, "dlq_list"),
    };

    let messages = envelopes
        .into_iter()
        .filter(|e| match &params.pool_id {
            Some(pool_id) => {
                e.payload
                    .pointer("/original/pool_id")
                    .and_then(|v| v.as_str())
                    == Some(pool_id.as_str())
            }
            None => true,
        })
        .map(|e| DlqEntry {
            msg_id: e.msg_id,
            enqueued_at: e.enqueued_at,
            payload: e.payload,
        })
        .collect();

    (StatusCode::OK, Json(DlqListResponse { messages })).into_response()
}

/// Re-send the selected messages' original payloads into the intake queue
/// and delete them from the DLQ. The replayed copy starts a fresh retry
/// budget but keeps its embedded state, so a `validated` intent resumes at
/// commit.
pub(crate) async fn dlq_replay(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DlqSelection>,
) -> Response {
    if let Err(resp) = require_bearer(&headers, st.auth.admin_token.as_deref(), "dlq_admin") {
        return resp;
    }

    let envelopes = match st.stores.dlq.list(DLQ_LIST_LIMIT).await {
        Ok(v) => v,
        Err(err) => return store_failure(err, "dlq_replay"),
    };

    let mut replayed = 0u64;
    for envelope in envelopes {
        if !req.msg_ids.contains(&envelope.msg_id) {
            continue;
        }
        let Some(original) = envelope.payload.get("original").cloned() else {
            // Pre-enrichment message; nothing to replay.
            continue;
        };
        if let Err(err) = st.stores.intake.send(&original).await {
            return store_failure(err, "dlq_replay");
        }
        if let Err(err) = st.stores.dlq.delete(&[envelope.msg_id]).await {
            return store_failure(err, "dlq_replay");
        }
        replayed += 1;
    }

    info!(replayed, "dlq replay");
    (StatusCode::OK, Json(ReplayResponse { replayed })).into_response()
}

pub(crate) async fn dlq_discard(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DlqSelection>,
) -> Response {
    if let Err(resp) = require_bearer(&headers, st.auth.admin_token.as_deref(), "dlq_admin") {
        return resp;
    }

    match st.stores.dlq.delete(&req.msg_ids).await {
        Ok(discarded) => {
            info!(discarded, "dlq discard");
            (StatusCode::OK, Json(DiscardResponse { discarded })).into_response()
        }
        Err(err) => store_failure(err, "dlq_discard"),
    }
}

// ---------------------------------------------------------------------------
// Operator seeding — POST /v1/admin/slots, PUT/GET /v1/admin/config/:pool_id
// ---------------------------------------------------------------------------

pub(crate) async fn admin_seed_slots(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SeedSlotsRequest>,
) -> Response {
    if let Err(resp) = require_bearer(&headers, st.auth.admin_token.as_deref(), "admin") {
        return resp;
    }

    match st.stores.slots.create_slots(&req.pool_id, req.count).await {
        Ok(slot_ids) => {
            info!(pool_id = %req.pool_id, created = slot_ids.len(), "slots seeded");
            (
                StatusCode::OK,
                Json(SeedSlotsResponse {
                    created: slot_ids.len(),
                    slot_ids,
                }),
            )
                .into_response()
        }
        Err(err) => store_failure(err, "admin_seed_slots"),
    }
}

pub(crate) async fn admin_config_put(
    State(st): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ConfigUpsertRequest>,
) -> Response {
    if let Err(resp) = require_bearer(&headers, st.auth.admin_token.as_deref(), "admin") {
        return resp;
    }

    let cfg = req.into_config(&pool_id);
    match st.stores.config.upsert(&cfg).await {
        Ok(()) => {
            info!(pool_id = %pool_id, is_active = cfg.is_active, "pool config upserted");
            (StatusCode::OK, Json(cfg)).into_response()
        }
        Err(err) => store_failure(err, "admin_config_put"),
    }
}

pub(crate) async fn admin_config_get(
    State(st): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = require_bearer(&headers, st.auth.admin_token.as_deref(), "admin") {
        return resp;
    }

    match st.stores.config.get(&pool_id).await {
        Ok(Some(cfg)) => (StatusCode::OK, Json(cfg)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(RefusedResponse {
                error: format!("no config for pool {pool_id}"),
                gate: "admin".to_string(),
            }),
        )
            .into_response(),
        Err(err) => store_failure(err, "admin_config_get"),
    }
}
