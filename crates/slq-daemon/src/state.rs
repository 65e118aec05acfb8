//! Shared runtime state for slq-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The state is built
//! once over the trait seams, so tests compose the same router against the
//! in-memory testkit stores while production wires the Postgres ones.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use slq_bridge::{BridgeWorker, ConfigSource, IntakeQueue, LedgerSink, SlotStore, WorkerOptions};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AuthTokens
// ---------------------------------------------------------------------------

/// Bearer credentials for the protected surfaces. A `None` token means the
/// corresponding surface is disabled: requests get 503, never an open door.
#[derive(Clone, Debug, Default)]
pub struct AuthTokens {
    /// `SLQ_WORKER_TOKEN` — drain trigger.
    pub worker_token: Option<String>,
    /// `SLQ_ADMIN_TOKEN` — DLQ admin and operator seeding.
    pub admin_token: Option<String>,
}

impl AuthTokens {
    pub fn from_env() -> Self {
        Self {
            worker_token: std::env::var("SLQ_WORKER_TOKEN").ok(),
            admin_token: std::env::var("SLQ_ADMIN_TOKEN").ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stores / AppState
// ---------------------------------------------------------------------------

/// The trait-seam handles every route reaches through.
#[derive(Clone)]
pub struct Stores {
    pub slots: Arc<dyn SlotStore>,
    pub intake: Arc<dyn IntakeQueue>,
    pub dlq: Arc<dyn IntakeQueue>,
    pub config: Arc<dyn ConfigSource>,
    pub ledger: Arc<dyn LedgerSink>,
}

pub struct AppState {
    pub stores: Stores,
    pub worker: BridgeWorker,
    pub build: BuildInfo,
    pub auth: AuthTokens,
}

impl AppState {
    pub fn new(stores: Stores, worker_opts: WorkerOptions, auth: AuthTokens) -> Self {
        let worker = BridgeWorker::new(
            Arc::clone(&stores.slots),
            Arc::clone(&stores.intake),
            Arc::clone(&stores.config),
            Arc::clone(&stores.ledger),
            worker_opts,
        );
        Self {
            stores,
            worker,
            build: BuildInfo {
                service: "slq-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            auth,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
