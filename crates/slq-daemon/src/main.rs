//! slq-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, connects both
//! datastores, builds the shared state over the Postgres stores, spawns the
//! reaper and metrics cadences, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use slq_bridge::{Reaper, WorkerOptions, DEFAULT_REAP_INTERVAL, DEFAULT_REAP_THRESHOLD};
use slq_daemon::{routes, state, tasks};
use slq_db::{PgConfigStore, PgLedger, PgQueue, PgSlotStore};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let intake_pool = slq_db::connect_from_env().await?;
    slq_db::migrate(&intake_pool).await?;

    let ledger_pool = slq_db::connect_ledger_from_env().await?;
    slq_db::migrate_ledger(&ledger_pool).await?;

    let stores = state::Stores {
        slots: Arc::new(PgSlotStore::new(intake_pool.clone())),
        intake: Arc::new(PgQueue::intake(intake_pool.clone())),
        dlq: Arc::new(PgQueue::dlq(intake_pool.clone())),
        config: Arc::new(PgConfigStore::new(intake_pool.clone())),
        ledger: Arc::new(PgLedger::new(ledger_pool)),
    };

    let shared = Arc::new(state::AppState::new(
        stores.clone(),
        worker_options_from_env(),
        state::AuthTokens::from_env(),
    ));

    Reaper::new(
        Arc::clone(&stores.slots),
        env_secs("SLQ_REAP_THRESHOLD_SECS").unwrap_or(DEFAULT_REAP_THRESHOLD),
        env_secs("SLQ_REAP_INTERVAL_SECS").unwrap_or(DEFAULT_REAP_INTERVAL),
    )
    .spawn();

    tasks::spawn_metrics(
        intake_pool,
        env_secs("SLQ_METRICS_INTERVAL_SECS").unwrap_or(Duration::from_secs(300)),
    );

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8777)));
    info!("slq-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SLQ_DAEMON_ADDR").ok()?.parse().ok()
}

fn env_secs(name: &str) -> Option<Duration> {
    let secs: u64 = std::env::var(name).ok()?.parse().ok()?;
    Some(Duration::from_secs(secs))
}

fn worker_options_from_env() -> WorkerOptions {
    let mut opts = WorkerOptions::default();
    if let Some(budget) = env_secs("SLQ_WORKER_DEADLINE_SECS") {
        opts.wall_clock_budget = budget;
    }
    opts
}
