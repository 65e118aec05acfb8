//! Background cadences owned by the daemon process.
//!
//! The reaper task lives in `slq-bridge` (it only needs the slot store);
//! metrics snapshots are Postgres-specific and spawn here.

use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, warn};

/// Capture a metrics snapshot every `interval`, forever.
pub fn spawn_metrics(pool: PgPool, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match slq_db::capture_snapshot(&pool).await {
                Ok(snap) => {
                    info!(
                        queue_depth = snap.queue_depth,
                        dlq_depth = snap.dlq_depth,
                        slots_available = snap.slots_available,
                        slots_reserved = snap.slots_reserved,
                        slots_consumed = snap.slots_consumed,
                        "metrics snapshot"
                    );
                }
                Err(err) => warn!(error = %err, "metrics snapshot failed; next tick retries"),
            }
        }
    })
}
