//! Append-only metrics snapshots.
//!
//! Queue depth is global by design — counting per-pool would mean indexing
//! payload fields.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::queue::{INTAKE_DLQ, INTAKE_QUEUE};

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub captured_at_utc: DateTime<Utc>,
    pub queue_depth: i64,
    pub dlq_depth: i64,
    pub slots_available: i64,
    pub slots_reserved: i64,
    pub slots_consumed: i64,
}

/// Capture and persist one snapshot row; returns what was written.
pub async fn capture_snapshot(pool: &PgPool) -> Result<MetricsSnapshot> {
    let row = sqlx::query(
        r#"
        insert into metrics_snapshots (
          queue_depth, dlq_depth, slots_available, slots_reserved, slots_consumed
        )
        select
          (select count(*) from queue_messages where queue = $1),
          (select count(*) from queue_messages where queue = $2),
          (select count(*) from slots where status = 'AVAILABLE'),
          (select count(*) from slots where status = 'RESERVED'),
          (select count(*) from slots where status = 'CONSUMED')
        returning captured_at_utc, queue_depth, dlq_depth,
                  slots_available, slots_reserved, slots_consumed
        "#,
    )
    .bind(INTAKE_QUEUE)
    .bind(INTAKE_DLQ)
    .fetch_one(pool)
    .await
    .context("capture_snapshot failed")?;

    Ok(MetricsSnapshot {
        captured_at_utc: row.try_get("captured_at_utc")?,
        queue_depth: row.try_get("queue_depth")?,
        dlq_depth: row.try_get("dlq_depth")?,
        slots_available: row.try_get("slots_available")?,
        slots_reserved: row.try_get("slots_reserved")?,
        slots_consumed: row.try_get("slots_consumed")?,
    })
}
