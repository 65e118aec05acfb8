//! Slot store — the contention side of the system.
//!
//! `claim_one` and `reap_orphans` both select with `FOR UPDATE SKIP LOCKED`
//! so neither ever blocks on a row another transaction holds: a claim racing
//! a claim skips to a different AVAILABLE row, and the reaper never stalls
//! the claim path. The partial index `idx_slots_pool_available` keeps the
//! "some AVAILABLE row in pool P" lookup constant-time per attempt.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use slq_bridge::SlotStore;
use slq_schemas::{SlotRow, SlotStatus};

use crate::queue::INTAKE_QUEUE;

#[derive(Clone)]
pub struct PgSlotStore {
    pool: PgPool,
}

impl PgSlotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a single slot row by id (admin/test path).
    pub async fn fetch_slot(&self, slot_id: Uuid) -> Result<Option<SlotRow>> {
        let row = sqlx::query(
            r#"
            select slot_id, pool_id, status, locked_by, locked_at
            from slots
            where slot_id = $1
            "#,
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch_slot failed")?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(SlotRow {
            slot_id: row.try_get("slot_id")?,
            pool_id: row.try_get("pool_id")?,
            status: SlotStatus::parse(&row.try_get::<String, _>("status")?)?,
            locked_by: row.try_get("locked_by")?,
            locked_at: row.try_get("locked_at")?,
        }))
    }

    /// (available, reserved, consumed) counts for one pool.
    pub async fn pool_counts(&self, pool_id: &str) -> Result<(i64, i64, i64)> {
        let row = sqlx::query(
            r#"
            select
              count(*) filter (where status = 'AVAILABLE') as available,
              count(*) filter (where status = 'RESERVED')  as reserved,
              count(*) filter (where status = 'CONSUMED')  as consumed
            from slots
            where pool_id = $1
            "#,
        )
        .bind(pool_id)
        .fetch_one(&self.pool)
        .await
        .context("pool_counts failed")?;

        Ok((
            row.try_get("available")?,
            row.try_get("reserved")?,
            row.try_get("consumed")?,
        ))
    }
}

#[async_trait]
impl SlotStore for PgSlotStore {
    async fn create_slots(&self, pool_id: &str, n: u32) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            insert into slots (slot_id, pool_id)
            select gen_random_uuid(), $1
            from generate_series(1, $2)
            returning slot_id
            "#,
        )
        .bind(pool_id)
        .bind(n as i32)
        .fetch_all(&self.pool)
        .await
        .context("create_slots failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.try_get("slot_id")?);
        }
        Ok(out)
    }

    async fn claim_one(&self, pool_id: &str, user_id: &str) -> Result<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            with candidate as (
                select slot_id
                from slots
                where pool_id = $1
                  and status = 'AVAILABLE'
                limit 1
                for update skip locked
            )
            update slots
               set status    = 'RESERVED',
                   locked_by = $2,
                   locked_at = now()
             where slot_id in (select slot_id from candidate)
            returning slot_id
            "#,
        )
        .bind(pool_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("claim_one failed")?;

        Ok(row.map(|(id,)| id))
    }

    async fn mark_consumed(&self, slot_id: Uuid) -> Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            update slots
               set status = 'CONSUMED'
             where slot_id = $1
               and status = 'RESERVED'
            returning slot_id
            "#,
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .context("mark_consumed failed")?;

        Ok(row.is_some())
    }

    async fn reap_orphans(&self, threshold: Duration) -> Result<u64> {
        // Liveness check matches on text, not a uuid cast, so a malformed
        // payload in the queue can never poison the sweep.
        let result = sqlx::query(
            r#"
            with stale as (
                select s.slot_id
                from slots s
                where s.status = 'RESERVED'
                  and s.locked_at < now() - make_interval(secs => $1)
                  and not exists (
                      select 1
                      from queue_messages m
                      where m.queue = $2
                        and m.payload ->> 'resource_id' = s.slot_id::text
                  )
                for update skip locked
            )
            update slots
               set status    = 'AVAILABLE',
                   locked_by = null,
                   locked_at = null
             where slot_id in (select slot_id from stale)
            "#,
        )
        .bind(threshold.as_secs_f64())
        .bind(INTAKE_QUEUE)
        .execute(&self.pool)
        .await
        .context("reap_orphans failed")?;

        Ok(result.rows_affected())
    }
}
