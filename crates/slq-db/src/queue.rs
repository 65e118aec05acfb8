//! Queue pair over one `queue_messages` table, pgmq-shaped.
//!
//! A message is visible when its `vt` (visibility deadline) is in the past.
//! `read` leases by pushing `vt` into the future inside the same statement
//! that selects, with `FOR UPDATE SKIP LOCKED` so two readers racing on the
//! same tick lease disjoint batches. `msg_id` is a bigserial, monotone
//! across the table.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Row};

use slq_bridge::IntakeQueue;
use slq_schemas::{DlqPayload, MessageEnvelope};

pub use slq_schemas::{INTAKE_DLQ, INTAKE_QUEUE};

#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    name: String,
    dlq: Option<String>,
}

impl PgQueue {
    /// The main intake queue, wired to its dead-letter partner.
    pub fn intake(pool: PgPool) -> Self {
        Self {
            pool,
            name: INTAKE_QUEUE.to_string(),
            dlq: Some(INTAKE_DLQ.to_string()),
        }
    }

    /// The dead-letter queue itself. Has no DLQ of its own.
    pub fn dlq(pool: PgPool) -> Self {
        Self {
            pool,
            name: INTAKE_DLQ.to_string(),
            dlq: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn row_to_envelope(row: &sqlx::postgres::PgRow) -> Result<MessageEnvelope> {
        Ok(MessageEnvelope {
            msg_id: row.try_get("msg_id")?,
            read_ct: row.try_get("read_ct")?,
            enqueued_at: row.try_get("enqueued_at")?,
            vt: row.try_get("vt")?,
            payload: row.try_get("payload")?,
        })
    }
}

#[async_trait]
impl IntakeQueue for PgQueue {
    async fn send(&self, payload: &Value) -> Result<i64> {
        let (msg_id,): (i64,) = sqlx::query_as(
            r#"
            insert into queue_messages (queue, payload)
            values ($1, $2)
            returning msg_id
            "#,
        )
        .bind(&self.name)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("send to {} failed", self.name))?;

        Ok(msg_id)
    }

    async fn read(
        &self,
        visibility_timeout: Duration,
        max_count: i64,
    ) -> Result<Vec<MessageEnvelope>> {
        let rows = sqlx::query(
            r#"
            with visible as (
                select msg_id
                from queue_messages
                where queue = $1
                  and vt <= now()
                order by msg_id asc
                limit $2
                for update skip locked
            )
            update queue_messages m
               set vt      = now() + make_interval(secs => $3),
                   read_ct = m.read_ct + 1
             where m.msg_id in (select msg_id from visible)
            returning m.msg_id, m.read_ct, m.enqueued_at, m.vt, m.payload
            "#,
        )
        .bind(&self.name)
        .bind(max_count)
        .bind(visibility_timeout.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("read from {} failed", self.name))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Self::row_to_envelope(row)?);
        }
        // The UPDATE does not promise output order; callers expect oldest first.
        out.sort_by_key(|e| e.msg_id);
        Ok(out)
    }

    async fn delete(&self, msg_ids: &[i64]) -> Result<u64> {
        if msg_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            delete from queue_messages
            where queue = $1
              and msg_id = any($2)
            "#,
        )
        .bind(&self.name)
        .bind(msg_ids)
        .execute(&self.pool)
        .await
        .with_context(|| format!("delete from {} failed", self.name))?;

        Ok(result.rows_affected())
    }

    async fn update_payload(&self, msg_id: i64, payload: &Value) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            update queue_messages
               set payload = $3
             where queue = $1
               and msg_id = $2
            returning msg_id
            "#,
        )
        .bind(&self.name)
        .bind(msg_id)
        .bind(payload)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("update_payload on {} failed", self.name))?;

        Ok(row.is_some())
    }

    async fn move_to_dlq(
        &self,
        msg_id: i64,
        payload: &Value,
        read_ct: i32,
        reason: &str,
    ) -> Result<i64> {
        let dlq = self
            .dlq
            .as_deref()
            .ok_or_else(|| anyhow!("queue {} has no dead-letter queue", self.name))?;

        let enriched = DlqPayload {
            original: payload.clone(),
            reason: reason.to_string(),
            original_msg_id: msg_id,
            final_read_ct: read_ct,
            routed_to_dlq_at: Utc::now(),
        };
        let enriched =
            serde_json::to_value(&enriched).context("dlq payload serialization failed")?;

        // Send + delete as one logical operation.
        let mut tx = self.pool.begin().await.context("move_to_dlq begin failed")?;

        let (dlq_msg_id,): (i64,) = sqlx::query_as(
            r#"
            insert into queue_messages (queue, payload)
            values ($1, $2)
            returning msg_id
            "#,
        )
        .bind(dlq)
        .bind(&enriched)
        .fetch_one(&mut *tx)
        .await
        .context("move_to_dlq insert failed")?;

        sqlx::query(
            r#"
            delete from queue_messages
            where queue = $1
              and msg_id = $2
            "#,
        )
        .bind(&self.name)
        .bind(msg_id)
        .execute(&mut *tx)
        .await
        .context("move_to_dlq delete failed")?;

        tx.commit().await.context("move_to_dlq commit failed")?;

        Ok(dlq_msg_id)
    }

    async fn list(&self, max_count: i64) -> Result<Vec<MessageEnvelope>> {
        let rows = sqlx::query(
            r#"
            select msg_id, read_ct, enqueued_at, vt, payload
            from queue_messages
            where queue = $1
            order by msg_id asc
            limit $2
            "#,
        )
        .bind(&self.name)
        .bind(max_count)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("list on {} failed", self.name))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Self::row_to_envelope(row)?);
        }
        Ok(out)
    }

    async fn depth(&self) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as(
            r#"
            select count(*)::bigint
            from queue_messages
            where queue = $1
            "#,
        )
        .bind(&self.name)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("depth on {} failed", self.name))?;

        Ok(n)
    }
}
