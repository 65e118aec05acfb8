//! Ledger client — invokes the commit RPC in the system-of-record database.
//!
//! The RPC is a SQL function selected per-pool by name. Postgres cannot bind
//! a function name as a parameter, so the name is validated as a plain
//! identifier before interpolation; anything else is rejected before
//! touching the wire.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use slq_bridge::LedgerSink;
use slq_schemas::{IntakePayload, LedgerRecord};

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a confirmed record by resource id (test/ops path).
    pub async fn fetch_record(&self, resource_id: Uuid) -> Result<Option<LedgerRecord>> {
        let row = sqlx::query(
            r#"
            select resource_id, pool_id, user_id, confirmed_at
            from ledger_records
            where resource_id = $1
            "#,
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await
        .context("ledger fetch_record failed")?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(LedgerRecord {
            resource_id: row.try_get("resource_id")?,
            pool_id: row.try_get("pool_id")?,
            user_id: row.try_get("user_id")?,
            confirmed_at: row.try_get("confirmed_at")?,
        }))
    }

    pub async fn record_count(&self) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("select count(*)::bigint from ledger_records")
            .fetch_one(&self.pool)
            .await
            .context("ledger record_count failed")?;
        Ok(n)
    }
}

fn is_valid_rpc_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl LedgerSink for PgLedger {
    async fn commit(&self, rpc_name: &str, payload: &IntakePayload) -> Result<()> {
        if !is_valid_rpc_name(rpc_name) {
            return Err(anyhow!("invalid commit rpc name: {rpc_name:?}"));
        }

        let sql = format!("select {rpc_name}($1::jsonb)");
        sqlx::query(&sql)
            .bind(payload.to_value())
            .execute(&self.pool)
            .await
            .with_context(|| format!("ledger rpc {rpc_name} failed"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_name_validation() {
        assert!(is_valid_rpc_name("finalize_transaction"));
        assert!(is_valid_rpc_name("_private_fn"));
        assert!(!is_valid_rpc_name(""));
        assert!(!is_valid_rpc_name("1starts_with_digit"));
        assert!(!is_valid_rpc_name("drop table; --"));
        assert!(!is_valid_rpc_name("schema.fn"));
    }
}
