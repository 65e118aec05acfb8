//! Per-pool runtime config rows. No foreign key to slots — a pool may be
//! configured before any inventory exists.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use slq_bridge::ConfigSource;
use slq_schemas::PoolConfig;

#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_config(row: &sqlx::postgres::PgRow) -> Result<PoolConfig> {
        Ok(PoolConfig {
            pool_id: row.try_get("pool_id")?,
            batch_size: row.try_get("batch_size")?,
            visibility_timeout_secs: row.try_get("visibility_timeout_secs")?,
            max_retries: row.try_get("max_retries")?,
            is_active: row.try_get("is_active")?,
            validation_webhook_url: row.try_get("validation_webhook_url")?,
            commit_rpc_name: row.try_get("commit_rpc_name")?,
            commit_webhook_url: row.try_get("commit_webhook_url")?,
        })
    }
}

#[async_trait]
impl ConfigSource for PgConfigStore {
    async fn get(&self, pool_id: &str) -> Result<Option<PoolConfig>> {
        let row = sqlx::query(
            r#"
            select pool_id, batch_size, visibility_timeout_secs, max_retries,
                   is_active, validation_webhook_url, commit_rpc_name, commit_webhook_url
            from pool_config
            where pool_id = $1
            "#,
        )
        .bind(pool_id)
        .fetch_optional(&self.pool)
        .await
        .context("pool_config get failed")?;

        row.as_ref().map(Self::row_to_config).transpose()
    }

    async fn upsert(&self, cfg: &PoolConfig) -> Result<()> {
        sqlx::query(
            r#"
            insert into pool_config (
              pool_id, batch_size, visibility_timeout_secs, max_retries,
              is_active, validation_webhook_url, commit_rpc_name, commit_webhook_url,
              updated_at_utc
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, now())
            on conflict (pool_id) do update
                set batch_size              = excluded.batch_size,
                    visibility_timeout_secs = excluded.visibility_timeout_secs,
                    max_retries             = excluded.max_retries,
                    is_active               = excluded.is_active,
                    validation_webhook_url  = excluded.validation_webhook_url,
                    commit_rpc_name         = excluded.commit_rpc_name,
                    commit_webhook_url      = excluded.commit_webhook_url,
                    updated_at_utc          = excluded.updated_at_utc
            "#,
        )
        .bind(&cfg.pool_id)
        .bind(cfg.batch_size)
        .bind(cfg.visibility_timeout_secs)
        .bind(cfg.max_retries)
        .bind(cfg.is_active)
        .bind(&cfg.validation_webhook_url)
        .bind(&cfg.commit_rpc_name)
        .bind(&cfg.commit_webhook_url)
        .execute(&self.pool)
        .await
        .context("pool_config upsert failed")?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<PoolConfig>> {
        let rows = sqlx::query(
            r#"
            select pool_id, batch_size, visibility_timeout_secs, max_retries,
                   is_active, validation_webhook_url, commit_rpc_name, commit_webhook_url
            from pool_config
            order by pool_id asc
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("pool_config list failed")?;

        rows.iter().map(Self::row_to_config).collect()
    }
}
