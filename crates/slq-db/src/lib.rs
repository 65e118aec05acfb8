//! Postgres implementations of the intake-core store seams.
//!
//! Two datastores: the intake database (slots, queue pair, pool config,
//! metrics) and the ledger database (confirmed records + the commit RPC
//! function). Both carry embedded sqlx migrations. The ledger URL falls back
//! to the intake URL so a single-database deployment works out of the box.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub mod config;
pub mod ledger;
pub mod metrics;
pub mod queue;
pub mod slots;

pub use config::PgConfigStore;
pub use ledger::PgLedger;
pub use metrics::{capture_snapshot, MetricsSnapshot};
pub use queue::{PgQueue, INTAKE_DLQ, INTAKE_QUEUE};
pub use slots::PgSlotStore;

pub const ENV_DB_URL: &str = "SLQ_DATABASE_URL";
pub const ENV_LEDGER_DB_URL: &str = "SLQ_LEDGER_DATABASE_URL";

/// Connect to the intake database using SLQ_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to intake Postgres")?;

    Ok(pool)
}

/// Connect to the ledger database using SLQ_LEDGER_DATABASE_URL, falling
/// back to SLQ_DATABASE_URL when the ledger shares the intake database.
pub async fn connect_ledger_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_LEDGER_DB_URL)
        .or_else(|_| std::env::var(ENV_DB_URL))
        .with_context(|| format!("missing env vars {ENV_LEDGER_DB_URL} and {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to ledger Postgres")?;

    Ok(pool)
}

/// Run embedded migrations on the intake database.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("intake db migrate failed")?;
    Ok(())
}

/// Run embedded migrations on the ledger database.
pub async fn migrate_ledger(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations_ledger")
        .run(pool)
        .await
        .context("ledger db migrate failed")?;
    Ok(())
}

/// Test helper: connect to the intake database and ensure migrations ran.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='slots'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_slots_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_slots_table: bool,
}
