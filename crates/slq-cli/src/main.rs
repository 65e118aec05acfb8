//! Operator CLI for the SlotQueue intake core.
//!
//! Everything here talks straight to the datastores — seeding inventory,
//! editing pool config, and manually triggering a drain, reap, or metrics
//! snapshot without going through the daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use slq_bridge::{BridgeWorker, ConfigSource, Reaper, SlotStore, WorkerOptions};
use slq_db::{PgConfigStore, PgLedger, PgQueue, PgSlotStore};
use slq_schemas::PoolConfig;

#[derive(Parser)]
#[command(name = "slq")]
#[command(about = "SlotQueue intake core CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Pool inventory and config commands
    Pool {
        #[command(subcommand)]
        cmd: PoolCmd,
    },

    /// Run one bridge-worker drain against the intake queue
    Drain {
        /// Pool whose configured batch/visibility parameterize the read
        #[arg(long)]
        pool: Option<String>,
    },

    /// Run one reap pass over stale RESERVED slots
    Reap {
        /// Orphan age threshold in seconds
        #[arg(long, default_value_t = 900)]
        threshold_secs: u64,
    },

    /// Capture one metrics snapshot row
    Metrics,
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply embedded migrations to both datastores
    Migrate,
}

#[derive(Subcommand)]
enum PoolCmd {
    /// Insert AVAILABLE slots into a pool
    Seed {
        #[arg(long)]
        pool: String,
        #[arg(long)]
        count: u32,
    },

    /// Insert or replace a pool's config row
    ConfigSet {
        #[arg(long)]
        pool: String,
        #[arg(long, default_value_t = slq_schemas::DEFAULT_BATCH_SIZE)]
        batch_size: i32,
        #[arg(long, default_value_t = slq_schemas::DEFAULT_VISIBILITY_TIMEOUT_SECS)]
        visibility_timeout_secs: i32,
        #[arg(long, default_value_t = slq_schemas::DEFAULT_MAX_RETRIES)]
        max_retries: i32,
        /// Configure the pool switched off
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        validation_webhook_url: Option<String>,
        #[arg(long, default_value = slq_schemas::DEFAULT_COMMIT_RPC_NAME)]
        commit_rpc_name: String,
        #[arg(long)]
        commit_webhook_url: Option<String>,
    },

    /// Print a pool's config row
    ConfigShow {
        #[arg(long)]
        pool: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => match cmd {
            DbCmd::Status => {
                let pool = slq_db::connect_from_env().await?;
                let s = slq_db::status(&pool).await?;
                println!("ok={} has_slots_table={}", s.ok, s.has_slots_table);
            }
            DbCmd::Migrate => {
                let pool = slq_db::connect_from_env().await?;
                slq_db::migrate(&pool).await?;
                let ledger = slq_db::connect_ledger_from_env().await?;
                slq_db::migrate_ledger(&ledger).await?;
                println!("migrations applied");
            }
        },

        Commands::Pool { cmd } => match cmd {
            PoolCmd::Seed { pool, count } => {
                let db = slq_db::connect_from_env().await?;
                let slots = PgSlotStore::new(db);
                let ids = slots.create_slots(&pool, count).await?;
                println!("seeded {} slots into {}", ids.len(), pool);
            }
            PoolCmd::ConfigSet {
                pool,
                batch_size,
                visibility_timeout_secs,
                max_retries,
                inactive,
                validation_webhook_url,
                commit_rpc_name,
                commit_webhook_url,
            } => {
                let db = slq_db::connect_from_env().await?;
                let store = PgConfigStore::new(db);
                let cfg = PoolConfig {
                    pool_id: pool,
                    batch_size,
                    visibility_timeout_secs,
                    max_retries,
                    is_active: !inactive,
                    validation_webhook_url,
                    commit_rpc_name,
                    commit_webhook_url,
                };
                store.upsert(&cfg).await?;
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            }
            PoolCmd::ConfigShow { pool } => {
                let db = slq_db::connect_from_env().await?;
                let store = PgConfigStore::new(db);
                match store.get(&pool).await? {
                    Some(cfg) => println!("{}", serde_json::to_string_pretty(&cfg)?),
                    None => println!("no config for pool {pool}"),
                }
            }
        },

        Commands::Drain { pool } => {
            let db = slq_db::connect_from_env().await?;
            let ledger_db = slq_db::connect_ledger_from_env().await?;
            let worker = BridgeWorker::new(
                Arc::new(PgSlotStore::new(db.clone())),
                Arc::new(PgQueue::intake(db.clone())),
                Arc::new(PgConfigStore::new(db)),
                Arc::new(PgLedger::new(ledger_db)),
                WorkerOptions::default(),
            );
            let summary = worker.drain_once(pool.as_deref()).await?;
            println!(
                "processed={} dlq={} total={}",
                summary.processed, summary.dlq, summary.total
            );
        }

        Commands::Reap { threshold_secs } => {
            let db = slq_db::connect_from_env().await?;
            let reaper = Reaper::new(
                Arc::new(PgSlotStore::new(db)),
                Duration::from_secs(threshold_secs),
                Duration::from_secs(0),
            );
            let reaped = reaper.pass().await?;
            println!("reaped={reaped}");
        }

        Commands::Metrics => {
            let db = slq_db::connect_from_env().await?;
            let snap = slq_db::capture_snapshot(&db).await?;
            println!(
                "queue_depth={} dlq_depth={} available={} reserved={} consumed={}",
                snap.queue_depth,
                snap.dlq_depth,
                snap.slots_available,
                snap.slots_reserved,
                snap.slots_consumed
            );
        }
    }

    Ok(())
}
