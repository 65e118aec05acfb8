//! In-memory ledger with idempotent insert and outage injection.
//!
//! `set_outage(true)` makes every commit fail, simulating the system of
//! record being unreachable; commits observed during an outage still count
//! toward `commit_calls` so tests can assert the worker actually tried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use slq_bridge::LedgerSink;
use slq_schemas::{IntakePayload, LedgerRecord};

#[derive(Clone, Default)]
pub struct MemLedger {
    records: Arc<Mutex<HashMap<Uuid, LedgerRecord>>>,
    outage: Arc<AtomicBool>,
    commit_calls: Arc<AtomicU64>,
}

impl MemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outage(&self, on: bool) {
        self.outage.store(on, Ordering::SeqCst);
    }

    pub fn record(&self, resource_id: Uuid) -> Option<LedgerRecord> {
        let records = self.records.lock().expect("testkit lock poisoned");
        records.get(&resource_id).cloned()
    }

    pub fn len(&self) -> usize {
        let records = self.records.lock().expect("testkit lock poisoned");
        records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total commit attempts, including ones refused during an outage.
    pub fn commit_calls(&self) -> u64 {
        self.commit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerSink for MemLedger {
    async fn commit(&self, _rpc_name: &str, payload: &IntakePayload) -> Result<()> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);

        if self.outage.load(Ordering::SeqCst) {
            return Err(anyhow!("ledger rpc unavailable"));
        }

        let mut records = self.records.lock().expect("testkit lock poisoned");
        // Insert-if-absent keyed by resource_id; re-commits are no-ops.
        records
            .entry(payload.resource_id)
            .or_insert_with(|| LedgerRecord {
                resource_id: payload.resource_id,
                pool_id: payload.pool_id.clone(),
                user_id: payload.user_id.clone(),
                confirmed_at: Utc::now(),
            });
        Ok(())
    }
}
