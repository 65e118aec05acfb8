//! One-call wiring of the in-memory stores plus a bridge worker, shared by
//! the end-to-end scenario tests.

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use slq_bridge::{claim_resource_and_queue, BridgeWorker, WorkerOptions};
use slq_schemas::PoolConfig;

use crate::{MemConfigStore, MemLedger, MemQueues, MemSlotStore};

pub struct Harness {
    pub queues: MemQueues,
    pub slots: MemSlotStore,
    pub config: MemConfigStore,
    pub ledger: MemLedger,
    pub worker: BridgeWorker,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_worker_options(WorkerOptions::default())
    }

    pub fn with_worker_options(opts: WorkerOptions) -> Self {
        let queues = MemQueues::new();
        let slots = MemSlotStore::new(queues.clone());
        let config = MemConfigStore::new();
        let ledger = MemLedger::new();
        let worker = BridgeWorker::new(
            Arc::new(slots.clone()),
            Arc::new(queues.intake()),
            Arc::new(config.clone()),
            Arc::new(ledger.clone()),
            opts,
        );
        Self {
            queues,
            slots,
            config,
            ledger,
            worker,
        }
    }

    /// Seed `n` AVAILABLE slots and a default config row for `pool_id`.
    pub async fn seed_pool(&self, pool_id: &str, n: u32) -> Result<Vec<Uuid>> {
        use slq_bridge::SlotStore;
        self.config.put(PoolConfig::defaults(pool_id));
        self.slots.create_slots(pool_id, n).await
    }

    /// Claim through the composite, exactly as the claim API does.
    pub async fn claim(&self, pool_id: &str, user_id: &str) -> Result<Option<Uuid>> {
        claim_resource_and_queue(&self.slots, &self.queues.intake(), pool_id, user_id).await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
