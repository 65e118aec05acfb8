//! In-memory slot store.
//!
//! Claims are serialized by the store's own lock, which trivially satisfies
//! the no-double-assignment contract; tie-break among AVAILABLE slots is the
//! map's iteration order, i.e. unspecified, matching the Postgres
//! implementation's `LIMIT 1 ... SKIP LOCKED` pick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use slq_bridge::SlotStore;
use slq_schemas::{SlotRow, SlotStatus};

use crate::mem_queue::MemQueues;

#[derive(Clone)]
pub struct MemSlotStore {
    inner: Arc<Mutex<HashMap<Uuid, SlotRow>>>,
    /// Reap liveness checks look at the intake queue through this registry.
    queues: MemQueues,
}

impl MemSlotStore {
    pub fn new(queues: MemQueues) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            queues,
        }
    }

    pub fn status_of(&self, slot_id: Uuid) -> Option<SlotStatus> {
        let inner = self.inner.lock().expect("testkit lock poisoned");
        inner.get(&slot_id).map(|s| s.status)
    }

    pub fn slot(&self, slot_id: Uuid) -> Option<SlotRow> {
        let inner = self.inner.lock().expect("testkit lock poisoned");
        inner.get(&slot_id).cloned()
    }

    /// (available, reserved, consumed) for one pool.
    pub fn counts(&self, pool_id: &str) -> (usize, usize, usize) {
        let inner = self.inner.lock().expect("testkit lock poisoned");
        let mut counts = (0, 0, 0);
        for s in inner.values().filter(|s| s.pool_id == pool_id) {
            match s.status {
                SlotStatus::Available => counts.0 += 1,
                SlotStatus::Reserved => counts.1 += 1,
                SlotStatus::Consumed => counts.2 += 1,
            }
        }
        counts
    }

    /// Test control: age a slot's lock so a reap pass sees it as stale.
    pub fn backdate_lock(&self, slot_id: Uuid, age: Duration) {
        let mut inner = self.inner.lock().expect("testkit lock poisoned");
        if let Some(slot) = inner.get_mut(&slot_id) {
            slot.locked_at = slot
                .locked_at
                .map(|_| Utc::now() - chrono::Duration::from_std(age).expect("age in range"));
        }
    }
}

#[async_trait]
impl SlotStore for MemSlotStore {
    async fn create_slots(&self, pool_id: &str, n: u32) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.lock().expect("testkit lock poisoned");
        let mut ids = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let slot_id = Uuid::new_v4();
            inner.insert(
                slot_id,
                SlotRow {
                    slot_id,
                    pool_id: pool_id.to_string(),
                    status: SlotStatus::Available,
                    locked_by: None,
                    locked_at: None,
                },
            );
            ids.push(slot_id);
        }
        Ok(ids)
    }

    async fn claim_one(&self, pool_id: &str, user_id: &str) -> Result<Option<Uuid>> {
        let mut inner = self.inner.lock().expect("testkit lock poisoned");
        let candidate = inner
            .values()
            .find(|s| s.pool_id == pool_id && s.status == SlotStatus::Available)
            .map(|s| s.slot_id);

        let Some(slot_id) = candidate else {
            return Ok(None);
        };
        let slot = inner.get_mut(&slot_id).expect("candidate exists");
        slot.status = SlotStatus::Reserved;
        slot.locked_by = Some(user_id.to_string());
        slot.locked_at = Some(Utc::now());
        Ok(Some(slot_id))
    }

    async fn mark_consumed(&self, slot_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().expect("testkit lock poisoned");
        match inner.get_mut(&slot_id) {
            Some(slot) if slot.status == SlotStatus::Reserved => {
                slot.status = SlotStatus::Consumed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reap_orphans(&self, threshold: Duration) -> Result<u64> {
        let live = self.queues.live_resource_ids();
        let cutoff = Utc::now() - chrono::Duration::from_std(threshold)?;

        let mut inner = self.inner.lock().expect("testkit lock poisoned");
        let mut reaped = 0;
        for slot in inner.values_mut() {
            if slot.status != SlotStatus::Reserved {
                continue;
            }
            let Some(locked_at) = slot.locked_at else {
                continue;
            };
            if locked_at >= cutoff {
                continue;
            }
            if live.contains(&slot.slot_id.to_string()) {
                continue;
            }
            slot.status = SlotStatus::Available;
            slot.locked_by = None;
            slot.locked_at = None;
            reaped += 1;
        }
        Ok(reaped)
    }
}
