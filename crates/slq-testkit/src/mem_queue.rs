//! In-memory queue pair with visibility-timeout leasing.
//!
//! One `MemQueues` registry backs both named queues so `move_to_dlq` and the
//! slot store's reap liveness check see the same state, the way a single
//! `queue_messages` table does in Postgres.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use slq_bridge::IntakeQueue;
use slq_schemas::{DlqPayload, MessageEnvelope, INTAKE_DLQ, INTAKE_QUEUE};

#[derive(Debug, Clone)]
struct MsgRow {
    read_ct: i32,
    enqueued_at: DateTime<Utc>,
    vt: DateTime<Utc>,
    payload: Value,
}

#[derive(Default)]
struct QueuesInner {
    next_msg_id: i64,
    queues: HashMap<String, BTreeMap<i64, MsgRow>>,
}

/// Shared registry behind every queue handle.
#[derive(Clone, Default)]
pub struct MemQueues {
    inner: Arc<Mutex<QueuesInner>>,
}

impl MemQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the main intake queue, wired to its dead-letter partner.
    pub fn intake(&self) -> MemQueue {
        MemQueue {
            queues: self.clone(),
            name: INTAKE_QUEUE.to_string(),
            dlq: Some(INTAKE_DLQ.to_string()),
        }
    }

    /// Handle on the dead-letter queue itself.
    pub fn dlq(&self) -> MemQueue {
        MemQueue {
            queues: self.clone(),
            name: INTAKE_DLQ.to_string(),
            dlq: None,
        }
    }

    /// Test control: make every message in `queue` visible again, as if all
    /// outstanding leases had expired.
    pub fn expire_leases(&self, queue: &str) {
        let mut inner = self.inner.lock().expect("testkit lock poisoned");
        let past = Utc::now() - chrono::Duration::seconds(1);
        if let Some(q) = inner.queues.get_mut(queue) {
            for row in q.values_mut() {
                row.vt = past;
            }
        }
    }

    /// `resource_id` strings of every message currently in the intake queue,
    /// leased or not — "live intent" as the reaper defines it.
    pub(crate) fn live_resource_ids(&self) -> HashSet<String> {
        let inner = self.inner.lock().expect("testkit lock poisoned");
        inner
            .queues
            .get(INTAKE_QUEUE)
            .map(|q| {
                q.values()
                    .filter_map(|row| {
                        row.payload
                            .get("resource_id")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One named queue over the shared registry.
#[derive(Clone)]
pub struct MemQueue {
    queues: MemQueues,
    name: String,
    dlq: Option<String>,
}

impl MemQueue {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl IntakeQueue for MemQueue {
    async fn send(&self, payload: &Value) -> Result<i64> {
        let mut inner = self.queues.inner.lock().expect("testkit lock poisoned");
        inner.next_msg_id += 1;
        let msg_id = inner.next_msg_id;
        let now = Utc::now();
        inner.queues.entry(self.name.clone()).or_default().insert(
            msg_id,
            MsgRow {
                read_ct: 0,
                enqueued_at: now,
                vt: now,
                payload: payload.clone(),
            },
        );
        Ok(msg_id)
    }

    async fn read(
        &self,
        visibility_timeout: Duration,
        max_count: i64,
    ) -> Result<Vec<MessageEnvelope>> {
        let mut inner = self.queues.inner.lock().expect("testkit lock poisoned");
        let now = Utc::now();
        let lease_until = now
            + chrono::Duration::from_std(visibility_timeout)
                .map_err(|e| anyhow!("visibility timeout out of range: {e}"))?;

        let Some(q) = inner.queues.get_mut(&self.name) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for (msg_id, row) in q.iter_mut() {
            if out.len() as i64 >= max_count {
                break;
            }
            if row.vt > now {
                continue;
            }
            row.vt = lease_until;
            row.read_ct += 1;
            out.push(MessageEnvelope {
                msg_id: *msg_id,
                read_ct: row.read_ct,
                enqueued_at: row.enqueued_at,
                vt: row.vt,
                payload: row.payload.clone(),
            });
        }
        Ok(out)
    }

    async fn delete(&self, msg_ids: &[i64]) -> Result<u64> {
        let mut inner = self.queues.inner.lock().expect("testkit lock poisoned");
        let Some(q) = inner.queues.get_mut(&self.name) else {
            return Ok(0);
        };
        let mut removed = 0;
        for id in msg_ids {
            if q.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn update_payload(&self, msg_id: i64, payload: &Value) -> Result<bool> {
        let mut inner = self.queues.inner.lock().expect("testkit lock poisoned");
        let Some(row) = inner
            .queues
            .get_mut(&self.name)
            .and_then(|q| q.get_mut(&msg_id))
        else {
            return Ok(false);
        };
        row.payload = payload.clone();
        Ok(true)
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
            .clone()
            .ok_or_else(|| anyhow!("queue {} has no dead-letter queue", self.name))?;

        let enriched = DlqPayload {
            original: payload.clone(),
            reason: reason.to_string(),
            original_msg_id: msg_id,
            final_read_ct: read_ct,
            routed_to_dlq_at: Utc::now(),
        };
        let enriched = serde_json::to_value(&enriched)?;

        let mut inner = self.queues.inner.lock().expect("testkit lock poisoned");
        inner.next_msg_id += 1;
        let dlq_msg_id = inner.next_msg_id;
        let now = Utc::now();
        inner.queues.entry(dlq).or_default().insert(
            dlq_msg_id,
            MsgRow {
                read_ct: 0,
                enqueued_at: now,
                vt: now,
                payload: enriched,
            },
        );
        if let Some(q) = inner.queues.get_mut(&self.name) {
            q.remove(&msg_id);
        }
        Ok(dlq_msg_id)
    }

    async fn list(&self, max_count: i64) -> Result<Vec<MessageEnvelope>> {
        let inner = self.queues.inner.lock().expect("testkit lock poisoned");
        Ok(inner
            .queues
            .get(&self.name)
            .map(|q| {
                q.iter()
                    .take(max_count.max(0) as usize)
                    .map(|(msg_id, row)| MessageEnvelope {
                        msg_id: *msg_id,
                        read_ct: row.read_ct,
                        enqueued_at: row.enqueued_at,
                        vt: row.vt,
                        payload: row.payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn depth(&self) -> Result<i64> {
        let inner = self.queues.inner.lock().expect("testkit lock poisoned");
        Ok(inner
            .queues
            .get(&self.name)
            .map(|q| q.len() as i64)
            .unwrap_or(0))
    }
}
