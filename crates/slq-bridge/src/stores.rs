//! Async trait seams between the intake core and its datastores.
//!
//! # Contracts
//!
//! Implementations share no mutable state through memory — all
//! cross-component state is persisted (or, in the testkit, held behind the
//! implementation's own lock). No caller holds an in-memory lock across any
//! of these calls; exclusion is the store's job (contention-skipping row
//! locks for slots, the visibility lease for messages, an idempotent upsert
//! for the ledger).

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use slq_schemas::{IntakePayload, MessageEnvelope, PoolConfig};

// ---------------------------------------------------------------------------
// SlotStore
// ---------------------------------------------------------------------------

/// Bounded, tagged pool of unique resource slots.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Operator path: insert `n` AVAILABLE slots into `pool_id`.
    /// Returns the generated slot ids.
    async fn create_slots(&self, pool_id: &str, n: u32) -> Result<Vec<Uuid>>;

    /// The contention primitive. Select any single AVAILABLE slot in
    /// `pool_id`, skipping rows locked by in-flight claims, and atomically
    /// reserve it for `user_id`.
    ///
    /// Safe under arbitrarily many concurrent callers; never blocks on a row
    /// another claim holds; never hands the same slot to two callers.
    /// Ordering among concurrent callers is unspecified. `None` means no
    /// unlocked AVAILABLE slot exists — sold out, never an error.
    async fn claim_one(&self, pool_id: &str, user_id: &str) -> Result<Option<Uuid>>;

    /// Conditional RESERVED → CONSUMED transition.
    ///
    /// Returns `false` (not an error) when the slot is not currently
    /// RESERVED — a concurrent reaper or a prior successful attempt already
    /// handled it.
    async fn mark_consumed(&self, slot_id: Uuid) -> Result<bool>;

    /// Return to AVAILABLE every slot that is RESERVED, was locked before
    /// `now - threshold`, and has no live intake-queue message carrying its
    /// id as `resource_id`. Clears `locked_by`/`locked_at`. Uses
    /// contention-skipping selection so it never stalls the claim path.
    /// Returns the count reaped.
    async fn reap_orphans(&self, threshold: Duration) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// IntakeQueue
// ---------------------------------------------------------------------------

/// Durable at-least-once queue with visibility-timeout leasing.
///
/// The system runs two: `intake_queue` and `intake_dlq`. `move_to_dlq` is
/// only meaningful on the former.
#[async_trait]
pub trait IntakeQueue: Send + Sync {
    /// Append a payload; returns the new monotone `msg_id`.
    async fn send(&self, payload: &Value) -> Result<i64>;

    /// Lease up to `max_count` currently-visible messages: extend each
    /// message's visibility deadline by `visibility_timeout`, increment its
    /// `read_ct`, and return the envelopes. Messages leased to another
    /// reader are invisible. Returns an empty batch promptly when nothing is
    /// visible.
    async fn read(
        &self,
        visibility_timeout: Duration,
        max_count: i64,
    ) -> Result<Vec<MessageEnvelope>>;

    /// Permanently remove messages by id. Returns how many were removed.
    async fn delete(&self, msg_ids: &[i64]) -> Result<u64>;

    /// Replace a message's payload in place (persists per-message state
    /// transitions so a redelivered message resumes where it left off).
    /// Returns `false` if the message no longer exists.
    async fn update_payload(&self, msg_id: i64, payload: &Value) -> Result<bool>;

    /// Route a message to the dead-letter queue: enrich the payload with
    /// provenance (`original_msg_id`, `final_read_ct`, `routed_to_dlq_at`,
    /// `reason`), send it to the DLQ, and delete the source message — one
    /// logical operation. Returns the DLQ `msg_id`.
    async fn move_to_dlq(
        &self,
        msg_id: i64,
        payload: &Value,
        read_ct: i32,
        reason: &str,
    ) -> Result<i64>;

    /// Non-leasing peek at up to `max_count` messages in id order, leased or
    /// not. Admin/metrics path; does not touch `read_ct` or visibility.
    async fn list(&self, max_count: i64) -> Result<Vec<MessageEnvelope>>;

    /// Current number of messages in the queue (global, not per-pool).
    async fn depth(&self) -> Result<i64>;
}

// ---------------------------------------------------------------------------
// ConfigSource
// ---------------------------------------------------------------------------

/// Keyed lookup of per-pool runtime parameters. No relationship to slot
/// existence.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn get(&self, pool_id: &str) -> Result<Option<PoolConfig>>;

    /// Operator path: insert or replace a pool's config row.
    async fn upsert(&self, cfg: &PoolConfig) -> Result<()>;

    async fn list(&self) -> Result<Vec<PoolConfig>>;
}

// ---------------------------------------------------------------------------
// LedgerSink
// ---------------------------------------------------------------------------

/// The authoritative system of record.
///
/// `commit` invokes the ledger RPC named by the pool's `commit_rpc_name`
/// with the full payload. The operation is idempotent on
/// `payload.resource_id`: committing the same resource twice leaves exactly
/// one record. Any error is treated as transient by the caller — the
/// message redelivers and the commit is retried.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    async fn commit(&self, rpc_name: &str, payload: &IntakePayload) -> Result<()>;
}
