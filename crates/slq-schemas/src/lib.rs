//! Shared data types for the SlotQueue intake core.
//!
//! Everything that crosses a crate boundary lives here: the intake payload
//! and its per-message state machine, queue envelopes, the DLQ enrichment,
//! slot rows, per-pool runtime config, ledger records, and the drain summary
//! returned by the bridge worker.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Name of the main intake queue.
pub const INTAKE_QUEUE: &str = "intake_queue";
/// Name of its dead-letter partner.
pub const INTAKE_DLQ: &str = "intake_dlq";

// ---------------------------------------------------------------------------
// IntakeState
// ---------------------------------------------------------------------------

/// Per-message processing state, embedded in the payload itself.
///
/// The state travels with the message so a redelivered message resumes where
/// the previous attempt left off:
///
/// ```text
/// queued ──validate ok──▶ validated ──commit ok──▶ committed ──ack──▶ (deleted)
///   │                        │
///   └─ no validator ─────────┘
/// ```
///
/// Transient downstream failures leave the state untouched; the message
/// simply redelivers after its lease expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeState {
    Queued,
    Validated,
    Committed,
}

impl IntakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeState::Queued => "queued",
            IntakeState::Validated => "validated",
            IntakeState::Committed => "committed",
        }
    }
}

// ---------------------------------------------------------------------------
// IntakePayload
// ---------------------------------------------------------------------------

/// The durable intent a claim enqueues and the bridge worker drains.
///
/// `resource_id` is the claimed slot's id and doubles as the idempotency key
/// for every downstream call: reusing it means resuming the same logical
/// intent, never starting a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakePayload {
    pub pool_id: String,
    pub resource_id: Uuid,
    pub user_id: String,
    pub state: IntakeState,
}

impl IntakePayload {
    /// Fresh intent as written by the claim composite.
    pub fn queued(pool_id: &str, resource_id: Uuid, user_id: &str) -> Self {
        Self {
            pool_id: pool_id.to_string(),
            resource_id,
            user_id: user_id.to_string(),
            state: IntakeState::Queued,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("intake payload serializes")
    }
}

// ---------------------------------------------------------------------------
// MessageEnvelope
// ---------------------------------------------------------------------------

/// Queue-owned envelope around a payload.
///
/// `msg_id` is monotone per queue; `read_ct` counts every delivery including
/// the one currently being processed; `vt` is the visibility deadline — the
/// message is invisible to other readers until `vt` passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub msg_id: i64,
    pub read_ct: i32,
    pub enqueued_at: DateTime<Utc>,
    pub vt: DateTime<Utc>,
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// DlqPayload
// ---------------------------------------------------------------------------

/// A dead-lettered message: the original payload enriched with provenance.
///
/// `original` is kept as raw JSON because structurally malformed payloads
/// route here too and must survive the trip for operator inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqPayload {
    pub original: Value,
    pub reason: String,
    pub original_msg_id: i64,
    pub final_read_ct: i32,
    pub routed_to_dlq_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SlotStatus / SlotRow
// ---------------------------------------------------------------------------

/// Three-state slot lifecycle. CONSUMED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Available,
    Reserved,
    Consumed,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Reserved => "RESERVED",
            SlotStatus::Consumed => "CONSUMED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "AVAILABLE" => Ok(SlotStatus::Available),
            "RESERVED" => Ok(SlotStatus::Reserved),
            "CONSUMED" => Ok(SlotStatus::Consumed),
            other => Err(anyhow!("invalid slot status: {}", other)),
        }
    }
}

/// One unit of inventory in a pool.
///
/// `locked_by`/`locked_at` are set on RESERVE, retained on CONSUME, and
/// cleared when the reaper returns an orphaned slot to AVAILABLE.
#[derive(Debug, Clone)]
pub struct SlotRow {
    pub slot_id: Uuid,
    pub pool_id: String,
    pub status: SlotStatus,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// PoolConfig
// ---------------------------------------------------------------------------

/// Per-pool runtime parameters consumed by the bridge worker and the reaper.
///
/// Config rows are independent of slot existence — a pool may be configured
/// before any inventory is seeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool_id: String,
    pub batch_size: i32,
    pub visibility_timeout_secs: i32,
    pub max_retries: i32,
    pub is_active: bool,
    pub validation_webhook_url: Option<String>,
    pub commit_rpc_name: String,
    pub commit_webhook_url: Option<String>,
}

pub const DEFAULT_BATCH_SIZE: i32 = 100;
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i32 = 45;
pub const DEFAULT_MAX_RETRIES: i32 = 10;
pub const DEFAULT_COMMIT_RPC_NAME: &str = "finalize_transaction";

impl PoolConfig {
    /// Config row with every field at its documented default.
    pub fn defaults(pool_id: &str) -> Self {
        Self {
            pool_id: pool_id.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            is_active: true,
            validation_webhook_url: None,
            commit_rpc_name: DEFAULT_COMMIT_RPC_NAME.to_string(),
            commit_webhook_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerRecord
// ---------------------------------------------------------------------------

/// Confirmed record in the system of record, keyed by `resource_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub resource_id: Uuid,
    pub pool_id: String,
    pub user_id: String,
    pub confirmed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// DrainSummary
// ---------------------------------------------------------------------------

/// Structured result of one bridge-worker invocation.
///
/// `total` is the size of the leased batch; `processed` counts acknowledged
/// messages; `dlq` counts messages routed to the dead-letter queue. Messages
/// that hit a transient failure appear in none of the first two — they stay
/// leased and redeliver.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DrainSummary {
    pub processed: u32,
    pub dlq: u32,
    pub total: u32,
}

impl DrainSummary {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_state_serializes_lowercase() {
        let p = IntakePayload::queued("p1", Uuid::new_v4(), "u1");
        let v = p.to_value();
        assert_eq!(v["state"], "queued");
        assert_eq!(v["pool_id"], "p1");
    }

    #[test]
    fn payload_round_trips_through_value() {
        let p = IntakePayload {
            pool_id: "p1".into(),
            resource_id: Uuid::new_v4(),
            user_id: "u9".into(),
            state: IntakeState::Validated,
        };
        let back: IntakePayload = serde_json::from_value(p.to_value()).unwrap();
        assert_eq!(back.state, IntakeState::Validated);
        assert_eq!(back.resource_id, p.resource_id);
    }

    #[test]
    fn slot_status_parse_rejects_unknown() {
        assert!(SlotStatus::parse("AVAILABLE").is_ok());
        assert!(SlotStatus::parse("available").is_err());
    }

    #[test]
    fn malformed_payload_fails_to_parse() {
        let v = serde_json::json!({"pool_id": "p1", "user_id": "u1", "state": "queued"});
        assert!(serde_json::from_value::<IntakePayload>(v).is_err());
    }
}
