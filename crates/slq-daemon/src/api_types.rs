//! Request/response wire types for the daemon's HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use slq_schemas::{
    PoolConfig, DEFAULT_BATCH_SIZE, DEFAULT_COMMIT_RPC_NAME, DEFAULT_MAX_RETRIES,
    DEFAULT_VISIBILITY_TIMEOUT_SECS,
};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub daemon_uptime_secs: u64,
    pub queue_depth: i64,
    pub dlq_depth: i64,
}

/// Refusal body for auth gates and store failures.
#[derive(Serialize, Deserialize)]
pub struct RefusedResponse {
    pub error: String,
    pub gate: String,
}

#[derive(Serialize, Deserialize)]
pub struct ClaimRequest {
    pub pool_id: String,
    pub user_id: String,
}

/// `resource_id` is null when the pool is sold out, unconfigured, or
/// inactive — never an error.
#[derive(Serialize, Deserialize)]
pub struct ClaimResponse {
    pub resource_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize)]
pub struct DrainResponse {
    /// "success" when the batch had messages, "idle" when it was empty.
    pub status: String,
    pub processed: u32,
    pub dlq: u32,
    pub total: u32,
}

#[derive(Serialize, Deserialize)]
pub struct DlqEntry {
    pub msg_id: i64,
    pub enqueued_at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Serialize, Deserialize)]
pub struct DlqListResponse {
    pub messages: Vec<DlqEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct DlqSelection {
    pub msg_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct ReplayResponse {
    pub replayed: u64,
}

#[derive(Serialize, Deserialize)]
pub struct DiscardResponse {
    pub discarded: u64,
}

#[derive(Serialize, Deserialize)]
pub struct SeedSlotsRequest {
    pub pool_id: String,
    pub count: u32,
}

#[derive(Serialize, Deserialize)]
pub struct SeedSlotsResponse {
    pub created: usize,
    pub slot_ids: Vec<Uuid>,
}

/// Config upsert body; omitted fields take the documented defaults.
#[derive(Serialize, Deserialize)]
pub struct ConfigUpsertRequest {
    #[serde(default = "default_batch_size")]
    pub batch_size: i32,
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: i32,
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub validation_webhook_url: Option<String>,
    #[serde(default = "default_commit_rpc_name")]
    pub commit_rpc_name: String,
    #[serde(default)]
    pub commit_webhook_url: Option<String>,
}

impl ConfigUpsertRequest {
    pub fn into_config(self, pool_id: &str) -> PoolConfig {
        PoolConfig {
            pool_id: pool_id.to_string(),
            batch_size: self.batch_size,
            visibility_timeout_secs: self.visibility_timeout_secs,
            max_retries: self.max_retries,
            is_active: self.is_active,
            validation_webhook_url: self.validation_webhook_url,
            commit_rpc_name: self.commit_rpc_name,
            commit_webhook_url: self.commit_webhook_url,
        }
    }
}

fn default_batch_size() -> i32 {
    DEFAULT_BATCH_SIZE
}
fn default_visibility_timeout_secs() -> i32 {
    DEFAULT_VISIBILITY_TIMEOUT_SECS
}
fn default_max_retries() -> i32 {
    DEFAULT_MAX_RETRIES
}
fn default_is_active() -> bool {
    true
}
fn default_commit_rpc_name() -> String {
    DEFAULT_COMMIT_RPC_NAME.to_string()
}
