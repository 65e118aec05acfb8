//! Outbound webhook calls (validation and commit).
//!
//! Both hooks share one shape: POST the full payload as JSON with the
//! resource id in `X-Idempotency-Key`. A 2xx response is acceptance;
//! everything else — non-2xx status, timeout, connect failure — collapses
//! into a transient outcome the worker answers by leaving the message to
//! redeliver. The idempotency key makes the repeat POST safe on the far
//! side.

use std::time::Duration;

use uuid::Uuid;

use slq_schemas::IntakePayload;

/// Header carrying the idempotency key on every webhook call.
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// Result of one webhook POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// 2xx — the external check accepted the intent.
    Accepted,
    /// Anything else. The message stays in its current state and
    /// redelivers; the string is for logs only.
    Transient(String),
}

impl HookOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, HookOutcome::Accepted)
    }
}

/// POST `payload` to `url` with the idempotency header and a per-call
/// timeout.
pub async fn post_hook(
    client: &reqwest::Client,
    url: &str,
    idempotency_key: Uuid,
    payload: &IntakePayload,
    timeout: Duration,
) -> HookOutcome {
    let resp = client
        .post(url)
        .header(IDEMPOTENCY_HEADER, idempotency_key.to_string())
        .json(payload)
        .timeout(timeout)
        .send()
        .await;

    match resp {
        Ok(resp) if resp.status().is_success() => HookOutcome::Accepted,
        Ok(resp) => HookOutcome::Transient(format!("hook returned {}", resp.status())),
        Err(err) => HookOutcome::Transient(format!("hook call failed: {err}")),
    }
}
