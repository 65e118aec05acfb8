//! Reaper — periodic sweep returning stale RESERVED slots to AVAILABLE.
//!
//! The reaper is the backstop for the deliberately weakened claim
//! atomicity: a claim whose enqueue failed leaves a RESERVED slot with no
//! matching live intent, and the sweep returns it to inventory once its
//! lock is older than the threshold.
//!
//! Pick the threshold comfortably larger than
//! `visibility_timeout × max_retries` so a legitimate long-running retry is
//! never raced. With the shipped defaults (45 s × 10) the 900 s threshold
//! clears that by 2×.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::stores::SlotStore;

pub const DEFAULT_REAP_THRESHOLD: Duration = Duration::from_secs(900);
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(120);

pub struct Reaper {
    slots: Arc<dyn SlotStore>,
    threshold: Duration,
    interval: Duration,
}

impl Reaper {
    pub fn new(slots: Arc<dyn SlotStore>, threshold: Duration, interval: Duration) -> Self {
        Self {
            slots,
            threshold,
            interval,
        }
    }

    /// One sweep. Returns the number of slots returned to AVAILABLE.
    pub async fn pass(&self) -> Result<u64> {
        let reaped = self.slots.reap_orphans(self.threshold).await?;
        if reaped > 0 {
            info!(reaped, "reap pass returned orphaned slots to inventory");
        } else {
            debug!("reap pass found no orphans");
        }
        Ok(reaped)
    }

    /// Run sweeps forever on the configured cadence.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.pass().await {
                    warn!(error = %err, "reap pass failed; next tick retries");
                }
            }
        })
    }
}
