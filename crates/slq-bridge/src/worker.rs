//! Bridge worker — batch drain from the intake queue into the ledger.
//!
//! # Per-invocation contract
//!
//! One `drain_once` call leases a batch, walks it in order, and returns a
//! [`DrainSummary`]. Per message the worker resolves pool config (memoized
//! for the invocation), dead-letters terminal failures (missing/inactive
//! config, exhausted retries, malformed payloads), drives the payload state
//! machine (validate → commit), conditionally marks the slot CONSUMED, and
//! collects the message for one batched acknowledgement at the end.
//!
//! Transient failures — validator or commit-side non-2xx, timeout, connect
//! failure, ledger RPC error — leave the message untouched: it is neither
//! acked nor counted, and redelivers once its lease expires.
//!
//! The worker is safe to run concurrently with itself: two invocations lease
//! disjoint batches, and the only shared state is persistent. It holds no
//! in-memory lock across any I/O — only the queue's lease, implicit in the
//! envelope. A wall-clock budget (default 50 s against a 60 s platform
//! deadline) stops new work, attempts the batched ack, and returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use slq_schemas::{DrainSummary, IntakePayload, IntakeState, MessageEnvelope, PoolConfig};

use crate::hooks::{post_hook, HookOutcome};
use crate::stores::{ConfigSource, IntakeQueue, LedgerSink, SlotStore};

// ---------------------------------------------------------------------------
// WorkerOptions
// ---------------------------------------------------------------------------

/// Tunables for one worker instance.
///
/// The visibility/batch fallbacks only bootstrap the batch read; per-message
/// behavior always follows the per-pool config resolved inside the loop.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub fallback_visibility: Duration,
    pub fallback_batch: i64,
    /// Self-imposed deadline for the whole invocation.
    pub wall_clock_budget: Duration,
    /// Per-call timeout for validation/commit webhook POSTs.
    pub hook_timeout: Duration,
    /// Per-call timeout for the ledger RPC.
    pub rpc_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            fallback_visibility: Duration::from_secs(
                slq_schemas::DEFAULT_VISIBILITY_TIMEOUT_SECS as u64,
            ),
            fallback_batch: slq_schemas::DEFAULT_BATCH_SIZE as i64,
            wall_clock_budget: Duration::from_secs(50),
            hook_timeout: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(15),
        }
    }
}

// ---------------------------------------------------------------------------
// BridgeWorker
// ---------------------------------------------------------------------------

/// What happened to one envelope.
enum Disposition {
    /// Fully processed; ack at the end of the invocation.
    Acked,
    /// Routed to the DLQ (and already deleted from the source queue).
    DeadLettered,
    /// Left untouched; redelivers after its lease expires.
    Redeliver,
}

pub struct BridgeWorker {
    slots: Arc<dyn SlotStore>,
    queue: Arc<dyn IntakeQueue>,
    config: Arc<dyn ConfigSource>,
    ledger: Arc<dyn LedgerSink>,
    http: reqwest::Client,
    opts: WorkerOptions,
}

impl BridgeWorker {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        queue: Arc<dyn IntakeQueue>,
        config: Arc<dyn ConfigSource>,
        ledger: Arc<dyn LedgerSink>,
        opts: WorkerOptions,
    ) -> Self {
        Self {
            slots,
            queue,
            config,
            ledger,
            http: reqwest::Client::new(),
            opts,
        }
    }

    /// Drain one batch. `pool_hint` lets the trigger name a pool whose
    /// configured `visibility_timeout`/`batch_size` parameterize the read;
    /// without it (or without a config row) the fallback constants apply.
    ///
    /// Errors only when the initial queue read fails — that is fatal for the
    /// invocation, nothing has been acked, and the next scheduled invocation
    /// retries.
    pub async fn drain_once(&self, pool_hint: Option<&str>) -> Result<DrainSummary> {
        let started = Instant::now();

        let (visibility, batch_size) = self.read_params(pool_hint).await;
        let batch = self
            .queue
            .read(visibility, batch_size)
            .await
            .context("intake queue read failed")?;

        if batch.is_empty() {
            return Ok(DrainSummary::empty());
        }

        let total = batch.len() as u32;
        let mut cfg_cache: HashMap<String, Option<PoolConfig>> = HashMap::new();
        let mut ack: Vec<i64> = Vec::new();
        let mut dlq = 0u32;

        for envelope in &batch {
            if started.elapsed() >= self.opts.wall_clock_budget {
                warn!(
                    acked = ack.len(),
                    remaining = total as usize - ack.len() - dlq as usize,
                    "wall-clock budget reached; stopping new work"
                );
                break;
            }

            match self.process_one(envelope, &mut cfg_cache).await {
                Disposition::Acked => ack.push(envelope.msg_id),
                Disposition::DeadLettered => dlq += 1,
                Disposition::Redeliver => {}
            }
        }

        let processed = ack.len() as u32;
        if !ack.is_empty() {
            if let Err(err) = self.queue.delete(&ack).await {
                // The ledger insert is idempotent on resource_id, so the
                // redelivered messages no-op through commit next time.
                warn!(error = %err, count = ack.len(), "batch acknowledgement failed; messages will redeliver");
            }
        }

        info!(processed, dlq, total, "drain complete");
        Ok(DrainSummary {
            processed,
            dlq,
            total,
        })
    }

    async fn read_params(&self, pool_hint: Option<&str>) -> (Duration, i64) {
        if let Some(pool_id) = pool_hint {
            match self.config.get(pool_id).await {
                Ok(Some(cfg)) => {
                    return (
                        Duration::from_secs(cfg.visibility_timeout_secs as u64),
                        cfg.batch_size as i64,
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(pool_id, error = %err, "config lookup for read params failed; using fallbacks");
                }
            }
        }
        (self.opts.fallback_visibility, self.opts.fallback_batch)
    }

    async fn process_one(
        &self,
        envelope: &MessageEnvelope,
        cfg_cache: &mut HashMap<String, Option<PoolConfig>>,
    ) -> Disposition {
        let mut payload: IntakePayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                return self
                    .dead_letter(envelope, &format!("malformed payload: {err}"))
                    .await;
            }
        };

        let cfg = match self.resolve_config(&payload.pool_id, cfg_cache).await {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(
                    msg_id = envelope.msg_id,
                    pool_id = %payload.pool_id,
                    error = %err,
                    "config lookup failed; leaving message to redeliver"
                );
                return Disposition::Redeliver;
            }
        };
        let cfg = match cfg {
            Some(cfg) if cfg.is_active => cfg,
            Some(_) => {
                return self
                    .dead_letter(envelope, &format!("pool {} is inactive", payload.pool_id))
                    .await;
            }
            None => {
                return self
                    .dead_letter(envelope, &format!("no config for pool {}", payload.pool_id))
                    .await;
            }
        };

        if envelope.read_ct > cfg.max_retries {
            return self
                .dead_letter(
                    envelope,
                    &format!(
                        "retry budget exhausted: read_ct {} > max_retries {}",
                        envelope.read_ct, cfg.max_retries
                    ),
                )
                .await;
        }

        // Validate. Only messages still in `queued` go through this; a
        // redelivered `validated` message resumes at commit.
        if payload.state == IntakeState::Queued {
            match &cfg.validation_webhook_url {
                Some(url) => {
                    match post_hook(
                        &self.http,
                        url,
                        payload.resource_id,
                        &payload,
                        self.opts.hook_timeout,
                    )
                    .await
                    {
                        HookOutcome::Accepted => {
                            payload.state = IntakeState::Validated;
                            // Persist the transition so no later state is
                            // observable before this one is durable.
                            if let Err(err) = self
                                .queue
                                .update_payload(envelope.msg_id, &payload.to_value())
                                .await
                            {
                                warn!(
                                    msg_id = envelope.msg_id,
                                    error = %err,
                                    "failed to persist validated state; leaving message to redeliver"
                                );
                                return Disposition::Redeliver;
                            }
                        }
                        HookOutcome::Transient(why) => {
                            info!(
                                msg_id = envelope.msg_id,
                                resource_id = %payload.resource_id,
                                why,
                                "validation failed transiently"
                            );
                            return Disposition::Redeliver;
                        }
                    }
                }
                // No validator configured: vacuously validated. Nothing to
                // persist — repeating this on redelivery costs nothing.
                None => payload.state = IntakeState::Validated,
            }
        }

        // Commit, state now validated or committed. Webhook when configured,
        // otherwise the ledger RPC. Both are idempotent on resource_id.
        match &cfg.commit_webhook_url {
            Some(url) => {
                match post_hook(
                    &self.http,
                    url,
                    payload.resource_id,
                    &payload,
                    self.opts.hook_timeout,
                )
                .await
                {
                    HookOutcome::Accepted => {}
                    HookOutcome::Transient(why) => {
                        info!(
                            msg_id = envelope.msg_id,
                            resource_id = %payload.resource_id,
                            why,
                            "commit webhook failed transiently"
                        );
                        return Disposition::Redeliver;
                    }
                }
            }
            None => {
                let commit = self.ledger.commit(&cfg.commit_rpc_name, &payload);
                match tokio::time::timeout(self.opts.rpc_timeout, commit).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        info!(
                            msg_id = envelope.msg_id,
                            resource_id = %payload.resource_id,
                            error = %err,
                            "ledger commit failed transiently"
                        );
                        return Disposition::Redeliver;
                    }
                    Err(_) => {
                        info!(
                            msg_id = envelope.msg_id,
                            resource_id = %payload.resource_id,
                            "ledger commit timed out"
                        );
                        return Disposition::Redeliver;
                    }
                }
            }
        }
        payload.state = IntakeState::Committed;

        // Conditional RESERVED → CONSUMED. The ledger is authoritative: a
        // failure (or a false return — concurrent reaper or prior attempt)
        // never fails the message.
        match self.slots.mark_consumed(payload.resource_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    resource_id = %payload.resource_id,
                    "slot not RESERVED at consume time; already handled"
                );
            }
            Err(err) => {
                warn!(
                    resource_id = %payload.resource_id,
                    error = %err,
                    "mark_consumed failed after successful commit; ledger is authoritative"
                );
            }
        }

        Disposition::Acked
    }

    async fn resolve_config(
        &self,
        pool_id: &str,
        cache: &mut HashMap<String, Option<PoolConfig>>,
    ) -> Result<Option<PoolConfig>> {
        if let Some(cached) = cache.get(pool_id) {
            return Ok(cached.clone());
        }
        let cfg = self.config.get(pool_id).await?;
        cache.insert(pool_id.to_string(), cfg.clone());
        Ok(cfg)
    }

    async fn dead_letter(&self, envelope: &MessageEnvelope, reason: &str) -> Disposition {
        match self
            .queue
            .move_to_dlq(envelope.msg_id, &envelope.payload, envelope.read_ct, reason)
            .await
        {
            Ok(dlq_msg_id) => {
                warn!(
                    msg_id = envelope.msg_id,
                    dlq_msg_id, reason, "message routed to DLQ"
                );
                Disposition::DeadLettered
            }
            Err(err) => {
                warn!(
                    msg_id = envelope.msg_id,
                    error = %err,
                    "DLQ routing failed; message will redeliver"
                );
                Disposition::Redeliver
            }
        }
    }
}
