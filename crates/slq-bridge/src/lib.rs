//! Intake core: claim composite, bridge worker, and reaper over the store
//! trait seams.
//!
//! This crate owns no persistence. Every store it touches — slots, queues,
//! pool config, the ledger — sits behind an async trait defined in
//! [`stores`], with the Postgres implementations in `slq-db` and the
//! deterministic in-memory ones in `slq-testkit`. The worker and the claim
//! path are written against the traits only, so both implementations satisfy
//! the same contracts.

pub mod claim;
pub mod hooks;
pub mod reaper;
pub mod stores;
pub mod worker;

pub use claim::claim_resource_and_queue;
pub use hooks::{HookOutcome, IDEMPOTENCY_HEADER};
pub use reaper::{Reaper, DEFAULT_REAP_INTERVAL, DEFAULT_REAP_THRESHOLD};
pub use stores::{ConfigSource, IntakeQueue, LedgerSink, SlotStore};
pub use worker::{BridgeWorker, WorkerOptions};
