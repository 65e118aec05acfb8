//! Deterministic in-memory implementations of every intake-core store seam.
//!
//! No network I/O, no database, no randomness beyond slot-id generation.
//! Each `Mem*` type satisfies the same contract its Postgres counterpart in
//! `slq-db` does, plus deterministic test controls (lease expiry, lock
//! backdating, ledger outage injection) so the end-to-end scenarios under
//! `tests/` never sleep their way through a visibility timeout.

pub mod harness;
pub mod mem_config;
pub mod mem_ledger;
pub mod mem_queue;
pub mod mem_slots;

pub use harness::Harness;
pub use mem_config::MemConfigStore;
pub use mem_ledger::MemLedger;
pub use mem_queue::{MemQueue, MemQueues};
pub use mem_slots::MemSlotStore;
