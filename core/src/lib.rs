//! dispute-core — dispute lifecycle and Network reconciliation engine
//! for QR point-of-sale payments.
//!
//! Two independently-evolving state machines — the internal dispute record
//! and the external payment network's case — are kept reconciled despite
//! duplicated, out-of-order notifications. Every accepted change lands on
//! an append-only timeline ledger; a weighted fraud score and a fixed
//! decision table drive automated or human resolution.
//!
//! Module map:
//!   - `engine`        — the operation surface (`DisputeEngine`)
//!   - `state_machine` — triggers and the fixed transition table
//!   - `reconcile`     — the only module aware of Network vocabulary
//!   - `fraud`         — pure weighted risk aggregation
//!   - `resolution`    — deterministic resolution decision table
//!   - `timeline`      — the append-only ledger types
//!   - `dispute`       — the aggregate and its value types
//!   - `store`         — SQLite persistence (the only SQL in the crate)
//!   - `clock`, `config`, `notifier`, `network` — injected collaborators

pub mod clock;
pub mod config;
pub mod dispute;
pub mod engine;
pub mod error;
pub mod fraud;
pub mod network;
pub mod notifier;
pub mod reconcile;
pub mod resolution;
pub mod state_machine;
pub mod store;
pub mod timeline;
pub mod types;

pub use engine::{DisputeEngine, ResolveAttempt};
pub use error::{DisputeError, DisputeResult};
