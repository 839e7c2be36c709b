//! Ledger aggregation and bounded-concurrency payment settlement.
//!
//! - [`domain`] - charges, ledger items and the ports to external systems
//! - [`application`] - the batch executor and the payment orchestrator
//! - [`infrastructure`] - in-memory charge source and simulated gateway
//! - [`interfaces`] - CSV input and CSV/JSON output
//! - [`telemetry`] - `tracing` subscriber setup for the binary

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
