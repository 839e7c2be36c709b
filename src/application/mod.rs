//! Application layer orchestrating ledger queries and payment settlement.
//!
//! `batch` holds the bounded-concurrency executor. `orchestrator` defines the
//! `PaymentOrchestrator`, which reads charges through the `ChargeSource` port,
//! aggregates them and submits one payment job per ledger item to the executor.

pub mod batch;
pub mod orchestrator;
