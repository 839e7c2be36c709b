//! Domain layer: charges, ledger aggregation and the ports to external systems.
//!
//! Nothing here performs I/O. The ledger functions are pure and the ports are
//! traits implemented in `infrastructure`.

pub mod charge;
pub mod ledger;
pub mod ports;
