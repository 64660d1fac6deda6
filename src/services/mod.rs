//! Services Layer
//!
//! The inventory ledger and the transaction state machine are free functions
//! over any SeaORM connection; the circulation service composes them inside a
//! single database transaction under per-entity locks.

pub mod circulation_service;
pub mod inventory_ledger;
pub mod locks;
pub mod transaction_state;

// Re-export for convenience
pub use circulation_service::{CirculationPolicy, CirculationReceipt, CirculationService};
pub use locks::{LockKey, LockRegistry};
