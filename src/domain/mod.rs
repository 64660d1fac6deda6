//! Domain layer - Pure business abstractions
//!
//! Entity types, repository contracts and the error taxonomy shared by the
//! ledger, the transaction state machine and the circulation service.

pub mod errors;
pub mod repositories;
pub mod types;

pub use errors::DomainError;
pub use repositories::*;
pub use types::*;
