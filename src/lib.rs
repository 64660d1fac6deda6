//! Library circulation engine.
//!
//! Keeps book inventory, borrower records and lending transactions
//! consistent while issues, reservations, returns and cancellations arrive
//! concurrently.

pub mod domain;
pub mod infrastructure;
pub mod models;
pub mod services;

pub use infrastructure::auth;
pub use infrastructure::config;
pub use infrastructure::db;
pub use infrastructure::seed;
