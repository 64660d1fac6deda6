//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.
//! Repositories, the inventory ledger and the transaction state machine all
//! return them, and the circulation service hands them to callers unchanged.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Unknown id
    #[error("{0} not found")]
    NotFound(String),
    /// Uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),
    /// No copy of the book is on the shelf
    #[error("Book {book_id} is out of stock")]
    OutOfStock { book_id: i32 },
    /// Honoring the requested window would book more copies than exist
    #[error("Book {book_id} is fully booked between {from} and {to}")]
    OverlapViolation {
        book_id: i32,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    },
    /// Illegal state-machine move
    #[error("Transaction {transaction_id} cannot be {action} while {status}")]
    InvalidTransition {
        transaction_id: i32,
        action: &'static str,
        status: String,
    },
    /// Copy counts left their bounds; signals a bug in the caller
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    /// A lock could not be acquired in time; safe to retry
    #[error("Resource busy: {0}")]
    Busy(String),
    /// Caller supplied malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Database/persistence error
    #[error("Database error: {0}")]
    Database(String),
}

impl DomainError {
    pub fn not_found(entity: &str, id: i32) -> Self {
        DomainError::NotFound(format!("{} {}", entity, id))
    }

    /// Only contention errors may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Busy(_))
    }
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(msg)) = e.sql_err() {
            return DomainError::Conflict(msg);
        }
        DomainError::Database(e.to_string())
    }
}
