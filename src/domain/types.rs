//! Entity types and the enums stored as text columns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Displayed availability of a book, always computed from its copy count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Unavailable,
}

impl BookStatus {
    pub fn from_available(available_copies: i32) -> Self {
        if available_copies > 0 {
            BookStatus::Available
        } else {
            BookStatus::Unavailable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Issue,
    Reservation,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Issue => "issue",
            TransactionKind::Reservation => "reservation",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(TransactionKind::Issue),
            "reservation" => Ok(TransactionKind::Reservation),
            other => Err(DomainError::Database(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle state of a transaction.
///
/// Only `Active`, `Completed` and `Cancelled` are ever stored; `Overdue` is
/// derived from an active transaction whose window has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Active,
    Completed,
    Cancelled,
    Overdue,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Overdue => "overdue",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TransactionStatus::Active),
            "completed" => Ok(TransactionStatus::Completed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(DomainError::Database(format!(
                "unknown transaction status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Member,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Member => "member",
            UserType::Admin => "admin",
        }
    }
}

impl FromStr for UserType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(UserType::Member),
            "admin" => Ok(UserType::Admin),
            other => Err(DomainError::Database(format!("unknown user type '{}'", other))),
        }
    }
}

/// Book data for API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub name: String,
    pub alternate_title: Option<String>,
    pub author: String,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl Book {
    pub fn status(&self) -> BookStatus {
        BookStatus::from_available(self.available_copies)
    }

    pub fn availability(&self) -> Availability {
        Availability {
            book_id: self.id,
            available_copies: self.available_copies,
            total_copies: self.total_copies,
            status: self.status(),
        }
    }
}

impl From<crate::models::book::Model> for Book {
    fn from(m: crate::models::book::Model) -> Self {
        Book {
            id: m.id,
            name: m.name,
            alternate_title: m.alternate_title,
            author: m.author,
            language: m.language,
            publisher: m.publisher,
            total_copies: m.total_copies,
            available_copies: m.available_copies,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Copy counts of a single book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub book_id: i32,
    pub available_copies: i32,
    pub total_copies: i32,
    pub status: BookStatus,
}

/// Category data for API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

impl From<crate::models::book_category::Model> for Category {
    fn from(m: crate::models::book_category::Model) -> Self {
        Category {
            id: m.id,
            name: m.name,
        }
    }
}

/// User data with both transaction lists resolved to ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub user_type: UserType,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub points: i32,
    pub is_admin: bool,
    pub active_transactions: Vec<i32>,
    pub previous_transactions: Vec<i32>,
}

/// A single issue or reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub book_name: String,
    pub borrower_name: String,
    pub kind: TransactionKind,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    /// Stored status; use [`Transaction::status_on`] for reporting.
    pub status: TransactionStatus,
}

impl Transaction {
    /// Status as reported on `today`: active transactions past their window
    /// show as overdue.
    pub fn status_on(&self, today: NaiveDate) -> TransactionStatus {
        match self.status {
            TransactionStatus::Active if self.return_date.is_none() && self.to_date < today => {
                TransactionStatus::Overdue
            }
            status => status,
        }
    }
}

impl TryFrom<crate::models::book_transaction::Model> for Transaction {
    type Error = DomainError;

    fn try_from(m: crate::models::book_transaction::Model) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: m.id,
            book_id: m.book_id,
            user_id: m.user_id,
            book_name: m.book_name,
            borrower_name: m.borrower_name,
            kind: m.transaction_type.parse()?,
            from_date: m.from_date,
            to_date: m.to_date,
            return_date: m.return_date,
            status: m.status.parse()?,
        })
    }
}
