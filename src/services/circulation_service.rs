//! Circulation Service - issue, reserve, return and cancel as atomic units.
//!
//! Each request locks the book before the user, opens one database
//! transaction and commits only after every step succeeded. An early return
//! or a dropped future drops the `DatabaseTransaction`, which rolls back,
//! and the lock guards go with it.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::Serialize;

use super::locks::{LockKey, LockRegistry};
use super::{inventory_ledger, transaction_state};
use crate::config::{Config, MAX_RETRY_ATTEMPTS};
use crate::domain::{
    Availability, BookStatus, DomainError, Transaction, TransactionKind, TransactionRepository,
};
use crate::infrastructure::SeaOrmTransactionRepository;
use crate::models::book::{self, Entity as BookEntity};
use crate::models::book_transaction::Entity as TransactionEntity;
use crate::models::user::{self, Entity as UserEntity};

/// Longest single wait between two attempts
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Tunables for the circulation service
#[derive(Debug, Clone)]
pub struct CirculationPolicy {
    pub lock_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    /// Points for returning an issued book on or before its `to_date`
    pub return_points: i32,
}

impl From<&Config> for CirculationPolicy {
    fn from(config: &Config) -> Self {
        Self {
            lock_timeout: config.lock_timeout,
            retry_attempts: config.retry_attempts.clamp(1, MAX_RETRY_ATTEMPTS),
            retry_backoff: config.retry_backoff,
            return_points: config.return_points,
        }
    }
}

impl Default for CirculationPolicy {
    fn default() -> Self {
        CirculationPolicy::from(&Config::default())
    }
}

/// Outcome of a successful circulation request
#[derive(Debug, Clone, Serialize)]
pub struct CirculationReceipt {
    pub transaction: Transaction,
    pub availability: Availability,
    pub points_awarded: i32,
}

pub struct CirculationService {
    db: DatabaseConnection,
    transactions: SeaOrmTransactionRepository,
    locks: LockRegistry,
    policy: CirculationPolicy,
}

impl CirculationService {
    pub fn new(db: DatabaseConnection, policy: CirculationPolicy) -> Self {
        Self {
            transactions: SeaOrmTransactionRepository::new(db.clone()),
            db,
            locks: LockRegistry::new(policy.lock_timeout),
            policy,
        }
    }

    pub fn policy(&self) -> &CirculationPolicy {
        &self.policy
    }

    /// The registry every request locks through. Holding a key from outside
    /// fences that book or user off from circulation until the guard drops.
    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Lend a copy of a book to a user for `[from, to]`.
    pub async fn issue_book(
        &self,
        book_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CirculationReceipt, DomainError> {
        self.with_retry("issue_book", || self.try_issue(book_id, user_id, from, to))
            .await
    }

    /// Book future availability without taking a copy off the shelf.
    pub async fn reserve_book(
        &self,
        book_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CirculationReceipt, DomainError> {
        self.with_retry("reserve_book", || {
            self.try_reserve(book_id, user_id, from, to)
        })
        .await
    }

    /// Complete an issue or reservation on `return_date`.
    pub async fn return_book(
        &self,
        transaction_id: i32,
        return_date: NaiveDate,
    ) -> Result<CirculationReceipt, DomainError> {
        self.with_retry("return_book", || self.try_return(transaction_id, return_date))
            .await
    }

    /// Withdraw an active reservation.
    pub async fn cancel_reservation(
        &self,
        transaction_id: i32,
    ) -> Result<CirculationReceipt, DomainError> {
        self.with_retry("cancel_reservation", || self.try_cancel(transaction_id))
            .await
    }

    pub async fn availability(&self, book_id: i32) -> Result<Availability, DomainError> {
        inventory_ledger::availability(&self.db, book_id).await
    }

    /// Active transactions whose window ended before `today`.
    pub async fn overdue(&self, today: NaiveDate) -> Result<Vec<Transaction>, DomainError> {
        self.transactions.find_overdue(today).await
    }

    /// Run one attempt after another while the failure is `Busy`, backing off
    /// exponentially, up to the configured number of attempts (never more
    /// than [`MAX_RETRY_ATTEMPTS`]).
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_fn: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let attempts = self.policy.retry_attempts.clamp(1, MAX_RETRY_ATTEMPTS);
        let mut attempt = 1;

        loop {
            match attempt_fn().await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = backoff_delay(self.policy.retry_backoff, attempt);
                    tracing::warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        operation,
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(DomainError::InvariantViolation(msg)) => {
                    tracing::error!("DEFECT in {}: invariant violated: {}", operation, msg);
                    return Err(DomainError::InvariantViolation(msg));
                }
                other => return other,
            }
        }
    }

    async fn try_issue(
        &self,
        book_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CirculationReceipt, DomainError> {
        transaction_state::validate_window(from, to)?;

        let _locks = self
            .locks
            .acquire(&[LockKey::Book(book_id), LockKey::User(user_id)])
            .await?;
        let txn = self.db.begin().await?;

        let (book, user) = resolve(&txn, book_id, user_id).await?;

        // An empty shelf is reported as such before any window accounting
        if book.available_copies == 0 {
            return Err(DomainError::OutOfStock { book_id });
        }
        transaction_state::ensure_window_free(&txn, &book, from, to).await?;

        let available = inventory_ledger::reserve_copy(&txn, book_id).await?;
        let transaction =
            transaction_state::create(&txn, TransactionKind::Issue, &book, &user, from, to)
                .await?;

        txn.commit().await?;

        tracing::info!(
            "Issued '{}' (book #{}) to user #{} as transaction #{}, {} copies left",
            book.name,
            book_id,
            user_id,
            transaction.id,
            available
        );

        Ok(CirculationReceipt {
            transaction,
            availability: Availability {
                book_id,
                available_copies: available,
                total_copies: book.total_copies,
                status: BookStatus::from_available(available),
            },
            points_awarded: 0,
        })
    }

    async fn try_reserve(
        &self,
        book_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CirculationReceipt, DomainError> {
        transaction_state::validate_window(from, to)?;

        let _locks = self
            .locks
            .acquire(&[LockKey::Book(book_id), LockKey::User(user_id)])
            .await?;
        let txn = self.db.begin().await?;

        let (book, user) = resolve(&txn, book_id, user_id).await?;
        transaction_state::ensure_window_free(&txn, &book, from, to).await?;

        let transaction = transaction_state::create(
            &txn,
            TransactionKind::Reservation,
            &book,
            &user,
            from,
            to,
        )
        .await?;
        let availability = inventory_ledger::availability(&txn, book_id).await?;

        txn.commit().await?;

        tracing::info!(
            "Reserved '{}' (book #{}) for user #{} from {} to {} as transaction #{}",
            book.name,
            book_id,
            user_id,
            from,
            to,
            transaction.id
        );

        Ok(CirculationReceipt {
            transaction,
            availability,
            points_awarded: 0,
        })
    }

    async fn try_return(
        &self,
        transaction_id: i32,
        return_date: NaiveDate,
    ) -> Result<CirculationReceipt, DomainError> {
        let (book_id, user_id) = self.owners_of(transaction_id).await?;

        let _locks = self
            .locks
            .acquire(&[LockKey::Book(book_id), LockKey::User(user_id)])
            .await?;
        let txn = self.db.begin().await?;

        let transaction = transaction_state::complete(&txn, transaction_id, return_date).await?;

        let points_awarded = if transaction.kind == TransactionKind::Issue
            && return_date <= transaction.to_date
        {
            self.policy.return_points.max(0)
        } else {
            0
        };
        if points_awarded > 0 {
            UserEntity::update_many()
                .col_expr(
                    user::Column::Points,
                    Expr::col(user::Column::Points).add(points_awarded),
                )
                .filter(user::Column::Id.eq(user_id))
                .exec(&txn)
                .await?;
        }

        let availability = inventory_ledger::availability(&txn, book_id).await?;
        txn.commit().await?;

        tracing::info!(
            "Transaction #{} ({}) returned on {}, book #{} now {}/{} available, {} points",
            transaction_id,
            transaction.kind.as_str(),
            return_date,
            book_id,
            availability.available_copies,
            availability.total_copies,
            points_awarded
        );

        Ok(CirculationReceipt {
            transaction,
            availability,
            points_awarded,
        })
    }

    async fn try_cancel(&self, transaction_id: i32) -> Result<CirculationReceipt, DomainError> {
        let (book_id, user_id) = self.owners_of(transaction_id).await?;

        let _locks = self
            .locks
            .acquire(&[LockKey::Book(book_id), LockKey::User(user_id)])
            .await?;
        let txn = self.db.begin().await?;

        let transaction = transaction_state::cancel(&txn, transaction_id).await?;
        let availability = inventory_ledger::availability(&txn, book_id).await?;

        txn.commit().await?;

        tracing::info!(
            "Reservation #{} on book #{} cancelled by user #{}",
            transaction_id,
            book_id,
            user_id
        );

        Ok(CirculationReceipt {
            transaction,
            availability,
            points_awarded: 0,
        })
    }

    /// Book and user of a transaction. Both are immutable, so reading them
    /// before taking the locks is safe.
    async fn owners_of(&self, transaction_id: i32) -> Result<(i32, i32), DomainError> {
        let transaction = TransactionEntity::find_by_id(transaction_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Transaction", transaction_id))?;
        Ok((transaction.book_id, transaction.user_id))
    }
}

/// Wait before the attempt following `attempt`: `base * 2^(attempt - 1)`,
/// saturating at [`MAX_RETRY_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.checked_mul(factor)
        .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
}

async fn resolve<C: ConnectionTrait>(
    conn: &C,
    book_id: i32,
    user_id: i32,
) -> Result<(book::Model, user::Model), DomainError> {
    let book = BookEntity::find_by_id(book_id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Book", book_id))?;
    let user = UserEntity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("User", user_id))?;
    Ok((book, user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(25);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(25));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(50));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(200));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(Duration::from_millis(25), 40), MAX_RETRY_BACKOFF);
        assert_eq!(backoff_delay(Duration::MAX, 2), MAX_RETRY_BACKOFF);
        assert_eq!(backoff_delay(Duration::ZERO, 40), Duration::ZERO);
    }

    #[test]
    fn policy_from_config_caps_attempts() {
        let config = Config {
            retry_attempts: 1_000,
            ..Config::default()
        };
        assert_eq!(
            CirculationPolicy::from(&config).retry_attempts,
            MAX_RETRY_ATTEMPTS
        );
    }
}
