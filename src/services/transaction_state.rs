//! Transaction State Machine
//!
//! `active -> completed | cancelled`. Overdue is never stored; an active
//! transaction past its `to_date` completes exactly like any other.
//! Every function takes the caller's connection so the circulation service
//! can run them inside one database transaction.

use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use super::inventory_ledger;
use crate::domain::{DomainError, Transaction, TransactionKind, TransactionStatus};
use crate::models::book_transaction::{self, Entity as TransactionEntity};
use crate::models::user_transactions::{self, Entity as ListEntity};
use crate::models::{book, user};

pub fn validate_window(from: NaiveDate, to: NaiveDate) -> Result<(), DomainError> {
    if from > to {
        return Err(DomainError::InvalidInput(format!(
            "from date {} is after to date {}",
            from, to
        )));
    }
    Ok(())
}

/// Highest number of `windows` covering a single day of `[from, to]`.
/// All bounds are inclusive.
pub fn peak_overlap(windows: &[(NaiveDate, NaiveDate)], from: NaiveDate, to: NaiveDate) -> usize {
    let mut events: Vec<(NaiveDate, i32)> = Vec::with_capacity(windows.len() * 2);

    for &(start, end) in windows {
        let start = start.max(from);
        let end = end.min(to);
        if start > end {
            continue;
        }
        events.push((start, 1));
        if let Some(after) = end.succ_opt() {
            events.push((after, -1));
        }
    }

    // Ends sort before starts on the same day
    events.sort();

    let mut current = 0i32;
    let mut peak = 0i32;
    for (_, delta) in events {
        current += delta;
        peak = peak.max(current);
    }
    peak as usize
}

/// Fail with `OverlapViolation` if one more window over `[from, to]` would
/// book more copies of the book than it has.
pub async fn ensure_window_free<C: ConnectionTrait>(
    conn: &C,
    book: &book::Model,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(), DomainError> {
    let windows: Vec<(NaiveDate, NaiveDate)> = TransactionEntity::find()
        .filter(book_transaction::Column::BookId.eq(book.id))
        .filter(book_transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .filter(book_transaction::Column::FromDate.lte(to))
        .filter(book_transaction::Column::ToDate.gte(from))
        .all(conn)
        .await?
        .into_iter()
        .map(|t| (t.from_date, t.to_date))
        .collect();

    let booked = peak_overlap(&windows, from, to);
    if booked >= book.total_copies.max(0) as usize {
        tracing::debug!(
            "Book #{} has {} of {} copies booked between {} and {}",
            book.id,
            booked,
            book.total_copies,
            from,
            to
        );
        return Err(DomainError::OverlapViolation {
            book_id: book.id,
            from,
            to,
        });
    }
    Ok(())
}

/// Insert a new active transaction and append it to the user's active list.
///
/// For issues the caller must already have taken a copy through
/// [`inventory_ledger::reserve_copy`].
pub async fn create<C: ConnectionTrait>(
    conn: &C,
    kind: TransactionKind,
    book: &book::Model,
    user: &user::Model,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Transaction, DomainError> {
    validate_window(from, to)?;
    let now = chrono::Utc::now().to_rfc3339();

    let saved = book_transaction::ActiveModel {
        book_id: Set(book.id),
        user_id: Set(user.id),
        book_name: Set(book.name.clone()),
        borrower_name: Set(user.full_name.clone()),
        transaction_type: Set(kind.as_str().to_owned()),
        from_date: Set(from),
        to_date: Set(to),
        return_date: Set(None),
        status: Set(TransactionStatus::Active.as_str().to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    user_transactions::ActiveModel {
        user_id: Set(user.id),
        transaction_id: Set(saved.id),
        list: Set(user_transactions::ACTIVE.to_owned()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Transaction::try_from(saved)
}

/// Close an active or overdue transaction on `return_date`.
///
/// Issues put their copy back through the ledger. Completing twice fails with
/// `InvalidTransition` and leaves the count untouched.
pub async fn complete<C: ConnectionTrait>(
    conn: &C,
    transaction_id: i32,
    return_date: NaiveDate,
) -> Result<Transaction, DomainError> {
    let model = load(conn, transaction_id).await?;
    let current = Transaction::try_from(model.clone())?;

    if current.status.is_terminal() {
        return Err(DomainError::InvalidTransition {
            transaction_id,
            action: "returned",
            status: current.status.to_string(),
        });
    }
    if return_date < current.from_date {
        return Err(DomainError::InvalidInput(format!(
            "return date {} is before from date {}",
            return_date, current.from_date
        )));
    }

    let mut active: book_transaction::ActiveModel = model.into();
    active.status = Set(TransactionStatus::Completed.as_str().to_owned());
    active.return_date = Set(Some(return_date));
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    let updated = active.update(conn).await?;

    if current.kind == TransactionKind::Issue {
        inventory_ledger::release_copy(conn, current.book_id).await?;
    }

    move_to_history(conn, &updated).await?;
    Transaction::try_from(updated)
}

/// Withdraw an active reservation. Issued copies have to be returned instead.
pub async fn cancel<C: ConnectionTrait>(
    conn: &C,
    transaction_id: i32,
) -> Result<Transaction, DomainError> {
    let model = load(conn, transaction_id).await?;
    let current = Transaction::try_from(model.clone())?;

    if current.status != TransactionStatus::Active {
        return Err(DomainError::InvalidTransition {
            transaction_id,
            action: "cancelled",
            status: current.status.to_string(),
        });
    }
    if current.kind != TransactionKind::Reservation {
        return Err(DomainError::InvalidTransition {
            transaction_id,
            action: "cancelled",
            status: "issued".to_string(),
        });
    }

    let mut active: book_transaction::ActiveModel = model.into();
    active.status = Set(TransactionStatus::Cancelled.as_str().to_owned());
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    let updated = active.update(conn).await?;

    move_to_history(conn, &updated).await?;
    Transaction::try_from(updated)
}

async fn load<C: ConnectionTrait>(
    conn: &C,
    transaction_id: i32,
) -> Result<book_transaction::Model, DomainError> {
    TransactionEntity::find_by_id(transaction_id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Transaction", transaction_id))
}

async fn move_to_history<C: ConnectionTrait>(
    conn: &C,
    transaction: &book_transaction::Model,
) -> Result<(), DomainError> {
    let removed = ListEntity::delete_many()
        .filter(user_transactions::Column::TransactionId.eq(transaction.id))
        .filter(user_transactions::Column::List.eq(user_transactions::ACTIVE))
        .exec(conn)
        .await?;

    if removed.rows_affected != 1 {
        return Err(DomainError::InvariantViolation(format!(
            "transaction #{} was not on user #{}'s active list",
            transaction.id, transaction.user_id
        )));
    }

    user_transactions::ActiveModel {
        user_id: Set(transaction.user_id),
        transaction_id: Set(transaction.id),
        list: Set(user_transactions::HISTORY.to_owned()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn reversed_window_is_rejected() {
        assert!(validate_window(d("2024-01-15"), d("2024-01-15")).is_ok());
        assert!(matches!(
            validate_window(d("2024-02-01"), d("2024-01-15")),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn no_windows_means_no_overlap() {
        assert_eq!(peak_overlap(&[], d("2024-01-01"), d("2024-01-31")), 0);
    }

    #[test]
    fn touching_windows_overlap_on_shared_day() {
        let windows = [(d("2024-01-01"), d("2024-01-10"))];
        assert_eq!(peak_overlap(&windows, d("2024-01-10"), d("2024-01-20")), 1);
        assert_eq!(peak_overlap(&windows, d("2024-01-11"), d("2024-01-20")), 0);
    }

    #[test]
    fn disjoint_windows_inside_range_do_not_stack() {
        // Two loans back to back inside the requested range never coexist
        let windows = [
            (d("2024-01-01"), d("2024-01-10")),
            (d("2024-01-11"), d("2024-01-20")),
        ];
        assert_eq!(peak_overlap(&windows, d("2024-01-01"), d("2024-01-31")), 1);
    }

    #[test]
    fn nested_windows_stack() {
        let windows = [
            (d("2024-01-01"), d("2024-01-31")),
            (d("2024-01-05"), d("2024-01-07")),
            (d("2024-01-06"), d("2024-01-20")),
        ];
        assert_eq!(peak_overlap(&windows, d("2024-01-01"), d("2024-01-31")), 3);
        // Clipped to a range that only sees the long window
        assert_eq!(peak_overlap(&windows, d("2024-01-25"), d("2024-01-31")), 1);
    }
}
