//! Inventory Ledger - the only code path that writes `available_copies`.
//!
//! Both mutations are single conditional UPDATE statements, so a count can
//! never leave `0..=total_copies` even if a caller skipped the book lock.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::domain::{Availability, BookStatus, DomainError};
use crate::models::book::{self, Entity as BookEntity};

async fn load<C: ConnectionTrait>(conn: &C, book_id: i32) -> Result<book::Model, DomainError> {
    BookEntity::find_by_id(book_id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Book", book_id))
}

/// Take one copy off the shelf and return the new available count.
pub async fn reserve_copy<C: ConnectionTrait>(conn: &C, book_id: i32) -> Result<i32, DomainError> {
    let result = BookEntity::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).sub(1),
        )
        .col_expr(
            book::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().to_rfc3339()),
        )
        .filter(book::Column::Id.eq(book_id))
        .filter(book::Column::AvailableCopies.gt(0))
        .exec(conn)
        .await?;

    let book = load(conn, book_id).await?;
    if result.rows_affected == 0 {
        return Err(DomainError::OutOfStock { book_id });
    }

    tracing::debug!(
        "Book #{} copy reserved, {}/{} available",
        book_id,
        book.available_copies,
        book.total_copies
    );
    Ok(book.available_copies)
}

/// Put one copy back on the shelf and return the new available count.
///
/// Releasing a copy of a book whose copies are all on the shelf means the
/// caller released twice; that is reported as an invariant violation.
pub async fn release_copy<C: ConnectionTrait>(conn: &C, book_id: i32) -> Result<i32, DomainError> {
    let result = BookEntity::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).add(1),
        )
        .col_expr(
            book::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().to_rfc3339()),
        )
        .filter(book::Column::Id.eq(book_id))
        .filter(Expr::cust("available_copies < total_copies"))
        .exec(conn)
        .await?;

    let book = load(conn, book_id).await?;
    if result.rows_affected == 0 {
        return Err(DomainError::InvariantViolation(format!(
            "release of book #{} would exceed its {} copies",
            book_id, book.total_copies
        )));
    }

    tracing::debug!(
        "Book #{} copy released, {}/{} available",
        book_id,
        book.available_copies,
        book.total_copies
    );
    Ok(book.available_copies)
}

/// Current copy counts of a book with its derived status.
pub async fn availability<C: ConnectionTrait>(
    conn: &C,
    book_id: i32,
) -> Result<Availability, DomainError> {
    let book = load(conn, book_id).await?;
    Ok(Availability {
        book_id: book.id,
        available_copies: book.available_copies,
        total_copies: book.total_copies,
        status: BookStatus::from_available(book.available_copies),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

    async fn setup(total: i32, available: i32) -> (DatabaseConnection, i32) {
        let db = db::init_db("sqlite::memory:")
            .await
            .expect("Failed to init DB");
        let now = chrono::Utc::now().to_rfc3339();
        let book = book::ActiveModel {
            name: Set("The Left Hand of Darkness".to_string()),
            author: Set("Ursula K. Le Guin".to_string()),
            total_copies: Set(total),
            available_copies: Set(available),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .expect("Failed to create book");
        (db, book.id)
    }

    #[tokio::test]
    async fn reserve_decrements_until_out_of_stock() {
        let (db, id) = setup(2, 2).await;

        assert_eq!(reserve_copy(&db, id).await, Ok(1));
        assert_eq!(reserve_copy(&db, id).await, Ok(0));
        assert_eq!(
            reserve_copy(&db, id).await,
            Err(DomainError::OutOfStock { book_id: id })
        );

        let availability = availability(&db, id).await.unwrap();
        assert_eq!(availability.available_copies, 0);
        assert_eq!(availability.status, BookStatus::Unavailable);
    }

    #[tokio::test]
    async fn release_never_exceeds_total() {
        let (db, id) = setup(1, 0).await;

        assert_eq!(release_copy(&db, id).await, Ok(1));
        let err = release_copy(&db, id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(availability(&db, id).await.unwrap().available_copies, 1);
    }

    #[tokio::test]
    async fn unknown_book_is_not_found() {
        let (db, _) = setup(1, 1).await;
        assert!(matches!(
            reserve_copy(&db, 999).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            release_copy(&db, 999).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
