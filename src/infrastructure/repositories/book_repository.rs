//! SeaORM implementation of BookRepository

use std::collections::BTreeSet;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::to_transactions;
use crate::domain::{Book, BookRepository, Category, DomainError, NewBook, Transaction, UpdateBook};
use crate::models::book::{ActiveModel, Entity as BookEntity};
use crate::models::book_category::{self, Entity as CategoryEntity};
use crate::models::book_category_links::{self, Entity as LinkEntity};
use crate::models::book_transaction::{self, Entity as TransactionEntity};

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidInput(format!("{} must not be blank", field)));
    }
    Ok(())
}

/// Replace the category links of a book, resolving every id first.
async fn link_categories<C: ConnectionTrait>(
    conn: &C,
    book_id: i32,
    category_ids: &[i32],
) -> Result<(), DomainError> {
    let wanted: BTreeSet<i32> = category_ids.iter().copied().collect();

    if !wanted.is_empty() {
        let found: BTreeSet<i32> = CategoryEntity::find()
            .filter(book_category::Column::Id.is_in(wanted.iter().copied()))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        if let Some(missing) = wanted.difference(&found).next() {
            return Err(DomainError::not_found("Category", *missing));
        }
    }

    LinkEntity::delete_many()
        .filter(book_category_links::Column::BookId.eq(book_id))
        .exec(conn)
        .await?;

    for category_id in wanted {
        book_category_links::ActiveModel {
            book_id: Set(book_id),
            category_id: Set(category_id),
        }
        .insert(conn)
        .await?;
    }

    Ok(())
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn create(&self, input: NewBook) -> Result<Book, DomainError> {
        require_text("name", &input.name)?;
        require_text("author", &input.author)?;
        if input.total_copies < 0 {
            return Err(DomainError::InvalidInput(format!(
                "total_copies must be >= 0, got {}",
                input.total_copies
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.db.begin().await?;

        let book = ActiveModel {
            name: Set(input.name),
            alternate_title: Set(input.alternate_title),
            author: Set(input.author),
            language: Set(input.language),
            publisher: Set(input.publisher),
            total_copies: Set(input.total_copies),
            available_copies: Set(input.total_copies),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        link_categories(&txn, book.id, &input.category_ids).await?;

        txn.commit().await?;
        tracing::debug!("Created book #{} '{}'", book.id, book.name);
        Ok(book.into())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError> {
        let book = BookEntity::find_by_id(id).one(&self.db).await?;
        Ok(book.map(Book::from))
    }

    async fn find_all(&self) -> Result<Vec<Book>, DomainError> {
        let books = BookEntity::find()
            .order_by_asc(crate::models::book::Column::Id)
            .all(&self.db)
            .await?;
        Ok(books.into_iter().map(Book::from).collect())
    }

    async fn update(&self, id: i32, input: UpdateBook) -> Result<Book, DomainError> {
        let txn = self.db.begin().await?;

        let existing = BookEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::not_found("Book", id))?;

        let mut active: ActiveModel = existing.into();

        if let Some(name) = input.name {
            require_text("name", &name)?;
            active.name = Set(name);
        }
        if let Some(author) = input.author {
            require_text("author", &author)?;
            active.author = Set(author);
        }
        if let Some(alternate_title) = input.alternate_title {
            active.alternate_title = Set(alternate_title);
        }
        if let Some(language) = input.language {
            active.language = Set(language);
        }
        if let Some(publisher) = input.publisher {
            active.publisher = Set(publisher);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&txn).await?;

        if let Some(category_ids) = input.category_ids {
            link_categories(&txn, id, &category_ids).await?;
        }

        txn.commit().await?;
        Ok(updated.into())
    }

    async fn categories_of(&self, book_id: i32) -> Result<Vec<Category>, DomainError> {
        let book = BookEntity::find_by_id(book_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Book", book_id))?;

        let categories = book
            .find_related(CategoryEntity)
            .order_by_asc(book_category::Column::Name)
            .all(&self.db)
            .await?;

        Ok(categories.into_iter().map(Category::from).collect())
    }

    async fn transactions_of(&self, book_id: i32) -> Result<Vec<Transaction>, DomainError> {
        if BookEntity::find_by_id(book_id).one(&self.db).await?.is_none() {
            return Err(DomainError::not_found("Book", book_id));
        }

        let transactions = TransactionEntity::find()
            .filter(book_transaction::Column::BookId.eq(book_id))
            .order_by_asc(book_transaction::Column::Id)
            .all(&self.db)
            .await?;

        to_transactions(transactions)
    }
}
