//! SeaORM implementation of TransactionRepository

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use super::to_transactions;
use crate::domain::{DomainError, Transaction, TransactionRepository, TransactionStatus};
use crate::models::book_transaction::{Column, Entity as TransactionEntity};

/// SeaORM-based implementation of TransactionRepository
pub struct SeaOrmTransactionRepository {
    db: DatabaseConnection,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<Transaction>, DomainError> {
        TransactionEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn find_by_book(&self, book_id: i32) -> Result<Vec<Transaction>, DomainError> {
        let models = TransactionEntity::find()
            .filter(Column::BookId.eq(book_id))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        to_transactions(models)
    }

    async fn find_by_user(&self, user_id: i32) -> Result<Vec<Transaction>, DomainError> {
        let models = TransactionEntity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        to_transactions(models)
    }

    async fn find_overdue(&self, today: NaiveDate) -> Result<Vec<Transaction>, DomainError> {
        let models = TransactionEntity::find()
            .filter(Column::Status.eq(TransactionStatus::Active.as_str()))
            .filter(Column::ReturnDate.is_null())
            .filter(Column::ToDate.lt(today))
            .order_by_asc(Column::ToDate)
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        to_transactions(models)
    }
}
