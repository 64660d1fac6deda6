//! Repository implementations using SeaORM

pub mod book_repository;
pub mod category_repository;
pub mod transaction_repository;
pub mod user_repository;

pub use book_repository::SeaOrmBookRepository;
pub use category_repository::SeaOrmCategoryRepository;
pub use transaction_repository::SeaOrmTransactionRepository;
pub use user_repository::SeaOrmUserRepository;

use crate::domain::{DomainError, Transaction};
use crate::models::book_transaction;

fn to_transactions(
    models: Vec<book_transaction::Model>,
) -> Result<Vec<Transaction>, DomainError> {
    models.into_iter().map(Transaction::try_from).collect()
}
