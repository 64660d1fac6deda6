//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{Book, Category, DomainError, Transaction, User, UserType};

/// Input for creating a book
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewBook {
    pub name: String,
    pub alternate_title: Option<String>,
    pub author: String,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub total_copies: i32,
    #[serde(default)]
    pub category_ids: Vec<i32>,
}

/// Input for updating book metadata. Copy counts belong to the inventory ledger.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateBook {
    pub name: Option<String>,
    pub alternate_title: Option<Option<String>>,
    pub author: Option<String>,
    pub language: Option<Option<String>>,
    pub publisher: Option<Option<String>>,
    /// Replaces the whole category set when present
    pub category_ids: Option<Vec<i32>>,
}

/// Input for creating a user
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewUser {
    pub user_type: UserType,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password_hash: String,
}

/// Input for updating a user's profile
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
}

/// Repository trait for Book entity
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Create a new book with every copy on the shelf
    async fn create(&self, input: NewBook) -> Result<Book, DomainError>;

    /// Find a single book by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError>;

    /// Find a book by ID, failing with `NotFound`
    async fn get(&self, id: i32) -> Result<Book, DomainError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Book", id))
    }

    /// Find all books ordered by id
    async fn find_all(&self) -> Result<Vec<Book>, DomainError>;

    /// Update book metadata and, optionally, its categories
    async fn update(&self, id: i32, input: UpdateBook) -> Result<Book, DomainError>;

    /// Categories linked to a book
    async fn categories_of(&self, book_id: i32) -> Result<Vec<Category>, DomainError>;

    /// Every transaction of a book, oldest first
    async fn transactions_of(&self, book_id: i32) -> Result<Vec<Transaction>, DomainError>;
}

/// Repository trait for BookCategory entity
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, name: String) -> Result<Category, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, DomainError>;

    async fn find_all(&self) -> Result<Vec<Category>, DomainError>;

    async fn rename(&self, id: i32, name: String) -> Result<Category, DomainError>;

    /// Books linked to a category
    async fn books_in(&self, category_id: i32) -> Result<Vec<Book>, DomainError>;
}

/// Repository trait for User entity
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, input: NewUser) -> Result<User, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, DomainError>;

    async fn get(&self, id: i32) -> Result<User, DomainError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    async fn find_all(&self) -> Result<Vec<User>, DomainError>;

    async fn update(&self, id: i32, input: UpdateUser) -> Result<User, DomainError>;

    /// Transactions on the user's active list, in list order
    async fn active_transactions(&self, user_id: i32) -> Result<Vec<Transaction>, DomainError>;

    /// Transactions on the user's history list, in list order
    async fn history(&self, user_id: i32) -> Result<Vec<Transaction>, DomainError>;
}

/// Read access to BookTransaction records.
///
/// Transactions are only ever written by the circulation service.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<Transaction>, DomainError>;

    async fn get(&self, id: i32) -> Result<Transaction, DomainError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Transaction", id))
    }

    async fn find_by_book(&self, book_id: i32) -> Result<Vec<Transaction>, DomainError>;

    async fn find_by_user(&self, user_id: i32) -> Result<Vec<Transaction>, DomainError>;

    /// Active transactions whose window ended before `today`
    async fn find_overdue(&self, today: NaiveDate) -> Result<Vec<Transaction>, DomainError>;
}
