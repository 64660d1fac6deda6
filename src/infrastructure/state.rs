//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{BookRepository, CategoryRepository, TransactionRepository, UserRepository};
use crate::infrastructure::{
    SeaOrmBookRepository, SeaOrmCategoryRepository, SeaOrmTransactionRepository,
    SeaOrmUserRepository,
};
use crate::services::{CirculationPolicy, CirculationService};

/// Everything a front end needs to drive the engine
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub book_repo: Arc<dyn BookRepository>,
    pub category_repo: Arc<dyn CategoryRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub transaction_repo: Arc<dyn TransactionRepository>,
    /// Shared so every caller goes through the same lock registry
    pub circulation: Arc<CirculationService>,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(db: DatabaseConnection, policy: CirculationPolicy) -> Self {
        let book_repo = Arc::new(SeaOrmBookRepository::new(db.clone()));
        let category_repo = Arc::new(SeaOrmCategoryRepository::new(db.clone()));
        let user_repo = Arc::new(SeaOrmUserRepository::new(db.clone()));
        let transaction_repo = Arc::new(SeaOrmTransactionRepository::new(db.clone()));
        let circulation = Arc::new(CirculationService::new(db.clone(), policy));

        Self {
            db,
            book_repo,
            category_repo,
            user_repo,
            transaction_repo,
            circulation,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
