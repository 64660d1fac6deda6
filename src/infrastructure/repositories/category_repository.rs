//! SeaORM implementation of CategoryRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::{Book, Category, CategoryRepository, DomainError};
use crate::models::book::{self, Entity as BookEntity};
use crate::models::book_category::{ActiveModel, Column, Entity as CategoryEntity};

/// SeaORM-based implementation of CategoryRepository
pub struct SeaOrmCategoryRepository {
    db: DatabaseConnection,
}

impl SeaOrmCategoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> Result<(), DomainError> {
        let mut query = CategoryEntity::find().filter(Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(Column::Id.ne(id));
        }

        if query.one(&self.db).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "category '{}' already exists",
                name
            )));
        }
        Ok(())
    }
}

fn normalize(name: String) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput(
            "category name must not be blank".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl CategoryRepository for SeaOrmCategoryRepository {
    async fn create(&self, name: String) -> Result<Category, DomainError> {
        let name = normalize(name)?;
        self.ensure_name_free(&name, None).await?;

        let now = chrono::Utc::now().to_rfc3339();
        let category = ActiveModel {
            name: Set(name),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        // The UNIQUE constraint still catches a racing insert and maps to Conflict
        let result = category.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError> {
        let category = CategoryEntity::find_by_id(id).one(&self.db).await?;
        Ok(category.map(Category::from))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, DomainError> {
        let category = CategoryEntity::find()
            .filter(Column::Name.eq(name.trim()))
            .one(&self.db)
            .await?;
        Ok(category.map(Category::from))
    }

    async fn find_all(&self) -> Result<Vec<Category>, DomainError> {
        let categories = CategoryEntity::find()
            .order_by_asc(Column::Name)
            .all(&self.db)
            .await?;
        Ok(categories.into_iter().map(Category::from).collect())
    }

    async fn rename(&self, id: i32, name: String) -> Result<Category, DomainError> {
        let name = normalize(name)?;

        let existing = CategoryEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", id))?;

        self.ensure_name_free(&name, Some(id)).await?;

        let mut active: ActiveModel = existing.into();
        active.name = Set(name);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let result = active.update(&self.db).await?;
        Ok(result.into())
    }

    async fn books_in(&self, category_id: i32) -> Result<Vec<Book>, DomainError> {
        let category = CategoryEntity::find_by_id(category_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", category_id))?;

        let books = category
            .find_related(BookEntity)
            .order_by_asc(book::Column::Id)
            .all(&self.db)
            .await?;

        Ok(books.into_iter().map(Book::from).collect())
    }
}
