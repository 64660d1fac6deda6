//! SeaORM implementation of UserRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use super::to_transactions;
use crate::domain::{DomainError, NewUser, Transaction, UpdateUser, User, UserRepository, UserType};
use crate::models::book_transaction::Entity as TransactionEntity;
use crate::models::user::{self, ActiveModel, Column, Entity as UserEntity};
use crate::models::user_transactions::{self, Entity as ListEntity};

/// SeaORM-based implementation of UserRepository
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Reject a full name or email already held by another user.
    async fn ensure_unique(
        &self,
        full_name: Option<&str>,
        email: Option<&str>,
        except: Option<i32>,
    ) -> Result<(), DomainError> {
        if full_name.is_none() && email.is_none() {
            return Ok(());
        }

        let mut any = Condition::any();
        if let Some(full_name) = full_name {
            any = any.add(Column::FullName.eq(full_name));
        }
        if let Some(email) = email {
            any = any.add(Column::Email.eq(email));
        }

        let mut query = UserEntity::find().filter(any);
        if let Some(id) = except {
            query = query.filter(Column::Id.ne(id));
        }

        if let Some(clash) = query.one(&self.db).await? {
            let field = if Some(clash.full_name.as_str()) == full_name {
                "full name"
            } else {
                "email"
            };
            return Err(DomainError::Conflict(format!(
                "{} already registered to user #{}",
                field, clash.id
            )));
        }
        Ok(())
    }
}

fn require_text(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput(format!("{} must not be blank", field)));
    }
    Ok(trimmed.to_string())
}

fn require_email(value: String) -> Result<String, DomainError> {
    let email = require_text("email", value)?.to_lowercase();
    if !email.contains('@') {
        return Err(DomainError::InvalidInput(format!(
            "'{}' is not an email address",
            email
        )));
    }
    Ok(email)
}

/// Load a user together with both transaction lists.
async fn load_user<C: ConnectionTrait>(
    conn: &C,
    model: user::Model,
) -> Result<User, DomainError> {
    let entries = ListEntity::find()
        .filter(user_transactions::Column::UserId.eq(model.id))
        .order_by_asc(user_transactions::Column::Id)
        .all(conn)
        .await?;

    let (active, history): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.list == user_transactions::ACTIVE);

    Ok(User {
        id: model.id,
        user_type: model.user_type.parse()?,
        full_name: model.full_name,
        email: model.email,
        phone: model.phone,
        address: model.address,
        password_hash: model.password_hash,
        points: model.points,
        is_admin: model.is_admin,
        active_transactions: active.into_iter().map(|e| e.transaction_id).collect(),
        previous_transactions: history.into_iter().map(|e| e.transaction_id).collect(),
    })
}

impl SeaOrmUserRepository {
    async fn list(&self, user_id: i32, list: &str) -> Result<Vec<Transaction>, DomainError> {
        if UserEntity::find_by_id(user_id).one(&self.db).await?.is_none() {
            return Err(DomainError::not_found("User", user_id));
        }

        let entries = ListEntity::find()
            .filter(user_transactions::Column::UserId.eq(user_id))
            .filter(user_transactions::Column::List.eq(list))
            .order_by_asc(user_transactions::Column::Id)
            .find_also_related(TransactionEntity)
            .all(&self.db)
            .await?;

        to_transactions(entries.into_iter().filter_map(|(_, tx)| tx).collect())
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn create(&self, input: NewUser) -> Result<User, DomainError> {
        let full_name = require_text("full name", input.full_name)?;
        let email = require_email(input.email)?;
        self.ensure_unique(Some(&full_name), Some(&email), None).await?;

        let now = chrono::Utc::now().to_rfc3339();
        let user = ActiveModel {
            user_type: Set(input.user_type.as_str().to_string()),
            full_name: Set(full_name),
            email: Set(email),
            phone: Set(input.phone),
            address: Set(input.address),
            password_hash: Set(input.password_hash),
            points: Set(0),
            is_admin: Set(input.user_type == UserType::Admin),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = user.insert(&self.db).await?;
        tracing::debug!("Created user #{} ({})", result.id, result.user_type);
        load_user(&self.db, result).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, DomainError> {
        match UserEntity::find_by_id(id).one(&self.db).await? {
            Some(model) => Ok(Some(load_user(&self.db, model).await?)),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<User>, DomainError> {
        let models = UserEntity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        let mut users = Vec::with_capacity(models.len());
        for model in models {
            users.push(load_user(&self.db, model).await?);
        }
        Ok(users)
    }

    async fn update(&self, id: i32, input: UpdateUser) -> Result<User, DomainError> {
        let existing = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))?;

        let full_name = input
            .full_name
            .map(|n| require_text("full name", n))
            .transpose()?;
        let email = input.email.map(require_email).transpose()?;
        self.ensure_unique(full_name.as_deref(), email.as_deref(), Some(id))
            .await?;

        let mut active: ActiveModel = existing.into();
        if let Some(full_name) = full_name {
            active.full_name = Set(full_name);
        }
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }
        if let Some(address) = input.address {
            active.address = Set(address);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let result = active.update(&self.db).await?;
        load_user(&self.db, result).await
    }

    async fn active_transactions(&self, user_id: i32) -> Result<Vec<Transaction>, DomainError> {
        self.list(user_id, user_transactions::ACTIVE).await
    }

    async fn history(&self, user_id: i32) -> Result<Vec<Transaction>, DomainError> {
        self.list(user_id, user_transactions::HISTORY).await
    }
}
