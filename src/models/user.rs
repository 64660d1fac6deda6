use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_type: String, // 'member', 'admin'
    #[sea_orm(unique)]
    pub full_name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub points: i32,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::book_transaction::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::user_transactions::Entity")]
    TransactionLists,
}

impl Related<super::book_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::user_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionLists.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
