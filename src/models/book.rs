use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub alternate_title: Option<String>,
    pub author: String,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub total_copies: i32,
    /// Only ever written by the inventory ledger.
    pub available_copies: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::book_transaction::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::book_category_links::Entity")]
    CategoryLinks,
}

impl Related<super::book_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::book_category::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_category_links::Relation::Category.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_category_links::Relation::Book.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
