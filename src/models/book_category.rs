use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "book_categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::book_category_links::Entity")]
    Links,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_category_links::Relation::Book.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_category_links::Relation::Category.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
