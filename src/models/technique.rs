use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "techniques")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub belt_id: i32,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub order_index: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::belt::Entity",
        from = "Column::BeltId",
        to = "super::belt::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Belt,
}

impl Related<super::belt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Belt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
