use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::progression::BeltStep;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "belts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub color: String,
    pub secondary_color: Option<String>,
    pub min_xp: i64,
    pub order_index: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::technique::Entity")]
    Techniques,
}

impl Related<super::technique::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Techniques.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Model> for BeltStep {
    fn from(m: &Model) -> Self {
        BeltStep {
            id: m.id,
            name: m.name.clone(),
            min_xp: m.min_xp,
            order_index: m.order_index,
        }
    }
}
