use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "badges")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub level: i32, // 1 bronze, 2 silver, 3 gold
    pub xp_reward: i64,
    pub criteria: Option<String>, // informational only, badges are assigned by hand
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::member_badge::Entity")]
    MemberBadges,
}

impl Related<super::member_badge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MemberBadges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
