use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "member_techniques")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub member_id: i32,
    pub technique_id: i32,
    pub status: String, // see domain::progression::TechniqueStatus
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Member,
    #[sea_orm(
        belongs_to = "super::technique::Entity",
        from = "Column::TechniqueId",
        to = "super::technique::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Technique,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl Related<super::technique::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Technique.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
