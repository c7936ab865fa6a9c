use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub belt: String,
    pub stripes: i32,
    pub xp: i64,
    pub status: String, // 'active', 'inactive', 'suspended'
    pub enrolled_classes: String, // JSON array of class_sessions ids
    pub avatar_url: Option<String>,
    pub notes: Option<String>,
    pub join_date: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendance,
    #[sea_orm(has_many = "super::xp_log::Entity")]
    XpLogs,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendance.def()
    }
}

impl Related<super::xp_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::XpLogs.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Class ids stored in `enrolled_classes`; malformed JSON reads as empty.
    pub fn enrolled_class_ids(&self) -> Vec<i32> {
        serde_json::from_str(&self.enrolled_classes).unwrap_or_default()
    }
}
