use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::progression::XpRules;

/// Single-row table (id = 1) holding attendance XP amounts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "xp_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub attendance_xp: i64,
    pub on_time_bonus: i64,
    pub good_behavior_bonus: i64,
    pub max_stripes: i32,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Model> for XpRules {
    fn from(m: &Model) -> Self {
        XpRules {
            attendance_xp: m.attendance_xp,
            on_time_bonus: m.on_time_bonus,
            good_behavior_bonus: m.good_behavior_bonus,
            max_stripes: m.max_stripes.max(0) as u32,
        }
    }
}
