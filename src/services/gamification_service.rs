//! Gamification Service - belt ladder, badges and technique curriculum

use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::DomainError;
use crate::domain::progression::{BeltStep, TechniqueStatus, sort_ladder};
use crate::models::badge::{self, Entity as Badge};
use crate::models::belt::{self, Entity as Belt};
use crate::models::member::Entity as Member;
use crate::models::member_badge::{self, Entity as MemberBadge};
use crate::models::member_technique::{self, Entity as MemberTechnique};
use crate::models::technique::{self, Entity as Technique};

use super::{require_text, xp_service};

// ---------------------------------------------------------------------------
// Belts
// ---------------------------------------------------------------------------

/// Belt rows ordered as a ladder.
pub async fn list_belts<C: ConnectionTrait>(conn: &C) -> Result<Vec<belt::Model>, DomainError> {
    Ok(Belt::find()
        .order_by_asc(belt::Column::OrderIndex)
        .order_by_asc(belt::Column::MinXp)
        .all(conn)
        .await?)
}

pub async fn load_ladder<C: ConnectionTrait>(conn: &C) -> Result<Vec<BeltStep>, DomainError> {
    let belts = list_belts(conn).await?;
    Ok(sort_ladder(belts.iter().map(BeltStep::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct BeltInput {
    pub name: Option<String>,
    pub color: Option<String>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub secondary_color: Option<Option<String>>,
    pub min_xp: Option<i64>,
    pub order_index: Option<i32>,
}

pub async fn create_belt(db: &DatabaseConnection, input: BeltInput) -> Result<belt::Model, DomainError> {
    let name = input.name.unwrap_or_default();
    require_text("name", &name)?;
    let min_xp = input.min_xp.unwrap_or(0);
    if min_xp < 0 {
        return Err(DomainError::Validation("min_xp cannot be negative".to_string()));
    }

    let order_index = match input.order_index {
        Some(i) => i,
        None => list_belts(db)
            .await?
            .last()
            .map(|b| b.order_index + 1)
            .unwrap_or(0),
    };
    ensure_order_free(db, order_index, None).await?;

    let now = chrono::Utc::now().to_rfc3339();
    let belt = belt::ActiveModel {
        name: Set(name.trim().to_string()),
        color: Set(input.color.unwrap_or_else(|| "#FFFFFF".to_string())),
        secondary_color: Set(input.secondary_color.flatten()),
        min_xp: Set(min_xp),
        order_index: Set(order_index),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Belt created: {} (order {})", belt.name, belt.order_index);
    Ok(belt)
}

pub async fn update_belt(
    db: &DatabaseConnection,
    id: i32,
    input: BeltInput,
) -> Result<belt::Model, DomainError> {
    let existing = Belt::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Belt"))?;
    let mut active: belt::ActiveModel = existing.into();

    if let Some(name) = input.name {
        require_text("name", &name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(color) = input.color {
        active.color = Set(color);
    }
    if let Some(secondary) = input.secondary_color {
        active.secondary_color = Set(secondary);
    }
    if let Some(min_xp) = input.min_xp {
        if min_xp < 0 {
            return Err(DomainError::Validation("min_xp cannot be negative".to_string()));
        }
        active.min_xp = Set(min_xp);
    }
    if let Some(order_index) = input.order_index {
        ensure_order_free(db, order_index, Some(id)).await?;
        active.order_index = Set(order_index);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

pub async fn delete_belt(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    Belt::delete_by_id(id).exec(db).await?;
    Ok(())
}

async fn ensure_order_free(
    db: &DatabaseConnection,
    order_index: i32,
    except: Option<i32>,
) -> Result<(), DomainError> {
    let mut query = Belt::find().filter(belt::Column::OrderIndex.eq(order_index));
    if let Some(id) = except {
        query = query.filter(belt::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(DomainError::Conflict(format!(
            "order_index {} is already used by another belt",
            order_index
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BadgeInput {
    pub name: Option<String>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub level: Option<i32>,
    pub xp_reward: Option<i64>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub criteria: Option<Option<String>>,
}

fn check_badge_numbers(level: Option<i32>, xp_reward: Option<i64>) -> Result<(), DomainError> {
    if let Some(level) = level
        && !(1..=3).contains(&level)
    {
        return Err(DomainError::Validation("level must be 1, 2 or 3".to_string()));
    }
    if let Some(xp) = xp_reward
        && xp < 0
    {
        return Err(DomainError::Validation("xp_reward cannot be negative".to_string()));
    }
    Ok(())
}

pub async fn list_badges(db: &DatabaseConnection) -> Result<Vec<badge::Model>, DomainError> {
    Ok(Badge::find()
        .order_by_asc(badge::Column::Category)
        .order_by_asc(badge::Column::Level)
        .order_by_asc(badge::Column::Name)
        .all(db)
        .await?)
}

pub async fn create_badge(db: &DatabaseConnection, input: BadgeInput) -> Result<badge::Model, DomainError> {
    let name = input.name.unwrap_or_default();
    require_text("name", &name)?;
    check_badge_numbers(input.level, input.xp_reward)?;

    let now = chrono::Utc::now().to_rfc3339();
    Ok(badge::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(input.description.flatten()),
        category: Set(input.category.unwrap_or_else(|| "general".to_string())),
        level: Set(input.level.unwrap_or(1)),
        xp_reward: Set(input.xp_reward.unwrap_or(0)),
        criteria: Set(input.criteria.flatten()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn update_badge(
    db: &DatabaseConnection,
    id: i32,
    input: BadgeInput,
) -> Result<badge::Model, DomainError> {
    check_badge_numbers(input.level, input.xp_reward)?;
    let existing = Badge::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Badge"))?;
    let mut active: badge::ActiveModel = existing.into();

    if let Some(name) = input.name {
        require_text("name", &name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = input.description {
        active.description = Set(description);
    }
    if let Some(category) = input.category {
        active.category = Set(category);
    }
    if let Some(level) = input.level {
        active.level = Set(level);
    }
    if let Some(xp_reward) = input.xp_reward {
        active.xp_reward = Set(xp_reward);
    }
    if let Some(criteria) = input.criteria {
        active.criteria = Set(criteria);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

pub async fn delete_badge(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    Badge::delete_by_id(id).exec(db).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct AwardedBadge {
    pub badge: badge::Model,
    pub awarded_at: String,
}

#[derive(Debug, Serialize)]
pub struct BadgeAssignment {
    pub member_badge: member_badge::Model,
    /// XP granted by this assignment (0 when it was already logged)
    pub xp_awarded: i64,
}

/// Give a badge to a member and grant its XP reward once.
pub async fn assign_badge(
    db: &DatabaseConnection,
    member_id: i32,
    badge_id: i32,
) -> Result<BadgeAssignment, DomainError> {
    let txn = db.begin().await?;

    Member::find_by_id(member_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;
    let badge = Badge::find_by_id(badge_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Badge"))?;

    let existing = MemberBadge::find()
        .filter(member_badge::Column::MemberId.eq(member_id))
        .filter(member_badge::Column::BadgeId.eq(badge_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(DomainError::Conflict(format!(
            "member already holds badge '{}'",
            badge.name
        )));
    }

    let member_badge = member_badge::ActiveModel {
        member_id: Set(member_id),
        badge_id: Set(badge_id),
        awarded_at: Set(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut xp_awarded = 0;
    if badge.xp_reward > 0 {
        let reason = format!("Badge: {}", badge.name);
        if xp_service::award_xp(&txn, member_id, badge.xp_reward, &reason, true)
            .await?
            .is_some()
        {
            xp_awarded = badge.xp_reward;
        }
    }

    txn.commit().await?;
    tracing::info!("Badge '{}' assigned to member {}", badge.name, member_id);

    Ok(BadgeAssignment {
        member_badge,
        xp_awarded,
    })
}

/// Removes the badge only; XP already granted stays in the log.
pub async fn revoke_badge(
    db: &DatabaseConnection,
    member_id: i32,
    badge_id: i32,
) -> Result<(), DomainError> {
    MemberBadge::delete_many()
        .filter(member_badge::Column::MemberId.eq(member_id))
        .filter(member_badge::Column::BadgeId.eq(badge_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn member_badges(
    db: &DatabaseConnection,
    member_id: i32,
) -> Result<Vec<AwardedBadge>, DomainError> {
    let rows = MemberBadge::find()
        .filter(member_badge::Column::MemberId.eq(member_id))
        .order_by_desc(member_badge::Column::AwardedAt)
        .find_also_related(Badge)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(mb, badge)| {
            badge.map(|badge| AwardedBadge {
                badge,
                awarded_at: mb.awarded_at,
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Techniques
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TechniqueInput {
    pub belt_id: Option<i32>,
    pub name: Option<String>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub description: Option<Option<String>>,
    pub order_index: Option<i32>,
}

pub async fn list_techniques<C: ConnectionTrait>(
    conn: &C,
    belt_id: Option<i32>,
) -> Result<Vec<technique::Model>, DomainError> {
    let mut query = Technique::find();
    if let Some(belt_id) = belt_id {
        query = query.filter(technique::Column::BeltId.eq(belt_id));
    }
    Ok(query
        .order_by_asc(technique::Column::BeltId)
        .order_by_asc(technique::Column::OrderIndex)
        .order_by_asc(technique::Column::Name)
        .all(conn)
        .await?)
}

pub async fn create_technique(
    db: &DatabaseConnection,
    input: TechniqueInput,
) -> Result<technique::Model, DomainError> {
    let belt_id = input
        .belt_id
        .ok_or_else(|| DomainError::Validation("belt_id is required".to_string()))?;
    let name = input.name.unwrap_or_default();
    require_text("name", &name)?;
    Belt::find_by_id(belt_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Belt"))?;

    let now = chrono::Utc::now().to_rfc3339();
    Ok(technique::ActiveModel {
        belt_id: Set(belt_id),
        name: Set(name.trim().to_string()),
        category: Set(input.category.flatten()),
        description: Set(input.description.flatten()),
        order_index: Set(input.order_index.unwrap_or(0)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn update_technique(
    db: &DatabaseConnection,
    id: i32,
    input: TechniqueInput,
) -> Result<technique::Model, DomainError> {
    let existing = Technique::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Technique"))?;
    let mut active: technique::ActiveModel = existing.into();

    if let Some(belt_id) = input.belt_id {
        Belt::find_by_id(belt_id)
            .one(db)
            .await?
            .ok_or_else(|| DomainError::not_found("Belt"))?;
        active.belt_id = Set(belt_id);
    }
    if let Some(name) = input.name {
        require_text("name", &name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(category) = input.category {
        active.category = Set(category);
    }
    if let Some(description) = input.description {
        active.description = Set(description);
    }
    if let Some(order_index) = input.order_index {
        active.order_index = Set(order_index);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

pub async fn delete_technique(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    Technique::delete_by_id(id).exec(db).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ChecklistItem {
    pub technique: technique::Model,
    pub status: TechniqueStatus,
    pub updated_at: Option<String>,
}

/// Every technique of `belt_id` with the member's recorded status.
pub async fn member_checklist<C: ConnectionTrait>(
    conn: &C,
    member_id: i32,
    belt_id: i32,
) -> Result<Vec<ChecklistItem>, DomainError> {
    let techniques = list_techniques(conn, Some(belt_id)).await?;
    if techniques.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = techniques.iter().map(|t| t.id).collect();
    let recorded: HashMap<i32, member_technique::Model> = MemberTechnique::find()
        .filter(member_technique::Column::MemberId.eq(member_id))
        .filter(member_technique::Column::TechniqueId.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|mt| (mt.technique_id, mt))
        .collect();

    Ok(techniques
        .into_iter()
        .map(|technique| {
            let row = recorded.get(&technique.id);
            ChecklistItem {
                status: row
                    .and_then(|r| r.status.parse().ok())
                    .unwrap_or_default(),
                updated_at: row.map(|r| r.updated_at.clone()),
                technique,
            }
        })
        .collect())
}

pub async fn set_technique_status(
    db: &DatabaseConnection,
    member_id: i32,
    technique_id: i32,
    status: TechniqueStatus,
) -> Result<member_technique::Model, DomainError> {
    Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;
    Technique::find_by_id(technique_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Technique"))?;

    let now = chrono::Utc::now().to_rfc3339();
    let existing = MemberTechnique::find()
        .filter(member_technique::Column::MemberId.eq(member_id))
        .filter(member_technique::Column::TechniqueId.eq(technique_id))
        .one(db)
        .await?;

    let saved = match existing {
        Some(row) => {
            let mut active: member_technique::ActiveModel = row.into();
            active.status = Set(status.as_str().to_string());
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            member_technique::ActiveModel {
                member_id: Set(member_id),
                technique_id: Set(technique_id),
                status: Set(status.as_str().to_string()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    tracing::debug!(
        "Technique {} for member {} set to {}",
        technique_id,
        member_id,
        status
    );
    Ok(saved)
}
