//! XP Service - awards, presets, settings and leaderboards

use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::normalize_date;
use crate::domain::DomainError;
use crate::domain::progression::{
    LeaderboardEntry, XpRules, apply_xp_delta, rank_leaderboard,
};
use crate::models::attendance::{self, Entity as Attendance};
use crate::models::member::{self, Entity as Member};
use crate::models::xp_log::{self, Entity as XpLog};
use crate::models::xp_preset::{self, Entity as XpPreset};
use crate::models::xp_settings::{self, Entity as XpSettings};

const SETTINGS_ID: i32 = 1;

/// Current attendance XP rules; defaults when the settings row is missing.
pub async fn load_rules<C: ConnectionTrait>(conn: &C) -> Result<XpRules, DomainError> {
    let settings = XpSettings::find_by_id(SETTINGS_ID).one(conn).await?;
    Ok(settings.as_ref().map(XpRules::from).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub struct UpdateXpSettings {
    pub attendance_xp: Option<i64>,
    pub on_time_bonus: Option<i64>,
    pub good_behavior_bonus: Option<i64>,
    pub max_stripes: Option<i32>,
}

pub async fn get_settings(db: &DatabaseConnection) -> Result<XpRules, DomainError> {
    load_rules(db).await
}

pub async fn update_settings(
    db: &DatabaseConnection,
    input: UpdateXpSettings,
) -> Result<XpRules, DomainError> {
    let current = load_rules(db).await?;

    let rules = XpRules {
        attendance_xp: input.attendance_xp.unwrap_or(current.attendance_xp),
        on_time_bonus: input.on_time_bonus.unwrap_or(current.on_time_bonus),
        good_behavior_bonus: input
            .good_behavior_bonus
            .unwrap_or(current.good_behavior_bonus),
        max_stripes: match input.max_stripes {
            Some(n) if !(0..=10).contains(&n) => {
                return Err(DomainError::Validation(
                    "max_stripes must be between 0 and 10".to_string(),
                ));
            }
            Some(n) => n as u32,
            None => current.max_stripes,
        },
    };

    if rules.attendance_xp < 0 || rules.on_time_bonus < 0 || rules.good_behavior_bonus < 0 {
        return Err(DomainError::Validation(
            "XP amounts cannot be negative".to_string(),
        ));
    }

    let row = xp_settings::ActiveModel {
        id: Set(SETTINGS_ID),
        attendance_xp: Set(rules.attendance_xp),
        on_time_bonus: Set(rules.on_time_bonus),
        good_behavior_bonus: Set(rules.good_behavior_bonus),
        max_stripes: Set(rules.max_stripes as i32),
        updated_at: Set(chrono::Utc::now().to_rfc3339()),
    };

    XpSettings::insert(row)
        .on_conflict(
            sea_query::OnConflict::column(xp_settings::Column::Id)
                .update_columns([
                    xp_settings::Column::AttendanceXp,
                    xp_settings::Column::OnTimeBonus,
                    xp_settings::Column::GoodBehaviorBonus,
                    xp_settings::Column::MaxStripes,
                    xp_settings::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;

    tracing::info!("XP settings updated: {:?}", rules);
    Ok(rules)
}

/// Append an XP log row and move the member's total.
///
/// With `guard` set, nothing is written when the member already has a log
/// with the same reason; `Ok(None)` reports that case.
pub async fn award_xp<C: ConnectionTrait>(
    conn: &C,
    member_id: i32,
    amount: i64,
    reason: &str,
    guard: bool,
) -> Result<Option<xp_log::Model>, DomainError> {
    if guard {
        let already = XpLog::find()
            .filter(xp_log::Column::MemberId.eq(member_id))
            .filter(xp_log::Column::Reason.eq(reason))
            .count(conn)
            .await?;
        if already > 0 {
            tracing::debug!(
                "Skipping duplicate XP award for member {}: {}",
                member_id,
                reason
            );
            return Ok(None);
        }
    }

    let member = Member::find_by_id(member_id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;

    let now = chrono::Utc::now().to_rfc3339();
    let log = xp_log::ActiveModel {
        member_id: Set(member_id),
        amount: Set(amount),
        reason: Set(reason.to_string()),
        created_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let new_total = apply_xp_delta(member.xp, amount);
    let mut active: member::ActiveModel = member.into();
    active.xp = Set(new_total);
    active.updated_at = Set(now);
    active.update(conn).await?;

    Ok(Some(log))
}

#[derive(Debug, Serialize)]
pub struct XpAdjustment {
    pub member_id: i32,
    pub xp: i64,
    pub log: xp_log::Model,
}

/// Manual XP adjustment (positive or negative).
pub async fn adjust_xp(
    db: &DatabaseConnection,
    member_id: i32,
    amount: i64,
    reason: &str,
) -> Result<XpAdjustment, DomainError> {
    if amount == 0 {
        return Err(DomainError::Validation("amount cannot be zero".to_string()));
    }
    if reason.trim().is_empty() {
        return Err(DomainError::Validation("reason is required".to_string()));
    }

    let txn = db.begin().await?;
    let log = award_xp(&txn, member_id, amount, reason.trim(), false)
        .await?
        .ok_or_else(|| DomainError::Internal("unguarded award skipped".to_string()))?;
    let xp = Member::find_by_id(member_id)
        .one(&txn)
        .await?
        .map(|m| m.xp)
        .unwrap_or(0);
    txn.commit().await?;

    tracing::info!(
        "Adjusted XP for member {} by {} ({})",
        member_id,
        amount,
        log.reason
    );
    Ok(XpAdjustment { member_id, xp, log })
}

pub async fn apply_preset(
    db: &DatabaseConnection,
    member_id: i32,
    preset_id: i32,
) -> Result<XpAdjustment, DomainError> {
    let preset = XpPreset::find_by_id(preset_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("XP preset"))?;
    adjust_xp(db, member_id, preset.amount, &preset.reason).await
}

pub async fn xp_history(
    db: &DatabaseConnection,
    member_id: i32,
) -> Result<Vec<xp_log::Model>, DomainError> {
    Ok(XpLog::find()
        .filter(xp_log::Column::MemberId.eq(member_id))
        .order_by_desc(xp_log::Column::CreatedAt)
        .order_by_desc(xp_log::Column::Id)
        .all(db)
        .await?)
}

pub async fn list_presets(db: &DatabaseConnection) -> Result<Vec<xp_preset::Model>, DomainError> {
    Ok(XpPreset::find()
        .order_by_asc(xp_preset::Column::Label)
        .all(db)
        .await?)
}

#[derive(Debug, Deserialize)]
pub struct CreatePreset {
    pub label: String,
    pub amount: i64,
    pub reason: Option<String>,
}

pub async fn create_preset(
    db: &DatabaseConnection,
    input: CreatePreset,
) -> Result<xp_preset::Model, DomainError> {
    super::require_text("label", &input.label)?;
    if input.amount == 0 {
        return Err(DomainError::Validation("amount cannot be zero".to_string()));
    }
    let reason = input
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| input.label.clone());

    Ok(xp_preset::ActiveModel {
        label: Set(input.label.trim().to_string()),
        amount: Set(input.amount),
        reason: Set(reason),
        created_at: Set(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn delete_preset(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    XpPreset::delete_by_id(id).exec(db).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardMetric {
    #[default]
    Xp,
    Attendance,
}

/// Active members ranked by XP or by count of `present` attendance rows
/// (optionally only check-ins on or after the `since` date).
pub async fn leaderboard(
    db: &DatabaseConnection,
    metric: LeaderboardMetric,
    since: Option<&str>,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, DomainError> {
    let since = since
        .filter(|s| !s.trim().is_empty())
        .map(|s| normalize_date("since", s))
        .transpose()?;
    let members = Member::find()
        .filter(member::Column::Status.eq("active"))
        .all(db)
        .await?;

    let scores: HashMap<i32, i64> = match metric {
        LeaderboardMetric::Xp => members.iter().map(|m| (m.id, m.xp)).collect(),
        LeaderboardMetric::Attendance => {
            let mut query = Attendance::find().filter(attendance::Column::Status.eq("present"));
            if let Some(since) = &since {
                query = query.filter(attendance::Column::CheckedInAt.gte(since));
            }
            let mut counts = HashMap::new();
            for row in query.all(db).await? {
                *counts.entry(row.member_id).or_insert(0i64) += 1;
            }
            counts
        }
    };

    let entries = members
        .into_iter()
        .map(|m| LeaderboardEntry {
            member_id: m.id,
            score: scores.get(&m.id).copied().unwrap_or(0),
            name: m.full_name,
            belt: m.belt,
            rank: 0,
        })
        .collect();

    let mut ranked = rank_leaderboard(entries);
    ranked.truncate(limit);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    async fn insert_member(db: &DatabaseConnection, name: &str, xp: i64, status: &str) -> i32 {
        let now = chrono::Utc::now().to_rfc3339();
        member::ActiveModel {
            full_name: Set(name.to_string()),
            belt: Set("White".to_string()),
            stripes: Set(0),
            xp: Set(xp),
            status: Set(status.to_string()),
            enrolled_classes: Set("[]".to_string()),
            join_date: Set("2024-01-01".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert member")
        .id
    }

    #[tokio::test]
    async fn test_guarded_award_is_not_repeated() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let id = insert_member(&db, "Ana", 0, "active").await;

        let first = award_xp(&db, id, 15, "Class #1 attendance", true).await.unwrap();
        let second = award_xp(&db, id, 15, "Class #1 attendance", true).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        let member = Member::find_by_id(id).one(&db).await.unwrap().unwrap();
        assert_eq!(member.xp, 15);
        assert_eq!(xp_history(&db, id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_xp_clamps_at_zero_and_validates() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let id = insert_member(&db, "Bruno", 30, "active").await;

        let result = adjust_xp(&db, id, -100, "Penalty").await.unwrap();
        assert_eq!(result.xp, 0);
        assert_eq!(result.log.amount, -100);

        assert!(matches!(
            adjust_xp(&db, id, 10, "  ").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            adjust_xp(&db, 9999, 10, "Ghost").await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_seeded_preset() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let id = insert_member(&db, "Carla", 0, "active").await;
        let preset = list_presets(&db)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.label == "Podium")
            .expect("seeded preset");

        let result = apply_preset(&db, id, preset.id).await.unwrap();
        assert_eq!(result.xp, 200);
        assert_eq!(result.log.reason, "Competition podium");
    }

    #[tokio::test]
    async fn test_settings_update_and_validation() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let rules = update_settings(
            &db,
            UpdateXpSettings {
                attendance_xp: Some(12),
                on_time_bonus: None,
                good_behavior_bonus: None,
                max_stripes: Some(3),
            },
        )
        .await
        .unwrap();
        assert_eq!(rules.attendance_xp, 12);
        assert_eq!(rules.on_time_bonus, 5);
        assert_eq!(load_rules(&db).await.unwrap().max_stripes, 3);

        let bad = update_settings(
            &db,
            UpdateXpSettings {
                attendance_xp: Some(-1),
                on_time_bonus: None,
                good_behavior_bonus: None,
                max_stripes: None,
            },
        )
        .await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_leaderboard_by_xp_skips_inactive() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        insert_member(&db, "Ana", 100, "active").await;
        insert_member(&db, "Bruno", 300, "active").await;
        insert_member(&db, "Caio", 900, "inactive").await;

        let board = leaderboard(&db, LeaderboardMetric::Xp, None, 10).await.unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bruno", "Ana"]);
        assert_eq!(board[0].rank, 1);
    }

    async fn insert_checkin(db: &DatabaseConnection, member_id: i32, at: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        let class = crate::models::class_session::ActiveModel {
            title: Set("Open Mat".to_string()),
            instructor: Set("Coach".to_string()),
            start_time: Set(format!("{}T18:00", &at[..10])),
            end_time: Set(format!("{}T19:00", &at[..10])),
            max_capacity: Set(20),
            enrolled_count: Set(0),
            class_type: Set("adult".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert class");
        attendance::ActiveModel {
            class_id: Set(class.id),
            member_id: Set(member_id),
            status: Set("present".to_string()),
            on_time: Set(true),
            good_behavior: Set(true),
            checked_in_at: Set(at.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert attendance");
    }

    #[tokio::test]
    async fn test_leaderboard_by_attendance_with_since_and_ties() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let ana = insert_member(&db, "Ana", 0, "active").await;
        let bruno = insert_member(&db, "Bruno", 0, "active").await;
        let caio = insert_member(&db, "Caio", 0, "active").await;
        insert_member(&db, "Duda", 0, "active").await;

        insert_checkin(&db, ana, "2024-01-10T18:00:00").await;
        insert_checkin(&db, ana, "2024-03-05T18:00:00").await;
        insert_checkin(&db, bruno, "2024-03-06T18:00:00").await;
        insert_checkin(&db, caio, "2024-03-07T18:00:00").await;

        let board = leaderboard(&db, LeaderboardMetric::Attendance, None, 10)
            .await
            .unwrap();
        let ranks: Vec<(&str, i64, u32)> = board
            .iter()
            .map(|e| (e.name.as_str(), e.score, e.rank))
            .collect();
        assert_eq!(
            ranks,
            vec![("Ana", 2, 1), ("Bruno", 1, 2), ("Caio", 1, 2), ("Duda", 0, 4)]
        );

        // Padded dates are accepted; January no longer counts
        let board = leaderboard(&db, LeaderboardMetric::Attendance, Some(" 2024-03-01"), 3)
            .await
            .unwrap();
        let ranks: Vec<(&str, i64, u32)> = board
            .iter()
            .map(|e| (e.name.as_str(), e.score, e.rank))
            .collect();
        assert_eq!(ranks, vec![("Ana", 1, 1), ("Bruno", 1, 1), ("Caio", 1, 1)]);

        assert!(matches!(
            leaderboard(&db, LeaderboardMetric::Attendance, Some("March"), 10).await,
            Err(DomainError::Validation(_))
        ));
    }
}
