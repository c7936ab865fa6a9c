//! Dashboard Service - headline numbers for the console home page

use chrono::{Duration, Local};
use sea_orm::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::progression::{
    DEFAULT_MIN_MASTERY, LeaderboardEntry, TechniqueStatus, belt_progress, promotion_eligibility,
    technique_mastery,
};
use crate::domain::{AttendanceStatus, DomainError, MemberStatus};
use crate::models::attendance::{self, Entity as Attendance};
use crate::models::class_session;
use crate::models::member::{self, Entity as Member};
use crate::models::member_technique::Entity as MemberTechnique;

use super::xp_service::{self, LeaderboardMetric};
use super::{DATE_FORMAT, agenda_service, finance_service, gamification_service, today};

const RATE_WINDOW_DAYS: i64 = 30;
const TOP_MEMBERS: usize = 5;

#[derive(Debug, Serialize)]
pub struct PromotionCandidate {
    pub member_id: i32,
    pub full_name: String,
    pub belt: String,
    pub next_belt: String,
    pub xp: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub active_members: u64,
    pub total_members: u64,
    pub classes_today: Vec<class_session::Model>,
    pub checkins_today: u64,
    /// Present rows over all rows checked in during the last 30 days, in percent
    pub attendance_rate: f64,
    pub month_revenue: f64,
    pub overdue_count: usize,
    pub overdue_amount: f64,
    pub promotion_candidates: Vec<PromotionCandidate>,
    pub top_members: Vec<LeaderboardEntry>,
}

pub async fn stats(db: &DatabaseConnection) -> Result<DashboardStats, DomainError> {
    let today = today();

    let total_members = Member::find().count(db).await?;
    let active_members = Member::find()
        .filter(member::Column::Status.eq(MemberStatus::Active.as_str()))
        .count(db)
        .await?;

    let classes_today = agenda_service::classes_on(db, &today).await?;
    let checkins_today = Attendance::find()
        .filter(attendance::Column::Status.eq(AttendanceStatus::Present.as_str()))
        .filter(attendance::Column::CheckedInAt.starts_with(today.as_str()))
        .count(db)
        .await?;

    let window_start = (Local::now().date_naive() - Duration::days(RATE_WINDOW_DAYS))
        .format(DATE_FORMAT)
        .to_string();
    let attendance_rate = attendance_rate(db, &window_start).await?;

    let summary = finance_service::month_summary(db, None).await?;
    let (overdue_count, overdue_amount) = finance_service::overdue_totals(db).await?;

    let promotion_candidates = promotion_candidates(db).await?;
    let top_members = xp_service::leaderboard(db, LeaderboardMetric::Xp, None, TOP_MEMBERS).await?;

    Ok(DashboardStats {
        active_members,
        total_members,
        classes_today,
        checkins_today,
        attendance_rate,
        month_revenue: summary.received,
        overdue_count,
        overdue_amount,
        promotion_candidates,
        top_members,
    })
}

async fn attendance_rate(db: &DatabaseConnection, since: &str) -> Result<f64, DomainError> {
    let in_window = Attendance::find().filter(attendance::Column::CheckedInAt.gte(since));
    let total = in_window.clone().count(db).await?;
    if total == 0 {
        return Ok(0.0);
    }
    let present = in_window
        .filter(attendance::Column::Status.eq(AttendanceStatus::Present.as_str()))
        .count(db)
        .await?;
    Ok((present as f64 / total as f64 * 1000.0).round() / 10.0)
}

/// Active members whose XP and curriculum mastery clear the next belt.
async fn promotion_candidates(db: &DatabaseConnection) -> Result<Vec<PromotionCandidate>, DomainError> {
    let ladder = gamification_service::load_ladder(db).await?;
    let rules = xp_service::load_rules(db).await?;
    let members = Member::find()
        .filter(member::Column::Status.eq(MemberStatus::Active.as_str()))
        .order_by_asc(member::Column::FullName)
        .all(db)
        .await?;

    let mut curriculum: HashMap<i32, Vec<i32>> = HashMap::new();
    for technique in gamification_service::list_techniques(db, None).await? {
        curriculum.entry(technique.belt_id).or_default().push(technique.id);
    }
    let recorded: HashMap<(i32, i32), TechniqueStatus> = MemberTechnique::find()
        .all(db)
        .await?
        .into_iter()
        .filter_map(|mt| Some(((mt.member_id, mt.technique_id), mt.status.parse::<TechniqueStatus>().ok()?)))
        .collect();

    let mut candidates = Vec::new();
    for m in members {
        let progress = belt_progress(&ladder, &m.belt, m.xp, rules.max_stripes);
        let Some(current) = &progress.current else {
            continue;
        };
        let techniques = curriculum.get(&current.id).map(Vec::as_slice).unwrap_or(&[]);
        let statuses: Vec<TechniqueStatus> = techniques
            .iter()
            .filter_map(|t| recorded.get(&(m.id, *t)).copied())
            .collect();
        let mastery = technique_mastery(&statuses, techniques.len());

        if promotion_eligibility(&progress, mastery, techniques.len(), DEFAULT_MIN_MASTERY).eligible
            && let Some(next) = progress.next
        {
            candidates.push(PromotionCandidate {
                member_id: m.id,
                full_name: m.full_name,
                belt: m.belt,
                next_belt: next.name,
                xp: m.xp,
            });
        }
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::services::attendance_service::{RollInput, save_roll};

    async fn insert_member(db: &DatabaseConnection, name: &str, belt: &str, xp: i64, status: &str) -> i32 {
        let now = chrono::Utc::now().to_rfc3339();
        member::ActiveModel {
            full_name: Set(name.to_string()),
            belt: Set(belt.to_string()),
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
    async fn test_empty_dashboard() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.total_members, 0);
        assert_eq!(stats.attendance_rate, 0.0);
        assert!(stats.top_members.is_empty());
        assert!(stats.promotion_candidates.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_counts_and_candidates() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let ana = insert_member(&db, "Ana", "White", 520, "active").await;
        let bia = insert_member(&db, "Bia", "White", 100, "active").await;
        insert_member(&db, "Caio", "Blue", 900, "inactive").await;

        let start = format!("{}T06:00", today());
        let end = format!("{}T07:00", today());
        let now = chrono::Utc::now().to_rfc3339();
        let class_id = class_session::ActiveModel {
            title: Set("Morning".to_string()),
            instructor: Set("Sensei".to_string()),
            start_time: Set(start),
            end_time: Set(end),
            max_capacity: Set(10),
            enrolled_count: Set(0),
            class_type: Set("adult".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap()
        .id;

        save_roll(
            &db,
            class_id,
            vec![
                RollInput {
                    member_id: ana,
                    status: "present".to_string(),
                    on_time: false,
                    good_behavior: false,
                },
                RollInput {
                    member_id: bia,
                    status: "absent".to_string(),
                    on_time: false,
                    good_behavior: false,
                },
            ],
        )
        .await
        .unwrap();

        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.total_members, 3);
        assert_eq!(stats.active_members, 2);
        assert_eq!(stats.classes_today.len(), 1);
        assert_eq!(stats.checkins_today, 1);
        assert_eq!(stats.attendance_rate, 50.0);

        // Ana has 530 XP on White with no curriculum: ready for Blue
        assert_eq!(stats.promotion_candidates.len(), 1);
        assert_eq!(stats.promotion_candidates[0].next_belt, "Blue");
        assert_eq!(stats.top_members[0].name, "Ana");
        assert_eq!(stats.top_members.len(), 2);
    }
}
