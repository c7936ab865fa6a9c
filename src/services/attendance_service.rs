//! Attendance Service - class rolls and check-ins
//!
//! Present members earn attendance XP once per class. The award is keyed by
//! the XP log reason, so re-saving a roll never pays twice.

use chrono::Local;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::progression::attendance_xp;
use crate::domain::{AttendanceStatus, DomainError};
use crate::models::attendance::{self, Entity as Attendance};
use crate::models::class_session::{self, Entity as ClassSession};
use crate::models::member::{self, Entity as Member};

use super::{validation, xp_service};

/// Local timestamp stored in `checked_in_at`; sorts as text and starts with
/// the calendar date.
pub const CHECKIN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn attendance_reason(class_id: i32) -> String {
    format!("Class #{} attendance", class_id)
}

fn now_local() -> String {
    Local::now().format(CHECKIN_FORMAT).to_string()
}

#[derive(Debug, Serialize)]
pub struct RollEntry {
    pub member_id: i32,
    pub member_name: String,
    pub status: String,
    pub on_time: bool,
    pub good_behavior: bool,
    pub checked_in_at: String,
}

async fn find_class<C: ConnectionTrait>(
    conn: &C,
    class_id: i32,
) -> Result<class_session::Model, DomainError> {
    ClassSession::find_by_id(class_id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Class"))
}

/// Attendance rows of a class with member names, sorted by name.
pub async fn roll(db: &DatabaseConnection, class_id: i32) -> Result<Vec<RollEntry>, DomainError> {
    find_class(db, class_id).await?;

    let rows = Attendance::find()
        .filter(attendance::Column::ClassId.eq(class_id))
        .find_also_related(Member)
        .all(db)
        .await?;

    let mut entries: Vec<RollEntry> = rows
        .into_iter()
        .map(|(row, member)| RollEntry {
            member_id: row.member_id,
            member_name: member.map(|m| m.full_name).unwrap_or_default(),
            status: row.status,
            on_time: row.on_time,
            good_behavior: row.good_behavior,
            checked_in_at: row.checked_in_at,
        })
        .collect();
    entries.sort_by(|a, b| a.member_name.to_lowercase().cmp(&b.member_name.to_lowercase()));
    Ok(entries)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollInput {
    pub member_id: i32,
    pub status: String,
    #[serde(default)]
    pub on_time: bool,
    #[serde(default)]
    pub good_behavior: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct RollSummary {
    pub class_id: i32,
    pub saved: usize,
    pub present: usize,
    pub xp_awarded: i64,
    pub members_awarded: usize,
}

/// Replace the whole roll of a class and award attendance XP.
///
/// Runs in one transaction: a failure on any entry leaves the previous roll
/// in place.
pub async fn save_roll(
    db: &DatabaseConnection,
    class_id: i32,
    entries: Vec<RollInput>,
) -> Result<RollSummary, DomainError> {
    let mut parsed = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();
    for entry in entries {
        let status: AttendanceStatus = validation("status", &entry.status)?;
        if !seen.insert(entry.member_id) {
            return Err(DomainError::Validation(format!(
                "member {} appears twice in the roll",
                entry.member_id
            )));
        }
        parsed.push((entry, status));
    }

    let txn = db.begin().await?;
    find_class(&txn, class_id).await?;

    if !parsed.is_empty() {
        let ids: Vec<i32> = parsed.iter().map(|(e, _)| e.member_id).collect();
        let known = Member::find()
            .filter(member::Column::Id.is_in(ids.clone()))
            .count(&txn)
            .await?;
        if known as usize != ids.len() {
            return Err(DomainError::not_found("Member"));
        }
    }

    // Keep the original check-in time of members already on the roll
    let previous: HashMap<i32, String> = Attendance::find()
        .filter(attendance::Column::ClassId.eq(class_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|row| (row.member_id, row.checked_in_at))
        .collect();

    Attendance::delete_many()
        .filter(attendance::Column::ClassId.eq(class_id))
        .exec(&txn)
        .await?;

    let rules = xp_service::load_rules(&txn).await?;
    let reason = attendance_reason(class_id);
    let now = now_local();
    let mut summary = RollSummary {
        class_id,
        ..Default::default()
    };

    for (entry, status) in parsed {
        attendance::ActiveModel {
            class_id: Set(class_id),
            member_id: Set(entry.member_id),
            status: Set(status.as_str().to_string()),
            on_time: Set(entry.on_time),
            good_behavior: Set(entry.good_behavior),
            checked_in_at: Set(previous
                .get(&entry.member_id)
                .cloned()
                .unwrap_or_else(|| now.clone())),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        summary.saved += 1;

        if status == AttendanceStatus::Present {
            summary.present += 1;
            let amount = attendance_xp(&rules, entry.on_time, entry.good_behavior);
            if xp_service::award_xp(&txn, entry.member_id, amount, &reason, true)
                .await?
                .is_some()
            {
                summary.xp_awarded += amount;
                summary.members_awarded += 1;
            }
        }
    }

    txn.commit().await?;
    tracing::info!(
        "Roll saved for class {}: {} rows, {} present, {} XP awarded",
        class_id,
        summary.saved,
        summary.present,
        summary.xp_awarded
    );
    Ok(summary)
}

#[derive(Debug, Deserialize)]
pub struct CheckInInput {
    pub member_id: i32,
    #[serde(default)]
    pub on_time: bool,
    #[serde(default)]
    pub good_behavior: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckIn {
    pub attendance: attendance::Model,
    pub xp_awarded: i64,
}

/// Mark one member present, creating or replacing their row.
pub async fn check_in(
    db: &DatabaseConnection,
    class_id: i32,
    input: CheckInInput,
) -> Result<CheckIn, DomainError> {
    let txn = db.begin().await?;
    find_class(&txn, class_id).await?;
    Member::find_by_id(input.member_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;

    let existing = Attendance::find()
        .filter(attendance::Column::ClassId.eq(class_id))
        .filter(attendance::Column::MemberId.eq(input.member_id))
        .one(&txn)
        .await?;

    let row = match existing {
        Some(row) => {
            let mut active: attendance::ActiveModel = row.into();
            active.status = Set(AttendanceStatus::Present.as_str().to_string());
            active.on_time = Set(input.on_time);
            active.good_behavior = Set(input.good_behavior);
            active.update(&txn).await?
        }
        None => {
            attendance::ActiveModel {
                class_id: Set(class_id),
                member_id: Set(input.member_id),
                status: Set(AttendanceStatus::Present.as_str().to_string()),
                on_time: Set(input.on_time),
                good_behavior: Set(input.good_behavior),
                checked_in_at: Set(now_local()),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    let rules = xp_service::load_rules(&txn).await?;
    let amount = attendance_xp(&rules, input.on_time, input.good_behavior);
    let awarded = xp_service::award_xp(&txn, input.member_id, amount, &attendance_reason(class_id), true)
        .await?
        .map(|_| amount)
        .unwrap_or(0);

    txn.commit().await?;
    tracing::debug!(
        "Member {} checked in to class {} (+{} XP)",
        input.member_id,
        class_id,
        awarded
    );
    Ok(CheckIn {
        attendance: row,
        xp_awarded: awarded,
    })
}

#[derive(Debug, Serialize)]
pub struct AttendanceRecord {
    pub class_id: i32,
    pub class_title: String,
    pub start_time: String,
    pub status: String,
    pub on_time: bool,
    pub good_behavior: bool,
    pub checked_in_at: String,
}

#[derive(Debug, Serialize)]
pub struct MemberAttendance {
    pub member_id: i32,
    pub present_count: usize,
    pub total: usize,
    pub records: Vec<AttendanceRecord>,
}

/// A member's attendance, most recent class first.
pub async fn member_history(
    db: &DatabaseConnection,
    member_id: i32,
) -> Result<MemberAttendance, DomainError> {
    Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;

    let rows = Attendance::find()
        .filter(attendance::Column::MemberId.eq(member_id))
        .find_also_related(ClassSession)
        .all(db)
        .await?;

    let mut records: Vec<AttendanceRecord> = rows
        .into_iter()
        .map(|(row, class)| {
            let (class_title, start_time) = class
                .map(|c| (c.title, c.start_time))
                .unwrap_or_default();
            AttendanceRecord {
                class_id: row.class_id,
                class_title,
                start_time,
                status: row.status,
                on_time: row.on_time,
                good_behavior: row.good_behavior,
                checked_in_at: row.checked_in_at,
            }
        })
        .collect();
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    let present_count = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present.as_str())
        .count();

    Ok(MemberAttendance {
        member_id,
        present_count,
        total: records.len(),
        records,
    })
}
