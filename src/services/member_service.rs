//! Member Service - validation, progression view, promotion and enrolment

use sea_orm::*;
use serde::Serialize;

use crate::domain::progression::{
    BeltProgress, DEFAULT_MIN_MASTERY, Eligibility, belt_progress, match_belt,
    promotion_eligibility, technique_mastery,
};
use crate::domain::{
    CreateMemberInput, DomainError, MemberRepository, MemberStatus, UpdateMemberInput,
};
use crate::models::Member;
use crate::models::class_session::{self, Entity as ClassSession};
use crate::models::member::{self, Entity as MemberEntity};

use super::{gamification_service, normalize_date, require_text, validation, xp_service};

fn check_stripes(stripes: i32, max_stripes: u32) -> Result<(), DomainError> {
    if stripes < 0 || stripes as u32 > max_stripes {
        return Err(DomainError::Validation(format!(
            "stripes must be between 0 and {}",
            max_stripes
        )));
    }
    Ok(())
}

/// Blank dates count as absent; others are stored as `YYYY-MM-DD`.
fn optional_date(field: &str, value: Option<String>) -> Result<Option<String>, DomainError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(Some(normalize_date(field, &v)?)),
        _ => Ok(None),
    }
}

/// Validate and create a member. A missing belt defaults to the first rung
/// of the ladder.
pub async fn create_member(
    db: &DatabaseConnection,
    repo: &dyn MemberRepository,
    mut input: CreateMemberInput,
) -> Result<Member, DomainError> {
    require_text("full_name", &input.full_name)?;
    if let Some(status) = &input.status {
        let status: MemberStatus = validation("status", status)?;
        input.status = Some(status.as_str().to_string());
    }
    if let Some(xp) = input.xp
        && xp < 0
    {
        return Err(DomainError::Validation("xp cannot be negative".to_string()));
    }
    let rules = xp_service::load_rules(db).await?;
    check_stripes(input.stripes.unwrap_or(0), rules.max_stripes)?;
    input.birth_date = optional_date("birth_date", input.birth_date)?;
    input.join_date = optional_date("join_date", input.join_date)?;

    if input.belt.as_deref().is_none_or(|b| b.trim().is_empty()) {
        let ladder = gamification_service::load_ladder(db).await?;
        input.belt = ladder.first().map(|b| b.name.clone());
    }

    let member = repo.create(input).await?;
    tracing::info!("Member created: {} ({})", member.full_name, member.id);
    Ok(member)
}

pub async fn update_member(
    db: &DatabaseConnection,
    repo: &dyn MemberRepository,
    id: i32,
    mut input: UpdateMemberInput,
) -> Result<Member, DomainError> {
    if let Some(name) = &input.full_name {
        require_text("full_name", name)?;
    }
    if let Some(status) = &input.status {
        let status: MemberStatus = validation("status", status)?;
        input.status = Some(status.as_str().to_string());
    }
    if let Some(stripes) = input.stripes {
        let rules = xp_service::load_rules(db).await?;
        check_stripes(stripes, rules.max_stripes)?;
    }
    if let Some(birth_date) = input.birth_date {
        input.birth_date = Some(optional_date("birth_date", birth_date)?);
    }
    input.join_date = optional_date("join_date", input.join_date)?;

    repo.update(id, input).await
}

#[derive(Debug, Serialize)]
pub struct MemberProgress {
    pub member_id: i32,
    pub full_name: String,
    pub belt: String,
    pub recorded_stripes: i32,
    pub progress: BeltProgress,
    pub technique_mastery: f64,
    pub curriculum_size: usize,
    pub eligibility: Eligibility,
}

/// Belt progress, curriculum mastery and promotion eligibility of one member.
pub async fn member_progress<C: ConnectionTrait>(
    conn: &C,
    member: &Member,
) -> Result<MemberProgress, DomainError> {
    let ladder = gamification_service::load_ladder(conn).await?;
    let rules = xp_service::load_rules(conn).await?;
    let progress = belt_progress(&ladder, &member.belt, member.xp, rules.max_stripes);

    let (mastery, curriculum_size) = match &progress.current {
        Some(current) => {
            let checklist =
                gamification_service::member_checklist(conn, member.id, current.id).await?;
            let statuses: Vec<_> = checklist.iter().map(|item| item.status).collect();
            (technique_mastery(&statuses, checklist.len()), checklist.len())
        }
        None => (0.0, 0),
    };

    let eligibility = promotion_eligibility(&progress, mastery, curriculum_size, DEFAULT_MIN_MASTERY);

    Ok(MemberProgress {
        member_id: member.id,
        full_name: member.full_name.clone(),
        belt: member.belt.clone(),
        recorded_stripes: member.stripes,
        progress,
        technique_mastery: mastery,
        curriculum_size,
        eligibility,
    })
}

#[derive(Debug, Serialize)]
pub struct Promotion {
    pub member: Member,
    pub from_belt: String,
    pub to_belt: String,
}

/// Move a member one rung up the ladder and reset stripes.
///
/// The current rung is the one matching the stored belt name; a name that
/// matches nothing is treated as being below the first rung.
pub async fn promote<C: ConnectionTrait>(conn: &C, member_id: i32) -> Result<Promotion, DomainError> {
    let member = MemberEntity::find_by_id(member_id)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;
    let ladder = gamification_service::load_ladder(conn).await?;

    let next_idx = match match_belt(&ladder, &member.belt) {
        Some(idx) => idx + 1,
        None => 0,
    };
    let next = ladder.get(next_idx).ok_or_else(|| {
        DomainError::Conflict(format!("{} is already at the highest belt", member.full_name))
    })?;

    let from_belt = member.belt.clone();
    let mut active: member::ActiveModel = member.into();
    active.belt = Set(next.name.clone());
    active.stripes = Set(0);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    let member = active.update(conn).await?;

    tracing::info!(
        "Member {} promoted from '{}' to '{}'",
        member.id,
        from_belt,
        next.name
    );

    Ok(Promotion {
        member,
        from_belt,
        to_belt: next.name.clone(),
    })
}

pub async fn set_stripes(
    db: &DatabaseConnection,
    repo: &dyn MemberRepository,
    member_id: i32,
    stripes: i32,
) -> Result<Member, DomainError> {
    let rules = xp_service::load_rules(db).await?;
    check_stripes(stripes, rules.max_stripes)?;
    repo.update(
        member_id,
        UpdateMemberInput {
            stripes: Some(stripes),
            ..Default::default()
        },
    )
    .await
}

#[derive(Debug, Serialize)]
pub struct Enrollment {
    pub member_id: i32,
    pub class_id: i32,
    pub enrolled_classes: Vec<i32>,
    pub enrolled_count: i32,
    pub changed: bool,
}

/// Add a class to a member's enrolment list and bump the class count.
/// Enrolling twice is a no-op; a full class is rejected.
pub async fn enroll(
    db: &DatabaseConnection,
    member_id: i32,
    class_id: i32,
) -> Result<Enrollment, DomainError> {
    let txn = db.begin().await?;

    let member = MemberEntity::find_by_id(member_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;
    let class = ClassSession::find_by_id(class_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Class"))?;

    let mut ids = member.enrolled_class_ids();
    if ids.contains(&class_id) {
        return Ok(Enrollment {
            member_id,
            class_id,
            enrolled_classes: ids,
            enrolled_count: class.enrolled_count,
            changed: false,
        });
    }
    if class.enrolled_count >= class.max_capacity {
        return Err(DomainError::Conflict(format!(
            "class '{}' is full ({}/{})",
            class.title, class.enrolled_count, class.max_capacity
        )));
    }

    ids.push(class_id);
    let enrolled_count = class.enrolled_count + 1;
    write_enrollment(&txn, member, class, &ids, enrolled_count).await?;
    txn.commit().await?;

    Ok(Enrollment {
        member_id,
        class_id,
        enrolled_classes: ids,
        enrolled_count,
        changed: true,
    })
}

pub async fn unenroll(
    db: &DatabaseConnection,
    member_id: i32,
    class_id: i32,
) -> Result<Enrollment, DomainError> {
    let txn = db.begin().await?;

    let member = MemberEntity::find_by_id(member_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;
    let class = ClassSession::find_by_id(class_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Class"))?;

    let mut ids = member.enrolled_class_ids();
    if !ids.contains(&class_id) {
        return Ok(Enrollment {
            member_id,
            class_id,
            enrolled_classes: ids,
            enrolled_count: class.enrolled_count,
            changed: false,
        });
    }

    ids.retain(|id| *id != class_id);
    let enrolled_count = (class.enrolled_count - 1).max(0);
    write_enrollment(&txn, member, class, &ids, enrolled_count).await?;
    txn.commit().await?;

    Ok(Enrollment {
        member_id,
        class_id,
        enrolled_classes: ids,
        enrolled_count,
        changed: true,
    })
}

async fn write_enrollment<C: ConnectionTrait>(
    conn: &C,
    member: Member,
    class: class_session::Model,
    ids: &[i32],
    enrolled_count: i32,
) -> Result<(), DomainError> {
    let now = chrono::Utc::now().to_rfc3339();
    let encoded =
        serde_json::to_string(ids).map_err(|e| DomainError::Internal(e.to_string()))?;

    let mut member_active: member::ActiveModel = member.into();
    member_active.enrolled_classes = Set(encoded);
    member_active.updated_at = Set(now.clone());
    member_active.update(conn).await?;

    let mut class_active: class_session::ActiveModel = class.into();
    class_active.enrolled_count = Set(enrolled_count);
    class_active.updated_at = Set(now);
    class_active.update(conn).await?;
    Ok(())
}
