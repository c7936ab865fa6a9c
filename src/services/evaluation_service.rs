//! Evaluation Service - belt exams, stripe checks and technical reviews

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, EvaluationStatus, EvaluationType};
use crate::models::evaluation::{self, Entity as Evaluation};
use crate::models::member::Entity as Member;

use super::member_service::{self, Promotion};
use super::{today, validation};

pub async fn list_evaluations(
    db: &DatabaseConnection,
    member_id: Option<i32>,
) -> Result<Vec<evaluation::Model>, DomainError> {
    let mut query = Evaluation::find();
    if let Some(member_id) = member_id {
        query = query.filter(evaluation::Column::MemberId.eq(member_id));
    }
    Ok(query
        .order_by_desc(evaluation::Column::CreatedAt)
        .order_by_desc(evaluation::Column::Id)
        .all(db)
        .await?)
}

pub async fn get_evaluation(
    db: &DatabaseConnection,
    id: i32,
) -> Result<evaluation::Model, DomainError> {
    Evaluation::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Evaluation"))
}

fn check_score(score: Option<i32>) -> Result<(), DomainError> {
    if let Some(score) = score
        && !(0..=100).contains(&score)
    {
        return Err(DomainError::Validation(
            "score must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateEvaluation {
    pub member_id: i32,
    pub eval_type: String,
    pub status: Option<String>,
    pub score: Option<i32>,
    pub notes: Option<String>,
}

/// Record an evaluation, capturing the member's belt at this moment.
pub async fn create_evaluation(
    db: &DatabaseConnection,
    input: CreateEvaluation,
) -> Result<evaluation::Model, DomainError> {
    let eval_type: EvaluationType = validation("eval_type", &input.eval_type)?;
    let status = match &input.status {
        Some(s) => validation::<EvaluationStatus>("status", s)?,
        None => EvaluationStatus::Scheduled,
    };
    check_score(input.score)?;

    let member = Member::find_by_id(input.member_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;

    let now = chrono::Utc::now().to_rfc3339();
    let evaluated_at = (status != EvaluationStatus::Scheduled).then(today);

    Ok(evaluation::ActiveModel {
        member_id: Set(member.id),
        eval_type: Set(eval_type.as_str().to_string()),
        status: Set(status.as_str().to_string()),
        score: Set(input.score),
        belt_snapshot: Set(member.belt),
        notes: Set(input.notes),
        evaluated_at: Set(evaluated_at),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEvaluation {
    pub status: Option<String>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub score: Option<Option<i32>>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub notes: Option<Option<String>>,
    /// Promote the member when a belt exam becomes `passed`
    #[serde(default)]
    pub promote: bool,
}

#[derive(Debug, Serialize)]
pub struct EvaluationUpdate {
    pub evaluation: evaluation::Model,
    pub promotion: Option<Promotion>,
}

pub async fn update_evaluation(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateEvaluation,
) -> Result<EvaluationUpdate, DomainError> {
    let new_status = input
        .status
        .as_deref()
        .map(|s| validation::<EvaluationStatus>("status", s))
        .transpose()?;
    if let Some(score) = input.score {
        check_score(score)?;
    }

    let txn = db.begin().await?;
    let existing = Evaluation::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Evaluation"))?;

    let was_passed = existing.status == EvaluationStatus::Passed.as_str();
    let is_belt_exam = existing.eval_type == EvaluationType::BeltExam.as_str();
    let member_id = existing.member_id;

    let mut active: evaluation::ActiveModel = existing.into();
    if let Some(status) = new_status {
        active.status = Set(status.as_str().to_string());
        if status != EvaluationStatus::Scheduled {
            active.evaluated_at = Set(Some(today()));
        }
    }
    if let Some(score) = input.score {
        active.score = Set(score);
    }
    if let Some(notes) = input.notes {
        active.notes = Set(notes);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    let evaluation = active.update(&txn).await?;

    let promotion = if input.promote
        && is_belt_exam
        && !was_passed
        && new_status == Some(EvaluationStatus::Passed)
    {
        Some(member_service::promote(&txn, member_id).await?)
    } else {
        None
    };

    txn.commit().await?;

    if let Some(p) = &promotion {
        tracing::info!(
            "Evaluation {} passed: member {} promoted to {}",
            id,
            member_id,
            p.to_belt
        );
    }
    Ok(EvaluationUpdate {
        evaluation,
        promotion,
    })
}

pub async fn delete_evaluation(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    Evaluation::delete_by_id(id).exec(db).await?;
    Ok(())
}
