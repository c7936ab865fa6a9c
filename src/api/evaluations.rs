use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::ApiResult;
use crate::auth::Claims;
use crate::services::evaluation_service::{self, CreateEvaluation, UpdateEvaluation};

#[derive(Debug, Deserialize)]
pub struct EvaluationQuery {
    pub member_id: Option<i32>,
}

pub async fn list_evaluations(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Query(query): Query<EvaluationQuery>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let evaluations = evaluation_service::list_evaluations(&db, query.member_id).await?;
    let total = evaluations.len();
    Ok(Json(json!({ "evaluations": evaluations, "total": total })))
}

pub async fn get_evaluation(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let evaluation = evaluation_service::get_evaluation(&db, id).await?;
    Ok(Json(json!({ "evaluation": evaluation })))
}

pub async fn create_evaluation(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreateEvaluation>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let evaluation = evaluation_service::create_evaluation(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "evaluation": evaluation }))))
}

pub async fn update_evaluation(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateEvaluation>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let update = evaluation_service::update_evaluation(&db, id, payload).await?;
    Ok(Json(json!({
        "evaluation": update.evaluation,
        "promotion": update.promotion
    })))
}

pub async fn delete_evaluation(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    evaluation_service::delete_evaluation(&db, id).await?;
    Ok(Json(json!({ "message": "Evaluation deleted successfully" })))
}
