use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

use super::error::ApiResult;
use crate::auth::Claims;
use crate::services::agenda_service::{self, ClassInput, ClassWindow};
use crate::services::attendance_service::{self, CheckInInput, RollInput};
use crate::services::today;

#[utoipa::path(
    get,
    path = "/api/classes",
    params(
        ("from" = Option<String>, Query, description = "First day, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Last day, YYYY-MM-DD"),
        ("class_type" = Option<String>, Query, description = "kids, adult, competition, open_mat or private")
    ),
    responses(
        (status = 200, description = "Classes ordered by start time")
    )
)]
pub async fn list_classes(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Query(window): Query<ClassWindow>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let classes = agenda_service::list_classes(&db, window).await?;
    let total = classes.len();
    Ok(Json(json!({ "classes": classes, "total": total })))
}

pub async fn today_classes(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let day = today();
    let classes = agenda_service::classes_on(&db, &day).await?;
    Ok(Json(json!({ "date": day, "classes": classes })))
}

pub async fn get_class(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let class = agenda_service::get_class(&db, id).await?;
    Ok(Json(json!({ "class": class })))
}

pub async fn create_class(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<ClassInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let class = agenda_service::create_class(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "class": class }))))
}

pub async fn update_class(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<ClassInput>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let class = agenda_service::update_class(&db, id, payload).await?;
    Ok(Json(json!({ "class": class })))
}

pub async fn delete_class(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    agenda_service::delete_class(&db, id).await?;
    Ok(Json(json!({ "message": "Class deleted successfully" })))
}

pub async fn get_roll(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let entries = attendance_service::roll(&db, id).await?;
    Ok(Json(json!({ "class_id": id, "attendance": entries })))
}

/// Replace the roll of a class with the posted entries.
pub async fn save_roll(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(entries): Json<Vec<RollInput>>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let summary = attendance_service::save_roll(&db, id, entries).await?;
    Ok(Json(json!({ "summary": summary })))
}

pub async fn check_in(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<CheckInInput>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let check_in = attendance_service::check_in(&db, id, payload).await?;
    Ok(Json(json!({ "check_in": check_in })))
}
