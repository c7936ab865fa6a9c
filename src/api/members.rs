use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::{ApiError, ApiResult};
use crate::auth::Claims;
use crate::domain::{CreateMemberInput, DomainError, MemberFilter, UpdateMemberInput};
use crate::infrastructure::AppState;
use crate::models::Member;
use crate::services::{attendance_service, member_service, xp_service};

async fn load_member(state: &AppState, id: i32) -> ApiResult<Member> {
    state
        .member_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError(DomainError::not_found("Member")))
}

#[utoipa::path(
    get,
    path = "/api/members",
    responses(
        (status = 200, description = "Paginated member list"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    claims: Claims,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let page = filter.page.unwrap_or(1).max(1);
    let result = state.member_repo.find_all(filter).await?;
    Ok(Json(json!({
        "members": result.members,
        "total": result.total,
        "page": page
    })))
}

pub async fn get_member(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_member_access(id)?;
    let member = load_member(&state, id).await?;
    Ok(Json(json!({ "member": member })))
}

#[utoipa::path(
    post,
    path = "/api/members",
    responses(
        (status = 201, description = "Member created"),
        (status = 400, description = "Invalid member data")
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CreateMemberInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let member = member_service::create_member(state.db(), state.member_repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "member": member }))))
}

pub async fn update_member(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateMemberInput>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let member = member_service::update_member(state.db(), state.member_repo.as_ref(), id, payload).await?;
    Ok(Json(json!({ "member": member })))
}

/// Idempotent: deleting an unknown member still answers 200.
pub async fn delete_member(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let avatar = state
        .member_repo
        .find_by_id(id)
        .await?
        .and_then(|m| m.avatar_url);
    if state.member_repo.delete(id).await?
        && let Some(url) = avatar
    {
        state.avatars.remove(&url).await;
    }
    Ok(Json(json!({ "message": "Member deleted successfully" })))
}

pub async fn member_progress(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_member_access(id)?;
    let member = load_member(&state, id).await?;
    let progress = member_service::member_progress(state.db(), &member).await?;
    Ok(Json(json!({ "progress": progress })))
}

pub async fn xp_history(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_member_access(id)?;
    let logs = xp_service::xp_history(&db, id).await?;
    let total = logs.len();
    Ok(Json(json!({ "logs": logs, "total": total })))
}

#[derive(Debug, Deserialize)]
pub struct AdjustXpRequest {
    pub amount: i64,
    pub reason: String,
}

pub async fn adjust_xp(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<AdjustXpRequest>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let adjustment = xp_service::adjust_xp(&db, id, payload.amount, &payload.reason).await?;
    Ok(Json(json!({ "adjustment": adjustment })))
}

pub async fn apply_preset(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((id, preset_id)): Path<(i32, i32)>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let adjustment = xp_service::apply_preset(&db, id, preset_id).await?;
    Ok(Json(json!({ "adjustment": adjustment })))
}

pub async fn promote(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let promotion = member_service::promote(&db, id).await?;
    Ok(Json(json!({ "promotion": promotion })))
}

#[derive(Debug, Deserialize)]
pub struct StripesRequest {
    pub stripes: i32,
}

pub async fn set_stripes(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<StripesRequest>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let member =
        member_service::set_stripes(state.db(), state.member_repo.as_ref(), id, payload.stripes).await?;
    Ok(Json(json!({ "member": member })))
}

pub async fn enroll(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((id, class_id)): Path<(i32, i32)>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let enrollment = member_service::enroll(&db, id, class_id).await?;
    Ok(Json(json!({ "enrollment": enrollment })))
}

pub async fn unenroll(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((id, class_id)): Path<(i32, i32)>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let enrollment = member_service::unenroll(&db, id, class_id).await?;
    Ok(Json(json!({ "enrollment": enrollment })))
}

pub async fn attendance_history(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_member_access(id)?;
    let history = attendance_service::member_history(&db, id).await?;
    Ok(Json(json!({ "attendance": history })))
}

/// Replace a member's avatar with the `file` (or first) part of a multipart body.
pub async fn upload_avatar(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let member = load_member(&state, id).await?;

    let bad_upload = |e: axum::extract::multipart::MultipartError| {
        ApiError(DomainError::Validation(format!("invalid upload: {}", e)))
    };
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        if field.name().is_some_and(|n| n != "file") && upload.is_some() {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_upload)?;
        upload = Some((content_type, bytes));
    }
    let (content_type, bytes) =
        upload.ok_or_else(|| ApiError(DomainError::Validation("no file uploaded".to_string())))?;

    let url = state.avatars.save(&content_type, &bytes).await?;
    let updated = state
        .member_repo
        .update(
            id,
            UpdateMemberInput {
                avatar_url: Some(Some(url)),
                ..Default::default()
            },
        )
        .await?;
    if let Some(old) = member.avatar_url {
        state.avatars.remove(&old).await;
    }
    Ok(Json(json!({ "member": updated })))
}
