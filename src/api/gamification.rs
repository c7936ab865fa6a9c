use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::{ApiError, ApiResult};
use crate::auth::Claims;
use crate::domain::DomainError;
use crate::domain::progression::{TechniqueStatus, belt_progress};
use crate::infrastructure::AppState;
use crate::services::gamification_service::{self, BadgeInput, BeltInput, TechniqueInput};
use crate::services::xp_service::{self, CreatePreset, LeaderboardMetric, UpdateXpSettings};

// --- Belts ---

pub async fn list_belts(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
) -> ApiResult<Json<Value>> {
    let belts = gamification_service::list_belts(&db).await?;
    Ok(Json(json!({ "belts": belts })))
}

pub async fn create_belt(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<BeltInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let belt = gamification_service::create_belt(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "belt": belt }))))
}

pub async fn update_belt(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<BeltInput>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let belt = gamification_service::update_belt(&db, id, payload).await?;
    Ok(Json(json!({ "belt": belt })))
}

pub async fn delete_belt(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    gamification_service::delete_belt(&db, id).await?;
    Ok(Json(json!({ "message": "Belt deleted successfully" })))
}

// --- Badges ---

pub async fn list_badges(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
) -> ApiResult<Json<Value>> {
    let badges = gamification_service::list_badges(&db).await?;
    Ok(Json(json!({ "badges": badges })))
}

pub async fn create_badge(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<BadgeInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let badge = gamification_service::create_badge(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "badge": badge }))))
}

pub async fn update_badge(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<BadgeInput>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let badge = gamification_service::update_badge(&db, id, payload).await?;
    Ok(Json(json!({ "badge": badge })))
}

pub async fn delete_badge(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    gamification_service::delete_badge(&db, id).await?;
    Ok(Json(json!({ "message": "Badge deleted successfully" })))
}

pub async fn member_badges(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(member_id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_member_access(member_id)?;
    let badges = gamification_service::member_badges(&db, member_id).await?;
    Ok(Json(json!({ "badges": badges })))
}

pub async fn assign_badge(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((member_id, badge_id)): Path<(i32, i32)>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let assignment = gamification_service::assign_badge(&db, member_id, badge_id).await?;
    Ok((StatusCode::CREATED, Json(json!({ "assignment": assignment }))))
}

pub async fn revoke_badge(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((member_id, badge_id)): Path<(i32, i32)>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    gamification_service::revoke_badge(&db, member_id, badge_id).await?;
    Ok(Json(json!({ "message": "Badge revoked" })))
}

// --- Techniques ---

#[derive(Debug, Deserialize)]
pub struct BeltQuery {
    pub belt_id: Option<i32>,
}

pub async fn list_techniques(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
    Query(query): Query<BeltQuery>,
) -> ApiResult<Json<Value>> {
    let techniques = gamification_service::list_techniques(&db, query.belt_id).await?;
    Ok(Json(json!({ "techniques": techniques })))
}

pub async fn create_technique(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<TechniqueInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let technique = gamification_service::create_technique(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "technique": technique }))))
}

pub async fn update_technique(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<TechniqueInput>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let technique = gamification_service::update_technique(&db, id, payload).await?;
    Ok(Json(json!({ "technique": technique })))
}

pub async fn delete_technique(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    gamification_service::delete_technique(&db, id).await?;
    Ok(Json(json!({ "message": "Technique deleted successfully" })))
}

/// Checklist for `belt_id`, or for the member's current belt when omitted.
pub async fn member_checklist(
    State(state): State<AppState>,
    claims: Claims,
    Path(member_id): Path<i32>,
    Query(query): Query<BeltQuery>,
) -> ApiResult<Json<Value>> {
    claims.require_member_access(member_id)?;
    let db = state.db();

    let belt_id = match query.belt_id {
        Some(id) => Some(id),
        None => {
            let member = state
                .member_repo
                .find_by_id(member_id)
                .await?
                .ok_or_else(|| ApiError(DomainError::not_found("Member")))?;
            let ladder = gamification_service::load_ladder(db).await?;
            let rules = xp_service::load_rules(db).await?;
            belt_progress(&ladder, &member.belt, member.xp, rules.max_stripes)
                .current
                .map(|b| b.id)
        }
    };

    let items = match belt_id {
        Some(belt_id) => gamification_service::member_checklist(db, member_id, belt_id).await?,
        None => Vec::new(),
    };
    Ok(Json(json!({ "belt_id": belt_id, "techniques": items })))
}

#[derive(Debug, Deserialize)]
pub struct TechniqueStatusRequest {
    pub status: String,
}

pub async fn set_technique_status(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((member_id, technique_id)): Path<(i32, i32)>,
    Json(payload): Json<TechniqueStatusRequest>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let status: TechniqueStatus = payload
        .status
        .parse()
        .map_err(|e: String| ApiError(DomainError::Validation(format!("status: {}", e))))?;
    let saved = gamification_service::set_technique_status(&db, member_id, technique_id, status).await?;
    Ok(Json(json!({ "technique_status": saved })))
}

// --- XP presets and settings ---

pub async fn list_presets(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
) -> ApiResult<Json<Value>> {
    let presets = xp_service::list_presets(&db).await?;
    Ok(Json(json!({ "presets": presets })))
}

pub async fn create_preset(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreatePreset>,
) -> ApiResult<impl IntoResponse> {
    claims.require_staff()?;
    let preset = xp_service::create_preset(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "preset": preset }))))
}

pub async fn delete_preset(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    xp_service::delete_preset(&db, id).await?;
    Ok(Json(json!({ "message": "Preset deleted successfully" })))
}

pub async fn get_settings(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
) -> ApiResult<Json<Value>> {
    let settings = xp_service::get_settings(&db).await?;
    Ok(Json(json!({ "settings": settings })))
}

pub async fn update_settings(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<UpdateXpSettings>,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let settings = xp_service::update_settings(&db, payload).await?;
    Ok(Json(json!({ "settings": settings })))
}

// --- Leaderboard ---

const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const MAX_LEADERBOARD_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub metric: LeaderboardMetric,
    /// Only count attendance checked in on or after this date
    pub since: Option<String>,
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/leaderboard",
    params(
        ("metric" = Option<String>, Query, description = "xp (default) or attendance"),
        ("since" = Option<String>, Query, description = "YYYY-MM-DD lower bound for attendance"),
        ("limit" = Option<usize>, Query, description = "Number of entries, default 10")
    ),
    responses(
        (status = 200, description = "Ranked active members")
    )
)]
pub async fn leaderboard(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let entries = xp_service::leaderboard(&db, query.metric, query.since.as_deref(), limit).await?;
    Ok(Json(json!({ "metric": query.metric, "entries": entries })))
}
