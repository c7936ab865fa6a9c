use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::ApiResult;
use crate::auth::Claims;
use crate::services::user_service::{self, CreateUser};

pub async fn list_users(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    let users = user_service::list_users(&db).await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn create_user(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreateUser>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let user = user_service::create_user(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

pub async fn change_role(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<RoleRequest>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    let user = user_service::change_role(&db, id, &payload.role).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn delete_user(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    user_service::delete_user(&db, id, claims.uid).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
