use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

use super::error::ApiResult;
use crate::auth::Claims;
use crate::services::user_service::{self, CreateUser, LoginRequest};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let session = user_service::login(&db, payload).await?;
    Ok(Json(json!({ "token": session.token, "user": session.user })))
}

/// Create the first admin account; closed once any user exists.
pub async fn register(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateUser>,
) -> ApiResult<impl IntoResponse> {
    let session = user_service::register_first_admin(&db, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": session.token, "user": session.user })),
    ))
}

pub async fn setup_status(State(db): State<DatabaseConnection>) -> ApiResult<Json<Value>> {
    let needs_setup = user_service::needs_setup(&db).await?;
    Ok(Json(json!({ "needs_setup": needs_setup })))
}

pub async fn me(State(db): State<DatabaseConnection>, claims: Claims) -> ApiResult<Json<Value>> {
    let user = user_service::get_user(&db, claims.uid).await?;
    Ok(Json(json!({
        "user": user,
        "role": claims.role(),
        "member_id": claims.member_id
    })))
}
