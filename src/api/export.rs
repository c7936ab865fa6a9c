use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;

use super::error::ApiResult;
use super::finance::csv_headers;
use crate::auth::Claims;
use crate::services::{export_service, today};

/// Full JSON backup of every table, served as a download.
pub async fn export_data(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let backup = export_service::backup(&db).await?;

    let filename = format!("dojo_backup_{}.json", today());
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((StatusCode::OK, headers, Json(backup)))
}

pub async fn export_members_csv(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let body = export_service::members_csv(&db).await?;
    Ok((
        StatusCode::OK,
        csv_headers(&format!("members_{}.csv", today())),
        body,
    ))
}
