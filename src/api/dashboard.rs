use axum::{Json, extract::State};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

use super::error::ApiResult;
use crate::auth::Claims;
use crate::domain::Role;
use crate::services::dashboard_service;

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Headline numbers for the console"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn get_dashboard(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> ApiResult<Json<Value>> {
    claims.require_staff()?;
    let mut stats = dashboard_service::stats(&db).await?;
    // Money figures are admin-only
    if claims.role() != Role::Admin {
        stats.month_revenue = 0.0;
        stats.overdue_amount = 0.0;
    }
    Ok(Json(json!({ "stats": stats })))
}
