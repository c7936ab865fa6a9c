use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::ApiResult;
use crate::auth::Claims;
use crate::services::finance_service::{self, PaymentFilter, PaymentInput};
use crate::services::today;

pub async fn list_payments(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    let payments = finance_service::list_payments(&db, filter).await?;
    let total = payments.len();
    Ok(Json(json!({ "payments": payments, "total": total })))
}

pub async fn get_payment(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    let payment = finance_service::get_payment(&db, id).await?;
    Ok(Json(json!({ "payment": payment })))
}

pub async fn create_payment(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<PaymentInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let payment = finance_service::create_payment(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "payment": payment }))))
}

pub async fn update_payment(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<PaymentInput>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    let payment = finance_service::update_payment(&db, id, payload).await?;
    Ok(Json(json!({ "payment": payment })))
}

pub async fn delete_payment(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    finance_service::delete_payment(&db, id).await?;
    Ok(Json(json!({ "message": "Payment deleted successfully" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkPaidRequest {
    pub method: Option<String>,
}

pub async fn mark_paid(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    payload: Option<Json<MarkPaidRequest>>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    let method = payload.and_then(|Json(p)| p.method);
    let payment = finance_service::mark_paid(&db, id, method).await?;
    Ok(Json(json!({ "payment": payment })))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub month: Option<String>,
}

pub async fn summary(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<Value>> {
    claims.require_admin()?;
    let summary = finance_service::month_summary(&db, query.month.as_deref()).await?;
    Ok(Json(json!({ "summary": summary })))
}

pub async fn export_csv(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let body = finance_service::payments_csv(&db, filter).await?;
    Ok((
        StatusCode::OK,
        csv_headers(&format!("payments_{}.csv", today())),
        body,
    ))
}

pub(crate) fn csv_headers(filename: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers
}
