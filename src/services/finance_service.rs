//! Finance Service - membership payments
//!
//! `overdue` is never written. A payment reads as overdue while it is
//! pending and its due date is before today.

use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{DomainError, PaymentStatus, payment_state};
use crate::models::member::Entity as Member;
use crate::models::payment::{self, Entity as Payment};

use super::{normalize_date, parse_date, today, validation};

/// A payment row as shown to clients, with its derived state and payer name.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: payment::Model,
    pub state: String,
    pub member_name: String,
}

fn view(payment: payment::Model, member_name: String, today: &str) -> PaymentView {
    PaymentView {
        state: payment_state(&payment.status, &payment.due_date, today).to_string(),
        payment,
        member_name,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub member_id: Option<i32>,
    /// `pending`, `paid`, `cancelled` or the derived `overdue`
    pub status: Option<String>,
    /// `YYYY-MM`, matched against the due date
    pub month: Option<String>,
}

/// `YYYY-MM` prefix shared by the date columns of that month.
fn month_prefix(month: &str) -> Result<String, DomainError> {
    parse_date("month", &format!("{}-01", month.trim())).map(|d| d.format("%Y-%m").to_string())
}

pub async fn list_payments(
    db: &DatabaseConnection,
    filter: PaymentFilter,
) -> Result<Vec<PaymentView>, DomainError> {
    let today = today();
    let mut query = Payment::find();

    if let Some(member_id) = filter.member_id {
        query = query.filter(payment::Column::MemberId.eq(member_id));
    }
    if let Some(month) = filter.month.as_deref().filter(|m| !m.trim().is_empty()) {
        query = query.filter(payment::Column::DueDate.starts_with(month_prefix(month)?));
    }
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        if status.trim().eq_ignore_ascii_case("overdue") {
            query = query
                .filter(payment::Column::Status.eq(PaymentStatus::Pending.as_str()))
                .filter(payment::Column::DueDate.lt(today.as_str()));
        } else {
            let status: PaymentStatus = validation("status", status)?;
            query = query.filter(payment::Column::Status.eq(status.as_str()));
            if status == PaymentStatus::Pending {
                query = query.filter(payment::Column::DueDate.gte(today.as_str()));
            }
        }
    }

    let rows = query
        .find_also_related(Member)
        .order_by_desc(payment::Column::DueDate)
        .order_by_desc(payment::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(p, m)| view(p, m.map(|m| m.full_name).unwrap_or_default(), &today))
        .collect())
}

pub async fn get_payment(db: &DatabaseConnection, id: i32) -> Result<PaymentView, DomainError> {
    let (payment, member) = Payment::find_by_id(id)
        .find_also_related(Member)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Payment"))?;
    Ok(view(
        payment,
        member.map(|m| m.full_name).unwrap_or_default(),
        &today(),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentInput {
    pub member_id: Option<i32>,
    pub amount: Option<f64>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub description: Option<Option<String>>,
    pub due_date: Option<String>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub paid_date: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub method: Option<Option<String>>,
}

fn check_amount(amount: f64) -> Result<(), DomainError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(DomainError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn parse_status(status: &str) -> Result<PaymentStatus, DomainError> {
    if status.trim().eq_ignore_ascii_case("overdue") {
        return Err(DomainError::Validation(
            "status: overdue is derived from the due date and cannot be set".to_string(),
        ));
    }
    validation("status", status)
}

pub async fn create_payment(
    db: &DatabaseConnection,
    input: PaymentInput,
) -> Result<PaymentView, DomainError> {
    let member_id = input
        .member_id
        .ok_or_else(|| DomainError::Validation("member_id is required".to_string()))?;
    let amount = input
        .amount
        .ok_or_else(|| DomainError::Validation("amount is required".to_string()))?;
    check_amount(amount)?;
    let due_date = match input.due_date {
        Some(d) => normalize_date("due_date", &d)?,
        None => today(),
    };
    let status = match &input.status {
        Some(s) => parse_status(s)?,
        None => PaymentStatus::Pending,
    };
    let mut paid_date = input
        .paid_date
        .flatten()
        .map(|d| normalize_date("paid_date", &d))
        .transpose()?;
    if status == PaymentStatus::Paid && paid_date.is_none() {
        paid_date = Some(today());
    }

    let member = Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Member"))?;

    let now = chrono::Utc::now().to_rfc3339();
    let saved = payment::ActiveModel {
        member_id: Set(member_id),
        amount: Set(amount),
        description: Set(input.description.flatten()),
        due_date: Set(due_date),
        paid_date: Set(paid_date),
        status: Set(status.as_str().to_string()),
        method: Set(input.method.flatten()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "Payment {} created for {}: {:.2} due {}",
        saved.id,
        member.full_name,
        saved.amount,
        saved.due_date
    );
    Ok(view(saved, member.full_name, &today()))
}

pub async fn update_payment(
    db: &DatabaseConnection,
    id: i32,
    input: PaymentInput,
) -> Result<PaymentView, DomainError> {
    let existing = Payment::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Payment"))?;

    let mut active: payment::ActiveModel = existing.into();
    if let Some(member_id) = input.member_id {
        Member::find_by_id(member_id)
            .one(db)
            .await?
            .ok_or_else(|| DomainError::not_found("Member"))?;
        active.member_id = Set(member_id);
    }
    if let Some(amount) = input.amount {
        check_amount(amount)?;
        active.amount = Set(amount);
    }
    if let Some(description) = input.description {
        active.description = Set(description);
    }
    if let Some(due_date) = input.due_date {
        active.due_date = Set(normalize_date("due_date", &due_date)?);
    }
    if let Some(paid_date) = input.paid_date {
        let paid_date = paid_date
            .map(|d| normalize_date("paid_date", &d))
            .transpose()?;
        active.paid_date = Set(paid_date);
    }
    if let Some(status) = &input.status {
        active.status = Set(parse_status(status)?.as_str().to_string());
    }
    if let Some(method) = input.method {
        active.method = Set(method);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    active.update(db).await?;

    get_payment(db, id).await
}

/// Settle a payment today. Cancelled payments cannot be settled.
pub async fn mark_paid(
    db: &DatabaseConnection,
    id: i32,
    method: Option<String>,
) -> Result<PaymentView, DomainError> {
    let existing = Payment::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Payment"))?;
    if existing.status == PaymentStatus::Cancelled.as_str() {
        return Err(DomainError::Conflict(
            "cancelled payments cannot be marked paid".to_string(),
        ));
    }

    let mut active: payment::ActiveModel = existing.into();
    active.status = Set(PaymentStatus::Paid.as_str().to_string());
    active.paid_date = Set(Some(today()));
    if method.is_some() {
        active.method = Set(method);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    active.update(db).await?;

    tracing::info!("Payment {} marked paid", id);
    get_payment(db, id).await
}

pub async fn delete_payment(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    Payment::delete_by_id(id).exec(db).await?;
    Ok(())
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct MonthSummary {
    pub month: String,
    pub received: f64,
    pub received_count: usize,
    pub pending: f64,
    pub pending_count: usize,
    pub overdue: f64,
    pub overdue_count: usize,
}

/// Totals for `month` (`YYYY-MM`, default current month) as of `today`.
///
/// Received counts payments whose paid date falls in the month. Pending and
/// overdue count unpaid payments due in the month.
pub async fn month_summary(
    db: &DatabaseConnection,
    month: Option<&str>,
) -> Result<MonthSummary, DomainError> {
    let today = today();
    let month = match month.filter(|m| !m.trim().is_empty()) {
        Some(m) => month_prefix(m)?,
        None => today[..7].to_string(),
    };

    let rows = Payment::find()
        .filter(
            Condition::any()
                .add(payment::Column::DueDate.starts_with(&month))
                .add(payment::Column::PaidDate.starts_with(&month)),
        )
        .all(db)
        .await?;

    let mut summary = MonthSummary {
        month: month.clone(),
        ..Default::default()
    };
    for p in rows {
        match payment_state(&p.status, &p.due_date, &today) {
            "paid" if p.paid_date.as_deref().is_some_and(|d| d.starts_with(&month)) => {
                summary.received += p.amount;
                summary.received_count += 1;
            }
            "pending" if p.due_date.starts_with(&month) => {
                summary.pending += p.amount;
                summary.pending_count += 1;
            }
            "overdue" if p.due_date.starts_with(&month) => {
                summary.overdue += p.amount;
                summary.overdue_count += 1;
            }
            _ => {}
        }
    }
    Ok(summary)
}

/// Count and amount of every overdue payment, regardless of month.
pub async fn overdue_totals<C: ConnectionTrait>(conn: &C) -> Result<(usize, f64), DomainError> {
    let rows = Payment::find()
        .filter(payment::Column::Status.eq(PaymentStatus::Pending.as_str()))
        .filter(payment::Column::DueDate.lt(today()))
        .all(conn)
        .await?;
    Ok((rows.len(), rows.iter().map(|p| p.amount).sum()))
}

#[derive(Serialize)]
struct PaymentCsvRow<'a> {
    id: i32,
    member_id: i32,
    member_name: &'a str,
    amount: f64,
    description: &'a str,
    due_date: &'a str,
    paid_date: &'a str,
    status: &'a str,
    method: &'a str,
}

/// Payments matching `filter` as CSV with a header row.
pub async fn payments_csv(
    db: &DatabaseConnection,
    filter: PaymentFilter,
) -> Result<String, DomainError> {
    let payments = list_payments(db, filter).await?;
    let mut writer = csv::Writer::from_writer(Vec::new());
    for p in &payments {
        writer
            .serialize(PaymentCsvRow {
                id: p.payment.id,
                member_id: p.payment.member_id,
                member_name: &p.member_name,
                amount: p.payment.amount,
                description: p.payment.description.as_deref().unwrap_or(""),
                due_date: &p.payment.due_date,
                paid_date: p.payment.paid_date.as_deref().unwrap_or(""),
                status: &p.state,
                method: p.payment.method.as_deref().unwrap_or(""),
            })
            .map_err(|e| DomainError::Internal(e.to_string()))?;
    }
    if payments.is_empty() {
        writer
            .write_record([
                "id", "member_id", "member_name", "amount", "description", "due_date",
                "paid_date", "status", "method",
            ])
            .map_err(|e| DomainError::Internal(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| DomainError::Internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DomainError::Internal(e.to_string()))
}

/// Total paid per member, used by the members CSV export.
pub async fn paid_totals<C: ConnectionTrait>(conn: &C) -> Result<HashMap<i32, f64>, DomainError> {
    let mut totals = HashMap::new();
    for p in Payment::find()
        .filter(payment::Column::Status.eq(PaymentStatus::Paid.as_str()))
        .all(conn)
        .await?
    {
        *totals.entry(p.member_id).or_insert(0.0) += p.amount;
    }
    Ok(totals)
}
