//! Services Layer
//!
//! Business operations over the tables. Each service issues its own queries,
//! keeps no cache and is called from the Axum handlers.

pub mod agenda_service;
pub mod attendance_service;
pub mod dashboard_service;
pub mod evaluation_service;
pub mod export_service;
pub mod finance_service;
pub mod gamification_service;
pub mod member_service;
pub mod user_service;
pub mod xp_service;

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::domain::DomainError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const CLASS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Local calendar date as `YYYY-MM-DD`.
pub fn today() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        DomainError::Validation(format!("{}: expected YYYY-MM-DD, got '{}'", field, value))
    })
}

/// Accepts `YYYY-MM-DDTHH:MM` with optional seconds.
pub fn parse_class_time(field: &str, value: &str) -> Result<NaiveDateTime, DomainError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, CLASS_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| {
            DomainError::Validation(format!(
                "{}: expected YYYY-MM-DDTHH:MM, got '{}'",
                field, value
            ))
        })
}

/// Validated date re-formatted as `YYYY-MM-DD`, the form every text comparison expects.
pub fn normalize_date(field: &str, value: &str) -> Result<String, DomainError> {
    parse_date(field, value).map(|d| d.format(DATE_FORMAT).to_string())
}

/// Validated class time re-formatted as `YYYY-MM-DDTHH:MM`.
pub fn normalize_class_time(field: &str, value: &str) -> Result<String, DomainError> {
    parse_class_time(field, value).map(|t| t.format(CLASS_TIME_FORMAT).to_string())
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn validation<T: std::str::FromStr<Err = String>>(
    field: &str,
    value: &str,
) -> Result<T, DomainError> {
    crate::domain::parse_field(field, value).map_err(DomainError::Validation)
}
