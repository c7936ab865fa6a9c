//! Agenda Service - class sessions

use sea_orm::*;
use serde::Deserialize;

use crate::domain::{ClassType, DomainError};
use crate::models::class_session::{self, Entity as ClassSession};

use super::{normalize_class_time, normalize_date, parse_class_time, parse_date, require_text, validation};

#[derive(Debug, Default, Deserialize)]
pub struct ClassWindow {
    /// Inclusive start date `YYYY-MM-DD`
    pub from: Option<String>,
    /// Inclusive end date `YYYY-MM-DD`
    pub to: Option<String>,
    pub class_type: Option<String>,
}

pub async fn list_classes<C: ConnectionTrait>(
    conn: &C,
    window: ClassWindow,
) -> Result<Vec<class_session::Model>, DomainError> {
    let mut query = ClassSession::find();

    if let Some(from) = window.from.as_deref().filter(|s| !s.trim().is_empty()) {
        let from = normalize_date("from", from)?;
        query = query.filter(class_session::Column::StartTime.gte(from));
    }
    if let Some(to) = window.to.as_deref().filter(|s| !s.trim().is_empty()) {
        let to = parse_date("to", to)?;
        // start_time sorts as text; everything on `to` is below the next day
        let next = to.succ_opt().unwrap_or(to).format(super::DATE_FORMAT).to_string();
        query = query.filter(class_session::Column::StartTime.lt(next));
    }
    if let Some(kind) = window.class_type.as_deref().filter(|s| !s.is_empty()) {
        let kind: ClassType = validation("class_type", kind)?;
        query = query.filter(class_session::Column::ClassType.eq(kind.as_str()));
    }

    Ok(query
        .order_by_asc(class_session::Column::StartTime)
        .all(conn)
        .await?)
}

/// Classes starting on `day` (`YYYY-MM-DD`).
pub async fn classes_on<C: ConnectionTrait>(
    conn: &C,
    day: &str,
) -> Result<Vec<class_session::Model>, DomainError> {
    list_classes(
        conn,
        ClassWindow {
            from: Some(day.to_string()),
            to: Some(day.to_string()),
            class_type: None,
        },
    )
    .await
}

pub async fn get_class(db: &DatabaseConnection, id: i32) -> Result<class_session::Model, DomainError> {
    ClassSession::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Class"))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassInput {
    pub title: Option<String>,
    pub instructor: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_capacity: Option<i32>,
    pub enrolled_count: Option<i32>,
    pub class_type: Option<String>,
    #[serde(default, with = "crate::domain::repositories::double_option")]
    pub description: Option<Option<String>>,
}

fn validate(class: &class_session::Model) -> Result<(), DomainError> {
    require_text("title", &class.title)?;
    let start = parse_class_time("start_time", &class.start_time)?;
    let end = parse_class_time("end_time", &class.end_time)?;
    if end <= start {
        return Err(DomainError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    if class.max_capacity < 1 {
        return Err(DomainError::Validation(
            "max_capacity must be at least 1".to_string(),
        ));
    }
    if class.enrolled_count < 0 || class.enrolled_count > class.max_capacity {
        return Err(DomainError::Validation(format!(
            "enrolled_count must be between 0 and {}",
            class.max_capacity
        )));
    }
    Ok(())
}

/// Fold `input` over `base`, normalizing the class type.
fn merge(base: class_session::Model, input: ClassInput) -> Result<class_session::Model, DomainError> {
    let class_type = match input.class_type {
        Some(kind) => validation::<ClassType>("class_type", &kind)?.as_str().to_string(),
        None => base.class_type,
    };
    Ok(class_session::Model {
        title: input.title.map(|t| t.trim().to_string()).unwrap_or(base.title),
        instructor: input.instructor.unwrap_or(base.instructor),
        start_time: match input.start_time {
            Some(t) => normalize_class_time("start_time", &t)?,
            None => base.start_time,
        },
        end_time: match input.end_time {
            Some(t) => normalize_class_time("end_time", &t)?,
            None => base.end_time,
        },
        max_capacity: input.max_capacity.unwrap_or(base.max_capacity),
        enrolled_count: input.enrolled_count.unwrap_or(base.enrolled_count),
        description: match input.description {
            Some(d) => d,
            None => base.description,
        },
        class_type,
        ..base
    })
}

pub async fn create_class(
    db: &DatabaseConnection,
    input: ClassInput,
) -> Result<class_session::Model, DomainError> {
    let now = chrono::Utc::now().to_rfc3339();
    let blank = class_session::Model {
        id: 0,
        title: String::new(),
        instructor: String::new(),
        start_time: String::new(),
        end_time: String::new(),
        max_capacity: 20,
        enrolled_count: 0,
        class_type: ClassType::Adult.as_str().to_string(),
        description: None,
        created_at: now.clone(),
        updated_at: now,
    };
    let class = merge(blank, input)?;
    validate(&class)?;

    let saved = class_session::ActiveModel {
        title: Set(class.title),
        instructor: Set(class.instructor),
        start_time: Set(class.start_time),
        end_time: Set(class.end_time),
        max_capacity: Set(class.max_capacity),
        enrolled_count: Set(class.enrolled_count),
        class_type: Set(class.class_type),
        description: Set(class.description),
        created_at: Set(class.created_at),
        updated_at: Set(class.updated_at),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Class created: {} at {}", saved.title, saved.start_time);
    Ok(saved)
}

pub async fn update_class(
    db: &DatabaseConnection,
    id: i32,
    input: ClassInput,
) -> Result<class_session::Model, DomainError> {
    let existing = get_class(db, id).await?;
    let class = merge(existing.clone(), input)?;
    validate(&class)?;

    let mut active: class_session::ActiveModel = existing.into();
    active.title = Set(class.title);
    active.instructor = Set(class.instructor);
    active.start_time = Set(class.start_time);
    active.end_time = Set(class.end_time);
    active.max_capacity = Set(class.max_capacity);
    active.enrolled_count = Set(class.enrolled_count);
    active.class_type = Set(class.class_type);
    active.description = Set(class.description);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

pub async fn delete_class(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    let res = ClassSession::delete_by_id(id).exec(db).await?;
    if res.rows_affected > 0 {
        tracing::info!("Class {} deleted", id);
    }
    Ok(())
}
