//! Export Service - JSON backup and members CSV

use sea_orm::*;
use serde::Serialize;

use crate::domain::DomainError;
use crate::models::{
    attendance, badge, belt, class_session, evaluation, member, member_badge, member_technique,
    payment, technique, user, xp_log, xp_preset, xp_settings,
};

use super::finance_service;

pub const BACKUP_VERSION: &str = "1.0";

/// Every table, as written by [`backup`].
#[derive(Debug, Serialize)]
pub struct BackupData {
    pub version: String,
    pub timestamp: String,
    pub xp_settings: Option<xp_settings::Model>,
    pub belts: Vec<belt::Model>,
    pub members: Vec<member::Model>,
    pub class_sessions: Vec<class_session::Model>,
    pub attendance: Vec<attendance::Model>,
    pub xp_logs: Vec<xp_log::Model>,
    pub xp_presets: Vec<xp_preset::Model>,
    pub badges: Vec<badge::Model>,
    pub member_badges: Vec<member_badge::Model>,
    pub techniques: Vec<technique::Model>,
    pub member_techniques: Vec<member_technique::Model>,
    pub evaluations: Vec<evaluation::Model>,
    pub payments: Vec<payment::Model>,
    /// Password hashes are never serialized
    pub users: Vec<user::Model>,
}

pub async fn backup(db: &DatabaseConnection) -> Result<BackupData, DomainError> {
    let data = BackupData {
        version: BACKUP_VERSION.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        xp_settings: xp_settings::Entity::find_by_id(1).one(db).await?,
        belts: belt::Entity::find().all(db).await?,
        members: member::Entity::find().all(db).await?,
        class_sessions: class_session::Entity::find().all(db).await?,
        attendance: attendance::Entity::find().all(db).await?,
        xp_logs: xp_log::Entity::find().all(db).await?,
        xp_presets: xp_preset::Entity::find().all(db).await?,
        badges: badge::Entity::find().all(db).await?,
        member_badges: member_badge::Entity::find().all(db).await?,
        techniques: technique::Entity::find().all(db).await?,
        member_techniques: member_technique::Entity::find().all(db).await?,
        evaluations: evaluation::Entity::find().all(db).await?,
        payments: payment::Entity::find().all(db).await?,
        users: user::Entity::find().all(db).await?,
    };
    tracing::info!(
        "Backup built: {} members, {} classes, {} payments",
        data.members.len(),
        data.class_sessions.len(),
        data.payments.len()
    );
    Ok(data)
}

#[derive(Serialize)]
struct MemberCsvRow<'a> {
    id: i32,
    full_name: &'a str,
    email: &'a str,
    phone: &'a str,
    birth_date: &'a str,
    belt: &'a str,
    stripes: i32,
    xp: i64,
    status: &'a str,
    join_date: &'a str,
    total_paid: f64,
}

/// All members ordered by name, one CSV row each with their paid total.
pub async fn members_csv(db: &DatabaseConnection) -> Result<String, DomainError> {
    let members = member::Entity::find()
        .order_by_asc(member::Column::FullName)
        .all(db)
        .await?;
    let paid = finance_service::paid_totals(db).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    if members.is_empty() {
        writer
            .write_record([
                "id", "full_name", "email", "phone", "birth_date", "belt", "stripes", "xp",
                "status", "join_date", "total_paid",
            ])
            .map_err(|e| DomainError::Internal(e.to_string()))?;
    }
    for m in &members {
        writer
            .serialize(MemberCsvRow {
                id: m.id,
                full_name: &m.full_name,
                email: m.email.as_deref().unwrap_or(""),
                phone: m.phone.as_deref().unwrap_or(""),
                birth_date: m.birth_date.as_deref().unwrap_or(""),
                belt: &m.belt,
                stripes: m.stripes,
                xp: m.xp,
                status: &m.status,
                join_date: &m.join_date,
                total_paid: paid.get(&m.id).copied().unwrap_or(0.0),
            })
            .map_err(|e| DomainError::Internal(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DomainError::Internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DomainError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[tokio::test]
    async fn test_backup_contains_seeded_tables() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let data = backup(&db).await.unwrap();
        assert_eq!(data.version, BACKUP_VERSION);
        assert_eq!(data.belts.len(), 5);
        assert!(data.xp_settings.is_some());
        assert!(data.members.is_empty());
    }

    #[tokio::test]
    async fn test_members_csv_quotes_and_totals() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        assert_eq!(members_csv(&db).await.unwrap().lines().count(), 1);

        let now = chrono::Utc::now().to_rfc3339();
        member::ActiveModel {
            full_name: Set("Silva, Ana".to_string()),
            belt: Set("Blue".to_string()),
            stripes: Set(2),
            xp: Set(700),
            status: Set("active".to_string()),
            enrolled_classes: Set("[]".to_string()),
            join_date: Set("2023-02-01".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let csv = members_csv(&db).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,full_name,email"));
        assert!(lines[1].contains("\"Silva, Ana\""));
        assert!(lines[1].ends_with(",0.0"));
    }
}
