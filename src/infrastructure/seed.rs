//! Demo data for a fresh database, enabled with `SEED_DEMO`.

use chrono::{Duration, Local};
use sea_orm::*;

use crate::auth::hash_password;
use crate::domain::DomainError;
use crate::models::{class_session, member, payment, user};
use crate::services::attendance_service::{self, RollInput};
use crate::services::{CLASS_TIME_FORMAT, DATE_FORMAT};

const DEMO_MEMBERS: &[(&str, &str, i64, &str)] = &[
    ("Ana Souza", "Blue", 820, "active"),
    ("Bruno Lima", "White", 180, "active"),
    ("Carla Mendes", "Purple", 2100, "active"),
    ("Diego Ramos", "White", 490, "active"),
    ("Elisa Prado", "Brown", 3400, "inactive"),
    ("Felipe Costa", "Blue", 1320, "suspended"),
];

/// Insert demo users, members, classes, attendance and payments.
///
/// Users are inserted with `ON CONFLICT DO NOTHING`; the rest is skipped
/// when members already exist.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DomainError> {
    let now = chrono::Utc::now().to_rfc3339();

    if member::Entity::find().count(db).await? > 0 {
        tracing::info!("Members already present, skipping demo data");
        return Ok(());
    }

    // 1. Members
    let today = Local::now().date_naive();
    let mut member_ids = Vec::new();
    for (i, (name, belt, xp, status)) in DEMO_MEMBERS.iter().enumerate() {
        let joined = today - Duration::days(90 * (i as i64 + 1));
        let saved = member::ActiveModel {
            full_name: Set(name.to_string()),
            email: Set(Some(format!(
                "{}@dojo.example",
                name.split_whitespace().next().unwrap_or("member").to_lowercase()
            ))),
            belt: Set(belt.to_string()),
            stripes: Set((i % 4) as i32),
            xp: Set(*xp),
            status: Set(status.to_string()),
            enrolled_classes: Set("[]".to_string()),
            join_date: Set(joined.format(DATE_FORMAT).to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        member_ids.push(saved.id);
    }

    // 2. Users: an admin, an instructor and a student tied to the first member
    let demo_users = [
        ("admin", "admin123", "admin", None),
        ("coach", "coach123", "instructor", None),
        ("ana", "student123", "student", member_ids.first().copied()),
    ];
    for (username, password, role, member_id) in demo_users {
        let password_hash = hash_password(password).map_err(DomainError::Internal)?;
        let account = user::ActiveModel {
            username: Set(username.to_owned()),
            password_hash: Set(password_hash),
            role: Set(role.to_owned()),
            member_id: Set(member_id),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };
        user::Entity::insert(account)
            .on_conflict(
                sea_query::OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(db)
            .await?;
    }

    // 3. Classes: yesterday evening and today
    let slots = [
        (-1, "Fundamentals", "adult", 18),
        (0, "Kids Gi", "kids", 17),
        (0, "Competition Training", "competition", 19),
    ];
    let mut class_ids = Vec::new();
    for (offset, title, class_type, hour) in slots {
        let day = today + Duration::days(offset);
        let Some(start) = day.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        let end = start + Duration::hours(1);
        let saved = class_session::ActiveModel {
            title: Set(title.to_string()),
            instructor: Set("Coach".to_string()),
            start_time: Set(start.format(CLASS_TIME_FORMAT).to_string()),
            end_time: Set(end.format(CLASS_TIME_FORMAT).to_string()),
            max_capacity: Set(20),
            enrolled_count: Set(0),
            class_type: Set(class_type.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        class_ids.push(saved.id);
    }

    // 4. Yesterday's roll, through the regular XP path
    if let Some(class_id) = class_ids.first() {
        let roll = member_ids
            .iter()
            .take(4)
            .enumerate()
            .map(|(i, id)| RollInput {
                member_id: *id,
                status: if i == 3 { "absent" } else { "present" }.to_string(),
                on_time: i != 1,
                good_behavior: true,
            })
            .collect();
        attendance_service::save_roll(db, *class_id, roll).await?;
    }

    // 5. Monthly fees: last month paid, this month pending, one overdue
    let last_month = today - Duration::days(30);
    for (i, id) in member_ids.iter().enumerate().take(4) {
        let (due, paid, status) = match i {
            0 | 1 => (last_month, Some(last_month), "paid"),
            2 => (today - Duration::days(10), None, "pending"),
            _ => (today + Duration::days(5), None, "pending"),
        };
        payment::ActiveModel {
            member_id: Set(*id),
            amount: Set(150.0),
            description: Set(Some("Monthly fee".to_string())),
            due_date: Set(due.format(DATE_FORMAT).to_string()),
            paid_date: Set(paid.map(|d| d.format(DATE_FORMAT).to_string())),
            status: Set(status.to_string()),
            method: Set(paid.map(|_| "card".to_string())),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    tracing::info!(
        "Demo data seeded: {} members, {} classes",
        member_ids.len(),
        class_ids.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        seed_demo_data(&db).await.unwrap();
        seed_demo_data(&db).await.unwrap();

        assert_eq!(member::Entity::find().count(&db).await.unwrap(), DEMO_MEMBERS.len() as u64);
        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 3);
        assert_eq!(class_session::Entity::find().count(&db).await.unwrap(), 3);
    }
}
