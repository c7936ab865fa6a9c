use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS members (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        full_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        birth_date TEXT,
        belt TEXT NOT NULL DEFAULT '',
        stripes INTEGER NOT NULL DEFAULT 0,
        xp INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        enrolled_classes TEXT NOT NULL DEFAULT '[]',
        avatar_url TEXT,
        notes TEXT,
        join_date TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_members_status ON members(status)",
    r#"
    CREATE TABLE IF NOT EXISTS class_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        instructor TEXT NOT NULL DEFAULT '',
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        max_capacity INTEGER NOT NULL DEFAULT 20,
        enrolled_count INTEGER NOT NULL DEFAULT 0,
        class_type TEXT NOT NULL DEFAULT 'adult',
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_class_sessions_start ON class_sessions(start_time)",
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        class_id INTEGER NOT NULL,
        member_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'present',
        on_time BOOLEAN NOT NULL DEFAULT 1,
        good_behavior BOOLEAN NOT NULL DEFAULT 1,
        checked_in_at TEXT NOT NULL,
        UNIQUE (class_id, member_id),
        FOREIGN KEY (class_id) REFERENCES class_sessions(id) ON DELETE CASCADE,
        FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attendance_member ON attendance(member_id)",
    r#"
    CREATE TABLE IF NOT EXISTS xp_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL,
        amount INTEGER NOT NULL,
        reason TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_xp_logs_member_reason ON xp_logs(member_id, reason)",
    r#"
    CREATE TABLE IF NOT EXISTS xp_presets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        label TEXT NOT NULL,
        amount INTEGER NOT NULL,
        reason TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS xp_settings (
        id INTEGER PRIMARY KEY,
        attendance_xp INTEGER NOT NULL DEFAULT 10,
        on_time_bonus INTEGER NOT NULL DEFAULT 5,
        good_behavior_bonus INTEGER NOT NULL DEFAULT 5,
        max_stripes INTEGER NOT NULL DEFAULT 4,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS belts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        color TEXT NOT NULL,
        secondary_color TEXT,
        min_xp INTEGER NOT NULL DEFAULT 0,
        order_index INTEGER NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS badges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        category TEXT NOT NULL DEFAULT 'general',
        level INTEGER NOT NULL DEFAULT 1,
        xp_reward INTEGER NOT NULL DEFAULT 0,
        criteria TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS member_badges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL,
        badge_id INTEGER NOT NULL,
        awarded_at TEXT NOT NULL,
        UNIQUE (member_id, badge_id),
        FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE,
        FOREIGN KEY (badge_id) REFERENCES badges(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS techniques (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        belt_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        category TEXT,
        description TEXT,
        order_index INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (belt_id) REFERENCES belts(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_techniques_belt ON techniques(belt_id)",
    r#"
    CREATE TABLE IF NOT EXISTS member_techniques (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL,
        technique_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'not_seen',
        updated_at TEXT NOT NULL,
        UNIQUE (member_id, technique_id),
        FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE,
        FOREIGN KEY (technique_id) REFERENCES techniques(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS evaluations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL,
        eval_type TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'scheduled',
        score INTEGER,
        belt_snapshot TEXT NOT NULL DEFAULT '',
        notes TEXT,
        evaluated_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL,
        amount REAL NOT NULL,
        description TEXT,
        due_date TEXT NOT NULL,
        paid_date TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        method TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_payments_member ON payments(member_id)",
    "CREATE INDEX IF NOT EXISTS idx_payments_due ON payments(due_date)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'student',
        full_name TEXT,
        member_id INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE SET NULL
    )
    "#,
];

// Default ladder and XP rules, only inserted when missing
const DEFAULTS: &[&str] = &[
    r#"
    INSERT OR IGNORE INTO xp_settings (id, attendance_xp, on_time_bonus, good_behavior_bonus, max_stripes, updated_at)
    VALUES (1, 10, 5, 5, 4, datetime('now'))
    "#,
    // The ladder is editable, so it is only seeded into an empty table
    r#"
    INSERT INTO belts (name, color, secondary_color, min_xp, order_index, created_at, updated_at)
    SELECT name, color, secondary_color, min_xp, order_index, datetime('now'), datetime('now') FROM (
        SELECT 'White' AS name, '#FFFFFF' AS color, NULL AS secondary_color, 0 AS min_xp, 0 AS order_index
        UNION ALL SELECT 'Blue', '#1E40AF', NULL, 500, 1
        UNION ALL SELECT 'Purple', '#6B21A8', NULL, 1500, 2
        UNION ALL SELECT 'Brown', '#78350F', NULL, 3000, 3
        UNION ALL SELECT 'Black', '#000000', '#DC2626', 5000, 4
    )
    WHERE NOT EXISTS (SELECT 1 FROM belts)
    "#,
];

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in SCHEMA {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    for sql in DEFAULTS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    // Presets have no natural key, seed only into an empty table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        INSERT INTO xp_presets (label, amount, reason, created_at)
        SELECT label, amount, reason, datetime('now') FROM (
            SELECT 'Competition' AS label, 100 AS amount, 'Competition participation' AS reason
            UNION ALL SELECT 'Podium', 200, 'Competition podium'
            UNION ALL SELECT 'Helping', 20, 'Helped a teammate'
            UNION ALL SELECT 'Seminar', 50, 'Seminar attendance'
        )
        WHERE NOT EXISTS (SELECT 1 FROM xp_presets)
        "#
        .to_owned(),
    ))
    .await?;

    tracing::debug!("Database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{belt, xp_preset, xp_settings};
    use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter};

    #[tokio::test]
    async fn test_migrations_are_idempotent_and_seed_defaults() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        run_migrations(&db).await.expect("Second run should succeed");

        let belts = belt::Entity::find().count(&db).await.unwrap();
        assert_eq!(belts, 5);

        let presets = xp_preset::Entity::find().count(&db).await.unwrap();
        assert_eq!(presets, 4);

        let settings = xp_settings::Entity::find_by_id(1)
            .one(&db)
            .await
            .unwrap()
            .expect("settings row");
        assert_eq!(settings.max_stripes, 4);
    }

    #[tokio::test]
    async fn test_edited_ladder_survives_restart() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let purple = belt::Entity::find()
            .filter(belt::Column::Name.eq("Purple"))
            .one(&db)
            .await
            .unwrap()
            .expect("seeded belt");
        purple.delete(&db).await.unwrap();

        run_migrations(&db).await.expect("Restart should succeed");

        assert_eq!(belt::Entity::find().count(&db).await.unwrap(), 4);
        let purple = belt::Entity::find()
            .filter(belt::Column::Name.eq("Purple"))
            .one(&db)
            .await
            .unwrap();
        assert!(purple.is_none());
    }
}
