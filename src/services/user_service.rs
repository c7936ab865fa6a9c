//! User Service - accounts, login and roles

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::auth::{create_jwt, hash_password, verify_password};
use crate::domain::{DomainError, Role};
use crate::models::member::Entity as Member;
use crate::models::user::{self, Entity as User};

use super::{require_text, validation};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: user::Model,
}

fn issue(user: user::Model) -> Result<Session, DomainError> {
    let role: Role = user.role.parse().unwrap_or(Role::Student);
    let token = create_jwt(&user.username, user.id, role, user.member_id)
        .map_err(DomainError::Internal)?;
    Ok(Session { token, user })
}

/// Exchange credentials for a token. Unknown users and wrong passwords give
/// the same answer.
pub async fn login(db: &DatabaseConnection, req: LoginRequest) -> Result<Session, DomainError> {
    tracing::info!("Login attempt for user: {}", req.username);

    let denied = || DomainError::Unauthorized("Invalid credentials".to_string());
    let Some(user) = User::find()
        .filter(user::Column::Username.eq(req.username.trim()))
        .one(db)
        .await?
    else {
        tracing::warn!("User not found: {}", req.username);
        return Err(denied());
    };

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {
            tracing::info!("Password verified for user: {}", user.username);
            issue(user)
        }
        _ => {
            tracing::warn!("Password verification failed for user: {}", user.username);
            Err(denied())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub member_id: Option<i32>,
}

async fn insert_user<C: ConnectionTrait>(
    conn: &C,
    input: CreateUser,
    role: Role,
) -> Result<user::Model, DomainError> {
    require_text("username", &input.username)?;
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let username = input.username.trim().to_string();

    let taken = User::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .count(conn)
        .await?;
    if taken > 0 {
        return Err(DomainError::Conflict(format!(
            "username '{}' is already taken",
            username
        )));
    }
    if let Some(member_id) = input.member_id {
        Member::find_by_id(member_id)
            .one(conn)
            .await?
            .ok_or_else(|| DomainError::not_found("Member"))?;
    }

    let password_hash = hash_password(&input.password).map_err(DomainError::Internal)?;
    let now = chrono::Utc::now().to_rfc3339();
    let saved = user::ActiveModel {
        username: Set(username),
        password_hash: Set(password_hash),
        role: Set(role.as_str().to_string()),
        full_name: Set(input.full_name),
        member_id: Set(input.member_id),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    tracing::info!("User {} created with role {}", saved.username, saved.role);
    Ok(saved)
}

/// Create the first account as admin. Refused once any user exists.
pub async fn register_first_admin(
    db: &DatabaseConnection,
    input: CreateUser,
) -> Result<Session, DomainError> {
    let txn = db.begin().await?;
    if User::find().count(&txn).await? > 0 {
        return Err(DomainError::Forbidden(
            "Registration is closed; ask an admin for an account".to_string(),
        ));
    }
    let user = insert_user(&txn, input, Role::Admin).await?;
    txn.commit().await?;
    issue(user)
}

pub async fn needs_setup(db: &DatabaseConnection) -> Result<bool, DomainError> {
    Ok(User::find().count(db).await? == 0)
}

pub async fn get_user(db: &DatabaseConnection, id: i32) -> Result<user::Model, DomainError> {
    User::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("User"))
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<user::Model>, DomainError> {
    Ok(User::find()
        .order_by_asc(user::Column::Username)
        .all(db)
        .await?)
}

pub async fn create_user(db: &DatabaseConnection, input: CreateUser) -> Result<user::Model, DomainError> {
    let role = match &input.role {
        Some(r) => validation::<Role>("role", r)?,
        None => Role::Student,
    };
    insert_user(db, input, role).await
}

/// Change a user's role. The last admin cannot be demoted.
pub async fn change_role(
    db: &DatabaseConnection,
    id: i32,
    role: &str,
) -> Result<user::Model, DomainError> {
    let role: Role = validation("role", role)?;
    let existing = get_user(db, id).await?;

    if existing.role == Role::Admin.as_str() && role != Role::Admin {
        let admins = User::find()
            .filter(user::Column::Role.eq(Role::Admin.as_str()))
            .count(db)
            .await?;
        if admins <= 1 {
            return Err(DomainError::Conflict(
                "cannot demote the last admin".to_string(),
            ));
        }
    }

    let mut active: user::ActiveModel = existing.into();
    active.role = Set(role.as_str().to_string());
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    let saved = active.update(db).await?;
    tracing::info!("User {} is now {}", saved.username, saved.role);
    Ok(saved)
}

/// Delete a user other than the caller.
pub async fn delete_user(db: &DatabaseConnection, id: i32, caller_uid: i32) -> Result<(), DomainError> {
    if id == caller_uid {
        return Err(DomainError::Conflict(
            "you cannot delete your own account".to_string(),
        ));
    }
    User::delete_by_id(id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn new_user(username: &str, role: Option<&str>) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            password: "oss-oss-oss".to_string(),
            role: role.map(str::to_string),
            full_name: None,
            member_id: None,
        }
    }

    #[tokio::test]
    async fn test_first_admin_then_registration_closes() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        assert!(needs_setup(&db).await.unwrap());

        let session = register_first_admin(&db, new_user("sensei", None)).await.unwrap();
        assert_eq!(session.user.role, "admin");
        assert!(!session.token.is_empty());

        assert!(matches!(
            register_first_admin(&db, new_user("intruder", None)).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(!needs_setup(&db).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        create_user(&db, new_user("coach", Some("instructor"))).await.unwrap();

        let session = login(
            &db,
            LoginRequest {
                username: "coach".to_string(),
                password: "oss-oss-oss".to_string(),
            },
        )
        .await
        .unwrap();
        let claims = crate::auth::decode_jwt(&session.token).unwrap();
        assert_eq!(claims.role(), Role::Instructor);
        assert_eq!(claims.uid, session.user.id);

        let wrong = login(
            &db,
            LoginRequest {
                username: "coach".to_string(),
                password: "wrong".to_string(),
            },
        )
        .await;
        assert!(matches!(wrong, Err(DomainError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_role_changes_and_deletion_rules() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let admin = create_user(&db, new_user("admin", Some("admin"))).await.unwrap();
        let coach = create_user(&db, new_user("coach", Some("instructor"))).await.unwrap();

        assert!(matches!(
            create_user(&db, new_user("coach", None)).await,
            Err(DomainError::Conflict(_))
        ));
        assert!(create_user(&db, new_user("gm", Some("grandmaster"))).await.is_err());

        assert!(matches!(
            change_role(&db, admin.id, "student").await,
            Err(DomainError::Conflict(_))
        ));
        let promoted = change_role(&db, coach.id, "admin").await.unwrap();
        assert_eq!(promoted.role, "admin");
        assert!(change_role(&db, admin.id, "instructor").await.is_ok());

        assert!(matches!(
            delete_user(&db, coach.id, coach.id).await,
            Err(DomainError::Conflict(_))
        ));
        delete_user(&db, admin.id, coach.id).await.unwrap();
        assert_eq!(list_users(&db).await.unwrap().len(), 1);
    }
}
