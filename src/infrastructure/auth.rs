use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::env;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Json},
    http::{StatusCode, request::Parts},
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;

use crate::domain::{DomainError, Role};
use crate::models::user;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub uid: i32,
    pub role: String,
    pub member_id: Option<i32>,
    pub exp: usize,
}

impl Claims {
    /// Unknown role strings are treated as the least privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Student)
    }

    pub fn require(&self, allowed: &[Role]) -> Result<(), DomainError> {
        let role = self.role();
        if allowed.contains(&role) {
            Ok(())
        } else {
            tracing::warn!("Role {} denied for user {}", role, self.sub);
            Err(DomainError::Forbidden(format!(
                "role '{}' may not perform this action",
                role
            )))
        }
    }

    pub fn require_staff(&self) -> Result<(), DomainError> {
        self.require(&[Role::Admin, Role::Instructor])
    }

    pub fn require_admin(&self) -> Result<(), DomainError> {
        self.require(&[Role::Admin])
    }

    /// Staff may read any member; students only the member linked to their account.
    pub fn require_member_access(&self, member_id: i32) -> Result<(), DomainError> {
        if self.role().is_staff() || self.member_id == Some(member_id) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "students may only view their own record".to_string(),
            ))
        }
    }
}

fn unauthorized(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message })))
}

/// Decodes the bearer token, then reloads the account so role changes and
/// deletions apply to tokens that were already issued.
#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    DatabaseConnection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let Some(token) = auth_header.strip_prefix("Bearer ") else {
            return Err(unauthorized("Invalid Authorization header format"));
        };

        let claims = decode_jwt(token).map_err(|_| unauthorized("Invalid or expired token"))?;

        let db = DatabaseConnection::from_ref(state);
        let account = user::Entity::find_by_id(claims.uid)
            .one(&db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load user {}: {}", claims.uid, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
            })?;

        match account {
            Some(account) => Ok(Claims {
                sub: account.username,
                role: account.role,
                member_id: account.member_id,
                ..claims
            }),
            None => {
                tracing::warn!("Token for removed user {} rejected", claims.uid);
                Err(unauthorized("Account no longer exists"))
            }
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| e.to_string())?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn get_jwt_secret() -> Result<String, String> {
    match env::var("JWT_SECRET") {
        Ok(secret) => Ok(secret),
        Err(_) if cfg!(debug_assertions) => Ok("secret".to_string()),
        Err(_) => Err("JWT_SECRET environment variable must be set in production".to_string()),
    }
}

pub fn create_jwt(
    username: &str,
    uid: i32,
    role: Role,
    member_id: Option<i32>,
) -> Result<String, String> {
    let secret = get_jwt_secret()?;
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| "token expiry overflow".to_string())?
        .timestamp();

    let claims = Claims {
        sub: username.to_owned(),
        uid,
        role: role.as_str().to_owned(),
        member_id,
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

pub fn decode_jwt(token: &str) -> Result<Claims, String> {
    let secret = get_jwt_secret()?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("kimono").unwrap();
        assert!(verify_password("kimono", &hash).unwrap());
        assert!(!verify_password("gi", &hash).unwrap());
        assert!(verify_password("kimono", "not-a-hash").is_err());
    }

    #[test]
    fn test_jwt_carries_role_and_member() {
        let token = create_jwt("sensei", 7, Role::Instructor, Some(3)).unwrap();
        let claims = decode_jwt(&token).unwrap();
        assert_eq!(claims.sub, "sensei");
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.role(), Role::Instructor);
        assert_eq!(claims.member_id, Some(3));
        assert!(decode_jwt("garbage").is_err());
    }

    #[test]
    fn test_role_gating() {
        let student = Claims {
            sub: "kid".into(),
            uid: 2,
            role: "student".into(),
            member_id: Some(10),
            exp: 0,
        };
        assert!(student.require_staff().is_err());
        assert!(student.require_member_access(10).is_ok());
        assert!(student.require_member_access(11).is_err());

        let unknown = Claims {
            role: "owner".into(),
            ..student.clone()
        };
        assert_eq!(unknown.role(), Role::Student);
    }
}
