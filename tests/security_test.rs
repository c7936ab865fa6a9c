use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use sea_orm::DatabaseConnection;
use tower::util::ServiceExt;

use dojo_console::domain::Role;
use dojo_console::infrastructure::AppState;
use dojo_console::services::user_service::{self, CreateUser};
use dojo_console::{api, auth, db};

async fn setup() -> (DatabaseConnection, Router) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let app = api::api_router(AppState::new(db.clone()));
    (db, app)
}

/// Create an account and return `(user id, bearer token)`.
async fn account(
    db: &DatabaseConnection,
    username: &str,
    role: Role,
    member_id: Option<i32>,
) -> (i32, String) {
    let user = user_service::create_user(
        db,
        CreateUser {
            username: username.to_string(),
            password: "password1".to_string(),
            role: Some(role.as_str().to_string()),
            full_name: None,
            member_id,
        },
    )
    .await
    .expect("Failed to create user");
    let token =
        auth::create_jwt(&user.username, user.id, role, member_id).expect("Failed to create token");
    (user.id, token)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method("GET");
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (_, app) = setup().await;
    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (_, app) = setup().await;
    let response = app.oneshot(get("/members", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let (_, app) = setup().await;
    let response = app
        .oneshot(get("/members", Some("not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_without_account_is_unauthorized() {
    let (_, app) = setup().await;
    let token = auth::create_jwt("ghost", 42, Role::Admin, None).unwrap();
    let response = app.oneshot(get("/members", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_student_cannot_reach_finance_or_users() {
    let (db, app) = setup().await;
    let (_, student) = account(&db, "kid", Role::Student, None).await;

    for uri in ["/payments", "/payments/summary", "/users", "/export"] {
        let response = app.clone().oneshot(get(uri, Some(&student))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_instructor_is_staff_but_not_admin() {
    let (db, app) = setup().await;
    let (_, coach) = account(&db, "coach", Role::Instructor, None).await;

    let response = app
        .clone()
        .oneshot(get("/members", Some(&coach)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/payments", Some(&coach))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_demoted_admin_loses_access_with_old_token() {
    let (db, app) = setup().await;
    account(&db, "boss", Role::Admin, None).await;
    let (ex_id, ex_token) = account(&db, "ex", Role::Admin, None).await;

    let response = app
        .clone()
        .oneshot(get("/users", Some(&ex_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    user_service::change_role(&db, ex_id, "student").await.unwrap();

    let response = app
        .clone()
        .oneshot(get("/users", Some(&ex_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(post_json(
            "/users",
            &ex_token,
            r#"{"username":"sneaky","password":"password1","role":"admin"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deleted_account_token_is_rejected() {
    let (db, app) = setup().await;
    let (boss_id, _) = account(&db, "boss", Role::Admin, None).await;
    let (coach_id, coach) = account(&db, "coach", Role::Instructor, None).await;

    user_service::delete_user(&db, coach_id, boss_id).await.unwrap();

    let response = app.oneshot(get("/members", Some(&coach))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_comes_from_account_not_token() {
    let (db, app) = setup().await;
    let (id, _) = account(&db, "kid", Role::Student, None).await;
    let forged = auth::create_jwt("kid", id, Role::Admin, None).unwrap();

    let response = app.oneshot(get("/users", Some(&forged))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_student_reads_only_own_member() {
    let (db, app) = setup().await;
    let (_, admin) = account(&db, "admin", Role::Admin, None).await;

    let response = app
        .clone()
        .oneshot(post_json("/members", &admin, r#"{"full_name":"Own Record"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = json["member"]["id"].as_i64().unwrap() as i32;

    let response = app
        .clone()
        .oneshot(post_json("/members", &admin, r#"{"full_name":"Someone Else"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let (_, own) = account(&db, "own", Role::Student, Some(id)).await;
    let response = app
        .clone()
        .oneshot(get(&format!("/members/{}/progress", id), Some(&own)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, other) = account(&db, "other", Role::Student, Some(id + 1)).await;
    let response = app
        .oneshot(get(&format!("/members/{}/progress", id), Some(&other)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_student_reads_reference_data_but_cannot_edit_it() {
    let (db, app) = setup().await;
    let (_, student) = account(&db, "kid", Role::Student, None).await;

    for uri in ["/leaderboard", "/belts", "/xp/presets", "/xp/settings"] {
        let response = app.clone().oneshot(get(uri, Some(&student))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }

    let response = app
        .clone()
        .oneshot(post_json(
            "/belts",
            &student,
            r##"{"name":"Coral","color":"#FF7F50","min_xp":9000}"##,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(post_json(
            "/xp/presets",
            &student,
            r#"{"label":"Free","amount":500,"reason":"Self-awarded"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
