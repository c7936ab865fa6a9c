use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use sea_orm::DatabaseConnection;
use std::path::PathBuf;

use dojo_console::infrastructure::AppState;
use dojo_console::services::user_service::{self, CreateUser};
use dojo_console::{api, db};

async fn setup_app() -> Router {
    setup_with_uploads(std::env::temp_dir().join("dojo-console-tests")).await.0
}

async fn setup_with_uploads(upload_dir: PathBuf) -> (Router, DatabaseConnection) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let app = api::api_router(AppState::with_upload_dir(db.clone(), upload_dir));
    (app, db)
}

/// App with one admin account, and that admin's token.
async fn admin_app() -> (Router, String) {
    admin_app_with_uploads(std::env::temp_dir().join("dojo-console-tests")).await
}

async fn admin_app_with_uploads(upload_dir: PathBuf) -> (Router, String) {
    let (app, db) = setup_with_uploads(upload_dir).await;
    let session = user_service::register_first_admin(
        &db,
        CreateUser {
            username: "admin".to_string(),
            password: "admin123".to_string(),
            role: None,
            full_name: None,
            member_id: None,
        },
    )
    .await
    .expect("Failed to create admin");
    (app, session.token)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let req = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create_member(app: &Router, token: &str, body: Value) -> i64 {
    let (status, json) = send(app, "POST", "/members", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    json["member"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_unknown_member_is_not_found() {
    let (app, token) = admin_app().await;

    let (status, json) = send(&app, "GET", "/members/999", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_delete_unknown_member_is_idempotent() {
    let (app, token) = admin_app().await;

    let (status, _) = send(&app, "DELETE", "/members/999", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_member_validation_errors() {
    let (app, token) = admin_app().await;

    let (status, json) = send(
        &app,
        "POST",
        "/members",
        Some(&token),
        Some(json!({ "full_name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = send(
        &app,
        "POST",
        "/members",
        Some(&token),
        Some(json!({ "full_name": "Bad Status", "status": "retired" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Malformed JSON is rejected by the extractor
    let req = Request::builder()
        .uri("/members")
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("invalid json"))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_progress_flow() {
    let (app, token) = admin_app().await;

    let id = create_member(
        &app,
        &token,
        json!({ "full_name": "Progress Member", "belt": "Blue", "xp": 600 }),
    )
    .await;

    let (status, json) = send(
        &app,
        "GET",
        &format!("/members/{}/progress", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let progress = &json["progress"]["progress"];
    assert_eq!(progress["current"]["name"], "Blue");
    assert_eq!(progress["next"]["name"], "Purple");
    assert_eq!(progress["xp_to_next"], 900);
    assert!((progress["percent"].as_f64().unwrap() - 10.0).abs() < f64::EPSILON);
    assert_eq!(json["progress"]["eligibility"]["eligible"], false);

    // Manual XP pushes past the Purple threshold
    let (status, _) = send(
        &app,
        "POST",
        &format!("/members/{}/xp", id),
        Some(&token),
        Some(json!({ "amount": 1000, "reason": "Tournament gold" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        "POST",
        &format!("/members/{}/promote", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["promotion"]["from_belt"], "Blue");
    assert_eq!(json["promotion"]["to_belt"], "Purple");
    assert_eq!(json["promotion"]["member"]["stripes"], 0);
}

#[tokio::test]
async fn test_attendance_roll_awards_xp_once() {
    let (app, token) = admin_app().await;

    let member_id = create_member(&app, &token, json!({ "full_name": "Roll Member" })).await;

    let day = chrono::Local::now().format("%Y-%m-%d").to_string();
    let (status, json) = send(
        &app,
        "POST",
        "/classes",
        Some(&token),
        Some(json!({
            "title": "Fundamentals",
            "instructor": "Coach",
            "start_time": format!("{}T18:00", day),
            "end_time": format!("{}T19:00", day),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let class_id = json["class"]["id"].as_i64().unwrap();

    let roll = json!([
        { "member_id": member_id, "status": "present", "on_time": true, "good_behavior": true }
    ]);
    let uri = format!("/classes/{}/attendance", class_id);

    let (status, json) = send(&app, "PUT", &uri, Some(&token), Some(roll.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["present"], 1);
    assert_eq!(json["summary"]["xp_awarded"], 20);

    // Saving the same roll again does not pay twice
    let (status, json) = send(&app, "PUT", &uri, Some(&token), Some(roll)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["xp_awarded"], 0);

    let (_, json) = send(
        &app,
        "GET",
        &format!("/members/{}", member_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(json["member"]["xp"], 20);

    let (status, json) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["attendance"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_attendance_rejects_unknown_status() {
    let (app, token) = admin_app().await;

    let (status, _) = send(
        &app,
        "PUT",
        "/classes/1/attendance",
        Some(&token),
        Some(json!([{ "member_id": 1, "status": "sleeping" }])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payments_overdue_and_csv_export() {
    let (app, token) = admin_app().await;

    let member_id = create_member(&app, &token, json!({ "full_name": "Late Payer" })).await;

    let (status, json) = send(
        &app,
        "POST",
        "/payments",
        Some(&token),
        Some(json!({
            "member_id": member_id,
            "amount": 150.0,
            "description": "Monthly fee",
            "due_date": "2000-01-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_id = json["payment"]["id"].as_i64().unwrap();
    assert_eq!(json["payment"]["state"], "overdue");

    // Overdue cannot be stored directly
    let (status, _) = send(
        &app,
        "POST",
        "/payments",
        Some(&token),
        Some(json!({ "member_id": member_id, "amount": 10.0, "status": "overdue" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "GET",
        "/payments?status=overdue",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["payments"][0]["member_name"], "Late Payer");

    let req = Request::builder()
        .uri("/payments/export")
        .method("GET")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("id,member_id,member_name"));
    assert!(csv.contains("Late Payer"));
    assert!(csv.contains("overdue"));

    let (status, json) = send(
        &app,
        "POST",
        &format!("/payments/{}/pay", payment_id),
        Some(&token),
        Some(json!({ "method": "pix" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment"]["state"], "paid");
    assert_eq!(json["payment"]["method"], "pix");
}

#[tokio::test]
async fn test_register_then_login() {
    let app = setup_app().await;

    let (status, json) = send(&app, "GET", "/auth/setup", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["needs_setup"], true);

    let credentials = json!({ "username": "sensei", "password": "black-belt" });
    let (status, json) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(credentials.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["role"], "admin");
    assert!(json["user"].get("password_hash").is_none());

    // Registration closes after the first account
    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "intruder", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "sensei", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(&app, "POST", "/auth/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    let token = json["token"].as_str().unwrap().to_string();

    let (status, json) = send(&app, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["username"], "sensei");
    assert_eq!(json["role"], "admin");
}

fn multipart_request(uri: &str, token: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "dojo-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"avatar\"\r\nContent-Type: {ct}\r\n\r\n",
            b = boundary,
            ct = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_avatar_upload_replaces_file() {
    let upload_dir = std::env::temp_dir().join(format!("dojo-avatars-{}", uuid::Uuid::new_v4()));
    let (app, token) = admin_app_with_uploads(upload_dir.clone()).await;
    let member_id = create_member(&app, &token, json!({ "full_name": "Photo Member" })).await;
    let uri = format!("/members/{}/avatar", member_id);

    let response = app
        .clone()
        .oneshot(multipart_request(&uri, &token, "image/png", b"\x89PNG first"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    let first_url = json["member"]["avatar_url"].as_str().unwrap().to_string();
    assert!(first_url.starts_with("/uploads/avatars/"));
    assert!(first_url.ends_with(".png"));
    let first_path = upload_dir
        .join("avatars")
        .join(first_url.trim_start_matches("/uploads/avatars/"));
    assert!(first_path.exists());

    // A second upload swaps the file and removes the old one
    let response = app
        .clone()
        .oneshot(multipart_request(&uri, &token, "image/jpeg", b"\xFF\xD8 second"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!first_path.exists());

    // Non-image content is refused
    let response = app
        .clone()
        .oneshot(multipart_request(&uri, &token, "text/plain", b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(multipart_request("/members/999/avatar", &token, "image/png", b"\x89PNG"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(&upload_dir);
}
