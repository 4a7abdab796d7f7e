//! Login, logout and token handling

use axum::{body::Body, http::Request, http::StatusCode};
use lms_admin::models::UserRole;
use serde_json::json;

use crate::common::{json_request, test_config, TestApp, TEST_PASSWORD};

async fn login(app: &TestApp, username: &str, password: &str) -> crate::common::TestResponse {
    app.post_json(
        "/api/v1/auth/login",
        json!({ "username": username, "password": password }),
    )
    .await
}

#[tokio::test]
async fn test_login_success_writes_login_log() {
    let app = TestApp::new().await;
    let seeded = app.seed_user("jdoe", UserRole::Teacher).await;

    let response = login(&app, "jdoe", TEST_PASSWORD).await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["token_type"], "Bearer");
    assert!(json["data"]["access_token"].as_str().unwrap().len() > 20);
    assert_eq!(json["data"]["user"]["username"], "jdoe");
    assert!(json["data"]["user"].get("password_hash").is_none());

    let (user_id, success, session_id): (Option<String>, bool, Option<String>) =
        sqlx::query_as("SELECT user_id, success, session_id FROM login_logs")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(user_id, Some(seeded.user.id.to_string()));
    assert!(success);
    assert!(session_id.is_some());

    let user = app.find_user(seeded.user.id).await.unwrap();
    assert!(user.last_login_at.is_some());
}

#[tokio::test]
async fn test_login_accepts_email_case_insensitively() {
    let app = TestApp::new().await;
    app.seed_user("jdoe", UserRole::Student).await;

    login(&app, "JDOE@School.edu", TEST_PASSWORD).await.assert_ok();
}

#[tokio::test]
async fn test_wrong_password_is_logged_as_failure() {
    let app = TestApp::new().await;
    let seeded = app.seed_user("jdoe", UserRole::Student).await;

    let response = login(&app, "jdoe", "WrongPass1").await;
    response.assert_unauthorized();

    let (user_id, success, reason): (Option<String>, bool, Option<String>) =
        sqlx::query_as("SELECT user_id, success, failure_reason FROM login_logs")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(user_id, Some(seeded.user.id.to_string()));
    assert!(!success);
    assert_eq!(reason.as_deref(), Some("invalid_password"));

    let outcome: String = sqlx::query_scalar(
        "SELECT outcome FROM comprehensive_audit_trail WHERE action_type = 'login_failed'",
    )
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(outcome, "Failed");
}

#[tokio::test]
async fn test_unknown_user_is_logged_with_attempted_name() {
    let app = TestApp::new().await;

    login(&app, "ghost", "whatever1").await.assert_unauthorized();

    let (username, user_id, reason): (String, Option<String>, Option<String>) =
        sqlx::query_as("SELECT username, user_id, failure_reason FROM login_logs")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(username, "ghost");
    assert!(user_id.is_none());
    assert_eq!(reason.as_deref(), Some("unknown_user"));
}

#[tokio::test]
async fn test_banned_user_cannot_log_in() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    app.post_auth(&format!("/api/v1/users/{}/ban", student.user.id), &admin.token)
        .await
        .assert_ok();

    login(&app, "pupil", TEST_PASSWORD).await.assert_forbidden();

    let reason: Option<String> =
        sqlx::query_scalar("SELECT failure_reason FROM login_logs WHERE username = 'pupil'")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(reason.as_deref(), Some("account_banned"));
}

#[tokio::test]
async fn test_existing_token_stops_working_after_ban() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    app.get_auth("/api/v1/auth/me", &student.token).await.assert_ok();

    app.post_auth(&format!("/api/v1/users/{}/ban", student.user.id), &admin.token)
        .await
        .assert_ok();

    app.get_auth("/api/v1/auth/me", &student.token)
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn test_login_uses_forwarded_client_ip() {
    let app = TestApp::new().await;
    app.seed_user("jdoe", UserRole::Student).await;

    let mut request = json_request(
        "POST",
        "/api/v1/auth/login",
        json!({ "username": "jdoe", "password": TEST_PASSWORD }),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
    request.headers_mut().insert(
        "user-agent",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36"
            .parse()
            .unwrap(),
    );
    app.request(request).await.assert_ok();

    let (ip, browser): (String, Option<String>) =
        sqlx::query_as("SELECT ip_address, browser FROM login_logs")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(ip, "203.0.113.7");
    assert_eq!(browser.as_deref(), Some("Chrome 115.0"));
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let mut config = test_config();
    config.auth.login_attempts_per_minute = 2;
    let app = TestApp::with_config(config).await;

    login(&app, "ghost", "whatever1").await.assert_unauthorized();
    login(&app, "ghost", "whatever1").await.assert_unauthorized();

    let response = login(&app, "ghost", "whatever1").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header("retry-after"), Some("60"));

    // Rejected attempts never reach the handler
    assert_eq!(app.count_rows("login_logs").await, 2);
}

#[tokio::test]
async fn test_me_and_logout() {
    let app = TestApp::new().await;
    let teacher = app.seed_user("teach", UserRole::Teacher).await;

    let response = app.get_auth("/api/v1/auth/me", &teacher.token).await;
    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["data"]["role"], "teacher");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/logout")
        .body(Body::empty())
        .unwrap();
    app.request_with_auth(request, &teacher.token).await.assert_ok();

    let username: String = sqlx::query_scalar(
        "SELECT username FROM comprehensive_audit_trail WHERE action_type = 'logout'",
    )
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(username, "teach");
}

#[tokio::test]
async fn test_internal_auth_error_is_still_logged() {
    let app = TestApp::new().await;
    let seeded = app.seed_user("legacy", UserRole::Student).await;

    sqlx::query("UPDATE users SET password_hash = 'legacy-md5' WHERE id = ?")
        .bind(seeded.user.id.to_string())
        .execute(&app.state.db)
        .await
        .unwrap();

    login(&app, "legacy", TEST_PASSWORD)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let (username, success, reason): (String, bool, Option<String>) =
        sqlx::query_as("SELECT username, success, failure_reason FROM login_logs")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(username, "legacy");
    assert!(!success);
    assert_eq!(reason.as_deref(), Some("internal_error"));
}
