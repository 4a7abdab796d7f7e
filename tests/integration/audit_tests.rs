//! Audit trail, export, retention and activity tracking

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use lms_admin::models::UserRole;
use serde_json::json;

use crate::common::TestApp;

async fn ban(app: &TestApp, token: &str, id: uuid::Uuid) {
    app.post_auth(&format!("/api/v1/users/{}/ban", id), token)
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_lifecycle_actions_appear_in_audit_log() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    ban(&app, &admin.token, student.user.id).await;

    let response = app
        .get_auth("/api/v1/audit-logs?action_type=user_ban", &admin.token)
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["username"], "root");
    assert_eq!(entries[0]["user_role"], "admin");
    assert_eq!(entries[0]["resource_id"], student.user.id.to_string());
    assert_eq!(entries[0]["outcome"], "Success");
}

#[tokio::test]
async fn test_admin_action_falls_back_when_primary_table_missing() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    sqlx::query("DROP TABLE comprehensive_audit_trail")
        .execute(&app.state.db)
        .await
        .unwrap();

    // The ban itself must not notice the missing table
    ban(&app, &admin.token, student.user.id).await;

    let (admin_username, action, target_id): (String, String, Option<String>) =
        sqlx::query_as("SELECT admin_username, action, target_id FROM admin_audit_log")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(admin_username, "root");
    assert_eq!(action, "user_ban");
    assert_eq!(target_id, Some(student.user.id.to_string()));
}

#[tokio::test]
async fn test_user_action_falls_back_to_audit_trail() {
    let app = TestApp::new().await;
    let teacher = app.seed_user("teach", UserRole::Teacher).await;

    sqlx::query("DROP TABLE comprehensive_audit_trail")
        .execute(&app.state.db)
        .await
        .unwrap();

    app.post_json_auth(
        "/api/v1/monitoring/broken-links",
        &teacher.token,
        json!({ "url": "https://lms.school.edu/dead" }),
    )
    .await
    .assert_created();

    assert_eq!(app.count_rows("admin_audit_log").await, 0);
    let action: String = sqlx::query_scalar("SELECT action FROM audit_trail")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(action, "broken_link_report");
}

#[tokio::test]
async fn test_teacher_sees_only_own_actions() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let teacher = app.seed_user("teach", UserRole::Teacher).await;
    let banned = app.seed_user("pupil", UserRole::Student).await;
    let student = app.seed_user("reader", UserRole::Student).await;

    ban(&app, &admin.token, banned.user.id).await;
    app.post_json_auth(
        "/api/v1/monitoring/broken-links",
        &teacher.token,
        json!({ "url": "https://lms.school.edu/dead" }),
    )
    .await
    .assert_created();

    // Asking for someone else's actions is silently narrowed
    let uri = format!("/api/v1/audit-logs?user_id={}", admin.user.id);
    let response = app.get_auth(&uri, &teacher.token).await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["username"], "teach");

    app.get_auth("/api/v1/audit-logs", &student.token)
        .await
        .assert_forbidden();
    app.get_auth("/api/v1/audit-logs", &banned.token)
        .await
        .assert_unauthorized();
    app.get_auth("/api/v1/audit-logs/export", &teacher.token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_csv_export() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    app.post_json_auth(
        &format!("/api/v1/users/{}/ban", student.user.id),
        &admin.token,
        json!({ "reason": "Spam, repeatedly" }),
    )
    .await
    .assert_ok();

    let response = app
        .get_auth("/api/v1/audit-logs/export", &admin.token)
        .await;
    response.assert_ok();

    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/csv"));
    let disposition = response.header("content-disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\"audit-log-"));
    assert!(disposition.ends_with(".csv\""));

    let body = response.text();
    let mut lines = body.lines();
    assert!(lines.next().unwrap().starts_with("id,created_at,username,"));
    let row = lines.next().unwrap();
    assert!(row.contains(",root,admin,user_ban,"));
    assert!(row.contains(&student.user.id.to_string()));

    // The export is itself audited
    let exports: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM comprehensive_audit_trail WHERE action_type = 'audit_export'",
    )
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(exports, 1);
}

#[tokio::test]
async fn test_login_log_listing() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;

    app.post_json(
        "/api/v1/auth/login",
        json!({ "username": "ghost", "password": "nope12345" }),
    )
    .await
    .assert_unauthorized();

    let response = app
        .get_auth("/api/v1/audit-logs/logins?success=false", &admin.token)
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["username"], "ghost");
    assert_eq!(entries[0]["failure_reason"], "unknown_user");
}

#[tokio::test]
async fn test_cleanup_removes_expired_rows_only() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;

    let old = (Utc::now() - Duration::days(120)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    sqlx::query(
        "INSERT INTO login_logs (id, created_at, username, success, ip_address) VALUES (?, ?, 'old', 0, '198.51.100.1')",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&old)
    .execute(&app.state.db)
    .await
    .unwrap();

    app.post_json(
        "/api/v1/auth/login",
        json!({ "username": "recent", "password": "nope12345" }),
    )
    .await
    .assert_unauthorized();
    assert_eq!(app.count_rows("login_logs").await, 2);

    let response = app
        .post_json_auth(
            "/api/v1/audit-logs/cleanup",
            &admin.token,
            json!({ "retention_days": 90 }),
        )
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["data"]["retention_days"], 90);

    let remaining: String = sqlx::query_scalar("SELECT username FROM login_logs")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, "recent");
}

#[tokio::test]
async fn test_cleanup_rejects_zero_retention() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;

    app.post_json_auth(
        "/api/v1/audit-logs/cleanup",
        &admin.token,
        json!({ "retention_days": 0 }),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activity_tracking_roundtrip() {
    let app = TestApp::new().await;
    let student = app.seed_user("pupil", UserRole::Student).await;
    let other = app.seed_user("other", UserRole::Student).await;

    app.post_json_auth(
        "/api/v1/activity/page-view",
        &student.token,
        json!({ "page_url": "/courses/42/lessons/3", "duration_seconds": 95 }),
    )
    .await
    .assert_ok();
    app.post_json_auth(
        "/api/v1/activity/resource-access",
        &student.token,
        json!({ "resource_type": "quiz", "resource_id": "q-17" }),
    )
    .await
    .assert_ok();
    app.post_json_auth(
        "/api/v1/activity/page-view",
        &other.token,
        json!({ "page_url": "/dashboard" }),
    )
    .await
    .assert_ok();

    let response = app.get_auth("/api/v1/activity/me", &student.token).await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["username"] == "pupil"));

    let page_view = entries
        .iter()
        .find(|e| e["activity_type"] == "page_view")
        .unwrap();
    assert_eq!(page_view["page_url"], "/courses/42/lessons/3");
    assert_eq!(page_view["duration_seconds"], 95);

    let access = entries
        .iter()
        .find(|e| e["activity_type"] == "resource_access")
        .unwrap();
    assert_eq!(access["resource_type"], "quiz");
    assert_eq!(access["resource_id"], "q-17");
}
