//! Account lifecycle through the users API

use axum::http::StatusCode;
use lms_admin::models::{UserRole, UserStatus};
use rstest::rstest;
use serde_json::json;

use crate::common::TestApp;

fn user_uri(id: uuid::Uuid, suffix: &str) -> String {
    format!("/api/v1/users/{}{}", id, suffix)
}

#[tokio::test]
async fn test_create_user_sends_welcome_email() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;

    let response = app
        .post_json_auth(
            "/api/v1/users",
            &admin.token,
            json!({
                "username": "new.student",
                "email": "New.Student@School.edu",
                "full_name": "New Student",
                "password": "Welcome2024",
                "role": "student"
            }),
        )
        .await;
    response.assert_created();

    let json: serde_json::Value = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["email_sent"], true);
    assert_eq!(json["data"]["email"], "new.student@school.edu");
    assert_eq!(json["data"]["status"], "active");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_address, "new.student@school.edu");
    assert!(sent[0].subject.contains("created"));

    let action: String = sqlx::query_scalar(
        "SELECT action_type FROM comprehensive_audit_trail WHERE resource_name = 'new.student'",
    )
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(action, "user_create");
}

#[tokio::test]
async fn test_create_duplicate_user_conflicts() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    app.seed_user("taken", UserRole::Student).await;

    let response = app
        .post_json_auth(
            "/api/v1/users",
            &admin.token,
            json!({
                "username": "taken",
                "email": "other@school.edu",
                "full_name": "Someone Else",
                "password": "Welcome2024",
                "role": "student"
            }),
        )
        .await;
    response.assert_conflict();

    let outcome: String = sqlx::query_scalar(
        "SELECT outcome FROM comprehensive_audit_trail WHERE action_type = 'user_create'",
    )
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(outcome, "Failed");
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_create_user_rejects_weak_password() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;

    let response = app
        .post_json_auth(
            "/api/v1/users",
            &admin.token,
            json!({
                "username": "weak",
                "email": "weak@school.edu",
                "full_name": "Weak Password",
                "password": "short",
                "role": "student"
            }),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.count_rows("users").await, 1);
}

#[rstest]
#[case::teacher(UserRole::Teacher)]
#[case::student(UserRole::Student)]
#[case::hybrid(UserRole::Hybrid)]
#[tokio::test]
async fn test_non_admin_cannot_manage_users(#[case] role: UserRole) {
    let app = TestApp::new().await;
    let caller = app.seed_user("caller", role).await;
    let target = app.seed_user("target", UserRole::Student).await;

    app.get_auth("/api/v1/users", &caller.token)
        .await
        .assert_forbidden();
    app.post_auth(&user_uri(target.user.id, "/ban"), &caller.token)
        .await
        .assert_forbidden();
    app.delete_auth(&user_uri(target.user.id, ""), &caller.token)
        .await
        .assert_forbidden();

    let target = app.find_user(target.user.id).await.unwrap();
    assert_eq!(target.status, UserStatus::Active);
}

#[tokio::test]
async fn test_ban_with_reason_then_unban() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    let response = app
        .post_json_auth(
            &user_uri(student.user.id, "/ban"),
            &admin.token,
            json!({ "reason": "Repeated plagiarism" }),
        )
        .await;
    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["data"]["status"], "banned");
    assert_eq!(json["data"]["ban_reason"], "Repeated plagiarism");
    assert_eq!(json["email_sent"], true);

    let banned = app.find_user(student.user.id).await.unwrap();
    assert_eq!(banned.status, UserStatus::Banned);
    assert!(banned.banned_at.is_some());

    let response = app
        .post_auth(&user_uri(student.user.id, "/unban"), &admin.token)
        .await;
    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["data"]["status"], "active");
    assert!(json["data"]["ban_reason"].is_null());

    let subjects: Vec<String> = app.mailer.sent().into_iter().map(|e| e.subject).collect();
    assert_eq!(subjects.len(), 2);
    assert!(subjects[0].contains("suspended"));
    assert!(subjects[1].contains("reinstated"));
}

#[tokio::test]
async fn test_unban_succeeds_when_email_fails() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    app.post_auth(&user_uri(student.user.id, "/ban"), &admin.token)
        .await
        .assert_ok();

    app.mailer.fail_sends(true);
    let response = app
        .post_auth(&user_uri(student.user.id, "/unban"), &admin.token)
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["email_sent"], false);
    assert_eq!(json["data"]["status"], "active");

    let user = app.find_user(student.user.id).await.unwrap();
    assert_eq!(user.status, UserStatus::Active);
}

#[tokio::test]
async fn test_unban_active_user_conflicts() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    app.post_auth(&user_uri(student.user.id, "/unban"), &admin.token)
        .await
        .assert_conflict();
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_admin_cannot_ban_self() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    app.seed_user("second", UserRole::Admin).await;

    app.post_auth(&user_uri(admin.user.id, "/ban"), &admin.token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_soft_delete_and_restore() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let teacher = app.seed_user("teach", UserRole::Teacher).await;

    let response = app
        .delete_auth(&user_uri(teacher.user.id, ""), &admin.token)
        .await;
    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["data"]["status"], "deleted");

    let deleted = app.find_user(teacher.user.id).await.unwrap();
    assert!(deleted.deleted_at.is_some());

    app.post_auth(&user_uri(teacher.user.id, "/ban"), &admin.token)
        .await
        .assert_conflict();

    let response = app
        .post_auth(&user_uri(teacher.user.id, "/restore"), &admin.token)
        .await;
    response.assert_ok();

    let restored = app.find_user(teacher.user.id).await.unwrap();
    assert_eq!(restored.status, UserStatus::Active);
    assert!(restored.deleted_at.is_none());
}

#[tokio::test]
async fn test_restore_requires_deleted_user() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    app.post_auth(&user_uri(student.user.id, "/restore"), &admin.token)
        .await
        .assert_conflict();
}

#[tokio::test]
async fn test_permanent_delete_removes_user_and_activity() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    app.post_json_auth(
        "/api/v1/activity/page-view",
        &student.token,
        json!({ "page_url": "/courses/1" }),
    )
    .await
    .assert_ok();
    assert_eq!(app.count_rows("user_activity_log").await, 1);

    let response = app
        .delete_auth(&user_uri(student.user.id, "/permanent"), &admin.token)
        .await;
    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["data"]["username"], "pupil");

    assert!(app.find_user(student.user.id).await.is_none());
    assert_eq!(app.count_rows("user_activity_log").await, 0);

    let sent = app.mailer.sent();
    assert_eq!(sent.last().unwrap().to_address, "pupil@school.edu");

    app.get_auth(&user_uri(student.user.id, ""), &admin.token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_users_filters_by_status() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;
    app.seed_user("other", UserRole::Student).await;

    app.post_auth(&user_uri(student.user.id, "/ban"), &admin.token)
        .await
        .assert_ok();

    let response = app
        .get_auth("/api/v1/users?status=banned", &admin.token)
        .await;
    response.assert_ok();
    let json: serde_json::Value = response.json();
    let users = json["data"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "pupil");
}
