//! API integration tests
//!
//! Health probes, middleware and request handling shared by every endpoint.

use axum::http::StatusCode;
use lms_admin::models::UserRole;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_records_samples() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/detailed").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["components"]["database"]["status"], "healthy");
    assert_eq!(json["components"]["audit_tables"]["status"], "healthy");
    assert_eq!(json["components"]["email"]["status"], "disabled");

    assert_eq!(app.count_rows("system_health_metrics").await, 1);
    assert_eq!(app.count_rows("system_uptime_log").await, 1);
}

#[tokio::test]
async fn test_detailed_health_degraded_without_audit_table() {
    let app = TestApp::new().await;
    sqlx::query("DROP TABLE audit_trail")
        .execute(&app.state.db)
        .await
        .unwrap();

    let response = app.get("/api/v1/health/detailed").await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "degraded");
    assert!(json["components"]["audit_tables"]["message"]
        .as_str()
        .unwrap()
        .contains("audit_trail"));
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/live").await.assert_ok();
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(response.header("x-frame-options"), Some("DENY"));
    assert!(response.header("cache-control").unwrap().contains("no-store"));
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/users").await;

    response.assert_unauthorized();
    let json: serde_json::Value = response.json();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::new().await;
    app.get_auth("/api/v1/auth/me", "not-a-jwt")
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn test_invalid_user_id_is_bad_request() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;

    let response = app.get_auth("/api/v1/users/not-a-uuid", &admin.token).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let json: serde_json::Value = response.json();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;

    let uri = format!("/api/v1/users/{}", uuid::Uuid::new_v4());
    app.get_auth(&uri, &admin.token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_broken_link_report_and_listing() {
    let app = TestApp::new().await;
    let admin = app.seed_user("root", UserRole::Admin).await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    let response = app
        .post_json_auth(
            "/api/v1/monitoring/broken-links",
            &student.token,
            serde_json::json!({
                "url": "https://lms.school.edu/courses/7/missing.pdf",
                "referrer": "https://lms.school.edu/courses/7",
                "status_code": 404
            }),
        )
        .await;
    response.assert_created();

    app.get_auth("/api/v1/monitoring/broken-links", &student.token)
        .await
        .assert_forbidden();

    let response = app
        .get_auth("/api/v1/monitoring/broken-links", &admin.token)
        .await;
    response.assert_ok();
    let json: serde_json::Value = response.json();
    let reports = json["data"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["status_code"], 404);
    assert_eq!(reports[0]["reported_by"], student.user.id.to_string());
}

#[tokio::test]
async fn test_broken_link_validation() {
    let app = TestApp::new().await;
    let student = app.seed_user("pupil", UserRole::Student).await;

    let response = app
        .post_json_auth(
            "/api/v1/monitoring/broken-links",
            &student.token,
            serde_json::json!({ "url": "", "status_code": 999 }),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.count_rows("broken_links").await, 0);
}
