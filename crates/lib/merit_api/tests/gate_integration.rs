//! Integration tests for the request gate: build the full router against
//! in-memory stores and drive it with `tower::ServiceExt::oneshot`.
//!
//! The pool is connected lazily and never touched by these routes, so no
//! database is needed.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;
use uuid::Uuid;

use merit_api::config::ApiConfig;
use merit_api::{AppState, router};
use merit_core::achievement::AchievementService;
use merit_core::achievement::memory::{
    MemoryAchievementStore, MemoryNotifier, MemoryReferenceProjection, MemoryStudentDirectory,
};
use merit_core::audit::AuditRecorder;
use merit_core::auth::jwt::issue_access_token;
use merit_core::cache::PermissionCache;
use merit_core::rate_limit::RateLimiter;

const SECRET: &str = "test-secret";

struct TestApp {
    app: Router,
    student_id: Uuid,
    advisor_id: Uuid,
    // Keeps the audit directory alive for the test's duration.
    _audit_dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let student_id = Uuid::new_v4();
    let advisor_id = Uuid::new_v4();
    let audit_dir = tempfile::tempdir().expect("tempdir");

    let achievements = Arc::new(AchievementService::new(
        Arc::new(MemoryAchievementStore::new()),
        Arc::new(MemoryReferenceProjection::new()),
        Arc::new(MemoryNotifier::new()),
        Arc::new(MemoryStudentDirectory::new().with_advisor(student_id, advisor_id)),
    ));

    let state = AppState {
        pool: sqlx::PgPool::connect_lazy("postgres://localhost:5432/merit_test")
            .expect("lazy pool"),
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: "postgres://localhost:5432/merit_test".into(),
            jwt_secret: SECRET.into(),
            audit_log_dir: audit_dir.path().to_path_buf(),
        },
        permissions: Arc::new(PermissionCache::new()),
        limiter: Arc::new(RateLimiter::new()),
        audit: AuditRecorder::new(audit_dir.path()),
        achievements,
    };

    TestApp {
        app: router(state),
        student_id,
        advisor_id,
        _audit_dir: audit_dir,
    }
}

fn student_token(subject: Uuid) -> String {
    issue_access_token(
        subject,
        "student",
        &[
            "create_achievement".into(),
            "update_achievement".into(),
            "delete_achievement".into(),
        ],
        SECRET.as_bytes(),
    )
    .expect("issue token")
}

fn advisor_token(subject: Uuid) -> String {
    issue_access_token(
        subject,
        "advisor",
        &["view_all".into(), "verify_achievement".into()],
        SECRET.as_bytes(),
    )
    .expect("issue token")
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, json)
}

fn new_achievement_body() -> serde_json::Value {
    serde_json::json!({
        "title": "Science fair",
        "description": "Second place",
        "category": "competition",
        "points": 50,
    })
}

#[tokio::test]
async fn missing_token_is_a_generic_401() {
    let t = test_app();
    let (status, body) = send(&t.app, request("GET", "/api/v1/achievements", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 401);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn garbage_and_wrongly_signed_tokens_get_the_same_message() {
    let t = test_app();
    let (status, body) = send(
        &t.app,
        request("GET", "/api/v1/achievements", Some("not.a.token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");

    let foreign =
        issue_access_token(Uuid::new_v4(), "student", &[], b"other-secret").expect("token");
    let (status, body) = send(
        &t.app,
        request("GET", "/api/v1/achievements", Some(&foreign), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn missing_permission_is_named_in_the_403() {
    let t = test_app();
    let token = student_token(t.student_id);
    let id = Uuid::new_v4();
    let (status, body) = send(
        &t.app,
        request(
            "POST",
            &format!("/api/v1/achievements/{id}/verify"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");
    assert!(
        body["message"]
            .as_str()
            .expect("message")
            .contains("verify_achievement"),
        "403 should name the missing permission: {body}"
    );
}

#[tokio::test]
async fn create_budget_is_exhausted_then_429() {
    let t = test_app();
    let token = student_token(t.student_id);
    // The create route allows 10 per hour per user.
    for _ in 0..10 {
        let (status, _) = send(
            &t.app,
            request(
                "POST",
                "/api/v1/achievements",
                Some(&token),
                Some(new_achievement_body()),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = send(
        &t.app,
        request(
            "POST",
            "/api/v1/achievements",
            Some(&token),
            Some(new_achievement_body()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let message = body["message"].as_str().expect("message");
    assert!(message.contains("10"), "429 should name the limit: {message}");

    // A different user still has a fresh budget.
    let other = student_token(Uuid::new_v4());
    let (status, _) = send(
        &t.app,
        request(
            "POST",
            "/api/v1/achievements",
            Some(&other),
            Some(new_achievement_body()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_with_body_over_the_excerpt_ceiling_succeeds() {
    let t = test_app();
    let token = student_token(t.student_id);

    // Well past the audit excerpt ceiling, sent without a Content-Length
    // header; the audit layer must not consume a body it declines to excerpt.
    let mut payload = new_achievement_body();
    payload["description"] = serde_json::Value::String("x".repeat(20 * 1024));
    let (status, body) = send(
        &t.app,
        request("POST", "/api/v1/achievements", Some(&token), Some(payload)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "create was rejected: {body}");
    assert_eq!(body["data"]["status"], "draft");
    assert_eq!(
        body["data"]["description"].as_str().expect("description").len(),
        20 * 1024
    );
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let t = test_app();
    let student = student_token(t.student_id);
    let advisor = advisor_token(t.advisor_id);

    // Create: 201 with the envelope and a draft record.
    let (status, body) = send(
        &t.app,
        request(
            "POST",
            "/api/v1/achievements",
            Some(&student),
            Some(new_achievement_body()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["code"], 201);
    assert_eq!(body["data"]["status"], "draft");
    // 50 points classify as a regional-level achievement.
    assert_eq!(body["data"]["level"], "regional");
    let id = body["data"]["id"].as_str().expect("id").to_string();

    // Submit.
    let (status, body) = send(
        &t.app,
        request(
            "POST",
            &format!("/api/v1/achievements/{id}/submit"),
            Some(&student),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "submitted");
    assert!(body["data"]["submitted_at"].is_string());

    // A second submit loses to the status precondition.
    let (status, body) = send(
        &t.app,
        request(
            "POST",
            &format!("/api/v1/achievements/{id}/submit"),
            Some(&student),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"].as_str().expect("message").contains("draft"),
        "error should name the required status: {body}"
    );

    // Advisor rejects with a reason.
    let (status, body) = send(
        &t.app,
        request(
            "POST",
            &format!("/api/v1/achievements/{id}/reject"),
            Some(&advisor),
            Some(serde_json::json!({"reason": "incomplete documents"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["rejection_reason"], "incomplete documents");

    // The rejected record can no longer be resubmitted.
    let (status, _) = send(
        &t.app,
        request(
            "POST",
            &format!("/api/v1/achievements/{id}/submit"),
            Some(&student),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_path_and_listing_scopes() {
    let t = test_app();
    let student = student_token(t.student_id);
    let advisor = advisor_token(t.advisor_id);

    let (_, body) = send(
        &t.app,
        request(
            "POST",
            "/api/v1/achievements",
            Some(&student),
            Some(new_achievement_body()),
        ),
    )
    .await;
    let id = body["data"]["id"].as_str().expect("id").to_string();
    send(
        &t.app,
        request(
            "POST",
            &format!("/api/v1/achievements/{id}/submit"),
            Some(&student),
            None,
        ),
    )
    .await;

    // Advisor verifies.
    let (status, body) = send(
        &t.app,
        request(
            "POST",
            &format!("/api/v1/achievements/{id}/verify"),
            Some(&advisor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "verified");
    assert_eq!(body["data"]["verified_by"], t.advisor_id.to_string());

    // Advisee listing resolves through the projection.
    let (status, body) = send(
        &t.app,
        request(
            "GET",
            "/api/v1/achievements/advisees",
            Some(&advisor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], id);

    // The student cannot reach the advisee listing.
    let (status, _) = send(
        &t.app,
        request(
            "GET",
            "/api/v1/achievements/advisees",
            Some(&student),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The student's own listing contains the record.
    let (status, body) = send(
        &t.app,
        request("GET", "/api/v1/achievements", Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["owner_id"], t.student_id.to_string());
}
