//! Audit middleware.
//!
//! Outermost layer: times the whole request, snapshots a sanitized excerpt
//! of mutating request bodies, and hands a structured entry to the audit
//! recorder after the response is produced. Recording is best-effort and
//! never fails the request.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::info;

use merit_core::audit::AuditEntry;

use crate::AppState;
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::client_ip;

/// Request bodies above this size are not excerpted.
const MAX_EXCERPT_BYTES: usize = 10 * 1024;

/// Body fields dropped from excerpts.
const SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "refresh_token", "access_token"];

/// Route prefixes always audited, regardless of response status.
const AUDITED_PREFIXES: &[&str] = &[
    "/api/v1/auth",
    "/api/v1/users",
    "/api/v1/roles",
    "/api/v1/achievements",
];

pub async fn audit_log(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let source_ip = client_ip(request.headers());
    let headers = header_snapshot(request.headers());

    let (request, excerpt) = excerpt_body(request, &method).await;
    let response = next.run(request).await;

    let status_code = response.status().as_u16();
    if should_audit(&path, status_code) {
        let (subject_id, role) = match response.extensions().get::<AuthenticatedUser>() {
            Some(user) => (user.claims.sub.to_string(), user.role.to_string()),
            None => ("anonymous".to_string(), "guest".to_string()),
        };
        state.audit.record(AuditEntry {
            timestamp: Utc::now(),
            subject_id,
            role,
            action: action_for(&method).to_string(),
            resource: resource_from_path(&path).to_string(),
            method: method.to_string(),
            path: path.clone(),
            source_ip: source_ip.clone(),
            status_code,
            duration_ms: start.elapsed().as_millis() as u64,
            request_excerpt: excerpt,
            headers,
        });
    }
    info!(
        method = %method,
        path = %path,
        status = status_code,
        ip = %source_ip,
        duration_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Buffer and sanitize a mutating JSON body. The original bytes are always
/// put back on the request untouched; only the excerpt is sanitized, and an
/// oversized body simply goes unexcerpted.
async fn excerpt_body(request: Request, method: &Method) -> (Request, Option<serde_json::Value>) {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return (request, None);
    }
    let declared_large = request
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > MAX_EXCERPT_BYTES);
    if declared_large {
        // Known too big to excerpt; leave the body streaming through.
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        // Unreadable body: the request was already broken, pass it along.
        Err(_) => return (Request::from_parts(parts, Body::empty()), None),
    };
    let excerpt = if bytes.len() <= MAX_EXCERPT_BYTES {
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .map(sanitize)
    } else {
        None
    };
    (Request::from_parts(parts, Body::from(bytes)), excerpt)
}

/// Drop sensitive fields from a JSON object, recursively.
fn sanitize(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(map) = value.as_object_mut() {
        map.retain(|key, _| !SENSITIVE_FIELDS.contains(&key.as_str()));
        for child in map.values_mut() {
            *child = sanitize(child.take());
        }
    }
    value
}

/// Headers worth keeping in the entry, with the authorization value masked.
fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut snapshot = BTreeMap::new();
    for name in ["user-agent", "content-type", "x-forwarded-for"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            snapshot.insert(name.to_string(), value.to_string());
        }
    }
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        snapshot.insert("authorization".to_string(), mask_auth_header(auth));
    }
    snapshot
}

/// Keep enough of the header to correlate entries without recording a
/// usable credential.
fn mask_auth_header(value: &str) -> String {
    match value.strip_prefix("Bearer ") {
        Some(token) if token.len() > 12 => {
            format!("Bearer {}...{}", &token[..6], &token[token.len() - 4..])
        }
        Some(_) => "Bearer ***".to_string(),
        None => "***".to_string(),
    }
}

fn action_for(method: &Method) -> &'static str {
    match *method {
        Method::POST => "CREATE",
        Method::PUT | Method::PATCH => "UPDATE",
        Method::DELETE => "DELETE",
        _ => "READ",
    }
}

/// Second path segment after `/api/v1/`, e.g. `/api/v1/achievements/42` →
/// `achievements`.
fn resource_from_path(path: &str) -> &str {
    path.strip_prefix("/api/v1/")
        .and_then(|rest| rest.split('/').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
}

/// Every failure is audited; successes only on the sensitive prefixes.
fn should_audit(path: &str, status_code: u16) -> bool {
    status_code >= 400 || AUDITED_PREFIXES.iter().any(|p| path.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_strips_sensitive_fields_recursively() {
        let value = json!({
            "username": "maria",
            "password": "hunter2",
            "nested": {"token": "abc", "title": "ok"},
        });
        let clean = sanitize(value);
        assert_eq!(
            clean,
            json!({"username": "maria", "nested": {"title": "ok"}})
        );
    }

    #[test]
    fn auth_header_is_masked_not_dropped() {
        let masked = mask_auth_header("Bearer eyJhbGciOiJIUzI1NiJ9.payload.sig");
        assert!(masked.starts_with("Bearer eyJhbG"));
        assert!(masked.contains("..."));
        assert!(!masked.contains("payload"));
        assert_eq!(mask_auth_header("Bearer abc"), "Bearer ***");
        assert_eq!(mask_auth_header("Basic dXNlcg=="), "***");
    }

    #[test]
    fn resource_is_the_first_versioned_segment() {
        assert_eq!(
            resource_from_path("/api/v1/achievements/42/submit"),
            "achievements"
        );
        assert_eq!(resource_from_path("/api/v1/auth/login"), "auth");
        assert_eq!(resource_from_path("/healthz"), "unknown");
    }

    #[test]
    fn failures_are_always_audited() {
        assert!(should_audit("/healthz", 500));
        assert!(should_audit("/api/v1/achievements", 200));
        assert!(!should_audit("/api/v1/notifications", 200));
    }

    #[tokio::test]
    async fn body_over_the_excerpt_ceiling_passes_through_intact() {
        let payload = format!(r#"{{"description":"{}"}}"#, "x".repeat(MAX_EXCERPT_BYTES));
        // No Content-Length header, as a chunked upload would arrive.
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/achievements")
            .body(Body::from(payload.clone()))
            .unwrap();

        let (request, excerpt) = excerpt_body(request, &Method::POST).await;

        assert!(excerpt.is_none());
        let bytes = to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes, payload.as_bytes());
    }

    #[tokio::test]
    async fn small_body_is_excerpted_and_restored() {
        let payload = r#"{"title":"Chess club","password":"hunter2"}"#;
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/achievements")
            .body(Body::from(payload))
            .unwrap();

        let (request, excerpt) = excerpt_body(request, &Method::POST).await;

        let excerpt = excerpt.expect("small JSON body should be excerpted");
        assert_eq!(excerpt, json!({"title": "Chess club"}));
        let bytes = to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes, payload.as_bytes());
    }
}
