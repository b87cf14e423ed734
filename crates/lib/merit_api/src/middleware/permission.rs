//! Permission-gating middleware.
//!
//! Applied per route group below [`super::auth::require_auth`]. Permissions
//! are read from the cache populated at authentication time, falling back to
//! the token claims. A gate reached without an authenticated identity is a
//! wiring bug and answers with a distinct 403 rather than a generic denial.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;

fn effective_permissions(state: &AppState, user: &AuthenticatedUser) -> Vec<String> {
    state
        .permissions
        .get(user.claims.sub)
        .unwrap_or_else(|| user.claims.permissions.clone())
}

/// Requires every listed permission.
pub async fn require_permissions(
    State((state, required)): State<(AppState, &'static [&'static str])>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AppError::GateMisconfigured)?;

    let held = effective_permissions(&state, user);
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|p| !held.iter().any(|h| h == p))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Forbidden(format!(
            "Missing required permission(s): {}",
            missing.join(", ")
        )));
    }
    Ok(next.run(request).await)
}

/// Requires at least one of the listed permissions.
pub async fn require_any_permission(
    State((state, accepted)): State<(AppState, &'static [&'static str])>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AppError::GateMisconfigured)?;

    let held = effective_permissions(&state, user);
    if !accepted.iter().any(|p| held.iter().any(|h| h == p)) {
        return Err(AppError::Forbidden(format!(
            "Requires one of: {}",
            accepted.join(", ")
        )));
    }
    Ok(next.run(request).await)
}
