//! Authentication middleware — Bearer token extraction, JWT verification,
//! and the per-IP / per-user request budgets applied to every gated route.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use merit_core::achievement::Actor;
use merit_core::auth::jwt::{TOKEN_USE_ACCESS, verify_token};
use merit_core::models::auth::{Role, TokenClaims};

use crate::AppState;
use crate::error::AppError;
use crate::middleware::client_ip;

/// Requests per minute allowed from a single source IP across gated routes.
pub const IP_LIMIT_PER_MINUTE: usize = 100;

/// Requests per minute allowed for a single authenticated user.
pub const USER_LIMIT_PER_MINUTE: usize = 50;

const MINUTE: Duration = Duration::from_secs(60);

/// The verified caller, stored in request extensions by [`require_auth`]
/// and read by the permission and audit layers downstream.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: TokenClaims,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor {
            subject_id: self.claims.sub,
            role: self.role,
        }
    }
}

/// Gate for protected routes.
///
/// Order matters: the IP budget is charged before token verification so
/// that unauthenticated floods burn their budget without costing a
/// signature check per request. The user budget is charged after
/// verification, keyed by the token subject.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(request.headers());
    if !state
        .limiter
        .allow(&format!("ip:{ip}"), IP_LIMIT_PER_MINUTE, MINUTE)
    {
        return Err(AppError::RateLimited {
            limit: IP_LIMIT_PER_MINUTE,
            window_secs: 60,
        });
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AppError::invalid_token)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(AppError::invalid_token)?;

    let claims = verify_token(token, state.config.jwt_secret.as_bytes(), TOKEN_USE_ACCESS)
        .map_err(|_| AppError::invalid_token())?;
    let role = claims.role().ok_or_else(AppError::invalid_token)?;

    if !state.limiter.allow(
        &format!("user:{}", claims.sub),
        USER_LIMIT_PER_MINUTE,
        MINUTE,
    ) {
        return Err(AppError::RateLimited {
            limit: USER_LIMIT_PER_MINUTE,
            window_secs: 60,
        });
    }

    // Refresh the permission cache from the token so permission layers
    // can answer without a datastore round trip.
    state
        .permissions
        .set(claims.sub, claims.permissions.clone());

    let user = AuthenticatedUser { claims, role };
    info!(
        subject = %user.claims.sub,
        role = %user.role,
        method = %request.method(),
        path = %request.uri().path(),
        "authenticated request"
    );
    request.extensions_mut().insert(user.clone());

    let mut response = next.run(request).await;
    // Mirrored into response extensions so the audit layer, which wraps
    // this one, can attribute the request.
    response.extensions_mut().insert(user);
    Ok(response)
}
