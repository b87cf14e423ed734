//! Authentication request handlers.

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use merit_core::auth::jwt::{
    ACCESS_TOKEN_TTL_SECS, TOKEN_USE_REFRESH, issue_access_token, issue_refresh_token,
    verify_token,
};
use merit_core::auth::password::verify_password;
use merit_core::auth::queries;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserInfo,
}

/// `POST /api/v1/auth/login` — authenticate with username + password.
///
/// Unknown usernames and wrong passwords produce the same answer.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<ApiResponse<TokenData>> {
    let user = queries::find_user_by_username(&state.pool, &body.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".into()))?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".into()))?;
    if !verify_password(&body.password, hash)? {
        return Err(AppError::Unauthorized("Invalid username or password".into()));
    }

    let permissions = queries::permissions_for_user(&state.pool, user.id).await?;
    state.permissions.set(user.id, permissions.clone());

    let secret = state.config.jwt_secret.as_bytes();
    let access_token = issue_access_token(user.id, &user.role, &permissions, secret)?;
    let refresh_token = issue_refresh_token(user.id, &user.role, secret)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        TokenData {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: ACCESS_TOKEN_TTL_SECS,
            user: UserInfo {
                id: user.id,
                username: user.username,
                full_name: user.full_name,
                role: user.role,
                permissions,
            },
        },
    ))
}

/// `POST /api/v1/auth/refresh` — exchange a refresh token for a new pair.
///
/// The user row is re-read so a deactivated account cannot keep rotating
/// tokens, and the permission set is re-resolved rather than copied from
/// the old token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<ApiResponse<TokenData>> {
    let secret = state.config.jwt_secret.as_bytes();
    let claims = verify_token(&body.refresh_token, secret, TOKEN_USE_REFRESH)
        .map_err(|_| AppError::invalid_token())?;

    let user = queries::find_user_by_id(&state.pool, claims.sub)
        .await?
        .ok_or_else(AppError::invalid_token)?;

    let permissions = queries::permissions_for_user(&state.pool, user.id).await?;
    state.permissions.set(user.id, permissions.clone());

    let access_token = issue_access_token(user.id, &user.role, &permissions, secret)?;
    let refresh_token = issue_refresh_token(user.id, &user.role, secret)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Token refreshed",
        TokenData {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: ACCESS_TOKEN_TTL_SECS,
            user: UserInfo {
                id: user.id,
                username: user.username,
                full_name: user.full_name,
                role: user.role,
                permissions,
            },
        },
    ))
}

/// `GET /api/v1/auth/profile` — the authenticated user's account and
/// current permission grants.
pub async fn profile_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<UserInfo>> {
    let record = queries::find_user_by_id(&state.pool, user.claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let permissions = queries::permissions_for_user(&state.pool, record.id).await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile",
        UserInfo {
            id: record.id,
            username: record.username,
            full_name: record.full_name,
            role: record.role,
            permissions,
        },
    ))
}
