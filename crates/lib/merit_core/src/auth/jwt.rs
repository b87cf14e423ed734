//! JWT issuance and verification.
//!
//! Verification is self-contained: the signature and expiry embedded in the
//! token decide validity, no external state is consulted. This keeps the
//! verifier stateless and horizontally scalable.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::TokenClaims;

/// Access token lifetime: 24 hours.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// `token_use` claim value for access tokens.
pub const TOKEN_USE_ACCESS: &str = "access";

/// `token_use` claim value for refresh tokens.
pub const TOKEN_USE_REFRESH: &str = "refresh";

fn issue_token(
    subject: Uuid,
    role: &str,
    permissions: &[String],
    token_use: &str,
    ttl_secs: i64,
    secret: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: subject,
        role: role.to_string(),
        permissions: permissions.to_vec(),
        token_use: token_use.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Issue a signed access token (HS256) carrying the subject's role and
/// permission set.
pub fn issue_access_token(
    subject: Uuid,
    role: &str,
    permissions: &[String],
    secret: &[u8],
) -> Result<String, AuthError> {
    issue_token(
        subject,
        role,
        permissions,
        TOKEN_USE_ACCESS,
        ACCESS_TOKEN_TTL_SECS,
        secret,
    )
}

/// Issue a signed refresh token. Refresh tokens carry no permissions; a
/// fresh permission set is loaded when the token is exchanged.
pub fn issue_refresh_token(subject: Uuid, role: &str, secret: &[u8]) -> Result<String, AuthError> {
    issue_token(
        subject,
        role,
        &[],
        TOKEN_USE_REFRESH,
        REFRESH_TOKEN_TTL_SECS,
        secret,
    )
}

/// Verify a token's signature and expiry and check its `token_use` class.
///
/// A structurally valid token of the wrong class (e.g. a refresh token on a
/// gated endpoint) is reported as `Malformed`.
pub fn verify_token(
    token: &str,
    secret: &[u8],
    expected_use: &str,
) -> Result<TokenClaims, AuthError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
    })?;

    if data.claims.token_use != expected_use {
        return Err(AuthError::Malformed);
    }
    Ok(data.claims)
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("merit")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn perms() -> Vec<String> {
        vec!["create_achievement".into(), "view_all".into()]
    }

    #[test]
    fn issue_then_verify_preserves_claims() {
        let subject = Uuid::new_v4();
        let token = issue_access_token(subject, "student", &perms(), SECRET).unwrap();
        let claims = verify_token(&token, SECRET, TOKEN_USE_ACCESS).unwrap();
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.role, "student");
        assert_eq!(claims.permissions, perms());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(
            Uuid::new_v4(),
            "student",
            &[],
            TOKEN_USE_ACCESS,
            -120,
            SECRET,
        )
        .unwrap();
        let err = verify_token(&token, SECRET, TOKEN_USE_ACCESS).unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_access_token(Uuid::new_v4(), "student", &[], SECRET).unwrap();
        let err = verify_token(&token, b"other-secret", TOKEN_USE_ACCESS).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let err = verify_token("not.a.token", SECRET, TOKEN_USE_ACCESS).unwrap_err();
        assert!(matches!(err, AuthError::Malformed));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let token = issue_refresh_token(Uuid::new_v4(), "student", SECRET).unwrap();
        let err = verify_token(&token, SECRET, TOKEN_USE_ACCESS).unwrap_err();
        assert!(matches!(err, AuthError::Malformed));
        // ...but it is a valid refresh token.
        assert!(verify_token(&token, SECRET, TOKEN_USE_REFRESH).is_ok());
    }
}
