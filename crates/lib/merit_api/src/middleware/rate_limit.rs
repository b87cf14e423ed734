//! Per-route rate limit layers.
//!
//! These stack on top of the blanket per-IP and per-user budgets charged in
//! the authentication layer, giving expensive or abuse-prone routes their
//! own tighter budget.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::client_ip;

/// A named per-route budget. The name keeps the key space of one route
/// separate from another's.
#[derive(Debug, Clone, Copy)]
pub struct RouteBudget {
    pub name: &'static str,
    pub limit: usize,
    pub window_secs: u64,
}

impl RouteBudget {
    pub const fn per_hour(name: &'static str, limit: usize) -> Self {
        Self {
            name,
            limit,
            window_secs: 60 * 60,
        }
    }

    pub const fn per_minute(name: &'static str, limit: usize) -> Self {
        Self {
            name,
            limit,
            window_secs: 60,
        }
    }
}

/// Charge the budget against the authenticated user. Must sit below the
/// authentication layer.
pub async fn per_user(
    State((state, budget)): State<(AppState, RouteBudget)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AppError::GateMisconfigured)?;
    let key = format!("route:{}:user:{}", budget.name, user.claims.sub);
    charge(&state, &key, budget)?;
    Ok(next.run(request).await)
}

/// Charge the budget against the user + permission composite, so one
/// permission's budget cannot starve another's for the same user. Must
/// sit below the authentication layer.
pub async fn per_user_permission(
    State((state, budget, permission)): State<(AppState, RouteBudget, &'static str)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AppError::GateMisconfigured)?;
    let key = format!(
        "route:{}:user:{}:perm:{permission}",
        budget.name, user.claims.sub
    );
    charge(&state, &key, budget)?;
    Ok(next.run(request).await)
}

/// Charge the budget against the source IP. Usable on public routes.
pub async fn per_ip(
    State((state, budget)): State<(AppState, RouteBudget)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(request.headers());
    let key = format!("route:{}:ip:{ip}", budget.name);
    charge(&state, &key, budget)?;
    Ok(next.run(request).await)
}

fn charge(state: &AppState, key: &str, budget: RouteBudget) -> Result<(), AppError> {
    if state
        .limiter
        .allow(key, budget.limit, Duration::from_secs(budget.window_secs))
    {
        Ok(())
    } else {
        Err(AppError::RateLimited {
            limit: budget.limit,
            window_secs: budget.window_secs,
        })
    }
}
