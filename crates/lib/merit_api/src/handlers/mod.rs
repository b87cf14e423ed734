//! Request handlers.

pub mod achievements;
pub mod auth;
pub mod notifications;
