//! Domain models shared across the API and core services.

pub mod achievement;
pub mod auth;
pub mod notification;
