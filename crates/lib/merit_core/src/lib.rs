//! # merit_core
//!
//! Core domain logic for Merit: token issuance and verification, the
//! permission cache, the sliding-window rate limiter, the audit recorder,
//! and the achievement state machine with its repository contracts.

pub mod achievement;
pub mod audit;
pub mod auth;
pub mod cache;
pub mod db;
pub mod migrate;
pub mod models;
pub mod notifications;
pub mod points;
pub mod rate_limit;
pub mod uuid;
