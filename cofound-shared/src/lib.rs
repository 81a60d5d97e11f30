//! # Cofound Shared Library
//!
//! Domain logic of the Cofound co-founder matching platform, used by the API
//! server and its tests.
//!
//! ## Module Organization
//!
//! - `models`: database rows and their queries
//! - `services`: tag reconciliation, startup directory, participation
//!   requests, startups and profiles
//! - `auth`: session tokens, magic-link sign-in, Axum middleware
//! - `email`: outbound email boundary
//! - `db`: connection pool and migrations
//! - `error`: service error taxonomy

pub mod auth;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod services;

/// Current version of the Cofound shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
