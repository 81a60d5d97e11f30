/// API route handlers, one module per resource
///
/// - `health`: liveness and database status
/// - `auth`: magic-link sign-in and token refresh
/// - `startups`: directory, creation, editing, participation state
/// - `requests`: participation request workflow
/// - `users`: profiles and skill tags
/// - `tags`: tag autocompletion

pub mod auth;
pub mod health;
pub mod requests;
pub mod startups;
pub mod tags;
pub mod users;
