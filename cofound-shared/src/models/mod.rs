/// Database models for Cofound
///
/// This module contains all database models and their queries.
///
/// # Models
///
/// - `user`: User accounts and profiles
/// - `tag`: Skill / tech-stack labels shared by users and startups
/// - `startup`: Startup listings, their participants and eager-loaded details
/// - `image`: Ordered startup images
/// - `participation_request`: Pending join requests
/// - `verification_token`: Magic-link sign-in tokens
///
/// Multi-statement mutations take `&mut PgConnection` and are meant to run
/// inside a transaction opened by the services layer.

pub mod image;
pub mod participation_request;
pub mod startup;
pub mod tag;
pub mod user;
pub mod verification_token;
