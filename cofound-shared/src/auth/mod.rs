/// Authentication
///
/// # Modules
///
/// - [`jwt`]: session tokens (HS256 access and refresh tokens)
/// - [`magic_link`]: passwordless sign-in by emailed single-use link
/// - [`middleware`]: Axum middleware and extractor for the signed-in user
///
/// # Flow
///
/// 1. `POST /api/auth/magic-link` calls [`magic_link::request_sign_in`]
/// 2. The emailed link hits [`magic_link::verify_sign_in`], which returns the user
/// 3. [`jwt::issue_token_pair`] hands the client its session tokens
/// 4. Later calls carry the access token and pass [`middleware::jwt_auth_middleware`]

pub mod jwt;
pub mod magic_link;
pub mod middleware;
