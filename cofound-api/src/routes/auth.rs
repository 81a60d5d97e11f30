/// Authentication endpoints
///
/// Sign-in is passwordless: a user asks for a link, the link is emailed, and
/// opening it yields a session token pair.
///
/// # Endpoints
///
/// - `POST /api/auth/magic-link` - Email a sign-in link
/// - `GET /api/auth/magic-link/verify?token&email` - Exchange the link for tokens
/// - `POST /api/auth/refresh` - Refresh access token

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use cofound_shared::auth::{jwt, magic_link};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Sign-in link request
#[derive(Debug, Deserialize, Validate)]
pub struct MagicLinkRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Sign-in link acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MagicLinkResponse {
    pub sent: bool,
}

/// Query string of the emailed link
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyQuery {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Session issued at sign-in
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    pub user_id: Uuid,

    #[serde(flatten)]
    pub tokens: jwt::TokenPair,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

/// Emails a sign-in link
///
/// # Errors
///
/// - `422 Unprocessable Entity`: malformed email
/// - `502 Bad Gateway`: the email provider failed; nothing is retried
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(req): Json<MagicLinkRequest>,
) -> ApiResult<(StatusCode, Json<MagicLinkResponse>)> {
    req.validate()?;

    magic_link::request_sign_in(
        &state.db,
        state.email.as_ref(),
        &state.config.api.base_url,
        &req.email,
        state.config.magic_link_ttl(),
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(MagicLinkResponse { sent: true })))
}

/// Consumes a sign-in link and returns a session
///
/// The user is created on first sign-in.
///
/// # Errors
///
/// - `401 Unauthorized`: unknown, used or expired link
pub async fn verify_magic_link(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Json<SignInResponse>> {
    query.validate()?;

    let user = magic_link::verify_sign_in(&state.db, &query.email, &query.token).await?;
    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    Ok(Json(SignInResponse {
        user_id: user.id,
        tokens,
    }))
}

/// Exchanges a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}
