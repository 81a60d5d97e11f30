/// Passwordless sign-in by emailed link
///
/// `request_sign_in` stores a single-use token (hashed) and hands
/// `{email, url}` to the email boundary. `verify_sign_in` consumes the token
/// with one conditional delete and returns the user, creating it on first
/// sign-in.
///
/// Tokens are 32 random bytes, hex-encoded. Only their SHA-256 hash is
/// persisted.

use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};
use validator::ValidateEmail;

use crate::email::{EmailSender, SignInEmail};
use crate::error::{ServiceError, ServiceResult};
use crate::models::user::{normalize_email, User};
use crate::models::verification_token::VerificationToken;

/// Path of the verification endpoint, appended to the public base URL
pub const VERIFY_PATH: &str = "/api/auth/magic-link/verify";

/// Default lifetime of a sign-in link
pub const DEFAULT_TTL_MINUTES: i64 = 15;

const TOKEN_BYTES: usize = 32;
const EMAIL_MAX_LENGTH: usize = 320;

/// Generates a sign-in token and its storage hash
///
/// # Returns
///
/// Tuple of (plaintext_token, sha256_hash)
pub fn generate_token() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let token = hex::encode(bytes);
    let hash = hash_token(&token);
    (token, hash)
}

/// Hex-encoded SHA-256 of a token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Same rule as the `#[validate(email)]` request bodies
pub fn validate_email(email: &str) -> ServiceResult<()> {
    if email.len() <= EMAIL_MAX_LENGTH && email.validate_email() {
        Ok(())
    } else {
        Err(ServiceError::validation("email", "Invalid email address"))
    }
}

/// Builds the link a user clicks to sign in
pub fn sign_in_url(base_url: &str, email: &str, token: &str) -> ServiceResult<String> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), VERIFY_PATH);

    reqwest::Url::parse_with_params(&url, &[("token", token), ("email", email)])
        .map(|u| u.to_string())
        .map_err(|e| ServiceError::validation("base_url", format!("Invalid base URL: {}", e)))
}

/// Creates a sign-in token for `email` and emails the link
///
/// # Errors
///
/// - `Validation` for a malformed address
/// - `Email` if delivery fails; the undelivered token is discarded
pub async fn request_sign_in(
    pool: &PgPool,
    sender: &dyn EmailSender,
    base_url: &str,
    email: &str,
    ttl: Duration,
) -> ServiceResult<()> {
    let email = normalize_email(email);
    validate_email(&email)?;

    let (token, hash) = generate_token();
    let url = sign_in_url(base_url, &email, &token)?;

    VerificationToken::create(pool, &email, &hash, Utc::now() + ttl).await?;

    let message = SignInEmail {
        email: email.clone(),
        url,
    };

    if let Err(e) = sender.send_sign_in_link(&message).await {
        warn!(error = %e, "Failed to send sign-in email");
        if let Err(db_err) = VerificationToken::delete(pool, &email, &hash).await {
            warn!(error = %db_err, "Failed to discard undelivered sign-in token");
        }
        return Err(ServiceError::Email(e));
    }

    info!("Sign-in link sent");
    Ok(())
}

/// Consumes a sign-in token and returns its user
///
/// # Errors
///
/// `Unauthorized` if the token is unknown, already used, or expired
pub async fn verify_sign_in(pool: &PgPool, email: &str, token: &str) -> ServiceResult<User> {
    let email = normalize_email(email);

    VerificationToken::consume(pool, &email, &hash_token(token))
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("Invalid or expired sign-in link".to_string()))?;

    let user = User::find_or_create_by_email(pool, &email).await?;
    info!(user_id = %user.id, "User signed in");

    Ok(user)
}
