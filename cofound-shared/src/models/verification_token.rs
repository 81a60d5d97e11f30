/// Magic-link verification tokens
///
/// Tokens are single use. Only the SHA-256 hash of a token is stored; the
/// plaintext exists in the emailed link alone.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE verification_tokens (
///     identifier VARCHAR(320) NOT NULL,
///     token_hash VARCHAR(64) NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (identifier, token_hash)
/// );
/// ```

use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Stored verification token
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerificationToken {
    /// Normalized email the token was issued for
    pub identifier: String,

    pub token_hash: String,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub async fn create(
        pool: &PgPool,
        identifier: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (identifier, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING identifier, token_hash, expires_at, created_at
            "#,
        )
        .bind(identifier)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Deletes and returns the token if it exists and has not expired
    pub async fn consume(
        pool: &PgPool,
        identifier: &str,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VerificationToken>(
            r#"
            DELETE FROM verification_tokens
            WHERE identifier = $1 AND token_hash = $2 AND expires_at > NOW()
            RETURNING identifier, token_hash, expires_at, created_at
            "#,
        )
        .bind(identifier)
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a token that was never delivered
    pub async fn delete(pool: &PgPool, identifier: &str, token_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM verification_tokens WHERE identifier = $1 AND token_hash = $2",
        )
        .bind(identifier)
        .bind(token_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes expired tokens
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
