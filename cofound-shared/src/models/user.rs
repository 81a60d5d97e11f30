/// User model and database operations
///
/// Users are created on first sign-in and afterwards only updated in place.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(32),
///     email VARCHAR(320) NOT NULL,
///     name VARCHAR(100),
///     image VARCHAR(2048),
///     description TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT users_username_charset CHECK (username IS NULL OR username ~ '^[A-Za-z0-9_]+$')
/// );
/// CREATE UNIQUE INDEX users_email_key ON users (lower(email));
/// CREATE UNIQUE INDEX users_username_key ON users (username);
/// ```
///
/// # Example
///
/// ```no_run
/// use cofound_shared::models::user::{User, CreateUser};
/// use cofound_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "ada@example.com".to_string(),
///     name: Some("Ada".to_string()),
///     image: None,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ADA@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::ServiceError;

/// Minimum username length
pub const USERNAME_MIN_LENGTH: usize = 3;

/// Maximum username length
pub const USERNAME_MAX_LENGTH: usize = 32;

const USER_COLUMNS: &str =
    "id, username, email, name, image, description, created_at, updated_at";

/// User account and public profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Optional public handle, unique, `[A-Za-z0-9_]+`
    pub username: Option<String>,

    /// Email address, stored lowercase, unique
    pub email: String,

    /// Display name
    pub name: Option<String>,

    /// Avatar image URL
    pub image: Option<String>,

    /// Free-text profile description
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact user reference used when listing participants and requesters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Participant joined with the startup it belongs to
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ParticipantRow {
    pub startup_id: Uuid,
    pub id: Uuid,
    pub username: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl From<ParticipantRow> for UserSummary {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            name: row.name,
            image: row.image,
        }
    }
}

/// Input for creating a user on first sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (normalized to lowercase on insert)
    pub email: String,

    pub name: Option<String>,

    pub image: Option<String>,
}

/// Profile fields a user may change
///
/// Only non-None fields are updated. Nested options clear the column with `Some(None)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub username: Option<Option<String>>,
    pub name: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub image: Option<Option<String>>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.image.is_none()
    }
}

/// Checks the username rules: 3..=32 chars of `[A-Za-z0-9_]`
///
/// # Example
///
/// ```
/// use cofound_shared::models::user::validate_username;
///
/// assert!(validate_username("ada_lovelace").is_ok());
/// assert!(validate_username("ada lovelace").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<(), ServiceError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&len) {
        return Err(ServiceError::validation(
            "username",
            format!(
                "Username must be {}-{} characters",
                USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH
            ),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ServiceError::validation(
            "username",
            "Username may only contain letters, digits and underscores",
        ));
    }

    Ok(())
}

/// Lowercases and trims an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Creates a user
    ///
    /// # Errors
    ///
    /// Returns a unique violation on `users_email_key` if the email is taken
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateUser,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, name, image) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(&data.email))
            .bind(data.name)
            .bind(data.image)
            .fetch_one(executor)
            .await
    }

    /// Returns the user with this email, creating it if absent
    pub async fn find_or_create_by_email(pool: &PgPool, email: &str) -> Result<Self, sqlx::Error> {
        let email = normalize_email(email);

        // The no-op update makes RETURNING yield the existing row on conflict
        let query = format!(
            r#"
            INSERT INTO users (email)
            VALUES ($1)
            ON CONFLICT ((lower(email))) DO UPDATE SET email = EXCLUDED.email
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users WHERE lower(email) = $1",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by exact username
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Updates profile fields
    ///
    /// Only the fields present in `data` are written; `updated_at` is always bumped.
    ///
    /// # Returns
    ///
    /// The updated user, or None if no user has this id
    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.username.is_some() {
            bind_count += 1;
            query.push_str(&format!(", username = ${}", bind_count));
        }
        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.image.is_some() {
            bind_count += 1;
            query.push_str(&format!(", image = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", USER_COLUMNS));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(username) = data.username {
            q = q.bind(username);
        }
        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(image) = data.image {
            q = q.bind(image);
        }

        q.fetch_optional(executor).await
    }

    /// Participants of several startups at once, for eager loading
    pub(crate) async fn list_participants<'e>(
        executor: impl PgExecutor<'e>,
        startup_ids: &[Uuid],
    ) -> Result<Vec<ParticipantRow>, sqlx::Error> {
        sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT sp.startup_id, u.id, u.username, u.name, u.image
            FROM startup_participants sp
            JOIN users u ON u.id = sp.user_id
            WHERE sp.startup_id = ANY($1)
            ORDER BY sp.joined_at ASC
            "#,
        )
        .bind(startup_ids)
        .fetch_all(executor)
        .await
    }

    /// Compact references for a set of users
    pub(crate) async fn summaries<'e>(
        executor: impl PgExecutor<'e>,
        ids: &[Uuid],
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, name, image FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(executor)
        .await
    }
}
