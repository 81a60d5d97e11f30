/// Tag model and database operations
///
/// Tags are shared labels: skills on users, tech-stack labels on startups.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tags (
///     id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
///     name VARCHAR(50) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX tags_name_lower_key ON tags (lower(name));
/// ```
///
/// Names are unique under case-insensitive comparison. The unique index on
/// `lower(name)` is what enforces it; `insert_or_get` relies on it to resolve
/// concurrent inserts of the same name to a single row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

/// How many times `insert_or_get` retries when the conflicting row is not yet visible
const INSERT_OR_GET_ATTEMPTS: usize = 3;

/// Tag row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    /// Integer identifier, allocated by the database
    pub id: i32,

    /// Display name, as first submitted
    pub name: String,

    /// When the tag was first used
    pub created_at: DateTime<Utc>,
}

/// Tag reference attached to a user or startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagRef {
    pub id: i32,
    pub name: String,
}

/// Tag reference joined with the owner it is attached to
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct OwnedTagRef {
    pub owner_id: Uuid,
    pub id: i32,
    pub name: String,
}

impl Tag {
    /// Finds a tag by case-insensitive name
    pub async fn find_by_name<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, name, created_at
            FROM tags
            WHERE lower(name) = lower($1)
            "#,
        )
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// Returns the ids among `ids` that exist
    pub async fn existing_ids<'e>(
        executor: impl PgExecutor<'e>,
        ids: &[i32],
    ) -> Result<Vec<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM tags WHERE id = ANY($1) ORDER BY id")
            .bind(ids)
            .fetch_all(executor)
            .await
    }

    /// Inserts a tag, or returns the existing tag with the same name
    ///
    /// The insert uses `ON CONFLICT DO NOTHING` against the `lower(name)`
    /// unique index. When it loses a race to a concurrent insert, the winner's
    /// row is read back; a short retry covers the window where the conflicting
    /// row is committed but not yet visible to this statement's snapshot.
    ///
    /// # Returns
    ///
    /// `(tag, created)` where `created` is true if this call inserted the row
    pub async fn insert_or_get(
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<(Self, bool), sqlx::Error> {
        for attempt in 1..=INSERT_OR_GET_ATTEMPTS {
            let inserted = sqlx::query_as::<_, Tag>(
                r#"
                INSERT INTO tags (name)
                VALUES ($1)
                ON CONFLICT ((lower(name))) DO NOTHING
                RETURNING id, name, created_at
                "#,
            )
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

            if let Some(tag) = inserted {
                return Ok((tag, true));
            }

            if let Some(tag) = Self::find_by_name(&mut *conn, name).await? {
                return Ok((tag, false));
            }

            debug!(attempt, name, "Conflicting tag not visible yet, retrying");
        }

        Err(sqlx::Error::RowNotFound)
    }

    /// Searches tags by case-insensitive name prefix
    pub async fn search(pool: &PgPool, prefix: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, name, created_at
            FROM tags
            WHERE lower(name) LIKE lower($1) || '%' ESCAPE '\'
            ORDER BY lower(name) ASC
            LIMIT $2
            "#,
        )
        .bind(escape_like(prefix))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Replaces the tag set of a user
    pub async fn replace_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        tag_ids: &[i32],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM user_tags WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_tags (user_id, tag_id)
            SELECT $1, tag_id FROM UNNEST($2::int4[]) AS t(tag_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(tag_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Replaces the tag set of a startup
    pub async fn replace_for_startup(
        conn: &mut PgConnection,
        startup_id: Uuid,
        tag_ids: &[i32],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM startup_tags WHERE startup_id = $1")
            .bind(startup_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO startup_tags (startup_id, tag_id)
            SELECT $1, tag_id FROM UNNEST($2::int4[]) AS t(tag_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(startup_id)
        .bind(tag_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Tags of a user, by name
    pub async fn list_for_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Vec<TagRef>, sqlx::Error> {
        sqlx::query_as::<_, TagRef>(
            r#"
            SELECT t.id, t.name
            FROM user_tags ut
            JOIN tags t ON t.id = ut.tag_id
            WHERE ut.user_id = $1
            ORDER BY lower(t.name) ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Tags of several startups at once, for eager loading
    pub(crate) async fn list_for_startups<'e>(
        executor: impl PgExecutor<'e>,
        startup_ids: &[Uuid],
    ) -> Result<Vec<OwnedTagRef>, sqlx::Error> {
        sqlx::query_as::<_, OwnedTagRef>(
            r#"
            SELECT st.startup_id AS owner_id, t.id, t.name
            FROM startup_tags st
            JOIN tags t ON t.id = st.tag_id
            WHERE st.startup_id = ANY($1)
            ORDER BY lower(t.name) ASC
            "#,
        )
        .bind(startup_ids)
        .fetch_all(executor)
        .await
    }
}

/// Escapes `%`, `_` and `\` for use inside a LIKE pattern with `ESCAPE '\'`
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
