/// Startup images
///
/// Images are created only together with their startup. `position` keeps the
/// order in which the creator submitted them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE images (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     url VARCHAR(2048) NOT NULL,
///     startup_id UUID NOT NULL REFERENCES startups(id) ON DELETE CASCADE,
///     position INTEGER NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

/// Image row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub url: String,
    pub startup_id: Uuid,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// Inserts images for a startup, preserving the order of `urls`
    pub async fn create_for_startup(
        conn: &mut PgConnection,
        startup_id: Uuid,
        urls: &[String],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (url, startup_id, position)
            SELECT url, $1, (ord - 1)::int4
            FROM UNNEST($2::text[]) WITH ORDINALITY AS u(url, ord)
            RETURNING id, url, startup_id, position, created_at
            "#,
        )
        .bind(startup_id)
        .bind(urls)
        .fetch_all(conn)
        .await
        .map(|mut images| {
            images.sort_by_key(|image| image.position);
            images
        })
    }

    /// Images of several startups at once, ordered by position
    pub async fn list_for_startups<'e>(
        executor: impl PgExecutor<'e>,
        startup_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(
            r#"
            SELECT id, url, startup_id, position, created_at
            FROM images
            WHERE startup_id = ANY($1)
            ORDER BY startup_id, position ASC
            "#,
        )
        .bind(startup_ids)
        .fetch_all(executor)
        .await
    }
}
