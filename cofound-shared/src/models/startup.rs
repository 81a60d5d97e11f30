/// Startup model and database operations
///
/// A startup is a project listing seeking collaborators. Its creator is fixed
/// at creation and is always a participant.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE startups (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     description TEXT NOT NULL,
///     creator_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE startup_participants (
///     startup_id UUID NOT NULL REFERENCES startups(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (startup_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use std::collections::HashMap;
use uuid::Uuid;

use super::image::Image;
use super::tag::{Tag, TagRef};
use super::user::{User, UserSummary};

const STARTUP_COLUMNS: &str = "id, name, description, creator_id, created_at, updated_at";

/// Startup row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Startup {
    pub id: Uuid,
    pub name: String,
    pub description: String,

    /// Creator, immutable after creation
    pub creator_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Startup with creator, participants, tags and images attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupDetails {
    #[serde(flatten)]
    pub startup: Startup,
    pub creator: UserSummary,
    pub participants: Vec<UserSummary>,
    pub tags: Vec<TagRef>,
    pub images: Vec<Image>,
}

impl StartupDetails {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }
}

/// Startup id and name, used in profile listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StartupRef {
    pub id: Uuid,
    pub name: String,
}

impl Startup {
    /// Inserts the startup row and its creator as first participant
    ///
    /// Must run inside a transaction together with the tag and image inserts.
    pub async fn create_with_creator(
        conn: &mut PgConnection,
        name: &str,
        description: &str,
        creator_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO startups (name, description, creator_id) VALUES ($1, $2, $3) RETURNING {}",
            STARTUP_COLUMNS
        );

        let startup = sqlx::query_as::<_, Startup>(&query)
            .bind(name)
            .bind(description)
            .bind(creator_id)
            .fetch_one(&mut *conn)
            .await?;

        Self::add_participant(&mut *conn, startup.id, creator_id).await?;

        Ok(startup)
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM startups WHERE id = $1", STARTUP_COLUMNS);
        sqlx::query_as::<_, Startup>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Locks the startup row for the rest of the transaction
    pub async fn find_by_id_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM startups WHERE id = $1 FOR UPDATE",
            STARTUP_COLUMNS
        );
        sqlx::query_as::<_, Startup>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Updates name and/or description
    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE startups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            STARTUP_COLUMNS
        );

        sqlx::query_as::<_, Startup>(&query)
            .bind(id)
            .bind(name)
            .bind(description)
            .fetch_optional(executor)
            .await
    }

    /// Adds a participant
    ///
    /// # Returns
    ///
    /// True if the user was added, false if already a participant
    pub async fn add_participant<'e>(
        executor: impl PgExecutor<'e>,
        startup_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO startup_participants (startup_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(startup_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_participant<'e>(
        executor: impl PgExecutor<'e>,
        startup_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM startup_participants
                WHERE startup_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(startup_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    pub async fn count_participants<'e>(
        executor: impl PgExecutor<'e>,
        startup_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM startup_participants WHERE startup_id = $1")
            .bind(startup_id)
            .fetch_one(executor)
            .await
    }

    /// Startups a user created, newest first
    pub async fn list_created_by<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Vec<StartupRef>, sqlx::Error> {
        sqlx::query_as::<_, StartupRef>(
            "SELECT id, name FROM startups WHERE creator_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Startups a user participates in (including created ones), newest first
    pub async fn list_participating<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Vec<StartupRef>, sqlx::Error> {
        sqlx::query_as::<_, StartupRef>(
            r#"
            SELECT s.id, s.name
            FROM startup_participants sp
            JOIN startups s ON s.id = sp.startup_id
            WHERE sp.user_id = $1
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Attaches creator, participants, tags and images to a batch of startups
    ///
    /// Issues one query per relation regardless of batch size. The output keeps
    /// the order of `startups`.
    pub async fn load_details(
        conn: &mut PgConnection,
        startups: Vec<Startup>,
    ) -> Result<Vec<StartupDetails>, sqlx::Error> {
        if startups.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = startups.iter().map(|s| s.id).collect();
        let mut creator_ids: Vec<Uuid> = startups.iter().map(|s| s.creator_id).collect();
        creator_ids.sort_unstable();
        creator_ids.dedup();

        let creators: HashMap<Uuid, UserSummary> = User::summaries(&mut *conn, &creator_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut participants: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for row in User::list_participants(&mut *conn, &ids).await? {
            participants
                .entry(row.startup_id)
                .or_default()
                .push(row.into());
        }

        let mut tags: HashMap<Uuid, Vec<TagRef>> = HashMap::new();
        for row in Tag::list_for_startups(&mut *conn, &ids).await? {
            tags.entry(row.owner_id).or_default().push(TagRef {
                id: row.id,
                name: row.name,
            });
        }

        let mut images: HashMap<Uuid, Vec<Image>> = HashMap::new();
        for image in Image::list_for_startups(&mut *conn, &ids).await? {
            images.entry(image.startup_id).or_default().push(image);
        }

        let details = startups
            .into_iter()
            .map(|startup| {
                // creator_id is a NOT NULL foreign key, the summary is always present
                let creator = creators.get(&startup.creator_id).cloned().unwrap_or(UserSummary {
                    id: startup.creator_id,
                    username: None,
                    name: None,
                    image: None,
                });

                StartupDetails {
                    creator,
                    participants: participants.remove(&startup.id).unwrap_or_default(),
                    tags: tags.remove(&startup.id).unwrap_or_default(),
                    images: images.remove(&startup.id).unwrap_or_default(),
                    startup,
                }
            })
            .collect();

        Ok(details)
    }
}
