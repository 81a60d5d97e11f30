/// Participation request model and database operations
///
/// A participation request is a pending ask by a non-member to join a
/// startup. A row exists only while the request is pending: accepting or
/// rejecting consumes it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE participation_requests (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     startup_id UUID NOT NULL REFERENCES startups(id) ON DELETE CASCADE,
///     message TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT participation_requests_user_startup_key UNIQUE (user_id, startup_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

/// Unique constraint guarding one pending request per (user, startup)
pub const USER_STARTUP_CONSTRAINT: &str = "participation_requests_user_startup_key";

const REQUEST_COLUMNS: &str = "id, user_id, startup_id, message, created_at";

/// Pending participation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipationRequest {
    pub id: Uuid,

    /// Requesting user
    pub user_id: Uuid,

    /// Target startup
    pub startup_id: Uuid,

    pub message: String,

    pub created_at: DateTime<Utc>,
}

/// Request joined with the display data of its startup, requester and creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipationRequestView {
    pub id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,

    pub startup_id: Uuid,
    pub startup_name: String,

    pub requester_id: Uuid,
    pub requester_name: Option<String>,
    pub requester_username: Option<String>,
    pub requester_image: Option<String>,

    pub creator_id: Uuid,
    pub creator_name: Option<String>,
    pub creator_username: Option<String>,
}

/// A request removed by its startup's creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ConsumedRequest {
    pub user_id: Uuid,
    pub startup_id: Uuid,
}

/// Who may act on a request, looked up after a conditional delete matched nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct RequestOwnership {
    pub startup_id: Uuid,
    pub creator_id: Uuid,
}

const VIEW_SELECT: &str = r#"
    SELECT r.id, r.message, r.created_at,
           s.id AS startup_id, s.name AS startup_name,
           ru.id AS requester_id, ru.name AS requester_name,
           ru.username AS requester_username, ru.image AS requester_image,
           cu.id AS creator_id, cu.name AS creator_name, cu.username AS creator_username
    FROM participation_requests r
    JOIN startups s ON s.id = r.startup_id
    JOIN users ru ON ru.id = r.user_id
    JOIN users cu ON cu.id = s.creator_id
"#;

impl ParticipationRequest {
    /// Inserts a pending request
    ///
    /// # Errors
    ///
    /// Returns a unique violation on [`USER_STARTUP_CONSTRAINT`] if the user
    /// already has a pending request for this startup
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        startup_id: Uuid,
        message: &str,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO participation_requests (user_id, startup_id, message) VALUES ($1, $2, $3) RETURNING {}",
            REQUEST_COLUMNS
        );

        sqlx::query_as::<_, ParticipationRequest>(&query)
            .bind(user_id)
            .bind(startup_id)
            .bind(message)
            .fetch_one(executor)
            .await
    }

    /// Pending request of a user for a startup
    pub async fn find_pending<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        startup_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM participation_requests WHERE user_id = $1 AND startup_id = $2",
            REQUEST_COLUMNS
        );
        sqlx::query_as::<_, ParticipationRequest>(&query)
            .bind(user_id)
            .bind(startup_id)
            .fetch_optional(executor)
            .await
    }

    /// Deletes a request if `creator_id` created its startup and it targets `startup_id`
    ///
    /// Ownership check and delete happen in one statement, so of two
    /// concurrent calls for the same request exactly one gets `Some`.
    pub async fn consume_as_creator(
        conn: &mut PgConnection,
        id: Uuid,
        startup_id: Uuid,
        creator_id: Uuid,
    ) -> Result<Option<ConsumedRequest>, sqlx::Error> {
        sqlx::query_as::<_, ConsumedRequest>(
            r#"
            DELETE FROM participation_requests r
            USING startups s
            WHERE r.id = $1
              AND r.startup_id = $2
              AND s.id = r.startup_id
              AND s.creator_id = $3
            RETURNING r.user_id, r.startup_id
            "#,
        )
        .bind(id)
        .bind(startup_id)
        .bind(creator_id)
        .fetch_optional(conn)
        .await
    }

    /// Startup and creator of a request, if the request still exists
    pub async fn ownership<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<RequestOwnership>, sqlx::Error> {
        sqlx::query_as::<_, RequestOwnership>(
            r#"
            SELECT s.id AS startup_id, s.creator_id
            FROM participation_requests r
            JOIN startups s ON s.id = r.startup_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Requests targeting startups created by `user_id`, newest first
    pub async fn list_incoming<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Vec<ParticipationRequestView>, sqlx::Error> {
        let query = format!(
            "{} WHERE s.creator_id = $1 ORDER BY r.created_at DESC, r.id DESC",
            VIEW_SELECT
        );
        sqlx::query_as::<_, ParticipationRequestView>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Requests submitted by `user_id`, newest first
    pub async fn list_outgoing<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Vec<ParticipationRequestView>, sqlx::Error> {
        let query = format!(
            "{} WHERE r.user_id = $1 ORDER BY r.created_at DESC, r.id DESC",
            VIEW_SELECT
        );
        sqlx::query_as::<_, ParticipationRequestView>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }
}
