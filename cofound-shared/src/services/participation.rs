/// Participation request workflow
///
/// Per (user, startup) pair the workflow moves between three states:
///
/// ```text
///              request_to_participate            accept_request
/// NonMember ───────────────────────────▶ Requested ──────────────▶ Participant
///     ▲                                      │
///     └──────────── reject_request ──────────┘
/// ```
///
/// Creating a startup puts its creator straight into `Participant`.
/// A rejected user is back in `NonMember` and may ask again.
///
/// Every operation takes the acting user explicitly and re-validates its
/// preconditions on the server, inside a transaction.
///
/// # Example
///
/// ```no_run
/// use cofound_shared::services::participation;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, alice: Uuid, bob: Uuid, startup_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let request = participation::request_to_participate(&pool, bob, startup_id, "hi").await?;
/// participation::accept_request(&pool, alice, startup_id, request.id).await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{unique_violation, ServiceError, ServiceResult};
use crate::models::participation_request::{
    ParticipationRequest, ParticipationRequestView, USER_STARTUP_CONSTRAINT,
};
use crate::models::startup::Startup;

/// Longest accepted request message
pub const MESSAGE_MAX_LENGTH: usize = 1000;

/// Where a user stands with respect to one startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationState {
    /// Neither participant nor pending request
    NonMember,

    /// A request is pending
    Requested,

    /// In the participant set (by creation or acceptance)
    Participant,
}

impl ParticipationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationState::NonMember => "non_member",
            ParticipationState::Requested => "requested",
            ParticipationState::Participant => "participant",
        }
    }

    /// Derives the state from membership facts
    pub fn from_facts(is_participant: bool, has_pending_request: bool) -> Self {
        if is_participant {
            ParticipationState::Participant
        } else if has_pending_request {
            ParticipationState::Requested
        } else {
            ParticipationState::NonMember
        }
    }
}

/// Requests visible to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequests {
    /// Requests for startups the user created
    pub incoming: Vec<ParticipationRequestView>,

    /// Requests the user submitted
    pub outgoing: Vec<ParticipationRequestView>,
}

/// Outcome of an accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub user_id: Uuid,
    pub startup_id: Uuid,

    /// False when the user was already a participant
    pub added: bool,
}

/// Checks the preconditions for submitting a request
///
/// The creator check comes first so a creator always gets the same answer,
/// even though the creator is also a participant.
pub fn check_can_request(
    actor_id: Uuid,
    startup: &Startup,
    state: ParticipationState,
) -> ServiceResult<()> {
    if startup.creator_id == actor_id {
        return Err(ServiceError::invalid_state(
            "Creators cannot request to join their own startup",
        ));
    }

    match state {
        ParticipationState::NonMember => Ok(()),
        ParticipationState::Participant => Err(ServiceError::invalid_state(
            "Already a participant of this startup",
        )),
        ParticipationState::Requested => Err(ServiceError::invalid_state(
            "A request to join this startup is already pending",
        )),
    }
}

/// Trims and bounds a request message
pub fn normalize_message(message: &str) -> ServiceResult<String> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ServiceError::validation("message", "Message must not be empty"));
    }
    if message.chars().count() > MESSAGE_MAX_LENGTH {
        return Err(ServiceError::validation(
            "message",
            format!("Message must be at most {} characters", MESSAGE_MAX_LENGTH),
        ));
    }
    Ok(message.to_string())
}

/// Current state of `user_id` for `startup_id`
///
/// # Errors
///
/// `NotFound` if the startup does not exist
pub async fn participation_state(
    pool: &PgPool,
    user_id: Uuid,
    startup_id: Uuid,
) -> ServiceResult<ParticipationState> {
    if Startup::find_by_id(pool, startup_id).await?.is_none() {
        return Err(ServiceError::not_found("Startup not found"));
    }

    let is_participant = Startup::is_participant(pool, startup_id, user_id).await?;
    let pending = ParticipationRequest::find_pending(pool, user_id, startup_id).await?;

    Ok(ParticipationState::from_facts(is_participant, pending.is_some()))
}

/// Submits a request by `actor_id` to join `startup_id`
///
/// # Errors
///
/// - `Validation` for an empty or over-long message
/// - `NotFound` if the startup does not exist
/// - `InvalidState` if the actor created the startup, already participates,
///   or already has a pending request
pub async fn request_to_participate(
    pool: &PgPool,
    actor_id: Uuid,
    startup_id: Uuid,
    message: &str,
) -> ServiceResult<ParticipationRequest> {
    let message = normalize_message(message)?;

    let mut tx = pool.begin().await?;

    // Serializes against concurrent accepts on the same startup
    let startup = Startup::find_by_id_for_update(&mut tx, startup_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Startup not found"))?;

    let is_participant = Startup::is_participant(&mut *tx, startup_id, actor_id).await?;
    let pending = ParticipationRequest::find_pending(&mut *tx, actor_id, startup_id).await?;
    check_can_request(
        actor_id,
        &startup,
        ParticipationState::from_facts(is_participant, pending.is_some()),
    )?;

    let request = ParticipationRequest::create(&mut *tx, actor_id, startup_id, &message)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(constraint) if constraint == USER_STARTUP_CONSTRAINT => {
                ServiceError::invalid_state("A request to join this startup is already pending")
            }
            _ => ServiceError::from(e),
        })?;

    tx.commit().await?;

    info!(
        request_id = %request.id,
        user_id = %actor_id,
        startup_id = %startup_id,
        "Participation request created"
    );

    Ok(request)
}

/// Resolves why a conditional delete matched nothing
async fn explain_missing_request(
    pool: &PgPool,
    actor_id: Uuid,
    startup_id: Uuid,
    request_id: Uuid,
) -> ServiceError {
    match ParticipationRequest::ownership(pool, request_id).await {
        Ok(Some(owner)) if owner.startup_id != startup_id => {
            ServiceError::not_found("Request not found for this startup")
        }
        Ok(Some(owner)) if owner.creator_id != actor_id => {
            warn!(
                request_id = %request_id,
                actor_id = %actor_id,
                "Rejected attempt to resolve a request for someone else's startup"
            );
            ServiceError::forbidden("Only the startup's creator can resolve requests")
        }
        Ok(_) => ServiceError::not_found("Request not found"),
        Err(e) => ServiceError::from(e),
    }
}

/// Accepts a pending request
///
/// In one transaction: deletes the request if `actor_id` created the startup,
/// then adds the requester to the participant set. An existing participation
/// counts as success.
///
/// # Errors
///
/// - `NotFound` if the request does not exist (or was already resolved),
///   or belongs to another startup
/// - `Forbidden` if the actor did not create the startup
pub async fn accept_request(
    pool: &PgPool,
    actor_id: Uuid,
    startup_id: Uuid,
    request_id: Uuid,
) -> ServiceResult<AcceptOutcome> {
    let mut tx = pool.begin().await?;

    let consumed =
        ParticipationRequest::consume_as_creator(&mut tx, request_id, startup_id, actor_id).await?;

    let Some(consumed) = consumed else {
        tx.rollback().await?;
        return Err(explain_missing_request(pool, actor_id, startup_id, request_id).await);
    };

    let added = Startup::add_participant(&mut *tx, consumed.startup_id, consumed.user_id).await?;
    tx.commit().await?;

    if added {
        info!(
            request_id = %request_id,
            user_id = %consumed.user_id,
            startup_id = %consumed.startup_id,
            "Participation request accepted"
        );
    } else {
        debug!(
            request_id = %request_id,
            user_id = %consumed.user_id,
            "Request accepted for a user who already participates"
        );
    }

    Ok(AcceptOutcome {
        user_id: consumed.user_id,
        startup_id: consumed.startup_id,
        added,
    })
}

/// Rejects a pending request
///
/// Deletes the request without touching the participant set.
///
/// # Errors
///
/// Same as [`accept_request`]
pub async fn reject_request(
    pool: &PgPool,
    actor_id: Uuid,
    startup_id: Uuid,
    request_id: Uuid,
) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    let consumed =
        ParticipationRequest::consume_as_creator(&mut tx, request_id, startup_id, actor_id).await?;

    if consumed.is_none() {
        tx.rollback().await?;
        return Err(explain_missing_request(pool, actor_id, startup_id, request_id).await);
    }

    tx.commit().await?;

    info!(request_id = %request_id, startup_id = %startup_id, "Participation request rejected");
    Ok(())
}

/// Incoming and outgoing requests of a user, newest first
pub async fn list_requests_for_user(pool: &PgPool, user_id: Uuid) -> ServiceResult<UserRequests> {
    let incoming = ParticipationRequest::list_incoming(pool, user_id).await?;
    let outgoing = ParticipationRequest::list_outgoing(pool, user_id).await?;

    debug!(
        user_id = %user_id,
        incoming = incoming.len(),
        outgoing = outgoing.len(),
        "Listed participation requests"
    );

    Ok(UserRequests { incoming, outgoing })
}
