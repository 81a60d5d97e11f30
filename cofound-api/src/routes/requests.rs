/// Participation request endpoints
///
/// # Endpoints
///
/// - `POST /api/startups/:id/requests` - Ask to join a startup
/// - `POST /api/startups/:id/requests/:request_id/accept` - Creator accepts
/// - `POST /api/startups/:id/requests/:request_id/reject` - Creator rejects
/// - `GET /api/requests` - Caller's incoming and outgoing requests
///
/// Accept and reject answer `{"success": true}` or a 400 `{"error": "..."}`
/// carrying the reason.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use cofound_shared::auth::middleware::AuthContext;
use cofound_shared::models::participation_request::ParticipationRequest;
use cofound_shared::services::participation::{self, UserRequests};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request to join a startup
#[derive(Debug, Deserialize, Validate)]
pub struct CreateParticipationRequest {
    #[validate(length(min = 1, max = 1000, message = "Message must be 1-1000 characters"))]
    pub message: String,
}

/// Result of an accept or reject
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub success: bool,
}

impl ActionResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Submits a participation request for the caller
///
/// # Errors
///
/// - `404 Not Found`: no such startup
/// - `409 Conflict`: caller created the startup, already participates, or
///   already has a pending request
pub async fn create_request(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(startup_id): Path<Uuid>,
    Json(req): Json<CreateParticipationRequest>,
) -> ApiResult<(StatusCode, Json<ParticipationRequest>)> {
    req.validate()?;

    let request =
        participation::request_to_participate(&state.db, auth.user_id, startup_id, &req.message)
            .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// Accepts a request; the requester joins the startup
pub async fn accept_request(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((startup_id, request_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ActionResponse>> {
    participation::accept_request(&state.db, auth.user_id, startup_id, request_id)
        .await
        .map_err(ApiError::action)?;

    Ok(ActionResponse::ok())
}

/// Rejects a request without changing the participants
pub async fn reject_request(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((startup_id, request_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ActionResponse>> {
    participation::reject_request(&state.db, auth.user_id, startup_id, request_id)
        .await
        .map_err(ApiError::action)?;

    Ok(ActionResponse::ok())
}

pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<UserRequests>> {
    Ok(Json(
        participation::list_requests_for_user(&state.db, auth.user_id).await?,
    ))
}
