/// User profile endpoints
///
/// # Endpoints
///
/// - `GET /api/users/me` - Caller's profile (session)
/// - `PATCH /api/users/me` - Edit caller's profile (session)
/// - `PUT /api/users/me/tags` - Replace caller's skill tags (session)
/// - `GET /api/users/:id` - Public profile by id
/// - `GET /api/users/by-username/:username` - Public profile by username

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use cofound_shared::auth::middleware::AuthContext;
use cofound_shared::models::tag::TagRef;
use cofound_shared::services::{
    profiles::{self, Profile, ProfileChanges},
    tags::TagInput,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag replacement body
#[derive(Debug, Deserialize)]
pub struct ReplaceTagsRequest {
    pub tags: Vec<TagInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: Vec<TagRef>,
}

pub async fn get_me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Profile>> {
    Ok(Json(profiles::get_profile(&state.db, auth.user_id).await?))
}

/// Edits the caller's profile
///
/// Omitted fields are left alone; an empty string clears a field.
///
/// # Errors
///
/// - `409 Conflict`: username taken
/// - `422 Unprocessable Entity`: invalid username or over-long text
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(changes): Json<ProfileChanges>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(
        profiles::update_profile(&state.db, auth.user_id, changes).await?,
    ))
}

/// Replaces the caller's skill tags, creating unknown names
pub async fn replace_my_tags(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ReplaceTagsRequest>,
) -> ApiResult<Json<TagsResponse>> {
    let tags = profiles::update_user_tags(&state.db, auth.user_id, &req.tags).await?;
    Ok(Json(TagsResponse { tags }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(profiles::get_profile(&state.db, id).await?))
}

pub async fn get_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(
        profiles::get_profile_by_username(&state.db, &username).await?,
    ))
}
