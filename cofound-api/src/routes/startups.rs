/// Startup endpoints
///
/// # Endpoints
///
/// - `GET /api/startups?page&page_size&search&tags=1,2` - Directory listing
/// - `POST /api/startups` - Create a startup (session)
/// - `GET /api/startups/:id` - One startup with relations
/// - `PATCH /api/startups/:id` - Edit (creator only)
/// - `GET /api/startups/:id/participation` - Caller's participation state (session)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use cofound_shared::auth::middleware::AuthContext;
use cofound_shared::models::startup::StartupDetails;
use cofound_shared::services::{
    directory::{self, DirectoryQuery, Page, DEFAULT_PAGE_SIZE},
    participation::{self, ParticipationState},
    startups::{self, NewStartup, StartupChanges},
    tags::TagInput,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Directory query string
#[derive(Debug, Default, Deserialize)]
pub struct ListStartupsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,

    /// Comma-separated tag ids
    pub tags: Option<String>,
}

/// Parses `"1, 2,3"` into tag ids; blank means no filter
pub fn parse_tag_ids(raw: Option<&str>) -> Result<Vec<i32>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>().map_err(|_| {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: "tags".to_string(),
                    message: format!("Invalid tag id: {}", s),
                }])
            })
        })
        .collect()
}

impl ListStartupsQuery {
    pub fn into_directory_query(self) -> Result<DirectoryQuery, ApiError> {
        Ok(DirectoryQuery {
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            tag_ids: parse_tag_ids(self.tags.as_deref())?,
            search: self.search,
        })
    }
}

/// Create startup request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStartupRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 10, max = 5000, message = "Description must be 10-5000 characters"))]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<TagInput>,

    /// Image URLs in display order
    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 images are allowed"))]
    pub images: Vec<String>,
}

/// Edit startup request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStartupRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 10, max = 5000, message = "Description must be 10-5000 characters"))]
    pub description: Option<String>,

    pub tags: Option<Vec<TagInput>>,
}

/// Participation state response
#[derive(Debug, Serialize, Deserialize)]
pub struct ParticipationResponse {
    pub startup_id: Uuid,
    pub state: ParticipationState,
}

/// Paginated, filtered directory listing
///
/// A page past the end returns an empty `items` list with the totals intact.
pub async fn list_startups(
    State(state): State<AppState>,
    Query(query): Query<ListStartupsQuery>,
) -> ApiResult<Json<Page<StartupDetails>>> {
    let query = query.into_directory_query()?;
    let page = directory::list_startups(&state.db, &query).await?;
    Ok(Json(page))
}

/// Creates a startup with the caller as creator and first participant
pub async fn create_startup(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateStartupRequest>,
) -> ApiResult<(StatusCode, Json<StartupDetails>)> {
    req.validate()?;

    let input = NewStartup {
        name: req.name,
        description: req.description,
        tags: req.tags,
        images: req.images,
    };

    let startup = startups::create_startup(&state.db, auth.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(startup)))
}

pub async fn get_startup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StartupDetails>> {
    Ok(Json(startups::get_startup(&state.db, id).await?))
}

/// Edits a startup
///
/// # Errors
///
/// - `403 Forbidden`: caller is not the creator
/// - `404 Not Found`: no such startup
pub async fn update_startup(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStartupRequest>,
) -> ApiResult<Json<StartupDetails>> {
    req.validate()?;

    let changes = StartupChanges {
        name: req.name,
        description: req.description,
        tags: req.tags,
    };

    Ok(Json(
        startups::update_startup(&state.db, auth.user_id, id, &changes).await?,
    ))
}

/// Caller's state for a startup: `non_member`, `requested` or `participant`
pub async fn participation_state(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ParticipationResponse>> {
    let participation = participation::participation_state(&state.db, auth.user_id, id).await?;

    Ok(Json(ParticipationResponse {
        startup_id: id,
        state: participation,
    }))
}
