/// Tag autocompletion
///
/// ```text
/// GET /api/tags?q=ru&limit=20
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use cofound_shared::models::tag::Tag;
use cofound_shared::services::tags;
use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct TagSearchQuery {
    /// Name prefix, case-insensitive; empty lists tags alphabetically
    #[serde(default)]
    pub q: String,

    pub limit: Option<i64>,
}

pub async fn search_tags(
    State(state): State<AppState>,
    Query(query): Query<TagSearchQuery>,
) -> ApiResult<Json<Vec<Tag>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(tags::search(&state.db, &query.q, limit).await?))
}
