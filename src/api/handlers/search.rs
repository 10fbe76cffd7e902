use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::manager_error;
use crate::api::response::{ApiError, AppQuery, CallerId, JSend};
use crate::search_index::SearchHit;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// Free-text search across indexed documents, filtered to files the caller
/// is a member of.
/// Route: GET /search?q=...
pub async fn search(
    State(state): State<Arc<AppState>>,
    CallerId(caller_id): CallerId,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<JSend<Vec<SearchHit>>>, ApiError> {
    let hits = state
        .manager
        .search(&caller_id, &params.q)
        .await
        .map_err(manager_error)?;

    Ok(JSend::success(hits))
}
