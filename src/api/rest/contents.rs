//! Content endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{ApiResponse, ApiResult, ViewerParams};
use crate::engagement::ContentSnapshot;
use crate::error::Outcome;
use crate::realtime::AppState;
use crate::types::{Content, ContentId};

/// POST /api/contents - Start tracking a content item
pub async fn track_content(
    State(state): State<Arc<AppState>>,
    Json(content): Json<Content>,
) -> ApiResult<Outcome> {
    let outcome = state.service.track_content(content);
    Ok(Json(ApiResponse::new(outcome, state.current_event_id())))
}

/// GET /api/contents/:id - Content snapshot for refetch
///
/// Returns the content with its top-level comments. `asOf` inside the
/// snapshot tells the client which events it already reflects.
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ViewerParams>,
) -> ApiResult<ContentSnapshot> {
    let event_id = state.current_event_id();
    let snapshot = state
        .ledger()
        .content_snapshot(&ContentId::new(id), params.actor().as_ref())?;
    Ok(Json(ApiResponse::new(snapshot, event_id)))
}
