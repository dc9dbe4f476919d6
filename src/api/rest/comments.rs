//! Comment endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{ApiResponse, ApiResult, ViewerParams};
use crate::engagement::{DeletionResult, ThreadSnapshot};
use crate::realtime::AppState;
use crate::service::Notified;
use crate::types::{Comment, CommentId, NewComment};

/// POST /api/comments - A comment or reply was persisted
pub async fn comment_created(
    State(state): State<Arc<AppState>>,
    Json(new_comment): Json<NewComment>,
) -> ApiResult<Notified<Comment>> {
    let notified = state.service.notify_comment_created(new_comment)?;
    Ok(Json(ApiResponse::new(notified, state.current_event_id())))
}

/// DELETE /api/comments/:id - A comment was deleted
pub async fn comment_deleted(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Notified<DeletionResult>> {
    let notified = state.service.notify_comment_deleted(CommentId::new(id))?;
    Ok(Json(ApiResponse::new(notified, state.current_event_id())))
}

/// GET /api/comments/:id/thread - Reply thread snapshot for refetch
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ViewerParams>,
) -> ApiResult<ThreadSnapshot> {
    let event_id = state.current_event_id();
    let snapshot = state
        .ledger()
        .thread_snapshot(&CommentId::new(id), params.actor().as_ref())?;
    Ok(Json(ApiResponse::new(snapshot, event_id)))
}
