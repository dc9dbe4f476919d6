//! Like and bookmark endpoints

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use super::{ApiError, ApiResponse, ApiResult};
use crate::engagement::{BookmarkState, LikeState};
use crate::realtime::AppState;
use crate::service::Notified;
use crate::types::{ActorId, ContentId, Subject, SubjectType};

/// Body for POST /api/likes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub actor_id: String,
    /// Desired state; omitted means flip
    #[serde(default)]
    pub liked: Option<bool>,
}

/// Body for POST /api/bookmarks
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRequest {
    pub content_id: String,
    pub actor_id: String,
    /// Desired state; omitted means flip
    #[serde(default)]
    pub bookmarked: Option<bool>,
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// POST /api/likes - A like was toggled
pub async fn like_toggled(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LikeRequest>,
) -> ApiResult<Notified<LikeState>> {
    require("subjectId", &req.subject_id)?;
    require("actorId", &req.actor_id)?;

    let subject = Subject::from_parts(req.subject_type, req.subject_id);
    let notified = state
        .service
        .notify_like_toggled(subject, ActorId::new(req.actor_id), req.liked)?;
    Ok(Json(ApiResponse::new(notified, state.current_event_id())))
}

/// POST /api/bookmarks - A bookmark was toggled
pub async fn bookmark_toggled(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookmarkRequest>,
) -> ApiResult<Notified<BookmarkState>> {
    require("contentId", &req.content_id)?;
    require("actorId", &req.actor_id)?;

    let notified = state.service.notify_bookmark_toggled(
        ContentId::new(req.content_id),
        ActorId::new(req.actor_id),
        req.bookmarked,
    )?;
    Ok(Json(ApiResponse::new(notified, state.current_event_id())))
}
