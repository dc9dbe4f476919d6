//! REST API module for HTTP endpoints
//!
//! Inbound notifications from the persistence layer and snapshot reads for
//! client refetch:
//! - `POST /api/contents` - Track a content item
//! - `GET /api/contents/:id` - Content topic snapshot
//! - `POST /api/comments` - Comment or reply created
//! - `DELETE /api/comments/:id` - Comment deleted (cascades to replies)
//! - `GET /api/comments/:id/thread` - Reply thread snapshot
//! - `POST /api/likes` - Like toggled
//! - `POST /api/bookmarks` - Bookmark toggled

pub mod comments;
pub mod contents;
pub mod reactions;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::ActorId;

/// Optional viewer for snapshot reads
#[derive(Debug, Deserialize)]
pub struct ViewerParams {
    pub viewer: Option<String>,
}

impl ViewerParams {
    pub fn actor(&self) -> Option<ActorId> {
        self.viewer
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(ActorId::from)
    }
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Last event id issued when the response was built
    #[serde(rename = "lastEventId")]
    pub event_id: u64,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, event_id: u64) -> Self {
        Self { data, event_id }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
            code: "BAD_REQUEST".to_string(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        let status = match &e {
            SyncError::NotFound { .. } => StatusCode::NOT_FOUND,
            SyncError::ParentDeleted(_) => StatusCode::CONFLICT,
            SyncError::NestedReply(_)
            | SyncError::ContentMismatch { .. }
            | SyncError::InvalidTopic(_)
            | SyncError::EmptyReply => StatusCode::BAD_REQUEST,
            SyncError::ReplyInFlight(_) | SyncError::StaleSnapshot { .. } => StatusCode::CONFLICT,
            SyncError::DeliveryFailure(_)
            | SyncError::UnknownConnection(_)
            | SyncError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            error: e.to_string(),
            code: e.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
