//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use super::rest::{comments, contents, reactions};
use crate::engagement::LedgerStats;
use crate::realtime::{handler::ws_handler, AppState};

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(health_check))
        .route("/api/stats", get(get_stats))
        // Inbound notifications and refetch snapshots
        .route("/api/contents", post(contents::track_content))
        .route("/api/contents/:id", get(contents::get_content))
        .route("/api/comments", post(comments::comment_created))
        .route("/api/comments/:id", delete(comments::comment_deleted))
        .route("/api/comments/:id/thread", get(comments::get_thread))
        .route("/api/likes", post(reactions::like_toggled))
        .route("/api/bookmarks", post(reactions::bookmark_toggled))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Response for GET /api/stats
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: usize,
    pub topics: usize,
    #[serde(rename = "lastEventId")]
    pub last_event_id: u64,
    pub ledger: LedgerStats,
}

/// GET /api/stats - Live connection and ledger counts
async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.registry().connection_count(),
        topics: state.registry().topic_count(),
        last_event_id: state.current_event_id(),
        ledger: state.ledger().stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn app() -> Router {
        create_router(Arc::new(AppState::new(SyncConfig::default())))
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_unknown_content_is_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/contents/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
