//! Engagement Sync
//!
//! Real-time synchronization of engagement state (comments, replies, likes,
//! bookmarks) between the persistence layer and connected clients.
//!
//! # Features
//!
//! - **Topic Subscriptions**: Clients follow `content:<id>` and
//!   `comment:<id>` topics over a WebSocket
//! - **Cascading Deletion**: Deleting a comment removes its replies and
//!   tells every affected subscriber which ids to purge
//! - **Consistent Counters**: Likes and bookmarks are membership sets, so
//!   counts never drift under retries or concurrent toggles
//! - **Client Reconciliation**: A pure cache that merges optimistic updates,
//!   authoritative events and refetch snapshots
//!
//! # Modules
//!
//! - `types`: Core records (Content, Comment, Topic, ids)
//! - `engagement`: Ledger, counter guard and deletion resolver
//! - `realtime`: Subscription registry, broadcaster and WebSocket handler
//! - `service`: Inbound mutation notifications
//! - `client`: Client-side reconciliation cache
//! - `api`: HTTP router
//!
//! # Example
//!
//! ```no_run
//! use engagement_sync::{EngagementService, NewComment, Topic};
//! use engagement_sync::types::Content;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = EngagementService::standalone();
//!     let (conn, mut rx) = service.registry().connect(64);
//!     conn.subscribe(Topic::content("C1")).unwrap();
//!
//!     service.track_content(Content::new("C1", "alice"));
//!     service
//!         .notify_comment_created(NewComment::top_level("K1", "C1", "bob", "hi"))
//!         .unwrap();
//!
//!     let delivery = rx.recv().await.unwrap();
//!     println!("{}", delivery.envelope.event.kind());
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod engagement;
pub mod error;
pub mod logging;
pub mod realtime;
pub mod service;
pub mod types;

// Re-export commonly used items at crate root
pub use client::{OptimisticMutation, ReconciliationCache};
pub use config::SyncConfig;
pub use engagement::EngagementLedger;
pub use error::{Outcome, SyncError, SyncResult};
pub use realtime::{AppState, EventBroadcaster, SubscriptionRegistry, SyncEvent};
pub use service::EngagementService;
pub use types::{ActorId, Comment, CommentId, ContentId, NewComment, Subject, Topic};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
