//! Realtime fan-out over WebSocket
//!
//! Provides the WebSocket endpoint at `/ws` and the machinery behind it.
//!
//! ## Features
//! - Topic subscriptions (`content:<id>`, `comment:<id>`) per connection
//! - One immutable event per mutation, delivered to every affected topic
//! - Automatic unsubscribe on connection close
//! - Lag detection: clients that fall behind are told to refetch

pub mod broadcaster;
pub mod events;
pub mod handler;
pub mod registry;
pub mod state;

pub use broadcaster::{DeliveryReport, DispatchReport, EventBroadcaster};
pub use events::{ClientMessage, DeliveredEvent, EventEnvelope, ServerMessage, SyncEvent};
pub use registry::{ConnectionGuard, Delivery, SubscriptionRegistry};
pub use state::AppState;
