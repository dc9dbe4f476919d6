//! API module for HTTP and WebSocket endpoints
//!
//! This module exposes the inbound notification API, refetch snapshots and
//! the `/ws` realtime endpoint.

pub mod http;
pub mod rest;

pub use http::create_router;
