//! Client-side reconciliation
//!
//! Keeps a per-actor read cache of watched topics consistent with the
//! server: optimistic local changes, authoritative events arriving through
//! one or two topics in any order, and full snapshots after a reconnect.

pub mod cache;
pub mod composer;
pub mod mutation;
pub mod views;

pub use cache::{ReconciliationCache, Reconciled, RefetchRequest};
pub use composer::{ComposerState, ReplyComposer, ReplyDraft};
pub use mutation::OptimisticMutation;
pub use views::{ContentView, ThreadView};
