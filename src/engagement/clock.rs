//! Event id allocation
//!
//! Ids are drawn inside the critical section that produced an event's
//! counter values. For any single counter, a larger event id therefore
//! always carries a newer value, which lets clients drop stale overwrites
//! that arrive late through another topic.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EventClock {
    last: AtomicU64,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next event id (first id is 1)
    pub fn tick(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last allocated id, 0 before the first tick
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
