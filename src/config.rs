//! Server configuration from environment variables
//!
//! Environment:
//! - ENGAGE_BIND_ADDR: Socket address to listen on (optional, default 127.0.0.1:3030)
//! - ENGAGE_OUTBOUND_CAPACITY: Per-connection outbound queue length (optional, default 256)
//! - ENGAGE_LOG: Fallback log filter when RUST_LOG is unset (optional, default "info")

use std::net::SocketAddr;

use crate::error::{SyncError, SyncResult};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub bind_addr: SocketAddr,
    /// Deliveries buffered per connection before it is marked lagged
    pub outbound_capacity: usize,
    pub log_filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create from process environment variables
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("ENGAGE_BIND_ADDR") {
            config.bind_addr = addr.trim().parse().map_err(|e| {
                SyncError::Config(format!("ENGAGE_BIND_ADDR '{}' is invalid: {}", addr, e))
            })?;
        }

        if let Some(capacity) = lookup("ENGAGE_OUTBOUND_CAPACITY") {
            config.outbound_capacity = match capacity.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(SyncError::Config(format!(
                        "ENGAGE_OUTBOUND_CAPACITY must be a positive integer, got '{}'",
                        capacity
                    )))
                }
            };
        }

        if let Some(filter) = lookup("ENGAGE_LOG") {
            if !filter.trim().is_empty() {
                config.log_filter = filter.trim().to_string();
            }
        }

        Ok(config)
    }
}
