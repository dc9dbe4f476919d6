//! Shared application state

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::engagement::EngagementLedger;
use crate::service::EngagementService;

use super::broadcaster::EventBroadcaster;
use super::registry::SubscriptionRegistry;

/// Shared application state for HTTP handlers and socket tasks
pub struct AppState {
    pub service: EngagementService,
    pub config: SyncConfig,
}

impl AppState {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            service: EngagementService::standalone(),
            config,
        }
    }

    pub fn with_service(service: EngagementService, config: SyncConfig) -> Self {
        Self { service, config }
    }

    pub fn ledger(&self) -> &Arc<EngagementLedger> {
        self.service.ledger()
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.service.registry()
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        self.service.broadcaster()
    }

    /// Id of the last issued event, returned with snapshots
    pub fn current_event_id(&self) -> u64 {
        self.broadcaster().current_event_id()
    }
}
