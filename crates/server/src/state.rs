use std::sync::Arc;

use packer_core::{AuditHandle, AuditStore, Config, PackingService, SanitizedConfig, StockStore};

/// Shared application state
pub struct AppState {
    config: Config,
    packing: PackingService,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        packing: PackingService,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            packing,
            audit,
            audit_store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn packing(&self) -> &PackingService {
        &self.packing
    }

    /// The stock store the packing service runs against.
    pub fn stock(&self) -> &dyn StockStore {
        self.packing.store().as_ref()
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }
}
