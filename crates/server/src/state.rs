use std::sync::Arc;
use dossier_core::{
    Config, CreditLedger, DetailCache, SanitizedConfig, TaskCollector, TaskStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    task_store: Arc<dyn TaskStore>,
    ledger: Arc<dyn CreditLedger>,
    cache: Arc<dyn DetailCache>,
    /// Present only when a lookup provider is configured.
    collector: Option<TaskCollector>,
}

impl AppState {
    pub fn new(
        config: Config,
        task_store: Arc<dyn TaskStore>,
        ledger: Arc<dyn CreditLedger>,
        cache: Arc<dyn DetailCache>,
        collector: Option<TaskCollector>,
    ) -> Self {
        Self {
            config,
            task_store,
            ledger,
            cache,
            collector,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn task_store(&self) -> &dyn TaskStore {
        self.task_store.as_ref()
    }

    pub fn ledger(&self) -> &dyn CreditLedger {
        self.ledger.as_ref()
    }

    pub fn cache(&self) -> &dyn DetailCache {
        self.cache.as_ref()
    }

    pub fn collector(&self) -> Option<&TaskCollector> {
        self.collector.as_ref()
    }
}
