use crate::config::AppConfig;
use crate::store::StateStore;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared application state, injected into every connection handler.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<StateStore>,
    /// Notifies connected sessions that the stored document (may have)
    /// changed. Carries no payload: each session re-checks its own
    /// staleness on receipt.
    pub refresh: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(StateStore::new(config.data_path.clone()));
        let (refresh, _rx) = broadcast::channel(16);
        Self {
            config,
            store,
            refresh,
        }
    }
}
