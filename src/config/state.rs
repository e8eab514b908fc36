// Application state module
// Holds the configuration plus the collaborators handlers run against

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::greeter::GreeterNamespace;
use crate::store::ObjectStore;

use super::types::Config;

/// Application state shared by every connection.
///
/// The store and the greeter namespace are injected at construction, so
/// tests and alternative deployments can swap either without touching the
/// handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub greeters: GreeterNamespace,

    // Cached config values for fast access on the request path
    cached_access_log: AtomicBool,
}

impl AppState {
    /// Create `AppState` around the injected collaborators
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, greeters: GreeterNamespace) -> Self {
        let cached_access_log = AtomicBool::new(config.logging.access_log);
        Self {
            config,
            store,
            greeters,
            cached_access_log,
        }
    }

    /// Whether access logging is enabled
    pub fn access_log_enabled(&self) -> bool {
        self.cached_access_log.load(Ordering::Relaxed)
    }
}
