//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{MatchHandle, MatchRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
    /// The match every new connection joins
    pub default_match: MatchHandle,
}

impl AppState {
    pub fn new(config: Config, default_match: MatchHandle) -> Self {
        let match_registry = Arc::new(MatchRegistry::new());
        match_registry.insert(default_match.clone());

        Self {
            config: Arc::new(config),
            match_registry,
            default_match,
        }
    }
}
