use std::sync::Arc;
use tracing::info;

use crate::command::{CommandRunner, SystemRunner};
use crate::config::Config;
use crate::session::SessionStore;

/// Centralized application state container for the HTTP endpoint
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub runner: Arc<dyn CommandRunner>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        info!("Initializing application state");
        let runner = Arc::new(SystemRunner::new(config.commands.timeout));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        let sessions = Arc::new(SessionStore::new(config.server.session_ttl));
        Self {
            config,
            runner,
            sessions,
        }
    }
}
