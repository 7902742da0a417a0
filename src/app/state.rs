//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::lobby::LobbyHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: LobbyHandle,
}

impl AppState {
    pub fn new(config: Config, lobby: LobbyHandle) -> Self {
        Self {
            config: Arc::new(config),
            lobby,
        }
    }
}
