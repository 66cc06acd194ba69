//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{Arena, ArenaHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
}

impl AppState {
    /// Build state and the arena task that backs it; the caller spawns `Arena::run`
    pub fn new(config: Config) -> (Self, Arena) {
        let (arena, handle) = Arena::new(config.arena.clone());

        let state = Self {
            config: Arc::new(config),
            arena: handle,
        };

        (state, arena)
    }
}
