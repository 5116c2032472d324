//! IgnitionLab Desktop Library
//!
//! Session lifecycle and REST access for the IgnitionLab Dynamics workshop
//! backend.

pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod guard;
pub mod logging;
pub mod models;
pub mod resources;
pub mod storage;

use std::sync::Arc;

use api::{ApiClient, ApiError};
use auth::SessionController;
use config::Config;
use resources::Workshop;
use storage::{KeyValueStore, SecureStorage, TokenStore};

/// Application state shared across commands
pub struct AppState {
    pub config: Config,
    pub session: Arc<SessionController>,
    pub workshop: Workshop,
}

impl AppState {
    /// State backed by on-disk storage under the configured data directory.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let storage = SecureStorage::new(config.data_dir.clone());
        Self::with_storage(config, Arc::new(storage))
    }

    pub fn with_storage(config: Config, storage: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let api = Arc::new(ApiClient::new(&config.api_base_url, config.request_timeout)?);
        let session = Arc::new(SessionController::new(TokenStore::new(storage), api));
        let workshop = Workshop::new(session.clone());

        Ok(Self {
            config,
            session,
            workshop,
        })
    }
}
