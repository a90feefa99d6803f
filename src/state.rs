//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::clients::telematics_client::TelematicsApi;
use crate::config::environment::EnvironmentConfig;
use crate::repositories::telemetry_repository::TelemetryStore;
use crate::services::ingestion_service::IngestionService;
use crate::services::sync_service::SyncService;
use crate::services::token_manager::TokenManager;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub store: Arc<dyn TelemetryStore>,
    pub sync: Arc<SyncService>,
    pub ingestion: Arc<IngestionService>,
}

impl AppState {
    /// Construir los servicios sobre un proveedor y un store ya creados
    pub fn new(config: EnvironmentConfig, api: Arc<dyn TelematicsApi>, store: Arc<dyn TelemetryStore>) -> Self {
        let tokens = Arc::new(TokenManager::new(config.provider.credentials.clone()));
        let sync = Arc::new(SyncService::new(
            api,
            tokens,
            store.clone(),
            &config.provider,
            config.sync.clone(),
        ));
        let ingestion = Arc::new(IngestionService::new(
            store.clone(),
            config.provider.utc_offset_minutes,
            config.sync.history_retention,
        ));

        Self {
            config: Arc::new(config),
            store,
            sync,
            ingestion,
        }
    }
}
