use std::sync::Arc;
use validator::Validate;

use crate::models::history::{HistoryEntry, HistoryQuery};
use crate::models::vehicle_state::VehicleState;
use crate::repositories::telemetry_repository::TelemetryStore;
use crate::utils::errors::{not_found_error, AppError, AppResult};

/// Lecturas sobre el estado persistido de la flota
pub struct TelemetryController {
    store: Arc<dyn TelemetryStore>,
}

impl TelemetryController {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    pub async fn list_vehicles(&self) -> AppResult<Vec<VehicleState>> {
        self.store.list_states().await
    }

    pub async fn get_vehicle(&self, vehicle_id: &str) -> AppResult<VehicleState> {
        self.store
            .find_state(vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", vehicle_id))
    }

    pub async fn latest_telemetry(&self, vehicle_id: &str) -> AppResult<HistoryEntry> {
        self.store
            .latest_history(vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Telemetry for vehicle", vehicle_id))
    }

    pub async fn history(&self, vehicle_id: &str, query: HistoryQuery) -> AppResult<Vec<HistoryEntry>> {
        query.validate()?;

        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::BadRequest("`from` must not be later than `to`".to_string()));
            }
        }

        // 404 solo si el vehículo no existe; sin muestras es una lista vacía
        if self.store.find_state(vehicle_id).await?.is_none() {
            return Err(not_found_error("Vehicle", vehicle_id));
        }
        self.store.query_history(vehicle_id, &query).await
    }
}
