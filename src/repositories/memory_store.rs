//! Store en memoria
//!
//! Implementación de `TelemetryStore` sobre mapas protegidos por `RwLock`.
//! El binario usa PostgreSQL; esta implementación sirve para los tests del
//! motor de sincronización y de los endpoints.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::telemetry_repository::TelemetryStore;
use crate::models::history::{retain_sample, select_history, HistoryEntry, HistoryQuery};
use crate::models::vehicle_state::VehicleState;
use crate::utils::errors::AppError;

#[derive(Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<String, VehicleState>>,
    history: RwLock<HashMap<String, Vec<HistoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn history_len(&self, vehicle_id: &str) -> usize {
        self.history.read().await.get(vehicle_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn upsert_state(&self, state: &VehicleState) -> Result<(), AppError> {
        self.states
            .write()
            .await
            .insert(state.vehicle_id.clone(), state.clone());
        Ok(())
    }

    async fn find_state(&self, vehicle_id: &str) -> Result<Option<VehicleState>, AppError> {
        Ok(self.states.read().await.get(vehicle_id).cloned())
    }

    async fn list_states(&self) -> Result<Vec<VehicleState>, AppError> {
        let mut states: Vec<_> = self.states.read().await.values().cloned().collect();
        states.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        Ok(states)
    }

    async fn count_states(&self) -> Result<i64, AppError> {
        Ok(self.states.read().await.len() as i64)
    }

    async fn append_history(&self, vehicle_id: &str, entry: &HistoryEntry, cap: usize) -> Result<bool, AppError> {
        let mut history = self.history.write().await;
        let entries = history.entry(vehicle_id.to_string()).or_default();
        Ok(retain_sample(entries, entry.clone(), cap.max(1)))
    }

    async fn latest_history(&self, vehicle_id: &str) -> Result<Option<HistoryEntry>, AppError> {
        Ok(self
            .history
            .read()
            .await
            .get(vehicle_id)
            .and_then(|entries| entries.first().cloned()))
    }

    async fn query_history(&self, vehicle_id: &str, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, AppError> {
        Ok(self
            .history
            .read()
            .await
            .get(vehicle_id)
            .map(|entries| select_history(entries, query))
            .unwrap_or_default())
    }
}
