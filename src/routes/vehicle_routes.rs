use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::controllers::telemetry_controller::TelemetryController;
use crate::models::history::{HistoryEntry, HistoryQuery};
use crate::models::vehicle_state::VehicleState;
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, AppError};

pub fn create_vehicle_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_vehicles))
        .route("/:id", get(get_vehicle))
        .route("/:id/telemetry/latest", get(latest_telemetry))
        .route("/:id/history", get(vehicle_history))
}

async fn list_vehicles(State(state): State<AppState>) -> Result<Json<Vec<VehicleState>>, AppError> {
    let controller = TelemetryController::new(state.store.clone());
    Ok(Json(controller.list_vehicles().await?))
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VehicleState>, AppError> {
    let controller = TelemetryController::new(state.store.clone());
    Ok(Json(controller.get_vehicle(id.trim()).await?))
}

async fn latest_telemetry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntry>, AppError> {
    let controller = TelemetryController::new(state.store.clone());
    Ok(Json(controller.latest_telemetry(id.trim()).await?))
}

async fn vehicle_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let Query(query) = query.map_err(|e| bad_request_error(&e.body_text()))?;
    let controller = TelemetryController::new(state.store.clone());
    Ok(Json(controller.history(id.trim(), query).await?))
}
