//! Rutas HTTP
//!
//! Lecturas de la flota, control de la sincronización, ingestión push,
//! health y métricas.

pub mod sync_routes;
pub mod telemetry_routes;
pub mod vehicle_routes;

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use tower_http::trace::TraceLayer;

use crate::dto::telemetry_dto::HealthResponse;
use crate::middleware::cors::cors_layer;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::metrics;

/// Router completo de la aplicación
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .nest("/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/sync", sync_routes::create_sync_router())
        .nest("/telemetry", telemetry_routes::create_telemetry_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// 503 si el store no responde
async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let vehicles = state
        .store
        .count_states()
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("Telemetry store unreachable: {}", e)))?;
    Ok(Json(HealthResponse {
        status: "ok",
        environment: state.config.environment.clone(),
        vehicles,
        sync_enabled: state.config.sync.enabled,
        sync_running: state.sync.is_running(),
        timestamp: Utc::now(),
    }))
}

async fn metrics_endpoint() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], metrics::render())
}
