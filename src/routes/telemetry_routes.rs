use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;

use crate::dto::telemetry_dto::BulkIngestResponse;
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, AppError};

pub fn create_telemetry_router() -> Router<AppState> {
    Router::new().route("/bulk", post(ingest_bulk))
}

/// Ingestión push: array JSON de registros con `vehicleId`
async fn ingest_bulk(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BulkIngestResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| bad_request_error(&e.body_text()))?;
    let summary = state.ingestion.ingest_batch(payload, Utc::now()).await?;
    Ok(Json(summary.into()))
}
