use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};

use crate::dto::telemetry_dto::{SyncStatusResponse, TriggerResponse};
use crate::state::AppState;

pub fn create_sync_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(sync_status))
        .route("/run", post(run_sync))
}

async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        running: state.sync.is_running(),
        last_report: state.sync.last_report().await,
        skipped_cycles: state.sync.skipped_cycles(),
    })
}

/// Dispara un ciclo en background y responde sin esperar a que termine
async fn run_sync(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    let started = state.sync.spawn_trigger();
    let status = if started { StatusCode::ACCEPTED } else { StatusCode::OK };
    (status, Json(TriggerResponse { started }))
}
