use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::ingestion_service::IngestSummary;
use crate::services::sync_service::SyncReport;

// Response de POST /telemetry/bulk
#[derive(Debug, Serialize)]
pub struct BulkIngestResponse {
    pub success: bool,
    pub vehicles: i64,
    pub accepted: usize,
    pub skipped: usize,
}

impl From<IngestSummary> for BulkIngestResponse {
    fn from(summary: IngestSummary) -> Self {
        Self {
            success: true,
            vehicles: summary.vehicles,
            accepted: summary.accepted,
            skipped: summary.skipped,
        }
    }
}

// Response de GET /sync/status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub running: bool,
    pub last_report: Option<SyncReport>,
    pub skipped_cycles: u64,
}

// Response de POST /sync/run
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub started: bool,
}

// Response de GET /health
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
    pub vehicles: i64,
    pub sync_enabled: bool,
    pub sync_running: bool,
    pub timestamp: DateTime<Utc>,
}
