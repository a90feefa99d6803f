//! Orquestador del ciclo de sincronización
//!
//! Un ciclo: token → metadatos paginados → telemetría paginada → join y
//! estado derivado → upsert por vehículo. Como mucho un ciclo en vuelo; un
//! disparo mientras otro corre se descarta (no se encola).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::clients::pagination::{fetch_all_pages, PageOptions, PagedRecords};
use crate::clients::telematics_client::TelematicsApi;
use crate::config::environment::{ProviderConfig, SyncConfig};
use crate::models::telemetry::{provider_offset, MetaIndex};
use crate::repositories::telemetry_repository::TelemetryStore;
use crate::services::reconciler::{ReconciledVehicle, Reconciler};
use crate::services::token_manager::TokenManager;
use crate::utils::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed,
    /// Alguna página o escritura falló; se persistió lo obtenido
    Partial,
    /// No hubo token válido; no se tocó el store
    AuthFailed,
}

impl CycleOutcome {
    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::Partial => "partial",
            CycleOutcome::AuthFailed => "auth_failed",
        }
    }
}

/// Resumen de un ciclo
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: CycleOutcome,
    pub meta_records: usize,
    pub telemetry_records: usize,
    pub persisted: usize,
    pub persist_failures: usize,
    pub history_appended: usize,
    pub skipped_records: usize,
    pub unmatched_records: usize,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: CycleOutcome::Completed,
            meta_records: 0,
            telemetry_records: 0,
            persisted: 0,
            persist_failures: 0,
            history_appended: 0,
            skipped_records: 0,
            unmatched_records: 0,
            errors: Vec::new(),
        }
    }

    fn degrade(&mut self, error: String) {
        if self.outcome == CycleOutcome::Completed {
            self.outcome = CycleOutcome::Partial;
        }
        self.errors.push(error);
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

#[derive(Debug, Clone)]
pub enum TriggerResult {
    /// Ya había un ciclo en curso
    Skipped,
    Ran(SyncReport),
}

/// Libera el flag de ciclo en curso al salir del scope, también en panic
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncService {
    api: Arc<dyn TelematicsApi>,
    tokens: Arc<TokenManager>,
    store: Arc<dyn TelemetryStore>,
    reconciler: Reconciler,
    meta_endpoint: String,
    telemetry_endpoint: String,
    filter_payload: Map<String, Value>,
    config: SyncConfig,
    running: AtomicBool,
    skipped_cycles: AtomicU64,
    last_report: RwLock<Option<SyncReport>>,
}

impl SyncService {
    pub fn new(
        api: Arc<dyn TelematicsApi>,
        tokens: Arc<TokenManager>,
        store: Arc<dyn TelemetryStore>,
        provider: &ProviderConfig,
        config: SyncConfig,
    ) -> Self {
        Self {
            api,
            tokens,
            store,
            reconciler: Reconciler::new(provider_offset(provider.utc_offset_minutes)),
            meta_endpoint: provider.meta_endpoint.clone(),
            telemetry_endpoint: provider.telemetry_endpoint.clone(),
            filter_payload: provider.filter_payload.clone(),
            config,
            running: AtomicBool::new(false),
            skipped_cycles: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles.load(Ordering::Relaxed)
    }

    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// Ejecutar un ciclo si no hay otro en curso
    pub async fn trigger(&self) -> TriggerResult {
        if !self.try_acquire() {
            return TriggerResult::Skipped;
        }
        let _guard = RunningGuard(&self.running);
        TriggerResult::Ran(self.run_and_record().await)
    }

    /// Como `trigger`, pero el ciclo corre en una tarea propia. Devuelve
    /// `false` si ya había uno en curso.
    pub fn spawn_trigger(self: &Arc<Self>) -> bool {
        if !self.try_acquire() {
            return false;
        }
        let service = self.clone();
        tokio::spawn(async move {
            let _guard = RunningGuard(&service.running);
            service.run_and_record().await;
        });
        true
    }

    fn try_acquire(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return true;
        }
        self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
        metrics::SYNC_CYCLES.with_label_values(&["skipped"]).inc();
        tracing::info!("⏭️ Ciclo de sincronización en curso, se omite este disparo");
        false
    }

    async fn run_and_record(&self) -> SyncReport {
        let report = self.run_cycle().await;
        metrics::SYNC_CYCLES.with_label_values(&[report.outcome.label()]).inc();
        *self.last_report.write().await = Some(report.clone());
        report
    }

    async fn run_cycle(&self) -> SyncReport {
        let mut report = SyncReport::new();
        let cycle_id = report.cycle_id;
        tracing::info!(%cycle_id, "🔄 Iniciando ciclo de sincronización");

        let token = match self.tokens.acquire(self.api.as_ref()).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(%cycle_id, "⚠️ Sin token del proveedor, ciclo omitido: {}", e);
                report.outcome = CycleOutcome::AuthFailed;
                report.errors.push(e.to_string());
                return report.finish();
            }
        };

        let options = PageOptions {
            page_size: self.config.page_size,
            max_pages: self.config.max_pages,
            deadline: Instant::now().checked_add(self.config.max_cycle_duration),
        };

        // Los metadatos se completan antes del join: snapshot del ciclo
        let meta = fetch_all_pages(self.api.as_ref(), &self.meta_endpoint, &self.filter_payload, &token, &options).await;
        if self.note_stop(&meta, &mut report).await {
            report.outcome = CycleOutcome::AuthFailed;
            return report.finish();
        }
        let index = MetaIndex::build(&meta.records);
        report.meta_records = index.len();

        let telemetry =
            fetch_all_pages(self.api.as_ref(), &self.telemetry_endpoint, &self.filter_payload, &token, &options).await;
        self.note_stop(&telemetry, &mut report).await;
        report.telemetry_records = telemetry.records.len();

        let outcome = self.reconciler.reconcile_batch(&index, &telemetry.records, Utc::now());
        report.skipped_records = outcome.skipped;
        report.unmatched_records = outcome.unmatched;

        for vehicle in &outcome.vehicles {
            self.persist(vehicle, &mut report).await;
        }

        if report.persist_failures > 0 {
            report.degrade(format!("{} store writes failed", report.persist_failures));
        }

        let report = report.finish();
        tracing::info!(
            %cycle_id,
            outcome = report.outcome.label(),
            meta = report.meta_records,
            telemetry = report.telemetry_records,
            persisted = report.persisted,
            persist_failures = report.persist_failures,
            "✅ Ciclo de sincronización terminado"
        );
        report
    }

    /// Registrar por qué se cortó una paginación. Devuelve `true` si el
    /// proveedor rechazó el token.
    async fn note_stop(&self, paged: &PagedRecords, report: &mut SyncReport) -> bool {
        let Some(stop) = &paged.stopped else {
            return false;
        };

        report.degrade(format!("{:?}", stop));
        match paged.failure() {
            Some(e) if e.is_auth_class() => {
                self.tokens.invalidate().await;
                true
            }
            _ => false,
        }
    }

    async fn persist(&self, vehicle: &ReconciledVehicle, report: &mut SyncReport) {
        let vehicle_id = vehicle.state.vehicle_id.as_str();

        if let Err(e) = self.store.upsert_state(&vehicle.state).await {
            tracing::error!(vehicle_id, "❌ Error persistiendo estado: {}", e);
            report.persist_failures += 1;
            metrics::PERSIST_FAILURES.inc();
            return;
        }
        report.persisted += 1;
        metrics::RECORDS_PERSISTED.inc();

        if let Some(entry) = &vehicle.history {
            match self
                .store
                .append_history(vehicle_id, entry, self.config.history_retention)
                .await
            {
                Ok(true) => report.history_appended += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(vehicle_id, "❌ Error guardando historial: {}", e);
                    report.persist_failures += 1;
                    metrics::PERSIST_FAILURES.inc();
                }
            }
        }
    }
}
