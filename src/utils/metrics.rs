//! Métricas Prometheus del motor de sincronización

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref SYNC_CYCLES: IntCounterVec = register_counter_vec(
        "fleet_sync_cycles_total",
        "Ciclos de sincronización por resultado",
        &["outcome"],
    );
    pub static ref RECORDS_PERSISTED: IntCounter = register_counter(
        "fleet_sync_records_persisted_total",
        "Estados de vehículo persistidos por el ciclo de sincronización",
    );
    pub static ref PERSIST_FAILURES: IntCounter = register_counter(
        "fleet_sync_persist_failures_total",
        "Escrituras fallidas en el store",
    );
    pub static ref INGEST_RECORDS: IntCounterVec = register_counter_vec(
        "fleet_ingest_records_total",
        "Registros recibidos por el endpoint de ingestión",
        &["result"],
    );
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap_or_else(|e| panic!("invalid metric {}: {}", name, e));
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        tracing::warn!("⚠️ Métrica {} no registrada: {}", name, e);
    }
    counter
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|e| panic!("invalid metric {}: {}", name, e));
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        tracing::warn!("⚠️ Métrica {} no registrada: {}", name, e);
    }
    counter
}

/// Exposición en formato texto para `GET /metrics`
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("❌ Error codificando métricas: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
