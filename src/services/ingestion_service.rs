//! Servicio de ingestión (path push)
//!
//! Recibe lotes de registros ya normalizados desde un forwarder externo y los
//! fusiona sobre el estado actual de cada vehículo. Comparte el store, la
//! deduplicación y el límite de historial con el ciclo de sincronización.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::models::history::HistoryEntry;
use crate::models::telemetry::{
    coerce_bool, coerce_f64, coerce_string, first_present, parse_timestamp, provider_offset,
};
use crate::models::vehicle_state::{VehicleState, VehicleStatus};
use crate::repositories::telemetry_repository::TelemetryStore;
use crate::utils::errors::SyncError;
use crate::utils::metrics;

/// Resultado de un lote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Total de vehículos en el store tras el lote
    pub vehicles: i64,
    pub accepted: usize,
    pub skipped: usize,
}

pub struct IngestionService {
    store: Arc<dyn TelemetryStore>,
    offset: FixedOffset,
    history_retention: usize,
}

impl IngestionService {
    pub fn new(store: Arc<dyn TelemetryStore>, utc_offset_minutes: i32, history_retention: usize) -> Self {
        Self {
            store,
            offset: provider_offset(utc_offset_minutes),
            history_retention,
        }
    }

    /// Procesar un lote. Solo se rechaza entero si no es un array.
    pub async fn ingest_batch(&self, payload: Value, received_at: DateTime<Utc>) -> Result<IngestSummary, SyncError> {
        let Value::Array(records) = payload else {
            return Err(SyncError::Validation("Expected a JSON array of telemetry records".to_string()));
        };

        let mut accepted = 0;
        let mut skipped = 0;
        for record in records {
            match self.ingest_record(record, received_at).await {
                Ok(()) => {
                    accepted += 1;
                    metrics::INGEST_RECORDS.with_label_values(&["accepted"]).inc();
                }
                Err(e) => {
                    tracing::warn!("⚠️ Registro descartado en ingestión: {}", e);
                    skipped += 1;
                    metrics::INGEST_RECORDS.with_label_values(&["skipped"]).inc();
                }
            }
        }

        let vehicles = self
            .store
            .count_states()
            .await
            .map_err(|e| SyncError::Persist(e.to_string()))?;

        tracing::info!(accepted, skipped, vehicles, "📥 Lote de telemetría procesado");
        Ok(IngestSummary {
            vehicles,
            accepted,
            skipped,
        })
    }

    async fn ingest_record(&self, record: Value, received_at: DateTime<Utc>) -> Result<(), SyncError> {
        let Value::Object(fields) = record else {
            return Err(SyncError::Validation("record is not an object".to_string()));
        };
        let vehicle_id = fields
            .get("vehicleId")
            .and_then(coerce_string)
            .ok_or_else(|| SyncError::Validation("record without vehicleId".to_string()))?;

        let existing = self
            .store
            .find_state(&vehicle_id)
            .await
            .map_err(|e| SyncError::Persist(e.to_string()))?;

        let normalized = normalize_push_fields(fields.clone(), self.offset);
        let state = merge_state(existing.as_ref(), &vehicle_id, &normalized, received_at)?;
        self.store
            .upsert_state(&state)
            .await
            .map_err(|e| SyncError::Persist(e.to_string()))?;

        let timestamp = fields
            .get("timestamp")
            .and_then(|value| parse_timestamp(value, self.offset))
            .unwrap_or(received_at);
        let entry = HistoryEntry::new(timestamp, Value::Object(fields));
        self.store
            .append_history(&vehicle_id, &entry, self.history_retention)
            .await
            .map_err(|e| SyncError::Persist(e.to_string()))?;

        Ok(())
    }
}

const METRIC_NUMBER_KEYS: &[&str] = &[
    "speed",
    "battery",
    "odometer",
    "signalStrength",
    "deviceTemperature",
    "controllerTemperature",
];
const METRIC_FLAG_KEYS: &[&str] = &["charging", "immobilized"];
const META_STRING_KEYS: &[&str] = &["deviceCode", "registrationNumber", "chassisNumber"];

/// Llevar los campos tipados de un registro push a la forma de `VehicleState`.
///
/// Se aplican las mismas coerciones que en el path pull (números como
/// strings, flags `"1"`/`"true"`, estado sin distinguir mayúsculas). Un valor
/// que no se puede coercionar no descarta el registro: se guarda tal cual
/// bajo `raw<Campo>` y el campo tipado conserva su valor anterior.
pub fn normalize_push_fields(mut fields: Map<String, Value>, offset: FixedOffset) -> Map<String, Value> {
    for key in META_STRING_KEYS {
        normalize_slot(&mut fields, key, |v| coerce_string(v).map(Value::from));
    }
    normalize_slot(&mut fields, "status", |v| {
        v.as_str()
            .and_then(|s| s.parse::<VehicleStatus>().ok())
            .map(|status| Value::from(status.as_str()))
    });
    normalize_slot(&mut fields, "location", normalize_location);
    normalize_slot(&mut fields, "deviceTimestamp", |v| {
        parse_timestamp(v, offset).map(|ts| Value::from(ts.to_rfc3339()))
    });
    normalize_slot(&mut fields, "metrics", |v| {
        v.as_object().map(|metrics| Value::Object(normalize_metrics(metrics.clone())))
    });
    fields
}

fn normalize_metrics(mut metrics: Map<String, Value>) -> Map<String, Value> {
    for key in METRIC_NUMBER_KEYS {
        normalize_slot(&mut metrics, key, |v| coerce_f64(v).map(Value::from));
    }
    for key in METRIC_FLAG_KEYS {
        normalize_slot(&mut metrics, key, |v| coerce_bool(v).map(Value::from));
    }
    normalize_slot(&mut metrics, "keyOn", |v| match v {
        Value::Bool(on) => Some(Value::from(if *on { "1" } else { "0" })),
        other => coerce_string(other).map(Value::from),
    });
    metrics
}

fn normalize_location(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    let lat = first_present(obj, &["lat", "latitude"]).and_then(coerce_f64)?;
    let lng = first_present(obj, &["lng", "lon", "longitude"]).and_then(coerce_f64)?;
    Some(json!({ "lat": lat, "lng": lng }))
}

/// `null` se respeta (borra el campo en la fusión)
fn normalize_slot<F>(fields: &mut Map<String, Value>, key: &str, normalize: F)
where
    F: FnOnce(&Value) -> Option<Value>,
{
    let Some(value) = fields.remove(key) else {
        return;
    };
    if value.is_null() {
        fields.insert(key.to_string(), value);
        return;
    }
    match normalize(&value) {
        Some(normalized) => {
            fields.insert(key.to_string(), normalized);
        }
        None => {
            tracing::debug!(field = key, "Valor push no normalizable, se guarda en bruto");
            fields.insert(raw_key(key), value);
        }
    }
}

fn raw_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("raw{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "raw".to_string(),
    }
}

/// Fusión superficial: los campos de primer nivel del registro reemplazan a
/// los existentes; `vehicleId` y `lastUpdate` los fija el servidor.
pub fn merge_state(
    existing: Option<&VehicleState>,
    vehicle_id: &str,
    fields: &Map<String, Value>,
    received_at: DateTime<Utc>,
) -> Result<VehicleState, SyncError> {
    let mut merged = match existing.map(serde_json::to_value) {
        Some(Ok(Value::Object(map))) => map,
        Some(Err(e)) => return Err(SyncError::Validation(e.to_string())),
        _ => Map::new(),
    };

    for (key, value) in fields {
        merged.insert(key.clone(), value.clone());
    }
    merged.insert("vehicleId".to_string(), Value::from(vehicle_id));
    merged.insert("lastUpdate".to_string(), Value::from(received_at.to_rfc3339()));

    serde_json::from_value(Value::Object(merged))
        .map_err(|e| SyncError::Validation(format!("invalid state for {}: {}", vehicle_id, e)))
}
