//! Reconciliación de metadatos y telemetría
//!
//! Une cada muestra con los metadatos de su HWID y deriva el estado
//! operativo. La frescura de la comunicación domina sobre los flags
//! reportados: una muestra vieja no representa el movimiento o la carga
//! actual del vehículo.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde_json::Value;

use crate::models::history::HistoryEntry;
use crate::models::telemetry::{MetaIndex, TelemetrySample, VehicleMeta};
use crate::models::vehicle_state::{GeoPoint, VehicleMetrics, VehicleState, VehicleStatus};

/// Minutos sin reportar para considerar el vehículo Offline
pub const OFFLINE_AFTER_MINUTES: i64 = 15;

/// Minutos sin reportar para considerar el vehículo Non-Communicating
pub const NON_COMMUNICATING_AFTER_MINUTES: i64 = 1440;

/// Relleno de campos de metadatos ausentes
pub const PLACEHOLDER: &str = "---";

/// Derivar el estado de una muestra. Primera regla que aplica gana.
pub fn derive_status(sample: &TelemetrySample, now: DateTime<Utc>) -> VehicleStatus {
    let Some(device_time) = sample.device_time else {
        return VehicleStatus::Offline;
    };

    let elapsed = now.signed_duration_since(device_time);
    if elapsed > Duration::minutes(NON_COMMUNICATING_AFTER_MINUTES) {
        return VehicleStatus::NonCommunicating;
    }
    if elapsed > Duration::minutes(OFFLINE_AFTER_MINUTES) {
        return VehicleStatus::Offline;
    }
    if sample.machine_status.as_deref() == Some("On") {
        return VehicleStatus::Online;
    }
    if sample.charging == Some(true) || sample.charging_current.map_or(false, |current| current > 0.0) {
        return VehicleStatus::Charging;
    }
    if sample.speed.map_or(false, |speed| speed > 0.0) {
        return VehicleStatus::Running;
    }
    if sample.key_on.as_deref() == Some("1") {
        return VehicleStatus::Idle;
    }
    VehicleStatus::Off
}

/// Resultado transitorio que el orquestador entrega al store
#[derive(Debug, Clone)]
pub struct ReconciledVehicle {
    pub state: VehicleState,
    /// `None` si la muestra no trae timestamp de dispositivo
    pub history: Option<HistoryEntry>,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub vehicles: Vec<ReconciledVehicle>,
    /// Registros sin HWID o que no son objetos
    pub skipped: usize,
    /// Muestras sin metadatos asociados
    pub unmatched: usize,
}

pub fn reconcile(sample: &TelemetrySample, meta: Option<&VehicleMeta>, now: DateTime<Utc>) -> ReconciledVehicle {
    let status = derive_status(sample, now);

    let location = match (sample.latitude, sample.longitude) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    };

    let state = VehicleState {
        vehicle_id: sample.hwid.clone(),
        device_code: Some(
            meta.and_then(|m| m.device_code.clone())
                .unwrap_or_else(|| sample.hwid.clone()),
        ),
        registration_number: Some(
            meta.and_then(|m| m.registration_number.clone())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
        ),
        chassis_number: Some(
            meta.and_then(|m| m.chassis_number.clone())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
        ),
        status: Some(status),
        location,
        metrics: VehicleMetrics {
            speed: sample.speed,
            battery: sample.state_of_charge,
            odometer: sample.odometer,
            signal_strength: sample.signal_strength,
            charging: sample.charging,
            immobilized: sample.immobilized,
            key_on: sample.key_on.clone(),
            device_temperature: sample.device_temperature,
            controller_temperature: sample.controller_temperature,
            extra: Default::default(),
        },
        device_timestamp: sample.device_time,
        last_update: now,
        extra: Default::default(),
    };

    let history = sample
        .device_time
        .map(|timestamp| HistoryEntry::new(timestamp, sample.raw.clone()));

    ReconciledVehicle { state, history }
}

pub struct Reconciler {
    offset: FixedOffset,
}

impl Reconciler {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Unir un lote de telemetría contra el snapshot de metadatos del ciclo
    pub fn reconcile_batch(&self, meta: &MetaIndex, telemetry: &[Value], now: DateTime<Utc>) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for record in telemetry {
            let sample = match TelemetrySample::from_provider(record, self.offset) {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::debug!("Muestra descartada: {}", e);
                    outcome.skipped += 1;
                    continue;
                }
            };

            let matched = meta.get(&sample.hwid);
            if matched.is_none() {
                outcome.unmatched += 1;
            }
            outcome.vehicles.push(reconcile(&sample, matched, now));
        }

        outcome
    }
}
