//! Modelos de telemetría del proveedor
//!
//! El proveedor entrega registros JSON cuyos nombres de campo varían según el
//! endpoint y la versión (`HWID` vs `hardwareId`, `DeviceDate` vs
//! `deviceDate`, números como strings...). Este módulo normaliza esas
//! variantes a dos tipos canónicos, `VehicleMeta` y `TelemetrySample`, antes
//! de que corra cualquier lógica de negocio.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::utils::errors::SyncError;

const HWID_KEYS: &[&str] = &["HWID", "hardwareId", "hwid", "HardwareId"];
const DEVICE_CODE_KEYS: &[&str] = &["DeviceCode", "deviceCode", "DeviceNo"];
const REGISTRATION_KEYS: &[&str] = &["RegistrationNo", "registrationNumber", "VehicleNo"];
const CHASSIS_KEYS: &[&str] = &["ChassisNo", "chassisNumber"];
const DEVICE_DATE_KEYS: &[&str] = &["DeviceDate", "deviceDate", "timestamp"];
const LATITUDE_KEYS: &[&str] = &["Latitude", "latitude", "lat"];
const LONGITUDE_KEYS: &[&str] = &["Longitude", "longitude", "lng"];
const SPEED_KEYS: &[&str] = &["Speed", "speed"];
const SOC_KEYS: &[&str] = &["SOC", "soc", "battery"];
const ODOMETER_KEYS: &[&str] = &["Odometer", "odometer"];
const SIGNAL_KEYS: &[&str] = &["GSMSignal", "signalStrength"];
const CHARGING_KEYS: &[&str] = &["IsCharging", "isCharging", "ChargingStatus"];
const CHARGING_CURRENT_KEYS: &[&str] = &["ChargingCurrent", "chargingCurrent"];
const IMMOBILIZED_KEYS: &[&str] = &["Immobilize", "isImmobilized"];
const KEY_ON_KEYS: &[&str] = &["KeyOn", "keyOn", "Ignition"];
const DEVICE_TEMP_KEYS: &[&str] = &["DeviceTemperature", "deviceTemperature"];
const CONTROLLER_TEMP_KEYS: &[&str] = &["ControllerTemperature", "controllerTemperature"];
const MACHINE_STATUS_KEYS: &[&str] = &["MachineStatus", "machineStatus"];

/// Formatos sin zona horaria que emite el proveedor
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Metadatos de un vehículo, indexados por HWID
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleMeta {
    pub hwid: String,
    pub device_code: Option<String>,
    pub registration_number: Option<String>,
    pub chassis_number: Option<String>,
}

impl VehicleMeta {
    pub fn from_provider(record: &Value) -> Result<Self, SyncError> {
        let obj = as_object(record)?;
        let hwid = extract_hwid(record)
            .ok_or_else(|| SyncError::Validation("metadata record without hardware identifier".to_string()))?;

        Ok(Self {
            hwid,
            device_code: first_present(obj, DEVICE_CODE_KEYS).and_then(coerce_string),
            registration_number: first_present(obj, REGISTRATION_KEYS).and_then(coerce_string),
            chassis_number: first_present(obj, CHASSIS_KEYS).and_then(coerce_string),
        })
    }
}

/// Snapshot de metadatos de un ciclo, construido antes del join
#[derive(Debug, Default)]
pub struct MetaIndex {
    by_hwid: HashMap<String, VehicleMeta>,
    pub skipped: usize,
}

impl MetaIndex {
    pub fn build(records: &[Value]) -> Self {
        let mut index = MetaIndex::default();
        for record in records {
            match VehicleMeta::from_provider(record) {
                Ok(meta) => {
                    index.by_hwid.insert(meta.hwid.clone(), meta);
                }
                Err(e) => {
                    tracing::debug!("Registro de metadatos descartado: {}", e);
                    index.skipped += 1;
                }
            }
        }
        index
    }

    pub fn get(&self, hwid: &str) -> Option<&VehicleMeta> {
        self.by_hwid.get(hwid)
    }

    pub fn len(&self) -> usize {
        self.by_hwid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hwid.is_empty()
    }
}

/// Lectura canónica de un dispositivo
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub hwid: String,
    /// `None` cuando falta o no se pudo parsear
    pub device_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub state_of_charge: Option<f64>,
    pub odometer: Option<f64>,
    pub signal_strength: Option<f64>,
    pub charging: Option<bool>,
    pub charging_current: Option<f64>,
    pub immobilized: Option<bool>,
    pub key_on: Option<String>,
    pub device_temperature: Option<f64>,
    pub controller_temperature: Option<f64>,
    pub machine_status: Option<String>,
    pub raw: Value,
}

impl TelemetrySample {
    pub fn from_provider(record: &Value, offset: FixedOffset) -> Result<Self, SyncError> {
        let obj = as_object(record)?;
        let hwid = extract_hwid(record)
            .ok_or_else(|| SyncError::Validation("telemetry record without hardware identifier".to_string()))?;

        let number = |keys: &[&str]| first_present(obj, keys).and_then(coerce_f64);
        let flag = |keys: &[&str]| first_present(obj, keys).and_then(coerce_bool);

        let key_on = first_present(obj, KEY_ON_KEYS).and_then(|v| match v {
            Value::Bool(true) => Some("1".to_string()),
            Value::Bool(false) => Some("0".to_string()),
            other => coerce_string(other),
        });

        Ok(Self {
            hwid,
            device_time: first_present(obj, DEVICE_DATE_KEYS).and_then(|v| parse_timestamp(v, offset)),
            latitude: number(LATITUDE_KEYS),
            longitude: number(LONGITUDE_KEYS),
            speed: number(SPEED_KEYS),
            state_of_charge: number(SOC_KEYS),
            odometer: number(ODOMETER_KEYS),
            signal_strength: number(SIGNAL_KEYS),
            charging: flag(CHARGING_KEYS),
            charging_current: number(CHARGING_CURRENT_KEYS),
            immobilized: flag(IMMOBILIZED_KEYS),
            key_on,
            device_temperature: number(DEVICE_TEMP_KEYS),
            controller_temperature: number(CONTROLLER_TEMP_KEYS),
            // sin trim: el estado se compara literalmente
            machine_status: first_present(obj, MACHINE_STATUS_KEYS).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                other => coerce_string(other),
            }),
            raw: record.clone(),
        })
    }
}

fn as_object(record: &Value) -> Result<&Map<String, Value>, SyncError> {
    record
        .as_object()
        .ok_or_else(|| SyncError::Validation("provider record is not an object".to_string()))
}

/// HWID trimmeado y convertido a string, del primer campo presente y no nulo
pub fn extract_hwid(record: &Value) -> Option<String> {
    record
        .as_object()
        .and_then(|obj| first_present(obj, HWID_KEYS))
        .and_then(coerce_string)
}

/// Primer valor presente y no nulo entre las claves candidatas
pub fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

pub fn coerce_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" | "charging" => Some(true),
            "false" | "0" | "no" | "n" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Offset fijo del proveedor para timestamps sin zona horaria
pub fn provider_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// Parsear un timestamp del proveedor (RFC 3339, formatos naive o epoch)
pub fn parse_timestamp(value: &Value, offset: FixedOffset) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if s.chars().all(|c| c.is_ascii_digit()) {
                return from_epoch(s.parse().ok()?);
            }
            NAIVE_FORMATS.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(s, fmt)
                    .ok()
                    .and_then(|naive| offset.from_local_datetime(&naive).single())
                    .map(|dt| dt.with_timezone(&Utc))
            })
        }
        _ => None,
    }
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    // milisegundos a partir de 10^12
    let millis = if raw > 1e12 { raw } else { raw * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}
