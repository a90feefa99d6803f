//! Modelo de VehicleState
//!
//! Estado reconciliado y persistido de cada vehículo. Se serializa en
//! camelCase porque es lo que consume el dashboard y lo que envía el
//! forwarder por el path de ingestión.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Estado operativo normalizado del vehículo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleStatus {
    Online,
    Offline,
    #[serde(rename = "Non-Communicating")]
    NonCommunicating,
    Charging,
    Running,
    Idle,
    Off,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Online => "Online",
            VehicleStatus::Offline => "Offline",
            VehicleStatus::NonCommunicating => "Non-Communicating",
            VehicleStatus::Charging => "Charging",
            VehicleStatus::Running => "Running",
            VehicleStatus::Idle => "Idle",
            VehicleStatus::Off => "Off",
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    /// Sin distinguir mayúsculas; acepta `Non-Communicating` con o sin guion
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "online" => Ok(VehicleStatus::Online),
            "offline" => Ok(VehicleStatus::Offline),
            "noncommunicating" => Ok(VehicleStatus::NonCommunicating),
            "charging" => Ok(VehicleStatus::Charging),
            "running" => Ok(VehicleStatus::Running),
            "idle" => Ok(VehicleStatus::Idle),
            "off" => Ok(VehicleStatus::Off),
            _ => Err(format!("unknown vehicle status '{}'", raw)),
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Últimas métricas reportadas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleMetrics {
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub odometer: Option<f64>,
    #[serde(default)]
    pub signal_strength: Option<f64>,
    #[serde(default)]
    pub charging: Option<bool>,
    #[serde(default)]
    pub immobilized: Option<bool>,
    #[serde(default)]
    pub key_on: Option<String>,
    #[serde(default)]
    pub device_temperature: Option<f64>,
    #[serde(default)]
    pub controller_temperature: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleState {
    pub vehicle_id: String,
    #[serde(default)]
    pub device_code: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub chassis_number: Option<String>,
    #[serde(default)]
    pub status: Option<VehicleStatus>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metrics: VehicleMetrics,
    #[serde(default)]
    pub device_timestamp: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    /// Campos adicionales enviados por el forwarder
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VehicleState {
    /// Estado vacío para un vehículo visto por primera vez
    pub fn empty(vehicle_id: impl Into<String>, last_update: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            device_code: None,
            registration_number: None,
            chassis_number: None,
            status: None,
            location: None,
            metrics: VehicleMetrics::default(),
            device_timestamp: None,
            last_update,
            extra: Map::new(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(VehicleStatus::NonCommunicating).unwrap(), json!("Non-Communicating"));
        let parsed: VehicleStatus = serde_json::from_value(json!("Charging")).unwrap();
        assert_eq!(parsed, VehicleStatus::Charging);
        assert_eq!(VehicleStatus::Idle.to_string(), "Idle");
    }

    #[test]
    fn test_state_keeps_unknown_fields() {
        let state: VehicleState = serde_json::from_value(json!({
            "vehicleId": "V1",
            "lastUpdate": "2024-03-01T10:00:00Z",
            "metrics": { "speed": 12.0, "tyrePressure": 31 },
            "driverName": "Asha"
        }))
        .unwrap();

        assert_eq!(state.metrics.speed, Some(12.0));
        assert_eq!(state.metrics.extra.get("tyrePressure"), Some(&json!(31)));
        assert_eq!(state.extra.get("driverName"), Some(&json!("Asha")));

        let back = serde_json::to_value(&state).unwrap();
        assert_eq!(back["driverName"], json!("Asha"));
        assert_eq!(back["metrics"]["tyrePressure"], json!(31));
    }

    #[test]
    fn test_null_metrics_become_default() {
        let state: VehicleState = serde_json::from_value(json!({
            "vehicleId": "V1",
            "lastUpdate": "2024-03-01T10:00:00Z",
            "metrics": null
        }))
        .unwrap();
        assert_eq!(state.metrics, VehicleMetrics::default());
    }

    #[test]
    fn test_status_from_str_is_lenient() {
        assert_eq!("running".parse::<VehicleStatus>(), Ok(VehicleStatus::Running));
        assert_eq!(" OFF ".parse::<VehicleStatus>(), Ok(VehicleStatus::Off));
        assert_eq!("non communicating".parse::<VehicleStatus>(), Ok(VehicleStatus::NonCommunicating));
        assert_eq!("Non-Communicating".parse::<VehicleStatus>(), Ok(VehicleStatus::NonCommunicating));
        assert!("parked".parse::<VehicleStatus>().is_err());
    }
}
