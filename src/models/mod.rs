//! Modelos del sistema
//!
//! Este módulo contiene los registros canónicos de telemetría, el estado
//! reconciliado de cada vehículo y su historial acotado.

pub mod history;
pub mod telemetry;
pub mod vehicle_state;

pub use history::{HistoryEntry, HistoryQuery};
pub use telemetry::{MetaIndex, TelemetrySample, VehicleMeta};
pub use vehicle_state::{GeoPoint, VehicleMetrics, VehicleState, VehicleStatus};
