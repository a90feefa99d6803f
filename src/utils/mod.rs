//! Utilidades del sistema
//!
//! Este módulo contiene el manejo de errores y las métricas del servicio.

pub mod errors;
pub mod metrics;

pub use errors::{AppError, AppResult, SyncError};
