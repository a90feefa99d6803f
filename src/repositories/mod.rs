//! Repositorios
//!
//! Acceso al estado persistido de la flota.

pub mod memory_store;
pub mod telemetry_repository;

pub use memory_store::MemoryStore;
pub use telemetry_repository::{PgTelemetryStore, TelemetryStore};
