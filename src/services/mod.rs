//! Services module
//!
//! Este módulo contiene la lógica de negocio: token del proveedor,
//! reconciliación, ciclo de sincronización, scheduler e ingestión push.

pub mod ingestion_service;
pub mod reconciler;
pub mod scheduler;
pub mod sync_service;
pub mod token_manager;

pub use ingestion_service::{IngestSummary, IngestionService};
pub use reconciler::{derive_status, Reconciler};
pub use scheduler::{IntervalTicker, Scheduler, Ticker};
pub use sync_service::{CycleOutcome, SyncReport, SyncService, TriggerResult};
pub use token_manager::TokenManager;
