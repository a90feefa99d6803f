//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, variables de entorno
//! y parámetros del motor de sincronización.

pub mod database;
pub mod environment;

pub use environment::*;
