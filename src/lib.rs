//! Fleet Telemetry Sync
//!
//! Sincroniza periódicamente metadatos y telemetría de un proveedor de
//! flotas, deriva el estado operativo de cada vehículo y lo expone por HTTP.

pub mod clients;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_support;
