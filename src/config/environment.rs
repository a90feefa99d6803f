//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno: servidor HTTP, proveedor
//! de telemetría y parámetros del ciclo de sincronización.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Credenciales del proveedor de telemetría
#[derive(Clone)]
pub struct ProviderCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Configuración del proveedor remoto
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub credentials: ProviderCredentials,
    pub meta_endpoint: String,
    pub telemetry_endpoint: String,
    pub filter_payload: Map<String, Value>,
    pub request_timeout: Duration,
    /// Offset aplicado a timestamps sin zona horaria
    pub utc_offset_minutes: i32,
}

/// Parámetros del ciclo de sincronización
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub page_size: usize,
    pub max_pages: u32,
    pub max_cycle_duration: Duration,
    pub history_retention: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
            page_size: 1000,
            max_pages: 500,
            max_cycle_duration: Duration::from_secs(600),
            history_retention: crate::models::history::HISTORY_RETENTION_CAP,
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub provider: ProviderConfig,
    pub sync: SyncConfig,
}

impl EnvironmentConfig {
    /// Cargar la configuración desde variables de entorno
    pub fn from_env() -> Result<Self> {
        let defaults = SyncConfig::default();

        let filter_payload = match env::var("PROVIDER_FILTER_PAYLOAD") {
            Ok(raw) if !raw.trim().is_empty() => parse_filter_payload(&raw)?,
            _ => Map::new(),
        };

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: parse_or("PORT", 3000)?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            provider: ProviderConfig {
                base_url: required("PROVIDER_BASE_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                credentials: ProviderCredentials {
                    username: required("PROVIDER_USERNAME")?,
                    password: required("PROVIDER_PASSWORD")?,
                },
                meta_endpoint: env::var("PROVIDER_META_ENDPOINT")
                    .unwrap_or_else(|_| "Vehicle/GetVehicleList".to_string()),
                telemetry_endpoint: env::var("PROVIDER_TELEMETRY_ENDPOINT")
                    .unwrap_or_else(|_| "Telemetry/GetLiveData".to_string()),
                filter_payload,
                request_timeout: Duration::from_secs(parse_or("PROVIDER_TIMEOUT_SECS", 30)?),
                utc_offset_minutes: parse_or("PROVIDER_UTC_OFFSET_MINUTES", 0)?,
            },
            sync: SyncConfig {
                enabled: parse_or("SYNC_ENABLED", defaults.enabled)?,
                interval: Duration::from_secs(parse_or("SYNC_INTERVAL_SECS", defaults.interval.as_secs())?),
                page_size: parse_or("SYNC_PAGE_SIZE", defaults.page_size)?,
                max_pages: parse_or("SYNC_MAX_PAGES", defaults.max_pages)?,
                max_cycle_duration: Duration::from_secs(parse_or(
                    "SYNC_MAX_CYCLE_SECS",
                    defaults.max_cycle_duration.as_secs(),
                )?),
                history_retention: parse_or("HISTORY_RETENTION", defaults.history_retention)?,
            },
        })
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} must be a valid value: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn parse_filter_payload(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("PROVIDER_FILTER_PAYLOAD must be valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("PROVIDER_FILTER_PAYLOAD must be a JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_payload() {
        let map = parse_filter_payload(r#"{"dealerId": 7}"#).unwrap();
        assert_eq!(map.get("dealerId"), Some(&Value::from(7)));

        assert!(parse_filter_payload("[1,2]").is_err());
        assert!(parse_filter_payload("not json").is_err());
    }

    #[test]
    fn test_sync_defaults() {
        let sync = SyncConfig::default();
        assert_eq!(sync.page_size, 1000);
        assert_eq!(sync.history_retention, 5000);
        assert!(sync.enabled);
    }

    #[test]
    fn test_credentials_debug_masks_password() {
        let creds = ProviderCredentials {
            username: "fleet".into(),
            password: "s3cret".into(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("fleet"));
        assert!(!printed.contains("s3cret"));
    }
}
