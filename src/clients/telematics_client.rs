//! Cliente HTTP para el proveedor de telemetría
//!
//! Este módulo contiene el cliente HTTP contra la API del proveedor de
//! rastreo de flota: login y peticiones paginadas con bearer token.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::environment::ProviderCredentials;
use crate::utils::errors::SyncError;

/// Operaciones remotas que necesita el motor de sincronización
#[async_trait]
pub trait TelematicsApi: Send + Sync {
    /// `POST {base}/Auth/login`
    async fn login(&self, credentials: &ProviderCredentials) -> Result<String, SyncError>;

    /// Una página de `POST {base}/<endpoint>`
    async fn fetch_page(
        &self,
        endpoint: &str,
        payload: &Map<String, Value>,
        token: &str,
    ) -> Result<Vec<Value>, SyncError>;
}

/// Cliente HTTP del proveedor
pub struct TelematicsClient {
    client: Client,
    base_url: String,
}

impl TelematicsClient {
    /// Crear nuevo cliente con timeout por petición
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl TelematicsApi for TelematicsClient {
    async fn login(&self, credentials: &ProviderCredentials) -> Result<String, SyncError> {
        let url = self.url("Auth/login");
        tracing::debug!("🔐 Autenticando contra {}", url);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("login request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Auth(format!("login rejected with HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("malformed login body: {}", e)))?;

        extract_token(&body).ok_or_else(|| SyncError::Auth("login body carries no token".to_string()))
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        payload: &Map<String, Value>,
        token: &str,
    ) -> Result<Vec<Value>, SyncError> {
        let fetch_error = |message: String| SyncError::Fetch {
            endpoint: endpoint.to_string(),
            message,
        };

        let response = self
            .client
            .post(self.url(endpoint))
            .header("Accept", "application/json")
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fetch_error("request timed out".to_string())
                } else {
                    fetch_error(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Unauthorized {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| fetch_error(format!("malformed body: {}", e)))?;

        extract_records(&body).ok_or_else(|| fetch_error("unexpected payload shape".to_string()))
    }
}

/// Token en `token`, o anidado bajo `data` / `result`
pub fn extract_token(body: &Value) -> Option<String> {
    let direct = body.get("token");
    let nested = ["data", "result"].iter().filter_map(|key| body.get(*key)).find_map(|inner| match inner {
        Value::String(s) => Some(inner).filter(|_| !s.trim().is_empty()),
        Value::Object(_) => inner.get("token"),
        _ => None,
    });

    direct
        .into_iter()
        .chain(nested)
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Registros como array directo, o anidados bajo `data` / `result`
pub fn extract_records(body: &Value) -> Option<Vec<Value>> {
    if let Value::Array(items) = body {
        return Some(items.clone());
    }
    ["data", "result"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
        .cloned()
}
