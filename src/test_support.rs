//! Dobles de prueba compartidos por los tests unitarios

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

use crate::clients::telematics_client::TelematicsApi;
use crate::config::environment::{ProviderConfig, ProviderCredentials};
use crate::utils::errors::SyncError;

pub const META_ENDPOINT: &str = "meta";
pub const TELEMETRY_ENDPOINT: &str = "telemetry";

/// Proveedor falso paginado en memoria
pub struct FakeApi {
    datasets: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<(String, Map<String, Value>, String)>>,
    failures: Mutex<HashMap<(String, u32), SyncError>>,
    login_result: Mutex<Result<String, SyncError>>,
    logins: AtomicUsize,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    entered: Arc<Notify>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            datasets: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            login_result: Mutex::new(Ok("token-1".to_string())),
            logins: AtomicUsize::new(0),
            hold: Mutex::new(None),
            entered: Arc::new(Notify::new()),
        }
    }
}

impl FakeApi {
    pub fn with_telemetry(records: Vec<Value>) -> Self {
        let api = Self::default();
        api.set_endpoint(TELEMETRY_ENDPOINT, records);
        api
    }

    pub fn with_fleet(meta: Vec<Value>, telemetry: Vec<Value>) -> Self {
        let api = Self::default();
        api.set_endpoint(META_ENDPOINT, meta);
        api.set_endpoint(TELEMETRY_ENDPOINT, telemetry);
        api
    }

    pub fn set_endpoint(&self, endpoint: &str, records: Vec<Value>) {
        self.datasets.lock().unwrap().insert(endpoint.to_string(), records);
    }

    pub fn set_login(&self, result: Result<String, SyncError>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn fail_page(&self, endpoint: &str, page: u32, error: SyncError) {
        self.failures.lock().unwrap().insert((endpoint.to_string(), page), error);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn fail_telemetry_page(&self, page: u32, error: SyncError) {
        self.fail_page(TELEMETRY_ENDPOINT, page, error);
    }

    /// Bloquea la próxima petición de página hasta que se envíe por el sender
    pub fn hold_next_fetch(&self) -> (Arc<Notify>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock().unwrap() = Some(rx);
        (self.entered.clone(), tx)
    }

    pub fn login_calls(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(e, _, _)| e == endpoint).count()
    }

    pub fn total_fetches(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn telemetry_calls(&self) -> usize {
        self.calls_to(TELEMETRY_ENDPOINT)
    }

    pub fn sent_payloads(&self) -> Vec<Map<String, Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _, _)| e == TELEMETRY_ENDPOINT)
            .map(|(_, payload, _)| payload.clone())
            .collect()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, _, token)| token.clone()).collect()
    }
}

#[async_trait]
impl TelematicsApi for FakeApi {
    async fn login(&self, _credentials: &ProviderCredentials) -> Result<String, SyncError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.login_result.lock().unwrap().clone()
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        payload: &Map<String, Value>,
        token: &str,
    ) -> Result<Vec<Value>, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone(), token.to_string()));

        let held = self.hold.lock().unwrap().take();
        if let Some(release) = held {
            self.entered.notify_one();
            let _ = release.await;
        }

        let page = payload.get("pageNumber").and_then(Value::as_u64).unwrap_or(1) as u32;
        let size = payload.get("pageSize").and_then(Value::as_u64).unwrap_or(1000) as usize;

        if let Some(error) = self.failures.lock().unwrap().get(&(endpoint.to_string(), page)) {
            return Err(error.clone());
        }

        let datasets = self.datasets.lock().unwrap();
        let records = datasets.get(endpoint).cloned().unwrap_or_default();
        let start = ((page as usize).saturating_sub(1) * size).min(records.len());
        let end = (start + size).min(records.len());
        Ok(records[start..end].to_vec())
    }
}

pub fn test_credentials() -> ProviderCredentials {
    ProviderCredentials {
        username: "fleet-sync".to_string(),
        password: "secret".to_string(),
    }
}

pub fn test_provider_config() -> ProviderConfig {
    ProviderConfig {
        base_url: "http://provider.test".to_string(),
        credentials: test_credentials(),
        meta_endpoint: META_ENDPOINT.to_string(),
        telemetry_endpoint: TELEMETRY_ENDPOINT.to_string(),
        filter_payload: Map::new(),
        request_timeout: Duration::from_secs(5),
        utc_offset_minutes: 0,
    }
}
