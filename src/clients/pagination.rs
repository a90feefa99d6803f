//! Paginación contra el proveedor
//!
//! Recorre `pageNumber` desde 1 con un `pageSize` fijo hasta recibir una
//! página vacía o incompleta. Un error en cualquier página corta el bucle y
//! devuelve lo acumulado junto con el error; nunca es fatal para el ciclo.

use serde_json::{Map, Value};
use tokio::time::Instant;

use super::telematics_client::TelematicsApi;
use crate::utils::errors::SyncError;

/// Tamaño de página por defecto
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub page_size: usize,
    pub max_pages: u32,
    /// Límite defensivo de duración del ciclo
    pub deadline: Option<Instant>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: 500,
            deadline: None,
        }
    }
}

/// Por qué se detuvo la paginación antes de la última página
#[derive(Debug, Clone, PartialEq)]
pub enum PageStop {
    Failed(SyncError),
    MaxPages,
    Deadline,
}

#[derive(Debug, Default)]
pub struct PagedRecords {
    pub records: Vec<Value>,
    pub requests: u32,
    pub stopped: Option<PageStop>,
}

impl PagedRecords {
    pub fn failure(&self) -> Option<&SyncError> {
        match &self.stopped {
            Some(PageStop::Failed(e)) => Some(e),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stopped.is_none()
    }
}

/// Traer todas las páginas de un endpoint
pub async fn fetch_all_pages(
    api: &dyn TelematicsApi,
    endpoint: &str,
    base_payload: &Map<String, Value>,
    token: &str,
    options: &PageOptions,
) -> PagedRecords {
    let page_size = options.page_size.max(1);
    let mut result = PagedRecords::default();
    let mut page_number: u32 = 1;

    loop {
        if page_number > options.max_pages {
            tracing::warn!(endpoint, pages = result.requests, "⚠️ Límite de páginas alcanzado, se conservan resultados parciales");
            result.stopped = Some(PageStop::MaxPages);
            break;
        }
        if options.deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            tracing::warn!(endpoint, pages = result.requests, "⚠️ Duración máxima del ciclo excedida, se detiene la paginación");
            result.stopped = Some(PageStop::Deadline);
            break;
        }

        let mut payload = base_payload.clone();
        payload.insert("pageNumber".to_string(), Value::from(page_number));
        payload.insert("pageSize".to_string(), Value::from(page_size));

        result.requests += 1;
        match api.fetch_page(endpoint, &payload, token).await {
            Ok(records) => {
                let received = records.len();
                tracing::debug!(endpoint, page = page_number, received, "📄 Página recibida");
                result.records.extend(records);

                if received == 0 || received < page_size {
                    break;
                }
                page_number += 1;
            }
            Err(e) => {
                tracing::error!(endpoint, page = page_number, "❌ Error en página, paginación abortada: {}", e);
                result.stopped = Some(PageStop::Failed(e));
                break;
            }
        }
    }

    tracing::info!(
        endpoint,
        records = result.records.len(),
        requests = result.requests,
        "📦 Paginación terminada"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeApi;
    use serde_json::json;
    use std::time::Duration;

    fn payload() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("dealerId".to_string(), json!(7));
        map
    }

    fn options(page_size: usize) -> PageOptions {
        PageOptions {
            page_size,
            ..PageOptions::default()
        }
    }

    #[tokio::test]
    async fn test_pagination_returns_all_records() {
        for (total, expected_requests) in [(0, 1), (1, 1), (999, 1), (1000, 2), (2500, 3), (3000, 4)] {
            let api = FakeApi::with_telemetry((0..total).map(|i| json!({ "HWID": i })).collect());
            let paged = fetch_all_pages(&api, "telemetry", &payload(), "tok", &options(1000)).await;

            assert_eq!(paged.records.len(), total, "total {}", total);
            assert_eq!(paged.requests, expected_requests, "total {}", total);
            assert_eq!(api.telemetry_calls(), expected_requests as usize);
            assert!(paged.is_complete());
        }
    }

    #[tokio::test]
    async fn test_pagination_sends_page_fields_and_base_payload() {
        let api = FakeApi::with_telemetry((0..5).map(|i| json!({ "HWID": i })).collect());
        fetch_all_pages(&api, "telemetry", &payload(), "tok", &options(2)).await;

        let sent = api.sent_payloads();
        assert_eq!(sent.len(), 3);
        for (i, body) in sent.iter().enumerate() {
            assert_eq!(body.get("pageNumber"), Some(&json!(i + 1)));
            assert_eq!(body.get("pageSize"), Some(&json!(2)));
            assert_eq!(body.get("dealerId"), Some(&json!(7)));
        }
    }

    #[tokio::test]
    async fn test_page_error_keeps_partial_results() {
        let api = FakeApi::with_telemetry((0..10).map(|i| json!({ "HWID": i })).collect());
        api.fail_telemetry_page(3, SyncError::Fetch { endpoint: "telemetry".into(), message: "timeout".into() });

        let paged = fetch_all_pages(&api, "telemetry", &payload(), "tok", &options(2)).await;

        assert_eq!(paged.records.len(), 4);
        assert_eq!(paged.requests, 3);
        assert!(matches!(paged.failure(), Some(SyncError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_max_pages_stops_pagination() {
        let api = FakeApi::with_telemetry((0..10).map(|i| json!({ "HWID": i })).collect());
        let opts = PageOptions {
            page_size: 2,
            max_pages: 2,
            deadline: None,
        };

        let paged = fetch_all_pages(&api, "telemetry", &payload(), "tok", &opts).await;

        assert_eq!(paged.records.len(), 4);
        assert_eq!(paged.stopped, Some(PageStop::MaxPages));
    }

    #[tokio::test]
    async fn test_expired_deadline_issues_no_request() {
        let api = FakeApi::with_telemetry(vec![json!({ "HWID": 1 })]);
        let opts = PageOptions {
            deadline: Some(Instant::now() - Duration::from_millis(1)),
            ..options(10)
        };

        let paged = fetch_all_pages(&api, "telemetry", &payload(), "tok", &opts).await;

        assert_eq!(paged.requests, 0);
        assert_eq!(paged.stopped, Some(PageStop::Deadline));
    }
}
