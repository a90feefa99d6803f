//! Sistema de manejo de errores
//!
//! Este módulo define los errores del motor de sincronización (`SyncError`)
//! y los errores HTTP de la aplicación (`AppError`) con su conversión a
//! respuestas apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errores del ciclo de sincronización y del path de ingestión
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// No se pudo obtener un token del proveedor
    #[error("Auth failure: {0}")]
    Auth(String),

    /// El proveedor rechazó el token (401/403)
    #[error("Unauthorized by provider on {endpoint} (HTTP {status})")]
    Unauthorized { endpoint: String, status: u16 },

    /// Falló la petición de una página
    #[error("Fetch failure on {endpoint}: {message}")]
    Fetch { endpoint: String, message: String },

    #[error("Persist failure: {0}")]
    Persist(String),

    #[error("Validation failure: {0}")]
    Validation(String),
}

impl SyncError {
    /// Errores de clase autenticación: invalidan el token cacheado
    pub fn is_auth_class(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::Unauthorized { .. })
    }
}

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("External API error: {0}")]
    ExternalApi(String),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(msg) => AppError::BadRequest(msg),
            SyncError::Persist(msg) => AppError::Internal(msg),
            other => AppError::ExternalApi(other.to_string()),
        }
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Database(e) => {
                tracing::error!("❌ Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Database Error".to_string(),
                        message: "An error occurred while accessing the database".to_string(),
                        details: Some(json!({ "sql_error": e.to_string() })),
                        code: Some("DB_ERROR".to_string()),
                    },
                )
            }

            AppError::Validation(e) => {
                tracing::warn!("⚠️ Validation error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Validation Error".to_string(),
                        message: "The provided data is invalid".to_string(),
                        details: Some(json!(e)),
                        code: Some("VALIDATION_ERROR".to_string()),
                    },
                )
            }

            AppError::NotFound(msg) => {
                tracing::debug!("Resource not found: {}", msg);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        error: "Not Found".to_string(),
                        message: msg,
                        details: None,
                        code: Some("NOT_FOUND".to_string()),
                    },
                )
            }

            AppError::BadRequest(msg) => {
                tracing::warn!("⚠️ Bad request: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Bad Request".to_string(),
                        message: msg,
                        details: None,
                        code: Some("BAD_REQUEST".to_string()),
                    },
                )
            }

            AppError::Internal(msg) => {
                tracing::error!("❌ Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal Server Error".to_string(),
                        message: "An unexpected error occurred".to_string(),
                        details: Some(json!({ "internal_error": msg })),
                        code: Some("INTERNAL_ERROR".to_string()),
                    },
                )
            }

            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("⚠️ Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse {
                        error: "Service Unavailable".to_string(),
                        message: msg,
                        details: None,
                        code: Some("SERVICE_UNAVAILABLE".to_string()),
                    },
                )
            }

            AppError::ExternalApi(msg) => {
                tracing::error!("❌ External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse {
                        error: "External API Error".to_string(),
                        message: "An error occurred while communicating with the telematics provider".to_string(),
                        details: Some(json!({ "external_api_error": msg })),
                        code: Some("EXTERNAL_API_ERROR".to_string()),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de solicitud incorrecta
pub fn bad_request_error(message: &str) -> AppError {
    AppError::BadRequest(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_auth_class() {
        assert!(SyncError::Auth("boom".into()).is_auth_class());
        assert!(SyncError::Unauthorized { endpoint: "x".into(), status: 401 }.is_auth_class());
        assert!(!SyncError::Fetch { endpoint: "x".into(), message: "timeout".into() }.is_auth_class());
    }

    #[test]
    fn test_sync_error_maps_to_http_status() {
        let resp = AppError::from(SyncError::Validation("payload must be an array".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::from(SyncError::Persist("disk full".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = AppError::from(SyncError::Auth("bad credentials".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
