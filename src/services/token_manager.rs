//! Gestión del token del proveedor
//!
//! Un único bearer token compartido por todo el proceso. Se obtiene en el
//! primer uso, se reutiliza entre ciclos y se descarta cuando el proveedor
//! lo rechaza; el siguiente ciclo vuelve a hacer login. Nunca se persiste.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::clients::telematics_client::TelematicsApi;
use crate::config::environment::ProviderCredentials;
use crate::utils::errors::SyncError;

/// Token de autenticación del proveedor
#[derive(Clone, Debug)]
pub struct AuthToken {
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(token: String) -> Self {
        Self {
            token,
            acquired_at: Utc::now(),
        }
    }
}

pub struct TokenManager {
    credentials: ProviderCredentials,
    current: RwLock<Option<AuthToken>>,
}

impl TokenManager {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            credentials,
            current: RwLock::new(None),
        }
    }

    /// Devolver el token cacheado o hacer login si no hay ninguno
    pub async fn acquire(&self, api: &dyn TelematicsApi) -> Result<String, SyncError> {
        if let Some(cached) = self.current.read().await.as_ref() {
            return Ok(cached.token.clone());
        }

        let mut slot = self.current.write().await;
        // otro llamador pudo haber hecho login mientras esperábamos el lock
        if let Some(cached) = slot.as_ref() {
            return Ok(cached.token.clone());
        }

        match api.login(&self.credentials).await {
            Ok(token) => {
                tracing::info!("🔑 Token del proveedor obtenido para {}", self.credentials.username);
                *slot = Some(AuthToken::new(token.clone()));
                Ok(token)
            }
            Err(e) => {
                tracing::warn!("⚠️ No se pudo obtener token del proveedor: {}", e);
                *slot = None;
                Err(e)
            }
        }
    }

    /// Descartar el token tras un error de autenticación
    pub async fn invalidate(&self) {
        let mut slot = self.current.write().await;
        if let Some(token) = slot.take() {
            let age = Utc::now() - token.acquired_at;
            tracing::info!(age_secs = age.num_seconds(), "🗑️ Token del proveedor invalidado");
        }
    }

    pub async fn current(&self) -> Option<AuthToken> {
        self.current.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_credentials, FakeApi};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_token_is_reused() {
        let api = FakeApi::default();
        let manager = TokenManager::new(test_credentials());

        assert_eq!(manager.acquire(&api).await.unwrap(), "token-1");
        assert_eq!(manager.acquire(&api).await.unwrap(), "token-1");
        assert_eq!(api.login_calls(), 1);
        assert!(manager.current().await.is_some());
    }

    #[tokio::test]
    async fn test_failed_login_clears_token() {
        let api = FakeApi::default();
        api.set_login(Err(SyncError::Auth("bad credentials".into())));
        let manager = TokenManager::new(test_credentials());

        let result = manager.acquire(&api).await;

        assert!(matches!(result, Err(SyncError::Auth(_))));
        assert!(manager.current().await.is_none());

        // el siguiente intento vuelve a llamar al login
        api.set_login(Ok("token-2".into()));
        assert_eq!(manager.acquire(&api).await.unwrap(), "token-2");
        assert_eq!(api.login_calls(), 2);
    }

    #[tokio::test]
    async fn test_token_records_acquisition_time() {
        let api = FakeApi::default();
        let manager = TokenManager::new(test_credentials());
        let before = Utc::now();

        manager.acquire(&api).await.unwrap();

        let token = manager.current().await.unwrap();
        assert!(token.acquired_at >= before);
        assert!(token.acquired_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_login() {
        let api = FakeApi::default();
        let manager = TokenManager::new(test_credentials());

        manager.acquire(&api).await.unwrap();
        manager.invalidate().await;
        assert!(manager.current().await.is_none());

        api.set_login(Ok("token-2".into()));
        assert_eq!(manager.acquire(&api).await.unwrap(), "token-2");
        assert_eq!(api.login_calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_logs_in_once() {
        let api = Arc::new(FakeApi::default());
        let manager = Arc::new(TokenManager::new(test_credentials()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let api = api.clone();
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire(api.as_ref()).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(api.login_calls(), 1);
    }
}
