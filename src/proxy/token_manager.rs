use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::AuthError;
use crate::models::token::{now_ms, CachedToken};
use crate::models::PortalConfig;
use crate::modules::arcgis::PortalClient;
use crate::modules::token_store::{PersistedState, PersistedToken, TokenStore};

/// Keeps one portal token fresh for all request handlers.
///
/// Lookup order: in-memory token, then the persisted pair, then a credential
/// exchange. Concurrent callers that miss the cache share a single exchange.
pub struct TokenCache {
    portal: Arc<PortalClient>,
    store: Arc<dyn TokenStore>,
    current: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
    duration_ms: i64,
    buffer_ms: i64,
}

impl TokenCache {
    pub fn new(portal: Arc<PortalClient>, store: Arc<dyn TokenStore>, config: &PortalConfig) -> Self {
        Self {
            portal,
            store,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            duration_ms: config.token_duration_ms(),
            buffer_ms: config.token_buffer_ms(),
        }
    }

    /// Get a currently usable token, exchanging credentials only when needed
    pub async fn get_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.usable_in_memory().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.usable_in_memory().await {
            return Ok(token);
        }

        if let Some(token) = self.adopt_persisted().await {
            return Ok(token);
        }

        self.exchange().await
    }

    /// Drop the token everywhere, e.g. after the upstream rejected it
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
        self.clear_store();
        tracing::info!("Portal token invalidated");
    }

    /// Drop the token only if it is still `rejected`.
    ///
    /// Returns false when another caller already replaced it, in which case
    /// the replacement is kept.
    pub async fn invalidate_if(&self, rejected: &str) -> bool {
        let _guard = self.refresh_lock.lock().await;
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|t| t.value != rejected) {
            tracing::debug!("Rejected token already replaced, keeping the new one");
            return false;
        }
        *current = None;
        drop(current);
        self.clear_store();
        tracing::info!("Portal token invalidated");
        true
    }

    /// Token currently held in memory, usable or not
    pub async fn current(&self) -> Option<CachedToken> {
        self.current.read().await.clone()
    }

    async fn usable_in_memory(&self) -> Option<String> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|t| t.is_usable(self.buffer_ms))
            .map(|t| t.value.clone())
    }

    async fn adopt_persisted(&self) -> Option<String> {
        let persisted = self.store.load()?;
        match persisted.classify(now_ms(), self.buffer_ms) {
            PersistedState::Usable(token) => {
                tracing::info!("Adopted persisted token {}...", token.preview());
                let value = token.value.clone();
                *self.current.write().await = Some(token);
                Some(value)
            }
            PersistedState::Stale => {
                tracing::debug!("Persisted token is stale, discarding");
                self.clear_store();
                None
            }
            PersistedState::Corrupt => {
                tracing::warn!("Persisted token pair is corrupt, discarding");
                self.clear_store();
                None
            }
        }
    }

    async fn exchange(&self) -> Result<String, AuthError> {
        let value = match self.portal.generate_token().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Token exchange failed: {}", e);
                return Err(e);
            }
        };

        let value = match self.portal.validate_token(&value).await {
            Ok(true) => value,
            Ok(false) => {
                tracing::warn!("Fresh token failed validation, exchanging once more");
                self.portal.generate_token().await.map_err(|e| {
                    tracing::error!("Second token exchange failed: {}", e);
                    e
                })?
            }
            Err(e) => {
                tracing::warn!("Token validation unavailable ({}), accepting token", e);
                value
            }
        };

        let token = CachedToken::new(value, now_ms().saturating_add(self.duration_ms));
        if let Err(e) = self.store.save(&PersistedToken::from(&token)) {
            tracing::warn!("Failed to persist token: {}", e);
        }

        let result = token.value.clone();
        *self.current.write().await = Some(token);
        Ok(result)
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear persisted token: {}", e);
        }
    }
}
