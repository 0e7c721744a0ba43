//! Persisted copy of the portal token.
//!
//! The in-memory token in [`TokenCache`](crate::proxy::TokenCache) is the fast
//! path; the pair kept here is what survives a restart. Keys match the cookie
//! names the browser client uses (`arcgis_token`, `arcgis_token_expiry`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::AppResult;
use crate::models::token::{CachedToken, MAX_PERSISTED_LIFETIME_MS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    pub arcgis_token: String,
    /// Epoch milliseconds, stored as a string
    pub arcgis_token_expiry: String,
}

impl From<&CachedToken> for PersistedToken {
    fn from(token: &CachedToken) -> Self {
        Self {
            arcgis_token: token.value.clone(),
            arcgis_token_expiry: token.expires_at.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedState {
    Usable(CachedToken),
    /// Well-formed but inside the buffer window or past expiry
    Stale,
    /// Unparseable expiry, empty token, or an expiry beyond the one-year ceiling
    Corrupt,
}

impl PersistedToken {
    pub fn classify(&self, now_ms: i64, buffer_ms: i64) -> PersistedState {
        if self.arcgis_token.trim().is_empty() {
            return PersistedState::Corrupt;
        }
        let Ok(expires_at) = self.arcgis_token_expiry.trim().parse::<i64>() else {
            return PersistedState::Corrupt;
        };
        if expires_at > now_ms.saturating_add(MAX_PERSISTED_LIFETIME_MS) {
            return PersistedState::Corrupt;
        }

        let token = CachedToken::new(self.arcgis_token.clone(), expires_at);
        if token.is_usable_at(now_ms, buffer_ms) {
            PersistedState::Usable(token)
        } else {
            PersistedState::Stale
        }
    }
}

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<PersistedToken>;
    fn save(&self, token: &PersistedToken) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<PersistedToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: PersistedToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<PersistedToken> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, token: &PersistedToken) -> AppResult<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// JSON file holding the token pair
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<PersistedToken> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {:?}: {}", self.path, e);
                // Surface as corrupt so the caller clears it
                Some(PersistedToken {
                    arcgis_token: String::new(),
                    arcgis_token_expiry: String::new(),
                })
            }
        }
    }

    fn save(&self, token: &PersistedToken) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(token)?)?;

        // Contains a live credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
