use crate::proxy::ProxyConfig;
use std::fmt;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub proxy: ProxyConfig,
    pub log_dir: Option<PathBuf>,
}

/// Portal connection and credential settings
#[derive(Clone)]
pub struct PortalConfig {
    /// Portal base URL, e.g. `https://gis.example.com/portal`
    pub portal_url: String,
    /// Token (credential exchange) endpoint
    pub token_service_url: String,
    pub username: String,
    pub password: String,
    /// Sent as `referer` in the credential exchange
    pub app_base_url: String,
    /// Only groups whose title starts with this prefix are scanned
    pub group_prefix: String,
    pub token_duration_minutes: i64,
    pub token_buffer_secs: i64,
    pub service_cache_ttl_secs: i64,
    pub group_page_size: u32,
    /// Where the token pair survives restarts; `None` keeps it in memory
    pub token_store_path: Option<PathBuf>,
}

pub const DEFAULT_TOKEN_DURATION_MINUTES: i64 = 60;
pub const DEFAULT_TOKEN_BUFFER_SECS: i64 = 300;
pub const DEFAULT_SERVICE_CACHE_TTL_SECS: i64 = 300;
pub const DEFAULT_GROUP_PAGE_SIZE: u32 = 100;

impl PortalConfig {
    pub fn new(
        portal_url: impl Into<String>,
        token_service_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        app_base_url: impl Into<String>,
        group_prefix: impl Into<String>,
    ) -> Self {
        Self {
            portal_url: trim_url(portal_url.into()),
            token_service_url: trim_url(token_service_url.into()),
            username: username.into(),
            password: password.into(),
            app_base_url: trim_url(app_base_url.into()),
            group_prefix: group_prefix.into(),
            token_duration_minutes: DEFAULT_TOKEN_DURATION_MINUTES,
            token_buffer_secs: DEFAULT_TOKEN_BUFFER_SECS,
            service_cache_ttl_secs: DEFAULT_SERVICE_CACHE_TTL_SECS,
            group_page_size: DEFAULT_GROUP_PAGE_SIZE,
            token_store_path: None,
        }
    }

    pub fn token_duration_ms(&self) -> i64 {
        self.token_duration_minutes.saturating_mul(60_000)
    }

    pub fn token_buffer_ms(&self) -> i64 {
        self.token_buffer_secs.saturating_mul(1000)
    }

    pub fn service_cache_ttl_ms(&self) -> i64 {
        self.service_cache_ttl_secs.saturating_mul(1000)
    }
}

// Keep the password out of logs
impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("portal_url", &self.portal_url)
            .field("token_service_url", &self.token_service_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("app_base_url", &self.app_base_url)
            .field("group_prefix", &self.group_prefix)
            .field("token_duration_minutes", &self.token_duration_minutes)
            .field("token_buffer_secs", &self.token_buffer_secs)
            .field("service_cache_ttl_secs", &self.service_cache_ttl_secs)
            .field("group_page_size", &self.group_page_size)
            .field("token_store_path", &self.token_store_path)
            .finish()
    }
}

pub(crate) fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
