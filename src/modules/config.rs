use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::config::trim_url;
use crate::models::token::MAX_PERSISTED_LIFETIME_MS;
use crate::models::{AppConfig, PortalConfig};
use crate::proxy::config::{ProxyConfig, UpstreamProxyConfig};

pub const ENV_PORTAL_URL: &str = "PORTAL_URL";
pub const ENV_TOKEN_SERVICE_URL: &str = "TOKEN_SERVICE_URL";
pub const ENV_USERNAME: &str = "PORTAL_USERNAME";
pub const ENV_PASSWORD: &str = "PORTAL_PASSWORD";
pub const ENV_APP_BASE_URL: &str = "APP_BASE_URL";
pub const ENV_GROUP_PREFIX: &str = "PORTAL_GROUP_PREFIX";
pub const ENV_TOKEN_DURATION_MINUTES: &str = "TOKEN_DURATION_MINUTES";
pub const ENV_TOKEN_BUFFER_SECONDS: &str = "TOKEN_BUFFER_SECONDS";
pub const ENV_SERVICE_CACHE_TTL_SECONDS: &str = "SERVICE_CACHE_TTL_SECONDS";
pub const ENV_TOKEN_STORE_PATH: &str = "TOKEN_STORE_PATH";
pub const ENV_PROXY_PORT: &str = "PROXY_PORT";
pub const ENV_PROXY_ALLOW_LAN: &str = "PROXY_ALLOW_LAN";
pub const ENV_PROXY_REQUEST_TIMEOUT_SECONDS: &str = "PROXY_REQUEST_TIMEOUT_SECONDS";
pub const ENV_UPSTREAM_PROXY_URL: &str = "UPSTREAM_PROXY_URL";
pub const ENV_DISCOVERY_PATH: &str = "DISCOVERY_PATH";
pub const ENV_LOG_DIR: &str = "LOG_DIR";

/// Longer lifetimes would be discarded as corrupt when read back from the store
pub const MAX_TOKEN_DURATION_MINUTES: i64 = MAX_PERSISTED_LIFETIME_MS / 60_000;
pub const MAX_WINDOW_SECS: i64 = MAX_PERSISTED_LIFETIME_MS / 1000;

/// Load application config from the process environment (and `.env`, if present).
///
/// Every required setting is checked here so a misconfigured deployment fails
/// at startup instead of on the first proxied request.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    let _ = dotenvy::dotenv();
    load_app_config_from(|key| std::env::var(key).ok())
}

/// Same as [`load_app_config`], reading variables through `lookup`
pub fn load_app_config_from<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let portal_url = required_url(&lookup, ENV_PORTAL_URL)?;
    let token_service_url = required_url(&lookup, ENV_TOKEN_SERVICE_URL)?;
    let username = required(&lookup, ENV_USERNAME)?;
    let password = required(&lookup, ENV_PASSWORD)?;
    let app_base_url = required_url(&lookup, ENV_APP_BASE_URL)?;
    let group_prefix = required(&lookup, ENV_GROUP_PREFIX)?;

    let mut portal = PortalConfig::new(
        portal_url,
        token_service_url,
        username,
        password,
        app_base_url,
        group_prefix,
    );

    if let Some(minutes) = bounded(
        &lookup,
        ENV_TOKEN_DURATION_MINUTES,
        1,
        MAX_TOKEN_DURATION_MINUTES,
    )? {
        portal.token_duration_minutes = minutes;
    }
    if let Some(secs) = bounded(&lookup, ENV_TOKEN_BUFFER_SECONDS, 0, MAX_WINDOW_SECS)? {
        portal.token_buffer_secs = secs;
    }
    if let Some(secs) = bounded(&lookup, ENV_SERVICE_CACHE_TTL_SECONDS, 0, MAX_WINDOW_SECS)? {
        portal.service_cache_ttl_secs = secs;
    }
    portal.token_store_path = optional(&lookup, ENV_TOKEN_STORE_PATH).map(PathBuf::from);

    let mut proxy = ProxyConfig::default();
    if let Some(port) = parsed::<u16, _>(&lookup, ENV_PROXY_PORT)? {
        proxy.port = port;
    }
    if let Some(raw) = optional(&lookup, ENV_PROXY_ALLOW_LAN) {
        proxy.allow_lan_access = parse_flag(&raw)
            .ok_or_else(|| invalid(ENV_PROXY_ALLOW_LAN, &raw, "expected true or false"))?;
    }
    proxy.request_timeout = parsed::<u64, _>(&lookup, ENV_PROXY_REQUEST_TIMEOUT_SECONDS)?;
    if let Some(url) = optional(&lookup, ENV_UPSTREAM_PROXY_URL) {
        proxy.upstream_proxy = UpstreamProxyConfig { enabled: true, url };
    }
    if let Some(path) = optional(&lookup, ENV_DISCOVERY_PATH) {
        proxy.discovery_path = path;
    }

    Ok(AppConfig {
        portal,
        proxy,
        log_dir: optional(&lookup, ENV_LOG_DIR).map(PathBuf::from),
    })
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or(ConfigError::Missing(name))
}

fn required_url<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, name)?;
    url::Url::parse(&raw).map_err(|e| invalid(name, &raw, e))?;
    Ok(trim_url(raw))
}

fn parsed<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, &raw, e)),
        None => Ok(None),
    }
}

fn bounded<F>(
    lookup: &F,
    name: &'static str,
    min: i64,
    max: i64,
) -> Result<Option<i64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parsed::<i64, _>(lookup, name)? {
        Some(v) if v < min || v > max => Err(invalid(
            name,
            v,
            format!("must be between {} and {}", min, max),
        )),
        other => Ok(other),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(name: &'static str, value: impl Display, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
