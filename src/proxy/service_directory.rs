use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::models::token::now_ms;
use crate::models::PortalConfig;
use crate::modules::arcgis::PortalClient;
use crate::proxy::common::utils::derive_service_name;
use crate::proxy::TokenCache;

/// Service name -> backend URL, in discovery order.
///
/// The first URL seen for a name wins; later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDirectory {
    entries: Vec<(String, String)>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the name was already present
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) -> bool {
        let name = name.into();
        if self.get(&name).is_some() {
            return false;
        }
        self.entries.push((name, url.into()));
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ServiceDirectory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, url) in &self.entries {
            map.serialize_entry(name, url)?;
        }
        map.end()
    }
}

struct CachedDirectory {
    directory: ServiceDirectory,
    expires_at: i64,
}

/// Directory of map services shared to the configured portal groups, rebuilt
/// from scratch once its TTL lapses.
pub struct ServiceDirectoryCache {
    portal: Arc<PortalClient>,
    tokens: Arc<TokenCache>,
    group_prefix: String,
    page_size: u32,
    ttl_ms: i64,
    cached: RwLock<Option<CachedDirectory>>,
    rebuild_lock: Mutex<()>,
}

impl ServiceDirectoryCache {
    pub fn new(portal: Arc<PortalClient>, tokens: Arc<TokenCache>, config: &PortalConfig) -> Self {
        Self {
            portal,
            tokens,
            group_prefix: config.group_prefix.clone(),
            page_size: config.group_page_size,
            ttl_ms: config.service_cache_ttl_ms(),
            cached: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Current directory; empty means the service layer is unavailable
    pub async fn get_services(&self) -> ServiceDirectory {
        if let Some(directory) = self.fresh().await {
            return directory;
        }

        let _guard = self.rebuild_lock.lock().await;
        if let Some(directory) = self.fresh().await {
            return directory;
        }

        let directory = self.rebuild().await;
        if directory.is_empty() {
            // Not cached, so the next request retries discovery
            tracing::warn!("Service discovery produced no map services");
        } else {
            tracing::info!("Discovered {} map services", directory.len());
            *self.cached.write().await = Some(CachedDirectory {
                directory: directory.clone(),
                expires_at: now_ms().saturating_add(self.ttl_ms),
            });
        }
        directory
    }

    async fn fresh(&self) -> Option<ServiceDirectory> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|c| now_ms() < c.expires_at && !c.directory.is_empty())
            .map(|c| c.directory.clone())
    }

    async fn rebuild(&self) -> ServiceDirectory {
        let mut directory = ServiceDirectory::new();

        let token = match self.tokens.get_token().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Service discovery skipped, no portal token: {}", e);
                return directory;
            }
        };

        let groups = match self
            .portal
            .search_groups(&token, &self.group_prefix, self.page_size)
            .await
        {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!("Failed to search portal groups: {}", e);
                return directory;
            }
        };
        tracing::debug!(
            "Found {} groups with prefix {}",
            groups.len(),
            self.group_prefix
        );

        for group in groups {
            let items = match self.portal.group_content(&token, &group.id).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("Skipping group {} ({}): {}", group.title, group.id, e);
                    continue;
                }
            };

            for url in items.iter().filter_map(|item| item.map_service_url()) {
                match derive_service_name(url) {
                    Some(name) => {
                        if !directory.insert(name.clone(), url) {
                            tracing::debug!("Duplicate service name {} ignored: {}", name, url);
                        }
                    }
                    None => tracing::debug!("No service name in URL {}", url),
                }
            }
        }

        directory
    }
}
