use serde::{Deserialize, Serialize};

/// `error` object returned inside HTTP 200 bodies by the portal REST API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
}

impl PortalErrorBody {
    pub fn describe(&self) -> String {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match self.code {
            Some(code) => format!("{} ({})", message, code),
            None => message.to_string(),
        }
    }
}

/// generateToken response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub error: Option<PortalErrorBody>,
}

/// portals/self response; only the error marker matters
#[derive(Debug, Deserialize)]
pub struct PortalSelfResponse {
    #[serde(default)]
    pub error: Option<PortalErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalGroup {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupSearchResponse {
    #[serde(default)]
    pub results: Vec<PortalGroup>,
    #[serde(default)]
    pub error: Option<PortalErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub const MAP_SERVICE_ITEM_TYPE: &str = "Map Service";

impl PortalItem {
    /// URL of a map service item, if this is one
    pub fn map_service_url(&self) -> Option<&str> {
        if self.item_type != MAP_SERVICE_ITEM_TYPE {
            return None;
        }
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupContentResponse {
    #[serde(default)]
    pub items: Vec<PortalItem>,
    #[serde(default)]
    pub error: Option<PortalErrorBody>,
}
