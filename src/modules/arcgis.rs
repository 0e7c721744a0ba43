use reqwest::Client;

use crate::error::{AppError, AppResult, AuthError};
use crate::models::portal::{
    GroupContentResponse, GroupSearchResponse, PortalGroup, PortalItem, PortalSelfResponse,
    TokenResponse,
};
use crate::models::PortalConfig;

/// Thin client for the portal's sharing REST API
pub struct PortalClient {
    http: Client,
    portal_url: String,
    token_service_url: String,
    username: String,
    password: String,
    referer: String,
    token_duration_minutes: i64,
}

impl PortalClient {
    pub fn new(config: &PortalConfig, http: Client) -> Self {
        Self {
            http,
            portal_url: config.portal_url.clone(),
            token_service_url: config.token_service_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            referer: config.app_base_url.clone(),
            token_duration_minutes: config.token_duration_minutes,
        }
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/sharing/rest/{}", self.portal_url, path)
    }

    /// Exchange the service credentials for a token
    pub async fn generate_token(&self) -> Result<String, AuthError> {
        let expiration = self.token_duration_minutes.to_string();
        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("client", "referer"),
            ("referer", self.referer.as_str()),
            ("expiration", expiration.as_str()),
            ("f", "json"),
        ];

        tracing::debug!("Requesting portal token for {}", self.username);

        let response = self
            .http
            .post(&self.token_service_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Status(response.status().as_u16()));
        }

        let body: TokenResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(AuthError::Rejected(error.describe()));
        }

        match body.token {
            Some(token) if !token.is_empty() => {
                tracing::info!(
                    "Token exchange successful! token: {}..., expires: {:?}",
                    token.chars().take(8).collect::<String>(),
                    body.expires
                );
                Ok(token)
            }
            _ => Err(AuthError::MissingToken),
        }
    }

    /// Check a token against `portals/self`.
    ///
    /// `Ok(false)` means the portal answered with an error payload.
    pub async fn validate_token(&self, token: &str) -> Result<bool, AuthError> {
        let response = self
            .http
            .get(self.rest_url("portals/self"))
            .query(&[("f", "json"), ("token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Status(response.status().as_u16()));
        }

        let body: PortalSelfResponse = response.json().await?;
        match body.error {
            Some(error) => {
                tracing::warn!("Token rejected by portal: {}", error.describe());
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Search groups by title prefix
    pub async fn search_groups(
        &self,
        token: &str,
        prefix: &str,
        page_size: u32,
    ) -> AppResult<Vec<PortalGroup>> {
        let num = page_size.to_string();
        let response = self
            .http
            .get(self.rest_url("community/groups"))
            .query(&[
                ("f", "json"),
                ("q", prefix),
                ("token", token),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Portal(format!(
                "Group search returned HTTP {}",
                response.status()
            )));
        }

        let body: GroupSearchResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(AppError::Portal(format!(
                "Group search failed: {}",
                error.describe()
            )));
        }

        // q is a full-text search; keep only real prefix matches
        Ok(body
            .results
            .into_iter()
            .filter(|g| g.title.starts_with(prefix))
            .collect())
    }

    /// List the content items shared to a group
    pub async fn group_content(&self, token: &str, group_id: &str) -> AppResult<Vec<PortalItem>> {
        let response = self
            .http
            .get(self.rest_url(&format!("content/groups/{}", group_id)))
            .query(&[("f", "json"), ("token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Portal(format!(
                "Group {} content returned HTTP {}",
                group_id,
                response.status()
            )));
        }

        let body: GroupContentResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(AppError::Portal(format!(
                "Group {} content failed: {}",
                group_id,
                error.describe()
            )));
        }

        Ok(body.items)
    }
}
