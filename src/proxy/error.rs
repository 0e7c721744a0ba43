use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

pub const NO_SERVICES_MESSAGE: &str = "No services available or authentication failed.";

/// Terminal failures of the map-service proxy pipeline
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{}", NO_SERVICES_MESSAGE)]
    NoServices,

    #[error("Service '{name}' not found")]
    UnknownService {
        name: String,
        available: Vec<String>,
    },

    #[error("Upstream service error: {0}")]
    Upstream(StatusCode),

    #[error("Proxy error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        ProxyError::Internal(e.to_string())
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(e: url::ParseError) -> Self {
        ProxyError::Internal(format!("invalid target URL: {}", e))
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoServices => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UnknownService { .. } => StatusCode::NOT_FOUND,
            ProxyError::Upstream(status) => *status,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ProxyError::UnknownService { available, .. } => json!({
                "error": self.to_string(),
                "availableServices": available,
            }),
            ProxyError::Internal(details) => json!({
                "error": "Proxy error",
                "details": details,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
