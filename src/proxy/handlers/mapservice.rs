// Map service reverse proxy handler
use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::proxy::common::utils::{build_target_url, parse_query};
use crate::proxy::error::ProxyError;
use crate::proxy::server::AppState;

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// ArcGIS reports an invalid/expired token with 498
const INVALID_TOKEN_STATUS: u16 = 498;

/// `/api/mapservice` with no service segment
pub async fn handle_root(State(state): State<AppState>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.discovery_path.as_str())],
    )
        .into_response()
}

/// `/api/mapservice/{service}`
pub async fn handle_service(
    State(state): State<AppState>,
    Path(service_name): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    proxy_request(&state, &service_name, "", method, query, headers, body).await
}

/// `/api/mapservice/{service}/{*path}`
pub async fn handle_service_path(
    State(state): State<AppState>,
    Path((service_name, sub_path)): Path<(String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    proxy_request(&state, &service_name, &sub_path, method, query, headers, body).await
}

/// `GET /api/services`: names only, backend URLs stay private
pub async fn handle_list_services(State(state): State<AppState>) -> Response {
    let directory = state.directory.get_services().await;
    if directory.is_empty() {
        return ProxyError::NoServices.into_response();
    }
    Json(json!({ "services": directory.names() })).into_response()
}

async fn proxy_request(
    state: &AppState,
    service_name: &str,
    sub_path: &str,
    method: Method,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match forward(state, service_name, sub_path, method, query, headers, body).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ProxyError::Internal(details) => {
                    tracing::error!("Proxy request to {} failed: {}", service_name, details)
                }
                other => debug!("Proxy request to {} rejected: {}", service_name, other),
            }
            e.into_response()
        }
    }
}

async fn forward(
    state: &AppState,
    service_name: &str,
    sub_path: &str,
    method: Method,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    // 1. Resolve directory
    let directory = state.directory.get_services().await;
    if directory.is_empty() {
        return Err(ProxyError::NoServices);
    }

    // 2. Resolve service name
    let service_url = directory
        .get(service_name)
        .ok_or_else(|| ProxyError::UnknownService {
            name: service_name.to_string(),
            available: directory.names(),
        })?
        .to_string();

    let query = parse_query(query.as_deref());

    // 3. Attach token and send; one retry if upstream rejects the token
    let mut token = state.tokens.get_token().await.ok();
    if token.is_none() {
        warn!("No portal token available, forwarding {} without one", service_name);
    }

    let mut attempt = 0;
    let response = loop {
        attempt += 1;
        let target = build_target_url(&service_url, sub_path, &query, token.as_deref())?;
        debug!("Forwarding {} {} -> {}", method, service_name, target.path());

        let response = state
            .upstream
            .forward(method.clone(), target, &headers, body.clone())
            .await?;

        let status = response.status().as_u16();
        let rejected =
            status == StatusCode::UNAUTHORIZED.as_u16() || status == INVALID_TOKEN_STATUS;
        let retry_with = if rejected && attempt == 1 {
            token.take()
        } else {
            None
        };
        if let Some(used) = retry_with {
            info!(
                "Upstream rejected token for {} (HTTP {}), refreshing and retrying",
                service_name, status
            );
            state.tokens.invalidate_if(&used).await;
            token = state.tokens.get_token().await.ok();
            continue;
        }
        break response;
    };

    // 4. Relay response
    let status = response.status();
    if !status.is_success() {
        return Err(ProxyError::Upstream(status));
    }

    let mut builder = Response::builder()
        .status(status)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS)
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);

    // Body bytes are relayed untouched, so the encoding header travels with them
    for name in [header::CONTENT_TYPE, header::CONTENT_ENCODING] {
        if let Some(value) = response.headers().get(&name) {
            builder = builder.header(name.clone(), value.clone());
        }
    }

    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|e| ProxyError::Internal(e.to_string()))
}
