#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Stub portal, token service and map server for integration tests.
//!
//! Everything runs on one ephemeral `127.0.0.1` listener:
//! - `POST /portal/sharing/rest/generateToken`
//! - `GET  /portal/sharing/rest/portals/self`
//! - `GET  /portal/sharing/rest/community/groups`
//! - `GET  /portal/sharing/rest/content/groups/:id`
//! - `ANY  /arcgis/rest/services/*rest`

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Form, Json, Router,
};
use gportal_proxy_lib::models::{AppConfig, PortalConfig};
use gportal_proxy_lib::proxy::ProxyConfig;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

/// Ways the group search endpoint can break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailure {
    ServerError,
    ErrorPayload,
    Garbage,
}

#[derive(Default)]
pub struct StubState {
    pub token_requests: AtomicUsize,
    pub validate_requests: AtomicUsize,
    pub group_requests: AtomicUsize,
    pub content_requests: AtomicUsize,
    pub token_delay_ms: AtomicU64,
    /// Served in order; `{"token":"T1"}` once empty
    pub token_responses: Mutex<VecDeque<Value>>,
    pub token_forms: Mutex<Vec<HashMap<String, String>>>,
    /// portals/self answers with an error payload for these
    pub rejected_tokens: Mutex<HashSet<String>>,
    /// The map server answers 401 (or `expired_status`) for these
    pub expired_tokens: Mutex<HashSet<String>>,
    pub expired_status: AtomicU16,
    /// portals/self answers HTTP 500
    pub validation_down: AtomicBool,
    pub search_failure: Mutex<Option<SearchFailure>>,
    pub groups: Mutex<Vec<Value>>,
    /// Group id -> content response; unknown ids get HTTP 500
    pub group_items: Mutex<HashMap<String, Value>>,
    pub map_requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Clone, Default)]
pub struct PortalStub {
    pub state: Arc<StubState>,
}

impl PortalStub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_token_response(&self, body: Value) {
        self.state.token_responses.lock().unwrap().push_back(body);
    }

    pub fn reject_token(&self, token: &str) {
        self.state.rejected_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn expire_token(&self, token: &str) {
        self.state.expired_tokens.lock().unwrap().insert(token.to_string());
    }

    /// Status the map server uses for expired tokens instead of 401
    pub fn set_expired_status(&self, status: StatusCode) {
        self.state
            .expired_status
            .store(status.as_u16(), Ordering::SeqCst);
    }

    pub fn set_validation_down(&self, down: bool) {
        self.state.validation_down.store(down, Ordering::SeqCst);
    }

    pub fn set_search_failure(&self, failure: Option<SearchFailure>) {
        *self.state.search_failure.lock().unwrap() = failure;
    }

    pub fn add_group(&self, id: &str, title: &str, items: Value) {
        self.state
            .groups
            .lock()
            .unwrap()
            .push(json!({ "id": id, "title": title }));
        self.state
            .group_items
            .lock()
            .unwrap()
            .insert(id.to_string(), json!({ "items": items }));
    }

    /// Group listed by search whose content endpoint fails
    pub fn add_broken_group(&self, id: &str, title: &str) {
        self.state
            .groups
            .lock()
            .unwrap()
            .push(json!({ "id": id, "title": title }));
    }

    pub fn set_token_delay(&self, delay: Duration) {
        self.state
            .token_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    pub fn validate_requests(&self) -> usize {
        self.state.validate_requests.load(Ordering::SeqCst)
    }

    pub fn group_requests(&self) -> usize {
        self.state.group_requests.load(Ordering::SeqCst)
    }

    pub fn content_requests(&self) -> usize {
        self.state.content_requests.load(Ordering::SeqCst)
    }

    pub fn token_forms(&self) -> Vec<HashMap<String, String>> {
        self.state.token_forms.lock().unwrap().clone()
    }

    pub fn map_requests(&self) -> Vec<RecordedRequest> {
        self.state.map_requests.lock().unwrap().clone()
    }

    /// Serve the stub on an ephemeral port
    pub async fn spawn(&self) -> SocketAddr {
        // Keep loopback traffic away from any proxy configured in the environment
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        std::env::set_var("no_proxy", "127.0.0.1,localhost");

        let app = Router::new()
            .route("/portal/sharing/rest/generateToken", post(generate_token))
            .route("/portal/sharing/rest/portals/self", get(portal_self))
            .route("/portal/sharing/rest/community/groups", get(search_groups))
            .route("/portal/sharing/rest/content/groups/:id", get(group_content))
            .route("/arcgis/rest/services/*rest", any(map_service))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

async fn generate_token(
    State(stub): State<PortalStub>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    stub.state.token_requests.fetch_add(1, Ordering::SeqCst);
    stub.state.token_forms.lock().unwrap().push(form);

    let delay = stub.state.token_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let next = stub.state.token_responses.lock().unwrap().pop_front();
    Json(next.unwrap_or_else(|| json!({ "token": "T1", "expires": 0, "ssl": false })))
}

async fn portal_self(
    State(stub): State<PortalStub>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    stub.state.validate_requests.fetch_add(1, Ordering::SeqCst);
    if stub.state.validation_down.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "portal down").into_response();
    }
    let token = params.get("token").cloned().unwrap_or_default();
    if stub.state.rejected_tokens.lock().unwrap().contains(&token) {
        return Json(json!({ "error": { "code": 498, "message": "Invalid token.", "details": [] } }))
            .into_response();
    }
    Json(json!({ "id": "portal0", "name": "Stub Portal" })).into_response()
}

async fn search_groups(State(stub): State<PortalStub>) -> Response {
    stub.state.group_requests.fetch_add(1, Ordering::SeqCst);
    let failure = *stub.state.search_failure.lock().unwrap();
    match failure {
        Some(SearchFailure::ServerError) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "search exploded").into_response()
        }
        Some(SearchFailure::ErrorPayload) => Json(json!({
            "error": { "code": 400, "message": "Unable to search groups.", "details": [] }
        }))
        .into_response(),
        Some(SearchFailure::Garbage) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            "<html>not json</html>",
        )
            .into_response(),
        None => {
            let groups = stub.state.groups.lock().unwrap().clone();
            Json(json!({ "total": groups.len(), "results": groups })).into_response()
        }
    }
}

async fn group_content(State(stub): State<PortalStub>, Path(id): Path<String>) -> Response {
    stub.state.content_requests.fetch_add(1, Ordering::SeqCst);
    match stub.state.group_items.lock().unwrap().get(&id) {
        Some(body) => Json(body.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "group exploded").into_response(),
    }
}

async fn map_service(
    State(stub): State<PortalStub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query = uri.query().map(str::to_string);
    let token = url::form_urlencoded::parse(query.as_deref().unwrap_or("").as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();

    stub.state.map_requests.lock().unwrap().push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    if stub.state.expired_tokens.lock().unwrap().contains(&token) {
        let status = match stub.state.expired_status.load(Ordering::SeqCst) {
            0 => StatusCode::UNAUTHORIZED,
            code => StatusCode::from_u16(code).unwrap(),
        };
        return (
            status,
            Json(json!({ "error": { "code": 498, "message": "Invalid Token" } })),
        )
            .into_response();
    }
    if uri.path().ends_with("/missing") {
        return (StatusCode::NOT_FOUND, "no such layer").into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({ "currentVersion": 11.1, "path": uri.path() }).to_string(),
    )
        .into_response()
}

pub fn test_config(addr: SocketAddr) -> AppConfig {
    let portal = PortalConfig::new(
        format!("http://{}/portal", addr),
        format!("http://{}/portal/sharing/rest/generateToken", addr),
        "svc_proxy",
        "secret",
        "https://app.example.com",
        "gportal_",
    );
    AppConfig {
        portal,
        proxy: ProxyConfig::default(),
        log_dir: None,
    }
}

pub fn map_service_url(addr: SocketAddr, name: &str) -> String {
    format!("http://{}/arcgis/rest/services/{}/MapServer", addr, name)
}

pub fn map_service_item(url: &str) -> Value {
    json!({ "id": "item", "title": "layer", "type": "Map Service", "url": url })
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
