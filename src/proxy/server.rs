use crate::models::AppConfig;
use crate::modules::arcgis::PortalClient;
use crate::modules::token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::proxy::handlers;
use crate::proxy::upstream::client::UpstreamClient;
use crate::proxy::{ServiceDirectoryCache, TokenCache};
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenCache>,
    pub directory: Arc<ServiceDirectoryCache>,
    pub upstream: Arc<UpstreamClient>,
    pub discovery_path: Arc<String>,
}

impl AppState {
    /// Wire the caches and clients for one server instance
    pub fn from_config(config: &AppConfig) -> Self {
        let upstream = Arc::new(UpstreamClient::new(
            Some(&config.proxy.upstream_proxy),
            config.proxy.request_timeout,
        ));
        let portal = Arc::new(PortalClient::new(
            &config.portal,
            upstream.http_client().clone(),
        ));

        let store: Arc<dyn TokenStore> = match &config.portal.token_store_path {
            Some(path) => {
                tracing::info!("Persisting portal token to {:?}", path);
                Arc::new(FileTokenStore::new(path))
            }
            None => Arc::new(MemoryTokenStore::new()),
        };

        let tokens = Arc::new(TokenCache::new(portal.clone(), store, &config.portal));
        let directory = Arc::new(ServiceDirectoryCache::new(
            portal,
            tokens.clone(),
            &config.portal,
        ));

        Self {
            tokens,
            directory,
            upstream,
            discovery_path: Arc::new(config.proxy.discovery_path.clone()),
        }
    }
}

/// Build the router with all routes and layers
pub fn build_router(state: AppState) -> Router {
    let discovery: Router<AppState> = Router::new()
        .route("/api/services", get(handlers::mapservice::handle_list_services))
        .route("/healthz", get(health_check_handler))
        .layer(crate::proxy::middleware::cors_layer());

    Router::new()
        .route("/api/mapservice", any(handlers::mapservice::handle_root))
        .route("/api/mapservice/", any(handlers::mapservice::handle_root))
        .route(
            "/api/mapservice/:service",
            any(handlers::mapservice::handle_service),
        )
        .route(
            "/api/mapservice/:service/*path",
            any(handlers::mapservice::handle_service_path),
        )
        .merge(discovery)
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::proxy::middleware::logging_middleware,
        ))
        .with_state(state)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: std::net::SocketAddr,
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(
        host: &str,
        port: u16,
        state: AppState,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let app = build_router(state);

        // Bind address
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind address {}: {}", addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        tracing::info!("Map service proxy started at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Map service proxy stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}
