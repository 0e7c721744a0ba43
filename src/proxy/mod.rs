// proxy module - map service reverse proxy

pub mod common;
pub mod config;
pub mod error;
pub mod handlers; // API endpoint handlers
pub mod middleware; // Axum middleware
pub mod server;
pub mod service_directory;
pub mod token_manager;
pub mod upstream; // Upstream client

pub use config::ProxyConfig;
pub use server::{build_router, AppState, AxumServer};
pub use service_directory::{ServiceDirectory, ServiceDirectoryCache};
pub use token_manager::TokenCache;
