pub mod config;
pub mod portal;
pub mod token;

pub use config::{AppConfig, PortalConfig};
pub use portal::{PortalGroup, PortalItem};
pub use token::CachedToken;
