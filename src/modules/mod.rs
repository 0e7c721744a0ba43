pub mod arcgis;
pub mod config;
pub mod logger;
pub mod token_store;

pub use config::load_app_config;
pub use logger::init_logger;
