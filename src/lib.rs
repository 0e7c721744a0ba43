pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Proxy service module
pub mod utils;

use tracing::{error, info};

/// Run the proxy until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    let config = modules::load_app_config();

    // A config error is still logged, to the default log dir
    let log_dir = config.as_ref().ok().and_then(|c| c.log_dir.as_deref());
    modules::init_logger(log_dir);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "Portal {} (group prefix {})",
        config.portal.portal_url, config.portal.group_prefix
    );

    let state = proxy::AppState::from_config(&config);
    let (server, handle) = proxy::AxumServer::start(
        config.proxy.get_bind_address(),
        config.proxy.port,
        state,
    )
    .await
    .map_err(anyhow::Error::msg)?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    server.stop();
    handle.await.ok();

    Ok(())
}
