//! Signal Bridge API Server
//!
//! Accepts signals and account heartbeats from producers and serves them to
//! polling consumers. All state lives in memory and is lost on restart.

use dotenvy::dotenv;
use signal_bridge::config::{self, RelayConfig};
use signal_bridge::core::http::start_server;
use signal_bridge::logging;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let port = config::get_port();
    let relay_config = RelayConfig::from_env();

    let env = config::get_environment();
    info!("Starting Signal Bridge API Server");
    info!(environment = %env, "Environment");
    info!(port = port, "HTTP Server: http://0.0.0.0:{}", port);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, relay_config).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
