mod http;

use crate::http::{Config, LoggingNotificationHandler};
use env_logger::Env;
use log::{error, info};
use merchant::GatewayClient;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    let gateway = GatewayClient::try_new(&config.gateway, Arc::new(LoggingNotificationHandler))?;
    let state = http::router::AppState {
        config: config.clone(),
        gateway: Arc::new(gateway),
    };
    let app = http::router::build_router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server listening on {}", addr);
    info!(
        "Accepting result notifications at {} (outlet {})",
        config.gateway.result_url.path(),
        config.gateway.outlet_id
    );

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
