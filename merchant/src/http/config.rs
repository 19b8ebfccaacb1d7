use envconfig::Envconfig;
use merchant::GatewayConfig;
use thiserror::Error;

use super::router::API_ROUTES;

#[derive(Error, Debug)]
pub enum ServerConfigError {
    #[error(transparent)]
    Env(#[from] envconfig::Error),

    #[error("Result URL path {0} collides with a merchant API route")]
    ResultPathCollision(String),
}

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: log::Level,

    #[envconfig(from = "SERVER_PORT", default = "3000")]
    pub server_port: u16,

    #[envconfig(from = "SERVER_HOST", default = "0.0.0.0")]
    pub server_host: String,

    #[envconfig(nested)]
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ServerConfigError> {
        let config = Config::init_from_env()?;
        config.check_result_path()?;
        Ok(config)
    }

    /// The result callback is mounted at the result URL path, next to the API routes.
    pub fn check_result_path(&self) -> Result<(), ServerConfigError> {
        let path = self.gateway.result_url.path();
        if API_ROUTES.contains(&path) {
            return Err(ServerConfigError::ResultPathCollision(path.to_string()));
        }
        Ok(())
    }
}
