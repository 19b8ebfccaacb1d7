mod config;
mod model;
mod notifications;
pub mod router;

pub use config::Config;
pub use notifications::LoggingNotificationHandler;
