pub mod error;
pub mod gateway;
pub mod params;
pub mod signature;
pub mod xml;

pub use error::{CodecError, ConfigError, GatewayError, NotificationError};
pub use gateway::{GatewayClient, GatewayConfig, NotificationEnvelope, PaymentNotificationHandler};
pub use params::{ParamSet, ParamValue};
