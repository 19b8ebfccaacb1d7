mod client;
mod config;
mod model;
mod notification;

pub use client::GatewayClient;
pub use config::{Credentials, GatewayConfig};
pub use model::{
    DEFAULT_LIFETIME_SECS, DEFAULT_REFUND_DESCRIPTION, PaymentRequest, RecurringPaymentRequest,
    RefundRequest,
};
pub use notification::{
    Acknowledgement, DESCRIPTION_ACCEPTED, DESCRIPTION_CANCELLED, NotificationEnvelope,
    NotificationFormat, PaymentNotificationHandler, RESULT_SUCCESS, process_result_notification,
};

/// Form field carrying a JSON-encoded parameter set.
pub const JSON_FIELD: &str = "sp_json";
/// Form field carrying an XML-encoded parameter set.
pub const XML_FIELD: &str = "sp_xml";

pub const SALT_FIELD: &str = "sp_salt";
pub const ORDER_ID_FIELD: &str = "sp_order_id";
pub const RESULT_FIELD: &str = "sp_result";
pub const STATUS_FIELD: &str = "sp_status";
pub const DESCRIPTION_FIELD: &str = "sp_description";
