use serde::{Deserialize, Serialize};
use url::Url;

use crate::params::ParamSet;

/// Default invoice lifetime: one day.
pub const DEFAULT_LIFETIME_SECS: u64 = 86400;

/// Description used for refunds when the caller gives none.
pub const DEFAULT_REFUND_DESCRIPTION: &str = "Refund";

fn default_lifetime() -> u64 {
    DEFAULT_LIFETIME_SECS
}

/// Data needed to open a payment for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Order number in the merchant's system.
    pub order_id: u64,
    pub amount: f64,
    /// Shown to the payer by the payment system.
    pub description: String,
    /// Invoice lifetime in seconds.
    #[serde(default = "default_lifetime")]
    pub lifetime: u64,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    /// Required by some payment systems when skipping the gateway's own page.
    #[serde(default)]
    pub client_ip: Option<String>,
    /// Opaque value passed back in notifications.
    #[serde(default)]
    pub user_params: Option<String>,
    /// Payment system code; when unset the payer picks one on the gateway page.
    #[serde(default)]
    pub payment_system: Option<String>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub fail_url: Option<String>,
    /// Start a recurring profile with this payment.
    #[serde(default)]
    pub recurring_start: bool,
}

impl PaymentRequest {
    pub fn new(order_id: u64, amount: f64, description: impl Into<String>) -> Self {
        Self {
            order_id,
            amount,
            description: description.into(),
            lifetime: DEFAULT_LIFETIME_SECS,
            client_name: None,
            client_email: None,
            client_phone: None,
            client_ip: None,
            user_params: None,
            payment_system: None,
            result_url: None,
            success_url: None,
            fail_url: None,
            recurring_start: false,
        }
    }

    pub fn with_lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_client_email(mut self, email: impl Into<String>) -> Self {
        self.client_email = Some(email.into());
        self
    }

    pub fn with_client_phone(mut self, phone: impl Into<String>) -> Self {
        self.client_phone = Some(phone.into());
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_user_params(mut self, user_params: impl Into<String>) -> Self {
        self.user_params = Some(user_params.into());
        self
    }

    pub fn with_payment_system(mut self, payment_system: impl Into<String>) -> Self {
        self.payment_system = Some(payment_system.into());
        self
    }

    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    pub fn with_success_url(mut self, url: impl Into<String>) -> Self {
        self.success_url = Some(url.into());
        self
    }

    pub fn with_fail_url(mut self, url: impl Into<String>) -> Self {
        self.fail_url = Some(url.into());
        self
    }

    pub fn with_recurring_start(mut self, recurring_start: bool) -> Self {
        self.recurring_start = recurring_start;
        self
    }

    /// Unsigned request parameters. Optional fields are only included when
    /// set and non-empty; the result URL falls back to `default_result_url`.
    pub(crate) fn to_params(&self, outlet_id: &str, default_result_url: &Url) -> ParamSet {
        let mut params = ParamSet::new()
            .with("sp_outlet_id", outlet_id)
            .with("sp_order_id", self.order_id)
            .with("sp_amount", self.amount)
            .with("sp_lifetime", self.lifetime)
            .with("sp_description", &self.description);

        params.insert_non_empty("sp_user_name", self.client_name.as_deref());
        params.insert_non_empty("sp_user_contact_email", self.client_email.as_deref());
        params.insert_non_empty("sp_user_phone", self.client_phone.as_deref());
        params.insert_non_empty("sp_user_ip", self.client_ip.as_deref());
        params.insert_non_empty("sp_user_params", self.user_params.as_deref());

        let result_url = self
            .result_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(default_result_url.as_str());
        params.insert("sp_result_url", result_url);

        params.insert_non_empty("sp_success_url", self.success_url.as_deref());
        params.insert_non_empty("sp_failure_url", self.fail_url.as_deref());
        params.insert_non_empty("sp_payment_system", self.payment_system.as_deref());

        if self.recurring_start {
            params.insert("sp_recurring_start", 1);
        }
        params
    }
}

/// Body of a refund request coming through the merchant's own API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Amount to return; a full refund when unset.
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Charge against a previously started recurring profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPaymentRequest {
    pub recurring_profile: String,
    pub order_id: u64,
    pub description: String,
    /// Defaults to the amount of the payment that started the profile.
    #[serde(default)]
    pub amount: Option<f64>,
}
