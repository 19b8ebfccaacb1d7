use http::StatusCode;
use log::{debug, info};
use rand::{RngCore, rngs::OsRng};
use reqwest::Client;
use serde_json::Value;
use std::{fmt, sync::Arc};
use url::Url;

use crate::{
    error::{CodecError, ConfigError, GatewayError, NotificationError},
    gateway::{
        Acknowledgement, Credentials, GatewayConfig, JSON_FIELD, NotificationEnvelope,
        PaymentNotificationHandler, PaymentRequest, SALT_FIELD,
        model::DEFAULT_REFUND_DESCRIPTION, notification,
    },
    params::ParamSet,
    signature::{SIGNATURE_FIELD, basename},
};

/// Full URLs of the gateway API, resolved once against the base URL.
#[derive(Clone, Debug)]
struct Endpoints {
    payment: Url,
    direct_payment: Url,
    recurring_payment: Url,
    status: Url,
    refund: Url,
    payment_systems: Url,
}

impl Endpoints {
    fn try_new(base_url: &Url) -> Result<Self, ConfigError> {
        let join = |path: &str, context: &'static str| {
            base_url
                .join(path)
                .map_err(|source| ConfigError::UrlParse { context, source })
        };
        Ok(Self {
            payment: join("./payment", "Failed to construct ./payment URL")?,
            direct_payment: join("./init_payment", "Failed to construct ./init_payment URL")?,
            recurring_payment: join(
                "./make_recurring_payment",
                "Failed to construct ./make_recurring_payment URL",
            )?,
            status: join("./get_status", "Failed to construct ./get_status URL")?,
            refund: join("./refund", "Failed to construct ./refund URL")?,
            payment_systems: join("./ps_list", "Failed to construct ./ps_list URL")?,
        })
    }
}

/// A client for the payment gateway API.
///
/// Signs and sends outbound requests with the outlet key and verifies
/// result notifications with the result key, handing verified outcomes to
/// the injected [`PaymentNotificationHandler`].
#[derive(Clone)]
pub struct GatewayClient {
    credentials: Credentials,
    /// Configured result URL; its basename signs notifications.
    result_url: Url,
    result_resource: String,
    endpoints: Endpoints,
    /// Shared Reqwest HTTP client
    client: Client,
    handler: Arc<dyn PaymentNotificationHandler>,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("credentials", &self.credentials)
            .field("result_url", &self.result_url.as_str())
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Constructs a new [`GatewayClient`] from the gateway configuration.
    ///
    /// Endpoint URLs are resolved relative to `config.api_url`, which should
    /// therefore end with a slash.
    pub fn try_new(
        config: &GatewayConfig,
        handler: Arc<dyn PaymentNotificationHandler>,
    ) -> Result<Self, ConfigError> {
        let credentials = config.credentials();
        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!credentials.strong_ssl())
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            endpoints: Endpoints::try_new(&config.api_url)?,
            result_resource: basename(config.result_url.as_str()),
            result_url: config.result_url.clone(),
            credentials,
            client,
            handler,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn result_url(&self) -> &Url {
        &self.result_url
    }

    /// Hosted payment page URL carrying the signed request in its query.
    /// The payer's browser has to be sent there.
    pub fn payment_redirect_url(&self, payment: &PaymentRequest) -> Url {
        let mut params = payment.to_params(self.credentials.outlet_id(), &self.result_url);
        self.seal(&mut params, &self.endpoints.payment);

        let mut url = self.endpoints.payment.clone();
        url.query_pairs_mut().extend_pairs(params.to_query_pairs());
        info!("Redirecting payer for order {} to hosted payment page", payment.order_id);
        url
    }

    /// Creates the payment via the direct API; the response carries the
    /// redirect data (`sp_redirect_url`) instead of the gateway redirecting.
    pub async fn direct_payment(&self, payment: &PaymentRequest) -> Result<ParamSet, GatewayError> {
        let params = payment.to_params(self.credentials.outlet_id(), &self.result_url);
        self.post_signed(params, &self.endpoints.direct_payment, "POST init_payment")
            .await
    }

    /// Payment systems available to the outlet for `amount`.
    pub async fn payment_systems(&self, amount: f64) -> Result<ParamSet, GatewayError> {
        let params = self.base_params().with("sp_amount", amount);
        self.post_signed(params, &self.endpoints.payment_systems, "POST ps_list")
            .await
    }

    pub async fn order_status_by_order_id(&self, order_id: u64) -> Result<ParamSet, GatewayError> {
        let params = self.base_params().with("sp_order_id", order_id);
        self.post_signed(params, &self.endpoints.status, "POST get_status")
            .await
    }

    pub async fn order_status_by_transaction_id(
        &self,
        transaction_id: u64,
    ) -> Result<ParamSet, GatewayError> {
        let params = self.base_params().with("sp_payment_id", transaction_id);
        self.post_signed(params, &self.endpoints.status, "POST get_status")
            .await
    }

    /// Refunds a payment identified by the merchant's order id. Without an
    /// amount the full payment is refunded.
    pub async fn refund_by_order_id(
        &self,
        order_id: u64,
        amount: Option<f64>,
        description: Option<&str>,
    ) -> Result<ParamSet, GatewayError> {
        self.refund(("sp_order_id", order_id), amount, description)
            .await
    }

    /// Refunds a payment identified by the gateway's transaction id.
    pub async fn refund_by_transaction_id(
        &self,
        transaction_id: u64,
        amount: Option<f64>,
        description: Option<&str>,
    ) -> Result<ParamSet, GatewayError> {
        self.refund(("sp_payment_id", transaction_id), amount, description)
            .await
    }

    async fn refund(
        &self,
        (target_key, target_id): (&'static str, u64),
        amount: Option<f64>,
        description: Option<&str>,
    ) -> Result<ParamSet, GatewayError> {
        let description = description
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_REFUND_DESCRIPTION);
        let params = self
            .base_params()
            .with("sp_refund_amount", amount.unwrap_or(0.0))
            .with(target_key, target_id)
            .with("sp_description", description);
        self.post_signed(params, &self.endpoints.refund, "POST refund")
            .await
    }

    /// Charges a recurring profile. Without an amount the gateway charges the
    /// amount of the payment that started the profile.
    pub async fn recurring_payment(
        &self,
        recurring_profile: &str,
        order_id: u64,
        description: &str,
        amount: Option<f64>,
    ) -> Result<ParamSet, GatewayError> {
        let mut params = self
            .base_params()
            .with("sp_recurring_profile", recurring_profile)
            .with("sp_order_id", order_id)
            .with("sp_description", description);
        if let Some(amount) = amount {
            params.insert("sp_amount", amount);
        }
        self.post_signed(
            params,
            &self.endpoints.recurring_payment,
            "POST make_recurring_payment",
        )
        .await
    }

    /// Verifies an inbound result notification, calls the merchant handler
    /// and returns the acknowledgement to send back.
    pub fn process_result_notification(
        &self,
        envelope: &NotificationEnvelope,
    ) -> Result<Acknowledgement, NotificationError> {
        notification::process_result_notification(
            &self.credentials,
            &self.result_resource,
            envelope,
            self.handler.as_ref(),
        )
    }

    fn base_params(&self) -> ParamSet {
        ParamSet::new().with("sp_outlet_id", self.credentials.outlet_id())
    }

    /// Adds a fresh salt and the signature for `endpoint`.
    fn seal(&self, params: &mut ParamSet, endpoint: &Url) {
        params.insert(SALT_FIELD, generate_salt());
        let signature = self
            .credentials
            .sign_request(params, &basename(endpoint.as_str()));
        params.insert(SIGNATURE_FIELD, signature);
    }

    /// Signs `params`, posts them as the `sp_json` form field and decodes
    /// the JSON answer.
    ///
    /// `context` is a human-readable identifier used in logs and error
    /// messages (e.g. `"POST get_status"`).
    async fn post_signed(
        &self,
        mut params: ParamSet,
        url: &Url,
        context: &'static str,
    ) -> Result<ParamSet, GatewayError> {
        self.seal(&mut params, url);
        let payload = serde_json::to_string(&params)
            .map_err(|source| GatewayError::Encode { context, source })?;
        debug!("{}: sending {} parameters", context, params.len());

        let http_response = self
            .client
            .post(url.clone())
            .form(&[(JSON_FIELD, payload.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::Http { context, source: e })?;

        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|e| GatewayError::ResponseBodyRead { context, source: e })?;

        if status != StatusCode::OK {
            return Err(GatewayError::HttpStatus {
                context,
                status,
                body,
            });
        }

        decode_response(&body).map_err(|source| GatewayError::Decode { context, source })
    }
}

fn decode_response(body: &str) -> Result<ParamSet, CodecError> {
    let value: Value = serde_json::from_str(body)?;
    ParamSet::from_json(value).ok_or(CodecError::NotAContainer)
}

/// 128-bit random salt, hex encoded.
fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
