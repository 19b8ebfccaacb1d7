use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::{
    error::{CodecError, NotificationError},
    gateway::{
        Credentials, DESCRIPTION_FIELD, JSON_FIELD, ORDER_ID_FIELD, RESULT_FIELD, SALT_FIELD,
        STATUS_FIELD, XML_FIELD,
    },
    params::{PARAM_PREFIX, ParamSet, ParamValue},
    signature::SIGNATURE_FIELD,
    xml,
};

/// Result code the gateway sends for a completed payment.
pub const RESULT_SUCCESS: i64 = 1;

pub const DESCRIPTION_ACCEPTED: &str = "Payment accepted";
pub const DESCRIPTION_CANCELLED: &str = "Payment cancelled";

/// Merchant hooks called once per verified result notification.
pub trait PaymentNotificationHandler: Send + Sync {
    /// The payment for `order_id` went through.
    fn on_success(&self, order_id: &str, params: &ParamSet);

    /// The payment for `order_id` was declined or cancelled.
    fn on_fail(&self, order_id: &str, params: &ParamSet);
}

/// How the gateway delivered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationFormat {
    /// XML document in the `sp_xml` form field.
    Xml,
    /// JSON array in the `sp_json` form field.
    Json,
    /// Plain GET query parameters.
    Query,
    /// Plain POST form fields.
    Form,
}

/// Inbound result notification, decoded but not yet verified.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEnvelope {
    format: NotificationFormat,
    params: ParamSet,
}

impl NotificationEnvelope {
    pub fn new(format: NotificationFormat, params: ParamSet) -> Self {
        Self { format, params }
    }

    /// Decodes a request from its raw query string and URL-encoded body.
    pub fn from_request(
        raw_query: Option<&str>,
        form_body: &[u8],
    ) -> Result<Self, NotificationError> {
        let query = ParamSet::from_pairs(
            form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes()).into_owned(),
        );
        let form = ParamSet::from_pairs(form_urlencoded::parse(form_body).into_owned());
        Self::from_fields(query, form)
    }

    /// Picks the payload out of already decoded query and form fields.
    ///
    /// Checked in order: `sp_xml` form field, `sp_json` form field, a signed
    /// query string, signed form fields.
    pub fn from_fields(query: ParamSet, form: ParamSet) -> Result<Self, NotificationError> {
        if let Some(document) = non_empty(&form, XML_FIELD) {
            let params = xml::parse_document(&document)?;
            return Ok(Self::new(NotificationFormat::Xml, params));
        }
        if let Some(json) = non_empty(&form, JSON_FIELD) {
            let params = decode_json_notification(&json)?;
            return Ok(Self::new(NotificationFormat::Json, params));
        }
        if non_empty(&query, SIGNATURE_FIELD).is_some() {
            return Ok(Self::new(NotificationFormat::Query, query));
        }
        if non_empty(&form, SIGNATURE_FIELD).is_some() {
            return Ok(Self::new(NotificationFormat::Form, form));
        }
        Err(NotificationError::NoPaymentData)
    }

    pub fn format(&self) -> NotificationFormat {
        self.format
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn signature(&self) -> Option<String> {
        non_empty(&self.params, SIGNATURE_FIELD)
    }
}

fn non_empty(params: &ParamSet, key: &str) -> Option<String> {
    params.get_string(key).filter(|value| !value.is_empty())
}

/// The gateway wraps the notification in a one-element array.
fn decode_json_notification(json: &str) -> Result<ParamSet, CodecError> {
    let value: Value = serde_json::from_str(json)?;
    let payload = match value {
        Value::Array(items) => items.into_iter().next().ok_or(CodecError::EmptyPayload)?,
        object @ Value::Object(_) => object,
        _ => return Err(CodecError::NotAContainer),
    };
    match payload {
        Value::Object(_) => ParamSet::from_json(payload).ok_or(CodecError::NotAContainer),
        _ => Err(CodecError::NotAContainer),
    }
}

/// Signed answer to a result notification, in the format it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    format: NotificationFormat,
    params: ParamSet,
    body: String,
}

#[derive(Serialize)]
struct JsonAcknowledgement<'a> {
    response: &'a ParamSet,
}

impl Acknowledgement {
    fn encode(format: NotificationFormat, params: ParamSet) -> Result<Self, CodecError> {
        let body = match format {
            NotificationFormat::Json => {
                serde_json::to_string(&JsonAcknowledgement { response: &params })?
            }
            _ => xml::to_document(&params, "response")?,
        };
        Ok(Self {
            format,
            params,
            body,
        })
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            NotificationFormat::Json => "application/json",
            _ => "text/xml",
        }
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

/// Verifies a result notification, dispatches it to `handler` and builds the
/// acknowledgement.
///
/// `result_resource` is the basename of the merchant's result URL. Nothing is
/// dispatched unless the signature checks out against the result key.
pub fn process_result_notification(
    credentials: &Credentials,
    result_resource: &str,
    envelope: &NotificationEnvelope,
    handler: &dyn PaymentNotificationHandler,
) -> Result<Acknowledgement, NotificationError> {
    let Some(signature) = envelope.signature() else {
        warn!("Result notification without signature ({:?})", envelope.format());
        return Err(NotificationError::MissingSignature);
    };

    let mut params = envelope.params().clone();
    params.retain_prefixed(PARAM_PREFIX);
    debug!(
        "Verifying result notification: format={:?} params={}",
        envelope.format(),
        params.len()
    );

    if !credentials.verify_result(&params, result_resource, &signature) {
        warn!(
            "Rejected result notification with invalid signature ({:?})",
            envelope.format()
        );
        return Err(NotificationError::InvalidSignature);
    }

    let order_id = params.get_string(ORDER_ID_FIELD).unwrap_or_default();
    if order_id.is_empty() {
        warn!("Verified result notification carries no order id");
    }

    let paid = params.get(RESULT_FIELD).and_then(ParamValue::as_i64) == Some(RESULT_SUCCESS);
    let description = if paid {
        info!("Payment accepted for order {}", order_id);
        handler.on_success(&order_id, &params);
        DESCRIPTION_ACCEPTED
    } else {
        info!("Payment cancelled for order {}", order_id);
        handler.on_fail(&order_id, &params);
        DESCRIPTION_CANCELLED
    };

    let salt = params
        .get(SALT_FIELD)
        .cloned()
        .unwrap_or_else(|| ParamValue::Str(String::new()));
    let mut answer = ParamSet::new()
        .with(STATUS_FIELD, "ok")
        .with(DESCRIPTION_FIELD, description)
        .with(SALT_FIELD, salt);
    let signature = credentials.sign_result(&answer, result_resource);
    answer.insert(SIGNATURE_FIELD, signature);

    Acknowledgement::encode(envelope.format(), answer).map_err(NotificationError::Acknowledgement)
}
