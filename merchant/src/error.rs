use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    #[error("Invalid gateway URL: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Errors from encoding or decoding gateway payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON container, got a scalar")]
    NotAContainer,

    #[error("JSON payload holds no parameter set")]
    EmptyPayload,
}

/// Errors that can occur while calling the gateway API.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response: {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("Failed to encode request: {context}: {source}")]
    Encode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Reasons a result notification is turned away.
///
/// Messages are safe to send back to the notifying party: they never carry
/// signatures, keys or payload contents.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("No recognizable payment data in request")]
    NoPaymentData,

    #[error("Malformed payment data")]
    Malformed(#[from] CodecError),

    #[error("Invalid request parameters")]
    MissingSignature,

    #[error("Invalid request signature")]
    InvalidSignature,

    #[error("Failed to encode acknowledgement")]
    Acknowledgement(#[source] CodecError),
}
