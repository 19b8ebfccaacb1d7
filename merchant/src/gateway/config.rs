use envconfig::Envconfig;
use std::{fmt, time::Duration};
use url::Url;

use crate::{
    params::ParamSet,
    signature::{self, HashAlgorithm},
};

#[derive(Envconfig, Clone)]
pub struct GatewayConfig {
    #[envconfig(from = "SP_OUTLET_ID")]
    pub outlet_id: String,

    #[envconfig(from = "SP_SECRET_KEY")]
    pub secret_key: String,

    #[envconfig(from = "SP_SECRET_KEY_RESULT")]
    pub secret_key_result: String,

    #[envconfig(from = "SP_HASH_ALGO", default = "MD5")]
    pub hash_algo: HashAlgorithm,

    #[envconfig(from = "SP_RESULT_URL")]
    pub result_url: Url,

    // Only disable when the host has no root certificates installed.
    #[envconfig(from = "SP_STRONG_SSL", default = "true")]
    pub strong_ssl: bool,

    #[envconfig(from = "SP_API_URL", default = "https://api.simplepay.pro/sp/")]
    pub api_url: Url,

    #[envconfig(from = "SP_TIMEOUT_SECS", default = "30")]
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.outlet_id.clone(),
            self.secret_key.clone(),
            self.secret_key_result.clone(),
            self.hash_algo,
        )
        .with_strong_ssl(self.strong_ssl)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("outlet_id", &self.outlet_id)
            .field("hash_algo", &self.hash_algo)
            .field("result_url", &self.result_url.as_str())
            .field("strong_ssl", &self.strong_ssl)
            .field("api_url", &self.api_url.as_str())
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Outlet identity and signing keys.
///
/// Outbound requests are signed with the outlet key, result notifications
/// (and the acknowledgements answering them) with the separate result key.
#[derive(Clone)]
pub struct Credentials {
    outlet_id: String,
    secret_key: String,
    secret_key_result: String,
    hash_algo: HashAlgorithm,
    strong_ssl: bool,
}

impl Credentials {
    pub fn new(
        outlet_id: impl Into<String>,
        secret_key: impl Into<String>,
        secret_key_result: impl Into<String>,
        hash_algo: HashAlgorithm,
    ) -> Self {
        Self {
            outlet_id: outlet_id.into(),
            secret_key: secret_key.into(),
            secret_key_result: secret_key_result.into(),
            hash_algo,
            strong_ssl: true,
        }
    }

    pub fn with_strong_ssl(mut self, strong_ssl: bool) -> Self {
        self.strong_ssl = strong_ssl;
        self
    }

    pub fn outlet_id(&self) -> &str {
        &self.outlet_id
    }

    pub fn strong_ssl(&self) -> bool {
        self.strong_ssl
    }

    pub fn sign_request(&self, params: &ParamSet, resource: &str) -> String {
        signature::sign(params, resource, &self.secret_key, self.hash_algo)
    }

    pub fn sign_result(&self, params: &ParamSet, resource: &str) -> String {
        signature::sign(params, resource, &self.secret_key_result, self.hash_algo)
    }

    pub fn verify_result(&self, params: &ParamSet, resource: &str, claimed: &str) -> bool {
        signature::verify(
            params,
            resource,
            &self.secret_key_result,
            self.hash_algo,
            claimed,
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("outlet_id", &self.outlet_id)
            .field("secret_key", &"<redacted>")
            .field("secret_key_result", &"<redacted>")
            .field("hash_algo", &self.hash_algo)
            .field("strong_ssl", &self.strong_ssl)
            .finish()
    }
}
