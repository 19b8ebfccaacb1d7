//! Request signing and notification verification.
//!
//! A signature is the hex digest of
//!
//! ```text
//! {resource};{value_1};{value_2};...;{value_n};{secret}
//! ```
//!
//! where the values are taken from the parameter set with the signature field
//! removed and keys sorted recursively, so the result does not depend on the
//! order in which parameters were inserted. `resource` is the basename of the
//! endpoint (or callback URL) the message is addressed to.

use md5::compute as md5_digest;
use sha2::{Digest, Sha256, Sha512};
use std::{fmt, str::FromStr};
use subtle::ConstantTimeEq;
use url::Url;

use crate::{error::ConfigError, params::ParamSet};

/// Name of the field carrying the signature.
pub const SIGNATURE_FIELD: &str = "sp_sig";

/// Hash algorithms the gateway accepts for signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Lowercase hex digest of `message`.
    pub fn hex_digest(&self, message: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => format!("{:x}", md5_digest(message)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(message)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(message)),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(ConfigError::UnsupportedHashAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        })
    }
}

/// Recursively sorts `params` by key.
pub fn canonicalize(params: &mut ParamSet) {
    params.canonicalize();
}

/// Computes the signature of `params` for `resource`.
///
/// Any signature field already present is ignored. The caller's set is left
/// untouched.
pub fn sign(params: &ParamSet, resource: &str, secret: &str, algorithm: HashAlgorithm) -> String {
    let mut params = params.clone();
    params.remove(SIGNATURE_FIELD);
    canonicalize(&mut params);

    let values = params.flatten_values().join(";");
    let message = format!("{resource};{values};{secret}");
    algorithm.hex_digest(message.as_bytes())
}

/// Checks `claimed` against the signature recomputed over `params`.
pub fn verify(
    params: &ParamSet,
    resource: &str,
    secret: &str,
    algorithm: HashAlgorithm,
    claimed: &str,
) -> bool {
    let expected = sign(params, resource, secret, algorithm);
    expected.as_bytes().ct_eq(claimed.as_bytes()).into()
}

/// Final non-empty path segment of `url`, the name the gateway uses as the
/// signing resource (`https://example.com/sp/result.php?x=1` → `result.php`).
pub fn basename(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}
