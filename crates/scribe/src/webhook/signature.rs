//! Keyed-hash signature verification for inbound events.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Why a signature was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The header does not look like `sha256=<hex>`.
    #[error("Signature header malformed")]
    Malformed,

    /// The signature does not match the body.
    #[error("Signature mismatch")]
    Mismatch,
}

/// Verify an event signature over the raw request bytes.
///
/// The comparison runs in constant time; nothing about the body is
/// processed before this check passes.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> Result<(), SignatureError> {
    let hex_digest = header
        .strip_prefix("sha256=")
        .ok_or(SignatureError::Malformed)?;
    let expected = hex::decode(hex_digest).map_err(|_| SignatureError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Compute the signature header value for a body.
///
/// Counterpart of [`verify_signature`] for senders; used when testing the
/// receiver end to end.
#[must_use]
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
