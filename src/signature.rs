//! Payload Signature Validation
//!
//! Meta signs every webhook POST with HMAC-SHA256, keyed with your app secret,
//! over the raw request body, and sends the result as
//! `X-Hub-Signature-256: sha256=<lowercase hex>`.
//!
//! The digest must be computed over the bytes exactly as received, before any
//! JSON decoding, and compared in constant time.

use std::fmt;

use hmac::{Hmac, Mac};
use http::HeaderMap;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// The header Meta puts the signature in.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const PREFIX: &str = "sha256=";

/// Your Meta app secret. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct AppSecret(pub(crate) String);

impl AppSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppSecret(<REDACTED>)")
    }
}

impl From<&str> for AppSecret {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for AppSecret {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

/// Checks `header_signature` against the HMAC-SHA256 of `raw_body`.
///
/// The `sha256=` prefix is optional. An empty body, signature or secret is
/// never valid.
///
/// # Example
/// ```rust
/// use whatsapp_webhook_rs::signature;
///
/// let body = br#"{"object":"whatsapp_business_account","entry":[]}"#;
/// let header = signature::sign(body, "app-secret");
///
/// assert!(signature::validate(body, &header, "app-secret"));
/// assert!(!signature::validate(body, &header, "other-secret"));
/// ```
pub fn validate(raw_body: &[u8], header_signature: &str, app_secret: &str) -> bool {
    if raw_body.is_empty() || app_secret.is_empty() {
        return false;
    }

    let provided = header_signature.trim();
    let provided = provided.strip_prefix(PREFIX).unwrap_or(provided);
    if provided.is_empty() {
        return false;
    }

    let Some(expected) = digest(raw_body, app_secret) else {
        return false;
    };

    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Produces the `sha256=<hex>` header value Meta would send for `raw_body`.
pub fn sign(raw_body: &[u8], app_secret: &str) -> String {
    format!("{PREFIX}{}", digest(raw_body, app_secret).unwrap_or_default())
}

/// Validates the `X-Hub-Signature-256` header of a request.
pub fn verify_headers(
    headers: &HeaderMap,
    raw_body: &[u8],
    app_secret: &AppSecret,
) -> Result<(), SignatureError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .ok_or(SignatureError::MissingHeader)?
        .to_str()
        .map_err(|_| SignatureError::InvalidHeader)?;

    if validate(raw_body, signature, app_secret.expose()) {
        Ok(())
    } else {
        warn!(body_len = raw_body.len(), "Webhook signature mismatch");
        Err(SignatureError::Mismatch)
    }
}

fn digest(raw_body: &[u8], app_secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(raw_body);
    Some(hex::encode(mac.finalize().into_bytes()))
}
