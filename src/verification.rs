//! Subscription Verification
//!
//! When you configure a webhook URL in the App Dashboard, Meta first sends a
//! `GET` to it:
//!
//! ```text
//! GET /webhook?hub.mode=subscribe&hub.challenge=1158201444&hub.verify_token=meatyhamhock
//! ```
//!
//! The endpoint must answer `200` with the challenge echoed back verbatim if
//! the verify token is the one you entered in the dashboard, and anything else
//! otherwise.

use http::{StatusCode, Uri};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::{
    dispatch::WebhookResponse,
    error::{BoxError, Error},
};

/// The `hub.*` query parameters of a verification request.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct SubscriptionRequest {
    #[serde(rename = "hub.mode", default)]
    pub mode: String,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: String,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: String,
}

impl SubscriptionRequest {
    pub fn new(
        mode: impl Into<String>,
        challenge: impl Into<String>,
        verify_token: impl Into<String>,
    ) -> Self {
        Self {
            mode: mode.into(),
            challenge: challenge.into(),
            verify_token: verify_token.into(),
        }
    }

    /// Reads the parameters from a request URI. Missing ones are empty.
    pub fn from_uri(uri: &Uri) -> Result<Self, Error> {
        axum::extract::Query::<Self>::try_from_uri(uri)
            .map(|query| query.0)
            .map_err(|rejection| Error::Verification(rejection.into()))
    }

    /// Reads the parameters from a raw query string (without the leading `?`).
    ///
    /// ```rust
    /// use whatsapp_webhook_rs::verification::SubscriptionRequest;
    ///
    /// let request = SubscriptionRequest::from_query(
    ///     "hub.mode=subscribe&hub.challenge=1158201444&hub.verify_token=meatyhamhock",
    /// ).unwrap();
    /// assert_eq!(request.challenge, "1158201444");
    /// ```
    pub fn from_query(query: &str) -> Result<Self, Error> {
        let uri: Uri = format!("/?{query}")
            .parse()
            .map_err(|err: http::uri::InvalidUri| Error::Verification(err.into()))?;
        Self::from_uri(&uri)
    }
}

/// Decides whether a verification request is accepted.
///
/// Implemented by [`VerifyToken`] and by any
/// `Fn(&SubscriptionRequest) -> Result<(), BoxError>` closure.
pub trait Verifier: Send + Sync {
    fn verify(&self, request: &SubscriptionRequest) -> Result<(), BoxError>;
}

impl<F> Verifier for F
where
    F: Fn(&SubscriptionRequest) -> Result<(), BoxError> + Send + Sync,
{
    fn verify(&self, request: &SubscriptionRequest) -> Result<(), BoxError> {
        self(request)
    }
}

/// Accepts `hub.mode=subscribe` requests carrying exactly this token.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyToken(String);

impl VerifyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for VerifyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VerifyToken(<REDACTED>)")
    }
}

/// Why a [`VerifyToken`] rejected a request.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum VerificationError {
    #[error("unexpected hub.mode '{0}', expected 'subscribe'")]
    UnexpectedMode(String),

    #[error("verify token does not match")]
    TokenMismatch,
}

impl Verifier for VerifyToken {
    fn verify(&self, request: &SubscriptionRequest) -> Result<(), BoxError> {
        if request.mode != "subscribe" {
            return Err(VerificationError::UnexpectedMode(request.mode.clone()).into());
        }

        if bool::from(request.verify_token.as_bytes().ct_eq(self.0.as_bytes())) {
            Ok(())
        } else {
            Err(VerificationError::TokenMismatch.into())
        }
    }
}

/// Answers a verification request.
///
/// `200` with the challenge as the body if `verifier` accepts, `400` with an
/// empty body otherwise.
///
/// ```rust
/// use whatsapp_webhook_rs::verification::{
///     handle_subscription_verification, SubscriptionRequest, VerifyToken,
/// };
///
/// let request = SubscriptionRequest::new("subscribe", "1158201444", "meatyhamhock");
///
/// let response = handle_subscription_verification(&request, &VerifyToken::new("meatyhamhock"));
/// assert_eq!(response.status(), 200);
/// assert_eq!(response.body(), "1158201444");
///
/// let response = handle_subscription_verification(&request, &VerifyToken::new("other"));
/// assert_eq!(response.status(), 400);
/// assert_eq!(response.body(), "");
/// ```
pub fn handle_subscription_verification<V>(
    request: &SubscriptionRequest,
    verifier: &V,
) -> WebhookResponse
where
    V: Verifier + ?Sized,
{
    match verifier.verify(request) {
        Ok(()) => {
            debug!(mode = %request.mode, "Webhook subscription verified");
            WebhookResponse::new(StatusCode::OK, request.challenge.clone())
        }
        Err(err) => {
            warn!(error = %err, "Rejected webhook subscription verification");
            WebhookResponse::new(StatusCode::BAD_REQUEST, "")
        }
    }
}
