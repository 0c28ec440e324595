//! For "Bring Your Own Server" (BYOS) integrations.
//!
//! [`WebhookService`] holds the whole request pipeline for the webhook
//! endpoint and speaks plain `http` types, so it drops into `axum`, `hyper` or
//! any other framework built on them.
//!
//! For a fully managed server, see the [`crate::server`] module.
//!
//! # Request handling
//!
//! - `GET`: subscription verification. Answers `405` if no verify token or
//!   verifier is configured.
//! - `POST`: read the body (up to the configured limit), check
//!   `X-Hub-Signature-256` if an app secret is configured, decode and dispatch.
//! - Anything else: `405`.
//!
//! # Usage Example (with axum)
//!
//! ```rust,no_run
//! use axum::{routing::any, Router};
//! use whatsapp_webhook_rs::{Handlers, WebhookService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handlers = Handlers::new().on_text(|_ctx, message, text| async move {
//!         println!("{}: {}", message.from, text.body);
//!         Ok(())
//!     });
//!
//!     // 1. Build the service
//!     let service = WebhookService::<Handlers>::builder()
//!         .verify_token("my_secret_token")
//!         .verify_payload("my_app_secret")
//!         .build(handlers);
//!
//!     // 2. Integrate into your router
//!     let app = Router::new().route(
//!         "/webhook",
//!         any(move |req: axum::extract::Request| {
//!             let service = service.clone();
//!             async move { service.handle(req).await }
//!         }),
//!     );
//!
//!     // 3. Run your server
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::{fmt, sync::Arc};

use axum::response::IntoResponse;
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use tracing::{instrument, warn};

use crate::{
    config::WebhookConfig,
    dispatch::{Dispatcher, WebhookResponse},
    error::Error,
    handler::Handler,
    notification,
    signature::{self, AppSecret},
    verification::{handle_subscription_verification, SubscriptionRequest, Verifier, VerifyToken},
};

const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A builder for creating a [`WebhookService`].
///
/// This builder is for the low-level, "Bring Your Own Server" API.
/// It does **not** configure server details like endpoint or shutdown signals.
#[derive(Clone)]
#[must_use]
pub struct WebhookServiceBuilder {
    app_secret: Option<AppSecret>,
    verifier: Option<Arc<dyn Verifier>>,
    body_limit: usize,
}

impl Default for WebhookServiceBuilder {
    fn default() -> Self {
        Self {
            app_secret: None,
            verifier: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl fmt::Debug for WebhookServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookServiceBuilder")
            .field("app_secret", &self.app_secret)
            .field("verifier", &self.verifier.as_ref().map(|_| "<verifier>"))
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl WebhookServiceBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a [`WebhookConfig`]: verify token, signature checking and body limit.
    pub fn from_config(config: &WebhookConfig) -> Self {
        let mut builder = Self::new().body_limit(config.body_limit);
        if let Some(token) = &config.verify_token {
            builder = builder.verify_token(token.clone());
        }
        if let Some(secret) = config.signing_secret() {
            builder = builder.verify_payload(secret);
        }
        builder
    }

    /// Rejects `POST`s whose `X-Hub-Signature-256` does not match `app_secret`.
    ///
    /// See [`crate::server::ServerBuilder::verify_payload`] for details.
    pub fn verify_payload(mut self, app_secret: impl Into<AppSecret>) -> Self {
        self.app_secret = Some(app_secret.into());
        self
    }

    /// Answers verification `GET`s carrying this token.
    ///
    /// See [`crate::server::ServerBuilder::verify_token`] for details.
    pub fn verify_token(self, verify_token: impl Into<String>) -> Self {
        self.verifier(VerifyToken::new(verify_token))
    }

    /// Answers verification `GET`s with a custom [`Verifier`], e.g. one that
    /// looks tokens up per tenant.
    pub fn verifier(mut self, verifier: impl Verifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Largest accepted `POST` body in bytes. Larger bodies get `413`.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Builds the service around `handler`.
    pub fn build<H: Handler + 'static>(self, handler: H) -> WebhookService<H> {
        self.build_with_dispatcher(Dispatcher::new(handler))
    }

    /// Builds the service around an existing dispatcher, sharing its handler.
    pub fn build_with_dispatcher<H: Handler + 'static>(
        self,
        dispatcher: Dispatcher<H>,
    ) -> WebhookService<H> {
        WebhookService {
            dispatcher,
            inner: Arc::new(self),
        }
    }
}

/// The body type of requests and responses handled by [`WebhookService`].
pub type Body = axum::body::Body;

/// A low-level service to handle WhatsApp webhook requests.
///
/// Cheap to clone; clones share the handler and settings.
pub struct WebhookService<H> {
    dispatcher: Dispatcher<H>,
    inner: Arc<WebhookServiceBuilder>,
}

impl<H> Clone for WebhookService<H> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<H> fmt::Debug for WebhookService<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookService")
            .field("settings", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<H: Handler + 'static> WebhookService<H> {
    /// Returns a new builder to create a `WebhookService`.
    pub fn builder() -> WebhookServiceBuilder {
        WebhookServiceBuilder::new()
    }

    pub fn dispatcher(&self) -> &Dispatcher<H> {
        &self.dispatcher
    }

    /// The primary request handler for your BYOS server.
    ///
    /// Handles both `GET` (verification) and `POST` (notification) requests.
    #[instrument(name = "webhook", skip_all, fields(method = %req.method()))]
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Body>
    where
        B: Into<Body> + Send,
    {
        let req: Request<Body> = req.map(Into::into);

        match *req.method() {
            Method::GET => self.verify(req.uri()).into_response(),
            Method::POST => {
                let (parts, body) = req.into_parts();
                let body = match axum::body::to_bytes(body, self.inner.body_limit).await {
                    Ok(body) => body,
                    Err(err) => {
                        warn!(error = %err, limit = self.inner.body_limit, "Failed to read webhook body");
                        return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                            .into_response();
                    }
                };
                self.receive(&parts.headers, &body).await.into_response()
            }
            _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        }
    }

    /// Answers a verification `GET` for `uri`.
    pub fn verify(&self, uri: &Uri) -> WebhookResponse {
        let Some(verifier) = &self.inner.verifier else {
            return WebhookResponse::new(
                StatusCode::METHOD_NOT_ALLOWED,
                "GET method not supported without a verify_token configured.",
            );
        };

        match SubscriptionRequest::from_uri(uri) {
            Ok(request) => handle_subscription_verification(&request, verifier.as_ref()),
            Err(err) => {
                warn!(error = %err, "Malformed verification query");
                WebhookResponse::new(StatusCode::BAD_REQUEST, "")
            }
        }
    }

    /// Processes a notification body: signature check, decode, dispatch.
    ///
    /// `raw_body` must be the bytes exactly as received.
    pub async fn receive(&self, headers: &HeaderMap, raw_body: &[u8]) -> WebhookResponse {
        if let Some(secret) = &self.inner.app_secret {
            if let Err(err) = signature::verify_headers(headers, raw_body, secret) {
                warn!(error = %err, "Signature verification failed");
                return WebhookResponse::from_error(&Error::Signature(err));
            }
        }

        let notification = match notification::decode(raw_body) {
            Ok(notification) => notification,
            Err(err) => {
                warn!(error = %err, "Failed to decode webhook payload");
                return WebhookResponse::from_error(&err);
            }
        };

        self.dispatcher.handle_notification(notification).await
    }
}
