//! WhatsApp webhook server implementation
//!
//! Provides a managed `axum` server for receiving WhatsApp webhook
//! notifications. It takes care of binding, routing, verification, signature
//! validation and graceful shutdown; you supply the [`Handler`].
//!
//! For a more flexible, low-level integration, see the [`crate::webhook_service`] module.
//!
//! # Key Components
//! - [`ServerBuilder`]: Configure the server's endpoint, route, shutdown signal, and security.
//! - [`Server`]: The configured server, ready to run.
//! - [`Server::serve`]: Takes your [`Handler`] and returns a [`Serve`] which
//!   runs the server until it's shut down when awaited.
//!
//! # Example
//! ```rust,no_run
//! use whatsapp_webhook_rs::{
//!     handler::{EventContext, Handler, HandlerResult},
//!     message::{MessageInfo, Text},
//!     Server,
//! };
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     async fn handle_text(&self, _ctx: EventContext, message: MessageInfo, text: Text) -> HandlerResult {
//!         println!("{}: {}", message.from, text.body);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), whatsapp_webhook_rs::Error> {
//! Server::builder()
//!     .endpoint("127.0.0.1:8080".parse().unwrap())
//!     .route("/whatsapp")
//!     .verify_token("meatyhamhock")
//!     .build()
//!     .serve(MyHandler)
//!     .await
//! # }
//! ```

use std::{
    fmt,
    future::{Future, IntoFuture},
    mem,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
};

use axum::{extract::Request, routing::any, Router};
use tokio::{net::TcpListener, sync::Notify};
use tracing::info;

use crate::{
    config::WebhookConfig,
    error::Error,
    handler::Handler,
    signature::AppSecret,
    verification::Verifier,
    webhook_service::WebhookServiceBuilder,
};

// Default Server configuration...
const DEFAULT_ENDPOINT: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
const DEFAULT_ROUTE_PATH: &str = "/";

type ShutdownSignal = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// WhatsApp webhook server
///
/// Listens for webhook requests from Meta and routes them to a [`Handler`].
/// Create using [`Server::builder()`] or [`Server::new()`].
#[derive(Debug, Default)]
pub struct Server {
    pub(crate) config: ServerBuilder,
}

impl Server {
    /// Create a new server with default settings
    pub fn new() -> Self {
        ServerBuilder::new().build()
    }

    /// Create a server builder for custom configuration
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Prepares the server to run with `handler`.
    ///
    /// Nothing is bound until the returned [`Serve`] is `.await`ed.
    pub fn serve<H: Handler + 'static>(self, handler: H) -> Serve<H> {
        Serve {
            server: self,
            handler,
        }
    }
}

/// A running-to-be server.
///
/// Implements `IntoFuture`; `.await` it to bind and serve until shutdown.
#[must_use = "Serve does nothing unless you `.await` or `.execute().await` it"]
pub struct Serve<H> {
    server: Server,
    handler: H,
}

impl<H: Handler + 'static> Serve<H> {
    /// Prepares a future that, when awaited, will signal the server to shut down.
    ///
    /// If a shutdown signal was already configured, either one stops the server.
    ///
    /// ```rust,no_run
    /// use whatsapp_webhook_rs::{Handlers, Server};
    ///
    /// # async fn example() {
    /// let mut serve = Server::new().serve(Handlers::new());
    /// let stop = serve.shutdown_trigger();
    ///
    /// let server = tokio::spawn(serve.into_future());
    /// stop.await;
    /// server.await.unwrap().unwrap();
    /// # }
    /// # use std::future::IntoFuture;
    /// ```
    pub fn shutdown_trigger(&mut self) -> impl Future<Output = ()> + Send + 'static {
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        let old_shutdown = mem::take(&mut self.server.config.shutdown);

        self.server.config.shutdown = Some(Self::combine_shutdown(old_shutdown, async move {
            shutdown_clone.notified().await;
        }));

        async move {
            shutdown.notify_one();
        }
    }

    /// Completes when either the old or the new shutdown future completes.
    fn combine_shutdown<S, F>(old_shutdown: Option<S>, update_shutdown: F) -> ShutdownSignal
    where
        S: Future<Output = ()> + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        match old_shutdown {
            Some(shutdown) => Box::pin(async {
                tokio::select! {
                    _ = shutdown => (),
                    _ = update_shutdown => (),
                }
            }),
            None => Box::pin(update_shutdown),
        }
    }

    /// Binds the endpoint and serves until shutdown.
    pub async fn execute(self) -> Result<(), Error> {
        let ServerBuilder {
            endpoint,
            route_path,
            shutdown,
            service,
        } = self.server.config;

        let service = service.build(self.handler);

        let app = Router::new().route(
            &route_path,
            any(move |req: Request| {
                let service = service.clone();
                async move { service.handle(req).await }
            }),
        );

        let listener = TcpListener::bind(endpoint).await.map_err(Error::network)?;
        let local = listener.local_addr().map_err(Error::network)?;
        info!(endpoint = %local, route = %route_path, "WhatsApp webhook server listening");

        let result = match shutdown {
            Some(shutdown) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
            None => axum::serve(listener, app).await,
        };

        info!("WhatsApp webhook server stopped");
        result.map_err(Error::network)
    }
}

impl<H: Handler + 'static> IntoFuture for Serve<H> {
    type Output = Result<(), Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'static>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

/// Builder for creating a [`Server`]
///
/// Customize endpoint, route, shutdown signal and security.
///
/// # Example
/// ```rust
/// use whatsapp_webhook_rs::Server;
///
/// let server = Server::builder()
///     .endpoint("127.0.0.1:8080".parse().unwrap())
///     .route("/whatsapp")
///     .build();
/// ```
#[must_use]
pub struct ServerBuilder {
    pub(crate) endpoint: SocketAddr,
    pub(crate) route_path: String,
    pub(crate) shutdown: Option<ShutdownSignal>,
    pub(crate) service: WebhookServiceBuilder,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            endpoint: SocketAddr::from(DEFAULT_ENDPOINT),
            route_path: DEFAULT_ROUTE_PATH.to_owned(),
            shutdown: None,
            service: WebhookServiceBuilder::new(),
        }
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("endpoint", &self.endpoint)
            .field("route_path", &self.route_path)
            .field("shutdown", &self.shutdown.is_some())
            .field("service", &self.service)
            .finish()
    }
}

impl ServerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a [`WebhookConfig`].
    ///
    /// ```rust
    /// use whatsapp_webhook_rs::{config::WebhookConfig, server::ServerBuilder};
    ///
    /// let config = WebhookConfig::default();
    /// let server = ServerBuilder::from_config(&config).build();
    /// ```
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self {
            endpoint: config.endpoint,
            route_path: config.route.clone(),
            shutdown: None,
            service: WebhookServiceBuilder::from_config(config),
        }
    }

    /// Sets the address and port to listen on, e.g. `0.0.0.0:8080`.
    pub fn endpoint(mut self, endpoint: SocketAddr) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the URL path Meta posts to. Defaults to `/`.
    pub fn route<P: Into<String>>(mut self, path: P) -> Self {
        self.route_path = path.into();
        self
    }

    /// Sets a future that, when resolved, shuts the server down gracefully.
    ///
    /// See also [`Serve::shutdown_trigger`].
    ///
    /// ```rust,no_run
    /// use whatsapp_webhook_rs::server::ServerBuilder;
    ///
    /// let builder = ServerBuilder::new().shutdown(async {
    ///     let _ = tokio::signal::ctrl_c().await;
    /// });
    /// ```
    pub fn shutdown<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown = Some(Box::pin(shutdown));
        self
    }

    /// Verifies `X-Hub-Signature-256` on every `POST` with your Meta app secret.
    ///
    /// Requests that fail are answered `400` and never reach a handler.
    ///
    /// # Security Note 🔒
    /// It is **highly recommended** to enable payload verification in production
    /// environments to ensure that all received webhook events genuinely originate
    /// from Meta's servers.
    pub fn verify_payload(mut self, app_secret: impl Into<AppSecret>) -> Self {
        self.service = self.service.verify_payload(app_secret);
        self
    }

    /// Answers Meta's verification `GET` when `hub.verify_token` matches.
    ///
    /// Without a verify token (or [`verifier`](Self::verifier)) `GET` answers `405`.
    pub fn verify_token(mut self, verify_token: impl Into<String>) -> Self {
        self.service = self.service.verify_token(verify_token);
        self
    }

    /// Answers verification `GET`s with a custom [`Verifier`].
    pub fn verifier(mut self, verifier: impl Verifier + 'static) -> Self {
        self.service = self.service.verifier(verifier);
        self
    }

    /// Largest accepted `POST` body in bytes.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.service = self.service.body_limit(limit);
        self
    }

    /// Builds the [`Server`].
    pub fn build(self) -> Server {
        Server { config: self }
    }
}
