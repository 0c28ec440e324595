#![deny(clippy::future_not_send)]
#![deny(clippy::large_enum_variant)]

//! # whatsapp_webhook_rs
//!
//! Receive, verify and route WhatsApp Business Platform webhook notifications.
//!
//! Meta delivers every webhook event for a business account through one
//! envelope: an `object`, a list of `entry` items and, inside each, a list of
//! `changes` whose `value` carries whichever event actually happened (an
//! inbound message, a delivery status, a template review, a call...). This
//! crate decodes that envelope, works out which event each item is, and calls
//! exactly one of your handlers for it.
//!
//! ## ✨ Features
//!
//! - **Typed notifications**: [`Notification`], [`Message`], [`Status`] and the
//!   account/template/flow/call event payloads, all `serde` types.
//! - **Discrimination**: [`classify`] maps every inbound message to a single
//!   [`MessageKind`], including the reply/referral overrides for text messages.
//! - **Handlers**: implement [`Handler`] and override only what you need, or
//!   register closures on a [`Handlers`] registry. Unregistered slots are no-ops.
//! - **Security**: HMAC-SHA256 validation of `X-Hub-Signature-256` in constant time.
//! - **HTTP**: a managed [`Server`] or a framework-agnostic [`WebhookService`].
//!
//! ## 🚀 Examples
//!
//! ### Register closures and run a server
//! ```rust,no_run
//! use whatsapp_webhook_rs::{Handlers, Server};
//!
//! # async fn example() -> Result<(), whatsapp_webhook_rs::Error> {
//! let handlers = Handlers::new()
//!     .on_text(|_ctx, message, text| async move {
//!         println!("{} said {}", message.from, text.body);
//!         Ok(())
//!     })
//!     .on_button_reply(|_ctx, _message, reply| async move {
//!         println!("clicked {}", reply.id);
//!         Ok(())
//!     });
//!
//! Server::builder()
//!     .endpoint("127.0.0.1:8080".parse().unwrap())
//!     .verify_token("my_verify_token")
//!     .verify_payload("my_app_secret")
//!     .build()
//!     .serve(handlers)
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! ### Implement the trait
//! ```rust
//! use whatsapp_webhook_rs::{
//!     handler::{EventContext, Handler, HandlerResult},
//!     message::{MessageInfo, Text},
//! };
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     async fn handle_text(
//!         &self,
//!         _ctx: EventContext,
//!         message: MessageInfo,
//!         text: Text,
//!     ) -> HandlerResult {
//!         println!("{}: {}", message.from, text.body);
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ### Dispatch a payload you already have
//! ```rust
//! use whatsapp_webhook_rs::{dispatch::Dispatcher, notification, Handlers};
//!
//! # async fn example(body: &[u8]) -> Result<(), whatsapp_webhook_rs::Error> {
//! let dispatcher = Dispatcher::new(Handlers::new());
//! let notification = notification::decode(body)?;
//! let response = dispatcher.handle_notification(notification).await;
//! assert!(response.status().is_success());
//! # Ok(()) }
//! ```

pub mod config;
pub mod discriminator;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod notification;
#[cfg(feature = "server")]
pub mod server;
pub mod signature;
pub mod verification;
pub mod webhook_service;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Represents an error object reported by Meta inside a webhook payload.
///
/// These appear in `value.errors`, on failed statuses and on messages of type
/// `unknown`:
///
/// ```json
/// {
///   "code": 131051,
///   "title": "Unsupported message type",
///   "message": "Message type unknown is not currently supported.",
///   "error_data": { "details": "Message type is not currently supported" }
/// }
/// ```
#[derive(thiserror::Error, Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct MetaError {
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "href", default, skip_serializing_if = "Option::is_none")]
    pub support: Option<String>,
    #[serde(
        rename = "error_data",
        default,
        skip_serializing_if = "MetaErrorMetadata::is_none"
    )]
    pub error_metadata: MetaErrorMetadata,
}

impl MetaError {
    /// Creates an error with only a code and title.
    pub fn new(code: i64, title: impl Into<String>) -> Self {
        Self {
            code,
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(code: {})", self.code)?;

        if let Some(title) = &self.title {
            write!(f, " - {}", title)?;
        }

        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }

        if let Some(details) = self
            .error_metadata
            .details
            .as_ref()
            .or(self.details.as_ref())
        {
            write!(f, "\n  Details: {}", details)?;
        }

        if let Some(support) = &self.support {
            write!(f, "\n  More info: {}", support)?;
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct MetaErrorMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl MetaErrorMetadata {
    fn is_none(&self) -> bool {
        self.details.is_none()
    }
}

/// Represents a timestamp sent by the WhatsApp Business Platform.
///
/// Meta uses UNIX timestamps (`seconds since epoch`) but is not consistent
/// about the JSON type: `entry.time` is a number while message timestamps are
/// numeric strings. Both are accepted.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug, Default)]
pub struct Timestamp {
    pub(crate) inner: i64,
}

impl Timestamp {
    /// Creates a timestamp from seconds since the UNIX epoch.
    pub fn from_seconds(seconds: i64) -> Self {
        Self { inner: seconds }
    }

    /// Returns the raw timestamp in seconds.
    pub fn seconds(&self) -> i64 {
        self.inner
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.inner)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        notification::deserialize_str::<i64, D>(deserializer).map(Timestamp::from_seconds)
    }
}

pub use discriminator::{classify, MessageKind, MessageTag};
pub use dispatch::{Dispatcher, WebhookResponse};
pub use error::Error;
pub use handler::{EventContext, Handler, Handlers};
pub use message::Message;
pub use notification::{Notification, Status, SubscriptionField};
#[cfg(feature = "server")]
pub use server::Server;
pub use webhook_service::WebhookService;
