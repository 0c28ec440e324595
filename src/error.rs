//! Error Handling
//!
//! This module defines the crate's error types. Every failure the webhook
//! pipeline can hit (a body that is not JSON, a bad signature, a handler that
//! gave up) is represented here, and each one knows which HTTP status code
//! Meta should see for it.
//!
//! Handler failures are wrapped in [`HandlerError`], which carries a
//! [`HandlerKind`] naming the handler slot that failed. The kind is the static
//! "sentinel" you match on; the boxed source is whatever your handler returned.

use std::error::Error as StdError;

use http::StatusCode;

/// The **top-level error enum** for the `whatsapp-webhook-rs` crate.
///
/// It uses `#[non_exhaustive]` to allow for future additions of error variants
/// without breaking client code.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The request body could not be decoded into a [`Notification`].
    ///
    /// [`Notification`]: crate::notification::Notification
    #[error("Failed to decode the webhook payload: {0}")]
    Decode(#[from] DecodeError),

    /// The `X-Hub-Signature-256` header did not authenticate the body.
    #[error("Webhook signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    /// The notification's `object` is not `whatsapp_business_account`.
    #[error("Invalid object type '{0}'. Expected 'whatsapp_business_account'.")]
    UnsupportedObject(String),

    /// A registered handler returned an error.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The subscription verifier rejected a verification handshake.
    #[error("Webhook subscription verification was rejected: {0}")]
    Verification(#[source] BoxError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Invalid webhook configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// Binding or serving the HTTP listener failed.
    #[error("A network error occurred: {0}")]
    Network(#[source] BoxError),
}

impl Error {
    pub(crate) fn network(err: impl Into<BoxError>) -> Self {
        Self::Network(err.into())
    }

    /// The HTTP status code Meta should receive for this error.
    ///
    /// Handler and internal failures map to `500` so Meta re-delivers the
    /// notification; payload problems map to `400` since re-delivery would not help.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Decode(_) | Error::Signature(_) | Error::UnsupportedObject(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Verification(_) => StatusCode::BAD_REQUEST,
            Error::Handler(_) | Error::Config(_) | Error::Network(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Represents an error that occurred during **payload decoding**.
///
/// # Fields
/// - `source`: the underlying `serde_json::Error`.
/// - `body`: the raw body that could not be decoded (lossy UTF-8), useful for debugging.
#[derive(thiserror::Error, Debug)]
#[error("Failed to parse the webhook body: {source}")]
#[non_exhaustive]
pub struct DecodeError {
    #[source]
    pub(crate) source: serde_json::Error,
    pub body: String,
}

impl DecodeError {
    pub(crate) fn new(source: serde_json::Error, raw: &[u8]) -> Self {
        Self {
            source,
            body: String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

/// Why a payload signature was rejected.
///
/// The messages are intentionally generic; they never echo the secret or the
/// expected digest.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum SignatureError {
    /// No `X-Hub-Signature-256` header was sent.
    #[error("Missing X-Hub-Signature-256 header")]
    MissingHeader,

    /// The header value is not valid visible ASCII.
    #[error("Invalid signature header")]
    InvalidHeader,

    /// The digest did not match the body.
    #[error("Signature mismatch. This usually indicates an incorrect app secret or a tampered payload.")]
    Mismatch,
}

/// A registered handler returned an error.
///
/// The [`kind`](Self::kind) identifies which handler slot failed, so a failing
/// button handler can be told apart from a failing text handler without
/// inspecting the source.
#[derive(thiserror::Error, Debug)]
#[error("{kind}: {source}")]
#[non_exhaustive]
pub struct HandlerError {
    pub kind: HandlerKind,
    #[source]
    pub source: BoxError,
}

impl HandlerError {
    pub(crate) fn new(kind: HandlerKind, source: BoxError) -> Self {
        Self { kind, source }
    }

    /// The handler slot that failed.
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }
}

/// Identifies a handler slot. Used as the static part of a [`HandlerError`].
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
#[non_exhaustive]
pub enum HandlerKind {
    NotificationError,
    MessageStatus,
    MessageReceived,
    Text,
    Referral,
    ProductEnquiry,
    Audio,
    Image,
    Video,
    Document,
    Sticker,
    Location,
    Contacts,
    Reaction,
    Button,
    Order,
    System,
    Interactive,
    ButtonReply,
    ListReply,
    FlowReply,
    Identity,
    UnknownMessage,
    UnhandledMessage,
    AccountAlert,
    AccountReview,
    AccountUpdate,
    BusinessCapability,
    PhoneNumberName,
    PhoneNumberQuality,
    TemplateStatus,
    TemplateQuality,
    TemplateCategory,
    TemplateComponents,
    Security,
    FlowStatusChange,
    FlowAlert,
    Call,
    Group,
}

impl HandlerKind {
    /// Static description used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::NotificationError => "notification error handler failed",
            HandlerKind::MessageStatus => "message status handler failed",
            HandlerKind::MessageReceived => "message received handler failed",
            HandlerKind::Text => "text message handler failed",
            HandlerKind::Referral => "referral message handler failed",
            HandlerKind::ProductEnquiry => "product enquiry handler failed",
            HandlerKind::Audio => "audio message handler failed",
            HandlerKind::Image => "image message handler failed",
            HandlerKind::Video => "video message handler failed",
            HandlerKind::Document => "document message handler failed",
            HandlerKind::Sticker => "sticker message handler failed",
            HandlerKind::Location => "location message handler failed",
            HandlerKind::Contacts => "contacts message handler failed",
            HandlerKind::Reaction => "reaction message handler failed",
            HandlerKind::Button => "button message handler failed",
            HandlerKind::Order => "order message handler failed",
            HandlerKind::System => "system message handler failed",
            HandlerKind::Interactive => "interactive message handler failed",
            HandlerKind::ButtonReply => "button reply handler failed",
            HandlerKind::ListReply => "list reply handler failed",
            HandlerKind::FlowReply => "flow reply handler failed",
            HandlerKind::Identity => "identity change handler failed",
            HandlerKind::UnknownMessage => "unknown message handler failed",
            HandlerKind::UnhandledMessage => "unhandled message handler failed",
            HandlerKind::AccountAlert => "account alert handler failed",
            HandlerKind::AccountReview => "account review handler failed",
            HandlerKind::AccountUpdate => "account update handler failed",
            HandlerKind::BusinessCapability => "business capability handler failed",
            HandlerKind::PhoneNumberName => "phone number name handler failed",
            HandlerKind::PhoneNumberQuality => "phone number quality handler failed",
            HandlerKind::TemplateStatus => "template status handler failed",
            HandlerKind::TemplateQuality => "template quality handler failed",
            HandlerKind::TemplateCategory => "template category handler failed",
            HandlerKind::TemplateComponents => "template components handler failed",
            HandlerKind::Security => "security event handler failed",
            HandlerKind::FlowStatusChange => "flow status change handler failed",
            HandlerKind::FlowAlert => "flow alert handler failed",
            HandlerKind::Call => "call event handler failed",
            HandlerKind::Group => "group event handler failed",
        }
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A convenient type alias for a boxed, trait-object error that can be sent across threads.
///
/// This is what handlers return on failure.
pub type BoxError = Box<dyn StdError + Send + Sync>;
