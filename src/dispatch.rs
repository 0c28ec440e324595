//! Dispatch Engine
//!
//! The [`Dispatcher`] walks a decoded [`Notification`] and calls the
//! [`Handler`] slot for every item in it, in the order Meta sent them:
//!
//! 1. entries, then the changes of each entry;
//! 2. for message-family changes: platform errors, then statuses, then
//!    messages. Each message goes to `handle_message_received` first and then
//!    to the one specific slot [`classify`] picks for it;
//! 3. any other change is classified with [`ChangeEvent::classify`] and sent
//!    to its family's slot (one call per item for calls and groups).
//!
//! The walk is sequential and stops at the first handler error. Handlers that
//! already ran keep their side effects; Meta re-delivers the whole
//! notification after a `500`, so handlers should be idempotent.

use std::{future::Future, sync::Arc};

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing::{debug, error, instrument, warn};

use crate::{
    discriminator::classify,
    error::{Error, HandlerError, HandlerKind},
    event::ChangeEvent,
    handler::{call_message_slot, event_kind, EventContext, Handler, HandlerResult},
    notification::{Notification, SubscriptionField, Value},
};

/// Routes notifications to a [`Handler`].
///
/// The handler is held in an [`Arc`]; cloning the dispatcher is cheap and
/// every clone shares the same handler.
///
/// # Example
/// ```rust
/// use whatsapp_webhook_rs::{notification, Dispatcher, Handlers};
///
/// # async fn example() -> Result<(), whatsapp_webhook_rs::Error> {
/// let dispatcher = Dispatcher::new(Handlers::new().on_text(|_ctx, _message, text| async move {
///     assert_eq!(text.body, "hi");
///     Ok(())
/// }));
///
/// let notification = notification::decode(br#"{
///     "object": "whatsapp_business_account",
///     "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
///         "messages": [{"from": "2", "id": "wamid.3", "timestamp": "4",
///                       "type": "text", "text": {"body": "hi"}}]
///     }}]}]
/// }"#)?;
///
/// let summary = dispatcher.dispatch(notification).await?;
/// assert_eq!(summary.invocations, 2); // message_received + text
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Dispatcher<H> {
    handler: Arc<H>,
}

impl<H> Clone for Dispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

/// Counts of what one dispatch walked through.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
#[non_exhaustive]
pub struct DispatchSummary {
    pub entries: usize,
    pub changes: usize,
    /// Handler slots called, registered or not.
    pub invocations: usize,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Shares an existing handler.
    pub fn from_arc(handler: Arc<H>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Dispatches every item of `notification`.
    ///
    /// # Errors
    /// - [`Error::UnsupportedObject`] if `object` is not `whatsapp_business_account`.
    ///   No handler is called.
    /// - [`Error::Handler`] for the first handler that fails. Later items are skipped.
    #[instrument(
        level = "debug",
        skip_all,
        fields(object = %notification.object, entries = notification.entries.len())
    )]
    pub async fn dispatch(&self, notification: Notification) -> Result<DispatchSummary, Error> {
        if !notification.is_whatsapp_business_account() {
            warn!(object = %notification.object, "Rejecting notification for unsupported object");
            return Err(Error::UnsupportedObject(notification.object));
        }

        let mut summary = DispatchSummary::default();

        for entry in notification.entries {
            summary.entries += 1;

            for change in entry.changes {
                summary.changes += 1;

                let ctx = EventContext {
                    business_account_id: entry.id.clone(),
                    notified_at: entry.time,
                    metadata: change.value.metadata.clone(),
                    field: change.field,
                };
                self.dispatch_change(ctx, change.value, &mut summary).await?;
            }
        }

        debug!(?summary, "Notification dispatched");
        Ok(summary)
    }

    /// Dispatches and folds the outcome into the response Meta should get.
    ///
    /// `200` on success (including when nothing is registered), `400` for an
    /// unsupported object, `500` if a handler failed. The body never carries
    /// the underlying error.
    pub async fn handle_notification(&self, notification: Notification) -> WebhookResponse {
        match self.dispatch(notification).await {
            Ok(_) => WebhookResponse::ok(),
            Err(err) => WebhookResponse::from_error(&err),
        }
    }

    async fn dispatch_change(
        &self,
        ctx: EventContext,
        value: Value,
        summary: &mut DispatchSummary,
    ) -> Result<(), Error> {
        if ctx.field == SubscriptionField::Messages || value.has_message_family() {
            return self.dispatch_messages(ctx, value, summary).await;
        }

        match ChangeEvent::classify(&ctx.field, &value) {
            Some(event) => self.dispatch_event(ctx, event, summary).await,
            None => {
                debug!(field = %ctx.field, "No handler slot for change");
                Ok(())
            }
        }
    }

    async fn dispatch_messages(
        &self,
        ctx: EventContext,
        mut value: Value,
        summary: &mut DispatchSummary,
    ) -> Result<(), Error> {
        for error in value.errors.iter().filter_map(|e| e.as_platform()) {
            debug!(code = error.code, "Dispatching notification error");
            self.invoke(
                event_kind::NOTIFICATION_ERROR,
                summary,
                self.handler.handle_notification_error(ctx.clone(), error.clone()),
            )
            .await?;
        }

        for status in std::mem::take(&mut value.statuses) {
            debug!(id = %status.id, status = ?status.status, "Dispatching message status");
            self.invoke(
                event_kind::MESSAGE_STATUS,
                summary,
                self.handler.handle_message_status(ctx.clone(), status),
            )
            .await?;
        }

        let messages = std::mem::take(&mut value.messages);
        for (index, message) in messages.into_iter().enumerate() {
            let sender = value.sender_of(index, &message.from).cloned();

            self.invoke(
                event_kind::MESSAGE_RECEIVED,
                summary,
                self.handler.handle_message_received(ctx.clone(), message.clone()),
            )
            .await?;

            match classify(message) {
                Ok((mut info, kind)) => {
                    info.sender = sender;
                    debug!(id = %info.id, tag = ?kind.tag(), "Dispatching message");

                    summary.invocations += 1;
                    call_message_slot(&*self.handler, ctx.clone(), info, kind)
                        .await
                        .map_err(handler_failed)?;
                }
                Err(unroutable) => {
                    warn!(id = %unroutable.message.id, reason = %unroutable, "Message has no handler slot");
                    self.invoke(
                        event_kind::UNHANDLED_MESSAGE,
                        summary,
                        self.handler.handle_unhandled_message(ctx.clone(), unroutable),
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    async fn dispatch_event(
        &self,
        ctx: EventContext,
        event: ChangeEvent,
        summary: &mut DispatchSummary,
    ) -> Result<(), Error> {
        debug!(field = %ctx.field, "Dispatching change event");

        macro_rules! slot {
            ($kind:ident, $method:ident, $payload:expr) => {
                self.invoke(event_kind::$kind, summary, self.handler.$method(ctx, $payload))
                    .await
            };
        }

        match event {
            ChangeEvent::AccountAlert(p) => slot!(ACCOUNT_ALERT, handle_account_alert, p),
            ChangeEvent::AccountReview(p) => slot!(ACCOUNT_REVIEW, handle_account_review, p),
            ChangeEvent::AccountUpdate(p) => slot!(ACCOUNT_UPDATE, handle_account_update, p),
            ChangeEvent::BusinessCapability(p) => {
                slot!(BUSINESS_CAPABILITY, handle_business_capability, p)
            }
            ChangeEvent::PhoneNumberName(p) => {
                slot!(PHONE_NUMBER_NAME, handle_phone_number_name, p)
            }
            ChangeEvent::PhoneNumberQuality(p) => {
                slot!(PHONE_NUMBER_QUALITY, handle_phone_number_quality, p)
            }
            ChangeEvent::TemplateStatus(p) => slot!(TEMPLATE_STATUS, handle_template_status, p),
            ChangeEvent::TemplateQuality(p) => slot!(TEMPLATE_QUALITY, handle_template_quality, p),
            ChangeEvent::TemplateCategory(p) => {
                slot!(TEMPLATE_CATEGORY, handle_template_category, p)
            }
            ChangeEvent::TemplateComponents(p) => {
                slot!(TEMPLATE_COMPONENTS, handle_template_components, p)
            }
            ChangeEvent::Security(p) => slot!(SECURITY, handle_security, p),
            ChangeEvent::FlowStatusChange(p) => {
                slot!(FLOW_STATUS_CHANGE, handle_flow_status_change, p)
            }
            ChangeEvent::FlowAlert(p) => slot!(FLOW_ALERT, handle_flow_alert, p),
            ChangeEvent::Calls(calls) => {
                for call in calls {
                    self.invoke(
                        event_kind::CALL,
                        summary,
                        self.handler.handle_call(ctx.clone(), call),
                    )
                    .await?;
                }
                Ok(())
            }
            ChangeEvent::Groups(groups) => {
                for group in groups {
                    self.invoke(
                        event_kind::GROUP,
                        summary,
                        self.handler.handle_group(ctx.clone(), group),
                    )
                    .await?;
                }
                Ok(())
            }
        }
    }

    async fn invoke<F>(
        &self,
        kind: HandlerKind,
        summary: &mut DispatchSummary,
        fut: F,
    ) -> Result<(), Error>
    where
        F: Future<Output = HandlerResult> + Send,
    {
        summary.invocations += 1;
        fut.await
            .map_err(|source| handler_failed(HandlerError::new(kind, source)))
    }
}

fn handler_failed(err: HandlerError) -> Error {
    error!(error = %err, "Webhook handler failed");
    Error::Handler(err)
}

/// The status code and body to answer Meta with.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct WebhookResponse {
    status: StatusCode,
    body: String,
}

impl WebhookResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `200` with an empty body.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK, "")
    }

    /// Maps an error to its status code with a fixed, generic body.
    pub fn from_error(err: &Error) -> Self {
        let body = match err {
            Error::Decode(_) => "Invalid JSON payload. Please ensure the body is valid JSON.",
            Error::Signature(_) => "Signature verification failed",
            Error::UnsupportedObject(_) => "Unsupported webhook object",
            Error::Verification(_) => "",
            _ => "Failed to process webhook event due to an internal server error.",
        };
        Self::new(err.status(), body)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}
