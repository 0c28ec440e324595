//! Handler Slots
//!
//! Every discriminated message type and change event has one handler slot.
//! There are two ways to fill them:
//!
//! - Implement [`Handler`] on your own type and override the `handle_*`
//!   methods you care about. Every method has a no-op default that returns `Ok(())`.
//! - Register closures on a [`Handlers`] registry with the matching `on_*`
//!   setters. Slots left empty behave like the defaults.
//!
//! Message handlers receive the [`EventContext`], the message envelope
//! ([`MessageInfo`]) and the typed payload. Event handlers receive the context
//! and the payload.
//!
//! A handler signals failure by returning `Err`. The dispatcher stops
//! processing the request at the first failure and answers Meta with a `500`,
//! so the notification is re-delivered later.
//!
//! # Example
//! ```rust
//! use whatsapp_webhook_rs::Handlers;
//!
//! let handlers = Handlers::new()
//!     .on_text(|_ctx, message, text| async move {
//!         println!("{}: {}", message.from, text.body);
//!         Ok(())
//!     })
//!     .on_message_status(|_ctx, status| async move {
//!         println!("{} is now {:?}", status.id, status.status);
//!         Ok(())
//!     });
//!
//! assert!(format!("{handlers:?}").contains("text"));
//! ```

use std::{fmt, future::Future};

use futures::future::BoxFuture;

use crate::{
    discriminator::{MessageKind, UnroutableMessage},
    error::{BoxError, HandlerError, HandlerKind},
    event::{
        AccountAlert, AccountReview, AccountUpdate, BusinessCapability, CallEvent, FlowAlert,
        FlowStatusChange, GroupEvent, PhoneNumberName, PhoneNumberQuality, SecurityEvent,
        TemplateCategory, TemplateComponents, TemplateQuality, TemplateStatus,
    },
    message::{
        Button, ButtonReply, ContactCard, FlowReply, Identity, Interactive, ListReply, Location,
        MediaInfo, Message, MessageInfo, Order, ProductEnquiry, Reaction, ReferralMessage, System,
        Text,
    },
    notification::{Metadata, Status, SubscriptionField},
    MetaError, Timestamp,
};

/// What every handler returns. Any error type that is `Send + Sync` converts
/// into the boxed error with `?`.
pub type HandlerResult = Result<(), BoxError>;

/// Where an event came from.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct EventContext {
    pub(crate) business_account_id: String,
    pub(crate) notified_at: Option<Timestamp>,
    pub(crate) field: SubscriptionField,
    pub(crate) metadata: Option<Metadata>,
}

impl EventContext {
    pub fn new(business_account_id: impl Into<String>, field: SubscriptionField) -> Self {
        Self {
            business_account_id: business_account_id.into(),
            notified_at: None,
            field,
            metadata: None,
        }
    }

    /// The WhatsApp Business Account (entry) ID.
    pub fn business_account_id(&self) -> &str {
        &self.business_account_id
    }

    /// When Meta sent the notification, if it said so.
    pub fn notified_at(&self) -> Option<Timestamp> {
        self.notified_at
    }

    /// The subscription field of the change.
    pub fn field(&self) -> &SubscriptionField {
        &self.field
    }

    /// The business phone number that received a message-family change.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Shortcut for `metadata().phone_number_id`.
    pub fn phone_number_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.phone_number_id.as_str())
    }
}

type MessageSlot<T> =
    Box<dyn Fn(EventContext, MessageInfo, T) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type EventSlot<T> = Box<dyn Fn(EventContext, T) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

macro_rules! handler_slots {
    (
        messages {$(
            $(#[$mdoc:meta])*
            $mname:ident: $mty:ty => $mvariant:ident / $mkind:ident
        ),* $(,)?}
        events {$(
            $(#[$edoc:meta])*
            $ename:ident: $ety:ty => $ekind:ident
        ),* $(,)?}
    ) => {
        paste::paste! {
            /// Receives dispatched webhook events.
            ///
            /// Override only what you need; every method defaults to a no-op
            /// that returns `Ok(())`.
            ///
            /// # Example
            /// ```rust
            /// use whatsapp_webhook_rs::{
            ///     handler::{EventContext, Handler, HandlerResult},
            ///     message::{ButtonReply, MessageInfo},
            /// };
            ///
            /// struct Buttons;
            ///
            /// impl Handler for Buttons {
            ///     async fn handle_button_reply(
            ///         &self,
            ///         _ctx: EventContext,
            ///         message: MessageInfo,
            ///         reply: ButtonReply,
            ///     ) -> HandlerResult {
            ///         println!("{} pressed {}", message.from, reply.id);
            ///         Ok(())
            ///     }
            /// }
            /// ```
            pub trait Handler: Send + Sync {
                $(
                    $(#[$mdoc])*
                    fn [<handle_ $mname>](
                        &self,
                        ctx: EventContext,
                        message: MessageInfo,
                        payload: $mty,
                    ) -> impl Future<Output = HandlerResult> + Send {
                        let _ = (ctx, message, payload);
                        async { Ok(()) }
                    }
                )*

                $(
                    $(#[$edoc])*
                    fn [<handle_ $ename>](
                        &self,
                        ctx: EventContext,
                        payload: $ety,
                    ) -> impl Future<Output = HandlerResult> + Send {
                        let _ = (ctx, payload);
                        async { Ok(()) }
                    }
                )*
            }

            /// A [`Handler`] built from closures.
            ///
            /// Each `on_*` setter fills one slot, replacing any earlier closure.
            /// Once handed to a [`Dispatcher`](crate::dispatch::Dispatcher) the
            /// registry is shared read-only across requests.
            #[derive(Default)]
            #[must_use]
            pub struct Handlers {
                $( $mname: Option<MessageSlot<$mty>>, )*
                $( $ename: Option<EventSlot<$ety>>, )*
            }

            impl Handlers {
                /// An empty registry; every slot is a no-op.
                pub fn new() -> Self {
                    Self::default()
                }

                $(
                    $(#[$mdoc])*
                    pub fn [<on_ $mname>]<F, Fut>(mut self, f: F) -> Self
                    where
                        F: Fn(EventContext, MessageInfo, $mty) -> Fut + Send + Sync + 'static,
                        Fut: Future<Output = HandlerResult> + Send + 'static,
                    {
                        self.$mname = Some(Box::new(move |ctx, message, payload| {
                            Box::pin(f(ctx, message, payload))
                        }));
                        self
                    }
                )*

                $(
                    $(#[$edoc])*
                    pub fn [<on_ $ename>]<F, Fut>(mut self, f: F) -> Self
                    where
                        F: Fn(EventContext, $ety) -> Fut + Send + Sync + 'static,
                        Fut: Future<Output = HandlerResult> + Send + 'static,
                    {
                        self.$ename = Some(Box::new(move |ctx, payload| Box::pin(f(ctx, payload))));
                        self
                    }
                )*

                /// Names of the slots that have a closure registered.
                pub fn registered(&self) -> Vec<&'static str> {
                    let mut names = Vec::new();
                    $( if self.$mname.is_some() { names.push(stringify!($mname)); } )*
                    $( if self.$ename.is_some() { names.push(stringify!($ename)); } )*
                    names
                }
            }

            impl Handler for Handlers {
                $(
                    fn [<handle_ $mname>](
                        &self,
                        ctx: EventContext,
                        message: MessageInfo,
                        payload: $mty,
                    ) -> impl Future<Output = HandlerResult> + Send {
                        let fut = self.$mname.as_ref().map(|f| f(ctx, message, payload));
                        async move {
                            match fut {
                                Some(fut) => fut.await,
                                None => Ok(()),
                            }
                        }
                    }
                )*

                $(
                    fn [<handle_ $ename>](
                        &self,
                        ctx: EventContext,
                        payload: $ety,
                    ) -> impl Future<Output = HandlerResult> + Send {
                        let fut = self.$ename.as_ref().map(|f| f(ctx, payload));
                        async move {
                            match fut {
                                Some(fut) => fut.await,
                                None => Ok(()),
                            }
                        }
                    }
                )*
            }

            /// Invokes the single message slot matching `kind`.
            pub(crate) async fn call_message_slot<H: Handler>(
                handler: &H,
                ctx: EventContext,
                message: MessageInfo,
                kind: MessageKind,
            ) -> Result<(), HandlerError> {
                match kind {
                    $(
                        MessageKind::$mvariant(payload) => handler
                            .[<handle_ $mname>](ctx, message, payload)
                            .await
                            .map_err(|err| HandlerError::new(HandlerKind::$mkind, err)),
                    )*
                }
            }

            /// The [`HandlerKind`] of each event slot, by slot name.
            pub(crate) mod event_kind {
                use super::HandlerKind;
                $( pub(crate) const [<$ename:upper>]: HandlerKind = HandlerKind::$ekind; )*
            }
        }
    };
}

handler_slots! {
    messages {
        /// A plain text message.
        text: Text => Text / Text,
        /// A text message from a Click to WhatsApp ad or post.
        referral: ReferralMessage => Referral / Referral,
        /// A text message replying to a product or to another message.
        product_enquiry: ProductEnquiry => ProductEnquiry / ProductEnquiry,
        audio: MediaInfo => Audio / Audio,
        image: MediaInfo => Image / Image,
        video: MediaInfo => Video / Video,
        document: MediaInfo => Document / Document,
        sticker: MediaInfo => Sticker / Sticker,
        location: Location => Location / Location,
        contacts: Vec<ContactCard> => Contacts / Contacts,
        /// A reaction was added or removed.
        reaction: Reaction => Reaction / Reaction,
        /// A template quick-reply button was tapped.
        button: Button => Button / Button,
        order: Order => Order / Order,
        /// E.g. the customer changed their number.
        system: System => System / System,
        /// An interactive reply with no dedicated slot.
        interactive: Interactive => Interactive / Interactive,
        /// A reply button was tapped.
        button_reply: ButtonReply => ButtonReply / ButtonReply,
        /// A list row was selected.
        list_reply: ListReply => ListReply / ListReply,
        /// A WhatsApp Flow was completed.
        flow_reply: FlowReply => FlowReply / FlowReply,
        /// The customer's security code changed.
        identity: Identity => Identity / Identity,
        /// A message WhatsApp could not deliver, with its errors.
        unknown_message: Vec<MetaError> => Unknown / UnknownMessage,
    }
    events {
        /// Every inbound message, before its specific slot.
        message_received: Message => MessageReceived,
        /// An inbound message no slot fits.
        unhandled_message: UnroutableMessage => UnhandledMessage,
        /// A platform error reported in `value.errors`.
        notification_error: MetaError => NotificationError,
        /// A delivery status for a message you sent.
        message_status: Status => MessageStatus,
        account_alert: AccountAlert => AccountAlert,
        account_review: AccountReview => AccountReview,
        /// Bans, violations, restrictions and partner additions.
        account_update: AccountUpdate => AccountUpdate,
        business_capability: BusinessCapability => BusinessCapability,
        phone_number_name: PhoneNumberName => PhoneNumberName,
        phone_number_quality: PhoneNumberQuality => PhoneNumberQuality,
        template_status: TemplateStatus => TemplateStatus,
        template_quality: TemplateQuality => TemplateQuality,
        template_category: TemplateCategory => TemplateCategory,
        template_components: TemplateComponents => TemplateComponents,
        security: SecurityEvent => Security,
        flow_status_change: FlowStatusChange => FlowStatusChange,
        /// Flow endpoint error rate, latency or availability alerts.
        flow_alert: FlowAlert => FlowAlert,
        /// One call item of a `calls` change.
        call: CallEvent => Call,
        /// One group item of a group change.
        group: GroupEvent => Group,
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("registered", &self.registered())
            .finish()
    }
}

const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Handlers>();
};
