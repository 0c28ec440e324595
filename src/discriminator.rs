//! Message Type Discrimination
//!
//! Maps an inbound [`Message`] onto exactly one [`MessageKind`], the unit the
//! dispatcher routes on.
//!
//! The `type` tag decides most cases. A few need more than the tag:
//!
//! - `text` is split three ways. A non-empty `referral` makes it a
//!   [`MessageKind::Referral`]; otherwise a `context` makes it a
//!   [`MessageKind::ProductEnquiry`]; otherwise it is plain text.
//! - `interactive` is split by its inner `type` into button, list and flow
//!   replies, with a generic [`MessageKind::Interactive`] for anything else.
//! - An unrecognized tag falls back to field presence, checking `contacts`,
//!   `location` and `identity` in that order.
//!
//! Messages that still cannot be placed are returned as
//! [`UnroutableMessage`] so the caller can decide what to do with them.

use std::fmt;

use crate::{
    message::{
        Button, ButtonReply, ContactCard, Context, FlowReply, Identity, Interactive, ListReply,
        Location, MediaInfo, Message, MessageInfo, Order, ProductEnquiry, Reaction, Referral,
        ReferralMessage, System, Text,
    },
    MetaError,
};

/// The recognized values of a message's `type` tag.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
#[non_exhaustive]
pub enum MessageType {
    Audio,
    Button,
    Document,
    Text,
    Image,
    Interactive,
    Order,
    Sticker,
    System,
    /// WhatsApp's own `unknown` type: content it could not deliver.
    Unknown,
    Video,
    Location,
    Reaction,
    Contacts,
}

impl MessageType {
    /// Parses a type tag, ignoring surrounding whitespace and case.
    ///
    /// Returns `None` for tags outside the known set. That is distinct from
    /// `Some(MessageType::Unknown)`, which is the literal `unknown` tag.
    ///
    /// ```rust
    /// use whatsapp_webhook_rs::discriminator::MessageType;
    ///
    /// assert_eq!(MessageType::from_tag(" TEXT "), Some(MessageType::Text));
    /// assert_eq!(MessageType::from_tag("unknown"), Some(MessageType::Unknown));
    /// assert_eq!(MessageType::from_tag("hologram"), None);
    /// ```
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        let ty = match tag.as_str() {
            "audio" => MessageType::Audio,
            "button" => MessageType::Button,
            "document" => MessageType::Document,
            "text" => MessageType::Text,
            "image" => MessageType::Image,
            "interactive" => MessageType::Interactive,
            "order" => MessageType::Order,
            "sticker" => MessageType::Sticker,
            "system" => MessageType::System,
            "unknown" => MessageType::Unknown,
            "video" => MessageType::Video,
            "location" => MessageType::Location,
            "reaction" => MessageType::Reaction,
            "contacts" => MessageType::Contacts,
            _ => return None,
        };
        Some(ty)
    }
}

/// The three readings of a `text` message.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum TextKind {
    Referral,
    ProductEnquiry,
    Plain,
}

impl TextKind {
    /// Referral beats context, context beats plain text.
    ///
    /// An empty referral object counts as absent.
    pub fn classify(referral: Option<&Referral>, context: Option<&Context>) -> Self {
        match (referral, context) {
            (Some(referral), _) if !referral.is_empty() => TextKind::Referral,
            (_, Some(_)) => TextKind::ProductEnquiry,
            _ => TextKind::Plain,
        }
    }
}

/// The recognized values of `interactive.type`.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum InteractiveKind {
    ButtonReply,
    ListReply,
    FlowReply,
    Generic,
}

impl InteractiveKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "button_reply" => InteractiveKind::ButtonReply,
            "list_reply" => InteractiveKind::ListReply,
            "nfm_reply" => InteractiveKind::FlowReply,
            _ => InteractiveKind::Generic,
        }
    }
}

/// The discriminated form of an inbound message, carrying its payload.
#[derive(PartialEq, Clone, Debug)]
#[non_exhaustive]
pub enum MessageKind {
    Text(Text),
    Referral(ReferralMessage),
    ProductEnquiry(ProductEnquiry),
    Audio(MediaInfo),
    Image(MediaInfo),
    Video(MediaInfo),
    Document(MediaInfo),
    Sticker(MediaInfo),
    Location(Location),
    Contacts(Vec<ContactCard>),
    Reaction(Reaction),
    Button(Button),
    Order(Order),
    System(System),
    /// An interactive reply of a type without a dedicated slot.
    Interactive(Interactive),
    ButtonReply(ButtonReply),
    ListReply(ListReply),
    FlowReply(FlowReply),
    Identity(Identity),
    /// WhatsApp's `unknown` type, with the errors it attached.
    Unknown(Vec<MetaError>),
}

/// Payload-free discriminant of a [`MessageKind`].
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
#[non_exhaustive]
pub enum MessageTag {
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
    Unknown,
}

impl MessageKind {
    pub fn tag(&self) -> MessageTag {
        match self {
            MessageKind::Text(_) => MessageTag::Text,
            MessageKind::Referral(_) => MessageTag::Referral,
            MessageKind::ProductEnquiry(_) => MessageTag::ProductEnquiry,
            MessageKind::Audio(_) => MessageTag::Audio,
            MessageKind::Image(_) => MessageTag::Image,
            MessageKind::Video(_) => MessageTag::Video,
            MessageKind::Document(_) => MessageTag::Document,
            MessageKind::Sticker(_) => MessageTag::Sticker,
            MessageKind::Location(_) => MessageTag::Location,
            MessageKind::Contacts(_) => MessageTag::Contacts,
            MessageKind::Reaction(_) => MessageTag::Reaction,
            MessageKind::Button(_) => MessageTag::Button,
            MessageKind::Order(_) => MessageTag::Order,
            MessageKind::System(_) => MessageTag::System,
            MessageKind::Interactive(_) => MessageTag::Interactive,
            MessageKind::ButtonReply(_) => MessageTag::ButtonReply,
            MessageKind::ListReply(_) => MessageTag::ListReply,
            MessageKind::FlowReply(_) => MessageTag::FlowReply,
            MessageKind::Identity(_) => MessageTag::Identity,
            MessageKind::Unknown(_) => MessageTag::Unknown,
        }
    }
}

/// Why a message could not be classified.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[non_exhaustive]
pub enum UnroutableReason {
    /// The tag is not recognized and no fallback field is present.
    UnrecognizedType,
    /// The tag is recognized but its payload field is missing.
    MissingPayload,
}

/// A message no handler slot fits. The original message is kept intact.
#[derive(PartialEq, Clone, Debug)]
#[non_exhaustive]
pub struct UnroutableMessage {
    pub reason: UnroutableReason,
    pub message: Box<Message>,
}

impl fmt::Display for UnroutableMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            UnroutableReason::UnrecognizedType => {
                write!(f, "unrecognized message type '{}'", self.message.kind)
            }
            UnroutableReason::MissingPayload => {
                write!(f, "message of type '{}' has no payload", self.message.kind)
            }
        }
    }
}

impl std::error::Error for UnroutableMessage {}

/// Classifies a message into its envelope and a single [`MessageKind`].
///
/// # Example
/// ```rust
/// use whatsapp_webhook_rs::{classify, Message, MessageTag};
///
/// let message: Message = serde_json::from_value(serde_json::json!({
///     "from": "16505551234",
///     "id": "wamid.1",
///     "timestamp": "1700000000",
///     "type": "text",
///     "text": { "body": "Is this in stock?" },
///     "context": { "from": "15550783881", "id": "wamid.0" }
/// })).unwrap();
///
/// let (info, kind) = classify(message).unwrap();
/// assert_eq!(info.from, "16505551234");
/// assert_eq!(kind.tag(), MessageTag::ProductEnquiry);
/// ```
pub fn classify(message: Message) -> Result<(MessageInfo, MessageKind), UnroutableMessage> {
    let info = message.info();

    let Some(ty) = MessageType::from_tag(&message.kind) else {
        return match fallback(message) {
            Ok(kind) => Ok((info, kind)),
            Err(message) => Err(UnroutableMessage {
                reason: UnroutableReason::UnrecognizedType,
                message,
            }),
        };
    };

    macro_rules! payload {
        ($field:ident => $variant:ident) => {
            match message.$field {
                Some(payload) => MessageKind::$variant(payload),
                None => return Err(missing(message)),
            }
        };
    }

    let kind = match ty {
        MessageType::Text => {
            let Some(text) = message.text.clone() else {
                return Err(missing(message));
            };
            match TextKind::classify(message.referral.as_ref(), message.context.as_ref()) {
                TextKind::Referral => MessageKind::Referral(ReferralMessage {
                    text,
                    referral: message.referral.unwrap_or_default(),
                }),
                TextKind::ProductEnquiry => MessageKind::ProductEnquiry(ProductEnquiry {
                    text,
                    context: message.context.unwrap_or_default(),
                }),
                TextKind::Plain => MessageKind::Text(text),
            }
        }
        MessageType::Interactive => {
            let Some(interactive) = message.interactive.clone() else {
                return Err(missing(message));
            };
            match InteractiveKind::from_tag(&interactive.kind) {
                InteractiveKind::ButtonReply => match interactive.button_reply {
                    Some(reply) => MessageKind::ButtonReply(reply),
                    None => return Err(missing(message)),
                },
                InteractiveKind::ListReply => match interactive.list_reply {
                    Some(reply) => MessageKind::ListReply(reply),
                    None => return Err(missing(message)),
                },
                InteractiveKind::FlowReply => match interactive.nfm_reply {
                    Some(reply) => MessageKind::FlowReply(reply),
                    None => return Err(missing(message)),
                },
                InteractiveKind::Generic => MessageKind::Interactive(interactive),
            }
        }
        MessageType::Audio => payload!(audio => Audio),
        MessageType::Image => payload!(image => Image),
        MessageType::Video => payload!(video => Video),
        MessageType::Document => payload!(document => Document),
        MessageType::Sticker => payload!(sticker => Sticker),
        MessageType::Location => payload!(location => Location),
        MessageType::Contacts => payload!(contacts => Contacts),
        MessageType::Reaction => payload!(reaction => Reaction),
        MessageType::Button => payload!(button => Button),
        MessageType::Order => payload!(order => Order),
        MessageType::System => payload!(system => System),
        MessageType::Unknown => MessageKind::Unknown(message.errors),
    };

    Ok((info, kind))
}

fn fallback(message: Message) -> Result<MessageKind, Box<Message>> {
    if let Some(contacts) = message.contacts {
        return Ok(MessageKind::Contacts(contacts));
    }
    if let Some(location) = message.location {
        return Ok(MessageKind::Location(location));
    }
    if let Some(identity) = message.identity {
        return Ok(MessageKind::Identity(identity));
    }
    Err(Box::new(message))
}

fn missing(message: Message) -> UnroutableMessage {
    UnroutableMessage {
        reason: UnroutableReason::MissingPayload,
        message: Box::new(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(v: serde_json::Value) -> Message {
        let mut base = json!({"from": "16505551234", "id": "wamid.1", "timestamp": "1700000000"});
        base.as_object_mut()
            .unwrap()
            .extend(v.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    fn tag_of(v: serde_json::Value) -> MessageTag {
        classify(message(v)).unwrap().1.tag()
    }

    #[test]
    fn referral_beats_context() {
        let tag = tag_of(json!({
            "type": "text",
            "text": {"body": "hello"},
            "referral": {"source_type": "ad", "source_id": "1", "source_url": "https://fb.me/x"},
            "context": {"from": "15550783881", "id": "wamid.0"}
        }));
        assert_eq!(tag, MessageTag::Referral);
    }

    #[test]
    fn context_makes_a_product_enquiry() {
        let (_, kind) = classify(message(json!({
            "type": "text",
            "text": {"body": "price?"},
            "context": {
                "from": "15550783881",
                "id": "wamid.0",
                "referred_product": {"catalog_id": "C", "product_retailer_id": "P"}
            }
        })))
        .unwrap();

        let MessageKind::ProductEnquiry(enquiry) = kind else {
            panic!("expected product enquiry");
        };
        assert_eq!(enquiry.product().unwrap().product_retailer_id, "P");
    }

    #[test]
    fn empty_referral_is_plain_text() {
        let tag = tag_of(json!({"type": "text", "text": {"body": "hi"}, "referral": {}}));
        assert_eq!(tag, MessageTag::Text);
    }

    #[test]
    fn interactive_subtypes() {
        let tag = tag_of(json!({
            "type": "interactive",
            "interactive": {"type": "list_reply", "list_reply": {"id": "row1", "title": "Row"}}
        }));
        assert_eq!(tag, MessageTag::ListReply);

        let tag = tag_of(json!({
            "type": "interactive",
            "interactive": {"type": "nfm_reply", "nfm_reply": {"response_json": "{}"}}
        }));
        assert_eq!(tag, MessageTag::FlowReply);

        let tag = tag_of(json!({
            "type": "interactive",
            "interactive": {"type": "call_permission_reply"}
        }));
        assert_eq!(tag, MessageTag::Interactive);
    }

    #[test]
    fn media_forwards_its_payload() {
        let (_, kind) = classify(message(json!({
            "type": "image",
            "image": {"id": "media-1", "mime_type": "image/jpeg", "caption": "look"}
        })))
        .unwrap();
        assert!(matches!(kind, MessageKind::Image(m) if m.id == "media-1"));
    }

    #[test]
    fn unrecognized_tag_falls_back_on_fields() {
        let tag = tag_of(json!({
            "type": "vcard",
            "location": {"latitude": 1.0, "longitude": 2.0},
            "identity": {"acknowledged": true, "hash": "h"}
        }));
        assert_eq!(tag, MessageTag::Location);

        let tag = tag_of(json!({
            "type": "",
            "identity": {"acknowledged": true, "created_timestamp": "1700000000", "hash": "h"}
        }));
        assert_eq!(tag, MessageTag::Identity);
    }

    #[test]
    fn unroutable_keeps_the_message() {
        let err = classify(message(json!({"type": "hologram"}))).unwrap_err();
        assert_eq!(err.reason, UnroutableReason::UnrecognizedType);
        assert_eq!(err.message.kind, "hologram");

        let err = classify(message(json!({"type": "image"}))).unwrap_err();
        assert_eq!(err.reason, UnroutableReason::MissingPayload);
    }

    #[test]
    fn unknown_type_carries_errors() {
        let (_, kind) = classify(message(json!({
            "type": "unknown",
            "errors": [{"code": 131051, "details": "Message type is not currently supported", "title": "Unsupported message type"}]
        })))
        .unwrap();
        assert!(matches!(kind, MessageKind::Unknown(errors) if errors[0].code == 131051));
    }
}
