//! Inbound WhatsApp Message Types
//!
//! This module defines the messages a user can send to your business, as they
//! appear in the `messages` array of a webhook notification.
//!
//! ## Key Types
//!
//! - [`Message`]: the raw wire message. Its `type` tag says which of the
//!   optional payload fields is populated.
//! - [`MessageInfo`]: the envelope part of a message (sender, id, timestamp,
//!   reply context) handed to every message handler alongside its payload.
//! - Payloads: [`Text`], [`MediaInfo`] (audio, image, video, document and
//!   sticker all share it), [`Location`], [`ContactCard`], [`Reaction`],
//!   [`Button`], [`Order`], [`System`], [`Interactive`] and [`Identity`].
//! - [`Context`] and [`Referral`]: the reply and ad-click metadata that turn a
//!   text message into a product enquiry or a referral.
//!
//! Use [`classify`](crate::discriminator::classify) to turn a [`Message`] into
//! exactly one [`MessageKind`](crate::discriminator::MessageKind).

use serde::{Deserialize, Serialize};

use crate::{
    notification::{deserialize_str, deserialize_str_opt, Contact},
    MetaError, Timestamp,
};

/// A message received from a WhatsApp user.
///
/// Exactly one payload field is expected to be populated, matching
/// [`kind`](Self::kind). Payload fields that are absent on the wire are `None`.
///
/// # Example
/// ```rust
/// use whatsapp_webhook_rs::Message;
///
/// let message: Message = serde_json::from_str(r#"{
///     "from": "16315551234",
///     "id": "wamid.ID",
///     "timestamp": "1603069091",
///     "type": "text",
///     "text": { "body": "hi" }
/// }"#).unwrap();
///
/// assert_eq!(message.text.unwrap().body, "hi");
/// ```
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Message {
    /// The customer's WhatsApp ID.
    pub from: String,

    /// The message ID. Use it to mark the message as read or to reply to it.
    pub id: String,

    /// When the customer sent the message.
    #[serde(default)]
    pub timestamp: Timestamp,

    /// The raw type tag (`text`, `image`, `interactive`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Present when the message quotes another message or enquires about a product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,

    /// Present when the customer arrived through a Click to WhatsApp ad or post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral: Option<Referral>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<MediaInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<ContactCard>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<Button>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<System>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<Interactive>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,

    /// Set on messages of type `unknown`, describing why WhatsApp could not
    /// deliver the content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<MetaError>,
}

impl Message {
    /// The type tag as sent by WhatsApp.
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns `true` if the message quotes another message.
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.context.is_some()
    }

    /// Splits off the envelope part handed to specific handlers.
    pub(crate) fn info(&self) -> MessageInfo {
        MessageInfo {
            id: self.id.clone(),
            from: self.from.clone(),
            timestamp: self.timestamp,
            context: self.context.clone(),
            sender: None,
        }
    }
}

/// The envelope of an inbound message, without its payload.
///
/// Every message handler receives this next to the payload its slot is typed for.
#[derive(PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct MessageInfo {
    /// The message ID.
    pub id: String,

    /// The customer's WhatsApp ID.
    pub from: String,

    /// When the customer sent the message.
    pub timestamp: Timestamp,

    /// Reply/product context, if any.
    pub context: Option<Context>,

    /// The sender's profile from the `contacts` array of the same change, if sent.
    pub sender: Option<Contact>,
}

impl MessageInfo {
    /// The sender's profile name, if WhatsApp included it.
    pub fn sender_name(&self) -> Option<&str> {
        self.sender.as_ref().map(|c| c.profile.name.as_str())
    }
}

/// Message context information.
///
/// Contains metadata about a message's relationship to other messages,
/// such as whether it's a reply, a forwarded message, or refers to a product.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Context {
    /// The WhatsApp ID of the sender of the quoted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// The ID of the quoted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Indicates if the message was forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded: Option<bool>,

    /// Indicates if the message was forwarded more than five times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequently_forwarded: Option<bool>,

    /// The product the customer is enquiring about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_product: Option<ReferredProduct>,
}

/// A product referenced from a message context.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ReferredProduct {
    pub catalog_id: String,
    pub product_retailer_id: String,
}

/// Click to WhatsApp ad or post metadata.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Referral {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// `ad` or `post`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// `image` or `video`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Click ID, used for conversion tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctwa_clid: Option<String>,
}

impl Referral {
    /// A referral with no populated field carries no information.
    ///
    /// WhatsApp occasionally sends `"referral": {}`; such a message is still a
    /// plain text (or product enquiry) message.
    pub fn is_empty(&self) -> bool {
        self == &Referral::default()
    }
}

/// A plain text payload.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Text {
    pub body: String,
}

impl Text {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Media metadata shared by audio, image, video, document and sticker messages.
///
/// The media itself must be downloaded separately using [`id`](Self::id).
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct MediaInfo {
    /// Media ID.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Images, videos and documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Documents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Stickers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,

    /// Audio only; `true` for voice notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<bool>,
}

/// Geographical location shared by the user.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A contact card shared by the user.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ContactCard {
    #[serde(default)]
    pub name: ContactName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<ContactPhone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<ContactEmail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<ContactUrl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<ContactAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<ContactOrg>,
    /// `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ContactName {
    #[serde(default)]
    pub formatted_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ContactPhone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ContactEmail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ContactUrl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ContactAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ContactOrg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// An emoji reaction to a message. An empty `emoji` means the reaction was removed.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Reaction {
    pub message_id: String,
    #[serde(default)]
    pub emoji: String,
}

impl Reaction {
    /// Returns `true` if the user removed a previous reaction.
    pub fn is_removal(&self) -> bool {
        self.emoji.is_empty()
    }
}

/// A tap on a template quick-reply button.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Button {
    /// Developer-defined payload of the button.
    #[serde(default)]
    pub payload: String,
    /// Button label.
    #[serde(default)]
    pub text: String,
}

/// Product order message
///
/// Represents an order placed through WhatsApp
#[doc(alias = "Cart")]
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Order {
    pub catalog_id: String,
    /// Note sent along with the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub product_items: Vec<OrderProduct>,
}

/// A single product item within an [`Order`].
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct OrderProduct {
    pub product_retailer_id: String,
    #[serde(deserialize_with = "deserialize_str::<u64, __D>")]
    pub quantity: u64,
    #[serde(deserialize_with = "deserialize_str::<f64, __D>")]
    pub item_price: f64,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl Order {
    /// Sum of `quantity * item_price` over all products.
    pub fn total(&self) -> f64 {
        self.product_items
            .iter()
            .map(|p| p.quantity as f64 * p.item_price)
            .sum()
    }
}

/// A system notification, e.g. the user changed their number.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct System {
    #[serde(default)]
    pub body: String,
    /// `user_changed_number`, `customer_identity_changed`, ...
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_wa_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

/// A reply to an interactive message.
///
/// `kind` selects which of the reply fields is populated.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Interactive {
    /// `button_reply`, `list_reply` or `nfm_reply`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<ButtonReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_reply: Option<ListReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfm_reply: Option<FlowReply>,
}

/// The reply button the user tapped.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ButtonReply {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// The list row the user selected.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ListReply {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The response of a completed WhatsApp Flow (`nfm_reply`).
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct FlowReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// JSON string with the flow token and the submitted form values.
    #[serde(default)]
    pub response_json: String,
}

impl FlowReply {
    /// Parses [`response_json`](Self::response_json).
    pub fn response(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.response_json)
    }
}

/// A change in the user's identity key (security code).
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Identity {
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default, deserialize_with = "deserialize_str_opt::<i64, __D>")]
    pub created_timestamp: Option<i64>,
    #[serde(default)]
    pub hash: String,
}

/// A text message that arrived through a Click to WhatsApp ad or post.
#[derive(PartialEq, Clone, Debug)]
#[non_exhaustive]
pub struct ReferralMessage {
    pub text: Text,
    pub referral: Referral,
}

/// A text message sent as a reply to a product or another message.
#[derive(PartialEq, Clone, Debug)]
#[non_exhaustive]
pub struct ProductEnquiry {
    pub text: Text,
    pub context: Context,
}

impl ProductEnquiry {
    /// The product being asked about, if the context names one.
    pub fn product(&self) -> Option<&ReferredProduct> {
        self.context.referred_product.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_accepts_string_and_number_amounts() {
        let order: Order = serde_json::from_value(json!({
            "catalog_id": "the-catalog_id",
            "text": "text-message-sent-along-with-the-order",
            "product_items": [
                {"product_retailer_id": "a", "quantity": 2, "item_price": 10.5, "currency": "USD"},
                {"product_retailer_id": "b", "quantity": "1", "item_price": "4", "currency": "USD"}
            ]
        }))
        .unwrap();

        assert_eq!(order.product_items[1].quantity, 1);
        assert_eq!(order.total(), 25.0);
    }

    #[test]
    fn empty_referral_is_empty() {
        let referral: Referral = serde_json::from_value(json!({})).unwrap();
        assert!(referral.is_empty());

        let referral: Referral =
            serde_json::from_value(json!({"source_type": "ad", "source_id": "1"})).unwrap();
        assert!(!referral.is_empty());
    }

    #[test]
    fn flow_reply_parses_response_json() {
        let reply = FlowReply {
            name: Some("flow".into()),
            body: Some("Sent".into()),
            response_json: r#"{"flow_token": "T", "optional_param1": "v"}"#.into(),
        };
        assert_eq!(reply.response().unwrap()["flow_token"], "T");
    }

    #[test]
    fn reaction_removal() {
        let reaction: Reaction =
            serde_json::from_value(json!({"message_id": "wamid.X"})).unwrap();
        assert!(reaction.is_removal());
    }
}
