//! Webhook Notification Envelope
//!
//! Every webhook Meta sends for a WhatsApp Business Account has the same
//! shape, whatever actually happened:
//!
//! ```json
//! {
//!   "object": "whatsapp_business_account",
//!   "entry": [{
//!     "id": "<WHATSAPP_BUSINESS_ACCOUNT_ID>",
//!     "changes": [{ "field": "messages", "value": { ... } }]
//!   }]
//! }
//! ```
//!
//! The `value` object is a flat bag of optional fields; which of them are set
//! depends on `field` (messages and statuses for `messages`, template fields
//! for `message_template_status_update`, and so on). [`Value`] mirrors that
//! bag. The dispatcher and [`ChangeEvent::classify`] turn it into typed events.
//!
//! [`ChangeEvent::classify`]: crate::event::ChangeEvent::classify

use std::{borrow::Cow, fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::{DecodeError, Error},
    message::Message,
    MetaError, Timestamp,
};

/// The `object` value of WhatsApp Business Account notifications.
pub const WHATSAPP_BUSINESS_ACCOUNT: &str = "whatsapp_business_account";

/// Decodes a raw webhook body.
///
/// Unknown fields are ignored. Malformed JSON yields [`Error::Decode`] and no
/// partial result.
///
/// # Example
/// ```rust
/// use whatsapp_webhook_rs::notification;
///
/// let notification = notification::decode(br#"{
///     "object": "whatsapp_business_account",
///     "entry": []
/// }"#).unwrap();
///
/// assert!(notification.is_whatsapp_business_account());
/// assert!(notification.entries.is_empty());
///
/// assert!(notification::decode(b"{not json").is_err());
/// ```
pub fn decode(raw: &[u8]) -> Result<Notification, Error> {
    serde_json::from_slice(raw).map_err(|err| DecodeError::new(err, raw).into())
}

/// The top-level webhook payload.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Notification {
    /// The webhook object. Always `whatsapp_business_account` for WhatsApp.
    pub object: String,

    /// Changes, grouped by the business account they belong to.
    ///
    /// Multiple changes of the same type may be batched together.
    #[serde(rename = "entry", default)]
    pub entries: Vec<Entry>,
}

impl Notification {
    /// Creates a WhatsApp Business Account notification with the given entries.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            object: WHATSAPP_BUSINESS_ACCOUNT.to_owned(),
            entries,
        }
    }

    /// Returns `true` if this notification is about a WhatsApp Business Account.
    #[inline]
    pub fn is_whatsapp_business_account(&self) -> bool {
        self.object == WHATSAPP_BUSINESS_ACCOUNT
    }
}

/// One business account's batch of changes.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Entry {
    /// The WhatsApp Business Account ID (or business portfolio ID).
    pub id: String,

    /// When the notification was sent; not when the change happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,

    #[serde(default)]
    pub changes: Vec<Change>,
}

impl Entry {
    pub fn new(id: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            id: id.into(),
            time: None,
            changes,
        }
    }
}

/// A single change: the subscribed field and the value it carries.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[non_exhaustive]
pub struct Change {
    pub field: SubscriptionField,
    #[serde(default)]
    pub value: Value,
}

impl Change {
    pub fn new(field: SubscriptionField, value: Value) -> Self {
        Self { field, value }
    }
}

/// The webhook fields a WhatsApp Business Account app can subscribe to.
///
/// Fields this crate does not know about are preserved in
/// [`Other`](Self::Other) rather than failing the whole notification.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Debug)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SubscriptionField {
    AccountAlerts,
    AccountReviewUpdate,
    AccountUpdate,
    BusinessCapabilityUpdate,
    MessageTemplateComponentsUpdate,
    MessageTemplateQualityUpdate,
    MessageTemplateStatusUpdate,
    Messages,
    PhoneNumberNameUpdate,
    PhoneNumberQualityUpdate,
    Security,
    TemplateCategoryUpdate,
    Flows,
    Calls,
    GroupLifecycleUpdate,
    GroupParticipantsUpdate,
    GroupSettingsUpdate,
    GroupStatusUpdate,
    #[serde(untagged)]
    Other(String),
}

impl SubscriptionField {
    /// The wire name of the field.
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionField::AccountAlerts => "account_alerts",
            SubscriptionField::AccountReviewUpdate => "account_review_update",
            SubscriptionField::AccountUpdate => "account_update",
            SubscriptionField::BusinessCapabilityUpdate => "business_capability_update",
            SubscriptionField::MessageTemplateComponentsUpdate => {
                "message_template_components_update"
            }
            SubscriptionField::MessageTemplateQualityUpdate => "message_template_quality_update",
            SubscriptionField::MessageTemplateStatusUpdate => "message_template_status_update",
            SubscriptionField::Messages => "messages",
            SubscriptionField::PhoneNumberNameUpdate => "phone_number_name_update",
            SubscriptionField::PhoneNumberQualityUpdate => "phone_number_quality_update",
            SubscriptionField::Security => "security",
            SubscriptionField::TemplateCategoryUpdate => "template_category_update",
            SubscriptionField::Flows => "flows",
            SubscriptionField::Calls => "calls",
            SubscriptionField::GroupLifecycleUpdate => "group_lifecycle_update",
            SubscriptionField::GroupParticipantsUpdate => "group_participants_update",
            SubscriptionField::GroupSettingsUpdate => "group_settings_update",
            SubscriptionField::GroupStatusUpdate => "group_status_update",
            SubscriptionField::Other(other) => other,
        }
    }

    /// Returns `true` for the group fields.
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            SubscriptionField::GroupLifecycleUpdate
                | SubscriptionField::GroupParticipantsUpdate
                | SubscriptionField::GroupSettingsUpdate
                | SubscriptionField::GroupStatusUpdate
        )
    }
}

impl Display for SubscriptionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `value` object of a [`Change`].
///
/// A flat record: every field is optional and only the ones relevant to the
/// change's [`SubscriptionField`] are populated.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Value {
    // messaging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<Status>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValueError>,

    /// Event tag shared by most non-message families
    /// (`APPROVED`, `FLAGGED`, `PARTNER_ADDED`, `FLOW_STATUS_CHANGE`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    // templates
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_str_opt::<i64, __D>"
    )]
    pub message_template_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_quality_score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_quality_score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template_footer: Option<String>,

    // phone numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_verified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    // business capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_daily_conversation_per_phone: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_phone_numbers_per_business: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_phone_numbers_per_waba: Option<i64>,

    // account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction_info: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waba_info: Option<WabaInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_info: Option<serde_json::Value>,

    // flows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p50_latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p90_latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<f64>,

    // calls and groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<serde_json::Value>,
}

impl Value {
    /// Returns `true` if this value carries anything for the message family
    /// (platform errors, statuses or messages).
    ///
    /// Flow endpoint error rows belong to flow alerts and do not count.
    pub fn has_message_family(&self) -> bool {
        !self.messages.is_empty()
            || !self.statuses.is_empty()
            || self.errors.iter().any(|e| e.as_platform().is_some())
    }

    /// Finds the sender profile for a message, matching on `wa_id` first and
    /// falling back to the contact at the same position.
    pub fn sender_of(&self, index: usize, from: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == from)
            .or_else(|| self.contacts.get(index))
    }
}

/// An item of `value.errors`.
///
/// WhatsApp puts two unrelated shapes in this array: platform errors (which
/// carry a `code`) and, for flow endpoint alerts, per-error-type rate rows.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(untagged)]
#[non_exhaustive]
pub enum ValueError {
    Platform(MetaError),
    FlowEndpoint(FlowEndpointError),
}

impl ValueError {
    /// The platform error, if this is one.
    pub fn as_platform(&self) -> Option<&MetaError> {
        match self {
            ValueError::Platform(err) => Some(err),
            ValueError::FlowEndpoint(_) => None,
        }
    }
}

/// An error-rate row reported in flow endpoint alerts.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct FlowEndpointError {
    pub error_type: String,
    #[serde(default)]
    pub error_rate: f64,
    #[serde(default)]
    pub error_count: i64,
}

/// The business phone number that received the notification.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Metadata {
    pub display_phone_number: String,
    pub phone_number_id: String,
}

/// The customer who sent a message.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Contact {
    /// The customer's WhatsApp ID. May differ from their phone number.
    pub wa_id: String,

    #[serde(default)]
    pub profile: Profile,

    /// Business-scoped user ID, when usernames are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

/// Partner info sent with `account_update` / `PARTNER_ADDED`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct WabaInfo {
    pub waba_id: String,
    #[serde(default)]
    pub owner_business_id: String,
}

/// A delivery status update for a message your business sent.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[non_exhaustive]
pub struct Status {
    /// The ID of the message this status is for.
    pub id: String,

    /// The customer the message was sent to.
    pub recipient_id: String,

    pub status: MessageStatus,

    #[serde(default)]
    pub timestamp: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Conversation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,

    /// Set when [`status`](Self::status) is `failed` (and sometimes `warning`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<MetaError>,

    /// Arbitrary string attached when the message was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_opaque_callback_data: Option<String>,
}

impl Status {
    pub fn is_sent(&self) -> bool {
        self.status == MessageStatus::Sent
    }

    pub fn is_delivered(&self) -> bool {
        self.status == MessageStatus::Delivered
    }

    pub fn is_read(&self) -> bool {
        self.status == MessageStatus::Read
    }

    pub fn failed(&self) -> bool {
        self.status == MessageStatus::Failed
    }
}

/// The delivery state of a sent message.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Debug)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
    Deleted,
    Warning,
    Accepted,
    #[serde(untagged)]
    Other(String),
}

/// The conversation a status belongs to.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ConversationOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<Timestamp>,
}

/// What opened the conversation.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct ConversationOrigin {
    /// `authentication`, `marketing`, `utility`, `service`, `referral_conversion`, ...
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct Pricing {
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub pricing_model: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOr<'a, T> {
    Raw(Cow<'a, str>),
    Tee(T),
}

/// Accepts either `T` or a string that parses into `T`.
pub(crate) fn deserialize_str<'de, T, D: Deserializer<'de>>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    match RawOr::<T>::deserialize(deserializer)? {
        RawOr::Raw(s) => T::from_str(&s)
            .map_err(|err| <D::Error as serde::de::Error>::custom(format!("parsing value: {err}"))),
        RawOr::Tee(n) => Ok(n),
    }
}

pub(crate) fn deserialize_str_opt<'de, T, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<T>, D::Error>
where
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    match Option::<RawOr<T>>::deserialize(deserializer)? {
        Some(RawOr::Raw(s)) => T::from_str(&s).map(Some).map_err(|err| {
            <D::Error as serde::de::Error>::custom(format!("parsing value: {err}"))
        }),
        Some(RawOr::Tee(n)) => Ok(Some(n)),
        None => Ok(None),
    }
}
