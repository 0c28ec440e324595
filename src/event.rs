//! Non-message Change Events
//!
//! Besides inbound messages and statuses, a WhatsApp Business Account can be
//! notified about account alerts and reviews, bans and partner additions,
//! template reviews, phone-number name/quality changes, flows, calls and
//! groups. Each arrives as a [`Change`](crate::notification::Change) with its
//! own [`SubscriptionField`] and a handful of populated [`Value`] fields.
//!
//! [`ChangeEvent::classify`] projects a `(field, value)` pair onto the typed
//! payloads in this module. Calls and groups may batch several items into one
//! change; they are classified into one event per item.

use serde::{Deserialize, Serialize};

use crate::{
    notification::{FlowEndpointError, SubscriptionField, Value, ValueError, WabaInfo},
    Timestamp,
};

/// A classified non-message change.
#[derive(PartialEq, Clone, Debug)]
#[non_exhaustive]
pub enum ChangeEvent {
    AccountAlert(AccountAlert),
    AccountReview(AccountReview),
    AccountUpdate(AccountUpdate),
    BusinessCapability(BusinessCapability),
    PhoneNumberName(PhoneNumberName),
    PhoneNumberQuality(PhoneNumberQuality),
    TemplateStatus(TemplateStatus),
    TemplateQuality(TemplateQuality),
    TemplateCategory(TemplateCategory),
    TemplateComponents(TemplateComponents),
    Security(SecurityEvent),
    FlowStatusChange(FlowStatusChange),
    FlowAlert(FlowAlert),
    Calls(Vec<CallEvent>),
    Groups(Vec<GroupEvent>),
}

impl ChangeEvent {
    /// Classifies a non-message change.
    ///
    /// Known fields map directly. For [`SubscriptionField::Other`] the family
    /// is guessed from which value fields are present. Returns `None` when
    /// nothing recognizable is set.
    ///
    /// # Example
    /// ```rust
    /// use whatsapp_webhook_rs::{
    ///     event::ChangeEvent,
    ///     notification::{SubscriptionField, Value},
    /// };
    ///
    /// let value: Value = serde_json::from_value(serde_json::json!({
    ///     "event": "APPROVED",
    ///     "message_template_id": 594425479261596_i64,
    ///     "message_template_name": "order_confirmation",
    ///     "message_template_language": "en_US",
    ///     "reason": "NONE"
    /// })).unwrap();
    ///
    /// let event = ChangeEvent::classify(&SubscriptionField::MessageTemplateStatusUpdate, &value);
    /// assert!(matches!(event, Some(ChangeEvent::TemplateStatus(s)) if s.event == "APPROVED"));
    /// ```
    pub fn classify(field: &SubscriptionField, value: &Value) -> Option<ChangeEvent> {
        let event = match field {
            SubscriptionField::AccountAlerts => ChangeEvent::AccountAlert(AccountAlert::from(value)),
            SubscriptionField::AccountReviewUpdate => {
                ChangeEvent::AccountReview(AccountReview::from(value))
            }
            SubscriptionField::AccountUpdate => ChangeEvent::AccountUpdate(AccountUpdate::from(value)),
            SubscriptionField::BusinessCapabilityUpdate => {
                ChangeEvent::BusinessCapability(BusinessCapability::from(value))
            }
            SubscriptionField::PhoneNumberNameUpdate => {
                ChangeEvent::PhoneNumberName(PhoneNumberName::from(value))
            }
            SubscriptionField::PhoneNumberQualityUpdate => {
                ChangeEvent::PhoneNumberQuality(PhoneNumberQuality::from(value))
            }
            SubscriptionField::MessageTemplateStatusUpdate => {
                ChangeEvent::TemplateStatus(TemplateStatus::from(value))
            }
            SubscriptionField::MessageTemplateQualityUpdate => {
                ChangeEvent::TemplateQuality(TemplateQuality::from(value))
            }
            SubscriptionField::TemplateCategoryUpdate => {
                ChangeEvent::TemplateCategory(TemplateCategory::from(value))
            }
            SubscriptionField::MessageTemplateComponentsUpdate => {
                ChangeEvent::TemplateComponents(TemplateComponents::from(value))
            }
            SubscriptionField::Security => ChangeEvent::Security(SecurityEvent::from(value)),
            SubscriptionField::Flows => Self::flow(value),
            SubscriptionField::Calls => {
                ChangeEvent::Calls(value.calls.iter().map(CallEvent::from).collect())
            }
            field if field.is_group() => {
                ChangeEvent::Groups(value.groups.iter().map(GroupEvent::from).collect())
            }
            _ => return Self::guess(value),
        };
        Some(event)
    }

    fn flow(value: &Value) -> ChangeEvent {
        if value.event.as_deref() == Some("FLOW_STATUS_CHANGE") {
            ChangeEvent::FlowStatusChange(FlowStatusChange::from(value))
        } else {
            ChangeEvent::FlowAlert(FlowAlert::from(value))
        }
    }

    fn guess(value: &Value) -> Option<ChangeEvent> {
        let event = if !value.calls.is_empty() {
            ChangeEvent::Calls(value.calls.iter().map(CallEvent::from).collect())
        } else if !value.groups.is_empty() {
            ChangeEvent::Groups(value.groups.iter().map(GroupEvent::from).collect())
        } else if value.flow_id.is_some() {
            Self::flow(value)
        } else if value.message_template_id.is_some() || value.message_template_name.is_some() {
            if value.new_quality_score.is_some() {
                ChangeEvent::TemplateQuality(TemplateQuality::from(value))
            } else if value.new_category.is_some() {
                ChangeEvent::TemplateCategory(TemplateCategory::from(value))
            } else if value.message_template_element.is_some() {
                ChangeEvent::TemplateComponents(TemplateComponents::from(value))
            } else {
                ChangeEvent::TemplateStatus(TemplateStatus::from(value))
            }
        } else if value.requested_verified_name.is_some() {
            ChangeEvent::PhoneNumberName(PhoneNumberName::from(value))
        } else if value.current_limit.is_some() {
            ChangeEvent::PhoneNumberQuality(PhoneNumberQuality::from(value))
        } else if value.max_daily_conversation_per_phone.is_some()
            || value.max_phone_numbers_per_business.is_some()
            || value.max_phone_numbers_per_waba.is_some()
        {
            ChangeEvent::BusinessCapability(BusinessCapability::from(value))
        } else if value.alert_info.is_some() {
            ChangeEvent::AccountAlert(AccountAlert::from(value))
        } else if value.decision.is_some() {
            ChangeEvent::AccountReview(AccountReview::from(value))
        } else if value.waba_info.is_some()
            || value.ban_info.is_some()
            || value.violation_info.is_some()
            || value.lock_info.is_some()
            || value.restriction_info.is_some()
        {
            ChangeEvent::AccountUpdate(AccountUpdate::from(value))
        } else {
            return None;
        };
        Some(event)
    }
}

fn text(field: &Option<String>) -> String {
    field.clone().unwrap_or_default()
}

/// An alert about the business account (`account_alerts`).
#[derive(PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct AccountAlert {
    pub entity_type: String,
    pub entity_id: String,
    pub alert_info: Option<serde_json::Value>,
}

impl From<&Value> for AccountAlert {
    fn from(value: &Value) -> Self {
        Self {
            entity_type: text(&value.entity_type),
            entity_id: text(&value.entity_id),
            alert_info: value.alert_info.clone(),
        }
    }
}

/// Result of a business account review (`account_review_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct AccountReview {
    /// `APPROVED`, `REJECTED`, `PENDING`, `DEFERRED`.
    pub decision: String,
}

impl From<&Value> for AccountReview {
    fn from(value: &Value) -> Self {
        Self {
            decision: text(&value.decision),
        }
    }
}

/// A change to the business account (`account_update`): bans, violations,
/// verification, partner additions.
#[derive(PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct AccountUpdate {
    /// `PARTNER_ADDED`, `DISABLED_UPDATE`, `ACCOUNT_VIOLATION`, `ACCOUNT_RESTRICTION`, ...
    pub event: String,
    pub phone_number: Option<String>,
    pub ban_info: Option<serde_json::Value>,
    pub violation_info: Option<serde_json::Value>,
    pub lock_info: Option<serde_json::Value>,
    pub restriction_info: Vec<serde_json::Value>,
    pub waba_info: Option<WabaInfo>,
}

impl AccountUpdate {
    /// Returns the partner info if a partner was added to the account.
    pub fn partner_added(&self) -> Option<&WabaInfo> {
        if self.event == "PARTNER_ADDED" {
            self.waba_info.as_ref()
        } else {
            None
        }
    }
}

impl From<&Value> for AccountUpdate {
    fn from(value: &Value) -> Self {
        Self {
            event: text(&value.event),
            phone_number: value.phone_number.clone(),
            ban_info: value.ban_info.clone(),
            violation_info: value.violation_info.clone(),
            lock_info: value.lock_info.clone(),
            restriction_info: value.restriction_info.clone().unwrap_or_default(),
            waba_info: value.waba_info.clone(),
        }
    }
}

/// New messaging limits (`business_capability_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct BusinessCapability {
    pub max_daily_conversation_per_phone: Option<i64>,
    pub max_phone_numbers_per_business: Option<i64>,
    pub max_phone_numbers_per_waba: Option<i64>,
}

impl From<&Value> for BusinessCapability {
    fn from(value: &Value) -> Self {
        Self {
            max_daily_conversation_per_phone: value.max_daily_conversation_per_phone,
            max_phone_numbers_per_business: value.max_phone_numbers_per_business,
            max_phone_numbers_per_waba: value.max_phone_numbers_per_waba,
        }
    }
}

/// Review of a requested display name (`phone_number_name_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct PhoneNumberName {
    pub display_phone_number: String,
    pub decision: String,
    pub requested_verified_name: String,
    pub rejection_reason: Option<String>,
}

impl From<&Value> for PhoneNumberName {
    fn from(value: &Value) -> Self {
        Self {
            display_phone_number: text(&value.display_phone_number),
            decision: text(&value.decision),
            requested_verified_name: text(&value.requested_verified_name),
            rejection_reason: value.rejection_reason.clone(),
        }
    }
}

/// Quality rating or messaging-tier change (`phone_number_quality_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct PhoneNumberQuality {
    pub display_phone_number: String,
    /// `FLAGGED`, `UNFLAGGED`, `UPGRADE`, `DOWNGRADE`, ...
    pub event: String,
    /// `TIER_50`, `TIER_250`, `TIER_1K`, ...
    pub current_limit: String,
}

impl From<&Value> for PhoneNumberQuality {
    fn from(value: &Value) -> Self {
        Self {
            display_phone_number: text(&value.display_phone_number),
            event: text(&value.event),
            current_limit: text(&value.current_limit),
        }
    }
}

/// A template review outcome (`message_template_status_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct TemplateStatus {
    /// `APPROVED`, `REJECTED`, `PAUSED`, `DISABLED`, ...
    pub event: String,
    pub id: Option<i64>,
    pub name: String,
    pub language: String,
    pub reason: Option<String>,
}

impl From<&Value> for TemplateStatus {
    fn from(value: &Value) -> Self {
        Self {
            event: text(&value.event),
            id: value.message_template_id,
            name: text(&value.message_template_name),
            language: text(&value.message_template_language),
            reason: value.reason.clone(),
        }
    }
}

/// A template quality score change (`message_template_quality_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct TemplateQuality {
    pub id: Option<i64>,
    pub name: String,
    pub language: String,
    pub previous_quality_score: String,
    pub new_quality_score: String,
}

impl From<&Value> for TemplateQuality {
    fn from(value: &Value) -> Self {
        Self {
            id: value.message_template_id,
            name: text(&value.message_template_name),
            language: text(&value.message_template_language),
            previous_quality_score: text(&value.previous_quality_score),
            new_quality_score: text(&value.new_quality_score),
        }
    }
}

/// A template recategorization (`template_category_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct TemplateCategory {
    pub id: Option<i64>,
    pub name: String,
    pub language: String,
    pub previous_category: String,
    pub new_category: String,
}

impl From<&Value> for TemplateCategory {
    fn from(value: &Value) -> Self {
        Self {
            id: value.message_template_id,
            name: text(&value.message_template_name),
            language: text(&value.message_template_language),
            previous_category: text(&value.previous_category),
            new_category: text(&value.new_category),
        }
    }
}

/// Edited template components (`message_template_components_update`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct TemplateComponents {
    pub id: Option<i64>,
    pub name: String,
    pub language: String,
    pub element: Option<String>,
    pub title: Option<String>,
    pub footer: Option<String>,
}

impl From<&Value> for TemplateComponents {
    fn from(value: &Value) -> Self {
        Self {
            id: value.message_template_id,
            name: text(&value.message_template_name),
            language: text(&value.message_template_language),
            element: value.message_template_element.clone(),
            title: value.message_template_title.clone(),
            footer: value.message_template_footer.clone(),
        }
    }
}

/// A phone-number security setting changed (`security`), e.g. two-step PIN reset.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct SecurityEvent {
    pub display_phone_number: String,
    /// `PIN_CHANGED`, `PIN_RESET_REQUEST`, ...
    pub event: String,
    pub requester: Option<String>,
}

impl From<&Value> for SecurityEvent {
    fn from(value: &Value) -> Self {
        Self {
            display_phone_number: text(&value.display_phone_number),
            event: text(&value.event),
            requester: value.entity_id.clone(),
        }
    }
}

/// A flow moved between lifecycle states (`flows`, event `FLOW_STATUS_CHANGE`).
#[derive(PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct FlowStatusChange {
    pub flow_id: String,
    pub message: Option<String>,
    pub old_status: Option<String>,
    pub new_status: String,
}

impl From<&Value> for FlowStatusChange {
    fn from(value: &Value) -> Self {
        Self {
            flow_id: text(&value.flow_id),
            message: value.message.clone(),
            old_status: value.old_status.clone(),
            new_status: text(&value.new_status),
        }
    }
}

/// A flow endpoint health alert (`flows`): error rate, latency or availability.
#[derive(PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct FlowAlert {
    pub flow_id: String,
    /// `ENDPOINT_ERROR_RATE`, `ENDPOINT_LATENCY`, `ENDPOINT_AVAILABILITY`,
    /// `CLIENT_ERROR_RATE`, ...
    pub event: String,
    pub message: Option<String>,
    /// `ACTIVATED` or `DEACTIVATED`.
    pub alert_state: Option<String>,
    pub threshold: Option<f64>,
    pub error_rate: Option<f64>,
    pub p50_latency: Option<f64>,
    pub p90_latency: Option<f64>,
    pub requests_count: Option<i64>,
    pub availability: Option<f64>,
    pub errors: Vec<FlowEndpointError>,
}

impl From<&Value> for FlowAlert {
    fn from(value: &Value) -> Self {
        Self {
            flow_id: text(&value.flow_id),
            event: text(&value.event),
            message: value.message.clone(),
            alert_state: value.alert_state.clone(),
            threshold: value.threshold,
            error_rate: value.error_rate,
            p50_latency: value.p50_latency,
            p90_latency: value.p90_latency,
            requests_count: value.requests_count,
            availability: value.availability,
            errors: value
                .errors
                .iter()
                .filter_map(|e| match e {
                    ValueError::FlowEndpoint(e) => Some(e.clone()),
                    ValueError::Platform(_) => None,
                })
                .collect(),
        }
    }
}

/// One item of a `calls` change: a call was connected, terminated, ...
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct CallEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// `connect`, `terminate`, ...
    #[serde(default)]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// `USER_INITIATED` or `BUSINESS_INITIATED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<CallSession>,
}

/// WebRTC session description sent with a call `connect`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct CallSession {
    pub sdp_type: String,
    pub sdp: String,
}

impl From<&serde_json::Value> for CallEvent {
    fn from(item: &serde_json::Value) -> Self {
        // Items that do not fit the shape still produce an event with whatever could be read.
        CallEvent::deserialize(item).unwrap_or_else(|_| CallEvent {
            id: string_at(item, "id"),
            event: string_at(item, "event"),
            ..Default::default()
        })
    }
}

/// One item of a group change: lifecycle, participants, settings or status.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct GroupEvent {
    #[serde(default)]
    pub group_id: String,
    /// `group_create`, `group_participants_add`, `group_suspend`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Everything else the item carries (participants, subject, errors, ...).
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl From<&serde_json::Value> for GroupEvent {
    fn from(item: &serde_json::Value) -> Self {
        GroupEvent::deserialize(item).unwrap_or_else(|_| GroupEvent {
            group_id: string_at(item, "group_id"),
            kind: string_at(item, "type"),
            ..Default::default()
        })
    }
}

fn string_at(item: &serde_json::Value, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(v: serde_json::Value) -> Value {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn partner_added_is_an_account_update() {
        let value = value(json!({
            "event": "PARTNER_ADDED",
            "waba_info": {"waba_id": "495709166956424", "owner_business_id": "184662338073178"}
        }));

        let Some(ChangeEvent::AccountUpdate(update)) =
            ChangeEvent::classify(&SubscriptionField::AccountUpdate, &value)
        else {
            panic!("expected account update");
        };
        assert_eq!(update.partner_added().unwrap().waba_id, "495709166956424");
    }

    #[test]
    fn flows_split_by_event() {
        let status = value(json!({
            "event": "FLOW_STATUS_CHANGE",
            "flow_id": "1234",
            "old_status": "DRAFT",
            "new_status": "PUBLISHED"
        }));
        assert!(matches!(
            ChangeEvent::classify(&SubscriptionField::Flows, &status),
            Some(ChangeEvent::FlowStatusChange(c)) if c.new_status == "PUBLISHED"
        ));

        let alert = value(json!({
            "event": "ENDPOINT_ERROR_RATE",
            "flow_id": "1234",
            "alert_state": "ACTIVATED",
            "error_rate": 0.5,
            "threshold": 0.1,
            "errors": [{"error_type": "TIMEOUT_ERROR", "error_rate": 0.5, "error_count": 5}]
        }));
        let Some(ChangeEvent::FlowAlert(alert)) =
            ChangeEvent::classify(&SubscriptionField::Flows, &alert)
        else {
            panic!("expected flow alert");
        };
        assert_eq!(alert.errors.len(), 1);
        assert_eq!(alert.error_rate, Some(0.5));
    }

    #[test]
    fn calls_yield_one_event_per_item() {
        let value = value(json!({
            "messaging_product": "whatsapp",
            "calls": [
                {"id": "wacid.1", "from": "1", "to": "2", "event": "connect", "timestamp": "1671644824",
                 "session": {"sdp_type": "offer", "sdp": "v=0"}},
                {"id": "wacid.2", "from": "1", "to": "2", "event": "terminate", "duration": 40}
            ]
        }));
        let Some(ChangeEvent::Calls(calls)) =
            ChangeEvent::classify(&SubscriptionField::Calls, &value)
        else {
            panic!("expected calls");
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].session.as_ref().unwrap().sdp_type, "offer");
        assert_eq!(calls[1].duration, Some(40));
    }

    #[test]
    fn groups_keep_extra_details() {
        let value = value(json!({
            "groups": [{"group_id": "G1", "type": "group_participants_add", "added_participants": [{"wa_id": "1"}]}]
        }));
        let Some(ChangeEvent::Groups(groups)) =
            ChangeEvent::classify(&SubscriptionField::GroupParticipantsUpdate, &value)
        else {
            panic!("expected groups");
        };
        assert_eq!(groups[0].kind, "group_participants_add");
        assert!(groups[0].details.contains_key("added_participants"));
    }

    #[test]
    fn unknown_field_falls_back_to_presence() {
        let quality = value(json!({
            "display_phone_number": "15550783881",
            "event": "UPGRADE",
            "current_limit": "TIER_10K"
        }));
        let field = SubscriptionField::Other("phone_number_quality".into());
        assert!(matches!(
            ChangeEvent::classify(&field, &quality),
            Some(ChangeEvent::PhoneNumberQuality(q)) if q.current_limit == "TIER_10K"
        ));

        assert_eq!(ChangeEvent::classify(&field, &Value::default()), None);
    }
}
