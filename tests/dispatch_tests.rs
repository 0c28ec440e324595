mod common;

use std::sync::{Arc, Mutex};

use common::*;
use http::StatusCode;
use serde_json::json;
use whatsapp_webhook_rs::{
    error::{Error, HandlerKind},
    handler::{EventContext, Handler, HandlerResult},
    message::{ButtonReply, Interactive, MessageInfo, ProductEnquiry, ReferralMessage, Text},
    notification::{self, Notification},
    Dispatcher, Handlers,
};

type Log = Arc<Mutex<Vec<String>>>;

/// Records every slot it is called on.
#[derive(Default)]
struct Recorder {
    log: Log,
}

impl Recorder {
    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Handler for Recorder {
    async fn handle_text(&self, ctx: EventContext, message: MessageInfo, text: Text) -> HandlerResult {
        assert_eq!(ctx.business_account_id(), WABA_ID);
        assert_eq!(ctx.phone_number_id(), Some(PHONE_ID));
        self.push(format!("text:{}:{}", message.id, text.body));
        Ok(())
    }

    async fn handle_referral(
        &self,
        _ctx: EventContext,
        message: MessageInfo,
        referral: ReferralMessage,
    ) -> HandlerResult {
        self.push(format!(
            "referral:{}:{}",
            message.id,
            referral.referral.source_id.unwrap_or_default()
        ));
        Ok(())
    }

    async fn handle_product_enquiry(
        &self,
        _ctx: EventContext,
        message: MessageInfo,
        _enquiry: ProductEnquiry,
    ) -> HandlerResult {
        self.push(format!("product_enquiry:{}", message.id));
        Ok(())
    }

    async fn handle_button_reply(
        &self,
        _ctx: EventContext,
        message: MessageInfo,
        reply: ButtonReply,
    ) -> HandlerResult {
        self.push(format!("button_reply:{}:{}", message.id, reply.id));
        Ok(())
    }

    async fn handle_interactive(
        &self,
        _ctx: EventContext,
        message: MessageInfo,
        _interactive: Interactive,
    ) -> HandlerResult {
        self.push(format!("interactive:{}", message.id));
        Ok(())
    }
}

fn decode(payload: serde_json::Value) -> Notification {
    notification::decode(&to_body(&payload)).unwrap()
}

#[tokio::test]
async fn zero_entries_is_ok() {
    let dispatcher = Dispatcher::new(Recorder::default());

    let response = dispatcher
        .handle_notification(decode(notification_with_entries(vec![])))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(dispatcher.handler().calls().is_empty());
}

#[tokio::test]
async fn entry_without_changes_is_ok() {
    let dispatcher = Dispatcher::new(Recorder::default());

    let response = dispatcher
        .handle_notification(decode(notification_with_entries(vec![
            entry(vec![]),
            entry(vec![]),
        ])))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(dispatcher.handler().calls().is_empty());
}

#[test]
fn encoded_notification_decodes_unchanged() {
    let original = decode(notification_with_entries(vec![
        entry(vec![
            messages_change(vec![
                text_message("wamid.a", "first"),
                button_reply_message("wamid.b", "btn1"),
            ]),
            json!({"field": "smb_message_echoes", "value": {"event": "ECHO"}}),
        ]),
        entry(vec![json!({
            "field": "group_lifecycle_update",
            "value": {
                "groups": [{"group_id": "grp-1", "type": "group_create", "request_id": "req-9"}],
                "errors": [
                    {"code": 131000, "title": "Something went wrong"},
                    {"error_type": "TIMEOUT_ERROR", "error_rate": 0.2, "error_count": 3}
                ]
            }
        })]),
    ]));

    let encoded = serde_json::to_vec(&original).unwrap();
    let decoded = notification::decode(&encoded).unwrap();

    assert_eq!(decoded, original);

    let fields: Vec<Vec<String>> = decoded
        .entries
        .iter()
        .map(|e| e.changes.iter().map(|c| c.field.to_string()).collect())
        .collect();
    assert_eq!(
        fields,
        [
            vec!["messages".to_owned(), "smb_message_echoes".to_owned()],
            vec!["group_lifecycle_update".to_owned()],
        ]
    );

    let ids: Vec<_> = decoded.entries[0].changes[0]
        .value
        .messages
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(ids, ["wamid.a", "wamid.b"]);
}

#[tokio::test]
async fn referral_wins_over_context() {
    let dispatcher = Dispatcher::new(Recorder::default());

    let mut msg = text_message("wamid.1", "I saw your ad");
    msg["referral"] = json!({
        "source_url": "https://fb.me/2ZulEu42P",
        "source_id": "ad-123",
        "source_type": "ad",
        "headline": "Chat with us",
        "media_type": "image",
        "image_url": "https://example.com/ad.jpg",
        "ctwa_clid": "ARAkLkA8rmlFeiCktEJQ"
    });
    msg["context"] = json!({"from": DISPLAY_PHONE, "id": "wamid.0"});

    dispatcher
        .dispatch(decode(notification(vec![messages_change(vec![msg])])))
        .await
        .unwrap();

    assert_eq!(dispatcher.handler().calls(), ["referral:wamid.1:ad-123"]);
}

#[tokio::test]
async fn context_without_referral_is_a_product_enquiry() {
    let dispatcher = Dispatcher::new(Recorder::default());

    let mut msg = text_message("wamid.2", "Can I get this in blue?");
    msg["context"] = json!({
        "from": DISPLAY_PHONE,
        "id": "wamid.0",
        "referred_product": {"catalog_id": "cat_id_333", "product_retailer_id": "sku-1"}
    });

    dispatcher
        .dispatch(decode(notification(vec![messages_change(vec![msg])])))
        .await
        .unwrap();

    assert_eq!(dispatcher.handler().calls(), ["product_enquiry:wamid.2"]);
}

#[tokio::test]
async fn plain_text_reaches_the_text_handler() {
    let dispatcher = Dispatcher::new(Recorder::default());

    dispatcher
        .dispatch(decode(notification(vec![messages_change(vec![text_message(
            "wamid.3", "hi",
        )])])))
        .await
        .unwrap();

    assert_eq!(dispatcher.handler().calls(), ["text:wamid.3:hi"]);
}

#[tokio::test]
async fn specific_interactive_slot_beats_the_generic_one() {
    let dispatcher = Dispatcher::new(Recorder::default());

    dispatcher
        .dispatch(decode(notification(vec![messages_change(vec![
            button_reply_message("wamid.4", "btn1"),
            message(
                "wamid.5",
                "interactive",
                json!({"type": "call_permission_reply"}),
            ),
        ])])))
        .await
        .unwrap();

    assert_eq!(
        dispatcher.handler().calls(),
        ["button_reply:wamid.4:btn1", "interactive:wamid.5"]
    );
}

#[tokio::test]
async fn list_reply_goes_only_to_its_slot() {
    let calls: Log = Default::default();
    let (list, generic) = (calls.clone(), calls.clone());

    let dispatcher = Dispatcher::new(
        Handlers::new()
            .on_list_reply(move |_, _, reply| {
                list.lock().unwrap().push(format!("list:{}", reply.id));
                async { Ok(()) }
            })
            .on_interactive(move |_, _, _| {
                generic.lock().unwrap().push("interactive".to_owned());
                async { Ok(()) }
            }),
    );

    dispatcher
        .dispatch(decode(notification(vec![messages_change(vec![message(
            "wamid.6",
            "interactive",
            json!({
                "type": "list_reply",
                "list_reply": {"id": "row-2", "title": "Tuesday", "description": "Afternoon"}
            }),
        )])])))
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), ["list:row-2"]);
}

#[tokio::test]
async fn nothing_registered_is_still_ok() {
    let dispatcher = Dispatcher::new(Handlers::new());

    let payload = notification(vec![
        messages_change(vec![
            text_message("wamid.7", "hi"),
            message("wamid.8", "image", json!({"id": "media-1", "mime_type": "image/jpeg"})),
            message("wamid.9", "sticker", json!({"id": "media-2", "animated": false})),
        ]),
        json!({
            "field": "message_template_status_update",
            "value": {"event": "APPROVED", "message_template_id": 1, "message_template_name": "hello", "message_template_language": "en_US"}
        }),
    ]);

    let response = dispatcher.handle_notification(decode(payload)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "");
}

#[tokio::test]
async fn every_item_is_visited_in_order() {
    let dispatcher = Dispatcher::new(Recorder::default());

    let entries = (0..3)
        .map(|e| {
            entry(
                (0..2)
                    .map(|c| {
                        messages_change(vec![text_message(
                            &format!("wamid.{e}.{c}"),
                            &format!("{e}-{c}"),
                        )])
                    })
                    .collect(),
            )
        })
        .collect();

    let summary = dispatcher
        .dispatch(decode(notification_with_entries(entries)))
        .await
        .unwrap();

    assert_eq!(summary.entries, 3);
    assert_eq!(summary.changes, 6);
    assert_eq!(
        dispatcher.handler().calls(),
        [
            "text:wamid.0.0:0-0",
            "text:wamid.0.1:0-1",
            "text:wamid.1.0:1-0",
            "text:wamid.1.1:1-1",
            "text:wamid.2.0:2-0",
            "text:wamid.2.1:2-1",
        ]
    );
}

#[tokio::test]
async fn handler_failure_is_a_server_error() {
    let dispatcher = Dispatcher::new(
        Handlers::new().on_button(|_, _, _| async { HandlerResult::Err("inventory service unavailable".into()) }),
    );

    let payload = notification(vec![messages_change(vec![message(
        "wamid.10",
        "button",
        json!({"payload": "RESTOCK", "text": "Notify me"}),
    )])]);

    let err = dispatcher.dispatch(decode(payload.clone())).await.unwrap_err();
    let Error::Handler(err) = err else {
        panic!("expected a handler error");
    };
    assert_eq!(err.kind(), HandlerKind::Button);
    assert_eq!(
        err.to_string(),
        "button message handler failed: inventory service unavailable"
    );

    let response = dispatcher.handle_notification(decode(payload)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.body().contains("inventory"));
}

#[tokio::test]
async fn change_families_reach_their_slots() {
    let calls: Log = Default::default();
    let (t, q, a, c, f) = (
        calls.clone(),
        calls.clone(),
        calls.clone(),
        calls.clone(),
        calls.clone(),
    );

    let dispatcher = Dispatcher::new(
        Handlers::new()
            .on_template_status(move |_, s| {
                t.lock().unwrap().push(format!("template:{}:{}", s.name, s.event));
                async { Ok(()) }
            })
            .on_phone_number_quality(move |_, p| {
                q.lock().unwrap().push(format!("quality:{}", p.current_limit));
                async { Ok(()) }
            })
            .on_account_update(move |_, u| {
                let partner = u.partner_added().map(|w| w.waba_id.clone());
                a.lock().unwrap().push(format!("account:{}:{:?}", u.event, partner));
                async { Ok(()) }
            })
            .on_call(move |_, call| {
                c.lock().unwrap().push(format!("call:{}", call.id));
                async { Ok(()) }
            })
            .on_flow_status_change(move |_, s| {
                f.lock().unwrap().push(format!("flow:{}", s.new_status));
                async { Ok(()) }
            }),
    );

    let payload = notification(vec![
        json!({"field": "message_template_status_update", "value": {
            "event": "REJECTED", "message_template_id": "594425479261596",
            "message_template_name": "promo", "message_template_language": "en_US",
            "reason": "INCORRECT_CATEGORY"
        }}),
        json!({"field": "phone_number_quality_update", "value": {
            "display_phone_number": DISPLAY_PHONE, "event": "UPGRADE", "current_limit": "TIER_10K"
        }}),
        json!({"field": "account_update", "value": {
            "event": "PARTNER_ADDED",
            "waba_info": {"waba_id": "495709166956424", "owner_business_id": "184662338073178"}
        }}),
        json!({"field": "calls", "value": {
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": DISPLAY_PHONE, "phone_number_id": PHONE_ID},
            "calls": [
                {"id": "wacid.1", "from": CUSTOMER_ID, "to": DISPLAY_PHONE, "event": "connect"},
                {"id": "wacid.2", "from": CUSTOMER_ID, "to": DISPLAY_PHONE, "event": "terminate"}
            ]
        }}),
        json!({"field": "flows", "value": {
            "event": "FLOW_STATUS_CHANGE", "flow_id": "1234", "old_status": "DRAFT", "new_status": "PUBLISHED"
        }}),
    ]);

    dispatcher.dispatch(decode(payload)).await.unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        [
            "template:promo:REJECTED",
            "quality:TIER_10K",
            "account:PARTNER_ADDED:Some(\"495709166956424\")",
            "call:wacid.1",
            "call:wacid.2",
            "flow:PUBLISHED",
        ]
    );
}

#[tokio::test]
async fn failed_status_carries_its_errors() {
    let seen: Log = Default::default();
    let log = seen.clone();

    let dispatcher = Dispatcher::new(Handlers::new().on_message_status(move |_, status| {
        let codes: Vec<_> = status.errors.iter().map(|e| e.code.to_string()).collect();
        log.lock()
            .unwrap()
            .push(format!("{}:{}", status.failed(), codes.join(",")));
        async { Ok(()) }
    }));

    let payload = notification(vec![json!({
        "field": "messages",
        "value": {
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": DISPLAY_PHONE, "phone_number_id": PHONE_ID},
            "statuses": [{
                "id": "wamid.sent",
                "status": "failed",
                "timestamp": "1750263773",
                "recipient_id": CUSTOMER_ID,
                "errors": [{
                    "code": 131049,
                    "title": "This message was not delivered to maintain healthy ecosystem engagement.",
                    "error_data": {"details": "In order to maintain a healthy ecosystem engagement, the message failed to be delivered."},
                    "href": "https://developers.facebook.com/docs/whatsapp/cloud-api/support/error-codes"
                }]
            }]
        }
    })]);

    dispatcher.dispatch(decode(payload)).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), ["true:131049"]);
}

#[tokio::test]
async fn flow_alert_with_error_rows_reaches_its_slot() {
    let seen: Log = Default::default();
    let (alerts, errors) = (seen.clone(), seen.clone());

    let dispatcher = Dispatcher::new(
        Handlers::new()
            .on_flow_alert(move |_, alert| {
                alerts
                    .lock()
                    .unwrap()
                    .push(format!("{}:{}", alert.event, alert.errors.len()));
                async { Ok(()) }
            })
            .on_notification_error(move |_, e| {
                errors.lock().unwrap().push(format!("error:{}", e.code));
                async { Ok(()) }
            }),
    );

    let payload = notification(vec![json!({
        "field": "flows",
        "value": {
            "event": "ENDPOINT_ERROR_RATE",
            "flow_id": "1234",
            "alert_state": "ACTIVATED",
            "threshold": 0.1,
            "error_rate": 0.3,
            "errors": [
                {"error_type": "TIMEOUT_ERROR", "error_rate": 0.2, "error_count": 20},
                {"error_type": "INVALID_RESPONSE", "error_rate": 0.1, "error_count": 10}
            ]
        }
    })]);

    let summary = dispatcher.dispatch(decode(payload)).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), ["ENDPOINT_ERROR_RATE:2"]);
    assert_eq!(summary.invocations, 1);
}
