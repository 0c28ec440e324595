use serde_json::{json, Value};

// --- CONSTANTS ---
#[allow(dead_code)]
pub const APP_SECRET: &str = "a1b2c3d4e5f6";
#[allow(dead_code)]
pub const VERIFY_TOKEN: &str = "meatyhamhock";
#[allow(dead_code)]
pub const CHALLENGE: &str = "1158201444";
#[allow(dead_code)]
pub const WABA_ID: &str = "987654321098765";
#[allow(dead_code)]
pub const PHONE_ID: &str = "106540352242922";
#[allow(dead_code)]
pub const DISPLAY_PHONE: &str = "15550783881";
#[allow(dead_code)]
pub const CUSTOMER_ID: &str = "16505551234";

// --- PAYLOAD BUILDERS ---

/// A full notification with one entry holding `changes`.
#[allow(dead_code)]
pub fn notification(changes: Vec<Value>) -> Value {
    notification_with_entries(vec![entry(changes)])
}

#[allow(dead_code)]
pub fn notification_with_entries(entries: Vec<Value>) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": entries
    })
}

#[allow(dead_code)]
pub fn entry(changes: Vec<Value>) -> Value {
    json!({
        "id": WABA_ID,
        "changes": changes
    })
}

/// A `messages` change carrying `messages`, with sender contacts.
#[allow(dead_code)]
pub fn messages_change(messages: Vec<Value>) -> Value {
    json!({
        "field": "messages",
        "value": {
            "messaging_product": "whatsapp",
            "metadata": {
                "display_phone_number": DISPLAY_PHONE,
                "phone_number_id": PHONE_ID
            },
            "contacts": [{"profile": {"name": "Sheena Nelson"}, "wa_id": CUSTOMER_ID}],
            "messages": messages
        }
    })
}

/// A message of `kind` with `payload` under the key of the same name.
#[allow(dead_code)]
pub fn message(id: &str, kind: &str, payload: Value) -> Value {
    json!({
        "from": CUSTOMER_ID,
        "id": id,
        "timestamp": "1749416383",
        "type": kind,
        kind: payload
    })
}

#[allow(dead_code)]
pub fn text_message(id: &str, body: &str) -> Value {
    message(id, "text", json!({"body": body}))
}

#[allow(dead_code)]
pub fn button_reply_message(id: &str, reply_id: &str) -> Value {
    message(
        id,
        "interactive",
        json!({
            "type": "button_reply",
            "button_reply": {"id": reply_id, "title": "Yes"}
        }),
    )
}

#[allow(dead_code)]
pub fn to_body(payload: &Value) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap()
}

/// Installs a test subscriber once so `tracing` output shows up with `--nocapture`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
