use criterion::{BenchmarkId, Criterion, Throughput};
use http::HeaderMap;
use serde_json::{json, Value};
use whatsapp_webhook_rs::{notification, signature, Dispatcher, Handlers, WebhookService};

use crate::{APP_SECRET, CUSTOMER_ID, PHONE_ID, WABA_ID};

/// A `messages` notification with `count` text messages in one change.
fn text_notification(count: usize) -> Vec<u8> {
    let messages: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "from": CUSTOMER_ID,
                "id": format!("wamid.{i}"),
                "timestamp": "1749416383",
                "type": "text",
                "text": {"body": "Hello from a benchmark!"}
            })
        })
        .collect();

    serde_json::to_vec(&json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": WABA_ID,
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "15550783881", "phone_number_id": PHONE_ID},
                    "contacts": [{"profile": {"name": "Sheena Nelson"}, "wa_id": CUSTOMER_ID}],
                    "messages": messages
                }
            }]
        }]
    }))
    .unwrap()
}

fn handlers() -> Handlers {
    Handlers::new().on_text(|_, _, text| async move {
        std::hint::black_box(text);
        Ok(())
    })
}

pub fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Notification Decoding");

    for count in [1, 10, 100] {
        let body = text_notification(count);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &body, |b, body| {
            b.iter(|| notification::decode(body).unwrap());
        });
    }

    group.finish();
}

pub fn bench_signature(c: &mut Criterion) {
    let body = text_notification(10);
    let header = signature::sign(&body, APP_SECRET);

    c.bench_function("signature_validate", |b| {
        b.iter(|| assert!(signature::validate(&body, &header, APP_SECRET)));
    });
}

pub fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dispatcher = Dispatcher::new(handlers());
    let notification = notification::decode(&text_notification(10)).unwrap();

    c.bench_function("dispatch_10_text_messages", |b| {
        b.to_async(&rt)
            .iter(|| dispatcher.dispatch(notification.clone()));
    });
}

pub fn bench_receive(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = WebhookService::builder()
        .verify_payload(APP_SECRET)
        .build(handlers());

    let body = text_notification(10);
    let mut headers = HeaderMap::new();
    headers.insert(
        signature::SIGNATURE_HEADER,
        signature::sign(&body, APP_SECRET).parse().unwrap(),
    );

    c.bench_function("receive_signed_10_text_messages", |b| {
        b.to_async(&rt).iter(|| service.receive(&headers, &body));
    });
}
