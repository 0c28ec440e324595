mod dispatch_benches;

// --- CONSTANTS ---
#[allow(dead_code)]
pub const APP_SECRET: &str = "a1b2c3d4e5f6";
#[allow(dead_code)]
pub const WABA_ID: &str = "987654321098765";
#[allow(dead_code)]
pub const PHONE_ID: &str = "106540352242922";
#[allow(dead_code)]
pub const CUSTOMER_ID: &str = "16505551234";

use criterion::{criterion_group, criterion_main};

use dispatch_benches::{bench_decode, bench_dispatch, bench_receive, bench_signature};

criterion_group!(
    benches,
    bench_decode,
    bench_signature,
    bench_dispatch,
    bench_receive
);
criterion_main!(benches);
