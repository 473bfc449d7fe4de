//! Hot-path benchmark suite.
//!
//! Benchmarks the per-frame work a session does:
//! - History push at different capacities
//! - JSON decode and discriminator routing
//! - Handler dispatch with different handler counts
//! - Event-stream parsing
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};
use tether::transport::sse::EventParser;
use tether::{DecodeMode, Decoder, Envelope, Frame, HandlerRegistry, History};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const HISTORY_CAPACITIES: &[usize] = &[10, 100, 1000];
const HANDLER_COUNTS: &[usize] = &[1, 8, 64];

// ============================================================================
// Benchmark: History
// ============================================================================

fn bench_history_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_push");

    for &capacity in HISTORY_CAPACITIES {
        group.bench_with_input(
            BenchmarkId::new("capacity", capacity),
            &capacity,
            |b, &capacity| {
                let mut history = History::new(capacity);
                let frame = Frame::from(r#"{"type":"tick","value":1}"#);
                b.iter(|| history.push(black_box(frame.clone())));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let decoder = Decoder::new(DecodeMode::Json, "type");

    let small = Frame::from(r#"{"type":"tick","value":1}"#);
    let large = Frame::from(
        json!({
            "type": "snapshot",
            "bids": (0..100).map(|i| [i, i * 2]).collect::<Vec<_>>(),
            "asks": (0..100).map(|i| [i, i * 3]).collect::<Vec<_>>(),
        })
        .to_string(),
    );
    let invalid = Frame::from("not json at all");

    for (name, frame) in [("small", &small), ("large", &large), ("invalid", &invalid)] {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("json", name), frame, |b, frame| {
            b.iter(|| decoder.decode(black_box(frame)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let envelope = Envelope {
        kind: "tick".to_string(),
        payload: json!({"type": "tick", "value": 1}),
    };

    for &count in HANDLER_COUNTS {
        let registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let registrations: Vec<_> = (0..count)
            .map(|_| {
                let calls = Arc::clone(&calls);
                registry.register(
                    "tick",
                    Arc::new(move |_: &Value| {
                        calls.fetch_add(1, Ordering::Relaxed);
                    }),
                )
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("handlers", count), &count, |b, _| {
            b.iter(|| registry.dispatch(black_box(&envelope)));
        });

        drop(registrations);
    }

    group.finish();
}

// ============================================================================
// Benchmark: Event-Stream Parsing
// ============================================================================

fn bench_event_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_parser");

    let stream: Vec<u8> = (0..100)
        .map(|i| format!("event: update\nid: {i}\ndata: {{\"value\":{i}}}\n\n"))
        .collect::<String>()
        .into_bytes();
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk_size in [16, 256, 4096] {
        group.bench_with_input(
            BenchmarkId::new("chunk", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut parser = EventParser::new();
                    let mut count = 0;
                    for chunk in stream.chunks(chunk_size) {
                        count += parser.feed(black_box(chunk)).len();
                    }
                    count
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_history_push,
    bench_decode,
    bench_dispatch,
    bench_event_parser
);
criterion_main!(benches);
