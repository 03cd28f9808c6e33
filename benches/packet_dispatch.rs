//! Benchmarks for packet decoding and callback dispatch
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use graphlink::callback::{Float32VectorDecoder, MessageVecDecoder};
use graphlink::formats::Detection;
use graphlink::{
    CallbackRegistry, DecodingCallback, Packet, PacketCreator, PacketGetter, Timestamp,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn detections(n: usize) -> Vec<Detection> {
    (0..n)
        .map(|i| Detection::labeled(format!("label_{}", i), i as i32, 0.5 + i as f32 * 0.01))
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let creator = PacketCreator::new();

    for size in [1, 64, 1024].iter() {
        let packet = creator.float32_vector_packet(vec![-4.4; *size], Timestamp::new(0));
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("float32_vector", size), &packet, |b, p| {
            b.iter(|| black_box(PacketGetter::get_float32_vector(p)))
        });
    }

    for size in [1, 16, 128].iter() {
        let packet = creator.proto_vector_packet(&detections(*size), Timestamp::new(0));
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("detections", size), &packet, |b, p| {
            b.iter(|| black_box(PacketGetter::get_proto_vector::<Detection>(p)))
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let registry = CallbackRegistry::new();
    let sum = Arc::new(AtomicU64::new(0));
    let sum_clone = sum.clone();
    registry.register(
        "output_value",
        Arc::new(DecodingCallback::new(
            "output_value",
            Float32VectorDecoder,
            move |_, values: Vec<f32>| {
                sum_clone.fetch_add(values.len() as u64, Ordering::Relaxed);
            },
        )),
    );
    registry.register(
        "detections",
        Arc::new(DecodingCallback::new(
            "detections",
            MessageVecDecoder::<Detection>::new(),
            |_, d: Vec<Detection>| {
                black_box(d);
            },
        )),
    );

    let creator = PacketCreator::new();
    let value = creator.float32_vector_packet(vec![-4.4], Timestamp::new(1));
    let empty = Packet::empty_at(Timestamp::new(2));
    let batch = creator.proto_vector_packet(&detections(8), Timestamp::new(3));

    group.bench_function("registered_float_vector", |b| {
        b.iter(|| registry.dispatch("output_value", black_box(&value)))
    });
    group.bench_function("registered_empty_detections", |b| {
        b.iter(|| registry.dispatch("detections", black_box(&empty)))
    });
    group.bench_function("registered_detections_8", |b| {
        b.iter(|| registry.dispatch("detections", black_box(&batch)))
    });
    group.bench_function("unregistered", |b| {
        b.iter(|| registry.dispatch("nobody", black_box(&value)))
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_dispatch);
criterion_main!(benches);
