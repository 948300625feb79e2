use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use voxbridge::bridge::HandoffSlot;
use voxbridge::stream::{StreamBlockAdapter, StreamConfig, samples_to_bytes};
use voxbridge::transform::PassThrough;

/// One second of audio at 48 kHz.
const SECOND: usize = 48_000;

/// Write a second of audio in irregular chunks and drain it with small reads.
fn adapter_irregular_chunks(c: &mut Criterion) {
    let input: Vec<f32> = (0..SECOND).map(|i| (i as f32 * 0.01).sin()).collect();
    let mut group = c.benchmark_group("adapter_irregular_chunks");
    group.throughput(Throughput::Elements(SECOND as u64));

    for block_size in [1024usize, 2816, 8192] {
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &block_size| {
                b.iter(|| {
                    let mut adapter = StreamBlockAdapter::new(
                        PassThrough,
                        StreamConfig {
                            sample_rate: 48000,
                            block_size,
                        },
                    );
                    let mut produced = 0;
                    for chunk in input.chunks(441) {
                        adapter.write_samples(chunk);
                        produced += adapter.read_samples(1500).len();
                    }
                    produced += adapter.read_samples(usize::MAX).len();
                    black_box(produced)
                });
            },
        );
    }
    group.finish();
}

/// Byte path: split samples across writes and read bytes back.
fn adapter_byte_path(c: &mut Criterion) {
    let bytes = samples_to_bytes(&vec![0.25f32; SECOND]);
    let mut group = c.benchmark_group("adapter_byte_path");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("odd_sized_writes", |b| {
        b.iter(|| {
            let mut adapter = StreamBlockAdapter::new(PassThrough, StreamConfig::default());
            let mut produced = 0;
            for chunk in bytes.chunks(1023) {
                adapter.write_bytes(chunk);
                produced += adapter.read(8192).len();
            }
            black_box(produced)
        });
    });
    group.finish();
}

/// Publish/consume cycle of the handoff slot at the default block size.
fn slot_handoff(c: &mut Criterion) {
    let block = vec![0.5f32; 2816];
    let slot = HandoffSlot::new(block.len() * 2);
    let mut out = vec![0.0f32; block.len()];

    c.bench_function("slot_publish_consume", |b| {
        b.iter(|| {
            slot.publish(black_box(&block));
            black_box(slot.consume(&mut out))
        });
    });
}

criterion_group!(benches, adapter_irregular_chunks, adapter_byte_path, slot_handoff);
criterion_main!(benches);
