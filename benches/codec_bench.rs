//! Performance benchmarks for the payload codec.
//!
//! The event dispatcher decodes every barcode event on the driver's callback
//! thread, so decoding must stay well below a millisecond per event.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use scanbridge_core::BeepPattern;
use scanbridge_protocol::codec;
use std::hint::black_box;

/// Build a barcode event payload carrying `label_len` characters.
fn create_scan_event(label_len: usize) -> String {
    let label = (0..label_len)
        .map(|i| format!("0x{:02X}", 0x30 + (i % 10)))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <outArgs><scannerID>1</scannerID><arg-xml><scandata>\
         <modelnumber>DS2208-SR00007ZZWW</modelnumber>\
         <serialnumber>24316523021017</serialnumber>\
         <GUID>A1B2C3D4</GUID><datatype>8</datatype>\
         <datalabel>{label}</datalabel>\
         </scandata></arg-xml></outArgs>"
    )
}

/// Build a discovery payload listing `count` devices.
fn create_discovery(count: usize) -> String {
    let entries: String = (1..=count)
        .map(|id| {
            format!(
                "<scanner type=\"SNAPI\"><scannerID>{id}</scannerID>\
                 <serialnumber>SN{id:06}</serialnumber>\
                 <modelnumber>DS2208</modelnumber></scanner>"
            )
        })
        .collect();
    format!("<?xml version=\"1.0\"?><scanners>{entries}</scanners>")
}

/// Benchmark encoding request bodies.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("encode_trigger", |b| {
        b.iter(|| black_box(codec::encode_trigger(black_box(7))));
    });

    group.bench_function("encode_beep", |b| {
        b.iter(|| black_box(codec::encode_beep(black_box(7), BeepPattern::FOUR_HIGH_SHORT)));
    });

    group.finish();
}

/// Benchmark decoding scan events with growing label sizes.
fn bench_decode_scan_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_scan_event");

    for label_len in [8usize, 64, 512] {
        let payload = create_scan_event(label_len);
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(label_len),
            &payload,
            |b, payload| {
                b.iter(|| black_box(codec::decode_scan_event(black_box(payload)).unwrap()));
            },
        );
    }

    group.finish();
}

/// Benchmark decoding discovery lists with growing device counts.
fn bench_decode_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_discovery");

    for count in [1usize, 16, 255] {
        let payload = create_discovery(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter(|| black_box(codec::decode_discovery_list(black_box(payload)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode_scan_event,
    bench_decode_discovery
);
criterion_main!(benches);
