//! Performance benchmarks for hostsweep

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hostsweep::{
    config::ScanConfig,
    discovery::DeviceRecord,
    network::{address, AddressRange, NetworkBackend},
    scanner::{ResultStore, ScanEngine},
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Every host is up with port 80 open, nothing takes any time.
struct InstantBackend;

#[async_trait]
impl NetworkBackend for InstantBackend {
    async fn ping(&self, _target: Ipv4Addr, _timeout: Duration) -> bool {
        true
    }

    async fn reverse_lookup(&self, _target: Ipv4Addr) -> Option<String> {
        None
    }

    async fn mac_address(&self, _target: Ipv4Addr) -> Option<String> {
        None
    }

    async fn probe_port(&self, _target: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
        port == 80
    }
}

/// Benchmark address text conversion
fn bench_address_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("address_conversion");

    group.bench_function("parse", |b| {
        b.iter(|| address::parse(black_box("192.168.100.254")))
    });

    group.bench_function("format", |b| b.iter(|| address::format(black_box(0xC0A8_64FE))));

    group.bench_function("parse_format_class_c", |b| {
        b.iter(|| {
            for ordinal in 0xC0A8_0100u32..=0xC0A8_01FF {
                let text = address::format(ordinal);
                black_box(address::parse(&text).ok());
            }
        })
    });

    group.finish();
}

/// Benchmark snapshot cost as the store grows
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("result_snapshot");

    for size in [254usize, 4096, 65534].iter() {
        let store = ResultStore::new();
        for ordinal in 0..*size as u32 {
            let mut record = DeviceRecord::new(ordinal);
            record.reachable = ordinal % 3 == 0;
            record.open_ports = vec![22, 443];
            store.push(record);
        }

        group.bench_with_input(BenchmarkId::new("snapshot_into", size), size, |b, _| {
            let mut out = Vec::new();
            b.iter(|| black_box(store.snapshot_into(&mut out)))
        });
    }

    group.finish();
}

/// Benchmark a full sweep of a /24 with no network cost
fn bench_engine_sweep(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("engine_sweep");
    group.sample_size(10);

    for workers in [1usize, 8, 64].iter() {
        group.bench_with_input(BenchmarkId::new("class_c", workers), workers, |b, &workers| {
            b.iter(|| {
                rt.block_on(async {
                    let engine = ScanEngine::new(Arc::new(InstantBackend));
                    let config = ScanConfig::default()
                        .with_rate_limit(0)
                        .with_workers(workers);
                    let range = AddressRange::new(0xC0A8_0101, 0xC0A8_01FE).ok()?;

                    engine.start(range, config, None).await.ok()?;
                    engine.wait().await;
                    Some(black_box(engine.snapshot().len()))
                })
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_address_conversion,
    bench_snapshot,
    bench_engine_sweep
);
criterion_main!(benches);
