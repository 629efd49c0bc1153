use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use svidwatch_core::{Operation, Selector, SelectorSet, proto};

const SELECTORS: &[&str] = &[
    "unix:uid:1000",
    "k8s:ns:payments",
    "docker:label:com.example.role:web",
    "spiffe_id:spiffe://example.org/ns/payments/sa/api",
];

fn selector_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector");
    group.throughput(Throughput::Elements(SELECTORS.len() as u64));

    group.bench_function("parse", |b| {
        b.iter(|| {
            for text in SELECTORS {
                black_box(text.parse::<Selector>().unwrap());
            }
        });
    });

    let parsed: Vec<Selector> = SELECTORS.iter().map(|s| s.parse().unwrap()).collect();
    group.bench_function("format", |b| {
        b.iter(|| {
            for selector in &parsed {
                black_box(selector.to_string());
            }
        });
    });

    group.bench_function("encode_add", |b| {
        b.iter(|| {
            let selectors: SelectorSet = parsed.iter().cloned().collect();
            black_box(proto::WatchRequest::from(Operation::Add {
                id: black_box(42),
                selectors,
            }))
        });
    });

    group.finish();
}

criterion_group!(benches, selector_bench);
criterion_main!(benches);
