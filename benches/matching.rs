use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rewind::filter::FilterSpec;
use rewind::matcher::{LiveRequest, MatcherCatalog, RequestMatcher, Responder};
use rewind::transaction::{Body, Headers, Method, ResponseRecord};

fn canned(status: u16) -> Responder {
    Responder::Canned(vec![ResponseRecord {
        status,
        body: Body::Text("{}".to_string()),
        headers: Headers::new(),
    }])
}

fn bench_catalog_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_dispatch");

    for size in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut catalog = MatcherCatalog::new();
            for i in 0..size {
                let uri = format!("https://api.example.com/items/{i}?page=1");
                catalog.register(RequestMatcher::exact(Method::Get, &uri, true), canned(200));
            }

            let spec = FilterSpec::new();
            let request = LiveRequest::new(
                Method::Get,
                format!("https://api.example.com/items/{}?page=1", size - 1),
            );

            b.iter(|| catalog.dispatch(black_box(&request), black_box(&spec), black_box(&spec)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_catalog_dispatch);
criterion_main!(benches);
