use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use personaforge_core::JobKind;
use personaforge_providers::ResponseNormalizer;

/// Provider-style envelope with the interesting fields buried `depth` levels down.
fn nested_response(depth: usize) -> Value {
    let mut value = json!({
        "task_id": "t-1",
        "status": "processing",
        "output_url": "https://cdn.example/out.mp4",
    });
    for i in 0..depth {
        value = json!({
            "meta": {"request": i, "region": "eu", "tags": ["a", "b", "c"]},
            "data": value,
        });
    }
    value
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for depth in [0usize, 4, 16] {
        let value = nested_response(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &value, |b, v| {
            b.iter(|| ResponseNormalizer::normalize(JobKind::LipsyncVideo, black_box(v)))
        });
    }
    group.finish();

    let body = serde_json::to_string(&nested_response(4)).unwrap_or_default();
    c.bench_function("normalize_body/depth4", |b| {
        b.iter(|| ResponseNormalizer::normalize_body(JobKind::LipsyncVideo, black_box(&body)))
    });
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
