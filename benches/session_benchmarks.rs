//! Session store benchmarks for ferrule-session

use async_trait::async_trait;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ferrule::SessionData;
use ferrule::prelude::*;
use ferrule_session::{JsonSerializer, SessionSerializer, generate_sid};
use ferrule_testing::TestAppBuilder;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

struct Counter;

#[async_trait]
impl RequestHandler for Counter {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, Error> {
        if let Some(session) = ctx.session_mut() {
            let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
            session.insert("visits", visits)?;
        }
        Ok(HttpResponse::no_content())
    }
}

fn sid_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_id");
    group.throughput(Throughput::Elements(1));
    group.bench_function("generate_sid", |b| b.iter(|| black_box(generate_sid())));
    group.finish();
}

fn serializer_benchmark(c: &mut Criterion) {
    let mut data = SessionData::new();
    data.insert("user_id".into(), json!(12345));
    data.insert("roles".into(), json!(["admin", "editor"]));
    data.insert("cart".into(), json!({"items": [1, 2, 3], "total": 42.5}));
    let record = JsonSerializer.dumps(&data, true).unwrap();

    let mut group = c.benchmark_group("session_record");
    group.bench_function("dumps", |b| {
        b.iter(|| JsonSerializer.dumps(black_box(&data), true).unwrap())
    });
    group.bench_function("loads", |b| {
        b.iter(|| JsonSerializer.loads(black_box(&record)).unwrap())
    });
    group.finish();
}

fn request_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let app = TestAppBuilder::new().with_sessions().build().unwrap();
    let client = app.client(Arc::new(Counter));
    rt.block_on(client.get("/"));

    let mut group = c.benchmark_group("session_request");
    group.throughput(Throughput::Elements(1));
    group.bench_function("open_handle_save_in_memory", |b| {
        b.to_async(&rt).iter(|| async { black_box(client.get("/").await.status()) });
    });
    group.finish();
}

criterion_group!(benches, sid_benchmark, serializer_benchmark, request_benchmark);
criterion_main!(benches);
