use criterion::{Criterion, criterion_group, criterion_main};
use futures_util::StreamExt;
use message_log::{InMemoryMessageLog, MessageLog, MessageLogExt};
use serde_json::json;

fn bench_publish(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = InMemoryMessageLog::new(3);

    c.bench_function("message_log/publish", |b| {
        b.iter(|| {
            rt.block_on(async {
                log.publish_json("payment.completed", "order-bench", &json!({"n": 1}))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_fetch_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let log = InMemoryMessageLog::new(1);
    rt.block_on(async {
        for n in 0..1_000 {
            log.publish_json("order.confirmed", "k", &json!({ "n": n }))
                .await
                .unwrap();
        }
    });

    c.bench_function("message_log/fetch_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let stream = log.fetch("bench", "order.confirmed", 0, 10).await.unwrap();
                let count = stream.count().await;
                assert_eq!(count, 10);
            });
        });
    });
}

criterion_group!(benches, bench_publish, bench_fetch_batch);
criterion_main!(benches);
