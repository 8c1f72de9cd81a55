use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use superchatd::broadcast::broadcast;
use superchatd::protocol::MessageType;
use superchatd::session::SessionHandle;

fn recipients(n: usize) -> Vec<SessionHandle> {
    (0..n)
        .map(|id| {
            let (tx, rx) = tokio::sync::mpsc::channel(256);
            // Keep the receiver alive for the duration of the benchmark by
            // leaking it; we only care about send throughput here.
            std::mem::forget(rx);
            SessionHandle {
                id: id as u64,
                protocol_version: 2,
                sink: tx,
            }
        })
        .collect()
}

fn bench_broadcast(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let payload = vec![b'x'; 200];

    let mut group = c.benchmark_group("broadcast_fanout");
    for &size in &[10usize, 100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async {
                let handles = recipients(size);
                broadcast(MessageType::NEW_MESSAGE, &payload, handles, |_| true).await;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_broadcast);
criterion_main!(benches);
