use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;
use resource_lifecycle::engine::memory::MemoryEngine;
use resource_lifecycle::engine::Engine;
use resource_lifecycle::kv::transaction::Transaction;
use resource_lifecycle::records::DrgRecord;
use resource_lifecycle::store::ResourceStateStore;
use serde_bytes::ByteBuf;

fn random_drg(rng: &mut impl Rng, key: i64) -> DrgRecord {
    DrgRecord {
        drg_id: format!("drg-{}", rng.gen_range(0..10_000)),
        drg_name: "Decide Discount".to_string(),
        drg_version: rng.gen_range(1..5),
        drg_key: key,
        resource_name: "discount.dmn".to_string(),
        checksum: ByteBuf::from(vec![rng.gen(); 16]),
        resource: ByteBuf::from(vec![rng.gen(); 256]),
    }
}

fn store_and_lookup_drgs(n: i64) {
    let mut engine = MemoryEngine::new();
    let mut store = ResourceStateStore::new();
    let mut rng = rand::thread_rng();

    let mut txn = Transaction::new(&mut engine);
    for key in 0..n {
        store.store_drg(&mut txn, &random_drg(&mut rng, key)).unwrap();
    }
    txn.commit().unwrap();

    let mut txn = Transaction::new(&mut engine);
    for key in 0..n {
        black_box(store.find_drg_by_key(&mut txn, key).unwrap());
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("store and look up 200 drgs", |b| b.iter(|| store_and_lookup_drgs(black_box(200))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
