use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use wallet_core::{Amount, OperationType, WalletId};
use wallet_infra::{BalanceLedger, InMemoryBalanceStore};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn bench_change_balance_latency(c: &mut Criterion) {
    let rt = runtime();
    let ledger = BalanceLedger::new(InMemoryBalanceStore::new());
    let wallet_id = WalletId::new();
    let amount = Amount::new(1).unwrap();

    c.bench_function("change_balance_deposit", |b| {
        b.iter(|| {
            rt.block_on(ledger.change_balance(black_box(wallet_id), OperationType::Deposit, amount))
                .unwrap()
        });
    });

    c.bench_function("get_balance", |b| {
        b.iter(|| rt.block_on(ledger.get_balance(black_box(wallet_id))).unwrap());
    });
}

/// Same number of deposits, spread over a varying number of wallets. One wallet
/// means every call queues on the same serialization token.
fn bench_contention(c: &mut Criterion) {
    const CALLS: usize = 256;
    let rt = runtime();
    let amount = Amount::new(5).unwrap();

    let mut group = c.benchmark_group("concurrent_deposits");
    group.throughput(Throughput::Elements(CALLS as u64));

    for wallets in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(wallets), &wallets, |b, &wallets| {
            let ledger = Arc::new(BalanceLedger::new(InMemoryBalanceStore::new()));
            let ids: Vec<WalletId> = (0..wallets).map(|_| WalletId::new()).collect();

            b.iter(|| {
                rt.block_on(async {
                    let mut handles = Vec::with_capacity(CALLS);
                    for i in 0..CALLS {
                        let ledger = ledger.clone();
                        let id = ids[i % ids.len()];
                        handles.push(tokio::spawn(async move {
                            ledger.change_balance(id, OperationType::Deposit, amount).await
                        }));
                    }
                    for handle in handles {
                        handle.await.unwrap().unwrap();
                    }
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_change_balance_latency, bench_contention);
criterion_main!(benches);
