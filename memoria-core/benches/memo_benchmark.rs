use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use memoria_core::{
    bound_memoizer, global_memoizer, BoundMemoizer, CacheableKey, GlobalMemoizer, Kwargs,
    MemoCache, Memoizable,
};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

struct Account {
    balance: i64,
    memo: MemoCache,
}

impl Memoizable for Account {
    fn memo_cache(&self) -> &MemoCache {
        &self.memo
    }
}

fn account(balance: i64) -> Account {
    Account {
        balance,
        memo: MemoCache::new(),
    }
}

fn projected() -> BoundMemoizer<Account, u32, i64> {
    BoundMemoizer::new("Account::projected", |account: &Account, years: u32| {
        account.balance * (years as i64 + 1)
    })
}

fn bench_key_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_construction");

    group.bench_function("int", |b| b.iter(|| black_box(42u64).to_key_part()));
    group.bench_function("tuple", |b| {
        b.iter(|| (black_box(7u32), 'x', Some(1.5f64)).to_key_part())
    });
    group.bench_function("kwargs", |b| {
        let kwargs = Kwargs::new()
            .with("limit", 10u32)
            .with("page", 2)
            .with("offset", 0);
        b.iter(|| black_box(&kwargs).to_key_part())
    });

    group.finish();
}

fn bench_bound_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("bound_hits");

    for distinct in [1u32, 16, 256].iter() {
        let memoizer = projected();
        let receiver = account(100);
        for years in 0..*distinct {
            memoizer.call(&receiver, years).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(distinct),
            distinct,
            |b, &distinct| {
                let mut years = 0;
                b.iter(|| {
                    years = (years + 1) % distinct;
                    black_box(memoizer.call(&receiver, years).unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_bound_after_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("bound_after_flush");
    let memoizer = projected();
    let receiver = account(100);

    group.bench_function("flush_item", |b| {
        b.iter(|| {
            bound_memoizer::flush_item(&receiver);
            black_box(memoizer.call(&receiver, 3).unwrap())
        })
    });

    group.finish();
}

fn bench_global_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_hits");
    global_memoizer::flush();

    let length = GlobalMemoizer::new("length", |text: String| text.len());
    length.call("warm".to_string()).unwrap();

    group.bench_function("string_arg", |b| {
        b.iter(|| black_box(length.call("warm".to_string()).unwrap()))
    });

    group.finish();
}

fn bench_global_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_concurrent_reads");
    global_memoizer::flush();

    let square = Arc::new(GlobalMemoizer::new("square", |n: u64| n * n));
    for n in 0..100 {
        square.call(n).unwrap();
    }

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let square = Arc::clone(&square);
                            thread::spawn(move || {
                                for n in 0..100 {
                                    black_box(square.call(n).unwrap());
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_key_construction,
    bench_bound_hits,
    bench_bound_after_flush,
    bench_global_hits,
    bench_global_concurrent_reads
);
criterion_main!(benches);
