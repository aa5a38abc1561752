//! Integration tests for #[memoize] on `&self` methods
use memoria::{bound_memoizer, memoize, DefaultCacheableKey, Kwargs, MemoCache, Memoizable};
use serial_test::serial;
use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct Counter {
    count: Cell<u64>,
    memo: MemoCache,
}

impl Memoizable for Counter {
    fn memo_cache(&self) -> &MemoCache {
        &self.memo
    }
}

impl Counter {
    #[memoize]
    fn increment(&self) -> u64 {
        self.count.set(self.count.get() + 1);
        self.count.get()
    }

    #[memoize]
    fn add(&self, by: u64) -> u64 {
        self.count.set(self.count.get() + by);
        self.count.get()
    }

    #[memoize]
    fn search(&self, query: &str, options: Kwargs<u32>) -> Vec<String> {
        self.count.set(self.count.get() + 1);
        options
            .iter()
            .map(|(name, value)| format!("{}:{}={}", query, name, value))
            .collect()
    }

    #[memoize]
    fn parse_field(&self, field: &str) -> Result<i64, String> {
        self.count.set(self.count.get() + 1);
        field.parse::<i64>().map_err(|e| e.to_string())
    }

    #[memoize]
    fn scale(&self, factor: f64) -> f64 {
        self.count.set(self.count.get() + 1);
        self.count.get() as f64 * factor
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Point {
    x: i64,
    y: i64,
}

impl DefaultCacheableKey for Point {}

struct Circle {
    radius: i64,
    evaluations: Cell<u32>,
    memo: MemoCache,
}

impl Memoizable for Circle {
    fn memo_cache(&self) -> &MemoCache {
        &self.memo
    }
}

impl Circle {
    fn new(radius: i64) -> Self {
        Self {
            radius,
            evaluations: Cell::new(0),
            memo: MemoCache::new(),
        }
    }

    #[memoize]
    fn area(&self) -> f64 {
        self.evaluations.set(self.evaluations.get() + 1);
        std::f64::consts::PI * (self.radius * self.radius) as f64
    }

    #[memoize(name = "circle_contains")]
    fn contains(&self, point: &Point) -> bool {
        self.evaluations.set(self.evaluations.get() + 1);
        point.x * point.x + point.y * point.y <= self.radius * self.radius
    }

    #[memoize]
    fn fib(&self, n: u64) -> u64 {
        self.evaluations.set(self.evaluations.get() + 1);
        if n < 2 {
            n
        } else {
            self.fib(n - 1) + self.fib(n - 2)
        }
    }
}

#[test]
#[serial]
fn test_counter_scenario() {
    let counter = Counter::default();

    assert_eq!(counter.increment(), 1);
    assert_eq!(counter.increment(), 1);
    assert_eq!(counter.increment(), 1);

    bound_memoizer::flush_item(&counter);
    assert_eq!(counter.increment(), 2);
    assert_eq!(counter.increment(), 2);

    bound_memoizer::flush();
    assert_eq!(counter.increment(), 3);
    assert_eq!(counter.increment(), 3);
}

#[test]
#[serial]
fn test_receivers_are_isolated() {
    let first = Counter::default();
    let second = Counter::default();
    second.count.set(10);

    assert_eq!(first.increment(), 1);
    assert_eq!(second.increment(), 11);
    assert_eq!(first.increment(), 1);
    assert_eq!(second.increment(), 11);

    bound_memoizer::flush_item(&first);
    assert_eq!(first.increment(), 2);
    assert_eq!(second.increment(), 11);
}

#[test]
#[serial]
fn test_flush_reaches_every_receiver_and_method() {
    let counter = Counter::default();
    let circle = Circle::new(2);

    assert_eq!(counter.add(5), 5);
    circle.area();
    assert_eq!(circle.evaluations.get(), 1);

    bound_memoizer::flush_all();

    assert_eq!(counter.add(5), 10);
    circle.area();
    assert_eq!(circle.evaluations.get(), 2);
}

#[test]
#[serial]
fn test_arguments_select_entries() {
    let counter = Counter::default();

    assert_eq!(counter.add(1), 1);
    assert_eq!(counter.add(1), 1);
    assert_eq!(counter.add(2), 3);
    assert_eq!(counter.add(1), 1);
    assert_eq!(counter.add(2), 3);
}

#[test]
#[serial]
fn test_methods_do_not_share_entries() {
    let counter = Counter::default();

    assert_eq!(counter.increment(), 1);
    assert_eq!(counter.add(1), 2);
    assert_eq!(counter.increment(), 1);
}

#[test]
#[serial]
fn test_property_style_getter() {
    let circle = Circle::new(3);

    let area = circle.area();
    assert!((area - 28.274).abs() < 0.001);
    assert_eq!(circle.area(), area);
    assert_eq!(circle.evaluations.get(), 1);
}

#[test]
#[serial]
fn test_struct_argument_by_reference() {
    let circle = Circle::new(5);
    let inside = Point { x: 3, y: 4 };
    let outside = Point { x: 4, y: 4 };

    assert!(circle.contains(&inside));
    assert!(circle.contains(&inside.clone()));
    assert!(!circle.contains(&outside));
    assert_eq!(circle.evaluations.get(), 2);
}

#[test]
#[serial]
fn test_keyword_order_does_not_matter() {
    let counter = Counter::default();

    let first = counter.search("rust", Kwargs::new().with("limit", 10).with("page", 2));
    let second = counter.search("rust", Kwargs::new().with("page", 2).with("limit", 10));

    assert_eq!(first, second);
    assert_eq!(first, ["rust:limit=10", "rust:page=2"]);
    assert_eq!(counter.count.get(), 1);

    counter.search("rust", Kwargs::new().with("page", 3).with("limit", 10));
    assert_eq!(counter.count.get(), 2);
}

#[test]
#[serial]
fn test_errors_are_not_cached() {
    let counter = Counter::default();

    assert!(counter.parse_field("abc").is_err());
    assert!(counter.parse_field("abc").is_err());
    assert_eq!(counter.count.get(), 2);

    assert_eq!(counter.parse_field("-12"), Ok(-12));
    assert_eq!(counter.parse_field("-12"), Ok(-12));
    assert_eq!(counter.count.get(), 3);
}

#[test]
#[serial]
#[should_panic(expected = "cannot be used as a cache key")]
fn test_nan_argument_panics_before_running() {
    let counter = Counter::default();
    counter.scale(f64::NAN);
}

#[test]
#[serial]
fn test_nan_argument_leaves_receiver_untouched() {
    let counter = Counter::default();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        counter.scale(f64::NAN);
    }));

    assert!(outcome.is_err());
    assert_eq!(counter.count.get(), 0);
    assert!(counter.memo.is_empty());
    assert_eq!(counter.scale(0.5), 0.5);
}

#[test]
#[serial]
fn test_recursive_method() {
    let circle = Circle::new(1);

    assert_eq!(circle.fib(50), 12_586_269_025);
    assert_eq!(circle.evaluations.get(), 51);
}

struct Shared {
    evaluations: AtomicU32,
    memo: MemoCache,
}

impl Memoizable for Shared {
    fn memo_cache(&self) -> &MemoCache {
        &self.memo
    }
}

impl Shared {
    #[memoize]
    fn square(&self, n: u64) -> u64 {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        n * n
    }
}

#[test]
#[serial]
fn test_concurrent_calls_agree() {
    let shared = Arc::new(Shared {
        evaluations: AtomicU32::new(0),
        memo: MemoCache::new(),
    });

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || (0..20u64).map(|n| shared.square(n)).sum::<u64>())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), (0..20u64).map(|n| n * n).sum::<u64>());
    }

    // Concurrent misses may each evaluate, but never more than once per thread.
    let evaluations = shared.evaluations.load(Ordering::SeqCst);
    assert!((20..=160).contains(&evaluations));
    assert_eq!(shared.memo.len(), 20);
}
