//! # Memoria
//!
//! Memoization through attributes, with two storage strategies:
//!
//! - **Bound**: `#[memoize]` on a `&self` method caches results inside the
//!   receiving object, so every object has its own entries and drops them with
//!   itself.
//! - **Global**: `#[memoize_global]` on a free function caches results in one
//!   map shared by the whole process.
//!
//! ## Features
//!
//! - **Per-object caches**: a [`MemoCache`] field plus a one-line
//!   [`Memoizable`] impl
//! - **Generational invalidation**: [`bound_memoizer::flush`] invalidates
//!   every object at once without visiting any of them
//! - **Item invalidation**: [`bound_memoizer::flush_item`] empties one object
//! - **Global flush**: [`global_memoizer::flush`] swaps the shared map for an
//!   empty one
//! - **Result-aware**: only `Ok` values of `Result` return types are stored
//! - **Fail-fast keys**: arguments that cannot form a stable key (a NaN float)
//!   are rejected before the function runs
//! - **Statistics**: hit/miss counters per function with the `stats` feature
//!
//! The generated code calls into `memoria_core`, so add both crates as
//! dependencies.
//!
//! ## Quick Start
//!
//! ```rust
//! use memoria::{memoize, MemoCache, Memoizable};
//! use std::cell::Cell;
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: Cell<u64>,
//!     memo: MemoCache,
//! }
//!
//! impl Memoizable for Counter {
//!     fn memo_cache(&self) -> &MemoCache {
//!         &self.memo
//!     }
//! }
//!
//! impl Counter {
//!     #[memoize]
//!     fn increment(&self) -> u64 {
//!         self.count.set(self.count.get() + 1);
//!         self.count.get()
//!     }
//! }
//!
//! let counter = Counter::default();
//! assert_eq!(counter.increment(), 1);
//! assert_eq!(counter.increment(), 1);
//!
//! memoria::bound_memoizer::flush_item(&counter);
//! assert_eq!(counter.increment(), 2);
//!
//! memoria::bound_memoizer::flush();
//! assert_eq!(counter.increment(), 3);
//! ```
//!
//! ## Global functions
//!
//! ```rust
//! use memoria::memoize_global;
//!
//! #[memoize_global]
//! fn fibonacci(n: u32) -> u64 {
//!     if n <= 1 {
//!         return n as u64;
//!     }
//!     fibonacci(n - 1) + fibonacci(n - 2)
//! }
//!
//! assert_eq!(fibonacci(80), 23_416_728_348_467_685);
//! memoria::global_memoizer::flush();
//! ```
//!
//! ## Custom argument types
//!
//! Arguments must implement [`CacheableKey`]. Types that already have `Hash`
//! and `Eq` opt in with the [`DefaultCacheableKey`] marker:
//!
//! ```rust
//! use memoria::{memoize_global, DefaultCacheableKey};
//!
//! #[derive(Clone, PartialEq, Eq, Hash)]
//! struct UserId(u64);
//!
//! impl DefaultCacheableKey for UserId {}
//!
//! #[memoize_global]
//! fn display_name(id: UserId) -> String {
//!     format!("user-{}", id.0)
//! }
//!
//! assert_eq!(display_name(UserId(7)), "user-7");
//! ```
//!
//! Keyword-style arguments go through [`Kwargs`], whose key does not depend on
//! insertion order.

pub use memoria_core::*;
pub use memoria_macros::{memoize, memoize_global};
