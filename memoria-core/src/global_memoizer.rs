//! # Process-wide memoization for free functions
//!
//! Every global memoizer stores into the same map, living for the whole
//! process. Entries are told apart by the callable's name and identity inside
//! the key, and [`flush`] empties the map for all of them at once.
//!
//! A stored value counts as a hit whatever it is: `0`, `false` or an empty
//! string are returned from the cache like any other result.
//!
//! ```
//! use memoria_core::global_memoizer::{self, GlobalMemoizer};
//!
//! let square = GlobalMemoizer::new("square", |x: u64| x * x);
//!
//! assert_eq!(square.call(12).unwrap(), 144);
//! assert_eq!(square.call(12).unwrap(), 144);
//!
//! global_memoizer::flush();
//! assert_eq!(square.call(12).unwrap(), 144);
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::{CacheableKey, CallSite, CallableId, KeyPart, Result};

#[cfg(feature = "stats")]
use crate::CacheStats;

/// Key of one entry in the shared map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlobalKey {
    pub name: &'static str,
    pub callable: CallableId,
    pub args: KeyPart,
}

impl GlobalKey {
    pub fn new(site: &CallSite, args: KeyPart) -> Self {
        Self {
            name: site.name(),
            callable: site.id(),
            args,
        }
    }
}

type Storage = HashMap<GlobalKey, Box<dyn Any + Send + Sync>>;

static STORAGE: Lazy<RwLock<Storage>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the value stored under `key`, if there is one of type `R`.
pub fn fetch<R: Clone + 'static>(key: &GlobalKey) -> Option<R> {
    STORAGE.read().get(key)?.downcast_ref::<R>().cloned()
}

/// Stores `value` under `key`, replacing any previous value.
pub fn store<R: Send + Sync + 'static>(key: GlobalKey, value: R) {
    STORAGE.write().insert(key, Box::new(value));
}

/// Discards every entry of every global memoizer.
///
/// The map is swapped for an empty one under a single write lock.
pub fn flush() {
    let discarded = std::mem::take(&mut *STORAGE.write());
    log::debug!(
        "global memoizer storage reset, {} entries discarded",
        discarded.len()
    );
}

/// Same as [`flush`].
pub fn flush_all() {
    flush();
}

/// Number of entries currently stored, across all global memoizers.
pub fn len() -> usize {
    STORAGE.read().len()
}

pub fn is_empty() -> bool {
    len() == 0
}

/// Cache-aside step behind `#[memoize_global]` and [`GlobalMemoizer::call`].
///
/// `compute` runs with no lock held.
pub fn memoize<R, F>(site: &CallSite, args: Result<KeyPart>, compute: F) -> Result<R>
where
    R: Clone + Send + Sync + 'static,
    F: FnOnce() -> R,
{
    let key = GlobalKey::new(site, args?);

    if let Some(hit) = fetch::<R>(&key) {
        site.record_hit();
        return Ok(hit);
    }

    site.record_miss();
    let value = compute();
    store(key, value.clone());
    Ok(value)
}

/// Like [`memoize`] for fallible functions: only `Ok` values are stored.
pub fn try_memoize<V, E, F>(
    site: &CallSite,
    args: Result<KeyPart>,
    compute: F,
) -> Result<std::result::Result<V, E>>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> std::result::Result<V, E>,
{
    let key = GlobalKey::new(site, args?);

    if let Some(hit) = fetch::<V>(&key) {
        site.record_hit();
        return Ok(Ok(hit));
    }

    site.record_miss();
    let outcome = compute();
    if let Ok(value) = &outcome {
        store(key, value.clone());
    }
    Ok(outcome)
}

/// A free function wrapped with process-wide memoization.
///
/// `A` is the whole argument list as one [`CacheableKey`] value; see
/// [`BoundMemoizer`](crate::BoundMemoizer) for the conventions.
pub struct GlobalMemoizer<A, R> {
    site: CallSite,
    function: Box<dyn Fn(A) -> R + Send + Sync>,
}

impl<A, R> GlobalMemoizer<A, R> {
    pub fn new<F>(name: &'static str, function: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self {
            site: CallSite::new(name),
            function: Box::new(function),
        }
    }

    pub fn name(&self) -> &'static str {
        self.site.name()
    }

    pub fn id(&self) -> CallableId {
        self.site.id()
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        self.site.stats()
    }
}

impl<A, R> GlobalMemoizer<A, R>
where
    A: CacheableKey,
    R: Clone + Send + Sync + 'static,
{
    pub fn call(&self, args: A) -> Result<R> {
        let key = args.to_key_part();
        memoize(&self.site, key, || (self.function)(args))
    }
}

impl<A, V, E> GlobalMemoizer<A, std::result::Result<V, E>>
where
    A: CacheableKey,
    V: Clone + Send + Sync + 'static,
{
    /// Calls a fallible function, caching only `Ok` results.
    pub fn try_call(&self, args: A) -> Result<std::result::Result<V, E>> {
        let key = args.to_key_part();
        try_memoize(&self.site, key, || (self.function)(args))
    }
}

impl<A, R> fmt::Debug for GlobalMemoizer<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalMemoizer")
            .field("site", &self.site)
            .finish_non_exhaustive()
    }
}
