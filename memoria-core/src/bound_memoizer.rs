//! # Receiver-bound memoization
//!
//! Memoizes methods whose first argument is a receiver. Results are stored on
//! the receiver itself, in the [`MemoCache`] its type exposes through
//! [`Memoizable`], so two objects never see each other's entries and an
//! object's cache is dropped together with the object.
//!
//! Keys are `(generation, callable id, arguments)`. The generation is one
//! process-wide counter shared by every bound memoizer: [`flush`] bumps it,
//! which makes every entry stored so far unreachable in O(1). Stale entries are
//! not deleted; they stay allocated until their receiver is dropped or
//! [`flush_item`] is called on it.
//!
//! ```
//! use memoria_core::bound_memoizer::{self, BoundMemoizer};
//! use memoria_core::{MemoCache, Memoizable};
//! use std::cell::Cell;
//!
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
//! let increment = BoundMemoizer::new("Counter::increment", |counter: &Counter, _: ()| {
//!     counter.count.set(counter.count.get() + 1);
//!     counter.count.get()
//! });
//!
//! let counter = Counter { count: Cell::new(0), memo: MemoCache::new() };
//! assert_eq!(increment.call(&counter, ()).unwrap(), 1);
//! assert_eq!(increment.call(&counter, ()).unwrap(), 1);
//!
//! bound_memoizer::flush_item(&counter);
//! assert_eq!(increment.call(&counter, ()).unwrap(), 2);
//! ```

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{CacheableKey, CallSite, CallableId, KeyPart, MemoizeError, Result};

#[cfg(feature = "stats")]
use crate::CacheStats;

static GENERATION: AtomicU64 = AtomicU64::new(0);

/// Current value of the shared generation counter. Starts at 0.
pub fn generation() -> u64 {
    GENERATION.load(Ordering::SeqCst)
}

/// Invalidates every bound-memoized entry on every receiver.
///
/// Bumps the shared generation; nothing is removed.
pub fn flush() {
    let current = GENERATION.fetch_add(1, Ordering::SeqCst) + 1;
    log::debug!("bound memoizer generation advanced to {}", current);
}

/// Same as [`flush`].
pub fn flush_all() {
    flush();
}

/// Drops every entry cached on `receiver`, for all of its memoized methods.
///
/// Other receivers are untouched.
pub fn flush_item<T: Memoizable + ?Sized>(receiver: &T) {
    let discarded = receiver.memo_cache().reset();
    log::debug!("flushed {} memoized entries from one receiver", discarded);
}

/// Key of one entry in a [`MemoCache`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoundKey {
    pub generation: u64,
    pub callable: CallableId,
    pub args: KeyPart,
}

type Entries = HashMap<BoundKey, Box<dyn Any + Send + Sync>>;

/// Per-object storage for bound-memoized results.
///
/// Declare one as a field and return it from [`Memoizable::memo_cache`]. The
/// inner map is only allocated by the first memoized call on the object.
///
/// The cache is not part of its owner's value: every `MemoCache` compares
/// equal to every other and hashes to nothing, so owners can still derive
/// `PartialEq`, `Eq` and `Hash`. Cloning yields an empty cache because the
/// clone is a different receiver.
pub struct MemoCache {
    entries: RwLock<Option<Entries>>,
}

impl MemoCache {
    pub const fn new() -> Self {
        Self {
            entries: parking_lot::const_rwlock(None),
        }
    }

    /// Number of stored entries, including ones orphaned by [`flush`].
    pub fn len(&self) -> usize {
        self.entries.read().as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a memoized call has allocated the map yet.
    pub fn is_initialized(&self) -> bool {
        self.entries.read().is_some()
    }

    fn ensure(&self) {
        if self.entries.read().is_none() {
            self.entries.write().get_or_insert_with(HashMap::new);
        }
    }

    fn fetch<R: Clone + 'static>(&self, key: &BoundKey) -> Option<R> {
        let entries = self.entries.read();
        entries.as_ref()?.get(key)?.downcast_ref::<R>().cloned()
    }

    fn store<R: Send + Sync + 'static>(&self, key: BoundKey, value: R) {
        self.entries
            .write()
            .get_or_insert_with(HashMap::new)
            .insert(key, Box::new(value));
    }

    /// Swaps in a fresh map and returns how many entries were dropped.
    fn reset(&self) -> usize {
        let previous = self.entries.write().replace(HashMap::new());
        previous.map_or(0, |entries| entries.len())
    }
}

impl Default for MemoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoCache {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl PartialEq for MemoCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for MemoCache {}

impl Hash for MemoCache {
    fn hash<H: Hasher>(&self, _state: &mut H) {}
}

impl fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Receivers that carry their own [`MemoCache`].
pub trait Memoizable {
    fn memo_cache(&self) -> &MemoCache;
}

/// A bare cache is its own receiver, which covers type-level ("class")
/// methods: keep a `static MemoCache` and memoize against it.
impl Memoizable for MemoCache {
    fn memo_cache(&self) -> &MemoCache {
        self
    }
}

impl<T: Memoizable + ?Sized> Memoizable for Arc<T> {
    fn memo_cache(&self) -> &MemoCache {
        (**self).memo_cache()
    }
}

impl<T: Memoizable + ?Sized> Memoizable for Box<T> {
    fn memo_cache(&self) -> &MemoCache {
        (**self).memo_cache()
    }
}

fn current_key(site: &CallSite, args: KeyPart) -> BoundKey {
    BoundKey {
        generation: generation(),
        callable: site.id(),
        args,
    }
}

/// Cache-aside step behind `#[memoize]` and [`BoundMemoizer::call`].
///
/// `args` is the already converted argument list (usually from
/// [`KeyPart::tuple`]); a conversion error is returned before `compute` runs.
/// On a miss `compute` is called with no lock held, so it may recurse into
/// memoized methods of the same receiver.
pub fn memoize<T, R, F>(
    receiver: &T,
    site: &CallSite,
    args: Result<KeyPart>,
    compute: F,
) -> Result<R>
where
    T: Memoizable + ?Sized,
    R: Clone + Send + Sync + 'static,
    F: FnOnce() -> R,
{
    let cache = receiver.memo_cache();
    cache.ensure();
    let key = current_key(site, args?);

    if let Some(hit) = cache.fetch::<R>(&key) {
        site.record_hit();
        return Ok(hit);
    }

    site.record_miss();
    let value = compute();
    cache.store(key, value.clone());
    Ok(value)
}

/// Like [`memoize`] for fallible callables: only `Ok` values are stored.
pub fn try_memoize<T, V, E, F>(
    receiver: &T,
    site: &CallSite,
    args: Result<KeyPart>,
    compute: F,
) -> Result<std::result::Result<V, E>>
where
    T: Memoizable + ?Sized,
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> std::result::Result<V, E>,
{
    let cache = receiver.memo_cache();
    cache.ensure();
    let key = current_key(site, args?);

    if let Some(hit) = cache.fetch::<V>(&key) {
        site.record_hit();
        return Ok(Ok(hit));
    }

    site.record_miss();
    let outcome = compute();
    if let Ok(value) = &outcome {
        cache.store(key, value.clone());
    }
    Ok(outcome)
}

/// A method wrapped with per-receiver memoization.
///
/// `A` is everything after the receiver, as one [`CacheableKey`] value: use a
/// tuple for several positional arguments and put a
/// [`Kwargs`](crate::Kwargs) in it for keyword arguments.
pub struct BoundMemoizer<T: ?Sized, A, R> {
    site: CallSite,
    function: Box<dyn Fn(&T, A) -> R + Send + Sync>,
}

impl<T: ?Sized, A, R> BoundMemoizer<T, A, R> {
    pub fn new<F>(name: &'static str, function: F) -> Self
    where
        F: Fn(&T, A) -> R + Send + Sync + 'static,
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

    /// Partially applies the receiver, so later calls only pass arguments.
    pub fn bind<'a>(&'a self, receiver: &'a T) -> BoundMethod<'a, T, A, R> {
        BoundMethod {
            memoizer: self,
            receiver,
        }
    }
}

impl<T, A, R> BoundMemoizer<T, A, R>
where
    T: Memoizable + ?Sized,
    A: CacheableKey,
    R: Clone + Send + Sync + 'static,
{
    pub fn call(&self, receiver: &T, args: A) -> Result<R> {
        let key = args.to_key_part();
        memoize(receiver, &self.site, key, || (self.function)(receiver, args))
    }

    /// Dynamic entry point where the receiver may be missing.
    ///
    /// # Errors
    ///
    /// [`MemoizeError::Configuration`] when `receiver` is `None`: a callable
    /// without a receiver belongs in a
    /// [`GlobalMemoizer`](crate::GlobalMemoizer).
    pub fn invoke(&self, receiver: Option<&T>, args: A) -> Result<R> {
        let receiver = receiver.ok_or_else(|| MemoizeError::Configuration {
            callable: self.site.to_string(),
        })?;
        self.call(receiver, args)
    }
}

impl<T, A, V, E> BoundMemoizer<T, A, std::result::Result<V, E>>
where
    T: Memoizable + ?Sized,
    A: CacheableKey,
    V: Clone + Send + Sync + 'static,
{
    /// Calls a fallible method, caching only `Ok` results.
    pub fn try_call(&self, receiver: &T, args: A) -> Result<std::result::Result<V, E>> {
        let key = args.to_key_part();
        try_memoize(receiver, &self.site, key, || (self.function)(receiver, args))
    }
}

impl<T: ?Sized, A, R> fmt::Debug for BoundMemoizer<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMemoizer")
            .field("site", &self.site)
            .finish_non_exhaustive()
    }
}

/// A [`BoundMemoizer`] with its receiver already supplied.
pub struct BoundMethod<'a, T: ?Sized, A, R> {
    memoizer: &'a BoundMemoizer<T, A, R>,
    receiver: &'a T,
}

impl<'a, T: ?Sized, A, R> BoundMethod<'a, T, A, R> {
    pub fn receiver(&self) -> &'a T {
        self.receiver
    }
}

impl<'a, T, A, R> BoundMethod<'a, T, A, R>
where
    T: Memoizable + ?Sized,
    A: CacheableKey,
    R: Clone + Send + Sync + 'static,
{
    pub fn call(&self, args: A) -> Result<R> {
        self.memoizer.call(self.receiver, args)
    }
}

impl<'a, T: ?Sized, A, R> Clone for BoundMethod<'a, T, A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: ?Sized, A, R> Copy for BoundMethod<'a, T, A, R> {}
