//! # Memoria Core
//!
//! Runtime support for the `memoria` memoization attributes.
//!
//! Two memoizers are provided:
//!
//! - [`bound_memoizer`] caches method results inside the receiving object.
//!   Entries are invalidated per object with
//!   [`flush_item`](bound_memoizer::flush_item), or for every object at once by
//!   bumping a process-wide generation with [`flush`](bound_memoizer::flush).
//! - [`global_memoizer`] caches free-function results in one process-wide map
//!   that [`flush`](global_memoizer::flush) replaces wholesale.
//!
//! Both build their keys from [`KeyPart`] values produced by the
//! [`CacheableKey`] trait. Arguments that cannot be turned into a stable key
//! (a NaN float, for instance) fail with
//! [`MemoizeError::UnhashableArgument`] before the function runs.
//!
//! ## Module Organization
//!
//! - [`bound_memoizer`] - per-object caches and the generation counter
//! - [`global_memoizer`] - the shared map for free functions
//! - `keys` - key conversion traits and [`Kwargs`]
//! - `call_site` - identity and counters of one memoized callable
//! - [`stats_registry`] - lookup of hit/miss counters by name (`stats` feature)
//!
mod call_site;
mod error;
mod keys;

pub mod bound_memoizer;
pub mod global_memoizer;

#[cfg(feature = "stats")]
mod stats;

#[cfg(feature = "stats")]
pub mod stats_registry;

pub use bound_memoizer::{BoundKey, BoundMemoizer, BoundMethod, MemoCache, Memoizable};
pub use call_site::{CallSite, CallableId};
pub use error::{MemoizeError, Result};
pub use global_memoizer::{GlobalKey, GlobalMemoizer};
pub use keys::{
    ByAddress, CacheableKey, DefaultCacheableKey, KeyPart, Kwargs, OpaqueKey, UnorderedParts,
};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
