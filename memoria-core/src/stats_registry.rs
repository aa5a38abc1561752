//! Process-wide lookup of [`CacheStats`] by callable name.
//!
//! Call sites register themselves here the first time they are used, under
//! their name (the function name, or the `name = "..."` given to the attribute
//! macro). Registering a second callable under an existing name replaces the
//! earlier entry.
//!
//! ```
//! use memoria_core::stats_registry;
//!
//! if let Some(stats) = stats_registry::get("load_profile") {
//!     println!("load_profile hit rate: {:.1}%", stats.hit_rate() * 100.0);
//! }
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::CacheStats;

static STATS_REGISTRY: Lazy<RwLock<HashMap<String, Arc<CacheStats>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `stats` under `name`, replacing any previous registration.
///
/// Returns `true` when an earlier registration was replaced.
pub fn register(name: &str, stats: Arc<CacheStats>) -> bool {
    let replaced = STATS_REGISTRY
        .write()
        .insert(name.to_string(), stats)
        .is_some();
    if replaced {
        log::debug!(
            "stats for `{}` replaced by a newer registration under the same name",
            name
        );
    }
    replaced
}

/// Snapshot of the counters registered under `name`.
pub fn get(name: &str) -> Option<CacheStats> {
    STATS_REGISTRY
        .read()
        .get(name)
        .map(|stats| CacheStats::clone(stats))
}

/// Live handle to the counters registered under `name`.
pub fn get_ref(name: &str) -> Option<Arc<CacheStats>> {
    STATS_REGISTRY.read().get(name).cloned()
}

/// Names of every registered callable, in no particular order.
pub fn list() -> Vec<String> {
    STATS_REGISTRY.read().keys().cloned().collect()
}

/// Forgets every registration. The counters themselves keep their values.
pub fn clear() {
    STATS_REGISTRY.write().clear();
}

/// Zeroes the counters registered under `name`; `false` if there are none.
pub fn reset(name: &str) -> bool {
    match STATS_REGISTRY.read().get(name) {
        Some(stats) => {
            stats.reset();
            true
        }
        None => false,
    }
}
