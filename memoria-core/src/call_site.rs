use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "stats")]
use crate::CacheStats;
#[cfg(feature = "stats")]
use std::sync::Arc;

/// Process-unique identity of a memoized callable.
///
/// Names are not enough to tell callables apart (two types may both have a
/// memoized `load`), so every call site draws a fresh id the first time it is
/// used and embeds it in each cache key it builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(u64);

impl CallableId {
    /// Allocates the next unused id.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        CallableId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct SiteState {
    id: CallableId,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

/// Name and lazily assigned identity of one memoized callable.
///
/// The constructor is `const`, so the attribute macros emit one `static`
/// per memoized function:
///
/// ```
/// use memoria_core::CallSite;
///
/// static SITE: CallSite = CallSite::new("load_profile");
///
/// assert_eq!(SITE.name(), "load_profile");
/// assert_eq!(SITE.id(), SITE.id());
/// ```
///
/// With the `stats` feature the site also owns the callable's
/// [`CacheStats`] and registers them in the
/// [`stats_registry`](crate::stats_registry) under its name on first use.
#[derive(Debug)]
pub struct CallSite {
    name: &'static str,
    state: OnceCell<SiteState>,
}

impl CallSite {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> CallableId {
        self.state().id
    }

    /// Hit/miss counters of this callable.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.state().stats
    }

    fn state(&self) -> &SiteState {
        self.state.get_or_init(|| {
            let id = CallableId::next();
            log::trace!("assigned callable id {} to `{}`", id, self.name);

            #[cfg(feature = "stats")]
            {
                let stats = Arc::new(CacheStats::new());
                crate::stats_registry::register(self.name, Arc::clone(&stats));
                SiteState { id, stats }
            }
            #[cfg(not(feature = "stats"))]
            {
                SiteState { id }
            }
        })
    }

    pub(crate) fn record_hit(&self) {
        #[cfg(feature = "stats")]
        self.stats().record_hit();
        log::trace!("memoize hit: `{}`{}", self.name, self.id());
    }

    pub(crate) fn record_miss(&self) {
        #[cfg(feature = "stats")]
        self.stats().record_miss();
        log::trace!("memoize miss: `{}`{}", self.name, self.id());
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.id())
    }
}
