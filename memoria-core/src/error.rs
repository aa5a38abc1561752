/// Errors raised while building a cache key or dispatching a memoized call.
///
/// Failures of the wrapped callable itself are not represented here: a
/// `Result::Err` it returns is handed back to the caller untouched (and never
/// cached), and a panic unwinds through the memoizer before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoizeError {
    /// A receiver-bound memoizer was invoked without a receiver.
    #[error(
        "no receiver was passed to memoized callable `{callable}`; \
         if this is an unbound function, use the global memoizer instead"
    )]
    Configuration { callable: String },

    /// An argument has no stable equality/hash and cannot take part in a key.
    #[error("argument of type `{type_name}` cannot be used as a cache key: {reason}")]
    UnhashableArgument {
        type_name: &'static str,
        reason: String,
    },
}

impl MemoizeError {
    /// Builds a [`MemoizeError::UnhashableArgument`] for the type `T`.
    ///
    /// Intended for hand-written [`CacheableKey`](crate::CacheableKey) impls
    /// that need to reject some values of their type.
    pub fn unhashable<T: ?Sized>(reason: impl Into<String>) -> Self {
        MemoizeError::UnhashableArgument {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoizeError>;
