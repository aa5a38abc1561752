use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{MemoizeError, Result};

/// One argument's contribution to a cache key.
///
/// Arguments are lowered into this tree by [`CacheableKey::to_key_part`]. Two
/// arguments are cache-equivalent exactly when their key parts compare equal,
/// so the `Eq`/`Hash` impls here define what a cache hit means.
///
/// Integers of every width share the `Int` variant, so `1u8` and `1i64` produce
/// the same part. Floats are stored by their bit pattern after folding `-0.0`
/// into `0.0`; NaN is rejected during conversion.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Unit,
    Bool(bool),
    Int(i128),
    Float(u64),
    Char(char),
    Str(String),
    Opt(Option<Box<KeyPart>>),
    Seq(Vec<KeyPart>),
    Unordered(UnorderedParts),
    Opaque(OpaqueKey),
}

impl KeyPart {
    /// Collects already converted argument parts into a positional tuple.
    ///
    /// The first conversion error is returned as is.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoria_core::{CacheableKey, KeyPart};
    ///
    /// let part = KeyPart::tuple([1u32.to_key_part(), "x".to_key_part()]).unwrap();
    /// assert_eq!(part, (1u32, "x".to_string()).to_key_part().unwrap());
    ///
    /// assert!(KeyPart::tuple([1u32.to_key_part(), f64::NAN.to_key_part()]).is_err());
    /// ```
    pub fn tuple<I>(parts: I) -> Result<KeyPart>
    where
        I: IntoIterator<Item = Result<KeyPart>>,
    {
        parts
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .map(KeyPart::Seq)
    }
}

/// Key parts compared as a set: insertion order is ignored.
///
/// Built from set-like sources (`HashSet`, `HashMap` entries) whose items are
/// already unique, which is what the equality check relies on.
#[derive(Clone, Debug)]
pub struct UnorderedParts(Vec<KeyPart>);

impl UnorderedParts {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for UnorderedParts {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|part| other.0.contains(part))
    }
}

impl Eq for UnorderedParts {}

impl Hash for UnorderedParts {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent: sum of per-item hashes from a fixed-key hasher.
        let combined = self.0.iter().fold(0u64, |acc, part| {
            let mut hasher = DefaultHasher::new();
            part.hash(&mut hasher);
            acc.wrapping_add(hasher.finish())
        });
        state.write_usize(self.0.len());
        state.write_u64(combined);
    }
}

trait ErasedKey: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn ErasedKey) -> bool;
    fn hash_erased(&self, state: &mut dyn Hasher);
    fn type_name(&self) -> &'static str;
}

impl<T> ErasedKey for T
where
    T: Hash + Eq + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| other == self)
    }

    fn hash_erased(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A user value kept as-is inside a key and compared with its own `Eq`/`Hash`.
///
/// Values of different types never compare equal, even if they hash alike.
#[derive(Clone)]
pub struct OpaqueKey(Arc<dyn ErasedKey>);

impl OpaqueKey {
    pub fn new<T>(value: T) -> Self
    where
        T: Hash + Eq + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }
}

impl PartialEq for OpaqueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_erased(&*other.0)
    }
}

impl Eq for OpaqueKey {}

impl Hash for OpaqueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_erased(state);
    }
}

impl fmt::Debug for OpaqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueKey<{}>", self.0.type_name())
    }
}

/// Types that can take part in a cache key.
///
/// Implemented for the primitive and collection types of the standard library.
/// Conversion is fallible: a value without a stable equality (a NaN float, or
/// whatever a custom impl decides to reject) returns
/// [`MemoizeError::UnhashableArgument`] and the memoized call fails fast.
///
/// # Examples
///
/// ```
/// use memoria_core::{CacheableKey, KeyPart, MemoizeError, Result};
///
/// struct Temperature(f64);
///
/// impl CacheableKey for Temperature {
///     fn to_key_part(&self) -> Result<KeyPart> {
///         if self.0 < -273.15 {
///             return Err(MemoizeError::unhashable::<Self>("below absolute zero"));
///         }
///         self.0.to_key_part()
///     }
/// }
///
/// assert!(Temperature(21.5).to_key_part().is_ok());
/// assert!(Temperature(-300.0).to_key_part().is_err());
/// ```
pub trait CacheableKey {
    fn to_key_part(&self) -> Result<KeyPart>;
}

/// Marker for user types that are keyed by their own `Hash + Eq` impls.
///
/// Implementing this empty trait is enough to pass a type as a memoized
/// argument. Implement [`CacheableKey`] directly instead when only part of the
/// value should count, but not both.
///
/// ```
/// use memoria_core::{CacheableKey, DefaultCacheableKey};
///
/// #[derive(Clone, PartialEq, Eq, Hash)]
/// struct UserId(u64);
///
/// impl DefaultCacheableKey for UserId {}
///
/// assert_eq!(UserId(7).to_key_part().unwrap(), UserId(7).to_key_part().unwrap());
/// ```
pub trait DefaultCacheableKey: Hash + Eq + Clone + Send + Sync + 'static {}

impl<T: DefaultCacheableKey> CacheableKey for T {
    fn to_key_part(&self) -> Result<KeyPart> {
        Ok(KeyPart::Opaque(OpaqueKey::new(self.clone())))
    }
}

macro_rules! impl_int_key {
    ($($t:ty),*) => {
        $(
            impl CacheableKey for $t {
                #[inline]
                fn to_key_part(&self) -> Result<KeyPart> {
                    Ok(KeyPart::Int(*self as i128))
                }
            }
        )*
    };
}

impl_int_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

fn float_key_part(value: f64, type_name: &'static str) -> Result<KeyPart> {
    if value.is_nan() {
        return Err(MemoizeError::UnhashableArgument {
            type_name,
            reason: "NaN is not equal to itself".to_string(),
        });
    }
    let canonical = if value == 0.0 { 0.0 } else { value };
    Ok(KeyPart::Float(canonical.to_bits()))
}

impl CacheableKey for f64 {
    fn to_key_part(&self) -> Result<KeyPart> {
        float_key_part(*self, "f64")
    }
}

impl CacheableKey for f32 {
    fn to_key_part(&self) -> Result<KeyPart> {
        float_key_part(f64::from(*self), "f32")
    }
}

impl CacheableKey for () {
    fn to_key_part(&self) -> Result<KeyPart> {
        Ok(KeyPart::Unit)
    }
}

impl CacheableKey for bool {
    fn to_key_part(&self) -> Result<KeyPart> {
        Ok(KeyPart::Bool(*self))
    }
}

impl CacheableKey for char {
    fn to_key_part(&self) -> Result<KeyPart> {
        Ok(KeyPart::Char(*self))
    }
}

impl CacheableKey for str {
    fn to_key_part(&self) -> Result<KeyPart> {
        Ok(KeyPart::Str(self.to_string()))
    }
}

impl CacheableKey for String {
    fn to_key_part(&self) -> Result<KeyPart> {
        Ok(KeyPart::Str(self.clone()))
    }
}

impl<T: CacheableKey> CacheableKey for Option<T> {
    fn to_key_part(&self) -> Result<KeyPart> {
        match self {
            Some(value) => Ok(KeyPart::Opt(Some(Box::new(value.to_key_part()?)))),
            None => Ok(KeyPart::Opt(None)),
        }
    }
}

impl<T: CacheableKey> CacheableKey for [T] {
    fn to_key_part(&self) -> Result<KeyPart> {
        KeyPart::tuple(self.iter().map(CacheableKey::to_key_part))
    }
}

impl<T: CacheableKey, const N: usize> CacheableKey for [T; N] {
    fn to_key_part(&self) -> Result<KeyPart> {
        self.as_slice().to_key_part()
    }
}

impl<T: CacheableKey> CacheableKey for Vec<T> {
    fn to_key_part(&self) -> Result<KeyPart> {
        self.as_slice().to_key_part()
    }
}

impl<T: CacheableKey + ?Sized> CacheableKey for Arc<T> {
    fn to_key_part(&self) -> Result<KeyPart> {
        (**self).to_key_part()
    }
}

impl<T: CacheableKey + ?Sized> CacheableKey for Rc<T> {
    fn to_key_part(&self) -> Result<KeyPart> {
        (**self).to_key_part()
    }
}

impl<T: CacheableKey> CacheableKey for BTreeSet<T> {
    fn to_key_part(&self) -> Result<KeyPart> {
        KeyPart::tuple(self.iter().map(CacheableKey::to_key_part))
    }
}

impl<K: CacheableKey, V: CacheableKey> CacheableKey for BTreeMap<K, V> {
    fn to_key_part(&self) -> Result<KeyPart> {
        KeyPart::tuple(
            self.iter()
                .map(|(k, v)| Ok(KeyPart::Seq(vec![k.to_key_part()?, v.to_key_part()?]))),
        )
    }
}

impl<T: CacheableKey, S> CacheableKey for HashSet<T, S> {
    fn to_key_part(&self) -> Result<KeyPart> {
        let parts = self
            .iter()
            .map(CacheableKey::to_key_part)
            .collect::<Result<Vec<_>>>()?;
        Ok(KeyPart::Unordered(UnorderedParts::new(parts)))
    }
}

impl<K: CacheableKey, V: CacheableKey, S> CacheableKey for HashMap<K, V, S> {
    fn to_key_part(&self) -> Result<KeyPart> {
        let parts = self
            .iter()
            .map(|(k, v)| Ok(KeyPart::Seq(vec![k.to_key_part()?, v.to_key_part()?])))
            .collect::<Result<Vec<_>>>()?;
        Ok(KeyPart::Unordered(UnorderedParts::new(parts)))
    }
}

macro_rules! impl_tuple_key {
    ($($name:ident),+) => {
        impl<$($name: CacheableKey),+> CacheableKey for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_key_part(&self) -> Result<KeyPart> {
                let ($($name,)+) = self;
                Ok(KeyPart::Seq(vec![$($name.to_key_part()?),+]))
            }
        }
    };
}

impl_tuple_key!(A);
impl_tuple_key!(A, B);
impl_tuple_key!(A, B, C);
impl_tuple_key!(A, B, C, D);
impl_tuple_key!(A, B, C, D, E);
impl_tuple_key!(A, B, C, D, E, F);
impl_tuple_key!(A, B, C, D, E, F, G);
impl_tuple_key!(A, B, C, D, E, F, G, H);

/// Keyword arguments of a memoized call.
///
/// Items are kept sorted by name, so the order in which they were supplied
/// never changes the resulting key: `a=1, b=2` and `b=2, a=1` hit the same
/// cache entry. Pass it as one of the arguments, e.g. `(id, Kwargs<i64>)`.
///
/// ```
/// use memoria_core::{CacheableKey, Kwargs};
///
/// let first = Kwargs::new().with("a", 1).with("b", 2);
/// let second = Kwargs::new().with("b", 2).with("a", 1);
/// assert_eq!(first.to_key_part().unwrap(), second.to_key_part().unwrap());
/// assert_eq!(first.get("b"), Some(&2));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kwargs<V> {
    items: BTreeMap<String, V>,
}

impl<V> Kwargs<V> {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: V) -> Self {
        self.items.insert(name.into(), value);
        self
    }

    /// Sets `name`, returning the value it previously held.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        self.items.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.items.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for Kwargs<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Kwargs<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<V: CacheableKey> CacheableKey for Kwargs<V> {
    fn to_key_part(&self) -> Result<KeyPart> {
        KeyPart::tuple(self.items.iter().map(|(name, value)| {
            Ok(KeyPart::Seq(vec![
                KeyPart::Str(name.clone()),
                value.to_key_part()?,
            ]))
        }))
    }
}

/// An already-lowered key is its own key part.
///
/// Lets `Kwargs<KeyPart>` carry values of different types:
///
/// ```
/// use memoria_core::{CacheableKey, KeyPart, Kwargs};
///
/// let kwargs: Kwargs<KeyPart> = Kwargs::new()
///     .with("limit", 10u32.to_key_part().unwrap())
///     .with("tag", "recent".to_key_part().unwrap());
/// assert!(kwargs.to_key_part().is_ok());
/// ```
impl CacheableKey for KeyPart {
    fn to_key_part(&self) -> Result<KeyPart> {
        Ok(self.clone())
    }
}

/// Keys a shared value by its allocation instead of its contents.
///
/// Two `Arc`s pointing at equal values are different keys unless they share
/// the allocation. The key holds a clone of the `Arc`, so the address cannot
/// be reused by another value while an entry refers to it.
///
/// ```
/// use std::sync::Arc;
/// use memoria_core::{ByAddress, CacheableKey};
///
/// let shared = Arc::new(vec![1, 2, 3]);
/// let same = ByAddress(Arc::clone(&shared)).to_key_part().unwrap();
/// assert_eq!(same, ByAddress(shared).to_key_part().unwrap());
/// assert_ne!(same, ByAddress(Arc::new(vec![1, 2, 3])).to_key_part().unwrap());
/// ```
#[derive(Debug)]
pub struct ByAddress<P>(pub P);

impl<T: ?Sized> ByAddress<Arc<T>> {
    fn address(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl<T: ?Sized> Clone for ByAddress<Arc<T>> {
    fn clone(&self) -> Self {
        ByAddress(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ByAddress<Arc<T>> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.address(), other.address())
    }
}

impl<T: ?Sized> Eq for ByAddress<Arc<T>> {}

impl<T: ?Sized> Hash for ByAddress<Arc<T>> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.address() as usize).hash(state);
    }
}

impl<T: ?Sized> From<Arc<T>> for ByAddress<Arc<T>> {
    fn from(shared: Arc<T>) -> Self {
        ByAddress(shared)
    }
}

impl<T: ?Sized + Send + Sync + 'static> DefaultCacheableKey for ByAddress<Arc<T>> {}
