use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn};

use memoria_macro_utils::{
    argument_idents, check_signature, error_at, generate_key_expr, is_result_type,
    parse_memoize_attributes, return_type, MemoizeAttributes,
};

/// Which memoizer the expansion calls into.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Bound,
    Global,
}

fn parse_attributes(attr: TokenStream) -> Result<MemoizeAttributes, TokenStream2> {
    parse_memoize_attributes(attr.into())
}

/// Checks the receiver against the target memoizer.
///
/// Bound methods must take exactly `&self`; global functions must not take a
/// receiver at all.
fn check_receiver(input: &ItemFn, target: Target) -> Result<(), TokenStream2> {
    let sig = &input.sig;
    let receiver = sig.inputs.iter().find_map(|arg| match arg {
        FnArg::Receiver(receiver) => Some(receiver),
        FnArg::Typed(_) => None,
    });

    match (target, receiver) {
        (Target::Bound, None) => Err(error_at(
            &sig.ident,
            "#[memoize] needs a `&self` receiver; use #[memoize_global] for free functions",
        )),
        (Target::Bound, Some(receiver)) if receiver.colon_token.is_some() => Err(error_at(
            receiver,
            "#[memoize] only supports a plain `&self` receiver",
        )),
        (Target::Bound, Some(receiver)) if receiver.reference.is_none() => Err(error_at(
            receiver,
            "#[memoize] cannot take `self` by value: the memo cache lives in the receiver",
        )),
        (Target::Bound, Some(receiver)) if receiver.mutability.is_some() => Err(error_at(
            receiver,
            "#[memoize] cannot be used with `&mut self`",
        )),
        (Target::Bound, Some(_)) => Ok(()),
        (Target::Global, Some(receiver)) => Err(error_at(
            receiver,
            "#[memoize_global] does not take a receiver; use #[memoize] for `&self` methods",
        )),
        (Target::Global, None) => Ok(()),
    }
}

/// Generate the call into `memoria_core` that replaces the function body
fn generate_memoized_body(
    input: &ItemFn,
    target: Target,
    name: &str,
) -> Result<TokenStream2, TokenStream2> {
    let sig = &input.sig;
    let block = &input.block;
    let ret_type = return_type(&sig.output);
    let key_expr = generate_key_expr(&argument_idents(sig)?);

    let entry = match (target, is_result_type(&sig.output)) {
        (Target::Bound, false) => quote! { ::memoria_core::bound_memoizer::memoize },
        (Target::Bound, true) => quote! { ::memoria_core::bound_memoizer::try_memoize },
        (Target::Global, false) => quote! { ::memoria_core::global_memoizer::memoize },
        (Target::Global, true) => quote! { ::memoria_core::global_memoizer::try_memoize },
    };
    let receiver = match target {
        Target::Bound => quote! { self, },
        Target::Global => quote! {},
    };

    Ok(quote! {
        static __MEMOIZE_SITE: ::memoria_core::CallSite = ::memoria_core::CallSite::new(#name);

        let __memoize_key = #key_expr;
        match #entry(#receiver &__MEMOIZE_SITE, __memoize_key, || -> #ret_type #block) {
            ::std::result::Result::Ok(__memoize_value) => __memoize_value,
            ::std::result::Result::Err(__memoize_err) => ::std::panic!("{}", __memoize_err),
        }
    })
}

fn expand(attr: TokenStream, item: TokenStream, target: Target) -> TokenStream {
    let attrs = match parse_attributes(attr) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };

    let input = parse_macro_input!(item as ItemFn);

    if let Err(err) = check_signature(&input.sig).and_then(|_| check_receiver(&input, target)) {
        return err.into();
    }

    // Use custom name if provided, otherwise use function name
    let name = attrs
        .custom_name
        .unwrap_or_else(|| input.sig.ident.to_string());

    let body = match generate_memoized_body(&input, target, &name) {
        Ok(body) => body,
        Err(err) => return err.into(),
    };

    let fn_attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;

    let expanded = quote! {
        #(#fn_attrs)*
        #vis #sig {
            #body
        }
    };

    TokenStream::from(expanded)
}

/// A procedural macro that memoizes a `&self` method inside its receiver.
///
/// Results are stored in the receiver's [`MemoCache`], reached through the
/// `Memoizable` trait, keyed by the method identity, every argument after
/// `self` and the current flush generation. Each object therefore has its own
/// entries, and dropping the object drops them.
///
/// # Invalidation
///
/// - `bound_memoizer::flush_item(&obj)` drops every entry of `obj`.
/// - `bound_memoizer::flush()` invalidates the entries of every object at once.
///
/// # Arguments
///
/// Every argument must implement `CacheableKey` (directly or through
/// `DefaultCacheableKey`) and be bound to a plain identifier. An argument that
/// cannot be turned into a key, such as a NaN float, makes the method panic
/// with an `UnhashableArgument` message before the body runs.
///
/// # Return values
///
/// The return type must be `Clone + Send + Sync + 'static`. When it is a
/// `Result<T, E>` only `Ok` values are stored; errors are returned and the
/// next call runs the body again.
///
/// # Attributes
///
/// - `name = "..."`: name used in stats and log output instead of the method
///   name.
///
/// # Examples
///
/// ```ignore
/// use memoria::{memoize, MemoCache, Memoizable};
///
/// struct Report {
///     rows: Vec<u64>,
///     memo: MemoCache,
/// }
///
/// impl Memoizable for Report {
///     fn memo_cache(&self) -> &MemoCache {
///         &self.memo
///     }
/// }
///
/// impl Report {
///     #[memoize]
///     fn total(&self) -> u64 {
///         self.rows.iter().sum()
///     }
///
///     #[memoize(name = "report_top")]
///     fn top(&self, n: usize) -> Vec<u64> {
///         let mut rows = self.rows.clone();
///         rows.sort_unstable_by(|a, b| b.cmp(a));
///         rows.truncate(n);
///         rows
///     }
/// }
/// ```
///
/// # Compile errors
///
/// Free functions, `&mut self`, by-value `self`, `async fn`, destructuring
/// argument patterns and unknown attribute arguments are rejected. Use
/// [`macro@memoize_global`] for free functions.
///
/// Type and const parameters (including `impl Trait` arguments) are rejected
/// as well: the expansion holds one `static` call site, which every
/// instantiation would share. Build one `BoundMemoizer` or `GlobalMemoizer`
/// per instantiation instead.
///
/// [`MemoCache`]: https://docs.rs/memoria-core/latest/memoria_core/struct.MemoCache.html
#[proc_macro_attribute]
pub fn memoize(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item, Target::Bound)
}

/// A procedural macro that memoizes a free function in one process-wide map.
///
/// All functions annotated with `#[memoize_global]` share a single map; entries
/// are told apart by the function's identity and arguments.
/// `global_memoizer::flush()` empties it for every function at once.
///
/// Any stored value is a hit, including `0`, `false` or an empty collection.
/// `Result` return types cache only `Ok` values, as with [`macro@memoize`].
/// Generic functions are rejected for the same reason as with
/// [`macro@memoize`].
///
/// # Examples
///
/// ```ignore
/// use memoria::memoize_global;
///
/// #[memoize_global]
/// fn fibonacci(n: u32) -> u64 {
///     if n <= 1 {
///         return n as u64;
///     }
///     fibonacci(n - 1) + fibonacci(n - 2)
/// }
///
/// #[memoize_global(name = "config_v2")]
/// fn load_config(path: &str) -> Result<String, String> {
///     std::fs::read_to_string(path).map_err(|e| e.to_string())
/// }
/// ```
#[proc_macro_attribute]
pub fn memoize_global(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item, Target::Global)
}
