//! Shared utilities for the memoria procedural macros
//!
//! Attribute parsing, signature checks and key generation used by both
//! `#[memoize]` and `#[memoize_global]` in `memoria-macros`.

use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{
    punctuated::Punctuated, Expr, FnArg, GenericArgument, GenericParam, Ident, MetaNameValue, Pat,
    PathArguments, ReturnType, Signature, Token, Type,
};

/// Parsed arguments of a memoize attribute.
#[derive(Debug, Default)]
pub struct MemoizeAttributes {
    /// Name used for the call site and the stats registry instead of the
    /// function name.
    pub custom_name: Option<String>,
}

/// Builds a `compile_error!` pointing at `tokens`.
pub fn error_at<T: ToTokens>(tokens: T, message: &str) -> TokenStream2 {
    syn::Error::new_spanned(tokens, message).to_compile_error()
}

/// Parse the `name` attribute
pub fn parse_name_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) if !s.value().is_empty() => Ok(s.value()),
            syn::Lit::Str(s) => Err(error_at(s, "`name` must not be empty")),
            other => Err(error_at(other, "Invalid literal for `name`: expected string")),
        },
        other => Err(error_at(
            other,
            "Invalid syntax for `name`: expected `name = \"...\"`",
        )),
    }
}

/// Parse memoize attributes from a token stream
pub fn parse_memoize_attributes(attr: TokenStream2) -> Result<MemoizeAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        quote! { compile_error!(#msg) }
    })?;

    let mut attrs = MemoizeAttributes::default();

    for nv in parsed_args {
        if nv.path.is_ident("name") {
            attrs.custom_name = Some(parse_name_attribute(&nv)?);
        } else {
            return Err(error_at(
                &nv.path,
                "Unknown attribute: the only supported argument is `name = \"...\"`",
            ));
        }
    }

    Ok(attrs)
}

/// Rejects signatures a memoized body cannot be wrapped around.
pub fn check_signature(sig: &Signature) -> Result<(), TokenStream2> {
    if let Some(asyncness) = &sig.asyncness {
        return Err(error_at(asyncness, "memoized functions cannot be `async`"));
    }
    if let Some(constness) = &sig.constness {
        return Err(error_at(constness, "memoized functions cannot be `const`"));
    }
    if let Some(variadic) = &sig.variadic {
        return Err(error_at(variadic, "memoized functions cannot be variadic"));
    }
    // One static call site serves every instantiation, so type and const
    // parameters would share entries. Lifetimes are erased and stay allowed.
    if let Some(param) = sig
        .generics
        .params
        .iter()
        .find(|param| !matches!(param, GenericParam::Lifetime(_)))
    {
        return Err(error_at(
            param,
            "memoized functions cannot have type or const parameters; \
             wrap it in a BoundMemoizer/GlobalMemoizer per instantiation",
        ));
    }
    for arg in sig.inputs.iter() {
        if let FnArg::Typed(pat_type) = arg {
            if let Type::ImplTrait(impl_trait) = pat_type.ty.as_ref() {
                return Err(error_at(
                    impl_trait,
                    "memoized functions cannot take `impl Trait` arguments; \
                     wrap it in a BoundMemoizer/GlobalMemoizer per instantiation",
                ));
            }
        }
    }
    Ok(())
}

/// Identifiers of every non-receiver argument, in declaration order.
///
/// Each argument must be bound to a plain identifier so the generated code
/// can build the key from it before the body runs.
pub fn argument_idents(sig: &Signature) -> Result<Vec<Ident>, TokenStream2> {
    let mut idents = Vec::new();
    for arg in sig.inputs.iter() {
        if let FnArg::Typed(pat_type) = arg {
            match pat_type.pat.as_ref() {
                Pat::Ident(pat_ident) if pat_ident.subpat.is_none() => {
                    idents.push(pat_ident.ident.clone());
                }
                other => {
                    return Err(error_at(
                        other,
                        "memoized function arguments must be plain identifiers",
                    ))
                }
            }
        }
    }
    Ok(idents)
}

/// Generate the key expression from the argument identifiers.
///
/// The expression has type `memoria_core::Result<memoria_core::KeyPart>`.
/// Arguments are converted through method autoref, so both owned values and
/// references to [`CacheableKey`] types work.
///
/// [`CacheableKey`]: https://docs.rs/memoria-core/latest/memoria_core/trait.CacheableKey.html
pub fn generate_key_expr(arg_idents: &[Ident]) -> TokenStream2 {
    if arg_idents.is_empty() {
        quote! {
            ::std::result::Result::<::memoria_core::KeyPart, ::memoria_core::MemoizeError>::Ok(
                ::memoria_core::KeyPart::Unit,
            )
        }
    } else {
        quote! {{
            use ::memoria_core::CacheableKey as _;
            ::memoria_core::KeyPart::tuple([#((#arg_idents).to_key_part()),*])
        }}
    }
}

/// The declared return type, `()` when there is none.
pub fn return_type(output: &ReturnType) -> TokenStream2 {
    match output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    }
}

/// Whether the return type is spelled as a `Result<..>`.
///
/// Matches `Result<T, E>`, `std::result::Result<T, E>` and aliases such as
/// `io::Result<T>`: any path whose last segment is `Result` with generic
/// arguments.
pub fn is_result_type(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => is_result_path(ty),
        ReturnType::Default => false,
    }
}

fn is_result_path(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => {
            type_path.path.segments.last().map_or(false, |segment| {
                segment.ident == "Result"
                    && matches!(
                        &segment.arguments,
                        PathArguments::AngleBracketed(args)
                            if args.args.iter().any(|arg| matches!(arg, GenericArgument::Type(_)))
                    )
            })
        }
        Type::Paren(paren) => is_result_path(&paren.elem),
        Type::Group(group) => is_result_path(&group.elem),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_name() {
        let attrs = parse_memoize_attributes(quote! { name = "user_api_v1" }).unwrap();
        assert_eq!(attrs.custom_name.as_deref(), Some("user_api_v1"));
    }

    #[test]
    fn test_parse_empty() {
        let attrs = parse_memoize_attributes(TokenStream2::new()).unwrap();
        assert!(attrs.custom_name.is_none());
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let err = parse_memoize_attributes(quote! { limit = 10 }).unwrap_err();
        assert!(err.to_string().contains("compile_error"));
    }

    #[test]
    fn test_non_string_name_is_rejected() {
        assert!(parse_memoize_attributes(quote! { name = 3 }).is_err());
        assert!(parse_memoize_attributes(quote! { name = "" }).is_err());
    }

    #[test]
    fn test_argument_idents_skip_receiver() {
        let sig: Signature = parse_quote! { fn area(&self, width: u32, mut height: u32) -> u32 };
        let idents = argument_idents(&sig).unwrap();
        let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();
        assert_eq!(names, ["width", "height"]);
    }

    #[test]
    fn test_destructuring_argument_is_rejected() {
        let sig: Signature = parse_quote! { fn sum((a, b): (u32, u32)) -> u32 };
        assert!(argument_idents(&sig).is_err());
    }

    #[test]
    fn test_async_is_rejected() {
        let sig: Signature = parse_quote! { async fn load(id: u32) -> u32 };
        assert!(check_signature(&sig).is_err());

        let sig: Signature = parse_quote! { fn load(id: u32) -> u32 };
        assert!(check_signature(&sig).is_ok());
    }

    #[test]
    fn test_type_and_const_parameters_are_rejected() {
        let sig: Signature = parse_quote! { fn width_of<T: CacheableKey>(x: T) -> usize };
        let err = check_signature(&sig).unwrap_err().to_string();
        assert!(err.contains("per instantiation"));

        let sig: Signature = parse_quote! { fn chunk<const N: usize>(n: u32) -> u32 };
        assert!(check_signature(&sig).is_err());

        let sig: Signature = parse_quote! { fn width_of(x: impl CacheableKey) -> usize };
        assert!(check_signature(&sig).is_err());
    }

    #[test]
    fn test_lifetime_parameters_are_allowed() {
        let sig: Signature = parse_quote! { fn first_word<'a>(text: &'a str) -> String };
        assert!(check_signature(&sig).is_ok());
    }

    #[test]
    fn test_result_detection() {
        let plain: ReturnType = parse_quote! { -> Result<u32, String> };
        let qualified: ReturnType = parse_quote! { -> std::result::Result<u32, String> };
        let alias: ReturnType = parse_quote! { -> io::Result<Vec<u8>> };
        let option: ReturnType = parse_quote! { -> Option<u32> };
        let bare: ReturnType = parse_quote! { -> Result };

        assert!(is_result_type(&plain));
        assert!(is_result_type(&qualified));
        assert!(is_result_type(&alias));
        assert!(!is_result_type(&option));
        assert!(!is_result_type(&bare));
        assert!(!is_result_type(&ReturnType::Default));
    }

    #[test]
    fn test_key_expr_without_arguments_is_unit() {
        let expr = generate_key_expr(&[]).to_string().replace(' ', "");
        assert!(expr.contains("KeyPart::Unit"));
    }

    #[test]
    fn test_key_expr_converts_every_argument() {
        let idents: Vec<Ident> = vec![parse_quote!(width), parse_quote!(height)];
        let expr = generate_key_expr(&idents).to_string().replace(' ', "");
        assert!(expr.contains("(width).to_key_part()"));
        assert!(expr.contains("(height).to_key_part()"));
    }
}
