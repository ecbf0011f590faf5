//! Marker derive for records carrying aliasgen directives.
//!
//! `#[derive(CustomJson)]` generates no code. It registers `customjson` (and `serde`, which the generated impls read
//! through `#[serde(remote = ..)]`) as helper attributes so annotated records compile, and it checks every directive
//! against the grammar so a malformed annotation fails the build at the field instead of at generation time.
//!
//! # Example
//! ```ignore
//! #[derive(CustomJson)]
//! struct Session {
//!     id: u64,
//!     #[customjson = "ttlSecs=$.as_secs();Duration::from_secs($)"]
//!     ttl: Duration,
//! }
//! ```
//!
//! # Other attribute names
//!
//! Records generated with `--attribute NAME` (or `attribute = "NAME"` in `aliasgen.toml`) tell the derive which
//! attribute to check with `#[aliasgen(attribute = "NAME")]`. Helper attributes of a derive are fixed when it is
//! compiled, so only `customjson` is registered here; any other name has to be made inert by the crate using it.

use aliasgen_core::directive::parse_directive;
use aliasgen_core::lang::conventions::DEFAULT_ATTRIBUTE;
use proc_macro::TokenStream;
use syn::{Attribute, Data, DeriveInput, Expr, ExprLit, Fields, Lit, LitStr, Meta, parse_macro_input};

/// Container attribute configuring the derive itself.
const OPTIONS_ATTRIBUTE: &str = "aliasgen";

#[proc_macro_derive(CustomJson, attributes(customjson, serde, aliasgen))]
pub fn derive_custom_json(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match check_record(&input) {
        Ok(()) => TokenStream::new(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Directive attribute name: `customjson` unless overridden by `#[aliasgen(attribute = "..")]`.
fn directive_attribute(attrs: &[Attribute]) -> syn::Result<String> {
    let mut name = DEFAULT_ATTRIBUTE.to_string();
    for attr in attrs.iter().filter(|a| a.path().is_ident(OPTIONS_ATTRIBUTE)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("attribute") {
                let value: LitStr = meta.value()?.parse()?;
                if syn::parse_str::<syn::Ident>(&value.value()).is_err() {
                    return Err(syn::Error::new_spanned(&value, "attribute name must be an identifier"));
                }
                name = value.value();
                Ok(())
            } else {
                Err(meta.error("unknown aliasgen option; expected `attribute = \"NAME\"`"))
            }
        })?;
    }
    Ok(name)
}

fn check_record(input: &DeriveInput) -> syn::Result<()> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "CustomJson can only be derived for structs",
        ));
    };
    let attribute = directive_attribute(&input.attrs)?;

    let mut errors: Option<syn::Error> = None;
    let mut push = |err: syn::Error| match errors.as_mut() {
        Some(all) => all.combine(err),
        None => errors = Some(err),
    };

    for field in &data.fields {
        let mut seen = false;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident(&attribute)) {
            if !matches!(data.fields, Fields::Named(_)) {
                push(syn::Error::new_spanned(attr, "directives need a named field"));
                continue;
            }
            if seen {
                push(syn::Error::new_spanned(
                    attr,
                    format!("duplicate `{attribute}` directive on one field"),
                ));
                continue;
            }
            seen = true;
            if let Err(err) = check_directive(&attr.meta, &attribute) {
                push(err);
            }
        }
    }

    match errors {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn check_directive(meta: &Meta, attribute: &str) -> syn::Result<()> {
    let Meta::NameValue(nv) = meta else {
        return Err(syn::Error::new_spanned(
            meta,
            format!("expected `#[{attribute} = \"KEY=MARSHAL;UNMARSHAL\"]`"),
        ));
    };
    let Expr::Lit(ExprLit { lit: Lit::Str(raw), .. }) = &nv.value else {
        return Err(syn::Error::new_spanned(&nv.value, "directive must be a string literal"));
    };

    let text = raw.value();
    if text.is_empty() {
        return Ok(());
    }
    let directive =
        parse_directive(&text).map_err(|err| syn::Error::new_spanned(raw, format!("invalid directive {text:?}: {err}")))?;
    for (direction, expr) in [("marshal", &directive.marshal), ("unmarshal", &directive.unmarshal)] {
        if expr.trim().is_empty() {
            return Err(syn::Error::new_spanned(raw, format!("the {direction} expression is empty")));
        }
    }
    Ok(())
}
