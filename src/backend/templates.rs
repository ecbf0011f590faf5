//! Render the encode and decode impls for one record.
//!
//! Both impls follow a fixed shape:
//!
//! ```text
//! impl Serialize for R {
//!     fn serialize(..) {
//!         #[serde(remote = "R")] struct Alias { ..R's fields.. }
//!         struct Wire<'a> { #[serde(flatten, with = "Alias")] alias: &'a R, alias_<field>: <wire type>, .. }
//!         Wire { alias: self, alias_<field>: <marshal>, .. }.serialize(serializer)
//!     }
//! }
//! ```
//!
//! `Alias` re-derives serde for the record's own shape, so the generated impl never calls itself. The decode impl
//! mirrors this with an owned `alias: R`, then assigns every unmarshal expression onto the decoded value.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Expr, ItemImpl, LitStr, Type};
use thiserror::Error;

use crate::frontend::record::{AliasDirective, RecordDescriptor};
use aliasgen_core::lang::conventions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Encode => write!(f, "marshal"),
            Direction::Decode => write!(f, "unmarshal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("record `{record}` has no aliases to generate")]
    NoAliases { record: String },

    #[error("inferred type `{ty}` for field `{field}` is not a valid Rust type: {message}")]
    AliasType { field: String, ty: String, message: String },

    #[error("{direction} expression `{expr}` for field `{field}` is not a valid Rust expression: {message}")]
    Expression {
        field: String,
        direction: Direction,
        expr: String,
        message: String,
    },

    #[error("rendered {part} impl does not parse: {message}")]
    Syntax { part: &'static str, message: String },
}

/// The two impls generated for a record.
#[derive(Debug, Clone)]
pub struct RenderedImpls {
    pub encode: ItemImpl,
    pub decode: ItemImpl,
}

/// One alias with its pieces parsed into tokens.
struct PreparedAlias {
    field: syn::Ident,
    wire_field: syn::Ident,
    key: LitStr,
    ty: Type,
    marshal: Expr,
    unmarshal: Expr,
}

impl PreparedAlias {
    fn new(alias: &AliasDirective) -> Result<Self, GenerateError> {
        let field = alias.field.to_string();
        let ty = syn::parse_str::<Type>(&alias.wire_type).map_err(|e| GenerateError::AliasType {
            field: field.clone(),
            ty: alias.wire_type.clone(),
            message: e.to_string(),
        })?;
        let parse_expr = |direction: Direction, text: &str| {
            syn::parse_str::<Expr>(text).map_err(|e| GenerateError::Expression {
                field: field.clone(),
                direction,
                expr: text.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Self {
            marshal: parse_expr(Direction::Encode, &alias.marshal)?,
            unmarshal: parse_expr(Direction::Decode, &alias.unmarshal)?,
            field: alias.field.clone(),
            wire_field: alias.wire_field(),
            key: LitStr::new(&alias.key, proc_macro2::Span::call_site()),
            ty,
        })
    }
}

/// Render both impls for `record`.
#[tracing::instrument(skip_all, fields(record = %record.ident, aliases = record.aliases.len()))]
pub fn render(record: &RecordDescriptor) -> Result<RenderedImpls, GenerateError> {
    if record.aliases.is_empty() {
        return Err(GenerateError::NoAliases { record: record.name() });
    }
    let aliases = record
        .aliases
        .iter()
        .map(PreparedAlias::new)
        .collect::<Result<Vec<_>, _>>()?;

    let encode = parse_impl("encode", encode_tokens(record, &aliases))?;
    let decode = parse_impl("decode", decode_tokens(record, &aliases))?;
    Ok(RenderedImpls { encode, decode })
}

fn parse_impl(part: &'static str, tokens: TokenStream) -> Result<ItemImpl, GenerateError> {
    syn::parse2(tokens).map_err(|e| GenerateError::Syntax {
        part,
        message: e.to_string(),
    })
}

/// `struct Alias` with the record's serde shape, deriving `derive`.
fn alias_struct(record: &RecordDescriptor, derive: TokenStream) -> TokenStream {
    let remote = LitStr::new(&record.ident.to_string(), record.ident.span());
    let container_attrs = &record.serde_attrs;
    let fields = record.fields.iter().map(|f| {
        let attrs = &f.serde_attrs;
        let ident = &f.ident;
        let ty = &f.ty;
        quote! { #(#attrs)* #ident: #ty }
    });
    quote! {
        #[derive(#derive)]
        #[serde(remote = #remote)]
        #(#container_attrs)*
        #[allow(dead_code)]
        struct Alias {
            #(#fields,)*
        }
    }
}

fn wire_fields(aliases: &[PreparedAlias]) -> Vec<TokenStream> {
    aliases
        .iter()
        .map(|a| {
            let (key, wire_field, ty) = (&a.key, &a.wire_field, &a.ty);
            quote! {
                #[serde(rename = #key)]
                #wire_field: #ty
            }
        })
        .collect()
}

fn encode_tokens(record: &RecordDescriptor, aliases: &[PreparedAlias]) -> TokenStream {
    let name = &record.ident;
    let alias = alias_struct(record, quote!(::serde::Serialize));
    let fields = wire_fields(aliases);
    let inits = aliases.iter().map(|a| {
        let (wire_field, marshal) = (&a.wire_field, &a.marshal);
        quote! { #wire_field: #marshal }
    });

    quote! {
        impl ::serde::Serialize for #name {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                #alias

                #[derive(::serde::Serialize)]
                struct Wire<'a> {
                    #[serde(flatten, with = "Alias")]
                    alias: &'a #name,
                    #(#fields,)*
                }

                ::serde::Serialize::serialize(
                    &Wire {
                        alias: self,
                        #(#inits,)*
                    },
                    serializer,
                )
            }
        }
    }
}

fn decode_tokens(record: &RecordDescriptor, aliases: &[PreparedAlias]) -> TokenStream {
    let name = &record.ident;
    let alias = alias_struct(record, quote!(::serde::Deserialize));
    let fields = wire_fields(aliases);
    let wire = format_ident!("{}", conventions::WIRE_BINDING);
    let receiver = format_ident!("{}", conventions::DECODE_RECEIVER);
    let assigns = aliases.iter().map(|a| {
        let (field, unmarshal) = (&a.field, &a.unmarshal);
        quote! { #receiver.#field = #unmarshal; }
    });

    quote! {
        impl<'de> ::serde::Deserialize<'de> for #name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                #alias

                #[derive(::serde::Deserialize)]
                struct Wire {
                    #[serde(flatten, with = "Alias")]
                    alias: #name,
                    #(#fields,)*
                }

                let #wire = <Wire as ::serde::Deserialize>::deserialize(deserializer)?;
                let mut #receiver = #wire.alias;
                #(#assigns)*
                ::core::result::Result::Ok(#receiver)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::diagnostics::Position;
    use crate::frontend::record::ShapeField;
    use quote::ToTokens;
    use std::path::PathBuf;

    fn alias(field: &str, key: &str, ty: &str, marshal: &str, unmarshal: &str) -> AliasDirective {
        AliasDirective {
            field: format_ident!("{}", field),
            key: key.to_string(),
            wire_type: ty.to_string(),
            marshal: marshal.to_string(),
            unmarshal: unmarshal.to_string(),
            position: Position::file_start("m.rs"),
        }
    }

    fn record(aliases: Vec<AliasDirective>) -> RecordDescriptor {
        RecordDescriptor {
            ident: format_ident!("Event"),
            dir: PathBuf::from("."),
            source: PathBuf::from("m.rs"),
            position: Position::file_start("m.rs"),
            serde_attrs: vec![syn::parse_quote!(#[serde(rename_all = "camelCase")])],
            fields: vec![ShapeField {
                ident: format_ident!("T"),
                ty: syn::parse_quote!(Time),
                serde_attrs: vec![syn::parse_quote!(#[serde(skip)])],
            }],
            aliases,
        }
    }

    fn text(item: &ItemImpl) -> String {
        prettyplease::unparse(&syn::File {
            shebang: None,
            attrs: Vec::new(),
            items: vec![syn::Item::Impl(item.clone())],
        })
    }

    #[test]
    fn test_render_spec_example() {
        let rec = record(vec![alias(
            "T",
            "createTime",
            "i64",
            "self.T.Unix()",
            "time.Unix(wire.alias_T, 0)",
        )]);
        let impls = render(&rec).unwrap();
        let encode = text(&impls.encode);
        let decode = text(&impls.decode);

        assert!(encode.contains("impl ::serde::Serialize for Event"), "{encode}");
        assert!(encode.contains("alias_T: self.T.Unix()"), "{encode}");
        assert!(encode.contains("alias_T: i64"), "{encode}");
        assert!(encode.contains("#[serde(rename = \"createTime\")]"), "{encode}");
        assert!(encode.contains("#[serde(remote = \"Event\")]"), "{encode}");
        assert!(decode.contains("impl<'de> ::serde::Deserialize<'de> for Event"), "{decode}");
        assert!(decode.contains("v.T = time.Unix(wire.alias_T, 0);"), "{decode}");
    }

    #[test]
    fn test_alias_struct_carries_serde_shape() {
        let rec = record(vec![alias("T", "t", "i64", "1", "x")]);
        let impls = render(&rec).unwrap();
        let encode = impls.encode.to_token_stream().to_string();
        assert!(encode.contains("rename_all"));
        assert!(encode.contains("skip"));
    }

    #[test]
    fn test_wire_fields_follow_alias_order() {
        let rec = record(vec![
            alias("c", "c", "u8", "1u8", "x"),
            alias("a", "a", "u8", "1u8", "x"),
            alias("b", "b", "u8", "1u8", "x"),
        ]);
        let encode = text(&render(&rec).unwrap().encode);
        let pos = |name: &str| encode.find(&format!("{name}: u8")).unwrap();
        assert!(pos("alias_c") < pos("alias_a"));
        assert!(pos("alias_a") < pos("alias_b"));
    }

    #[test]
    fn test_contract_violations() {
        assert!(matches!(render(&record(Vec::new())), Err(GenerateError::NoAliases { .. })));
        assert!(matches!(
            render(&record(vec![alias("T", "k", "Vec<", "1", "x")])),
            Err(GenerateError::AliasType { .. })
        ));
        assert!(matches!(
            render(&record(vec![alias("T", "k", "u8", "self.T.(", "x")])),
            Err(GenerateError::Expression {
                direction: Direction::Encode,
                ..
            })
        ));
        assert!(matches!(
            render(&record(vec![alias("T", "k", "u8", "1", "")])),
            Err(GenerateError::Expression {
                direction: Direction::Decode,
                ..
            })
        ));
    }
}
