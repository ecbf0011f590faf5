//! Canonical type text and small type helpers.
//!
//! Inferred wire types are carried as text (`Option<String>`, `Vec<(u8, char)>`); [`canonical`] is the single printer
//! producing that text so equal types always compare equal as strings.

use quote::ToTokens;
use syn::visit_mut::{self, VisitMut};
use syn::{GenericArgument, PathArguments, ReturnType, Type, TypePath};

/// Print `ty` in canonical form.
pub fn canonical(ty: &Type) -> String {
    match ty {
        Type::Path(TypePath { qself: None, path }) => path_text(path),
        Type::Reference(r) => {
            let mut out = String::from("&");
            if let Some(lt) = &r.lifetime {
                out.push_str(&format!("'{} ", lt.ident));
            }
            if r.mutability.is_some() {
                out.push_str("mut ");
            }
            out.push_str(&canonical(&r.elem));
            out
        }
        Type::Tuple(t) => match t.elems.len() {
            0 => "()".to_string(),
            1 => format!("({},)", canonical(&t.elems[0])),
            _ => format!("({})", t.elems.iter().map(canonical).collect::<Vec<_>>().join(", ")),
        },
        Type::Array(a) => format!("[{}; {}]", canonical(&a.elem), compact(a.len.to_token_stream())),
        Type::Slice(s) => format!("[{}]", canonical(&s.elem)),
        Type::Paren(p) => canonical(&p.elem),
        Type::Group(g) => canonical(&g.elem),
        Type::Ptr(p) => {
            let qualifier = if p.mutability.is_some() { "mut" } else { "const" };
            format!("*{qualifier} {}", canonical(&p.elem))
        }
        Type::Never(_) => "!".to_string(),
        Type::Infer(_) => "_".to_string(),
        other => compact(other.to_token_stream()),
    }
}

fn path_text(path: &syn::Path) -> String {
    let mut out = String::new();
    if path.leading_colon.is_some() {
        out.push_str("::");
    }
    for (i, seg) in path.segments.iter().enumerate() {
        if i > 0 {
            out.push_str("::");
        }
        out.push_str(&seg.ident.to_string());
        match &seg.arguments {
            PathArguments::None => {}
            PathArguments::AngleBracketed(args) => {
                let parts: Vec<String> = args.args.iter().map(generic_arg_text).collect();
                out.push('<');
                out.push_str(&parts.join(", "));
                out.push('>');
            }
            PathArguments::Parenthesized(args) => {
                let inputs: Vec<String> = args.inputs.iter().map(canonical).collect();
                out.push_str(&format!("({})", inputs.join(", ")));
                if let ReturnType::Type(_, ty) = &args.output {
                    out.push_str(&format!(" -> {}", canonical(ty)));
                }
            }
        }
    }
    out
}

fn generic_arg_text(arg: &GenericArgument) -> String {
    match arg {
        GenericArgument::Lifetime(lt) => format!("'{}", lt.ident),
        GenericArgument::Type(ty) => canonical(ty),
        GenericArgument::AssocType(assoc) => format!("{} = {}", assoc.ident, canonical(&assoc.ty)),
        other => compact(other.to_token_stream()),
    }
}

/// Token text without the spacing `TokenStream::to_string` inserts around punctuation.
fn compact(tokens: proc_macro2::TokenStream) -> String {
    let text = tokens.to_string();
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev = out.chars().last();
            let next = chars.get(i + 1).copied();
            let tight_after = matches!(prev, Some('<' | '(' | '[' | '&' | ':' | '\''));
            let tight_before = matches!(next, Some('<' | '>' | ')' | ']' | ',' | ':' | '(' | ';'));
            if tight_after || tight_before {
                continue;
            }
        }
        out.push(c);
    }
    out.replace(";", "; ").replace(",", ", ").replace("  ", " ")
}

/// Parse type text produced by [`canonical`] or written in configuration.
pub fn parse_type(text: &str) -> syn::Result<Type> {
    syn::parse_str(text)
}

/// Last path segment of `ty` (`Duration` for `std::time::Duration`), looking through parentheses.
pub fn base_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(TypePath { qself: None, path }) => path.segments.last().map(|s| s.ident.to_string()),
        Type::Paren(p) => base_name(&p.elem),
        Type::Group(g) => base_name(&g.elem),
        _ => None,
    }
}

/// Type arguments of the last path segment (`[K, V]` for `HashMap<K, V>`).
pub fn type_args(ty: &Type) -> Vec<Type> {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return Vec::new();
    };
    let Some(last) = path.segments.last() else {
        return Vec::new();
    };
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return Vec::new();
    };
    args.args
        .iter()
        .filter_map(|a| match a {
            GenericArgument::Type(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

/// Remove every layer of `&`/`&mut`.
pub fn strip_references(ty: &Type) -> &Type {
    match ty {
        Type::Reference(r) => strip_references(&r.elem),
        Type::Paren(p) => strip_references(&p.elem),
        Type::Group(g) => strip_references(&g.elem),
        other => other,
    }
}

pub fn is_reference(ty: &Type) -> bool {
    match ty {
        Type::Reference(_) => true,
        Type::Paren(p) => is_reference(&p.elem),
        Type::Group(g) => is_reference(&g.elem),
        _ => false,
    }
}

pub fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(t) if t.elems.is_empty())
}

/// Whether `_` appears anywhere in `ty`.
pub fn contains_infer(ty: &Type) -> bool {
    struct Finder(bool);
    impl<'ast> syn::visit::Visit<'ast> for Finder {
        fn visit_type_infer(&mut self, _: &'ast syn::TypeInfer) {
            self.0 = true;
        }
    }
    let mut finder = Finder(false);
    syn::visit::Visit::visit_type(&mut finder, ty);
    finder.0
}

pub fn unit() -> Type {
    Type::Tuple(syn::TypeTuple {
        paren_token: Default::default(),
        elems: Default::default(),
    })
}

/// Build `Name<args..>` (or `Name` when `args` is empty).
pub fn generic(name: &str, args: &[Type]) -> Type {
    let ident = syn::Ident::new(name, proc_macro2::Span::call_site());
    if args.is_empty() {
        syn::parse_quote!(#ident)
    } else {
        syn::parse_quote!(#ident<#(#args),*>)
    }
}

/// Build `&T` (or `&mut T`).
pub fn reference(inner: Type, mutable: bool) -> Type {
    if mutable {
        syn::parse_quote!(&mut #inner)
    } else {
        syn::parse_quote!(&#inner)
    }
}

/// Replace `Self` (alone or as a path prefix) with `receiver`.
pub fn replace_self(ty: &Type, receiver: &Type) -> Type {
    struct Replacer<'a>(&'a Type);
    impl VisitMut for Replacer<'_> {
        fn visit_type_mut(&mut self, ty: &mut Type) {
            if let Type::Path(TypePath { qself: None, path }) = ty {
                if path.leading_colon.is_none() && path.segments.len() == 1 && path.segments[0].ident == "Self" {
                    *ty = self.0.clone();
                    return;
                }
            }
            visit_mut::visit_type_mut(self, ty);
        }
    }
    let mut out = ty.clone();
    Replacer(receiver).visit_type_mut(&mut out);
    out
}
