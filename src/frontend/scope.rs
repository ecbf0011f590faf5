//! Package declarations visible to the type evaluator.
//!
//! A [`PackageScope`] indexes the top-level items of every file in one directory: the declarations an expression in a
//! directive can name without qualification. Only signatures are kept; bodies are never inspected.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use syn::{Fields, FnArg, ImplItem, Item, ReturnType, TraitItem, Type, UseTree};

use super::types;

/// Shape of a struct's fields.
#[derive(Debug, Clone)]
pub enum StructShape {
    Named(Vec<(String, Type)>),
    Tuple(Vec<Type>),
    Unit,
}

impl StructShape {
    fn from_fields(fields: &Fields) -> Self {
        match fields {
            Fields::Named(named) => StructShape::Named(
                named
                    .named
                    .iter()
                    .filter_map(|f| f.ident.as_ref().map(|i| (i.to_string(), f.ty.clone())))
                    .collect(),
            ),
            Fields::Unnamed(unnamed) => StructShape::Tuple(unnamed.unnamed.iter().map(|f| f.ty.clone()).collect()),
            Fields::Unit => StructShape::Unit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub shape: StructShape,
    pub generic: bool,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    /// Variant name → shape of its payload.
    pub variants: HashMap<String, StructShape>,
}

/// Signature of a function or method: whether it takes `self`, and its output (`None` for `()`).
#[derive(Debug, Clone)]
pub struct FnSig {
    pub has_receiver: bool,
    pub output: Option<Type>,
}

impl FnSig {
    fn from_signature(sig: &syn::Signature) -> Self {
        Self {
            has_receiver: matches!(sig.inputs.first(), Some(FnArg::Receiver(_))),
            output: match &sig.output {
                ReturnType::Default => None,
                ReturnType::Type(_, ty) => Some((**ty).clone()),
            },
        }
    }

    /// Output type, with `()` for functions returning nothing.
    pub fn output_type(&self) -> Type {
        self.output.clone().unwrap_or_else(types::unit)
    }
}

/// Declarations of one package.
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    structs: HashMap<String, StructDecl>,
    enums: HashMap<String, EnumDecl>,
    aliases: HashMap<String, Type>,
    traits: HashSet<String>,
    values: HashMap<String, Type>,
    functions: HashMap<String, FnSig>,
    methods: HashMap<(String, String), FnSig>,
    trait_methods: HashMap<String, FnSig>,
    assoc_consts: HashMap<(String, String), Type>,
    imports: HashMap<String, Vec<String>>,
    modules: HashSet<String>,
}

impl PackageScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every file of a package.
    #[tracing::instrument(skip_all)]
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a syn::File>) -> Self {
        let mut scope = Self::new();
        for file in files {
            scope.add_file(file);
        }
        tracing::debug!(
            structs = scope.structs.len(),
            enums = scope.enums.len(),
            methods = scope.methods.len(),
            "package scope built"
        );
        scope
    }

    pub fn add_file(&mut self, file: &syn::File) {
        for item in &file.items {
            self.add_item(item);
        }
    }

    /// Add the declarations of `other` that this scope does not declare itself.
    ///
    /// Imports and module names stay local: they only mean something in the file that wrote them.
    pub fn absorb(&mut self, other: PackageScope) {
        fn fill<K: Eq + Hash, V>(into: &mut HashMap<K, V>, from: HashMap<K, V>) {
            for (key, value) in from {
                into.entry(key).or_insert(value);
            }
        }
        fill(&mut self.structs, other.structs);
        fill(&mut self.enums, other.enums);
        fill(&mut self.aliases, other.aliases);
        fill(&mut self.values, other.values);
        fill(&mut self.functions, other.functions);
        fill(&mut self.methods, other.methods);
        fill(&mut self.trait_methods, other.trait_methods);
        fill(&mut self.assoc_consts, other.assoc_consts);
        self.traits.extend(other.traits);
    }

    fn add_item(&mut self, item: &Item) {
        match item {
            Item::Struct(s) => {
                let name = s.ident.to_string();
                self.structs.insert(
                    name.clone(),
                    StructDecl {
                        name,
                        shape: StructShape::from_fields(&s.fields),
                        generic: !s.generics.params.is_empty(),
                    },
                );
            }
            Item::Enum(e) => {
                let name = e.ident.to_string();
                let variants = e
                    .variants
                    .iter()
                    .map(|v| (v.ident.to_string(), StructShape::from_fields(&v.fields)))
                    .collect();
                self.enums.insert(name.clone(), EnumDecl { name, variants });
            }
            Item::Type(t) => {
                self.aliases.insert(t.ident.to_string(), (*t.ty).clone());
            }
            Item::Trait(t) => {
                self.traits.insert(t.ident.to_string());
                for trait_item in &t.items {
                    if let TraitItem::Fn(f) = trait_item {
                        self.trait_methods
                            .insert(f.sig.ident.to_string(), FnSig::from_signature(&f.sig));
                    }
                }
            }
            Item::Const(c) => {
                self.values.insert(c.ident.to_string(), (*c.ty).clone());
            }
            Item::Static(s) => {
                self.values.insert(s.ident.to_string(), (*s.ty).clone());
            }
            Item::Fn(f) => {
                self.functions.insert(f.sig.ident.to_string(), FnSig::from_signature(&f.sig));
            }
            Item::Impl(imp) => {
                let Some(owner) = types::base_name(&imp.self_ty) else {
                    return;
                };
                for impl_item in &imp.items {
                    match impl_item {
                        ImplItem::Fn(f) => {
                            let key = (owner.clone(), f.sig.ident.to_string());
                            // Inherent methods win over trait impls with the same name.
                            if imp.trait_.is_none() || !self.methods.contains_key(&key) {
                                self.methods.insert(key, FnSig::from_signature(&f.sig));
                            }
                        }
                        ImplItem::Const(c) => {
                            self.assoc_consts
                                .insert((owner.clone(), c.ident.to_string()), c.ty.clone());
                        }
                        _ => {}
                    }
                }
            }
            Item::Use(u) => collect_use(&u.tree, &mut Vec::new(), &mut self.imports),
            Item::Mod(m) => {
                self.modules.insert(m.ident.to_string());
            }
            Item::ExternCrate(c) => {
                let name = c.rename.as_ref().map(|(_, i)| i).unwrap_or(&c.ident);
                self.modules.insert(name.to_string());
            }
            _ => {}
        }
    }

    pub fn struct_decl(&self, name: &str) -> Option<&StructDecl> {
        self.structs.get(name)
    }

    pub fn enum_decl(&self, name: &str) -> Option<&EnumDecl> {
        self.enums.get(name)
    }

    pub fn alias(&self, name: &str) -> Option<&Type> {
        self.aliases.get(name)
    }

    pub fn is_trait(&self, name: &str) -> bool {
        self.traits.contains(name)
    }

    /// Type of a `const` or `static`.
    pub fn value(&self, name: &str) -> Option<&Type> {
        self.values.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FnSig> {
        self.functions.get(name)
    }

    /// Method or associated function `member` declared in an impl block for `owner`.
    pub fn method(&self, owner: &str, member: &str) -> Option<&FnSig> {
        self.methods.get(&(owner.to_string(), member.to_string()))
    }

    /// Method declared by a local trait, for receivers whose impls are not visible.
    pub fn trait_method(&self, member: &str) -> Option<&FnSig> {
        self.trait_methods.get(member)
    }

    pub fn assoc_const(&self, owner: &str, name: &str) -> Option<&Type> {
        self.assoc_consts.get(&(owner.to_string(), name.to_string()))
    }

    /// Full path of an imported name (`["std", "time", "Duration"]` for `Duration`).
    pub fn import(&self, name: &str) -> Option<&[String]> {
        self.imports.get(name).map(Vec::as_slice)
    }

    pub fn is_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    /// Whether `name` names a type declared in the package.
    pub fn is_local_type(&self, name: &str) -> bool {
        self.structs.contains_key(name) || self.enums.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Follow local type aliases until a non-alias type (bounded, so alias cycles terminate).
    pub fn resolve_alias(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        for _ in 0..16 {
            let Some(name) = types::base_name(&current) else {
                break;
            };
            match self.aliases.get(&name) {
                Some(target) if types::type_args(&current).is_empty() => current = target.clone(),
                _ => break,
            }
        }
        current
    }
}

/// Full path of every name a file imports, in declaration order.
pub fn use_paths(file: &syn::File) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    for item in &file.items {
        if let Item::Use(u) = item {
            let mut imports = HashMap::new();
            collect_use(&u.tree, &mut Vec::new(), &mut imports);
            let mut found: Vec<Vec<String>> = imports.into_values().collect();
            found.sort();
            paths.extend(found);
        }
    }
    paths
}

fn collect_use(tree: &UseTree, prefix: &mut Vec<String>, imports: &mut HashMap<String, Vec<String>>) {
    match tree {
        UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            collect_use(&p.tree, prefix, imports);
            prefix.pop();
        }
        UseTree::Name(n) => {
            let name = n.ident.to_string();
            if name == "self" {
                if let Some(last) = prefix.last() {
                    imports.insert(last.clone(), prefix.clone());
                }
            } else {
                let mut path = prefix.clone();
                path.push(name.clone());
                imports.insert(name, path);
            }
        }
        UseTree::Rename(r) => {
            let mut path = prefix.clone();
            path.push(r.ident.to_string());
            let alias = r.rename.to_string();
            if alias != "_" {
                imports.insert(alias, path);
            }
        }
        UseTree::Group(g) => {
            for item in &g.items {
                collect_use(item, prefix, imports);
            }
        }
        UseTree::Glob(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(src: &str) -> PackageScope {
        let file: syn::File = syn::parse_str(src).unwrap();
        PackageScope::from_files([&file])
    }

    #[test]
    fn test_indexes_declarations() {
        let s = scope(
            r#"
            use std::time::{self, Duration as Span, Instant};
            mod nested;
            pub struct Time { secs: i64 }
            pub struct Meters(f64);
            pub enum Level { Low, High(u8) }
            type Timestamp = i64;
            const LIMIT: u32 = 3;
            static NAME: &str = "x";
            fn now() -> Time { Time { secs: 0 } }
            impl Time {
                const EPOCH: i64 = 0;
                fn unix(&self) -> i64 { self.secs }
                fn zero() -> Self { Time { secs: 0 } }
            }
            "#,
        );

        assert!(matches!(s.struct_decl("Time").map(|d| &d.shape), Some(StructShape::Named(f)) if f.len() == 1));
        assert!(matches!(s.struct_decl("Meters").map(|d| &d.shape), Some(StructShape::Tuple(f)) if f.len() == 1));
        assert!(s.enum_decl("Level").unwrap().variants.contains_key("High"));
        assert_eq!(s.value("LIMIT").map(types::canonical).as_deref(), Some("u32"));
        assert_eq!(s.value("NAME").map(types::canonical).as_deref(), Some("&str"));
        assert!(s.function("now").is_some());
        assert!(s.method("Time", "unix").unwrap().has_receiver);
        assert!(!s.method("Time", "zero").unwrap().has_receiver);
        assert_eq!(s.assoc_const("Time", "EPOCH").map(types::canonical).as_deref(), Some("i64"));
        assert_eq!(s.import("Span").unwrap(), ["std", "time", "Duration"]);
        assert_eq!(s.import("time").unwrap(), ["std", "time"]);
        assert_eq!(s.import("Instant").unwrap(), ["std", "time", "Instant"]);
        assert!(s.is_module("nested"));
        assert!(s.is_local_type("Timestamp"));
    }

    #[test]
    fn test_resolve_alias_chain() {
        let s = scope("type A = B; type B = u64; type Loop = Loop;");
        let a = types::parse_type("A").unwrap();
        assert_eq!(types::canonical(&s.resolve_alias(&a)), "u64");
        let looping = types::parse_type("Loop").unwrap();
        assert_eq!(types::canonical(&s.resolve_alias(&looping)), "Loop");
    }

    #[test]
    fn test_absorb_keeps_local_declarations() {
        let mut local = scope("use crate::time::Time; struct Event { at: Time } impl Event { fn id(&self) -> u8 { 0 } }");
        let imported = scope(
            r#"
            use std::fmt::Display as Event;
            struct Time { secs: i64 }
            struct Event { id: u64 }
            impl Time { fn unix(&self) -> i64 { self.secs } }
            impl Event { fn id(&self) -> u64 { 0 } }
            "#,
        );
        local.absorb(imported);

        assert!(local.method("Time", "unix").is_some());
        assert!(matches!(local.struct_decl("Event").map(|d| &d.shape), Some(StructShape::Named(f)) if f[0].0 == "at"));
        let id = local.method("Event", "id").unwrap();
        assert_eq!(id.output.as_ref().map(types::canonical).as_deref(), Some("u8"));
        assert!(local.import("Event").is_none());
    }

    #[test]
    fn test_use_paths_lists_every_import() {
        let file: syn::File = syn::parse_str("use crate::{time::Time, units::{Secs, Millis as Ms}}; use super::Level;").unwrap();
        let paths = use_paths(&file);
        assert_eq!(
            paths,
            [
                vec!["crate", "time", "Time"],
                vec!["crate", "units", "Millis"],
                vec!["crate", "units", "Secs"],
                vec!["super", "Level"],
            ]
        );
    }

    #[test]
    fn test_trait_impl_does_not_shadow_inherent() {
        let s = scope(
            r#"
            struct A;
            impl A { fn name(&self) -> String { String::new() } }
            impl Named for A { fn name(&self) -> &'static str { "a" } }
            trait Named { fn name(&self) -> &'static str; }
            "#,
        );
        let sig = s.method("A", "name").unwrap();
        assert_eq!(sig.output.as_ref().map(types::canonical).as_deref(), Some("String"));
        assert!(s.trait_method("name").is_some());
        assert!(s.is_trait("Named"));
    }
}
