//! Static type evaluation of directive expressions.
//!
//! The generator never runs user code; it only needs the *type* of each marshal expression so the wire field can be
//! declared. [`TypeResolver`] is that capability. [`StaticResolver`] implements it over a [`PackageScope`] plus a
//! [`SignatureTable`] for everything the package does not declare itself.
//!
//! ## Notes
//! - Method lookup order: package impls, configured signatures, generic std containers (`Option`, `Result`, `Vec`,
//!   maps, smart pointers), the built-in registry, then methods of local traits.
//! - `Self` in any looked-up output is replaced by the receiver type.
//! - Call arguments are evaluated so unresolved names are reported, but an argument whose form is unsupported (a
//!   closure, a block) does not fail the call.

use std::collections::HashMap;

use aliasgen_core::lang::signatures;
use quote::ToTokens;
use syn::{BinOp, Expr, ExprPath, Lit, Member, Type, UnOp};
use thiserror::Error;

use super::scope::{PackageScope, StructShape};
use super::types;

/// Result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Evaluated {
    /// The expression denotes a value of this type.
    Value(Type),
    /// The expression names a module.
    Module(String),
    /// The expression names a type (not a value of it).
    TypeName(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("expression does not parse: {0}")]
    Parse(String),

    #[error("cannot resolve `{0}`")]
    UnresolvedName(String),

    #[error("cannot resolve function `{0}`")]
    UnresolvedFunction(String),

    #[error("type `{ty}` has no field `{field}`")]
    UnknownField { ty: String, field: String },

    #[error("no method `{method}` known for type `{ty}`")]
    UnknownMethod { ty: String, method: String },

    #[error("`{0}` is not a value")]
    NotAValue(String),

    #[error("unsupported expression: {0}")]
    Unsupported(String),
}

/// Infers the static type of expression text.
pub trait TypeResolver {
    fn eval(&self, expr: &str) -> Result<Evaluated, EvalError>;
}

impl<F> TypeResolver for F
where
    F: Fn(&str) -> Result<Evaluated, EvalError>,
{
    fn eval(&self, expr: &str) -> Result<Evaluated, EvalError> {
        self(expr)
    }
}

// ============================================================================
// Signature table
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature key is empty")]
    EmptyKey,

    #[error("signature `{key}` has an invalid output type `{output}`: {message}")]
    InvalidOutput { key: String, output: String, message: String },
}

/// Extra signatures supplied by configuration.
///
/// Keys are `Type::member` (method, associated function or constant of `Type`, module prefixes ignored) or a bare
/// `function` name. Values are output type text.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    members: HashMap<(String, String), Type>,
    functions: HashMap<String, Type>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, SignatureError> {
        let mut table = Self::new();
        for (key, output) in entries {
            table.insert(key, output)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, key: &str, output: &str) -> Result<(), SignatureError> {
        let segments: Vec<&str> = key.split("::").map(str::trim).filter(|s| !s.is_empty()).collect();
        let ty = types::parse_type(output).map_err(|e| SignatureError::InvalidOutput {
            key: key.to_string(),
            output: output.to_string(),
            message: e.to_string(),
        })?;
        match segments.as_slice() {
            [] => return Err(SignatureError::EmptyKey),
            [function] => {
                self.functions.insert(function.to_string(), ty);
            }
            [.., owner, member] => {
                self.members.insert((owner.to_string(), member.to_string()), ty);
            }
        }
        Ok(())
    }

    pub fn member(&self, owner: &str, member: &str) -> Option<&Type> {
        self.members.get(&(owner.to_string(), member.to_string()))
    }

    pub fn function(&self, name: &str) -> Option<&Type> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.members.len() + self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Static resolver
// ============================================================================

/// Names of std types usable without an import.
const PRELUDE_TYPES: &[&str] = &[
    "bool", "char", "str", "String", "Option", "Result", "Vec", "Box", "i8", "i16", "i32", "i64", "i128", "isize",
    "u8", "u16", "u32", "u64", "u128", "usize", "f32", "f64",
];

/// Roots that always name modules.
const MODULE_ROOTS: &[&str] = &["std", "core", "alloc", "crate", "super", "self"];

/// What a path prefix names.
#[derive(Debug, Clone)]
enum PathKind {
    Module(String),
    Type(Type),
}

/// Expression type inference over one package.
pub struct StaticResolver<'a> {
    scope: &'a PackageScope,
    signatures: &'a SignatureTable,
}

impl<'a> StaticResolver<'a> {
    pub fn new(scope: &'a PackageScope, signatures: &'a SignatureTable) -> Self {
        Self { scope, signatures }
    }

    fn type_of(&self, expr: &Expr) -> Result<Evaluated, EvalError> {
        match expr {
            Expr::Lit(lit) => Ok(Evaluated::Value(literal_type(&lit.lit)?)),
            Expr::Path(path) => self.path_value(path),
            Expr::Paren(p) => self.type_of(&p.expr),
            Expr::Group(g) => self.type_of(&g.expr),
            Expr::Field(f) => {
                let base = self.value_of(&f.base)?;
                self.field_type(&base, &f.member).map(Evaluated::Value)
            }
            Expr::MethodCall(call) => {
                let receiver = self.value_of(&call.receiver)?;
                let args = self.eval_args(call.args.iter())?;
                self.method_output(&receiver, &call.method.to_string(), &args)
                    .map(Evaluated::Value)
            }
            Expr::Call(call) => {
                let args = self.eval_args(call.args.iter())?;
                self.call_output(&call.func, &args).map(Evaluated::Value)
            }
            Expr::Struct(s) => {
                if s.qself.is_some() {
                    return Err(unsupported(expr));
                }
                self.struct_literal_type(&s.path).map(Evaluated::Value)
            }
            Expr::Cast(c) => {
                self.value_of(&c.expr)?;
                Ok(Evaluated::Value((*c.ty).clone()))
            }
            Expr::Reference(r) => {
                let inner = self.value_of(&r.expr)?;
                Ok(Evaluated::Value(types::reference(inner, r.mutability.is_some())))
            }
            Expr::Unary(u) => {
                let inner = self.value_of(&u.expr)?;
                match u.op {
                    UnOp::Deref(_) => self.deref(&inner).ok_or_else(|| unsupported(expr)).map(Evaluated::Value),
                    _ => Ok(Evaluated::Value(inner)),
                }
            }
            Expr::Binary(b) => self.binary_type(b).map(Evaluated::Value),
            Expr::Try(t) => {
                let inner = self.value_of(&t.expr)?;
                let resolved = self.scope.resolve_alias(types::strip_references(&inner));
                match (types::base_name(&resolved).as_deref(), types::type_args(&resolved).as_slice()) {
                    (Some("Option"), [t]) | (Some("Result"), [t, ..]) => Ok(Evaluated::Value(t.clone())),
                    _ => Err(unsupported(expr)),
                }
            }
            Expr::Index(i) => {
                let base = self.value_of(&i.expr)?;
                if matches!(&*i.index, Expr::Range(_)) {
                    return Err(unsupported(expr));
                }
                self.value_of(&i.index)?;
                self.index_type(&base).ok_or_else(|| unsupported(expr)).map(Evaluated::Value)
            }
            Expr::Tuple(t) => {
                let elems = t.elems.iter().map(|e| self.value_of(e)).collect::<Result<Vec<_>, _>>()?;
                let ty: Type = if elems.is_empty() {
                    types::unit()
                } else {
                    syn::parse_quote!((#(#elems,)*))
                };
                Ok(Evaluated::Value(ty))
            }
            Expr::Array(a) => {
                let mut elems = a.elems.iter();
                let Some(first) = elems.next() else {
                    return Err(unsupported(expr));
                };
                let elem = self.value_of(first)?;
                for rest in elems {
                    self.value_of(rest)?;
                }
                let len = proc_macro2::Literal::usize_unsuffixed(a.elems.len());
                Ok(Evaluated::Value(syn::parse_quote!([#elem; #len])))
            }
            Expr::Repeat(r) => {
                let elem = self.value_of(&r.expr)?;
                let len = &r.len;
                Ok(Evaluated::Value(syn::parse_quote!([#elem; #len])))
            }
            Expr::Macro(m) => self.macro_type(&m.mac).map(Evaluated::Value),
            _ => Err(unsupported(expr)),
        }
    }

    /// Evaluate `expr`, requiring a value.
    fn value_of(&self, expr: &Expr) -> Result<Type, EvalError> {
        match self.type_of(expr)? {
            Evaluated::Value(ty) => Ok(ty),
            Evaluated::Module(name) | Evaluated::TypeName(name) => Err(EvalError::NotAValue(name)),
        }
    }

    /// Evaluate call arguments, tolerating unsupported forms.
    fn eval_args<'e>(&self, args: impl Iterator<Item = &'e Expr>) -> Result<Vec<Option<Type>>, EvalError> {
        args.map(|arg| match self.type_of(arg) {
            Ok(Evaluated::Value(ty)) => Ok(Some(ty)),
            Ok(_) | Err(EvalError::Unsupported(_)) => Ok(None),
            Err(err) => Err(err),
        })
        .collect()
    }

    // ------------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------------

    fn path_value(&self, expr: &ExprPath) -> Result<Evaluated, EvalError> {
        if expr.qself.is_some() {
            return Err(EvalError::Unsupported(compact_tokens(expr)));
        }
        let segments: Vec<String> = expr.path.segments.iter().map(|s| s.ident.to_string()).collect();
        let full = segments.join("::");

        let [prefix @ .., last] = segments.as_slice() else {
            return Err(EvalError::UnresolvedName(full));
        };

        if prefix.is_empty() {
            return self.single_name(last);
        }

        match self.classify(&expr.path, prefix.len())? {
            PathKind::Type(owner) => self.type_member(&owner, last, &full),
            PathKind::Module(module) => {
                if is_type_like(last) {
                    match self.scope.struct_decl(last) {
                        Some(decl) if matches!(decl.shape, StructShape::Unit) => {
                            Ok(Evaluated::Value(types::generic(last, &[])))
                        }
                        _ => Ok(Evaluated::TypeName(full)),
                    }
                } else if is_const_like(last) {
                    self.signatures
                        .member(module.rsplit("::").next().unwrap_or(module.as_str()), last)
                        .or_else(|| self.local_value(&module, last))
                        .cloned()
                        .map(Evaluated::Value)
                        .ok_or(EvalError::UnresolvedName(full))
                } else {
                    Ok(Evaluated::Module(full))
                }
            }
        }
    }

    fn local_value(&self, module: &str, name: &str) -> Option<&Type> {
        if matches!(module, "crate" | "self" | "super") {
            self.scope.value(name)
        } else {
            None
        }
    }

    fn single_name(&self, name: &str) -> Result<Evaluated, EvalError> {
        if let Some(ty) = self.scope.value(name) {
            return Ok(Evaluated::Value(ty.clone()));
        }
        if let Some(ty) = self.signatures.function(name).filter(|_| is_const_like(name)) {
            return Ok(Evaluated::Value(ty.clone()));
        }
        if let Some(decl) = self.scope.struct_decl(name) {
            return Ok(match decl.shape {
                StructShape::Unit => Evaluated::Value(types::generic(name, &[])),
                _ => Evaluated::TypeName(name.to_string()),
            });
        }
        if self.scope.is_local_type(name) || self.scope.is_trait(name) || PRELUDE_TYPES.contains(&name) {
            return Ok(Evaluated::TypeName(name.to_string()));
        }
        if self.scope.function(name).is_some() {
            return Err(EvalError::Unsupported(format!("function item `{name}`")));
        }
        if self.scope.is_module(name) || MODULE_ROOTS.contains(&name) {
            return Ok(Evaluated::Module(name.to_string()));
        }
        if let Some(path) = self.scope.import(name) {
            return Ok(if is_type_like(name) {
                Evaluated::TypeName(path.join("::"))
            } else {
                Evaluated::Module(path.join("::"))
            });
        }
        Err(EvalError::UnresolvedName(name.to_string()))
    }

    /// Classify the first `len` segments of `path`.
    fn classify(&self, path: &syn::Path, len: usize) -> Result<PathKind, EvalError> {
        let segments: Vec<&syn::PathSegment> = path.segments.iter().take(len).collect();
        let names: Vec<String> = segments.iter().map(|s| s.ident.to_string()).collect();
        let Some(first) = names.first() else {
            return Err(EvalError::UnresolvedName(String::new()));
        };

        // Unknown lowercase roots are taken as crates from the extern prelude.
        let root_is_type = path.leading_colon.is_none()
            && !MODULE_ROOTS.contains(&first.as_str())
            && !self.scope.is_module(first)
            && (self.scope.is_local_type(first)
                || self.scope.is_trait(first)
                || PRELUDE_TYPES.contains(&first.as_str())
                || signatures::is_numeric(first)
                || is_type_like(first));

        // The type segment is the first capitalized segment after the module prefix.
        let type_at = if root_is_type {
            Some(0)
        } else {
            names
                .iter()
                .position(|n| is_type_like(n) || signatures::is_numeric(n) || n == "str")
        };

        match type_at {
            Some(at) if at + 1 == len => {
                let mut ty_path = syn::Path {
                    leading_colon: path.leading_colon,
                    segments: Default::default(),
                };
                for seg in &segments {
                    ty_path.segments.push((*seg).clone());
                }
                Ok(PathKind::Type(Type::Path(syn::TypePath {
                    qself: None,
                    path: ty_path,
                })))
            }
            // `Enum::Variant::x` and friends are not expressions we can type.
            Some(_) => Err(EvalError::Unsupported(names.join("::"))),
            None => Ok(PathKind::Module(names.join("::"))),
        }
    }

    /// `Owner::member` used as a value: enum unit variant or associated constant.
    fn type_member(&self, owner: &Type, member: &str, full: &str) -> Result<Evaluated, EvalError> {
        let resolved = self.scope.resolve_alias(owner);
        let base = types::base_name(&resolved).unwrap_or_default();

        if let Some(decl) = self.scope.enum_decl(&base) {
            return match decl.variants.get(member) {
                Some(StructShape::Unit) => Ok(Evaluated::Value(owner.clone())),
                Some(_) => Err(EvalError::Unsupported(format!("variant constructor `{full}`"))),
                None => Err(EvalError::UnresolvedName(full.to_string())),
            };
        }
        if let Some(ty) = self.scope.assoc_const(&base, member) {
            return Ok(Evaluated::Value(types::replace_self(ty, owner)));
        }
        if let Some(ty) = self.signatures.member(&base, member) {
            return Ok(Evaluated::Value(types::replace_self(ty, owner)));
        }
        if let Some(sig) = signatures::constant(&base, member) {
            return Ok(Evaluated::Value(self.registry_output(sig.output, owner)?));
        }
        if self.scope.method(&base, member).is_some() || signatures::associated(&base, member).is_some() {
            return Err(EvalError::Unsupported(format!("function item `{full}`")));
        }
        Err(EvalError::UnresolvedName(full.to_string()))
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    fn call_output(&self, func: &Expr, args: &[Option<Type>]) -> Result<Type, EvalError> {
        let Expr::Path(path) = func else {
            return Err(unsupported(func));
        };
        if path.qself.is_some() {
            return Err(unsupported(func));
        }
        let segments: Vec<String> = path.path.segments.iter().map(|s| s.ident.to_string()).collect();
        let full = segments.join("::");
        let [prefix @ .., name] = segments.as_slice() else {
            return Err(EvalError::UnresolvedFunction(full));
        };

        if prefix.is_empty() {
            return self.free_call(name, args);
        }

        match self.classify(&path.path, prefix.len())? {
            PathKind::Type(owner) => self.associated_call(&owner, name, &full),
            PathKind::Module(module) => {
                let owner = module.rsplit("::").next().unwrap_or(module.as_str());
                if let Some(ty) = self.signatures.member(owner, name) {
                    return Ok(ty.clone());
                }
                if matches!(owner, "crate" | "self" | "super") {
                    if let Some(sig) = self.scope.function(name) {
                        return Ok(sig.output_type());
                    }
                    if self.tuple_struct(name) {
                        return Ok(types::generic(name, &[]));
                    }
                }
                if let Some(ty) = self.signatures.function(name) {
                    return Ok(ty.clone());
                }
                Err(EvalError::UnresolvedFunction(full))
            }
        }
    }

    fn free_call(&self, name: &str, args: &[Option<Type>]) -> Result<Type, EvalError> {
        if name == "Some" {
            return match args {
                [Some(inner)] => Ok(types::generic("Option", std::slice::from_ref(inner))),
                _ => Err(EvalError::Unsupported("`Some` with an untyped argument".to_string())),
            };
        }
        if matches!(name, "Ok" | "Err") {
            return Err(EvalError::Unsupported(format!("`{name}(..)` has no concrete type")));
        }
        if let Some(sig) = self.scope.function(name) {
            return Ok(sig.output_type());
        }
        if let Some(ty) = self.signatures.function(name) {
            return Ok(ty.clone());
        }
        if self.tuple_struct(name) {
            return Ok(types::generic(name, &[]));
        }
        if let Some(path) = self.scope.import(name) {
            if is_type_like(name) {
                return Ok(types::generic(name, &[]));
            }
            return Err(EvalError::UnresolvedFunction(path.join("::")));
        }
        Err(EvalError::UnresolvedFunction(name.to_string()))
    }

    fn tuple_struct(&self, name: &str) -> bool {
        self.scope
            .struct_decl(name)
            .is_some_and(|d| matches!(d.shape, StructShape::Tuple(_)))
    }

    fn associated_call(&self, owner: &Type, name: &str, full: &str) -> Result<Type, EvalError> {
        if name == "default" {
            return Ok(owner.clone());
        }
        let resolved = self.scope.resolve_alias(owner);
        let base = types::base_name(&resolved).unwrap_or_default();

        if let Some(decl) = self.scope.enum_decl(&base) {
            if let Some(shape) = decl.variants.get(name) {
                return match shape {
                    StructShape::Tuple(_) => Ok(owner.clone()),
                    _ => Err(EvalError::Unsupported(format!("`{full}` is not a tuple variant"))),
                };
            }
        }
        if let Some(sig) = self.scope.method(&base, name) {
            return Ok(types::replace_self(&sig.output_type(), owner));
        }
        if let Some(ty) = self.signatures.member(&base, name) {
            return Ok(types::replace_self(ty, owner));
        }
        if let Some(sig) = signatures::associated(&base, name) {
            return self.registry_output(sig.output, owner);
        }
        Err(EvalError::UnresolvedFunction(full.to_string()))
    }

    // ------------------------------------------------------------------------
    // Methods and fields
    // ------------------------------------------------------------------------

    fn method_output(&self, receiver: &Type, method: &str, args: &[Option<Type>]) -> Result<Type, EvalError> {
        let mut current = types::strip_references(receiver).clone();
        // Auto-deref through smart pointers and aliases.
        for _ in 0..8 {
            let resolved = self.scope.resolve_alias(&current);
            if let Some(ty) = self.lookup_method(&current, &resolved, method, args) {
                return Ok(ty);
            }
            match self.deref(&resolved) {
                Some(inner) => current = types::strip_references(&inner).clone(),
                None => break,
            }
        }
        if let Some(sig) = self.scope.trait_method(method) {
            return Ok(types::replace_self(&sig.output_type(), types::strip_references(receiver)));
        }
        Err(EvalError::UnknownMethod {
            ty: types::canonical(receiver),
            method: method.to_string(),
        })
    }

    fn lookup_method(&self, written: &Type, resolved: &Type, method: &str, args: &[Option<Type>]) -> Option<Type> {
        let base = types::base_name(resolved).or_else(|| builtin_shape_name(resolved))?;

        if let Some(sig) = self.scope.method(&base, method) {
            return Some(types::replace_self(&sig.output_type(), written));
        }
        if let Some(ty) = self.signatures.member(&base, method) {
            return Some(types::replace_self(ty, written));
        }
        if let Some(ty) = structural_method(resolved, &base, method, args) {
            return Some(ty);
        }
        let sig = signatures::method(&base, method)?;
        self.registry_output(sig.output, written).ok()
    }

    fn registry_output(&self, output: &str, receiver: &Type) -> Result<Type, EvalError> {
        let ty = types::parse_type(output).map_err(|e| EvalError::Parse(e.to_string()))?;
        Ok(types::replace_self(&ty, receiver))
    }

    fn field_type(&self, base: &Type, member: &Member) -> Result<Type, EvalError> {
        let stripped = types::strip_references(base);
        let resolved = self.scope.resolve_alias(stripped);
        let unknown = || EvalError::UnknownField {
            ty: types::canonical(stripped),
            field: match member {
                Member::Named(ident) => ident.to_string(),
                Member::Unnamed(index) => index.index.to_string(),
            },
        };

        if let (Type::Tuple(tuple), Member::Unnamed(index)) = (&resolved, member) {
            return tuple.elems.iter().nth(index.index as usize).cloned().ok_or_else(unknown);
        }

        let base_name = types::base_name(&resolved).ok_or_else(unknown)?;
        let decl = self.scope.struct_decl(&base_name).ok_or_else(unknown)?;
        match (&decl.shape, member) {
            (StructShape::Named(fields), Member::Named(ident)) => {
                let wanted = ident.to_string();
                fields
                    .iter()
                    .find(|(name, _)| *name == wanted)
                    .map(|(_, ty)| types::replace_self(ty, stripped))
                    .ok_or_else(unknown)
            }
            (StructShape::Tuple(fields), Member::Unnamed(index)) => {
                fields.get(index.index as usize).cloned().ok_or_else(unknown)
            }
            _ => Err(unknown()),
        }
    }

    fn struct_literal_type(&self, path: &syn::Path) -> Result<Type, EvalError> {
        let names: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        let full = names.join("::");
        let Some(last) = names.last() else {
            return Err(EvalError::UnresolvedName(full));
        };

        if names.len() == 1 {
            if self.scope.struct_decl(last).is_some() || self.scope.alias(last).is_some() {
                return Ok(types::generic(last, &[]));
            }
            if self.scope.import(last).is_some() && is_type_like(last) {
                return Ok(types::generic(last, &[]));
            }
            return Err(EvalError::UnresolvedName(full));
        }

        match self.classify(path, names.len() - 1)? {
            PathKind::Type(owner) => {
                let base = types::base_name(&self.scope.resolve_alias(&owner)).unwrap_or_default();
                match self.scope.enum_decl(&base) {
                    Some(decl) if decl.variants.contains_key(last) => Ok(owner),
                    _ => Err(EvalError::UnresolvedName(full)),
                }
            }
            PathKind::Module(_) if is_type_like(last) => Ok(Type::Path(syn::TypePath {
                qself: None,
                path: path.clone(),
            })),
            PathKind::Module(_) => Err(EvalError::UnresolvedName(full)),
        }
    }

    // ------------------------------------------------------------------------
    // Operators, indexing, macros
    // ------------------------------------------------------------------------

    fn binary_type(&self, b: &syn::ExprBinary) -> Result<Type, EvalError> {
        let lhs = self.value_of(&b.left)?;
        let rhs = self.value_of(&b.right)?;
        match b.op {
            BinOp::Eq(_)
            | BinOp::Ne(_)
            | BinOp::Lt(_)
            | BinOp::Le(_)
            | BinOp::Gt(_)
            | BinOp::Ge(_)
            | BinOp::And(_)
            | BinOp::Or(_) => Ok(types::generic("bool", &[])),
            BinOp::AddAssign(_)
            | BinOp::SubAssign(_)
            | BinOp::MulAssign(_)
            | BinOp::DivAssign(_)
            | BinOp::RemAssign(_)
            | BinOp::BitXorAssign(_)
            | BinOp::BitAndAssign(_)
            | BinOp::BitOrAssign(_)
            | BinOp::ShlAssign(_)
            | BinOp::ShrAssign(_) => Ok(types::unit()),
            _ => {
                if types::base_name(&lhs).as_deref() == Some("String") {
                    return Ok(lhs);
                }
                if is_unsuffixed_literal(&b.left) {
                    Ok(rhs)
                } else {
                    Ok(types::strip_references(&lhs).clone())
                }
            }
        }
    }

    fn index_type(&self, base: &Type) -> Option<Type> {
        let resolved = self.scope.resolve_alias(types::strip_references(base));
        match &resolved {
            Type::Array(a) => Some((*a.elem).clone()),
            Type::Slice(s) => Some((*s.elem).clone()),
            _ => {
                let args = types::type_args(&resolved);
                match (types::base_name(&resolved)?.as_str(), args.as_slice()) {
                    ("Vec" | "VecDeque", [elem]) => Some(elem.clone()),
                    ("HashMap" | "BTreeMap", [_, value]) => Some(value.clone()),
                    _ => None,
                }
            }
        }
    }

    /// Target of `*value`, through references and smart pointers.
    fn deref(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Reference(r) => Some((*r.elem).clone()),
            _ => {
                let resolved = self.scope.resolve_alias(ty);
                match (types::base_name(&resolved)?.as_str(), types::type_args(&resolved).as_slice()) {
                    ("Box" | "Rc" | "Arc", [inner]) => Some(inner.clone()),
                    ("String", []) => Some(types::generic("str", &[])),
                    ("Vec", [elem]) => Some(syn::parse_quote!([#elem])),
                    _ => None,
                }
            }
        }
    }

    fn macro_type(&self, mac: &syn::Macro) -> Result<Type, EvalError> {
        let name = mac
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default();
        match name.as_str() {
            "format" => Ok(types::generic("String", &[])),
            "concat" | "stringify" | "env" | "include_str" | "file" | "module_path" => Ok(syn::parse_quote!(&'static str)),
            "line" | "column" => Ok(types::generic("u32", &[])),
            "matches" => Ok(types::generic("bool", &[])),
            "vec" => {
                let tokens = &mac.tokens;
                let array: Expr = syn::parse2(quote::quote!([#tokens])).map_err(|e| EvalError::Parse(e.to_string()))?;
                let elem = match &array {
                    Expr::Array(a) => match a.elems.first() {
                        Some(first) => self.value_of(first)?,
                        None => return Err(EvalError::Unsupported("empty `vec![]`".to_string())),
                    },
                    Expr::Repeat(r) => self.value_of(&r.expr)?,
                    _ => return Err(unsupported(&array)),
                };
                Ok(types::generic("Vec", &[elem]))
            }
            _ => Err(EvalError::Unsupported(format!("macro `{name}!`"))),
        }
    }
}

impl TypeResolver for StaticResolver<'_> {
    fn eval(&self, expr: &str) -> Result<Evaluated, EvalError> {
        let parsed: Expr = syn::parse_str(expr).map_err(|e| EvalError::Parse(e.to_string()))?;
        self.type_of(&parsed)
    }
}

/// Methods of generic std containers whose output depends on type arguments.
fn structural_method(ty: &Type, base: &str, method: &str, args: &[Option<Type>]) -> Option<Type> {
    let targs = types::type_args(ty);
    let elem_of_slice = match ty {
        Type::Array(a) => Some((*a.elem).clone()),
        Type::Slice(s) => Some((*s.elem).clone()),
        _ => None,
    };
    let option = |inner: Type| types::generic("Option", &[inner]);
    let bool_ty = || types::generic("bool", &[]);

    match (base, targs.as_slice()) {
        ("Option", [t]) => match method {
            "unwrap" | "expect" | "unwrap_or" | "unwrap_or_default" | "unwrap_or_else" | "unwrap_unchecked" => {
                Some(t.clone())
            }
            "is_some" | "is_none" | "is_some_and" | "is_none_or" => Some(bool_ty()),
            "as_ref" => Some(option(types::reference(t.clone(), false))),
            "take" | "or" | "xor" | "filter" | "or_else" => Some(ty.clone()),
            "cloned" | "copied" => Some(option(types::strip_references(t).clone())),
            "ok_or" => match args {
                [Some(err)] => Some(types::generic("Result", &[t.clone(), err.clone()])),
                _ => None,
            },
            _ => None,
        },
        ("Result", [t, e]) => match method {
            "unwrap" | "expect" | "unwrap_or" | "unwrap_or_default" | "unwrap_or_else" => Some(t.clone()),
            "unwrap_err" | "expect_err" => Some(e.clone()),
            "ok" => Some(option(t.clone())),
            "err" => Some(option(e.clone())),
            "is_ok" | "is_err" | "is_ok_and" | "is_err_and" => Some(bool_ty()),
            _ => None,
        },
        ("Vec" | "VecDeque", [t]) => seq_method(ty, t, method),
        ("HashMap" | "BTreeMap", [k, v]) => match method {
            "get" => Some(option(types::reference(v.clone(), false))),
            "remove" => Some(option(v.clone())),
            "contains_key" => Some(bool_ty()),
            "insert" => Some(option(v.clone())),
            "first_key_value" | "last_key_value" => {
                let (k, v) = (types::reference(k.clone(), false), types::reference(v.clone(), false));
                Some(option(syn::parse_quote!((#k, #v))))
            }
            _ => None,
        },
        ("HashSet" | "BTreeSet", [_]) => match method {
            "contains" | "insert" | "remove" => Some(bool_ty()),
            _ => None,
        },
        ("Box" | "Rc" | "Arc", [t]) => match method {
            "as_ref" => Some(types::reference(t.clone(), false)),
            _ => None,
        },
        ("bool", []) => match (method, args) {
            ("then_some", [Some(value)]) => Some(option(value.clone())),
            _ => None,
        },
        (name, []) if matches!(method, "to_be_bytes" | "to_le_bytes" | "to_ne_bytes") => {
            let width = proc_macro2::Literal::usize_unsuffixed(fixed_byte_width(name)?);
            Some(syn::parse_quote!([u8; #width]))
        }
        _ => elem_of_slice.and_then(|t| seq_method(ty, &t, method)),
    }
}

/// Byte width of a numeric primitive; `None` for the pointer-sized ones.
fn fixed_byte_width(name: &str) -> Option<usize> {
    match name {
        "i8" | "u8" => Some(1),
        "i16" | "u16" => Some(2),
        "i32" | "u32" | "f32" => Some(4),
        "i64" | "u64" | "f64" => Some(8),
        "i128" | "u128" => Some(16),
        _ => None,
    }
}

fn seq_method(ty: &Type, elem: &Type, method: &str) -> Option<Type> {
    let option = |inner: Type| types::generic("Option", &[inner]);
    match method {
        "first" | "last" | "get" => Some(option(types::reference(elem.clone(), false))),
        "pop" | "pop_front" | "pop_back" => Some(option(elem.clone())),
        "contains" | "starts_with" | "ends_with" => Some(types::generic("bool", &[])),
        "to_vec" => Some(types::generic("Vec", std::slice::from_ref(elem))),
        "as_slice" => Some(syn::parse_quote!(&[#elem])),
        "join" | "concat" if is_string_like(elem) => Some(types::generic("String", &[])),
        "clone" => Some(ty.clone()),
        _ => None,
    }
}

fn is_string_like(ty: &Type) -> bool {
    matches!(
        types::base_name(types::strip_references(ty)).as_deref(),
        Some("String" | "str")
    )
}

/// Registry name for receivers that are not paths.
fn builtin_shape_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Array(_) | Type::Slice(_) => Some("[T]".to_string()),
        Type::Tuple(_) => Some("(..)".to_string()),
        _ => None,
    }
}

fn literal_type(lit: &Lit) -> Result<Type, EvalError> {
    let ty: Type = match lit {
        Lit::Str(_) => syn::parse_quote!(&'static str),
        Lit::ByteStr(_) => syn::parse_quote!(&'static [u8]),
        Lit::CStr(_) => syn::parse_quote!(&'static ::core::ffi::CStr),
        Lit::Byte(_) => types::generic("u8", &[]),
        Lit::Char(_) => types::generic("char", &[]),
        Lit::Bool(_) => types::generic("bool", &[]),
        Lit::Int(i) => types::generic(if i.suffix().is_empty() { "i32" } else { i.suffix() }, &[]),
        Lit::Float(f) => types::generic(if f.suffix().is_empty() { "f64" } else { f.suffix() }, &[]),
        other => return Err(EvalError::Unsupported(compact_tokens(other))),
    };
    Ok(ty)
}

fn is_unsuffixed_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(l) => match &l.lit {
            Lit::Int(i) => i.suffix().is_empty(),
            Lit::Float(f) => f.suffix().is_empty(),
            _ => false,
        },
        Expr::Paren(p) => is_unsuffixed_literal(&p.expr),
        Expr::Unary(u) => is_unsuffixed_literal(&u.expr),
        _ => false,
    }
}

fn is_type_like(name: &str) -> bool {
    let mut chars = name.trim_start_matches("r#").chars();
    chars.next().is_some_and(char::is_uppercase) && chars.any(|c| c.is_lowercase())
        || name.len() == 1 && name.chars().all(char::is_uppercase)
}

fn is_const_like(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic()) && name.chars().all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_')
}

fn compact_tokens(tokens: &impl ToTokens) -> String {
    tokens.to_token_stream().to_string()
}

fn unsupported(expr: &Expr) -> EvalError {
    EvalError::Unsupported(compact_tokens(expr))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGE: &str = r#"
        use std::time::{Duration, SystemTime};
        use std::collections::HashMap;

        pub struct Time { secs: i64 }
        impl Time {
            pub fn unix(&self) -> i64 { self.secs }
            pub fn from_unix(secs: i64) -> Self { Time { secs } }
            pub const EPOCH: i64 = 0;
        }

        pub struct Meters(pub f64);
        pub enum Level { Low, High(u8), Custom { name: String } }
        pub type Tags = Vec<String>;
        pub const LIMIT: u16 = 8;

        pub fn label(level: &Level) -> String { String::new() }

        #[derive(Default)]
        pub struct Event {
            pub at: Time,
            pub ttl: Duration,
            pub tags: Tags,
            pub level: Level,
            pub pair: (u8, char),
            pub maybe: Option<Time>,
            pub counts: HashMap<String, u32>,
            pub boxed: Box<Time>,
            pub stamp: SystemTime,
        }
    "#;

    fn with_resolver<T>(sigs: &[(&str, &str)], f: impl FnOnce(&StaticResolver<'_>) -> T) -> T {
        let file: syn::File = syn::parse_str(PACKAGE).unwrap();
        let scope = PackageScope::from_files([&file]);
        let table = SignatureTable::from_entries(sigs.iter().copied()).unwrap();
        let resolver = StaticResolver::new(&scope, &table);
        f(&resolver)
    }

    fn value(expr: &str) -> Result<String, EvalError> {
        with_resolver(&[], |r| match r.eval(expr)? {
            Evaluated::Value(ty) => Ok(types::canonical(&ty)),
            other => panic!("expected a value, got {other:?}"),
        })
    }

    #[test]
    fn test_literals() {
        assert_eq!(value("1").unwrap(), "i32");
        assert_eq!(value("1u8").unwrap(), "u8");
        assert_eq!(value("2.5").unwrap(), "f64");
        assert_eq!(value("\"x\"").unwrap(), "&'static str");
        assert_eq!(value("true").unwrap(), "bool");
    }

    #[test]
    fn test_field_and_method_on_default_receiver() {
        assert_eq!(value("Event::default().at").unwrap(), "Time");
        assert_eq!(value("Event::default().at.unix()").unwrap(), "i64");
        assert_eq!(value("Event::default().ttl.as_secs()").unwrap(), "u64");
        assert_eq!(value("Event::default().ttl.as_millis()").unwrap(), "u128");
        assert_eq!(value("Event::default().pair.1").unwrap(), "char");
    }

    #[test]
    fn test_alias_and_generic_containers() {
        assert_eq!(value("Event::default().tags.len()").unwrap(), "usize");
        assert_eq!(value("Event::default().tags.first()").unwrap(), "Option<&String>");
        assert_eq!(value("Event::default().tags.join(\",\")").unwrap(), "String");
        assert_eq!(value("Event::default().maybe.unwrap().unix()").unwrap(), "i64");
        assert_eq!(value("Event::default().maybe.is_some()").unwrap(), "bool");
        assert_eq!(value("Event::default().counts[\"a\"]").unwrap(), "u32");
        assert_eq!(value("Event::default().boxed.unix()").unwrap(), "i64");
        assert_eq!(
            value("Event::default().stamp.duration_since(SystemTime::UNIX_EPOCH)").unwrap(),
            "Result<::std::time::Duration, ::std::time::SystemTimeError>"
        );
        assert_eq!(
            value("Event::default().stamp.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs()").unwrap(),
            "u64"
        );
    }

    #[test]
    fn test_calls_and_constructors() {
        assert_eq!(value("Time::from_unix(3)").unwrap(), "Time");
        assert_eq!(value("Duration::from_secs(3)").unwrap(), "Duration");
        assert_eq!(value("std::time::Duration::from_secs(3)").unwrap(), "std::time::Duration");
        assert_eq!(value("label(&Event::default().level)").unwrap(), "String");
        assert_eq!(value("Meters(1.0)").unwrap(), "Meters");
        assert_eq!(value("Level::High(1)").unwrap(), "Level");
        assert_eq!(value("Level::Low").unwrap(), "Level");
        assert_eq!(value("Level::Custom { name: String::new() }").unwrap(), "Level");
        assert_eq!(value("Some(Event::default().ttl)").unwrap(), "Option<Duration>");
        assert_eq!(value("Time::EPOCH").unwrap(), "i64");
        assert_eq!(value("u32::MAX").unwrap(), "u32");
        assert_eq!(value("LIMIT").unwrap(), "u16");
    }

    #[test]
    fn test_std_outputs_resolve_without_imports() {
        assert_eq!(value("std::time::Instant::now().elapsed()").unwrap(), "::std::time::Duration");
        assert_eq!(value("std::time::Instant::now().elapsed().as_millis()").unwrap(), "u128");
        assert_eq!(value("String::from_utf8_lossy(&[])").unwrap(), "::std::borrow::Cow<'static, str>");
    }

    #[test]
    fn test_byte_arrays_and_then_some_follow_their_arguments() {
        assert_eq!(value("Event::default().at.unix().to_be_bytes()").unwrap(), "[u8; 8]");
        assert_eq!(value("LIMIT.to_le_bytes()").unwrap(), "[u8; 2]");
        assert_eq!(value("Event::default().pair.0.to_ne_bytes()").unwrap(), "[u8; 1]");
        assert!(matches!(
            value("Event::default().tags.len().to_be_bytes()"),
            Err(EvalError::UnknownMethod { .. })
        ));
        assert_eq!(
            value("Event::default().maybe.is_some().then_some(Event::default().ttl)").unwrap(),
            "Option<Duration>"
        );
        assert_eq!(value("true.then_some(LIMIT)").unwrap(), "Option<u16>");
    }

    #[test]
    fn test_operators_and_casts() {
        assert_eq!(value("Event::default().at.unix() * 1000").unwrap(), "i64");
        assert_eq!(value("1000 * Event::default().at.unix()").unwrap(), "i64");
        assert_eq!(value("Event::default().at.unix() > 0").unwrap(), "bool");
        assert_eq!(value("Event::default().ttl.as_secs() as i64").unwrap(), "i64");
        assert_eq!(value("-Event::default().at.unix()").unwrap(), "i64");
        assert_eq!(value("(Event::default().at.unix(), LIMIT)").unwrap(), "(i64, u16)");
        assert_eq!(value("[LIMIT, LIMIT]").unwrap(), "[u16; 2]");
        assert_eq!(value("&Event::default().at").unwrap(), "&Time");
    }

    #[test]
    fn test_macros() {
        assert_eq!(value("format!(\"{}\", Event::default().at.unix())").unwrap(), "String");
        assert_eq!(value("vec![Event::default().at.unix()]").unwrap(), "Vec<i64>");
        assert_eq!(value("vec![0u8; 4]").unwrap(), "Vec<u8>");
    }

    #[test]
    fn test_configured_signatures() {
        let out = with_resolver(&[("Time::pretty", "String"), ("chrono::Utc::now", "DateTime<Utc>")], |r| {
            let a = r.eval("Event::default().at.pretty()").unwrap();
            let b = r.eval("chrono::Utc::now()").unwrap();
            match (a, b) {
                (Evaluated::Value(a), Evaluated::Value(b)) => (types::canonical(&a), types::canonical(&b)),
                other => panic!("{other:?}"),
            }
        });
        assert_eq!(out, ("String".to_string(), "DateTime<Utc>".to_string()));
    }

    #[test]
    fn test_modules_and_types_are_not_values() {
        with_resolver(&[], |r| {
            assert!(matches!(r.eval("std::time"), Ok(Evaluated::Module(_))));
            assert!(matches!(r.eval("Duration"), Ok(Evaluated::TypeName(_))));
            assert!(matches!(r.eval("Event"), Ok(Evaluated::TypeName(_))));
        });
    }

    #[test]
    fn test_errors() {
        assert!(matches!(value("Event::default().nope"), Err(EvalError::UnknownField { .. })));
        assert!(matches!(value("Event::default().at.nope()"), Err(EvalError::UnknownMethod { .. })));
        assert!(matches!(value("missing"), Err(EvalError::UnresolvedName(_))));
        assert!(matches!(value("missing(1)"), Err(EvalError::UnresolvedFunction(_))));
        assert!(matches!(value("Event::default().at.unix("), Err(EvalError::Parse(_))));
        assert!(matches!(value("if true { 1 } else { 2 }"), Err(EvalError::Unsupported(_))));
    }

    #[test]
    fn test_unsupported_arguments_are_tolerated_but_names_are_not() {
        assert_eq!(value("Event::default().maybe.unwrap_or_else(|| Time::from_unix(0))").unwrap(), "Time");
        assert!(matches!(
            value("Event::default().maybe.unwrap_or(missing)"),
            Err(EvalError::UnresolvedName(_))
        ));
    }

    #[test]
    fn test_closure_resolver() {
        let stub = |expr: &str| -> Result<Evaluated, EvalError> {
            if expr.contains("unix") {
                Ok(Evaluated::Value(types::parse_type("i64").unwrap()))
            } else {
                Err(EvalError::UnresolvedName(expr.to_string()))
            }
        };
        assert!(matches!(stub.eval("x.unix()"), Ok(Evaluated::Value(_))));
        assert!(stub.eval("x").is_err());
    }
}
