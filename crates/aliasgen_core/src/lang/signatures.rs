//! Standard-library signatures known to the type evaluator.
//!
//! The evaluator reads the declarations of the package it scans, but types from `std` (and the primitives) are never
//! part of that source. This registry supplies their member signatures so expressions like `$.as_secs()` or
//! `Duration::from_secs($)` resolve without a full type checker.
//!
//! ## Notes
//! - Outputs are type text. `Self` stands for the receiver (methods) or the named type (associated functions).
//! - Lookup prefers a [`Receiver::Named`] entry, then [`Receiver::Numeric`] for primitive numbers, then
//!   [`Receiver::Any`].
//! - Signatures that depend on generic arguments (`Option::unwrap`, `Vec::first`) are structural and live in the
//!   evaluator, not here.

/// Which receiver types a signature applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// Every type (blanket-trait members such as `to_string` or `clone`).
    Any,
    /// Every primitive numeric type.
    Numeric,
    /// One type, by its last path segment (`Duration`, `str`).
    Named(&'static str),
}

/// Whether a member takes a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// `value.member(..)`
    Method,
    /// `Type::member(..)`
    Associated,
    /// `Type::MEMBER`
    Constant,
}

/// Registry entry for one member signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureInfo {
    pub receiver: Receiver,
    pub member: &'static str,
    pub kind: MemberKind,
    /// Output type text; `Self` is substituted by the caller.
    pub output: &'static str,
}

const fn method_sig(receiver: Receiver, member: &'static str, output: &'static str) -> SignatureInfo {
    SignatureInfo {
        receiver,
        member,
        kind: MemberKind::Method,
        output,
    }
}

const fn assoc_sig(receiver: Receiver, member: &'static str, output: &'static str) -> SignatureInfo {
    SignatureInfo {
        receiver,
        member,
        kind: MemberKind::Associated,
        output,
    }
}

const fn const_sig(receiver: Receiver, member: &'static str, output: &'static str) -> SignatureInfo {
    SignatureInfo {
        receiver,
        member,
        kind: MemberKind::Constant,
        output,
    }
}

use Receiver::{Any, Named, Numeric};

/// Primitive numeric type names matched by [`Receiver::Numeric`].
pub const NUMERIC_TYPES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize", "f32", "f64",
];

/// Registry of all known signatures.
pub const SIGNATURES: &[SignatureInfo] = &[
    // Blanket members
    method_sig(Any, "to_string", "String"),
    method_sig(Any, "clone", "Self"),
    method_sig(Any, "to_owned", "Self"),
    method_sig(Any, "len", "usize"),
    method_sig(Any, "is_empty", "bool"),
    method_sig(Any, "eq", "bool"),
    method_sig(Any, "ne", "bool"),
    assoc_sig(Any, "default", "Self"),
    // Numbers
    method_sig(Numeric, "abs", "Self"),
    method_sig(Numeric, "pow", "Self"),
    method_sig(Numeric, "min", "Self"),
    method_sig(Numeric, "max", "Self"),
    method_sig(Numeric, "signum", "Self"),
    method_sig(Numeric, "wrapping_add", "Self"),
    method_sig(Numeric, "wrapping_sub", "Self"),
    method_sig(Numeric, "saturating_add", "Self"),
    method_sig(Numeric, "saturating_sub", "Self"),
    method_sig(Numeric, "round", "Self"),
    method_sig(Numeric, "floor", "Self"),
    method_sig(Numeric, "ceil", "Self"),
    method_sig(Numeric, "trunc", "Self"),
    method_sig(Numeric, "sqrt", "Self"),
    method_sig(Numeric, "count_ones", "u32"),
    method_sig(Numeric, "is_positive", "bool"),
    method_sig(Numeric, "is_negative", "bool"),
    const_sig(Numeric, "MIN", "Self"),
    const_sig(Numeric, "MAX", "Self"),
    // bool / char
    method_sig(Named("char"), "is_alphabetic", "bool"),
    method_sig(Named("char"), "is_numeric", "bool"),
    method_sig(Named("char"), "len_utf8", "usize"),
    method_sig(Named("char"), "to_ascii_uppercase", "char"),
    method_sig(Named("char"), "to_ascii_lowercase", "char"),
    // Strings
    method_sig(Named("str"), "to_owned", "String"),
    method_sig(Named("str"), "to_uppercase", "String"),
    method_sig(Named("str"), "to_lowercase", "String"),
    method_sig(Named("str"), "trim", "&str"),
    method_sig(Named("str"), "as_bytes", "&[u8]"),
    method_sig(Named("str"), "starts_with", "bool"),
    method_sig(Named("str"), "ends_with", "bool"),
    method_sig(Named("str"), "contains", "bool"),
    method_sig(Named("str"), "replace", "String"),
    method_sig(Named("String"), "as_str", "&str"),
    method_sig(Named("String"), "to_uppercase", "String"),
    method_sig(Named("String"), "to_lowercase", "String"),
    method_sig(Named("String"), "trim", "&str"),
    method_sig(Named("String"), "as_bytes", "&[u8]"),
    method_sig(Named("String"), "into_bytes", "Vec<u8>"),
    method_sig(Named("String"), "capacity", "usize"),
    method_sig(Named("String"), "starts_with", "bool"),
    method_sig(Named("String"), "ends_with", "bool"),
    method_sig(Named("String"), "contains", "bool"),
    method_sig(Named("String"), "replace", "String"),
    assoc_sig(Named("String"), "new", "Self"),
    assoc_sig(Named("String"), "from", "Self"),
    assoc_sig(Named("String"), "with_capacity", "Self"),
    assoc_sig(Named("String"), "from_utf8_lossy", "::std::borrow::Cow<'static, str>"),
    // std::time
    method_sig(Named("Duration"), "as_secs", "u64"),
    method_sig(Named("Duration"), "as_millis", "u128"),
    method_sig(Named("Duration"), "as_micros", "u128"),
    method_sig(Named("Duration"), "as_nanos", "u128"),
    method_sig(Named("Duration"), "as_secs_f32", "f32"),
    method_sig(Named("Duration"), "as_secs_f64", "f64"),
    method_sig(Named("Duration"), "subsec_millis", "u32"),
    method_sig(Named("Duration"), "subsec_micros", "u32"),
    method_sig(Named("Duration"), "subsec_nanos", "u32"),
    method_sig(Named("Duration"), "is_zero", "bool"),
    assoc_sig(Named("Duration"), "new", "Self"),
    assoc_sig(Named("Duration"), "from_secs", "Self"),
    assoc_sig(Named("Duration"), "from_millis", "Self"),
    assoc_sig(Named("Duration"), "from_micros", "Self"),
    assoc_sig(Named("Duration"), "from_nanos", "Self"),
    assoc_sig(Named("Duration"), "from_secs_f32", "Self"),
    assoc_sig(Named("Duration"), "from_secs_f64", "Self"),
    const_sig(Named("Duration"), "ZERO", "Self"),
    const_sig(Named("Duration"), "MAX", "Self"),
    method_sig(
        Named("SystemTime"),
        "duration_since",
        "Result<::std::time::Duration, ::std::time::SystemTimeError>",
    ),
    method_sig(Named("SystemTime"), "elapsed", "Result<::std::time::Duration, ::std::time::SystemTimeError>"),
    assoc_sig(Named("SystemTime"), "now", "Self"),
    const_sig(Named("SystemTime"), "UNIX_EPOCH", "Self"),
    method_sig(Named("Instant"), "elapsed", "::std::time::Duration"),
    assoc_sig(Named("Instant"), "now", "Self"),
];

/// Whether `name` is a primitive numeric type.
pub fn is_numeric(name: &str) -> bool {
    NUMERIC_TYPES.contains(&name)
}

fn lookup(receiver: &str, member: &str, kind: MemberKind) -> Option<&'static SignatureInfo> {
    let find = |wanted: fn(&Receiver, &str) -> bool| {
        SIGNATURES
            .iter()
            .find(|s| s.kind == kind && s.member == member && wanted(&s.receiver, receiver))
    };
    find(|r, name| matches!(r, Named(n) if *n == name))
        .or_else(|| if is_numeric(receiver) { find(|r, _| *r == Numeric) } else { None })
        .or_else(|| find(|r, _| *r == Any))
}

/// Find the method `member` on a receiver whose type is named `receiver`.
pub fn method(receiver: &str, member: &str) -> Option<&'static SignatureInfo> {
    lookup(receiver, member, MemberKind::Method)
}

/// Find the associated function `Type::member` for the type named `ty`.
pub fn associated(ty: &str, member: &str) -> Option<&'static SignatureInfo> {
    lookup(ty, member, MemberKind::Associated)
}

/// Find the associated constant `Type::MEMBER` for the type named `ty`.
pub fn constant(ty: &str, member: &str) -> Option<&'static SignatureInfo> {
    lookup(ty, member, MemberKind::Constant)
}
