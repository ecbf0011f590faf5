//! Parse alias directives.
//!
//! A directive is the raw string carried by a field annotation:
//!
//! ```text
//! KEY=MARSHAL_EXPR;UNMARSHAL_EXPR
//! ```
//!
//! - `KEY` is every character before the first `=` and must be non-empty.
//! - The payload after the first `=` must split on `;` into exactly two segments.
//!
//! ## Notes
//!
//! - Expressions are opaque text. The only structure understood here is the placeholder character, and it is not
//!   resolved by the parser: substitution is direction-dependent and happens in the generator.
//! - Neither segment is trimmed; whitespace is part of the expression text.

use thiserror::Error;

/// The reserved placeholder character used when no other is configured.
pub const PLACEHOLDER: char = '$';

/// A parsed `KEY=MARSHAL;UNMARSHAL` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Wire-format key used in place of the field name.
    pub key: String,
    /// Expression computing the wire value from the field (placeholder unresolved).
    pub marshal: String,
    /// Expression computing the field from the decoded wire value (placeholder unresolved).
    pub unmarshal: String,
}

impl Directive {
    /// Return the marshal expression with every placeholder replaced by `replacement`.
    pub fn marshal_with(&self, placeholder: char, replacement: &str) -> String {
        substitute(&self.marshal, placeholder, replacement)
    }

    /// Return the unmarshal expression with every placeholder replaced by `replacement`.
    pub fn unmarshal_with(&self, placeholder: char, replacement: &str) -> String {
        substitute(&self.unmarshal, placeholder, replacement)
    }
}

/// Errors produced when a directive string does not follow the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("missing `=` between output key and expressions")]
    MissingSeparator,

    #[error("output key before `=` is empty")]
    EmptyKey,

    #[error("expected exactly two `;`-separated expressions after `=`, found {found}")]
    ExpressionCount { found: usize },
}

/// Parse a raw directive string.
///
/// ## Errors
///
/// - [`DirectiveError::MissingSeparator`] if the string has no `=`.
/// - [`DirectiveError::EmptyKey`] if the first `=` is the first character.
/// - [`DirectiveError::ExpressionCount`] unless the payload splits into exactly two `;` segments.
///
/// ## Examples
/// ```rust
/// use aliasgen_core::directive::{parse_directive, DirectiveError};
///
/// assert!(parse_directive("k=a;b").is_ok());
/// assert_eq!(parse_directive("k=a;b;c"), Err(DirectiveError::ExpressionCount { found: 3 }));
/// ```
pub fn parse_directive(raw: &str) -> Result<Directive, DirectiveError> {
    let Some(eq) = raw.find('=') else {
        return Err(DirectiveError::MissingSeparator);
    };
    if eq == 0 {
        return Err(DirectiveError::EmptyKey);
    }

    let (key, payload) = (&raw[..eq], &raw[eq + 1..]);
    let exprs: Vec<&str> = payload.split(';').collect();
    let [marshal, unmarshal] = exprs.as_slice() else {
        return Err(DirectiveError::ExpressionCount { found: exprs.len() });
    };

    Ok(Directive {
        key: key.to_string(),
        marshal: marshal.to_string(),
        unmarshal: unmarshal.to_string(),
    })
}

/// Replace every occurrence of `placeholder` in `expr` with `replacement`.
///
/// Substitution is purely textual: a placeholder inside a string literal is replaced too.
pub fn substitute(expr: &str, placeholder: char, replacement: &str) -> String {
    let mut buf = [0u8; 4];
    expr.replace(&*placeholder.encode_utf8(&mut buf), replacement)
}
