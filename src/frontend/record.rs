//! Build record descriptors from annotated struct declarations.
//!
//! [`RecordScanner::scan`] reads the directive attribute on every field of one struct, evaluates each marshal
//! expression through a [`TypeResolver`], and accumulates the results in field order. The first failure aborts the
//! whole record: a descriptor is only returned when every directive on it is valid.

use std::path::{Path, PathBuf};

use aliasgen_core::directive::{self, Directive, DirectiveError};
use aliasgen_core::lang::conventions;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, ExprLit, Fields, Ident, ItemStruct, Lit, Meta, Type};
use thiserror::Error;

use super::diagnostics::{Diagnostic, ErrorKind, Position};
use super::evaluator::{EvalError, Evaluated, TypeResolver};
use super::types;

// ============================================================================
// Data model
// ============================================================================

/// One annotated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDirective {
    /// Target field.
    pub field: Ident,
    /// Wire-format key replacing the field name.
    pub key: String,
    /// Canonical text of the wire field's type.
    pub wire_type: String,
    /// Marshal expression with the placeholder resolved to `self.<field>`.
    pub marshal: String,
    /// Unmarshal expression with the placeholder resolved to the decoded wire field.
    pub unmarshal: String,
    pub position: Position,
}

impl AliasDirective {
    /// Name of the extra wire-structure field carrying this alias.
    pub fn wire_field(&self) -> Ident {
        Ident::new(
            &conventions::wire_field_name(&self.field.unraw().to_string()),
            self.field.span(),
        )
    }
}

/// A record field as seen by the same-shape alias: name, type and its own `#[serde]` attributes.
#[derive(Debug, Clone)]
pub struct ShapeField {
    pub ident: Ident,
    pub ty: Type,
    pub serde_attrs: Vec<Attribute>,
}

/// Everything the generator needs about one annotated record.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub ident: Ident,
    pub dir: PathBuf,
    pub source: PathBuf,
    pub position: Position,
    /// Container-level `#[serde]` attributes.
    pub serde_attrs: Vec<Attribute>,
    pub fields: Vec<ShapeField>,
    /// Aliases in field-declaration order.
    pub aliases: Vec<AliasDirective>,
}

impl RecordDescriptor {
    /// Record name without any `r#` prefix.
    pub fn name(&self) -> String {
        self.ident.unraw().to_string()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("invalid `{attribute}` directive {raw:?}: {source}")]
    Directive {
        attribute: String,
        raw: String,
        #[source]
        source: DirectiveError,
    },

    #[error("expected `#[{attribute} = \"KEY=MARSHAL;UNMARSHAL\"]`")]
    Malformed { attribute: String },

    #[error("field `{field}` carries more than one `{attribute}` attribute")]
    Duplicate { attribute: String, field: String },

    #[error("`{attribute}` directives need a named field")]
    UnnamedField { attribute: String },

    #[error("the {direction} expression of field `{field}` is empty")]
    EmptyExpression { field: String, direction: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeEvalError {
    #[error("cannot infer the type of `{expr}`: {source}")]
    Eval {
        expr: String,
        #[source]
        source: EvalError,
    },

    #[error("invalid expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error(transparent)]
    TypeEval(#[from] TypeEvalError),

    #[error("record `{record}` has generic parameters; generated impls need a concrete type")]
    GenericRecord { record: String },
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::Annotation(_) => ErrorKind::AnnotationSyntax,
            RecordError::TypeEval(_) => ErrorKind::TypeEvaluation,
            RecordError::GenericRecord { .. } => ErrorKind::GenerationContract,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            RecordError::Annotation(
                AnnotationError::Directive { .. }
                | AnnotationError::Malformed { .. }
                | AnnotationError::EmptyExpression { .. },
            ) => {
                Some("directives have the form KEY=MARSHAL_EXPR;UNMARSHAL_EXPR".to_string())
            }
            RecordError::TypeEval(TypeEvalError::Eval {
                source: EvalError::UnknownMethod { .. } | EvalError::UnresolvedFunction(_),
                ..
            }) => Some("declare the signature under [signatures] in aliasgen.toml".to_string()),
            RecordError::TypeEval(TypeEvalError::InvalidExpression { .. }) => {
                Some("the marshal expression must produce an owned value".to_string())
            }
            _ => None,
        }
    }
}

/// A [`RecordError`] at the position it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct ScanError {
    pub position: Position,
    #[source]
    pub error: RecordError,
}

impl ScanError {
    pub fn into_diagnostic(self) -> Diagnostic {
        let mut diagnostic = Diagnostic::new(self.error.kind(), self.position, self.error.to_string());
        if let Some(hint) = self.error.hint() {
            diagnostic = diagnostic.with_hint(hint);
        }
        diagnostic
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Settings shared by every record of a run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub attribute: String,
    pub placeholder: char,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            attribute: conventions::DEFAULT_ATTRIBUTE.to_string(),
            placeholder: directive::PLACEHOLDER,
        }
    }
}

/// Turns struct declarations into [`RecordDescriptor`]s.
pub struct RecordScanner<'a, R: ?Sized> {
    options: &'a ScanOptions,
    resolver: &'a R,
}

impl<'a, R: TypeResolver + ?Sized> RecordScanner<'a, R> {
    pub fn new(options: &'a ScanOptions, resolver: &'a R) -> Self {
        Self { options, resolver }
    }

    /// Scan one struct declared in `file`.
    ///
    /// Returns `Ok(None)` when no field carries a (non-empty) directive.
    #[tracing::instrument(skip_all, fields(record = %item.ident))]
    pub fn scan(&self, item: &ItemStruct, file: &Path) -> Result<Option<RecordDescriptor>, ScanError> {
        let directives = self.read_directives(item, file)?;
        if directives.is_empty() {
            return Ok(None);
        }

        let decl_position = Position::from_span(file, item.ident.span());
        if !item.generics.params.is_empty() {
            return Err(ScanError {
                position: decl_position,
                error: RecordError::GenericRecord {
                    record: item.ident.to_string(),
                },
            });
        }

        let mut aliases = Vec::with_capacity(directives.len());
        for (field, directive, position) in directives {
            let wire_type = self.wire_type(&item.ident, &field, &directive).map_err(|error| ScanError {
                position: position.clone(),
                error: error.into(),
            })?;
            let wire_field = conventions::wire_field_name(&field.unraw().to_string());
            let marshal_receiver = format!("{}.{}", conventions::ENCODE_RECEIVER, field);
            let unmarshal_receiver = format!("{}.{}", conventions::WIRE_BINDING, wire_field);
            tracing::debug!(field = %field, key = %directive.key, wire_type = %wire_type, "alias resolved");
            aliases.push(AliasDirective {
                marshal: directive.marshal_with(self.options.placeholder, &marshal_receiver),
                unmarshal: directive.unmarshal_with(self.options.placeholder, &unmarshal_receiver),
                key: directive.key,
                wire_type,
                field,
                position,
            });
        }

        let fields = match &item.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .filter_map(|f| {
                    f.ident.as_ref().map(|ident| ShapeField {
                        ident: ident.clone(),
                        ty: f.ty.clone(),
                        serde_attrs: serde_attrs(&f.attrs),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Some(RecordDescriptor {
            ident: item.ident.clone(),
            dir: file.parent().map(Path::to_path_buf).unwrap_or_default(),
            source: file.to_path_buf(),
            position: decl_position,
            serde_attrs: serde_attrs(&item.attrs),
            fields,
            aliases,
        }))
    }

    /// Parse every directive attribute, in field order.
    fn read_directives(&self, item: &ItemStruct, file: &Path) -> Result<Vec<(Ident, Directive, Position)>, ScanError> {
        let attribute = self.options.attribute.as_str();
        let mut out = Vec::new();

        for field in &item.fields {
            let mut tagged = field.attrs.iter().filter(|a| a.path().is_ident(attribute));
            let Some(attr) = tagged.next() else {
                continue;
            };
            let position = Position::from_span(file, attr.span());
            let fail = |error: AnnotationError| ScanError {
                position: position.clone(),
                error: error.into(),
            };

            let Some(ident) = &field.ident else {
                return Err(fail(AnnotationError::UnnamedField {
                    attribute: attribute.to_string(),
                }));
            };
            if let Some(extra) = tagged.next() {
                return Err(ScanError {
                    position: Position::from_span(file, extra.span()),
                    error: AnnotationError::Duplicate {
                        attribute: attribute.to_string(),
                        field: ident.to_string(),
                    }
                    .into(),
                });
            }

            let raw = directive_text(attr).ok_or_else(|| {
                fail(AnnotationError::Malformed {
                    attribute: attribute.to_string(),
                })
            })?;
            if raw.is_empty() {
                continue;
            }
            let directive = directive::parse_directive(&raw).map_err(|source| {
                fail(AnnotationError::Directive {
                    attribute: attribute.to_string(),
                    raw: raw.clone(),
                    source,
                })
            })?;
            for (direction, expr) in [("marshal", &directive.marshal), ("unmarshal", &directive.unmarshal)] {
                if expr.trim().is_empty() {
                    return Err(fail(AnnotationError::EmptyExpression {
                        field: ident.to_string(),
                        direction,
                    }));
                }
            }
            out.push((ident.clone(), directive, position));
        }

        Ok(out)
    }

    /// Evaluate the marshal expression against a zero value of the record.
    fn wire_type(&self, record: &Ident, field: &Ident, directive: &Directive) -> Result<String, TypeEvalError> {
        let synthetic = format!("{record}::default().{field}");
        let expr = directive.marshal_with(self.options.placeholder, &synthetic);
        let invalid = |reason: &str| TypeEvalError::InvalidExpression {
            expr: directive.marshal.clone(),
            reason: reason.to_string(),
        };

        match self.resolver.eval(&expr) {
            Ok(Evaluated::Value(ty)) if types::is_unit(&ty) => Err(invalid("it evaluates to `()`")),
            Ok(Evaluated::Value(ty)) if types::is_reference(&ty) => Err(invalid(&format!(
                "it evaluates to the borrowed type `{}`",
                types::canonical(&ty)
            ))),
            Ok(Evaluated::Value(ty)) if types::contains_infer(&ty) => {
                Err(invalid(&format!("`{}` is not a concrete type", types::canonical(&ty))))
            }
            Ok(Evaluated::Value(ty)) => Ok(types::canonical(&ty)),
            Ok(Evaluated::Module(name)) => Err(invalid(&format!("`{name}` is a module, not a value"))),
            Ok(Evaluated::TypeName(name)) => Err(invalid(&format!("`{name}` is a type, not a value"))),
            Err(source) => Err(TypeEvalError::Eval {
                expr: directive.marshal.clone(),
                source,
            }),
        }
    }
}

/// String value of `#[attr = "..."]`, or `None` for any other attribute form.
fn directive_text(attr: &Attribute) -> Option<String> {
    let Meta::NameValue(nv) = &attr.meta else {
        return None;
    };
    match &nv.value {
        Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => Some(s.value()),
        _ => None,
    }
}

fn serde_attrs(attrs: &[Attribute]) -> Vec<Attribute> {
    attrs.iter().filter(|a| a.path().is_ident("serde")).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(src: &str) -> ItemStruct {
        syn::parse_str(src).unwrap()
    }

    /// Resolver typing anything mentioning `.unix()` as `i64` and anything else as unresolved.
    fn stub(expr: &str) -> Result<Evaluated, EvalError> {
        if expr.contains("unix()") {
            Ok(Evaluated::Value(types::parse_type("i64").unwrap()))
        } else if expr.contains("as_ref()") {
            Ok(Evaluated::Value(types::parse_type("&str").unwrap()))
        } else if expr.contains("noop()") {
            Ok(Evaluated::Value(types::unit()))
        } else {
            Err(EvalError::UnresolvedName(expr.to_string()))
        }
    }

    fn scan(src: &str) -> Result<Option<RecordDescriptor>, ScanError> {
        let options = ScanOptions::default();
        let resolver = stub;
        RecordScanner::new(&options, &resolver).scan(&item(src), Path::new("pkg/model.rs"))
    }

    #[test]
    fn test_directive_substitution_per_direction() {
        let record = scan(
            r#"struct Event {
                #[customjson = "createTime=$.unix();time.Unix($, 0)"]
                T: Time,
            }"#,
        )
        .unwrap()
        .unwrap();

        let alias = &record.aliases[0];
        assert_eq!(alias.key, "createTime");
        assert_eq!(alias.wire_type, "i64");
        assert_eq!(alias.marshal, "self.T.unix()");
        assert_eq!(alias.unmarshal, "time.Unix(wire.alias_T, 0)");
        assert_eq!(alias.wire_field().to_string(), "alias_T");
        assert_eq!(record.dir, Path::new("pkg"));
        assert_eq!(record.name(), "Event");
    }

    #[test]
    fn test_aliases_follow_field_order() {
        let record = scan(
            r#"struct R {
                #[customjson = "c=$.unix();$"] c: Time,
                plain: u8,
                #[customjson = "a=$.unix();$"] a: Time,
                #[customjson = "b=$.unix();$"] b: Time,
            }"#,
        )
        .unwrap()
        .unwrap();
        let keys: Vec<_> = record.aliases.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["c", "a", "b"]);
        assert_eq!(record.fields.len(), 4);
    }

    #[test]
    fn test_no_annotations_is_not_a_record() {
        assert!(scan("struct Plain { a: u8, #[customjson = \"\"] b: u8 }").unwrap().is_none());
    }

    #[test]
    fn test_malformed_directive_aborts_record() {
        let err = scan(
            r#"struct R {
                #[customjson = "a=$.unix();$"] a: Time,
                #[customjson = "broken"] b: Time,
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.error.kind(), ErrorKind::AnnotationSyntax);
        assert_eq!(err.position.line, 3);
        assert!(matches!(
            err.error,
            RecordError::Annotation(AnnotationError::Directive {
                source: DirectiveError::MissingSeparator,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_expressions_are_reported_at_the_field() {
        let err = scan(
            r#"struct R {
                #[customjson = "a=$.unix();$"] a: Time,
                #[customjson = "b=$.unix(); "] b: Time,
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.position.line, 3);
        assert_eq!(err.error.kind(), ErrorKind::AnnotationSyntax);
        assert_eq!(
            err.error,
            RecordError::Annotation(AnnotationError::EmptyExpression {
                field: "b".to_string(),
                direction: "unmarshal",
            })
        );

        let err = scan(r#"struct R { #[customjson = "a=;$"] a: Time }"#).unwrap_err();
        assert!(matches!(
            err.error,
            RecordError::Annotation(AnnotationError::EmptyExpression { direction: "marshal", .. })
        ));
    }

    #[test]
    fn test_attribute_forms() {
        let list = scan("struct R { #[customjson(a)] a: u8 }").unwrap_err();
        assert!(matches!(list.error, RecordError::Annotation(AnnotationError::Malformed { .. })));

        let duplicate = scan(r#"struct R { #[customjson = "a=$.unix();$"] #[customjson = "b=$;$"] a: u8 }"#).unwrap_err();
        assert!(matches!(duplicate.error, RecordError::Annotation(AnnotationError::Duplicate { .. })));

        let tuple = scan(r#"struct R(#[customjson = "a=$.unix();$"] u8);"#).unwrap_err();
        assert!(matches!(tuple.error, RecordError::Annotation(AnnotationError::UnnamedField { .. })));
    }

    #[test]
    fn test_type_errors_are_reported_at_the_field() {
        let err = scan("struct R {\n    id: u8,\n    #[customjson = \"k=$.missing();$\"]\n    a: u8,\n}").unwrap_err();
        assert_eq!(err.error.kind(), ErrorKind::TypeEvaluation);
        assert_eq!((err.position.line, err.position.column), (3, 5));
        assert!(err.error.to_string().contains("$.missing()"));
    }

    #[test]
    fn test_borrowed_and_unit_types_are_invalid() {
        for src in [
            r#"struct R { #[customjson = "k=$.as_ref();$"] a: String }"#,
            r#"struct R { #[customjson = "k=$.noop();$"] a: String }"#,
        ] {
            let err = scan(src).unwrap_err();
            assert!(
                matches!(err.error, RecordError::TypeEval(TypeEvalError::InvalidExpression { .. })),
                "{err:?}"
            );
        }
    }

    #[test]
    fn test_generic_records_are_rejected_at_the_declaration() {
        let err = scan(r#"struct R<T> { #[customjson = "k=$.unix();$"] a: T }"#).unwrap_err();
        assert_eq!(err.error.kind(), ErrorKind::GenerationContract);
    }

    #[test]
    fn test_custom_attribute_and_placeholder() {
        let options = ScanOptions {
            attribute: "wire".to_string(),
            placeholder: '@',
        };
        let resolver = stub;
        let record = RecordScanner::new(&options, &resolver)
            .scan(
                &item(r#"struct R { #[wire = "k=@.unix();T::from(@)"] #[customjson = "ignored"] a: Time }"#),
                Path::new("m.rs"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(record.aliases[0].marshal, "self.a.unix()");
        assert_eq!(record.aliases[0].unmarshal, "T::from(wire.alias_a)");
    }

    #[test]
    fn test_serde_attributes_are_kept() {
        let record = scan(
            r#"#[serde(rename_all = "camelCase")]
            #[derive(Debug)]
            struct R {
                #[serde(skip)]
                #[customjson = "k=$.unix();$"]
                a: Time,
            }"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.serde_attrs.len(), 1);
        assert_eq!(record.fields[0].serde_attrs.len(), 1);
    }

    #[test]
    fn test_diagnostic_carries_hint() {
        let diag = scan(r#"struct R { #[customjson = "=x;y"] a: u8 }"#).unwrap_err().into_diagnostic();
        assert_eq!(diag.kind, ErrorKind::AnnotationSyntax);
        insta::assert_snapshot!(diag.message, @r#"invalid `customjson` directive "=x;y": output key before `=` is empty"#);
        assert_eq!(diag.hints.len(), 1);
    }
}
