//! Diagnostics and error reporting for aliasgen
//!
//! Every failure the pipeline can survive becomes a [`Diagnostic`] handed to a [`DiagnosticSink`]. Rendering goes
//! through `miette`'s graphical handler so the offending source line is shown with the diagnostic.

use std::fmt;
use std::path::{Path, PathBuf};

use miette::{GraphicalReportHandler, GraphicalTheme, LabeledSpan, NamedSource, SourceSpan};
use proc_macro2::Span;

/// A location in a scanned source file (1-based line and column).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    /// Number of columns to underline; at least 1.
    pub width: usize,
}

impl Position {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line: line.max(1),
            column: column.max(1),
            width: 1,
        }
    }

    /// Start of `file`, used when no better location exists.
    pub fn file_start(file: impl Into<PathBuf>) -> Self {
        Self::new(file, 1, 1)
    }

    /// Position of a span produced by parsing `file`.
    ///
    /// proc-macro2 reports 1-based lines and 0-based columns.
    pub fn from_span(file: &Path, span: Span) -> Self {
        let start = span.start();
        let end = span.end();
        let width = if end.line == start.line && end.column > start.column {
            end.column - start.column
        } else {
            1
        };
        Self {
            width,
            ..Self::new(file, start.line, start.column + 1)
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AnnotationSyntax,
    TypeEvaluation,
    GenerationContract,
    Persistence,
    Source,
}

impl ErrorKind {
    /// Stable diagnostic code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AnnotationSyntax => "aliasgen::annotation",
            ErrorKind::TypeEvaluation => "aliasgen::type_eval",
            ErrorKind::GenerationContract => "aliasgen::generate",
            ErrorKind::Persistence => "aliasgen::persist",
            ErrorKind::Source => "aliasgen::source",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::AnnotationSyntax => write!(f, "annotation syntax error"),
            ErrorKind::TypeEvaluation => write!(f, "type evaluation error"),
            ErrorKind::GenerationContract => write!(f, "generation error"),
            ErrorKind::Persistence => write!(f, "persistence error"),
            ErrorKind::Source => write!(f, "source error"),
        }
    }
}

/// A reported failure with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: Position,
    pub kind: ErrorKind,
    pub message: String,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            kind,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.position, self.kind, self.message)
    }
}

/// Receiver of diagnostics emitted during a run.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Sink that keeps every diagnostic in emission order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// `miette` view of a diagnostic together with the text of its file.
#[derive(Debug)]
struct Report<'a> {
    diagnostic: &'a Diagnostic,
    source: Option<NamedSource<String>>,
    span: Option<SourceSpan>,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diagnostic.message)
    }
}

impl std::error::Error for Report<'_> {}

impl miette::Diagnostic for Report<'_> {
    fn code<'b>(&'b self) -> Option<Box<dyn fmt::Display + 'b>> {
        Some(Box::new(self.diagnostic.kind.code()))
    }

    fn help<'b>(&'b self) -> Option<Box<dyn fmt::Display + 'b>> {
        if self.diagnostic.hints.is_empty() {
            None
        } else {
            Some(Box::new(self.diagnostic.hints.join("\n")))
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source.as_ref().map(|s| s as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        let label = LabeledSpan::new_with_span(Some(self.diagnostic.kind.to_string()), span);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Render `diagnostic` with the source line it points at.
///
/// `source` is the text of `diagnostic.position.file`; without it (or when the position lies outside the text) the
/// plain one-line form is used for the location.
pub fn render(diagnostic: &Diagnostic, source: Option<&str>, color: bool) -> String {
    let span = source.and_then(|text| byte_span(text, &diagnostic.position));
    let report = Report {
        diagnostic,
        source: match (source, span) {
            (Some(text), Some(_)) => Some(NamedSource::new(
                diagnostic.position.file.display().to_string(),
                text.to_string(),
            )),
            _ => None,
        },
        span,
    };

    let theme = if color {
        GraphicalTheme::unicode()
    } else {
        GraphicalTheme::unicode_nocolor()
    };
    let mut out = String::new();
    if GraphicalReportHandler::new_themed(theme)
        .render_report(&mut out, &report)
        .is_err()
    {
        return format!("{diagnostic}\n");
    }
    if report.span.is_none() {
        out.push_str(&format!("  --> {}\n", diagnostic.position));
    }
    out
}

/// Byte range covered by `position` within `source`.
fn byte_span(source: &str, position: &Position) -> Option<SourceSpan> {
    let line_start = match position.line {
        0 | 1 => 0,
        n => source.match_indices('\n').nth(n - 2).map(|(i, _)| i + 1)?,
    };
    let line = source[line_start..].split('\n').next().unwrap_or("");

    // Columns count characters, not bytes.
    let mut chars = line.char_indices().map(|(i, _)| i).chain(std::iter::once(line.len()));
    let column = position.column.saturating_sub(1);
    let start = chars.nth(column)?;
    let end = line
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
        .nth(column + position.width)
        .unwrap_or(line.len());

    Some(SourceSpan::from((line_start + start, end.saturating_sub(start).max(1))))
}
