//! One generation pass: discover → scope → scan → render → persist.
//!
//! Packages are processed in sorted directory order, files in sorted order and structs in declaration order. Any
//! error aborts only the record it belongs to; the pass always runs to the end.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use syn::Item;

use crate::backend::templates;
use crate::backend::writer::{FileStatus, OutputWriter, PersistenceError, PrettyImports, WriteMode};
use crate::config::{Config, ConfigError};
use crate::frontend::diagnostics::{Diagnostic, DiagnosticSink, ErrorKind};
use crate::frontend::evaluator::{SignatureTable, StaticResolver};
use crate::frontend::record::{AliasDirective, RecordDescriptor, RecordScanner, ScanOptions};
use crate::frontend::scope::{self, PackageScope};
use crate::frontend::source::{self, Package, SourceError, SourceFile};

/// What to do with rendered files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write (or check) files on disk.
    Persist(WriteMode),
    /// Render only.
    Preview,
}

/// One record's generated output.
#[derive(Debug, Clone)]
pub struct Generated {
    pub record: String,
    pub source: PathBuf,
    pub path: PathBuf,
    /// `None` for [`Action::Preview`].
    pub status: Option<FileStatus>,
    pub aliases: Vec<AliasDirective>,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub generated: Vec<Generated>,
    /// Number of diagnostics reported to the sink.
    pub diagnostics: usize,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.diagnostics == 0
    }
}

/// Forwards to the inner sink, counting.
struct Counting<'s, S: ?Sized> {
    inner: &'s mut S,
    count: usize,
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Counting<'_, S> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.count += 1;
        self.inner.report(diagnostic);
    }
}

/// Settings resolved from a [`Config`] for the whole pass.
pub struct Pass<'c> {
    config: &'c Config,
    options: ScanOptions,
    signatures: SignatureTable,
}

impl<'c> Pass<'c> {
    pub fn new(config: &'c Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            options: config.scan_options(),
            signatures: config.signature_table()?,
        })
    }

    /// Packages under `paths`; missing paths are reported.
    pub fn discover(&self, paths: &[PathBuf], sink: &mut dyn DiagnosticSink) -> Vec<Package> {
        let (packages, errors) = source::discover(paths, &self.config.exclude);
        for error in errors {
            tracing::warn!(error = %error, "skipping input path");
            sink.report(error.into_diagnostic());
        }
        packages
    }

    /// Scan every top-level struct of the package's target files.
    #[tracing::instrument(skip_all, fields(dir = %package.dir.display()))]
    pub fn scan_package(&self, package: &Package, sink: &mut dyn DiagnosticSink) -> Vec<RecordDescriptor> {
        let mut loaded: BTreeMap<PathBuf, Result<Option<SourceFile>, SourceError>> = BTreeMap::new();
        match source::package_files(&package.dir) {
            Ok(files) => {
                for file in files {
                    let result = source::load(&file);
                    loaded.insert(file, result);
                }
            }
            Err(error) => {
                sink.report(error.into_diagnostic());
                return Vec::new();
            }
        }
        for target in &package.targets {
            if !loaded.contains_key(target) {
                loaded.insert(target.clone(), source::load(target));
            }
        }

        let mut files = Vec::new();
        for (path, result) in loaded {
            match result {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err(error) if package.targets.contains(&path) => sink.report(error.into_diagnostic()),
                Err(error) => tracing::warn!(error = %error, "sibling file left out of the package scope"),
            }
        }

        let mut scope = PackageScope::from_files(files.iter().map(|f| &f.syntax));
        let imported = load_imported(&files);
        if !imported.is_empty() {
            tracing::debug!(files = imported.len(), "following crate-local imports");
            scope.absorb(PackageScope::from_files(imported.iter().map(|f| &f.syntax)));
        }
        let resolver = StaticResolver::new(&scope, &self.signatures);
        let scanner = RecordScanner::new(&self.options, &resolver);

        let mut records = Vec::new();
        for file in files.iter().filter(|f| package.targets.contains(&f.path)) {
            tracing::debug!(file = %file.path.display(), "scanning");
            for item in &file.syntax.items {
                let Item::Struct(item) = item else {
                    continue;
                };
                match scanner.scan(item, &file.path) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(record = %item.ident, error = %error, "record skipped");
                        sink.report(error.into_diagnostic());
                    }
                }
            }
        }
        records
    }

    /// Render and, for [`Action::Persist`], write the output of one record.
    pub fn generate(
        &self,
        record: &RecordDescriptor,
        writer: &mut OutputWriter<PrettyImports>,
        action: Action,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Generated> {
        let impls = match templates::render(record) {
            Ok(impls) => impls,
            Err(e) => {
                sink.report(Diagnostic::new(
                    ErrorKind::GenerationContract,
                    record.position.clone(),
                    format!("failed to generate: {e}"),
                ));
                return None;
            }
        };

        let outcome = writer.render(record, &impls).and_then(|(path, text)| {
            let status = match action {
                Action::Persist(_) => Some(writer.persist(&path, &text)?),
                Action::Preview => None,
            };
            Ok((path, text, status))
        });

        match outcome {
            Ok((path, text, status)) => {
                if let Some(status) = status {
                    tracing::info!(record = %record.name(), path = %path.display(), %status, "generated");
                }
                Some(Generated {
                    record: record.name(),
                    source: record.source.clone(),
                    path,
                    status,
                    aliases: record.aliases.clone(),
                    text,
                })
            }
            Err(e) => {
                sink.report(persistence_diagnostic(record, e));
                None
            }
        }
    }
}

/// Files declaring the crate-local items `files` import, followed transitively.
fn load_imported(files: &[SourceFile]) -> Vec<SourceFile> {
    let mut seen: BTreeSet<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
    let mut pending: Vec<PathBuf> = files.iter().flat_map(imported_files).collect();
    let mut loaded = Vec::new();

    while let Some(path) = pending.pop() {
        if !seen.insert(path.clone()) {
            continue;
        }
        match source::load(&path) {
            Ok(Some(file)) => {
                pending.extend(imported_files(&file));
                loaded.push(file);
            }
            Ok(None) => {}
            Err(error) => tracing::warn!(error = %error, "imported file left out of the package scope"),
        }
    }
    loaded
}

fn imported_files(file: &SourceFile) -> Vec<PathBuf> {
    scope::use_paths(&file.syntax)
        .iter()
        .flat_map(|path| source::import_candidates(&file.path, path))
        .collect()
}

fn persistence_diagnostic(record: &RecordDescriptor, error: PersistenceError) -> Diagnostic {
    let hint = match &error {
        PersistenceError::OutOfDate { .. } | PersistenceError::Missing { .. } => {
            Some("run `aliasgen generate` to update generated files")
        }
        PersistenceError::Collision { .. } => Some("output names are lowercased; rename one of the records"),
        PersistenceError::Foreign { .. } => Some("move or rename the existing file"),
        _ => None,
    };
    let diagnostic = Diagnostic::new(
        ErrorKind::Persistence,
        record.position.clone(),
        format!("failed to generate: {error}"),
    );
    match hint {
        Some(hint) => diagnostic.with_hint(hint),
        None => diagnostic,
    }
}

/// Run a full pass over `paths`.
#[tracing::instrument(skip_all, fields(paths = paths.len()))]
pub fn run<S: DiagnosticSink + ?Sized>(
    paths: &[PathBuf],
    config: &Config,
    action: Action,
    sink: &mut S,
) -> Result<RunReport, ConfigError> {
    let pass = Pass::new(config)?;
    let mode = match action {
        Action::Persist(mode) => mode,
        Action::Preview => WriteMode::Check,
    };
    let mut writer = OutputWriter::new(PrettyImports, config.suffix.clone(), mode);
    let mut counting = Counting { inner: sink, count: 0 };
    let mut generated = Vec::new();

    for package in pass.discover(paths, &mut counting) {
        for record in pass.scan_package(&package, &mut counting) {
            if let Some(output) = pass.generate(&record, &mut writer, action, &mut counting) {
                generated.push(output);
            }
        }
    }

    tracing::debug!(generated = generated.len(), diagnostics = counting.count, "pass finished");
    Ok(RunReport {
        generated,
        diagnostics: counting.count,
    })
}

/// Scan records of `paths` without rendering them.
pub fn scan<S: DiagnosticSink + ?Sized>(
    paths: &[PathBuf],
    config: &Config,
    sink: &mut S,
) -> Result<Vec<RecordDescriptor>, ConfigError> {
    let pass = Pass::new(config)?;
    let mut counting = Counting { inner: sink, count: 0 };
    let mut records = Vec::new();
    for package in pass.discover(paths, &mut counting) {
        records.extend(pass.scan_package(&package, &mut counting));
    }
    Ok(records)
}

/// Parsed directives and inferred wire types, one line per alias.
pub fn describe_records(records: &[RecordDescriptor]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!("{} ({})\n", record.name(), record.position));
        for alias in &record.aliases {
            out.push_str(&format!(
                "  {} -> \"{}\": {}\n    marshal:   {}\n    unmarshal: {}\n",
                alias.field, alias.key, alias.wire_type, alias.marshal, alias.unmarshal
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::diagnostics::Diagnostics;
    use std::fs;

    const MODEL: &str = r#"
use std::time::Duration;

pub struct Session {
    pub id: u64,
    #[customjson = "ttlSecs=$.as_secs();Duration::from_secs($)"]
    pub ttl: Duration,
}
"#;

    #[test]
    fn test_preview_does_not_write() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("model.rs"), MODEL).unwrap();
        let mut sink = Diagnostics::new();
        let report = run(&[tmp.path().to_path_buf()], &Config::default(), Action::Preview, &mut sink).unwrap();

        assert!(report.succeeded(), "{:?}", sink.into_vec());
        assert_eq!(report.generated.len(), 1);
        let generated = &report.generated[0];
        assert_eq!(generated.status, None);
        assert_eq!(generated.aliases[0].wire_type, "u64");
        assert!(!generated.path.exists());
    }

    #[test]
    fn test_describe_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model.rs");
        fs::write(&path, MODEL).unwrap();
        let mut sink = Diagnostics::new();
        let records = scan(&[path], &Config::default(), &mut sink).unwrap();
        let text = describe_records(&records);
        assert!(text.starts_with("Session ("), "{text}");
        assert!(text.contains("ttl -> \"ttlSecs\": u64"), "{text}");
        assert!(text.contains("marshal:   self.ttl.as_secs()"), "{text}");
        assert!(text.contains("unmarshal: Duration::from_secs(wire.alias_ttl)"), "{text}");
    }

    #[test]
    fn test_missing_path_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = Diagnostics::new();
        let report = run(
            &[tmp.path().join("nope")],
            &Config::default(),
            Action::Persist(WriteMode::Write),
            &mut sink,
        )
        .unwrap();
        assert!(!report.succeeded());
        assert_eq!(sink.iter().next().map(|d| d.kind), Some(ErrorKind::Source));
    }

    #[test]
    fn test_invalid_config_aborts_before_scanning() {
        let config = Config {
            suffix: "x".to_string(),
            ..Config::default()
        };
        let mut sink = Diagnostics::new();
        assert!(run(&[PathBuf::from(".")], &config, Action::Preview, &mut sink).is_err());
        assert!(sink.is_empty());
    }
}
