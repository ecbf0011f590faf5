//! Assemble, normalize and persist generated files.
//!
//! A generated file is the banner, the package clause and the two impls, passed through an [`ImportNormalizer`] and
//! written to `<record dir>/<lowercase name><suffix>`. Writes are whole-file; an identical file is left untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use aliasgen_core::lang::conventions;
use quote::ToTokens;
use syn::visit::Visit;
use syn::{Item, UseTree};
use thiserror::Error;

use super::templates::RenderedImpls;
use crate::frontend::record::RecordDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("generated text does not parse: {0}")]
    Parse(String),
}

/// Rewrites generated text so its import list is minimal and correct.
pub trait ImportNormalizer {
    fn normalize(&self, path: &Path, text: &str) -> Result<String, NormalizeError>;
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot normalize `{}`: {source}", path.display())]
    Normalize {
        path: PathBuf,
        #[source]
        source: NormalizeError,
    },

    #[error("cannot write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{}` is claimed by both `{first}` and `{second}`", path.display())]
    Collision { path: PathBuf, first: String, second: String },

    #[error("`{}` is out of date", path.display())]
    OutOfDate { path: PathBuf },

    #[error("`{}` is missing", path.display())]
    Missing { path: PathBuf },

    #[error("refusing to overwrite `{}`: it was not generated by aliasgen", path.display())]
    Foreign { path: PathBuf },
}

// ============================================================================
// Normalizer
// ============================================================================

/// The shipped [`ImportNormalizer`]: prune unused imports, sort them first, format with `prettyplease`.
///
/// Leading `//` comment lines are kept verbatim. Glob imports, `as _` imports and capitalized names (types and
/// traits whose use may be implicit, such as method resolution) are never pruned.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyImports;

impl ImportNormalizer for PrettyImports {
    fn normalize(&self, _path: &Path, text: &str) -> Result<String, NormalizeError> {
        let (header, body) = split_header(text);
        let mut file = syn::parse_file(body).map_err(|e| NormalizeError::Parse(e.to_string()))?;

        let used = used_idents(&file);
        let mut uses: BTreeMap<String, syn::ItemUse> = BTreeMap::new();
        let mut rest = Vec::new();
        for item in std::mem::take(&mut file.items) {
            match item {
                Item::Use(mut item_use) => {
                    if prune_tree(&mut item_use.tree, &used) {
                        let key = item_use.to_token_stream().to_string();
                        uses.entry(key).or_insert(item_use);
                    }
                }
                other => rest.push(other),
            }
        }
        file.items = uses.into_values().map(Item::Use).chain(rest).collect();

        let formatted = prettyplease::unparse(&file);
        Ok(if header.is_empty() {
            formatted
        } else {
            format!("{header}\n{formatted}")
        })
    }
}

/// Split leading plain `//` comment lines (and blank lines among them) from the rest.
fn split_header(text: &str) -> (String, &str) {
    let mut header = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        let is_comment = trimmed.starts_with("//") && !trimmed.starts_with("///") && !trimmed.starts_with("//!");
        if !is_comment && !trimmed.is_empty() {
            break;
        }
        if is_comment {
            header.push(trimmed.to_string());
        }
        offset += line.len();
    }
    let header = if header.is_empty() {
        String::new()
    } else {
        format!("{}\n", header.join("\n"))
    };
    (header, &text[offset..])
}

/// Identifiers mentioned outside `use` items, including inside macro bodies.
fn used_idents(file: &syn::File) -> HashSet<String> {
    struct Collector(HashSet<String>);
    impl<'ast> Visit<'ast> for Collector {
        fn visit_item_use(&mut self, _: &'ast syn::ItemUse) {}
        fn visit_ident(&mut self, ident: &'ast proc_macro2::Ident) {
            self.0.insert(ident.to_string());
        }
        fn visit_macro(&mut self, mac: &'ast syn::Macro) {
            syn::visit::visit_macro(self, mac);
            collect_token_idents(mac.tokens.clone(), &mut self.0);
        }
        fn visit_attribute(&mut self, attr: &'ast syn::Attribute) {
            syn::visit::visit_attribute(self, attr);
            collect_token_idents(attr.meta.to_token_stream(), &mut self.0);
        }
    }
    let mut collector = Collector(HashSet::new());
    collector.visit_file(file);
    collector.0
}

fn collect_token_idents(tokens: proc_macro2::TokenStream, out: &mut HashSet<String>) {
    for tree in tokens {
        match tree {
            proc_macro2::TokenTree::Ident(ident) => {
                out.insert(ident.to_string());
            }
            proc_macro2::TokenTree::Group(group) => collect_token_idents(group.stream(), out),
            _ => {}
        }
    }
}

/// Remove unused names from `tree`. Returns `false` when nothing is left.
fn prune_tree(tree: &mut UseTree, used: &HashSet<String>) -> bool {
    match tree {
        UseTree::Path(path) => prune_tree(&mut path.tree, used),
        UseTree::Name(name) => {
            let ident = name.ident.to_string();
            ident == "self" || is_capitalized(&ident) || used.contains(&ident)
        }
        UseTree::Rename(rename) => {
            let alias = rename.rename.to_string();
            alias == "_" || is_capitalized(&alias) || used.contains(&alias)
        }
        UseTree::Glob(_) => true,
        UseTree::Group(group) => {
            let items = std::mem::take(&mut group.items);
            let mut seen = BTreeSet::new();
            for mut item in items {
                if prune_tree(&mut item, used) && seen.insert(item.to_token_stream().to_string()) {
                    group.items.push(item);
                }
            }
            !group.items.is_empty()
        }
    }
}

fn is_capitalized(ident: &str) -> bool {
    ident.trim_start_matches("r#").starts_with(|c: char| c.is_uppercase())
}

// ============================================================================
// Writer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Write changed files.
    Write,
    /// Compare only; differences are errors.
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Created => write!(f, "created"),
            FileStatus::Updated => write!(f, "updated"),
            FileStatus::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Identity of the record claiming an output path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    record: String,
    source: PathBuf,
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.record, self.source.display())
    }
}

/// Writes generated files for one run.
pub struct OutputWriter<N> {
    normalizer: N,
    suffix: String,
    mode: WriteMode,
    claimed: HashMap<PathBuf, Claim>,
}

impl<N: ImportNormalizer> OutputWriter<N> {
    pub fn new(normalizer: N, suffix: impl Into<String>, mode: WriteMode) -> Self {
        Self {
            normalizer,
            suffix: suffix.into(),
            mode,
            claimed: HashMap::new(),
        }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Output path for `record`.
    pub fn output_path(&self, record: &RecordDescriptor) -> PathBuf {
        record
            .dir
            .join(conventions::output_file_name(&record.name(), &self.suffix))
    }

    /// Produce the final text of the file for `record`, claiming its output path.
    pub fn render(&mut self, record: &RecordDescriptor, impls: &RenderedImpls) -> Result<(PathBuf, String), PersistenceError> {
        let path = self.output_path(record);
        self.claim(&path, record)?;
        let text = self
            .normalizer
            .normalize(&path, &assemble(impls))
            .map_err(|source| PersistenceError::Normalize {
                path: path.clone(),
                source,
            })?;
        Ok((path, text))
    }

    fn claim(&mut self, path: &Path, record: &RecordDescriptor) -> Result<(), PersistenceError> {
        let claim = Claim {
            record: record.name(),
            source: record.source.clone(),
        };
        match self.claimed.get(path) {
            Some(existing) if *existing != claim => Err(PersistenceError::Collision {
                path: path.to_path_buf(),
                first: existing.to_string(),
                second: claim.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.claimed.insert(path.to_path_buf(), claim);
                Ok(())
            }
        }
    }

    /// Persist `text` at `path` according to the write mode.
    pub fn persist(&self, path: &Path, text: &str) -> Result<FileStatus, PersistenceError> {
        let existing = match fs::read_to_string(path) {
            Ok(existing) => Some(existing),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if let Some(existing) = &existing {
            if !conventions::is_generated(existing) {
                return Err(PersistenceError::Foreign { path: path.to_path_buf() });
            }
            if existing == text {
                return Ok(FileStatus::Unchanged);
            }
        }

        match (self.mode, existing.is_some()) {
            (WriteMode::Check, true) => Err(PersistenceError::OutOfDate { path: path.to_path_buf() }),
            (WriteMode::Check, false) => Err(PersistenceError::Missing { path: path.to_path_buf() }),
            (WriteMode::Write, exists) => {
                fs::write(path, text).map_err(|source| PersistenceError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(if exists { FileStatus::Updated } else { FileStatus::Created })
            }
        }
    }
}

/// Banner, package clause and both impls, before normalization.
pub fn assemble(impls: &RenderedImpls) -> String {
    format!(
        "{}\n\n{}\n\n{}\n\n{}\n",
        conventions::BANNER,
        conventions::PACKAGE_CLAUSE,
        impls.encode.to_token_stream(),
        impls.decode.to_token_stream()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::diagnostics::Position;

    fn normalize(text: &str) -> String {
        PrettyImports.normalize(Path::new("x.rs"), text).unwrap()
    }

    #[test]
    fn test_header_is_kept_and_body_formatted() {
        let out = normalize("// Code generated by aliasgen. DO NOT EDIT.\n\nuse super::*;\nfn  f( ) { }\n");
        insta::assert_snapshot!(out, @r"
        // Code generated by aliasgen. DO NOT EDIT.

        use super::*;
        fn f() {}
        ");
    }

    #[test]
    fn test_unused_imports_are_pruned_and_sorted() {
        let out = normalize(
            "use std::fmt::{self, write};\nuse std::time::Duration;\nuse std::collections::{hash_map, btree_map};\nuse std::fmt::{self, write};\nfn f() -> fmt::Result { let _ = hash_map::HashMap::<u8, u8>::new(); Ok(()) }\n",
        );
        assert!(out.contains("use std::collections::{hash_map};") || out.contains("use std::collections::hash_map;"));
        assert!(!out.contains("btree_map"));
        assert!(!out.contains("write"));
        assert!(out.contains("use std::time::Duration;"));
        assert_eq!(out.matches("use std::fmt").count(), 1);
        let collections = out.find("use std::collections").unwrap();
        let time = out.find("use std::time").unwrap();
        assert!(collections < time);
    }

    #[test]
    fn test_imports_used_in_macros_are_kept() {
        let out = normalize("use std::mem::swap;\nfn f() { call!(swap); }\n");
        assert!(out.contains("use std::mem::swap;"));
    }

    #[test]
    fn test_unparseable_text_is_an_error() {
        assert!(PrettyImports.normalize(Path::new("x.rs"), "fn (").is_err());
    }

    fn record(name: &str, source: &str, dir: &Path) -> RecordDescriptor {
        RecordDescriptor {
            ident: quote::format_ident!("{}", name),
            dir: dir.to_path_buf(),
            source: PathBuf::from(source),
            position: Position::file_start(source),
            serde_attrs: Vec::new(),
            fields: Vec::new(),
            aliases: Vec::new(),
        }
    }

    fn impls() -> RenderedImpls {
        RenderedImpls {
            encode: syn::parse_quote!(impl A for B {}),
            decode: syn::parse_quote!(impl C for B {}),
        }
    }

    #[test]
    fn test_output_path_and_collisions() {
        let mut writer = OutputWriter::new(PrettyImports, conventions::DEFAULT_SUFFIX, WriteMode::Write);
        let dir = Path::new("pkg");
        let (path, text) = writer.render(&record("Event", "pkg/a.rs", dir), &impls()).unwrap();
        assert_eq!(path, Path::new("pkg/event_json.rs"));
        assert!(conventions::is_generated(&text));

        // Same record again is not a collision.
        assert!(writer.render(&record("Event", "pkg/a.rs", dir), &impls()).is_ok());
        let err = writer.render(&record("EVENT", "pkg/b.rs", dir), &impls()).unwrap_err();
        assert!(matches!(err, PersistenceError::Collision { .. }), "{err}");
    }

    #[test]
    fn test_persist_statuses() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("event_json.rs");
        let text = format!("{}\n\nuse super::*;\n", conventions::BANNER);

        let writer = OutputWriter::new(PrettyImports, conventions::DEFAULT_SUFFIX, WriteMode::Write);
        assert_eq!(writer.persist(&path, &text).unwrap(), FileStatus::Created);
        assert_eq!(writer.persist(&path, &text).unwrap(), FileStatus::Unchanged);
        let changed = format!("{text}\nfn f() {{}}\n");
        assert_eq!(writer.persist(&path, &changed).unwrap(), FileStatus::Updated);
        assert_eq!(fs::read_to_string(&path).unwrap(), changed);
    }

    #[test]
    fn test_check_mode_never_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("event_json.rs");
        let text = format!("{}\n\nuse super::*;\n", conventions::BANNER);
        let checker = OutputWriter::new(PrettyImports, conventions::DEFAULT_SUFFIX, WriteMode::Check);

        assert!(matches!(checker.persist(&path, &text), Err(PersistenceError::Missing { .. })));
        assert!(!path.exists());

        fs::write(&path, format!("{text}// stale\n")).unwrap();
        assert!(matches!(checker.persist(&path, &text), Err(PersistenceError::OutOfDate { .. })));

        fs::write(&path, &text).unwrap();
        assert_eq!(checker.persist(&path, &text).unwrap(), FileStatus::Unchanged);
    }

    #[test]
    fn test_foreign_files_are_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("event_json.rs");
        fs::write(&path, "// hand written\n").unwrap();
        let writer = OutputWriter::new(PrettyImports, conventions::DEFAULT_SUFFIX, WriteMode::Write);
        let text = format!("{}\n", conventions::BANNER);
        assert!(matches!(writer.persist(&path, &text), Err(PersistenceError::Foreign { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "// hand written\n");
    }
}
