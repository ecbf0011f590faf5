//! Source discovery and loading.
//!
//! Input paths are expanded into packages: one [`Package`] per directory, holding the `.rs` files to scan. Generated
//! files (those starting with the banner) are never loaded as input.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use aliasgen_core::lang::conventions;
use thiserror::Error;

use super::diagnostics::{Diagnostic, ErrorKind, Position};

/// Maximum source file size (100 MB)
///
/// Larger files are rejected instead of being read into memory.
pub const MAX_SOURCE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("path `{}` does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source file `{}` is too large ({size} bytes, max {MAX_SOURCE_SIZE} bytes)", path.display())]
    TooLarge { path: PathBuf, size: u64 },

    #[error("cannot parse `{}`: {message}", position.file.display())]
    Parse { position: Position, message: String },
}

impl SourceError {
    pub fn position(&self) -> Position {
        match self {
            SourceError::NotFound { path } | SourceError::Io { path, .. } | SourceError::TooLarge { path, .. } => {
                Position::file_start(path)
            }
            SourceError::Parse { position, .. } => position.clone(),
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let position = self.position();
        let message = match &self {
            SourceError::Parse { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Diagnostic::new(ErrorKind::Source, position, message)
    }
}

/// All files of one directory selected for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub dir: PathBuf,
    /// Files whose records are scanned, sorted.
    pub targets: Vec<PathBuf>,
}

/// A loaded and parsed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub syntax: syn::File,
}

/// Collect `.rs` files under `path`, skipping hidden directories and `exclude`d directory names.
pub fn collect_rust_files(path: &Path, exclude: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if path.is_file() {
        if is_rust_file(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                let entry_path = entry.path();
                if entry_path.is_dir() {
                    let name = entry_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                    if !name.starts_with('.') && !exclude.iter().any(|e| e == name) {
                        files.extend(collect_rust_files(&entry_path, exclude));
                    }
                } else if is_rust_file(&entry_path) {
                    files.push(entry_path);
                }
            }
        }
    }

    files
}

fn is_rust_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rs")
}

/// Expand input paths into packages, sorted by directory.
///
/// Missing paths are returned as errors alongside the packages found for the others.
pub fn discover(paths: &[PathBuf], exclude: &[String]) -> (Vec<Package>, Vec<SourceError>) {
    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut errors = Vec::new();

    for path in paths {
        if !path.exists() {
            errors.push(SourceError::NotFound { path: path.clone() });
            continue;
        }
        for file in collect_rust_files(path, exclude) {
            let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
            by_dir.entry(dir).or_default().push(file);
        }
    }

    let packages = by_dir
        .into_iter()
        .map(|(dir, mut targets)| {
            targets.sort();
            targets.dedup();
            Package { dir, targets }
        })
        .collect();
    (packages, errors)
}

/// Every `.rs` file directly inside `dir`, sorted. This is the resolution scope of the package.
pub fn package_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let read_dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let entries = fs::read_dir(read_dir).map_err(|source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_rust_file(p))
        .map(|p| if dir.as_os_str().is_empty() { PathBuf::from(p.file_name().unwrap_or_default()) } else { p })
        .collect();
    files.sort();
    Ok(files)
}

/// Nearest ancestor directory of `file` holding a `lib.rs` or `main.rs`.
pub fn crate_root(file: &Path) -> Option<PathBuf> {
    let start = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    start
        .ancestors()
        .find(|dir| dir.join("lib.rs").is_file() || dir.join("main.rs").is_file())
        .map(Path::to_path_buf)
}

/// Directory holding the child modules of the module defined by `file`.
fn children_dir(file: &Path) -> PathBuf {
    let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
    match file.file_stem().and_then(|s| s.to_str()) {
        Some("mod" | "lib" | "main") | None => dir,
        Some(stem) => dir.join(stem),
    }
}

/// Files of the module whose children live in `dir`.
fn module_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = vec![dir.join("mod.rs"), dir.join("lib.rs"), dir.join("main.rs")];
    if let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) {
        let mut file = name.to_os_string();
        file.push(".rs");
        files.push(parent.join(file));
    }
    files
}

/// Existing files that may declare the item a crate-local `use` path names.
///
/// `crate::a::b::Item` looks in module `a::b` under the [`crate_root`]; `self::` and `super::` start from the module
/// of `importer`. The last segment may itself be a module, so its files are included too. Paths into other crates
/// yield nothing.
pub fn import_candidates(importer: &Path, path: &[String]) -> Vec<PathBuf> {
    let Some((first, _)) = path.split_first() else {
        return Vec::new();
    };
    let (mut base, mut rest) = match first.as_str() {
        "crate" => match crate_root(importer) {
            Some(root) => (root, &path[1..]),
            None => return Vec::new(),
        },
        "self" | "super" => (children_dir(importer), path),
        _ => return Vec::new(),
    };
    if rest.first().is_some_and(|s| s == "self") {
        rest = &rest[1..];
    }
    while rest.first().is_some_and(|s| s == "super") {
        match base.parent() {
            Some(parent) => base = parent.to_path_buf(),
            None => return Vec::new(),
        }
        rest = &rest[1..];
    }

    let mut candidates = Vec::new();
    for depth in (rest.len().saturating_sub(1)..=rest.len()).rev() {
        let dir = rest[..depth].iter().fold(base.clone(), |dir, segment| dir.join(segment));
        candidates.extend(module_files(&dir));
    }
    candidates.retain(|file| file.is_file() && file != importer);
    candidates.dedup();
    candidates
}

/// Read a source file, enforcing [`MAX_SOURCE_SIZE`].
pub fn read_source(path: &Path) -> Result<String, SourceError> {
    let metadata = fs::metadata(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if metadata.len() > MAX_SOURCE_SIZE {
        return Err(SourceError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
        });
    }

    fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse `path`. Returns `Ok(None)` for generated files.
pub fn load(path: &Path) -> Result<Option<SourceFile>, SourceError> {
    let text = read_source(path)?;
    if conventions::is_generated(&text) {
        tracing::debug!(file = %path.display(), "skipping generated file");
        return Ok(None);
    }
    let syntax = parse(path, &text)?;
    Ok(Some(SourceFile {
        path: path.to_path_buf(),
        text,
        syntax,
    }))
}

/// Parse `text` as the contents of `path`.
pub fn parse(path: &Path, text: &str) -> Result<syn::File, SourceError> {
    syn::parse_file(text).map_err(|err| SourceError::Parse {
        position: Position::from_span(path, err.span()),
        message: err.to_string(),
    })
}
