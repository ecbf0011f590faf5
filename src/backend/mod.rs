//! aliasgen backend
//!
//! Turns a scanned [`RecordDescriptor`](crate::frontend::record::RecordDescriptor) into a generated file on disk.
//!
//! The pipeline is:
//! 1. `templates` renders the encode and decode impls with `quote!`
//! 2. `writer` assembles banner, package clause and impls, normalizes imports and persists the file
//!
//! ## Module Organization
//!
//! - `templates.rs` - Fixed impl shapes for `Serialize` / `Deserialize`
//! - `writer.rs` - Import normalization, output paths, write/check modes

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod templates;
pub mod writer;

pub use templates::{GenerateError, RenderedImpls, render};
pub use writer::{FileStatus, ImportNormalizer, OutputWriter, PersistenceError, PrettyImports, WriteMode};
