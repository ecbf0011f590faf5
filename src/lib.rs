#![forbid(unsafe_code)]
//! aliasgen: serde impls from per-field alias directives
//!
//! Structs whose fields carry `#[customjson = "KEY=MARSHAL;UNMARSHAL"]` get a generated `<record>_json.rs` holding
//! `Serialize` / `Deserialize` impls that add one renamed wire field per directive. The wire field's type is inferred
//! statically from the marshal expression.
//!
//! - `frontend` - source discovery, package scope, type evaluation, record scanning, diagnostics
//! - `backend` - impl templates and the output writer
//! - `pipeline` - one generation pass over a set of paths
//! - `cli` - the `aliasgen` command line
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `backend` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Generated code**: Generated impls only ever contain the user's own expressions and `?` on the deserializer.

pub mod backend;
pub mod cli;
pub mod config;
pub mod frontend;
pub mod pipeline;

pub use frontend::diagnostics;

pub use backend::templates::render;
pub use config::Config;
pub use pipeline::{Action, RunReport, run};
