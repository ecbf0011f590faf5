//! Aliasgen vocabulary registries.
//!
//! This module is the “front door” for shared vocabulary: the names the generator emits into output files and the
//! standard-library signatures the type evaluator knows without reading any source.
//!
//! ## Notes
//! - Registries are intentionally **pure**: no AST types, no IO, no side effects.
//! - Signature outputs are type *text*; parsing them is the caller's job.
//!
//! ## Examples
//! ```rust
//! use aliasgen_core::lang::{conventions, signatures};
//!
//! assert_eq!(conventions::output_file_name("Session", conventions::DEFAULT_SUFFIX), "session_json.rs");
//! assert_eq!(signatures::method("Duration", "as_secs").map(|s| s.output), Some("u64"));
//! ```

pub mod conventions;
pub mod signatures;
