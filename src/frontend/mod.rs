//! aliasgen frontend
//!
//! This module contains everything that reads user source:
//! - `source`: discovery, loading and parsing of `.rs` files
//! - `scope`: package declarations visible to directive expressions
//! - `types`: canonical type text and type helpers
//! - `evaluator`: static type evaluation of directive expressions
//! - `record`: directive parsing and record descriptors
//! - `diagnostics`: positions, diagnostics and rendering

pub mod diagnostics;
pub mod evaluator;
pub mod record;
pub mod scope;
pub mod source;
pub mod types;
