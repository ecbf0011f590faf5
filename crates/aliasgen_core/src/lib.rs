//! Provide the directive grammar and canonical vocabulary shared by the aliasgen generator and its derive helper.
//!
//! This crate is intentionally small and dependency-light. It contains deterministic helpers that both:
//! - the generator uses while scanning records and rendering output, and
//! - the `CustomJson` derive uses to reject malformed annotations at compile time.
//!
//! ## Notes
//!
//! - This is a “semantic core” crate: **no IO**, no global state, and no `syn` types.
//! - Current scope: the `KEY=MARSHAL;UNMARSHAL` directive grammar with placeholder substitution, output naming
//!   conventions, and the registry of standard-library signatures known to the type evaluator.
//!
//! ## Examples
//! ```rust
//! use aliasgen_core::directive::{parse_directive, PLACEHOLDER};
//!
//! let directive = parse_directive("createTime=$.Unix();time.Unix($, 0)").unwrap();
//! assert_eq!(directive.key, "createTime");
//! assert_eq!(directive.marshal_with(PLACEHOLDER, "self.T"), "self.T.Unix()");
//! ```

pub mod directive;
pub mod lang;
