//! Naming conventions shared by the scanner, the templates and the writer.
//!
//! The generated module is a child of the module declaring the record, so it reaches every name in scope there
//! through [`PACKAGE_CLAUSE`].

/// Field attribute carrying directives when no other is configured.
pub const DEFAULT_ATTRIBUTE: &str = "customjson";

/// Output file suffix when no other is configured.
pub const DEFAULT_SUFFIX: &str = "_json.rs";

/// First line of every generated file. Files starting with it are never scanned.
pub const BANNER: &str = "// Code generated by aliasgen. DO NOT EDIT.";

/// Import line placing the generated impls in the declaring module's scope.
pub const PACKAGE_CLAUSE: &str = "use super::*;";

/// Prefix of the extra wire-structure field generated for each alias.
pub const WIRE_FIELD_PREFIX: &str = "alias_";

/// Binding holding the decoded wire structure in the decode body.
pub const WIRE_BINDING: &str = "wire";

/// Binding holding the decoded record in the decode body.
pub const DECODE_RECEIVER: &str = "v";

/// Receiver expression used for the marshal direction.
pub const ENCODE_RECEIVER: &str = "self";

/// Name of the output file for `record`: lowercase identifier followed by `suffix`.
pub fn output_file_name(record: &str, suffix: &str) -> String {
    format!("{}{}", record.to_lowercase(), suffix)
}

/// Name of the wire-structure field generated for the target field `field` (without any `r#` prefix).
pub fn wire_field_name(field: &str) -> String {
    format!("{WIRE_FIELD_PREFIX}{field}")
}

/// Whether `source` is a file produced by the generator.
pub fn is_generated(source: &str) -> bool {
    source.trim_start_matches('\u{feff}').starts_with(BANNER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name_is_lowercase() {
        assert_eq!(output_file_name("UserEvent", DEFAULT_SUFFIX), "userevent_json.rs");
        assert_eq!(output_file_name("T", "_wire.rs"), "t_wire.rs");
    }

    #[test]
    fn test_wire_field_name() {
        assert_eq!(wire_field_name("T"), "alias_T");
        assert_eq!(wire_field_name("created_at"), "alias_created_at");
    }

    #[test]
    fn test_is_generated() {
        assert!(is_generated(&format!("{BANNER}\n\nuse super::*;\n")));
        assert!(!is_generated("use super::*;\n"));
        assert!(!is_generated(&format!("// header\n{BANNER}\n")));
    }
}
