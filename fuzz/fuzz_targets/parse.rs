#![no_main]

use aliasgen_core::directive::{PLACEHOLDER, parse_directive};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(directive) = parse_directive(s) {
            assert!(!directive.key.is_empty());
            assert!(!directive.marshal.contains(';') && !directive.unmarshal.contains(';'));
            let _ = directive.marshal_with(PLACEHOLDER, "self.field");
            let _ = directive.unmarshal_with(PLACEHOLDER, "wire.alias_field");
        }
    }
});
