#![no_main]

use libfuzzer_sys::fuzz_target;
use sketch_binpack::IdentifierRules;

fuzz_target!(|name: &str| {
    let identifier = IdentifierRules::default().extract(name);
    let id = identifier.as_str();
    if identifier.is_fallback() {
        assert_eq!(id, name);
    } else {
        assert!(!id.is_empty());
        assert!(!id.contains('.'));
        assert!(name.split('.').any(|part| part == id));
    }
});
