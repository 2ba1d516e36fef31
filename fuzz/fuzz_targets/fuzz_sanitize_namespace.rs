//! Fuzz target for `sanitize` and `Namespace::new`.
//!
//! This fuzzer tests that:
//! 1. No input causes a panic
//! 2. Sanitized identifiers only contain `[A-Za-z0-9_]`
//! 3. Sanitizing is idempotent
//! 4. Namespaces are never empty, so every one names a real file and table
//!
//! Run with: `cargo +nightly fuzz run fuzz_sanitize_namespace`

#![no_main]

use arbitrary::Arbitrary;
use kvlite::{Namespace, sanitize};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct NamespaceInput {
    database: String,
    table: String,
    /// Splice a quote into the table name to probe identifier quoting
    inject_quote: bool,
}

fuzz_target!(|input: NamespaceInput| {
    let mut table = input.table;
    if input.inject_quote {
        let mid = table
            .char_indices()
            .nth(table.chars().count() / 2)
            .map_or(table.len(), |(i, _)| i);
        table.insert(mid, '"');
    }

    for raw in [&input.database, &table] {
        let clean = sanitize(raw);
        assert!(
            clean.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "unsafe character survived: {clean:?}"
        );
        assert_eq!(sanitize(&clean), clean, "not idempotent for {raw:?}");
    }

    let ns = Namespace::new(&input.database, &table);
    assert!(!ns.database().is_empty());
    assert!(!ns.table().is_empty());
    assert!(!ns.table().contains('"'));
});
