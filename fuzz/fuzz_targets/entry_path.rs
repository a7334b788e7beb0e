//! Fuzz target for entry path normalization and matching.
//!
//! Run with: cargo +nightly fuzz run entry_path

#![no_main]

use libfuzzer_sys::fuzz_target;
use zipcollection::{EntryPath, MatchPath};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(path) = EntryPath::new(text) else {
        return;
    };
    let normalized = path.as_str();

    assert!(!normalized.is_empty(), "empty path accepted: {:?}", text);
    assert!(
        !normalized.starts_with('/'),
        "leading slash kept: {:?}",
        normalized
    );
    assert!(
        !normalized.contains('\\'),
        "backslash kept: {:?}",
        normalized
    );

    assert!(path.matches(normalized, MatchPath::Match));
    assert!(path.matches(path.file_name(), MatchPath::Ignore));
});
