//! Fuzz target for opening arbitrary bytes as an embedded archive.
//!
//! The first two bytes choose the start offset and end margin of the
//! virtual region, the rest is the enclosing stream. Any result is fine;
//! panics and hangs are not.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use std::io::Read;

use libfuzzer_sys::fuzz_target;
use zipcollection::{ArchiveCollection, ArchiveOptions, FileCollection, MatchPath, VirtualSeeker};

fuzz_target!(|data: &[u8]| {
    let Some((&[start, margin], rest)) = data.split_first_chunk::<2>() else {
        return;
    };
    let Ok(seeker) = VirtualSeeker::new(start as i64, margin as i64) else {
        return;
    };
    let options = ArchiveOptions::new().max_entries(1024);
    let Ok(archive) = ArchiveCollection::from_bytes_with_options(rest.to_vec(), seeker, options)
    else {
        return;
    };

    let Ok(entries) = archive.entries() else {
        return;
    };
    for entry in entries.iter().take(16) {
        let _ = entry.file_name();
        if let Ok(Some(mut stream)) = archive.get_input_stream(entry.name(), MatchPath::Match) {
            // Bounded read: a hostile deflate stream may expand a lot.
            let mut sink = Vec::new();
            let _ = stream.by_ref().take(1 << 20).read_to_end(&mut sink);
        }
    }
});
