//! Options for opening collections.

use crate::format::zip::{EOCD_SIZE, MAX_COMMENT_SIZE};

/// Where the archive data starts inside the virtual region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveOffset {
    /// Recorded offsets are relative to this many bytes into the region.
    Known(u64),
    /// Compute the offset from where the central directory actually is.
    ///
    /// Handles archives that had a stub prepended without their offsets
    /// being adjusted. Falls back to `0` when the computed offset does not
    /// point at a central directory header.
    #[default]
    Detect,
}

/// Options for [`ArchiveCollection`](crate::ArchiveCollection).
///
/// # Example
///
/// ```rust
/// use zipcollection::{ArchiveOffset, ArchiveOptions};
///
/// let options = ArchiveOptions::new()
///     .verify_checksums(false)
///     .max_entries(10_000)
///     .archive_offset(ArchiveOffset::Known(0));
/// assert!(!options.verify_checksums);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Verify the CRC-32 of every entry when its stream reaches the end.
    pub verify_checksums: bool,
    /// Maximum number of central directory entries.
    pub max_entries: usize,
    /// Number of trailing bytes scanned for the end of central directory.
    pub max_comment_search: usize,
    /// How recorded offsets map onto the virtual region.
    pub archive_offset: ArchiveOffset,
}

impl Default for ArchiveOptions {
    /// | Option | Default |
    /// |--------|---------|
    /// | `verify_checksums` | `true` |
    /// | `max_entries` | 1,000,000 |
    /// | `max_comment_search` | 65,557 (largest comment + EOCD) |
    /// | `archive_offset` | [`ArchiveOffset::Detect`] |
    fn default() -> Self {
        Self {
            verify_checksums: true,
            max_entries: 1_000_000,
            max_comment_search: MAX_COMMENT_SIZE + EOCD_SIZE,
            archive_offset: ArchiveOffset::Detect,
        }
    }
}

impl ArchiveOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options without an entry limit.
    pub fn unlimited() -> Self {
        Self {
            max_entries: usize::MAX,
            ..Self::default()
        }
    }

    /// Sets whether entry checksums are verified.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Sets the maximum number of entries.
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the EOCD search window. Values below the EOCD size are raised
    /// to it.
    pub fn max_comment_search(mut self, bytes: usize) -> Self {
        self.max_comment_search = bytes.max(EOCD_SIZE);
        self
    }

    /// Sets how recorded offsets are mapped.
    pub fn archive_offset(mut self, offset: ArchiveOffset) -> Self {
        self.archive_offset = offset;
        self
    }
}

/// Options for [`DirectoryCollection`](crate::DirectoryCollection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Follow symbolic links while walking.
    pub follow_links: bool,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_links: false,
        }
    }
}

impl DirectoryOptions {
    /// Creates options with defaults (recursive, links not followed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether subdirectories are walked.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets whether symbolic links are followed.
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_defaults() {
        let options = ArchiveOptions::default();
        assert!(options.verify_checksums);
        assert_eq!(options.max_entries, 1_000_000);
        assert_eq!(options.max_comment_search, 65_557);
        assert_eq!(options.archive_offset, ArchiveOffset::Detect);
    }

    #[test]
    fn test_archive_builder() {
        let options = ArchiveOptions::unlimited()
            .verify_checksums(false)
            .max_comment_search(3)
            .archive_offset(ArchiveOffset::Known(12));
        assert_eq!(options.max_entries, usize::MAX);
        assert!(!options.verify_checksums);
        assert_eq!(options.max_comment_search, EOCD_SIZE);
        assert_eq!(options.archive_offset, ArchiveOffset::Known(12));
    }

    #[test]
    fn test_directory_options() {
        let options = DirectoryOptions::new();
        assert!(options.recursive);
        assert!(!options.follow_links);
        let flat = options.recursive(false).follow_links(true);
        assert!(!flat.recursive);
        assert!(flat.follow_links);
    }
}
