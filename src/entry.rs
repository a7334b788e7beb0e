//! Collection entry types.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::EntryPath;
use crate::entry_path::MatchPath;

/// ZIP compression method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// No compression (method 0). Directory entries always use this.
    Stored,
    /// Deflate (method 8).
    Deflated,
    /// Any other method number. Listed, but not readable.
    Other(u16),
}

impl CompressionMethod {
    /// Maps a ZIP method number.
    pub fn from_u16(method: u16) -> Self {
        match method {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Other(other),
        }
    }

    /// Returns the ZIP method number.
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Other(n) => *n,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Stored => write!(f, "stored"),
            CompressionMethod::Deflated => write!(f, "deflated"),
            CompressionMethod::Other(n) => write!(f, "method {}", n),
        }
    }
}

/// Where the bytes of an entry live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryLocation {
    /// A file on disk (directory collections).
    File(PathBuf),
    /// A local file header at this virtual offset (archive collections).
    Archive { header_offset: u64 },
}

/// An item of a collection.
///
/// Entries are immutable metadata. They never hold a stream; data is
/// obtained from the owning collection with
/// [`get_input_stream`](crate::FileCollection::get_input_stream).
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct FileEntry {
    /// The relative path. Directories end with `/`.
    pub path: EntryPath,
    /// Whether this entry is a directory.
    pub is_directory: bool,
    /// Uncompressed size in bytes. Always zero for directories.
    pub size: u64,
    /// Size of the stored data in bytes. Equals `size` outside of archives.
    pub compressed_size: u64,
    /// Compression method.
    pub method: CompressionMethod,
    /// CRC-32 of the uncompressed data, when the source records one.
    pub crc32: Option<u32>,
    /// Entry comment (archives only, empty otherwise).
    pub comment: String,
    /// Whether the entry data is encrypted. Encrypted entries are listed
    /// but cannot be opened.
    pub is_encrypted: bool,
    /// Last modification time, if known.
    pub modified: Option<SystemTime>,
    pub(crate) location: EntryLocation,
}

impl FileEntry {
    /// Returns the full relative path, including a trailing `/` for
    /// directories.
    pub fn name(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the last path component.
    pub fn file_name(&self) -> &str {
        self.path.file_name()
    }

    /// Returns true if this is a file (not a directory).
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Returns `true` if `query` names this entry under `mode`.
    pub fn matches(&self, query: &str, mode: MatchPath) -> bool {
        self.path.matches(query, mode)
    }

    /// Returns the compression ratio (compressed / uncompressed).
    ///
    /// Returns 1.0 for empty entries.
    pub fn compression_ratio(&self) -> f64 {
        if self.size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.size as f64
        }
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes, {})", self.path, self.size, self.method)
    }
}

#[cfg(test)]
pub(crate) fn test_entry(name: &str, size: u64) -> FileEntry {
    let path = EntryPath::new(name).unwrap();
    FileEntry {
        is_directory: path.is_directory(),
        path,
        size,
        compressed_size: size,
        method: CompressionMethod::Stored,
        crc32: None,
        comment: String::new(),
        is_encrypted: false,
        modified: None,
        location: EntryLocation::File(PathBuf::from(name)),
    }
}
