//! Error types for collection and archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when working with collections, along with a convenient
//! [`Result<T>`] type alias.
//!
//! "Not found" is never an error: lookups that do not resolve return
//! `Ok(None)`. Errors are reserved for misuse of the collection state machine,
//! malformed construction arguments, I/O failures and damaged archives.
//!
//! # Example
//!
//! ```rust
//! use zipcollection::{CollectionCollection, Error, FileCollection};
//!
//! let mut cc = CollectionCollection::new();
//! cc.close();
//! match cc.size() {
//!     Err(Error::InvalidState(msg)) => println!("closed: {}", msg),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use std::io;

/// The main error type for this crate.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system or stream operations |
/// | Contract | [`InvalidOffset`][Self::InvalidOffset], [`Logic`][Self::Logic], [`InvalidState`][Self::InvalidState], [`InvalidArgument`][Self::InvalidArgument] | Caller misuse |
/// | Format | [`InvalidFormat`][Self::InvalidFormat], [`CorruptHeader`][Self::CorruptHeader] | Invalid archive data |
/// | Compatibility | [`UnsupportedMethod`][Self::UnsupportedMethod], [`UnsupportedFeature`][Self::UnsupportedFeature] | Missing codec or feature |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch] | Data corruption |
/// | Resources | [`ResourceLimitExceeded`][Self::ResourceLimitExceeded] | Safety limits |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the underlying stream or file system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A [`VirtualSeeker`](crate::VirtualSeeker) was given a negative offset.
    ///
    /// Both the start offset and the end margin must be zero or positive.
    /// The values are never clamped.
    #[error("invalid virtual seeker offsets: start {start}, end margin {end_margin}")]
    InvalidOffset {
        /// The start offset that was supplied.
        start: i64,
        /// The end margin that was supplied.
        end_margin: i64,
    },

    /// A programming contract was violated, such as an unknown seek direction.
    #[error("logic error: {0}")]
    Logic(String),

    /// The collection has been closed.
    ///
    /// Once [`close`](crate::FileCollection::close) was called, every query
    /// except `is_valid()` and `close()` fails with this error. Copies and
    /// clones made afterwards are closed as well.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An argument was missing or unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The data is not a ZIP archive.
    #[error("invalid ZIP format: {0}")]
    InvalidFormat(String),

    /// An archive structure is truncated or inconsistent.
    ///
    /// The offset is virtual, relative to the start of the archive region.
    #[error("corrupt header at offset {offset:#x}: {reason}")]
    CorruptHeader {
        /// The virtual offset where the corruption was detected.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// The entry uses a compression method not available in this build.
    ///
    /// Method `8` (Deflate) requires the `deflate` feature.
    #[error("unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The ZIP compression method number.
        method: u16,
    },

    /// The entry uses a ZIP feature this crate does not implement, such as
    /// encryption.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The CRC-32 of the data read does not match the stored value.
    #[error("CRC mismatch for '{name}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The entry name.
        name: String,
        /// The CRC stored in the central directory.
        expected: u32,
        /// The CRC of the bytes actually read.
        actual: u32,
    },

    /// A configured resource limit was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
}

impl Error {
    /// Returns `true` if this error comes from using a closed collection.
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }

    /// Returns `true` if this error indicates damaged or foreign archive data.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_) | Error::CorruptHeader { .. } | Error::CrcMismatch { .. }
        )
    }

    /// Recovers a crate error that was carried through `std::io::Read`.
    ///
    /// Entry streams are plain readers, so integrity failures travel as
    /// `io::Error::other(Error::..)`. This unwraps them again; any other I/O
    /// error becomes [`Error::Io`].
    pub fn from_io(e: io::Error) -> Self {
        if e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = e.into_inner() {
                if let Ok(err) = inner.downcast::<Error>() {
                    return *err;
                }
            }
            return Error::Io(io::Error::other("wrapped error lost"));
        }
        Error::Io(e)
    }

    pub(crate) fn closed() -> Self {
        Error::InvalidState("collection was closed".into())
    }
}

/// A specialized [`Result`](std::result::Result) type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
