//! # zipcollection
//!
//! Uniform, stream-based read access to directory trees and ZIP archives,
//! including ZIP archives embedded in larger files.
//!
//! Every source is a *collection*: a named list of entries whose data can be
//! opened as a stream. Collections can be combined into composites that are
//! searched in order, so a set of directories and archives can be treated
//! as one.
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use std::io::Read;
//! use zipcollection::{ArchiveCollection, FileCollection, MatchPath, Result};
//!
//! fn main() -> Result<()> {
//!     let archive = ArchiveCollection::open("assets.zip")?;
//!     for entry in archive.entries()? {
//!         println!("{}: {} bytes", entry.name(), entry.size);
//!     }
//!
//!     if let Some(mut stream) = archive.get_input_stream("config.toml", MatchPath::Ignore)? {
//!         let mut text = String::new();
//!         stream.read_to_string(&mut text)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Layering Collections
//!
//! Earlier children shadow later ones, which makes a composite act like a
//! search path:
//!
//! ```rust,no_run
//! use zipcollection::{
//!     ArchiveCollection, CollectionCollection, DirectoryCollection, FileCollection, MatchPath,
//!     Result, SharedCollection,
//! };
//!
//! fn main() -> Result<()> {
//!     let overrides = DirectoryCollection::new("overrides", true)?;
//!     let base = SharedCollection::new(ArchiveCollection::open("base.zip")?);
//!
//!     let mut search = CollectionCollection::new();
//!     search.add_collection(&overrides)?; // copied
//!     search.add_shared(base.clone())?; // shared, closing `base` hides it
//!
//!     let found = search.get_entry("textures/stone.png", MatchPath::Match)?;
//!     println!("{:?}", found.map(|e| e.size));
//!     Ok(())
//! }
//! ```
//!
//! ### Embedded Archives
//!
//! A [`VirtualSeeker`] maps positions inside an embedded region onto the
//! enclosing stream. Seeking to the end goes to the end of the region, so the
//! backward search for the ZIP directory ignores anything that follows it.
//!
//! ```rust
//! use std::io::Cursor;
//! use zipcollection::{SeekDirection, VirtualSeeker};
//!
//! let mut stream = Cursor::new(vec![0u8; 256]);
//! let seeker = VirtualSeeker::new(10, 5)?;
//! let absolute = seeker.seek(&mut stream, -4, SeekDirection::FromEnd)?;
//! assert_eq!(absolute, 247);
//! assert_eq!(seeker.tell(&mut stream)?, 237);
//! # Ok::<(), zipcollection::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate decompression via `flate2` |
//!
//! Without `deflate`, opening a deflated entry fails with
//! [`Error::UnsupportedMethod`]. Stored entries are always readable.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger itself.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Default buffer size for read operations (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

pub mod checksum;
pub mod collection;
pub mod entry;
pub mod entry_path;
pub mod error;
pub mod format;
pub mod options;
pub mod seeker;

pub use collection::{
    ArchiveCollection, Collection, CollectionCollection, CollectionState, DirectoryCollection,
    EntryReader, FileCollection, SharedCollection,
};
pub use entry::{CompressionMethod, FileEntry};
pub use entry_path::{EntryPath, MatchPath};
pub use error::{Error, Result};
pub use options::{ArchiveOffset, ArchiveOptions, DirectoryOptions};
pub use seeker::{SeekDirection, VirtualReader, VirtualSeeker};
