//! Directory tree collections.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{CollectionState, EntryReader, FileCollection};
use crate::entry::{CompressionMethod, EntryLocation, FileEntry};
use crate::entry_path::MatchPath;
use crate::options::DirectoryOptions;
use crate::{EntryPath, Error, READ_BUFFER_SIZE, Result};

/// The files and directories below a root directory.
///
/// The tree is listed once, when the collection is created. Entry names are
/// relative to the root, use `/` as separator and end with `/` for
/// directories. Siblings are sorted by file name.
///
/// File data is opened from disk when a stream is requested.
#[derive(Debug, Clone)]
pub struct DirectoryCollection {
    name: String,
    root: PathBuf,
    options: DirectoryOptions,
    state: CollectionState,
    entries: Vec<FileEntry>,
}

impl DirectoryCollection {
    /// Lists `path`, recursively or only its direct children.
    pub fn new(path: impl AsRef<Path>, recursive: bool) -> Result<Self> {
        Self::with_options(path, DirectoryOptions::new().recursive(recursive))
    }

    /// Lists `path` with explicit options.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if `path` cannot be inspected.
    /// - [`Error::InvalidArgument`] if `path` is not a directory.
    pub fn with_options(path: impl AsRef<Path>, options: DirectoryOptions) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let metadata = fs::metadata(&root)?;
        if !metadata.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }

        let entries = scan(&root, &options)?;
        log::debug!(
            "scanned directory '{}': {} entries (recursive: {})",
            root.display(),
            entries.len(),
            options.recursive
        );

        Ok(Self {
            name: root.display().to_string(),
            root,
            options,
            state: CollectionState::Open,
            entries,
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The options the tree was listed with.
    pub fn options(&self) -> &DirectoryOptions {
        &self.options
    }

    fn find(&self, name: &str, mode: MatchPath) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.matches(name, mode))
    }
}

fn scan(root: &Path, options: &DirectoryOptions) -> Result<Vec<FileEntry>> {
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(options.follow_links)
        .sort_by_file_name();
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    let mut entries = Vec::new();
    for item in walker {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                log::warn!("skipping unreadable path below '{}': {}", root.display(), e);
                continue;
            }
        };

        let relative = item.path().strip_prefix(root).map_err(|_| {
            Error::Logic(format!(
                "'{}' is not below '{}'",
                item.path().display(),
                root.display()
            ))
        })?;
        let is_directory = item.file_type().is_dir();
        let metadata = item.metadata().map_err(io::Error::from)?;
        let size = if is_directory { 0 } else { metadata.len() };

        log::trace!("found {}", relative.display());
        entries.push(FileEntry {
            path: EntryPath::from_relative(relative, is_directory)?,
            is_directory,
            size,
            compressed_size: size,
            method: CompressionMethod::Stored,
            crc32: None,
            comment: String::new(),
            is_encrypted: false,
            modified: metadata.modified().ok(),
            location: EntryLocation::File(item.into_path()),
        });
    }
    Ok(entries)
}

impl FileCollection for DirectoryCollection {
    fn is_valid(&self) -> bool {
        self.state.is_open()
    }

    fn close(&mut self) {
        self.state = CollectionState::Closed;
    }

    fn name(&self) -> Result<&str> {
        self.must_be_valid()?;
        Ok(&self.name)
    }

    fn size(&self) -> Result<usize> {
        self.must_be_valid()?;
        Ok(self.entries.len())
    }

    fn entries(&self) -> Result<Vec<FileEntry>> {
        self.must_be_valid()?;
        Ok(self.entries.clone())
    }

    fn get_entry(&self, name: &str, mode: MatchPath) -> Result<Option<FileEntry>> {
        self.must_be_valid()?;
        Ok(self.find(name, mode).cloned())
    }

    fn get_input_stream(&self, name: &str, mode: MatchPath) -> Result<Option<EntryReader>> {
        self.must_be_valid()?;
        let Some(entry) = self.find(name, mode).filter(|e| e.is_file()) else {
            return Ok(None);
        };
        let EntryLocation::File(path) = &entry.location else {
            return Err(Error::Logic(format!(
                "entry '{}' does not belong to a directory",
                entry.name()
            )));
        };
        let file = File::open(path)?;
        Ok(Some(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))))
    }
}
