//! ZIP archive collections.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{CollectionState, DEFAULT_NAME, EntryReader, FileCollection};
use crate::checksum::Crc32Reader;
use crate::entry::{CompressionMethod, EntryLocation, FileEntry};
use crate::entry_path::MatchPath;
use crate::format::{detect, zip};
use crate::options::{ArchiveOffset, ArchiveOptions};
use crate::seeker::{VirtualReader, VirtualSeeker};
use crate::{Error, READ_BUFFER_SIZE, Result};

/// Where the archive bytes come from.
#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl Source {
    fn open(&self) -> Result<SourceReader> {
        Ok(match self {
            Source::File(path) => {
                SourceReader::File(BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?))
            }
            Source::Memory(bytes) => SourceReader::Memory(Cursor::new(Arc::clone(bytes))),
        })
    }
}

/// A fresh handle on a [`Source`]; every entry stream gets its own.
enum SourceReader {
    File(BufReader<File>),
    Memory(Cursor<Arc<[u8]>>),
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceReader::File(r) => r.read(buf),
            SourceReader::Memory(r) => r.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SourceReader::File(r) => r.seek(pos),
            SourceReader::Memory(r) => r.seek(pos),
        }
    }
}

/// The entries of a ZIP archive.
///
/// The archive may be embedded in a larger file: a [`VirtualSeeker`]
/// describes how many bytes precede it and how many follow it, and all
/// parsing happens inside that region. In particular the end of central
/// directory record is searched for backward from the end of the region, not
/// from the end of the file.
///
/// The central directory is decoded once, when the collection is opened.
/// Every stream opens its own handle on the file, so streams outlive borrows
/// of the collection and several can be read at once.
///
/// # Example
///
/// ```rust,no_run
/// use std::io::Read;
/// use zipcollection::{ArchiveCollection, FileCollection, MatchPath, Result};
///
/// fn main() -> Result<()> {
///     // 512 bytes of launcher stub in front, 16 bytes of trailer behind.
///     let archive = ArchiveCollection::open_embedded("bundle.bin", 512, 16)?;
///     for entry in archive.entries()? {
///         println!("{}", entry);
///     }
///     if let Some(mut stream) = archive.get_input_stream("README", MatchPath::Ignore)? {
///         let mut text = String::new();
///         stream.read_to_string(&mut text)?;
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveCollection {
    name: String,
    state: CollectionState,
    source: Source,
    seeker: VirtualSeeker,
    options: ArchiveOptions,
    archive_offset: u64,
    comment: String,
    entries: Vec<FileEntry>,
}

impl ArchiveCollection {
    /// Opens a ZIP file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ArchiveOptions::default())
    }

    /// Opens a ZIP file with explicit options.
    pub fn open_with_options(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Self> {
        Self::open_embedded_with_options(path, VirtualSeeker::default(), options)
    }

    /// Opens a ZIP archive that starts `start_offset` bytes into the file and
    /// is followed by `end_margin` bytes that do not belong to it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOffset`] if either value is negative, plus every error
    /// of [`open`](Self::open).
    pub fn open_embedded(path: impl AsRef<Path>, start_offset: i64, end_margin: i64) -> Result<Self> {
        let seeker = VirtualSeeker::new(start_offset, end_margin)?;
        Self::open_embedded_with_options(path, seeker, ArchiveOptions::default())
    }

    /// Opens the region of a file described by `seeker`.
    pub fn open_embedded_with_options(
        path: impl AsRef<Path>,
        seeker: VirtualSeeker,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        Self::load(
            path.display().to_string(),
            Source::File(path.to_path_buf()),
            seeker,
            options,
        )
    }

    /// Opens an archive appended to a host file and followed by its length
    /// as a 4-byte little-endian integer.
    pub fn open_appended(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let (start, margin) = detect::read_appended_length(&mut file)?;
        let seeker = VirtualSeeker::new(to_offset(start)?, to_offset(margin)?)?;
        Self::open_embedded_with_options(path, seeker, ArchiveOptions::default())
    }

    /// Reads an archive held in memory. The collection is named `"-"`.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_bytes_with_options(bytes, VirtualSeeker::default(), ArchiveOptions::default())
    }

    /// Reads the region of an in-memory buffer described by `seeker`.
    pub fn from_bytes_with_options(
        bytes: impl Into<Arc<[u8]>>,
        seeker: VirtualSeeker,
        options: ArchiveOptions,
    ) -> Result<Self> {
        Self::load(
            DEFAULT_NAME.to_string(),
            Source::Memory(bytes.into()),
            seeker,
            options,
        )
    }

    /// Replaces the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn load(
        name: String,
        source: Source,
        seeker: VirtualSeeker,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let mut reader = VirtualReader::new(source.open()?, seeker)?;

        let eocd_position = zip::find_eocd(&mut reader, options.max_comment_search)?;
        let eocd = zip::read_eocd(&mut reader, eocd_position)?;
        let archive_offset = match options.archive_offset {
            ArchiveOffset::Known(offset) => offset,
            ArchiveOffset::Detect => zip::detect_archive_offset(&mut reader, &eocd)?,
        };
        let entries =
            zip::read_central_directory(&mut reader, &eocd, archive_offset, options.max_entries)?;

        log::debug!(
            "opened archive '{}': {} entries, region {:?} ({} bytes), archive offset {}",
            name,
            entries.len(),
            seeker.offsets(),
            reader.len(),
            archive_offset
        );

        Ok(Self {
            name,
            state: CollectionState::Open,
            source,
            seeker,
            options,
            archive_offset,
            comment: eocd.comment,
            entries,
        })
    }

    /// The archive comment.
    pub fn comment(&self) -> Result<&str> {
        self.must_be_valid()?;
        Ok(&self.comment)
    }

    /// The seeker describing the archive region.
    pub fn seeker(&self) -> &VirtualSeeker {
        &self.seeker
    }

    /// The options the archive was opened with.
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Bytes between the region start and the first archive byte, as used
    /// for all recorded offsets.
    pub fn archive_offset(&self) -> u64 {
        self.archive_offset
    }

    fn find(&self, name: &str, mode: MatchPath) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.matches(name, mode))
    }

    fn open_entry(&self, entry: &FileEntry) -> Result<EntryReader> {
        if entry.is_encrypted {
            return Err(Error::UnsupportedFeature(format!(
                "entry '{}' is encrypted",
                entry.name()
            )));
        }
        let EntryLocation::Archive { header_offset } = entry.location else {
            return Err(Error::Logic(format!(
                "entry '{}' does not belong to an archive",
                entry.name()
            )));
        };

        let mut reader = VirtualReader::new(self.source.open()?, self.seeker)?;
        let data_offset = zip::data_offset(&mut reader, header_offset)?;
        reader.seek(SeekFrom::Start(data_offset))?;
        log::trace!(
            "reading '{}' ({}) at offset {}",
            entry.name(),
            entry.method,
            data_offset
        );

        let raw = reader.take(entry.compressed_size);
        let decoded: EntryReader = match entry.method {
            CompressionMethod::Stored => Box::new(raw),
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflated => Box::new(flate2::read::DeflateDecoder::new(raw)),
            other => {
                return Err(Error::UnsupportedMethod {
                    method: other.as_u16(),
                });
            }
        };

        match entry.crc32 {
            Some(crc) if self.options.verify_checksums => Ok(Box::new(Crc32Reader::new(
                decoded,
                entry.name(),
                crc,
                entry.size,
            ))),
            _ => Ok(decoded),
        }
    }
}

fn to_offset(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| Error::InvalidArgument(format!("offset {} is too large", value)))
}

impl FileCollection for ArchiveCollection {
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
        match self.find(name, mode) {
            Some(entry) if entry.is_file() => self.open_entry(entry).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stored entries only, no data descriptors.
    fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        for (name, data) in files {
            let offset = out.len() as u32;
            let crc = crc32fast::hash(data.as_bytes());

            out.extend_from_slice(&zip::LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
            out.extend_from_slice(&[20, 0, 0, 0, 0, 0, 0, 0, 0x21, 0]);
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(data.as_bytes());

            central.extend_from_slice(&zip::CENTRAL_DIRECTORY_HEADER_SIGNATURE.to_le_bytes());
            central.extend_from_slice(&[20, 0, 20, 0, 0, 0, 0, 0, 0, 0, 0x21, 0]);
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&(data.len() as u32).to_le_bytes());
            central.extend_from_slice(&(data.len() as u32).to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0; 12]);
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }
        let cd_offset = out.len() as u32;
        out.extend_from_slice(&central);
        out.extend_from_slice(&zip::EOCD_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&(files.len() as u16).to_le_bytes());
        out.extend_from_slice(&(files.len() as u16).to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    fn read_all(archive: &ArchiveCollection, name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        archive
            .get_input_stream(name, MatchPath::Match)
            .unwrap()
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_from_bytes() {
        let data = build_zip(&[("dir/", ""), ("dir/a.txt", "alpha"), ("b.txt", "beta")]);
        let archive = ArchiveCollection::from_bytes(data).unwrap();
        assert_eq!(archive.name().unwrap(), "-");
        assert_eq!(archive.size().unwrap(), 3);
        assert_eq!(read_all(&archive, "dir/a.txt"), b"alpha");
        assert_eq!(read_all(&archive, "b.txt"), b"beta");
        assert!(archive.get_input_stream("dir", MatchPath::Match).unwrap().is_none());
        assert!(archive.get_entry("dir", MatchPath::Match).unwrap().unwrap().is_directory);
    }

    #[test]
    fn test_embedded_region() {
        let zip = build_zip(&[("x.txt", "embedded")]);
        let mut data = vec![0x90u8; 17];
        data.extend_from_slice(&zip);
        data.extend_from_slice(&[0x55; 9]);

        let seeker = VirtualSeeker::new(17, 9).unwrap();
        let archive =
            ArchiveCollection::from_bytes_with_options(data, seeker, ArchiveOptions::default())
                .unwrap()
                .with_name("bundle");
        assert_eq!(archive.name().unwrap(), "bundle");
        assert_eq!(archive.archive_offset(), 0);
        assert_eq!(read_all(&archive, "x.txt"), b"embedded");
    }

    #[test]
    fn test_end_margin_hides_trailer() {
        let mut data = build_zip(&[("x.txt", "data")]);
        // An empty archive's EOCD as trailer: found first unless the margin
        // excludes it.
        data.extend_from_slice(&zip::EOCD_SIGNATURE.to_le_bytes());
        data.extend_from_slice(&[0; 18]);

        let whole = ArchiveCollection::from_bytes(data.clone()).unwrap();
        assert_eq!(whole.size().unwrap(), 0);

        let seeker = VirtualSeeker::new(0, 22).unwrap();
        let archive =
            ArchiveCollection::from_bytes_with_options(data, seeker, ArchiveOptions::default())
                .unwrap();
        assert_eq!(archive.size().unwrap(), 1);
        assert_eq!(read_all(&archive, "x.txt"), b"data");
    }

    #[test]
    fn test_detects_unadjusted_prefix() {
        let mut data = vec![0u8; 40];
        data.extend_from_slice(&build_zip(&[("x.txt", "prefixed")]));
        let archive = ArchiveCollection::from_bytes(data.clone()).unwrap();
        assert_eq!(archive.archive_offset(), 40);
        assert_eq!(read_all(&archive, "x.txt"), b"prefixed");

        let options = ArchiveOptions::new().archive_offset(ArchiveOffset::Known(0));
        let err =
            ArchiveCollection::from_bytes_with_options(data, VirtualSeeker::default(), options)
                .unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_crc_mismatch() {
        let mut data = build_zip(&[("x.txt", "payload")]);
        // first data byte: 30-byte header + 5-byte name
        data[35] ^= 0xFF;
        let archive = ArchiveCollection::from_bytes(data.clone()).unwrap();
        let mut out = Vec::new();
        let err = archive
            .get_input_stream("x.txt", MatchPath::Match)
            .unwrap()
            .unwrap()
            .read_to_end(&mut out)
            .unwrap_err();
        assert!(matches!(Error::from_io(err), Error::CrcMismatch { .. }));

        let options = ArchiveOptions::new().verify_checksums(false);
        let archive =
            ArchiveCollection::from_bytes_with_options(data, VirtualSeeker::default(), options)
                .unwrap();
        assert_eq!(read_all(&archive, "x.txt").len(), 7);
    }

    #[test]
    fn test_not_an_archive() {
        let err = ArchiveCollection::from_bytes(vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_closed_archive() {
        let mut archive = ArchiveCollection::from_bytes(build_zip(&[("a", "1")])).unwrap();
        archive.close();
        assert!(archive.size().unwrap_err().is_state_error());
        assert!(archive.comment().unwrap_err().is_state_error());
        assert!(
            archive
                .get_entry("a", MatchPath::Match)
                .unwrap_err()
                .is_state_error()
        );
        assert!(!archive.clone().is_valid());
    }
}
