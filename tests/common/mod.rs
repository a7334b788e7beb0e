//! Shared test utilities for integration tests.
//!
//! Archives are assembled byte by byte so that tests control every header,
//! and directory trees are created inside caller-owned [`TempDir`]s.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::DeflateEncoder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const LOCAL_HEADER: u32 = 0x0403_4b50;
const CENTRAL_HEADER: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4b50;

/// 1980-01-01, the earliest DOS date.
const DOS_DATE: u16 = 0x21;

struct PendingEntry {
    name: String,
    method: u16,
    crc: u32,
    size: u32,
    data: Vec<u8>,
    external_attributes: u32,
}

/// Builds a ZIP archive in memory.
///
/// # Example
///
/// ```ignore
/// let bytes = ZipBuilder::new()
///     .directory("docs/")
///     .stored("docs/a.txt", b"alpha")
///     .deflated("b.txt", &[b'x'; 1000])
///     .build();
/// ```
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<PendingEntry>,
    comment: String,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an uncompressed file.
    pub fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            method: 0,
            crc: crc32fast::hash(data),
            size: data.len() as u32,
            data: data.to_vec(),
            external_attributes: 0,
        });
        self
    }

    /// Adds a Deflate-compressed file.
    pub fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.entries.push(PendingEntry {
            name: name.to_string(),
            method: 8,
            crc: crc32fast::hash(data),
            size: data.len() as u32,
            data: compressed,
            external_attributes: 0,
        });
        self
    }

    /// Adds a file with an arbitrary method number and raw data.
    pub fn raw(mut self, name: &str, method: u16, data: &[u8]) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            method,
            crc: crc32fast::hash(data),
            size: data.len() as u32,
            data: data.to_vec(),
            external_attributes: 0,
        });
        self
    }

    /// Adds a directory. A trailing `/` is appended if missing.
    pub fn directory(mut self, name: &str) -> Self {
        let mut name = name.to_string();
        if !name.ends_with('/') {
            name.push('/');
        }
        self.entries.push(PendingEntry {
            name,
            method: 0,
            crc: 0,
            size: 0,
            data: Vec::new(),
            external_attributes: 0x10,
        });
        self
    }

    /// Sets the archive comment.
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let offset = out.len() as u32;
            let name = entry.name.as_bytes();

            out.extend_from_slice(&LOCAL_HEADER.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&DOS_DATE.to_le_bytes());
            out.extend_from_slice(&entry.crc.to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&entry.size.to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name);
            out.extend_from_slice(&entry.data);

            central.extend_from_slice(&CENTRAL_HEADER.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&entry.method.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&DOS_DATE.to_le_bytes());
            central.extend_from_slice(&entry.crc.to_le_bytes());
            central.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            central.extend_from_slice(&entry.size.to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // extra
            central.extend_from_slice(&0u16.to_le_bytes()); // comment
            central.extend_from_slice(&0u16.to_le_bytes()); // disk
            central.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
            central.extend_from_slice(&entry.external_attributes.to_le_bytes());
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name);
        }

        let directory_offset = out.len() as u32;
        let count = self.entries.len() as u16;
        out.extend_from_slice(&central);
        out.extend_from_slice(&END_OF_CENTRAL_DIRECTORY.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&directory_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(self.comment.as_bytes());
        out
    }
}

/// Creates an archive of stored files.
///
/// ```ignore
/// let bytes = create_zip(&[("file.txt", b"content" as &[u8])]);
/// ```
pub fn create_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    entries
        .iter()
        .fold(ZipBuilder::new(), |b, (name, data)| b.stored(name, data))
        .build()
}

/// Surrounds `archive` with `prefix` and `suffix` bytes of filler.
pub fn embed(archive: &[u8], prefix: usize, suffix: usize) -> Vec<u8> {
    let mut out = vec![0xCCu8; prefix];
    out.extend_from_slice(archive);
    out.extend(std::iter::repeat_n(0xDDu8, suffix));
    out
}

/// Appends `archive` to `host` followed by its length as 4-byte
/// little-endian integer.
pub fn append_with_length(host: &[u8], archive: &[u8]) -> Vec<u8> {
    let mut out = host.to_vec();
    out.extend_from_slice(archive);
    out.extend_from_slice(&(archive.len() as u32).to_le_bytes());
    out
}

/// Writes `bytes` to `name` inside `dir` and returns the full path.
pub fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

/// Creates the given files (and their parent directories) below `root`.
pub fn create_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (name, data) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, data).unwrap();
    }
}

/// Creates a random tree below `root` and returns how many entries
/// (files and directories) it contains.
///
/// File names are unique across the whole tree so that basename lookups
/// are unambiguous.
pub fn create_random_tree(root: &Path, seed: u64) -> usize {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut count = 0;
    let mut next_file = 0;

    let directories = rng.gen_range(1..4);
    for d in 0..directories {
        let dir = root.join(format!("dir{}", d));
        fs::create_dir(&dir).unwrap();
        count += 1;

        for _ in 0..rng.gen_range(0..5) {
            let len = rng.gen_range(0..256);
            let data: Vec<u8> = (0..len).map(|_| rng.r#gen()).collect();
            fs::write(dir.join(format!("file{}.bin", next_file)), data).unwrap();
            next_file += 1;
            count += 1;
        }
    }
    for _ in 0..rng.gen_range(1..4) {
        fs::write(root.join(format!("file{}.bin", next_file)), b"top").unwrap();
        next_file += 1;
        count += 1;
    }
    count
}
