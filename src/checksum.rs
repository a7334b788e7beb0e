//! CRC-32 computation and verification.
//!
//! ZIP archives store the CRC-32 (IEEE 802.3 polynomial) of every entry's
//! uncompressed data. [`Crc32Reader`] checks it while an entry stream is read.
//!
//! # Example
//!
//! ```rust
//! use zipcollection::checksum::Crc32;
//!
//! let mut crc = Crc32::new();
//! crc.update(b"Hello, ");
//! crc.update(b"World!");
//! assert_eq!(crc.finalize(), 0xEC4AC3D0);
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

use std::io::{self, Read};

use crate::{Error, READ_BUFFER_SIZE};

/// CRC-32 checksum calculator.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32")
            .field("current", &self.hasher.clone().finalize())
            .finish()
    }
}

impl Crc32 {
    /// Creates a new calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the checksum with additional data.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Returns the checksum of the data seen so far.
    pub fn finalize(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Resets the checksum to its initial state.
    pub fn reset(&mut self) {
        self.hasher.reset();
    }

    /// Computes the checksum of a single slice.
    pub fn compute(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Computes the checksum of everything left in `reader`.
    pub fn compute_reader<R: Read>(reader: &mut R) -> io::Result<u32> {
        let mut crc = Self::new();
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            crc.update(&buffer[..n]);
        }
        Ok(crc.finalize())
    }
}

/// A reader wrapper that verifies CRC-32 and length at end of stream.
///
/// When the inner reader reports end of stream, the computed checksum and
/// byte count are compared with the expected values. A mismatch is returned
/// as an `io::Error` wrapping [`Error::CrcMismatch`] (use
/// [`Error::from_io`] to get it back), or `UnexpectedEof` for a short read.
pub struct Crc32Reader<R> {
    inner: R,
    name: String,
    crc: Crc32,
    expected_crc: u32,
    expected_len: u64,
    bytes_read: u64,
    verified: bool,
}

impl<R> Crc32Reader<R> {
    /// Wraps `inner`, expecting `expected_len` bytes with checksum
    /// `expected_crc`.
    pub fn new(inner: R, name: impl Into<String>, expected_crc: u32, expected_len: u64) -> Self {
        Self {
            inner,
            name: name.into(),
            crc: Crc32::new(),
            expected_crc,
            expected_len,
            bytes_read: 0,
            verified: false,
        }
    }

    /// Returns the number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Consumes the wrapper and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn verify(&mut self) -> io::Result<()> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;
        if self.bytes_read != self.expected_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "entry '{}' ended after {} of {} bytes",
                    self.name, self.bytes_read, self.expected_len
                ),
            ));
        }
        let actual = self.crc.finalize();
        if actual != self.expected_crc {
            return Err(io::Error::other(Error::CrcMismatch {
                name: self.name.clone(),
                expected: self.expected_crc,
                actual,
            }));
        }
        Ok(())
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.verify()?;
            return Ok(0);
        }
        self.crc.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}
