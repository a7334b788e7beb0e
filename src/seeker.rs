//! Virtual offset addressing for embedded archives.
//!
//! An archive that is embedded in a larger stream (a self-extracting stub in
//! front of it, an outer container or a length trailer behind it) cannot be
//! parsed by code that assumes the archive starts at byte zero and ends at the
//! physical end of the file. [`VirtualSeeker`] translates between *virtual*
//! positions, relative to the embedded region, and *absolute* positions in the
//! underlying stream.
//!
//! ```text
//! absolute:  0 ........ start ..................... len - end_margin ..... len
//!            |  prefix  |        virtual region        |      suffix       |
//! virtual:              0 .......................... vlen
//! ```
//!
//! The end of the region is given as a margin rather than a position because
//! the real stream length is only known once the stream is probed. Offsets
//! are validated when they are set (they must not be negative) but not checked
//! against any stream length until a seek actually happens.
//!
//! # Example
//!
//! ```rust
//! use std::io::{Cursor, Read};
//! use zipcollection::{SeekDirection, VirtualSeeker};
//!
//! let data: Vec<u8> = (0..=255).collect();
//! let mut stream = Cursor::new(data);
//!
//! let seeker = VirtualSeeker::new(10, 5)?;
//! seeker.seek(&mut stream, -4, SeekDirection::FromEnd)?;
//! assert_eq!(stream.position(), 247);
//! assert_eq!(seeker.tell(&mut stream)?, 237);
//!
//! let mut byte = [0u8; 1];
//! stream.read_exact(&mut byte)?;
//! assert_eq!(byte[0], 247);
//! # Ok::<(), zipcollection::Error>(())
//! ```

use std::io::{self, Read, Seek, SeekFrom};

use crate::{Error, Result};

/// Reference point for a virtual seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekDirection {
    /// Relative to the start of the virtual region.
    FromStart,
    /// Relative to the current position of the stream.
    FromCurrent,
    /// Relative to the end of the virtual region.
    FromEnd,
}

impl SeekDirection {
    /// Raw `whence` value of [`SeekDirection::FromStart`].
    pub const SEEK_SET: i32 = 0;
    /// Raw `whence` value of [`SeekDirection::FromCurrent`].
    pub const SEEK_CUR: i32 = 1;
    /// Raw `whence` value of [`SeekDirection::FromEnd`].
    pub const SEEK_END: i32 = 2;
}

impl TryFrom<i32> for SeekDirection {
    type Error = Error;

    /// Converts a C-style `whence` value.
    ///
    /// Any value other than `0`, `1` or `2` is a contract violation and
    /// yields [`Error::Logic`].
    fn try_from(whence: i32) -> Result<Self> {
        match whence {
            Self::SEEK_SET => Ok(SeekDirection::FromStart),
            Self::SEEK_CUR => Ok(SeekDirection::FromCurrent),
            Self::SEEK_END => Ok(SeekDirection::FromEnd),
            other => Err(Error::Logic(format!("unknown seek direction {}", other))),
        }
    }
}

/// Offset translator between a virtual region and its underlying stream.
///
/// The seeker holds no stream. Every operation takes the stream as an
/// argument, so one seeker can serve any number of independently owned
/// handles on the same data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VirtualSeeker {
    start_offset: i64,
    end_margin: i64,
}

impl VirtualSeeker {
    /// Creates a seeker for the region starting at absolute `start_offset`
    /// and ending `end_margin` bytes before the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOffset`] if either value is negative.
    pub fn new(start_offset: i64, end_margin: i64) -> Result<Self> {
        Self::check(start_offset, end_margin)?;
        Ok(Self {
            start_offset,
            end_margin,
        })
    }

    /// Replaces both offsets.
    ///
    /// On error neither offset is changed.
    pub fn set_offsets(&mut self, start_offset: i64, end_margin: i64) -> Result<()> {
        Self::check(start_offset, end_margin)?;
        self.start_offset = start_offset;
        self.end_margin = end_margin;
        Ok(())
    }

    /// Returns `(start_offset, end_margin)`.
    pub fn offsets(&self) -> (i64, i64) {
        (self.start_offset, self.end_margin)
    }

    /// Absolute position of the first byte of the virtual region.
    pub fn start_offset(&self) -> i64 {
        self.start_offset
    }

    /// Number of bytes between the end of the virtual region and the end of
    /// the stream.
    pub fn end_margin(&self) -> i64 {
        self.end_margin
    }

    fn check(start_offset: i64, end_margin: i64) -> Result<()> {
        if start_offset < 0 || end_margin < 0 {
            return Err(Error::InvalidOffset {
                start: start_offset,
                end_margin,
            });
        }
        Ok(())
    }

    /// Moves `stream` to a virtual position and returns the new absolute
    /// position.
    ///
    /// No clamping is done against the virtual region. Seeking before its
    /// start or past its end is allowed and simply lands outside of it; a
    /// target before absolute zero fails with an `InvalidInput` I/O error.
    pub fn seek<S: Seek + ?Sized>(
        &self,
        stream: &mut S,
        offset: i64,
        direction: SeekDirection,
    ) -> Result<u64> {
        let base = match direction {
            SeekDirection::FromStart => self.start_offset,
            SeekDirection::FromCurrent => to_signed(stream.stream_position()?)?,
            SeekDirection::FromEnd => {
                let real_end = to_signed(stream.seek(SeekFrom::End(0))?)?;
                real_end - self.end_margin
            }
        };

        let absolute = base.checked_add(offset).filter(|p| *p >= 0).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "virtual seek to {} from {:?} resolves before the start of the stream",
                    offset, direction
                ),
            )
        })?;

        log::trace!(
            "virtual seek {:?} {:+} -> absolute {}",
            direction,
            offset,
            absolute
        );
        Ok(stream.seek(SeekFrom::Start(absolute as u64))?)
    }

    /// Same as [`seek`](Self::seek) with a raw `whence` value (`0` start,
    /// `1` current, `2` end).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Logic`] for any other `whence`.
    pub fn seek_raw<S: Seek + ?Sized>(
        &self,
        stream: &mut S,
        offset: i64,
        whence: i32,
    ) -> Result<u64> {
        let direction = SeekDirection::try_from(whence)?;
        self.seek(stream, offset, direction)
    }

    /// Returns the current virtual position of `stream`.
    ///
    /// The result is negative when the stream sits inside the prefix.
    pub fn tell<S: Seek + ?Sized>(&self, stream: &mut S) -> Result<i64> {
        let absolute = to_signed(stream.stream_position()?)?;
        Ok(absolute - self.start_offset)
    }

    /// Returns the length of the virtual region of `stream`.
    ///
    /// The stream position is restored afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOffset`] when the stream is too short to hold
    /// the prefix and the suffix.
    pub fn virtual_len<S: Seek + ?Sized>(&self, stream: &mut S) -> Result<u64> {
        let saved = stream.stream_position()?;
        let real_end = to_signed(stream.seek(SeekFrom::End(0))?)?;
        stream.seek(SeekFrom::Start(saved))?;

        let len = real_end - self.end_margin - self.start_offset;
        if len < 0 {
            return Err(Error::InvalidOffset {
                start: self.start_offset,
                end_margin: self.end_margin,
            });
        }
        Ok(len as u64)
    }
}

fn to_signed(position: u64) -> Result<i64> {
    i64::try_from(position).map_err(|_| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "stream position exceeds i64::MAX",
        ))
    })
}

/// A `Read + Seek` view of the virtual region of a stream.
///
/// Position `0` is the seeker's start offset and `SeekFrom::End(0)` is the
/// virtual end. Reads stop at the virtual end, so downstream parsers never
/// see the suffix bytes.
#[derive(Debug)]
pub struct VirtualReader<R> {
    inner: R,
    seeker: VirtualSeeker,
    len: u64,
}

impl<R: Read + Seek> VirtualReader<R> {
    /// Wraps `inner` and positions it at virtual offset zero.
    pub fn new(mut inner: R, seeker: VirtualSeeker) -> Result<Self> {
        let len = seeker.virtual_len(&mut inner)?;
        seeker.seek(&mut inner, 0, SeekDirection::FromStart)?;
        Ok(Self { inner, seeker, len })
    }

    /// Length of the virtual region.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the virtual region is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The seeker in use.
    pub fn seeker(&self) -> &VirtualSeeker {
        &self.seeker
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn position(&mut self) -> io::Result<i64> {
        self.seeker.tell(&mut self.inner).map_err(into_io)
    }
}

impl<R: Read + Seek> Read for VirtualReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.position()?;
        if pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "position is before the virtual region",
            ));
        }
        let remaining = self.len.saturating_sub(pos as u64);
        let max = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if max == 0 {
            return Ok(0);
        }
        self.inner.read(&mut buf[..max])
    }
}

impl<R: Read + Seek> Seek for VirtualReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, direction) = match pos {
            SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset too large")
                })?,
                SeekDirection::FromStart,
            ),
            SeekFrom::Current(n) => (n, SeekDirection::FromCurrent),
            SeekFrom::End(n) => (n, SeekDirection::FromEnd),
        };
        let absolute = self
            .seeker
            .seek(&mut self.inner, offset, direction)
            .map_err(into_io)?;
        u64::try_from(absolute as i64 - self.seeker.start_offset()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek resolves before the virtual region",
            )
        })
    }
}

fn into_io(e: Error) -> io::Error {
    match e {
        Error::Io(e) => e,
        other => io::Error::other(other),
    }
}
