//! ZIP record decoding.
//!
//! All functions operate on a stream whose position `0` is the first byte of
//! the archive and whose `SeekFrom::End(0)` is the end of the archive. For an
//! embedded archive that stream is a [`VirtualReader`](crate::VirtualReader),
//! so the backward scan for the end of central directory record starts at the
//! end of the embedded region rather than at the end of the file.
//!
//! ```text
//! +---------------------------+
//! | local header + data  (xN) |
//! +---------------------------+
//! | central directory    (xN) |
//! +---------------------------+
//! | [ZIP64 EOCD + locator]    |
//! +---------------------------+
//! | EOCD + comment            |  <- found by scanning backward
//! +---------------------------+
//! ```

use std::io::{self, Read, Seek, SeekFrom};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::reader::{FieldReader, read_bytes, read_u32_le};
use crate::entry::{CompressionMethod, EntryLocation, FileEntry};
use crate::{EntryPath, Error, Result};

/// Local file header signature (`PK\x03\x04`).
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
/// Central directory header signature (`PK\x01\x02`).
pub const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x0201_4b50;
/// End of central directory signature (`PK\x05\x06`).
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;
/// ZIP64 end of central directory signature (`PK\x06\x06`).
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;
/// ZIP64 end of central directory locator signature (`PK\x06\x07`).
pub const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;

/// Fixed size of the end of central directory record.
pub const EOCD_SIZE: usize = 22;
/// Largest archive comment.
pub const MAX_COMMENT_SIZE: usize = 0xFFFF;
/// Fixed size of a local file header.
pub const LOCAL_HEADER_SIZE: usize = 30;
/// Fixed size of a central directory header.
pub const CENTRAL_HEADER_SIZE: usize = 46;

const ZIP64_LOCATOR_SIZE: u64 = 20;
const ZIP64_EOCD_SIZE: usize = 56;
const ZIP64_EXTRA_ID: u16 = 0x0001;

const FLAG_ENCRYPTED: u16 = 0x0001;
const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// Decoded end of central directory information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Offset of the EOCD record.
    pub position: u64,
    /// Total number of central directory entries.
    pub entry_count: u64,
    /// Size of the central directory in bytes.
    pub directory_size: u64,
    /// Offset of the central directory as recorded in the archive.
    pub directory_offset: u64,
    /// Archive comment.
    pub comment: String,
    /// Whether the values came from a ZIP64 record.
    pub zip64: bool,
}

fn corrupt(offset: u64, reason: impl Into<String>) -> Error {
    Error::CorruptHeader {
        offset,
        reason: reason.into(),
    }
}

fn truncated(offset: u64, what: &'static str) -> impl FnOnce(io::Error) -> Error {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            corrupt(offset, format!("truncated {}", what))
        } else {
            Error::Io(e)
        }
    }
}

/// Scans backward from the end of the stream for the EOCD signature.
///
/// At most `search_window` trailing bytes are examined (at least
/// [`EOCD_SIZE`]). A candidate is accepted only if its comment length fits
/// in the remaining bytes.
pub fn find_eocd<R: Read + Seek>(reader: &mut R, search_window: usize) -> Result<u64> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < EOCD_SIZE as u64 {
        return Err(Error::InvalidFormat(format!(
            "{} bytes is too short for a ZIP archive",
            len
        )));
    }

    let window = len.min(search_window.max(EOCD_SIZE) as u64);
    let start = len - window;
    reader.seek(SeekFrom::Start(start))?;
    let buffer = read_bytes(reader, window as usize)?;

    let signature = EOCD_SIGNATURE.to_le_bytes();
    for i in (0..=buffer.len() - EOCD_SIZE).rev() {
        if buffer[i..i + 4] != signature {
            continue;
        }
        let comment_len = u16::from_le_bytes([buffer[i + 20], buffer[i + 21]]) as usize;
        if i + EOCD_SIZE + comment_len <= buffer.len() {
            return Ok(start + i as u64);
        }
    }

    Err(Error::InvalidFormat(
        "end of central directory record not found".into(),
    ))
}

/// Reads the EOCD record at `position`, following the ZIP64 locator when
/// the 32-bit fields are saturated.
pub fn read_eocd<R: Read + Seek>(reader: &mut R, position: u64) -> Result<EndOfCentralDirectory> {
    reader.seek(SeekFrom::Start(position))?;
    let record = read_bytes(reader, EOCD_SIZE).map_err(truncated(position, "EOCD record"))?;
    let mut f = FieldReader::new(&record);

    if f.u32()? != EOCD_SIGNATURE {
        return Err(corrupt(position, "bad EOCD signature"));
    }
    let disk = f.u16()?;
    let directory_disk = f.u16()?;
    let _entries_on_disk = f.u16()?;
    let entry_count = f.u16()?;
    let directory_size = f.u32()?;
    let directory_offset = f.u32()?;
    let comment_len = f.u16()? as usize;

    if disk != 0 || directory_disk != 0 {
        return Err(Error::InvalidFormat(
            "multi-disk archives are not supported".into(),
        ));
    }

    let comment = read_bytes(reader, comment_len).map_err(truncated(position, "archive comment"))?;
    let comment = String::from_utf8_lossy(&comment).into_owned();

    if entry_count == 0xFFFF || directory_size == 0xFFFF_FFFF || directory_offset == 0xFFFF_FFFF {
        let (entry_count, directory_size, directory_offset) = read_zip64_eocd(reader, position)?;
        return Ok(EndOfCentralDirectory {
            position,
            entry_count,
            directory_size,
            directory_offset,
            comment,
            zip64: true,
        });
    }

    Ok(EndOfCentralDirectory {
        position,
        entry_count: entry_count as u64,
        directory_size: directory_size as u64,
        directory_offset: directory_offset as u64,
        comment,
        zip64: false,
    })
}

fn read_zip64_eocd<R: Read + Seek>(reader: &mut R, eocd_position: u64) -> Result<(u64, u64, u64)> {
    let locator_position = eocd_position
        .checked_sub(ZIP64_LOCATOR_SIZE)
        .ok_or_else(|| corrupt(eocd_position, "ZIP64 locator does not fit before EOCD"))?;
    reader.seek(SeekFrom::Start(locator_position))?;
    let locator = read_bytes(reader, ZIP64_LOCATOR_SIZE as usize)
        .map_err(truncated(locator_position, "ZIP64 locator"))?;
    let mut f = FieldReader::new(&locator);
    if f.u32()? != ZIP64_EOCD_LOCATOR_SIGNATURE {
        return Err(corrupt(
            locator_position,
            "ZIP64 fields used but ZIP64 locator not found",
        ));
    }
    let _disk = f.u32()?;
    let record_position = f.u64()?;

    reader.seek(SeekFrom::Start(record_position))?;
    let record = read_bytes(reader, ZIP64_EOCD_SIZE)
        .map_err(truncated(record_position, "ZIP64 EOCD record"))?;
    let mut f = FieldReader::new(&record);
    if f.u32()? != ZIP64_EOCD_SIGNATURE {
        return Err(corrupt(record_position, "bad ZIP64 EOCD signature"));
    }
    // record size, versions, disk numbers, entries on this disk
    f.skip(8 + 2 + 2 + 4 + 4 + 8)?;
    let entry_count = f.u64()?;
    let directory_size = f.u64()?;
    let directory_offset = f.u64()?;
    Ok((entry_count, directory_size, directory_offset))
}

/// Computes how many bytes precede the archive data, from the difference
/// between where the central directory ends and where the EOCD says it
/// starts.
///
/// The result is confirmed by peeking for a central directory signature.
/// When it does not check out, and always for ZIP64 archives, `0` is
/// returned and decoding proceeds with the recorded offsets.
pub fn detect_archive_offset<R: Read + Seek>(
    reader: &mut R,
    eocd: &EndOfCentralDirectory,
) -> Result<u64> {
    if eocd.zip64 {
        return Ok(0);
    }
    let Some(offset) = eocd
        .position
        .checked_sub(eocd.directory_size)
        .and_then(|x| x.checked_sub(eocd.directory_offset))
    else {
        log::debug!(
            "central directory offset {} points past the EOCD, not adjusting",
            eocd.directory_offset
        );
        return Ok(0);
    };
    if offset == 0 || eocd.entry_count == 0 {
        return Ok(offset);
    }

    reader.seek(SeekFrom::Start(offset + eocd.directory_offset))?;
    match read_u32_le(reader) {
        Ok(CENTRAL_DIRECTORY_HEADER_SIGNATURE) => Ok(offset),
        Ok(_) => Ok(0),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Decodes all central directory headers.
///
/// `base` is added to every recorded offset (the detected or configured
/// archive offset). Entries are returned in central directory order.
pub fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    eocd: &EndOfCentralDirectory,
    base: u64,
    max_entries: usize,
) -> Result<Vec<FileEntry>> {
    if eocd.entry_count > max_entries as u64 {
        return Err(Error::ResourceLimitExceeded(format!(
            "archive has {} entries, limit is {}",
            eocd.entry_count, max_entries
        )));
    }

    let directory_start = base
        .checked_add(eocd.directory_offset)
        .ok_or_else(|| corrupt(eocd.position, "central directory offset overflows"))?;
    // The central directory precedes the ZIP64 record (if any) and the EOCD.
    let directory_end = directory_start
        .checked_add(eocd.directory_size)
        .filter(|end| *end <= eocd.position)
        .ok_or_else(|| corrupt(eocd.position, "central directory overlaps EOCD"))?;

    reader.seek(SeekFrom::Start(directory_start))?;
    let directory = read_bytes(reader, (directory_end - directory_start) as usize)
        .map_err(truncated(directory_start, "central directory"))?;

    let mut f = FieldReader::new(&directory);
    let capacity = eocd
        .entry_count
        .min((directory.len() / CENTRAL_HEADER_SIZE) as u64);
    let mut entries = Vec::with_capacity(capacity as usize);
    for _ in 0..eocd.entry_count {
        let offset = directory_start + (directory.len() - f.remaining()) as u64;
        let entry = read_central_header(&mut f, base)
            .map_err(|e| match e {
                Error::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                    corrupt(offset, "truncated central directory header")
                }
                Error::CorruptHeader { reason, .. } => corrupt(offset, reason),
                other => other,
            })?;
        entries.push(entry);
    }

    Ok(entries)
}

fn read_central_header(f: &mut FieldReader<'_>, base: u64) -> Result<FileEntry> {
    if f.u32()? != CENTRAL_DIRECTORY_HEADER_SIGNATURE {
        return Err(corrupt(0, "bad central directory header signature"));
    }
    // version made by, version needed
    f.skip(4)?;
    let flags = f.u16()?;
    let method = f.u16()?;
    let dos_time = f.u16()?;
    let dos_date = f.u16()?;
    let crc32 = f.u32()?;
    let mut compressed_size = f.u32()? as u64;
    let mut size = f.u32()? as u64;
    let name_len = f.u16()? as usize;
    let extra_len = f.u16()? as usize;
    let comment_len = f.u16()? as usize;
    // disk number start, internal attributes
    f.skip(4)?;
    let external_attributes = f.u32()?;
    let mut header_offset = f.u32()? as u64;

    let name = String::from_utf8_lossy(f.take(name_len)?).into_owned();
    let extra = f.take(extra_len)?;
    let comment = String::from_utf8_lossy(f.take(comment_len)?).into_owned();

    apply_zip64_extra(extra, &mut size, &mut compressed_size, &mut header_offset)?;

    let mut is_directory = name.ends_with('/') || name.ends_with('\\');
    let mut name = name;
    if !is_directory && external_attributes & DOS_DIRECTORY_ATTRIBUTE != 0 && size == 0 {
        is_directory = true;
        name.push('/');
    }

    let path = EntryPath::new(&name)
        .map_err(|_| corrupt(0, format!("unusable entry name '{}'", name.escape_debug())))?;
    let header_offset = base
        .checked_add(header_offset)
        .ok_or_else(|| corrupt(0, "local header offset overflows"))?;

    Ok(FileEntry {
        path,
        is_directory,
        size,
        compressed_size,
        method: CompressionMethod::from_u16(method),
        crc32: Some(crc32),
        comment,
        is_encrypted: flags & FLAG_ENCRYPTED != 0,
        modified: dos_to_system_time(dos_date, dos_time),
        location: EntryLocation::Archive { header_offset },
    })
}

/// Replaces saturated 32-bit values with their ZIP64 extra field values.
///
/// The ZIP64 field lists only the saturated values, in the fixed order
/// uncompressed size, compressed size, header offset.
fn apply_zip64_extra(
    extra: &[u8],
    size: &mut u64,
    compressed_size: &mut u64,
    header_offset: &mut u64,
) -> Result<()> {
    if *size != 0xFFFF_FFFF && *compressed_size != 0xFFFF_FFFF && *header_offset != 0xFFFF_FFFF {
        return Ok(());
    }

    let mut f = FieldReader::new(extra);
    while f.remaining() >= 4 {
        let id = f.u16()?;
        let data_len = f.u16()? as usize;
        let data = f.take(data_len)?;
        if id != ZIP64_EXTRA_ID {
            continue;
        }
        let mut d = FieldReader::new(data);
        if *size == 0xFFFF_FFFF {
            *size = d.u64()?;
        }
        if *compressed_size == 0xFFFF_FFFF {
            *compressed_size = d.u64()?;
        }
        if *header_offset == 0xFFFF_FFFF {
            *header_offset = d.u64()?;
        }
        return Ok(());
    }
    Err(corrupt(0, "ZIP64 values used but ZIP64 extra field missing"))
}

/// Reads the local header at `header_offset` and returns the offset of the
/// entry data that follows it.
pub fn data_offset<R: Read + Seek>(reader: &mut R, header_offset: u64) -> Result<u64> {
    reader.seek(SeekFrom::Start(header_offset))?;
    let header = read_bytes(reader, LOCAL_HEADER_SIZE)
        .map_err(truncated(header_offset, "local file header"))?;
    let mut f = FieldReader::new(&header);
    if f.u32()? != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(corrupt(header_offset, "bad local file header signature"));
    }
    // version, flags, method, time, date, crc, sizes
    f.skip(22)?;
    let name_len = f.u16()? as u64;
    let extra_len = f.u16()? as u64;
    Ok(header_offset + LOCAL_HEADER_SIZE as u64 + name_len + extra_len)
}

/// Converts an MS-DOS date and time (local time, treated as UTC) to a
/// `SystemTime`.
///
/// Returns `None` for the zero date and for out-of-range fields.
pub fn dos_to_system_time(date: u16, time: u16) -> Option<SystemTime> {
    let year = 1980 + (date >> 9) as i64;
    let month = ((date >> 5) & 0x0F) as i64;
    let day = (date & 0x1F) as i64;
    let hour = (time >> 11) as u64;
    let minute = ((time >> 5) & 0x3F) as u64;
    let second = ((time & 0x1F) * 2) as u64;

    if !(1..=12).contains(&month) || day == 0 || hour > 23 || minute > 59 || second > 59 {
        return None;
    }

    let days = days_from_civil(year, month, day);
    let secs = days as u64 * 86_400 + hour * 3600 + minute * 60 + second;
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}

/// Days since 1970-01-01 for a proleptic Gregorian date (year >= 1970).
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y / 400;
    let yoe = y - era * 400;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
