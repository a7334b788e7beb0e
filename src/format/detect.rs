//! Locating a ZIP archive inside a larger file.
//!
//! Two layouts are recognized without any external information:
//!
//! - A stub (self-extractor, launcher) in front of an archive whose offsets
//!   are relative to the archive start. The first local file header marks
//!   the start, see [`find_embedded_start`].
//! - An archive appended to a host file, followed by a 4-byte little-endian
//!   archive length, see [`read_appended_length`].

use std::io::{Read, Seek, SeekFrom};

use super::zip::{EOCD_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE};
use crate::{Error, Result};

/// Default maximum number of bytes scanned for a local file header.
pub const EMBEDDED_SEARCH_LIMIT: usize = 1024 * 1024;

/// Size of the trailer written after an appended archive.
pub const APPENDED_TRAILER_SIZE: u64 = 4;

/// Returns `true` if `data` starts with a ZIP local header or an empty
/// archive's EOCD signature.
pub fn is_zip_signature(data: &[u8]) -> bool {
    data.len() >= 4
        && (data[..4] == LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes()
            || data[..4] == EOCD_SIGNATURE.to_le_bytes())
}

/// Finds the first local file header at or after the current position.
///
/// At most `search_limit` bytes (default [`EMBEDDED_SEARCH_LIMIT`]) are
/// read. A candidate is accepted only if its "version needed" field is
/// plausible, which skips most false positives inside executable stubs.
///
/// Returns the absolute offset of the header, or `None` if the limit was
/// reached first.
pub fn find_local_header<R: Read + Seek>(
    reader: &mut R,
    search_limit: Option<usize>,
) -> Result<Option<u64>> {
    let limit = search_limit.unwrap_or(EMBEDDED_SEARCH_LIMIT);
    let start_pos = reader.stream_position()?;

    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    reader.by_ref().take(limit as u64).read_to_end(&mut buffer)?;

    let signature = LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes();
    let mut search_start = 0;
    while search_start + 6 <= buffer.len() {
        let Some(rel_pos) = buffer[search_start..]
            .windows(4)
            .position(|w| w == signature)
        else {
            break;
        };
        let pos = search_start + rel_pos;
        if pos + 6 <= buffer.len() {
            let version_needed = u16::from_le_bytes([buffer[pos + 4], buffer[pos + 5]]);
            // 6.3 is the newest published version; the high byte is the host OS.
            if (version_needed & 0xFF) <= 63 {
                return Ok(Some(start_pos + pos as u64));
            }
        }
        search_start = pos + 1;
    }

    Ok(None)
}

/// Returns the offset of the first local file header in the stream.
///
/// The stream position is restored afterwards.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if no header is found within
/// [`EMBEDDED_SEARCH_LIMIT`] bytes.
pub fn find_embedded_start<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let saved = reader.stream_position()?;
    reader.seek(SeekFrom::Start(0))?;
    let found = find_local_header(reader, None);
    reader.seek(SeekFrom::Start(saved))?;

    match found? {
        Some(offset) => {
            log::debug!("found local file header at offset {}", offset);
            Ok(offset)
        }
        None => Err(Error::InvalidFormat(
            "no local file header found (not a ZIP or embedded ZIP)".into(),
        )),
    }
}

/// Reads the trailer of an appended archive.
///
/// The last 4 bytes hold the archive length `n` as little-endian `u32`.
/// Returns `(start_offset, end_margin)` for a
/// [`VirtualSeeker`](crate::VirtualSeeker): the archive occupies
/// `len - 4 - n .. len - 4`.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if the stream is too short, the
/// recorded length does not fit, or the bytes at the computed start are not
/// a ZIP signature.
pub fn read_appended_length<R: Read + Seek>(reader: &mut R) -> Result<(u64, u64)> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < APPENDED_TRAILER_SIZE {
        return Err(Error::InvalidFormat(format!(
            "{} bytes is too short for an appended archive trailer",
            len
        )));
    }
    reader.seek(SeekFrom::Start(len - APPENDED_TRAILER_SIZE))?;
    let archive_len = super::reader::read_u32_le(reader)? as u64;

    let start = (len - APPENDED_TRAILER_SIZE)
        .checked_sub(archive_len)
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "appended archive length {} exceeds file length {}",
                archive_len, len
            ))
        })?;

    let mut head = Vec::with_capacity(4);
    reader.seek(SeekFrom::Start(start))?;
    reader.by_ref().take(archive_len.min(4)).read_to_end(&mut head)?;
    if !is_zip_signature(&head) {
        return Err(Error::InvalidFormat(format!(
            "no ZIP signature at appended archive start {}",
            start
        )));
    }
    Ok((start, APPENDED_TRAILER_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_zip_signature() {
        assert!(is_zip_signature(&[0x50, 0x4B, 0x03, 0x04, 0x14]));
        assert!(is_zip_signature(&[0x50, 0x4B, 0x05, 0x06]));
        assert!(!is_zip_signature(&[0x37, 0x7A, 0xBC, 0xAF]));
        assert!(!is_zip_signature(&[0x50, 0x4B]));
    }

    #[test]
    fn test_find_embedded_start() {
        let mut data = b"MZ stub with PK\x03\x04\xff\xff false positive".to_vec();
        let expected = data.len() as u64;
        data.extend_from_slice(&[0x50, 0x4B, 0x03, 0x04, 20, 0, 0, 0]);

        let mut cursor = Cursor::new(&data);
        cursor.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(find_embedded_start(&mut cursor).unwrap(), expected);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_find_embedded_start_missing() {
        let mut cursor = Cursor::new(vec![0u8; 128]);
        assert!(matches!(
            find_embedded_start(&mut cursor),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_find_local_header_respects_limit() {
        let mut data = vec![0u8; 100];
        data.extend_from_slice(&[0x50, 0x4B, 0x03, 0x04, 20, 0]);
        let mut cursor = Cursor::new(&data);
        assert_eq!(find_local_header(&mut cursor, Some(50)).unwrap(), None);
        cursor.set_position(0);
        assert_eq!(find_local_header(&mut cursor, None).unwrap(), Some(100));
    }

    #[test]
    fn test_read_appended_length() {
        let mut data = vec![0xEEu8; 30];
        data.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
        data.extend_from_slice(&[0; 18]);
        data.extend_from_slice(&22u32.to_le_bytes());
        let mut cursor = Cursor::new(&data);
        assert_eq!(read_appended_length(&mut cursor).unwrap(), (30, 4));
    }

    #[test]
    fn test_read_appended_length_without_zip() {
        // A plain file whose last 4 bytes happen to form a small length.
        let mut data = vec![0x11u8; 42];
        data.extend_from_slice(&12u32.to_le_bytes());
        let mut cursor = Cursor::new(&data);
        assert!(matches!(
            read_appended_length(&mut cursor),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_read_appended_length_too_long() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&100u32.to_le_bytes());
        let mut cursor = Cursor::new(&data);
        assert!(matches!(
            read_appended_length(&mut cursor),
            Err(Error::InvalidFormat(_))
        ));
        let mut short = Cursor::new(vec![0u8; 2]);
        assert!(read_appended_length(&mut short).is_err());
    }
}
