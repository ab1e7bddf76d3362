//! Binary format helpers for the snapshot record stream.
//!
//! Length-prefixed byte fields and little-endian scalars, plus the
//! magic/version header and CRC32 helpers. All helpers operate on
//! `Read`/`Write` so the same code runs against the gzip encoder, the
//! decoder, and in-memory buffers in tests.

use std::io::{self, Read, Write};

use crc32fast::Hasher;
use thiserror::Error;

/// Magic bytes opening the decompressed record stream.
pub const SNAP_MAGIC: &[u8; 4] = b"CSNP";

/// Current stream version.
pub const FORMAT_VERSION: u8 = 1;

/// Errors from reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unexpected end of snapshot data")]
    UnexpectedEof,

    #[error("invalid snapshot magic bytes")]
    InvalidMagic,

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    /// The stored CRC32 doesn't match the file body. Loads fail
    /// before any in-memory state is touched.
    #[error("snapshot is corrupted: checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    Corrupt { expected: u32, actual: u32 },

    #[error("unknown record tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("invalid snapshot data: {0}")]
    InvalidData(String),

    /// A second save was requested while one is already running.
    #[error("ERR background save already in progress")]
    SaveInProgress,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Computes a CRC32 checksum over a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies a stored checksum against the body it covers.
pub fn verify_crc32(body: &[u8], stored: u32) -> Result<(), SnapshotError> {
    let actual = crc32(body);
    if actual != stored {
        return Err(SnapshotError::Corrupt {
            expected: stored,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// write helpers
// ---------------------------------------------------------------------------

pub fn write_u8(w: &mut impl Write, val: u8) -> io::Result<()> {
    w.write_all(&[val])
}

pub fn write_u16(w: &mut impl Write, val: u16) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

pub fn write_u32(w: &mut impl Write, val: u32) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

pub fn write_i64(w: &mut impl Write, val: i64) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

pub fn write_f64(w: &mut impl Write, val: f64) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

/// Writes a length-prefixed byte field: `[len: u32][data]`.
pub fn write_bytes(w: &mut impl Write, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("field length {} exceeds u32::MAX", data.len()),
        )
    })?;
    write_u32(w, len)?;
    w.write_all(data)
}

/// Writes the stream header: magic + version.
pub fn write_header(w: &mut impl Write) -> io::Result<()> {
    w.write_all(SNAP_MAGIC)?;
    write_u8(w, FORMAT_VERSION)
}

// ---------------------------------------------------------------------------
// read helpers
// ---------------------------------------------------------------------------

fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> Result<(), SnapshotError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SnapshotError::UnexpectedEof
        } else {
            SnapshotError::Io(e)
        }
    })
}

pub fn read_u8(r: &mut impl Read) -> Result<u8, SnapshotError> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

pub fn read_u16(r: &mut impl Read) -> Result<u16, SnapshotError> {
    let mut buf = [0u8; 2];
    read_exact(r, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32(r: &mut impl Read) -> Result<u32, SnapshotError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i64(r: &mut impl Read) -> Result<i64, SnapshotError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub fn read_f64(r: &mut impl Read) -> Result<f64, SnapshotError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Maximum length accepted for a length-prefixed field (512 MB), so a
/// corrupt prefix can't force a multi-gigabyte allocation.
pub const MAX_FIELD_LEN: usize = 512 * 1024 * 1024;

/// Reads a length-prefixed byte field: `[len: u32][data]`.
pub fn read_bytes(r: &mut impl Read) -> Result<Vec<u8>, SnapshotError> {
    let len = read_u32(r)? as usize;
    if len > MAX_FIELD_LEN {
        return Err(SnapshotError::InvalidData(format!(
            "field length {len} exceeds maximum of {MAX_FIELD_LEN}"
        )));
    }
    let mut buf = vec![0u8; len];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

/// Reads a length-prefixed UTF-8 string field.
pub fn read_string(r: &mut impl Read) -> Result<String, SnapshotError> {
    String::from_utf8(read_bytes(r)?)
        .map_err(|_| SnapshotError::InvalidData("field is not valid utf-8".into()))
}

/// Reads and validates the stream header, returning the version.
pub fn read_header(r: &mut impl Read) -> Result<u8, SnapshotError> {
    let mut magic = [0u8; 4];
    read_exact(r, &mut magic)?;
    if &magic != SNAP_MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version == 0 || version > FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    Ok(version)
}

/// Maximum element count for a persisted collection, catching
/// obviously corrupt count fields before an unbounded decode loop.
pub const MAX_COLLECTION_COUNT: u32 = 100_000_000;

/// Validates a deserialized collection count.
pub fn validate_collection_count(count: u32, label: &str) -> Result<(), SnapshotError> {
    if count > MAX_COLLECTION_COUNT {
        return Err(SnapshotError::InvalidData(format!(
            "{label} count {count} exceeds max {MAX_COLLECTION_COUNT}"
        )));
    }
    Ok(())
}

/// Caps pre-allocation from untrusted count fields. The decode loop
/// still iterates `count` times; this only bounds the up-front
/// reservation.
pub fn capped_capacity(count: u32) -> usize {
    (count as usize).min(65_536)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scalar_round_trips() {
        let mut buf = Vec::new();
        write_u8(&mut buf, 42).unwrap();
        write_u16(&mut buf, 12_345).unwrap();
        write_u32(&mut buf, 0xDEAD_BEEF).unwrap();
        write_i64(&mut buf, -1).unwrap();
        write_f64(&mut buf, 1.5).unwrap();

        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_u8(&mut cursor).unwrap(), 42);
        assert_eq!(read_u16(&mut cursor).unwrap(), 12_345);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_i64(&mut cursor).unwrap(), -1);
        assert_eq!(read_f64(&mut cursor).unwrap(), 1.5);
    }

    #[test]
    fn bytes_round_trip() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, b"hello world").unwrap();
        write_bytes(&mut buf, b"").unwrap();

        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_bytes(&mut cursor).unwrap(), b"hello world");
        assert_eq!(read_bytes(&mut cursor).unwrap(), b"");
    }

    #[test]
    fn header_round_trip() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert_eq!(read_header(&mut Cursor::new(&buf)).unwrap(), FORMAT_VERSION);
    }

    #[test]
    fn header_wrong_magic() {
        let buf = b"XSNP\x01";
        assert!(matches!(
            read_header(&mut Cursor::new(&buf[..])),
            Err(SnapshotError::InvalidMagic)
        ));
    }

    #[test]
    fn header_unsupported_version() {
        let buf = b"CSNP\x63";
        assert!(matches!(
            read_header(&mut Cursor::new(&buf[..])),
            Err(SnapshotError::UnsupportedVersion(0x63))
        ));
    }

    #[test]
    fn truncated_input_is_eof() {
        let buf = [0u8; 2];
        assert!(matches!(
            read_u32(&mut Cursor::new(&buf[..])),
            Err(SnapshotError::UnexpectedEof)
        ));
    }

    #[test]
    fn crc_detects_any_flip() {
        let data = b"some snapshot body";
        let checksum = crc32(data);
        verify_crc32(data, checksum).unwrap();

        let mut flipped = data.to_vec();
        flipped[5] ^= 0x01;
        assert!(matches!(
            verify_crc32(&flipped, checksum),
            Err(SnapshotError::Corrupt { .. })
        ));
    }

    #[test]
    fn oversized_field_length_rejected() {
        let mut buf = Vec::new();
        write_u32(&mut buf, (MAX_FIELD_LEN as u32) + 1).unwrap();
        assert!(matches!(
            read_bytes(&mut Cursor::new(&buf)),
            Err(SnapshotError::InvalidData(_))
        ));
    }
}
