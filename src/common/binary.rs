// Shared binary reading utilities for disc image parsing
//
// All on-disc integers are big-endian. Offset fields are stored as
// 32-bit values pre-shifted right by 2 and must be scaled by 4.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{ScrubError, ScrubResult};

/// Shift applied to 32-bit offset/size fields stored in word units
pub const OFFSET_SHIFT: u32 = 2;

/// Width of a big-endian integer field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteWidth {
    U8,
    U16,
    U32,
    U64,
}

impl ByteWidth {
    /// Number of bytes occupied by a field of this width
    pub fn len(self) -> usize {
        match self {
            ByteWidth::U8 => 1,
            ByteWidth::U16 => 2,
            ByteWidth::U32 => 4,
            ByteWidth::U64 => 8,
        }
    }
}

// =============================================================================
// Slice Decoding
// =============================================================================

/// Decode a big-endian integer of the given width from the start of `bytes`
///
/// Returns `None` if `bytes` is shorter than the field.
pub fn be_from_slice(bytes: &[u8], width: ByteWidth) -> Option<u64> {
    let field = bytes.get(..width.len())?;
    Some(field.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Decode a big-endian integer at `offset` within `bytes`
pub fn be_at(bytes: &[u8], offset: usize, width: ByteWidth) -> Option<u64> {
    be_from_slice(bytes.get(offset..)?, width)
}

/// Decode a 32-bit word-unit field at `offset` and scale it to bytes
pub fn shifted_at(bytes: &[u8], offset: usize) -> Option<u64> {
    be_at(bytes, offset, ByteWidth::U32).map(|v| v << OFFSET_SHIFT)
}

// =============================================================================
// Reader Access (seek + read)
// =============================================================================

/// Fill `buf` from `reader` starting at absolute `offset`
pub fn read_exact_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> ScrubResult<()> {
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|source| ScrubError::Read { offset, source })?;
    reader
        .read_exact(buf)
        .map_err(|source| ScrubError::Read { offset, source })
}

/// Read a big-endian integer of the given width at `offset`
pub fn read_be_at<R: Read + Seek>(reader: &mut R, offset: u64, width: ByteWidth) -> ScrubResult<u64> {
    let mut buf = [0u8; 8];
    let field = &mut buf[..width.len()];
    read_exact_at(reader, offset, field)?;
    Ok(be_from_slice(field, width).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_be_widths() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        assert_eq!(be_from_slice(&bytes, ByteWidth::U8), Some(0x12));
        assert_eq!(be_from_slice(&bytes, ByteWidth::U16), Some(0x1234));
        assert_eq!(be_from_slice(&bytes, ByteWidth::U32), Some(0x12345678));
        assert_eq!(be_from_slice(&bytes, ByteWidth::U64), Some(0x123456789ABCDEF0));
        assert_eq!(be_from_slice(&bytes[..3], ByteWidth::U32), None);
    }

    #[test]
    fn test_shifted_field_scales_by_four() {
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x08];
        assert_eq!(shifted_at(&bytes, 4), Some(0x40020));
        assert_eq!(shifted_at(&bytes, 6), None);
    }

    #[test]
    fn test_read_be_at() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(read_be_at(&mut cursor, 4, ByteWidth::U32).unwrap(), 0xDEADBEEF);
        assert_eq!(read_be_at(&mut cursor, 6, ByteWidth::U16).unwrap(), 0xBEEF);
        assert!(matches!(
            read_be_at(&mut cursor, 6, ByteWidth::U32),
            Err(ScrubError::Read { offset: 6, .. })
        ));
    }
}
