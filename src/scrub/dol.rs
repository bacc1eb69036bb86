//! Executable (DOL) extent scanning
//!
//! The DOL header has no total-size field. Its size is the furthest end of
//! any of its 7 code and 11 data segments.

use crate::common::{be_at, ByteWidth};
use crate::error::ScrubResult;
use crate::volume::Volume;

pub const DOL_CODE_SEGMENTS: usize = 7;
pub const DOL_DATA_SEGMENTS: usize = 11;

const CODE_OFFSETS: usize = 0x00;
const DATA_OFFSETS: usize = 0x1c;
const CODE_SIZES: usize = 0x90;
const DATA_SIZES: usize = 0xac;
/// Bytes of header covering the segment tables
pub const DOL_TABLE_SIZE: usize = DATA_SIZES + DOL_DATA_SEGMENTS * 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DolSegment {
    /// Offset from the start of the DOL
    pub offset: u32,
    pub size: u32,
}

impl DolSegment {
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

/// Segment tables of a DOL header
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DolHeader {
    pub code: [DolSegment; DOL_CODE_SEGMENTS],
    pub data: [DolSegment; DOL_DATA_SEGMENTS],
}

impl DolHeader {
    /// Parse the segment tables; `None` if `bytes` is too short
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < DOL_TABLE_SIZE {
            return None;
        }
        let field = |base: usize, i: usize| be_at(bytes, base + i * 4, ByteWidth::U32).map(|v| v as u32);

        let mut header = DolHeader::default();
        for (i, segment) in header.code.iter_mut().enumerate() {
            segment.offset = field(CODE_OFFSETS, i)?;
            segment.size = field(CODE_SIZES, i)?;
        }
        for (i, segment) in header.data.iter_mut().enumerate() {
            segment.offset = field(DATA_OFFSETS, i)?;
            segment.size = field(DATA_SIZES, i)?;
        }
        Some(header)
    }

    /// Furthest segment end over all 18 segments
    pub fn extent(&self) -> u64 {
        self.code
            .iter()
            .chain(self.data.iter())
            .map(DolSegment::end)
            .max()
            .unwrap_or(0)
    }
}

/// Compute the size of the DOL at `dol_offset` in a partition view
pub fn dol_extent(view: &mut dyn Volume, dol_offset: u64) -> ScrubResult<u64> {
    let mut table = [0u8; DOL_TABLE_SIZE];
    view.read_at(dol_offset, &mut table)?;
    Ok(DolHeader::parse(&table).map(|h| h.extent()).unwrap_or(0))
}

#[cfg(test)]
pub(crate) fn build_dol_table(code: &[(u32, u32)], data: &[(u32, u32)]) -> Vec<u8> {
    let mut table = vec![0u8; DOL_TABLE_SIZE];
    let mut put = |at: usize, value: u32| table[at..at + 4].copy_from_slice(&value.to_be_bytes());
    for (i, &(offset, size)) in code.iter().enumerate() {
        put(CODE_OFFSETS + i * 4, offset);
        put(CODE_SIZES + i * 4, size);
    }
    for (i, &(offset, size)) in data.iter().enumerate() {
        put(DATA_OFFSETS + i * 4, offset);
        put(DATA_SIZES + i * 4, size);
    }
    table
}
