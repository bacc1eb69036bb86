//! Volume views over a disc image
//!
//! A disc image is read through two kinds of view:
//!
//! - the **raw** view: plain byte offsets into the image file, including
//!   the hash blocks interleaved into every partition cluster
//! - a **partition** view: the logical (decrypted) data area of one
//!   partition, where every 0x8000-byte raw cluster contributes only its
//!   0x7c00 payload bytes
//!
//! Both are exposed through the [`Volume`] trait. Partition views are
//! produced on demand by a [`PartitionOpener`] and dropped as soon as that
//! partition has been processed, so at most one is alive at a time.

mod clear;
mod file;

pub use clear::{logical_to_raw, ClearPartitionOpener, ClearPartitionView};
pub use file::FileVolume;

use std::io;

use crate::common::{be_from_slice, ByteWidth, OFFSET_SHIFT};
use crate::error::{ScrubError, ScrubResult};
use crate::scrub::Partition;

/// Random-access, read-only byte view
pub trait Volume {
    /// Size of the view in bytes
    fn size(&self) -> u64;

    /// Fill `buf` with the bytes starting at `offset`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> ScrubResult<()>;

    /// Read a big-endian integer of the given width
    fn read_be(&mut self, offset: u64, width: ByteWidth) -> ScrubResult<u64> {
        let mut buf = [0u8; 8];
        let field = &mut buf[..width.len()];
        self.read_at(offset, field)?;
        Ok(be_from_slice(field, width).unwrap_or_default())
    }

    /// Read a plain 32-bit big-endian field
    fn read_u32(&mut self, offset: u64) -> ScrubResult<u32> {
        Ok(self.read_be(offset, ByteWidth::U32)? as u32)
    }

    /// Read a 32-bit offset/size field stored in word units, scaled to bytes
    fn read_shifted(&mut self, offset: u64) -> ScrubResult<u64> {
        Ok(self.read_be(offset, ByteWidth::U32)? << OFFSET_SHIFT)
    }
}

/// Produces the logical view of a single partition
///
/// Implementations own whatever decryption the partition needs.
pub trait PartitionOpener {
    fn open(&self, partition: &Partition) -> ScrubResult<Box<dyn Volume>>;
}

/// In-memory view, used for small images and tests
#[derive(Clone, Debug, Default)]
pub struct MemVolume {
    data: Vec<u8>,
}

impl MemVolume {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Volume for MemVolume {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> ScrubResult<()> {
        let start = usize::try_from(offset).ok();
        let src = start
            .and_then(|s| s.checked_add(buf.len()).map(|e| (s, e)))
            .and_then(|(s, e)| self.data.get(s..e))
            .ok_or_else(|| ScrubError::Read {
                offset,
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of volume"),
            })?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
