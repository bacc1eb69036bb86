//! Logical view of partitions stored without encryption
//!
//! Each raw cluster of a partition's data area holds a 0x400-byte hash
//! block followed by 0x7c00 bytes of payload. This view strips the hash
//! blocks and exposes the payload as one contiguous byte range, which is
//! what a decrypting view produces for encrypted media.

use std::cmp::min;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{PartitionOpener, Volume};
use crate::common::{read_exact_at, CLUSTER_DATA_SIZE, CLUSTER_HASH_SIZE, CLUSTER_SIZE};
use crate::error::{ScrubError, ScrubResult};
use crate::scrub::types::DISABLE_ENCRYPTION_OFFSET;
use crate::scrub::Partition;

/// Map a logical data-area offset to its raw position in the image
pub fn logical_to_raw(data_base: u64, logical: u64) -> u64 {
    let cluster = logical / CLUSTER_DATA_SIZE;
    let within = logical % CLUSTER_DATA_SIZE;
    data_base + cluster * CLUSTER_SIZE + CLUSTER_HASH_SIZE + within
}

/// Logical view of one partition's data area
pub struct ClearPartitionView {
    file: File,
    data_base: u64,
    size: u64,
}

impl ClearPartitionView {
    /// Open the view, refusing images whose header marks partitions encrypted
    pub fn open(path: &Path, partition: &Partition) -> ScrubResult<Self> {
        let mut file = File::open(path).map_err(|source| ScrubError::Access {
            path: path.to_path_buf(),
            source,
        })?;
        let mut flag = [0u8; 1];
        read_exact_at(&mut file, DISABLE_ENCRYPTION_OFFSET, &mut flag)?;
        if flag[0] == 0 {
            return Err(ScrubError::Encrypted {
                group: partition.group,
                index: partition.index,
            });
        }

        let data_base = partition.data_base();
        let size = partition.header.data_size / CLUSTER_SIZE * CLUSTER_DATA_SIZE;
        debug!(
            group = partition.group,
            index = partition.index,
            data_base,
            size,
            "Opened partition view"
        );

        Ok(Self { file, data_base, size })
    }
}

impl Volume for ClearPartitionView {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> ScrubResult<()> {
        let end = offset.checked_add(buf.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(ScrubError::Read {
                offset,
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of partition data"),
            });
        }

        let mut done = 0usize;
        while done < buf.len() {
            let position = offset + done as u64;
            let within = position % CLUSTER_DATA_SIZE;
            let chunk = min((CLUSTER_DATA_SIZE - within) as usize, buf.len() - done);
            let raw = logical_to_raw(self.data_base, position);
            read_exact_at(&mut self.file, raw, &mut buf[done..done + chunk])?;
            done += chunk;
        }
        Ok(())
    }
}

/// Opens [`ClearPartitionView`]s over an image file
#[derive(Clone, Debug)]
pub struct ClearPartitionOpener {
    path: PathBuf,
}

impl ClearPartitionOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PartitionOpener for ClearPartitionOpener {
    fn open(&self, partition: &Partition) -> ScrubResult<Box<dyn Volume>> {
        Ok(Box::new(ClearPartitionView::open(&self.path, partition)?))
    }
}
