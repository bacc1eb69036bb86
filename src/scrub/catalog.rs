//! Partition table parsing and fixed-region marking
//!
//! Everything here works on the raw view; nothing is decrypted.

use tracing::{debug, instrument, warn};

use super::bitmap::ClusterBitmap;
use super::types::*;
use crate::error::{ScrubError, ScrubResult};
use crate::volume::Volume;

/// Bytes per partition table entry: (offset, type)
const PARTITION_ENTRY_SIZE: u64 = 8;

/// Read the four partition groups and every partition header
///
/// With `strict` set, a group table or partition header lying outside the
/// image is an error. Otherwise it is logged and the out-of-range part
/// is skipped.
#[instrument(skip(raw))]
pub fn read_partition_table(raw: &mut dyn Volume, strict: bool) -> ScrubResult<Vec<PartitionGroup>> {
    let image_size = raw.size();
    let mut groups = Vec::with_capacity(PARTITION_GROUP_COUNT);

    for group_index in 0..PARTITION_GROUP_COUNT as u64 {
        let entry = PARTITION_TABLE_OFFSET + group_index * 8;
        let count = raw.read_u32(entry)?;
        let table_offset = raw.read_shifted(entry + 4)?;

        // Entries actually read; smaller than `count` when the table is clipped
        let mut readable = count;
        let table_end = table_offset.saturating_add(u64::from(count) * PARTITION_ENTRY_SIZE);
        if count > 0 && table_end > image_size {
            let message = format!(
                "group {} table at 0x{:x} with {} entries exceeds image size 0x{:x}",
                group_index, table_offset, count, image_size
            );
            if strict {
                return Err(ScrubError::Layout(message));
            }
            warn!("{}", message);
            readable = (image_size.saturating_sub(table_offset) / PARTITION_ENTRY_SIZE) as u32;
        }

        let mut partitions = Vec::with_capacity(readable as usize);
        for index in 0..readable {
            let entry = table_offset + u64::from(index) * PARTITION_ENTRY_SIZE;
            let offset = raw.read_shifted(entry)?;
            let kind = raw.read_u32(entry + 4)?;

            if offset.saturating_add(PARTITION_HEADER_SIZE) > image_size {
                let message = format!(
                    "partition {}.{} header at 0x{:x} exceeds image size 0x{:x}",
                    group_index, index, offset, image_size
                );
                if strict {
                    return Err(ScrubError::Layout(message));
                }
                warn!("{}", message);
                continue;
            }

            let header = read_partition_header(raw, offset)?;
            let partition = Partition {
                group: group_index as u32,
                index,
                offset,
                kind,
                header,
            };
            debug!(
                group = partition.group,
                index,
                offset,
                kind,
                data_offset = partition.header.data_offset,
                data_size = partition.header.data_size,
                "Parsed partition"
            );
            if strict {
                validate_partition(&partition, image_size)?;
            }
            partitions.push(partition);
        }

        groups.push(PartitionGroup {
            count,
            table_offset,
            partitions,
        });
    }

    Ok(groups)
}

/// Read the header fields of the partition at raw offset `base`
pub fn read_partition_header(raw: &mut dyn Volume, base: u64) -> ScrubResult<PartitionHeader> {
    Ok(PartitionHeader {
        tmd_size: raw.read_u32(base + TMD_SIZE_FIELD)?,
        tmd_offset: raw.read_shifted(base + TMD_OFFSET_FIELD)?,
        cert_chain_size: raw.read_u32(base + CERT_CHAIN_SIZE_FIELD)?,
        cert_chain_offset: raw.read_shifted(base + CERT_CHAIN_OFFSET_FIELD)?,
        h3_offset: raw.read_shifted(base + H3_OFFSET_FIELD)?,
        data_offset: raw.read_shifted(base + DATA_OFFSET_FIELD)?,
        data_size: raw.read_shifted(base + DATA_SIZE_FIELD)?,
        ..Default::default()
    })
}

/// Check that every region of a partition lies inside the image
pub fn validate_partition(partition: &Partition, image_size: u64) -> ScrubResult<()> {
    let header = &partition.header;
    let regions = [
        ("TMD", header.tmd_offset, u64::from(header.tmd_size)),
        ("certificate chain", header.cert_chain_offset, u64::from(header.cert_chain_size)),
        ("H3 table", header.h3_offset, H3_SIZE),
        ("data area", header.data_offset, header.data_size),
    ];

    for (name, offset, size) in regions {
        let end = partition.offset.saturating_add(offset).saturating_add(size);
        if end > image_size {
            return Err(ScrubError::Layout(format!(
                "partition {}.{} {} ends at 0x{:x}, past image size 0x{:x}",
                partition.group, partition.index, name, end, image_size
            )));
        }
    }
    Ok(())
}

/// Mark the header, TMD, certificate chain and H3 table of a partition
///
/// The data area is left alone; it is marked piecewise from the
/// partition's file system.
pub fn mark_fixed_regions(bitmap: &mut ClusterBitmap, partition: &Partition) {
    let base = partition.offset;
    let header = &partition.header;

    bitmap.mark_used(base, PARTITION_HEADER_SIZE);
    bitmap.mark_used(base + header.tmd_offset, u64::from(header.tmd_size));
    bitmap.mark_used(base + header.cert_chain_offset, u64::from(header.cert_chain_size));
    bitmap.mark_used(base + header.h3_offset, H3_SIZE);
}
