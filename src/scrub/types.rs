//! Type definitions for disc layout and scrub results

use serde::Serialize;

// =============================================================================
// Core Constants
// =============================================================================

/// Version byte stamped into scrubbed images
pub const SCRUBBER_VERSION: u8 = 1;
/// Offset of the version byte (unencrypted pad space in the disc header)
pub const SCRUB_TAG_OFFSET: u64 = 0x80;
/// Disc header byte that is non-zero when partition data is stored unencrypted
pub const DISABLE_ENCRYPTION_OFFSET: u64 = 0x61;
/// Filler written over free clusters
pub const FILLER_BYTE: u8 = 0xFF;

/// Disc header region: boot header, partition table, region info
pub const DISC_HEADER_SIZE: u64 = 0x50000;
/// Partition table: 4 groups of (count, table offset)
pub const PARTITION_TABLE_OFFSET: u64 = 0x40000;
pub const PARTITION_GROUP_COUNT: usize = 4;

/// Cluster counts of standard single- and dual-layer images
pub const SINGLE_LAYER_CLUSTERS: u64 = 0x23048;
pub const DUAL_LAYER_CLUSTERS: u64 = 0x46090;

// Partition header fields, relative to the partition base
pub(crate) const PARTITION_HEADER_SIZE: u64 = 0x2c0;
pub(crate) const TMD_SIZE_FIELD: u64 = 0x2a4;
pub(crate) const TMD_OFFSET_FIELD: u64 = 0x2a8;
pub(crate) const CERT_CHAIN_SIZE_FIELD: u64 = 0x2ac;
pub(crate) const CERT_CHAIN_OFFSET_FIELD: u64 = 0x2b0;
pub(crate) const H3_OFFSET_FIELD: u64 = 0x2b4;
pub(crate) const DATA_OFFSET_FIELD: u64 = 0x2b8;
pub(crate) const DATA_SIZE_FIELD: u64 = 0x2bc;
pub const H3_SIZE: u64 = 0x18000;

// Fields of the logical (decrypted) partition view
pub(crate) const DOL_OFFSET_FIELD: u64 = 0x420;
pub(crate) const FST_OFFSET_FIELD: u64 = 0x424;
pub(crate) const FST_SIZE_FIELD: u64 = 0x428;
pub(crate) const APPLOADER_OFFSET: u64 = 0x2440;
pub(crate) const APPLOADER_SIZE_FIELD: u64 = APPLOADER_OFFSET + 0x14;
pub(crate) const APPLOADER_TRAILER_SIZE_FIELD: u64 = APPLOADER_OFFSET + 0x18;

// =============================================================================
// Partition Catalog
// =============================================================================

/// Header fields of one partition
///
/// TMD, certificate chain, H3 and data offsets are relative to the
/// partition base. DOL and FST offsets are relative to the logical data area.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionHeader {
    pub tmd_size: u32,
    pub tmd_offset: u64,
    pub cert_chain_size: u32,
    pub cert_chain_offset: u64,
    pub h3_offset: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub dol_offset: u64,
    pub dol_size: u64,
    pub fst_offset: u64,
    pub fst_size: u64,
    pub apploader_size: u32,
    pub apploader_trailer_size: u32,
}

/// A partition entry from the partition table
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    /// Partition group (0..4)
    pub group: u32,
    /// Index within the group
    pub index: u32,
    /// Raw byte offset of the partition header
    pub offset: u64,
    /// Partition type code (0 = game, 1 = update, 2 = channel)
    pub kind: u32,
    pub header: PartitionHeader,
}

impl Partition {
    /// Raw byte offset where the partition's data area starts
    pub fn data_base(&self) -> u64 {
        self.offset + self.header.data_offset
    }
}

/// One of the four partition table groups
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionGroup {
    /// Partition count as stored, even when lenient parsing clipped the table
    pub count: u32,
    /// Raw byte offset of this group's partition entries
    pub table_offset: u64,
    pub partitions: Vec<Partition>,
}

// =============================================================================
// Results
// =============================================================================

/// Summary of an analysis or scrub run
#[derive(Serialize, Clone, Debug)]
pub struct ScrubReport {
    pub path: String,
    pub image_size: u64,
    pub cluster_count: u64,
    /// Cluster count matches a single- or dual-layer image
    pub standard_size: bool,
    pub partitions: Vec<Partition>,
    pub used_clusters: u64,
    pub free_clusters: u64,
    /// Bytes overwritten with filler (or that would be, for a dry run)
    pub reclaimed_bytes: u64,
    pub clusters_written: u64,
    pub dry_run: bool,
    /// Version byte was stamped after the rewrite
    pub tag_committed: bool,
    pub started_at: String,
    pub finished_at: Option<String>,
}

/// Result of a scrub request
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScrubOutcome {
    /// Free clusters were overwritten
    Scrubbed(ScrubReport),
    /// Dry run; nothing was written
    Analyzed(ScrubReport),
    /// Image already carries the current version byte
    AlreadyScrubbed { version: u8 },
    /// Image was scrubbed by an older version and re-scrubbing was declined
    Declined { version: u8 },
}

impl ScrubOutcome {
    pub fn report(&self) -> Option<&ScrubReport> {
        match self {
            ScrubOutcome::Scrubbed(report) | ScrubOutcome::Analyzed(report) => Some(report),
            _ => None,
        }
    }
}
