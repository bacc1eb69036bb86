//! Scrub session: builds the cluster bitmap for one image

use tracing::{debug, info, instrument, warn};

use super::bitmap::ClusterBitmap;
use super::catalog::{mark_fixed_regions, read_partition_table};
use super::dol::dol_extent;
use super::types::*;
use crate::common::CLUSTER_SIZE;
use crate::config::ScrubOptions;
use crate::error::ScrubResult;
use crate::fst::FileSystemWalker;
use crate::volume::{PartitionOpener, Volume};

/// Owns the bitmap and partition catalog for the duration of one run
pub struct ScrubSession {
    bitmap: ClusterBitmap,
    groups: Vec<PartitionGroup>,
}

impl ScrubSession {
    /// Empty session for an image of `image_size` bytes
    pub fn new(image_size: u64) -> Self {
        let bitmap = ClusterBitmap::new(image_size);
        let clusters = bitmap.len();
        if !is_standard_size(clusters) {
            warn!(
                "Image is not a standard sized disc ({:#x} clusters, expected {:#x} or {:#x})",
                clusters, SINGLE_LAYER_CLUSTERS, DUAL_LAYER_CLUSTERS
            );
        }

        Self {
            bitmap,
            groups: Vec::new(),
        }
    }

    /// Parse the image and mark every live region
    ///
    /// `raw` is the outer view; each partition's logical view comes from
    /// `opener` and is released before the next partition is opened.
    #[instrument(skip_all)]
    pub fn analyze(
        raw: &mut dyn Volume,
        opener: &dyn PartitionOpener,
        walker: &dyn FileSystemWalker,
        options: &ScrubOptions,
    ) -> ScrubResult<Self> {
        let mut session = Self::new(raw.size());

        if options.reserve_disc_header {
            session.bitmap.mark_used(0, DISC_HEADER_SIZE);
        }

        let mut groups = read_partition_table(raw, options.strict_layout)?;
        for group in &mut groups {
            for partition in &mut group.partitions {
                mark_fixed_regions(&mut session.bitmap, partition);

                let mut view = opener.open(partition)?;
                session.mark_partition_data(partition, view.as_mut(), walker)?;
            }
        }
        session.groups = groups;

        info!(
            clusters = session.bitmap.len(),
            used = session.bitmap.used_count(),
            free = session.bitmap.free_count(),
            "Analysis complete"
        );
        Ok(session)
    }

    /// Mark everything a partition's logical view references
    fn mark_partition_data(
        &mut self,
        partition: &mut Partition,
        view: &mut dyn Volume,
        walker: &dyn FileSystemWalker,
    ) -> ScrubResult<()> {
        let data_base = partition.data_base();
        let header = &mut partition.header;

        // Disc header, header information and apploader
        header.apploader_size = view.read_u32(APPLOADER_SIZE_FIELD)?;
        header.apploader_trailer_size = view.read_u32(APPLOADER_TRAILER_SIZE_FIELD)?;
        let boot_span = APPLOADER_OFFSET
            + u64::from(header.apploader_size)
            + u64::from(header.apploader_trailer_size);
        self.bitmap.mark_used_logical(data_base, 0, boot_span);

        header.dol_offset = view.read_shifted(DOL_OFFSET_FIELD)?;
        header.dol_size = dol_extent(view, header.dol_offset)?;
        self.bitmap.mark_used_logical(data_base, header.dol_offset, header.dol_size);

        header.fst_offset = view.read_shifted(FST_OFFSET_FIELD)?;
        header.fst_size = view.read_shifted(FST_SIZE_FIELD)?;
        self.bitmap.mark_used_logical(data_base, header.fst_offset, header.fst_size);

        let entries = walker.list(view)?;
        for entry in &entries {
            self.bitmap.mark_used_logical(data_base, entry.offset, entry.marked_length());
        }
        debug!(
            group = partition.group,
            index = partition.index,
            dol_size = partition.header.dol_size,
            entries = entries.len(),
            "Partition data marked"
        );
        Ok(())
    }

    pub fn bitmap(&self) -> &ClusterBitmap {
        &self.bitmap
    }

    pub fn groups(&self) -> &[PartitionGroup] {
        &self.groups
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.groups.iter().flat_map(|g| g.partitions.iter())
    }

    /// Summary of the analysis; rewrite fields start at zero
    pub fn report(&self, path: &str, dry_run: bool, started_at: String) -> ScrubReport {
        let free = self.bitmap.free_count();
        ScrubReport {
            path: path.to_string(),
            image_size: self.bitmap.image_size(),
            cluster_count: self.bitmap.len(),
            standard_size: is_standard_size(self.bitmap.len()),
            partitions: self.partitions().cloned().collect(),
            used_clusters: self.bitmap.used_count(),
            free_clusters: free,
            reclaimed_bytes: free * CLUSTER_SIZE,
            clusters_written: 0,
            dry_run,
            tag_committed: false,
            started_at,
            finished_at: None,
        }
    }

    pub fn into_bitmap(self) -> ClusterBitmap {
        self.bitmap
    }
}

/// Cluster count of a single- or dual-layer disc
pub fn is_standard_size(clusters: u64) -> bool {
    clusters == SINGLE_LAYER_CLUSTERS || clusters == DUAL_LAYER_CLUSTERS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CLUSTER_DATA_SIZE, CLUSTER_SIZE};
    use crate::fst::{build_fst, FileEntry, FstWalker};
    use crate::scrub::dol::build_dol_table;
    use crate::volume::MemVolume;
    use std::cell::Cell;

    fn put(image: &mut [u8], at: u64, value: u32) {
        let at = at as usize;
        image[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Raw image: one partition at 0x50000, data area at 0x70000
    fn raw_image() -> Vec<u8> {
        let mut image = vec![0u8; 0x100000];
        put(&mut image, 0x40000, 1);
        put(&mut image, 0x40004, 0x40020 >> 2);
        put(&mut image, 0x40020, 0x50000 >> 2);
        put(&mut image, 0x502a4, 0x208);
        put(&mut image, 0x502a8, 0x2c0 >> 2);
        put(&mut image, 0x502ac, 0xa00);
        put(&mut image, 0x502b0, 0x4c0 >> 2);
        put(&mut image, 0x502b4, 0x8000 >> 2);
        put(&mut image, 0x502b8, 0x20000 >> 2);
        put(&mut image, 0x502bc, 0x90000 >> 2);
        image
    }

    /// Logical data area with DOL, FST and one file at known clusters
    fn logical_data() -> Vec<u8> {
        let mut data = vec![0u8; (18 * CLUSTER_DATA_SIZE) as usize];
        let dol_offset = 2 * CLUSTER_DATA_SIZE;
        let fst_offset = 4 * CLUSTER_DATA_SIZE;

        put(&mut data, 0x420, (dol_offset >> 2) as u32);
        put(&mut data, 0x424, (fst_offset >> 2) as u32);
        put(&mut data, 0x2454, 0x1000);
        put(&mut data, 0x2458, 0x20);

        let dol = build_dol_table(&[(0x100, 0x800)], &[(0x900, 0x100)]);
        data[dol_offset as usize..dol_offset as usize + dol.len()].copy_from_slice(&dol);

        let fst = build_fst(&[("game.bin", false, 6 * CLUSTER_DATA_SIZE, 100)]);
        put(&mut data, 0x428, ((fst.len() as u32) + 3) >> 2);
        data[fst_offset as usize..fst_offset as usize + fst.len()].copy_from_slice(&fst);
        data
    }

    struct MemOpener {
        data: Vec<u8>,
        opened: Cell<u32>,
    }

    impl PartitionOpener for MemOpener {
        fn open(&self, _partition: &Partition) -> ScrubResult<Box<dyn Volume>> {
            self.opened.set(self.opened.get() + 1);
            Ok(Box::new(MemVolume::new(self.data.clone())))
        }
    }

    #[test]
    fn test_analyze_marks_live_regions_only() {
        let mut raw = MemVolume::new(raw_image());
        let opener = MemOpener { data: logical_data(), opened: Cell::new(0) };
        let session = ScrubSession::analyze(&mut raw, &opener, &FstWalker, &ScrubOptions::default()).unwrap();
        let bitmap = session.bitmap();

        assert_eq!(opener.opened.get(), 1);
        assert_eq!(bitmap.len(), 32);

        // Disc header (0..=9), partition header/TMD/certs (10), H3 (11..=13)
        for cluster in 0..=13 {
            assert!(bitmap.is_used(cluster), "cluster {}", cluster);
        }
        // Data area starts at cluster 14: boot+apploader, DOL, FST, file
        for (cluster, used) in [(14, true), (15, false), (16, true), (17, false), (18, true), (19, false), (20, true)] {
            assert_eq!(bitmap.is_used(cluster), used, "cluster {}", cluster);
        }
        for cluster in 21..32 {
            assert!(bitmap.is_free(cluster), "cluster {}", cluster);
        }

        let partition = session.partitions().next().unwrap();
        assert_eq!(partition.header.apploader_size, 0x1000);
        assert_eq!(partition.header.apploader_trailer_size, 0x20);
        assert_eq!(partition.header.dol_offset, 2 * CLUSTER_DATA_SIZE);
        assert_eq!(partition.header.dol_size, 0xa00);
        assert_eq!(partition.header.fst_offset, 4 * CLUSTER_DATA_SIZE);

        let report = session.report("mem", true, "now".to_string());
        assert_eq!(report.cluster_count, 32);
        assert_eq!(report.used_clusters, 18);
        assert_eq!(report.free_clusters, 14);
        assert_eq!(report.reclaimed_bytes, 14 * CLUSTER_SIZE);
        assert!(!report.standard_size);
    }

    #[test]
    fn test_disc_header_reservation_is_optional() {
        let mut raw = MemVolume::new(raw_image());
        let opener = MemOpener { data: logical_data(), opened: Cell::new(0) };
        let options = ScrubOptions {
            reserve_disc_header: false,
            ..Default::default()
        };
        let session = ScrubSession::analyze(&mut raw, &opener, &FstWalker, &options).unwrap();
        assert!(session.bitmap().is_free(0));
        assert!(session.bitmap().is_used(10));
    }

    struct FixedWalker(Vec<FileEntry>);

    impl FileSystemWalker for FixedWalker {
        fn list(&self, _view: &mut dyn Volume) -> ScrubResult<Vec<FileEntry>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_directory_entries_reserve_one_cluster() {
        let mut raw = MemVolume::new(raw_image());
        let opener = MemOpener { data: logical_data(), opened: Cell::new(0) };
        let walker = FixedWalker(vec![FileEntry {
            path: "/dir".to_string(),
            offset: 10 * CLUSTER_DATA_SIZE,
            size: 0x7FFF_FFFF,
            is_dir: true,
        }]);
        let session = ScrubSession::analyze(&mut raw, &opener, &walker, &ScrubOptions::default()).unwrap();
        assert!(session.bitmap().is_used(24));
        assert!(session.bitmap().is_free(25));
        assert!(session.bitmap().is_free(20));
    }

    #[test]
    fn test_standard_sizes() {
        assert!(is_standard_size(0x23048));
        assert!(is_standard_size(0x46090));
        assert!(!is_standard_size(32));
    }
}
