//! Cluster bitmap and used-region marking

use tracing::debug;

use crate::common::{CLUSTER_DATA_SIZE, CLUSTER_SIZE};

/// Translate a logical data-area range into the raw range that holds it
///
/// Every raw cluster stores 0x7c00 payload bytes behind its hash block, so
/// the range starts at the raw cluster holding `offset` and always covers
/// at least one whole cluster more than the payload length needs. The
/// offset into the first cluster is added on top so content straddling a
/// cluster boundary is never under-covered.
pub fn compensate(data_base: u64, offset: u64, length: u64) -> (u64, u64) {
    let start = data_base + (offset / CLUSTER_DATA_SIZE) * CLUSTER_SIZE;
    let clusters = length / CLUSTER_DATA_SIZE + 1;
    let raw_length = clusters * CLUSTER_SIZE + offset % CLUSTER_DATA_SIZE;
    (start, raw_length)
}

/// One free/used flag per cluster of the image
///
/// Every cluster starts out free; marking only ever turns clusters used.
#[derive(Clone, Debug)]
pub struct ClusterBitmap {
    free: Vec<bool>,
    image_size: u64,
}

impl ClusterBitmap {
    pub fn new(image_size: u64) -> Self {
        let count = (image_size / CLUSTER_SIZE) as usize;
        Self {
            free: vec![true; count],
            image_size,
        }
    }

    pub fn len(&self) -> u64 {
        self.free.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn image_size(&self) -> u64 {
        self.image_size
    }

    pub fn is_free(&self, cluster: u64) -> bool {
        self.free.get(cluster as usize).copied().unwrap_or(false)
    }

    pub fn is_used(&self, cluster: u64) -> bool {
        !self.is_free(cluster)
    }

    pub fn used_count(&self) -> u64 {
        self.free.iter().filter(|&&free| !free).count() as u64
    }

    pub fn free_count(&self) -> u64 {
        self.free.iter().filter(|&&free| free).count() as u64
    }

    /// Iterate `(cluster, is_free)` over the whole image
    pub fn iter(&self) -> impl Iterator<Item = (u64, bool)> + '_ {
        self.free.iter().enumerate().map(|(i, &free)| (i as u64, free))
    }

    /// Mark every cluster intersecting `[offset, offset + length)` as used
    ///
    /// The range is clipped to the image; anything past the end is ignored.
    pub fn mark_used(&mut self, offset: u64, length: u64) {
        let end = offset.saturating_add(length).min(self.image_size);
        debug!(
            "Marking 0x{:016x} - 0x{:016x} as used",
            offset,
            offset.saturating_add(length)
        );
        if offset >= end {
            return;
        }

        let first = offset / CLUSTER_SIZE;
        let last = ((end - 1) / CLUSTER_SIZE).min(self.len().saturating_sub(1));
        for cluster in first..=last {
            if let Some(flag) = self.free.get_mut(cluster as usize) {
                *flag = false;
            }
        }
    }

    /// Mark a logical data-area range of a partition as used
    pub fn mark_used_logical(&mut self, data_base: u64, offset: u64, length: u64) {
        let (start, raw_length) = compensate(data_base, offset, length);
        self.mark_used(start, raw_length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bitmap_all_free() {
        let bitmap = ClusterBitmap::new(32 * CLUSTER_SIZE + 100);
        assert_eq!(bitmap.len(), 32);
        assert_eq!(bitmap.free_count(), 32);
        assert_eq!(bitmap.used_count(), 0);
        assert!(bitmap.iter().all(|(_, free)| free));
    }

    #[test]
    fn test_mark_used_intersecting_clusters() {
        let mut bitmap = ClusterBitmap::new(8 * CLUSTER_SIZE);
        // Straddles the boundary between clusters 0 and 1
        bitmap.mark_used(0x7000, 0x2000);
        assert!(bitmap.is_used(0));
        assert!(bitmap.is_used(1));
        assert!(bitmap.is_free(2));

        // Idempotent
        bitmap.mark_used(0x7000, 0x2000);
        assert_eq!(bitmap.used_count(), 2);

        // Zero length marks nothing
        bitmap.mark_used(5 * CLUSTER_SIZE, 0);
        assert!(bitmap.is_free(5));
    }

    #[test]
    fn test_mark_used_clips_to_image() {
        let mut bitmap = ClusterBitmap::new(4 * CLUSTER_SIZE);
        bitmap.mark_used(3 * CLUSTER_SIZE, 100 * CLUSTER_SIZE);
        bitmap.mark_used(50 * CLUSTER_SIZE, CLUSTER_SIZE);
        bitmap.mark_used(u64::MAX - 10, 100);
        assert_eq!(bitmap.used_count(), 1);
        assert!(bitmap.is_used(3));
    }

    #[test]
    fn test_compensate_formula() {
        assert_eq!(compensate(0x70000, 0, 100), (0x70000, 0x8000));
        // Payload of exactly one cluster still rounds up by one
        assert_eq!(compensate(0x70000, 0, 0x7c00), (0x70000, 0x10000));
        // Offset inside the third payload cluster
        assert_eq!(compensate(0x70000, 2 * 0x7c00 + 0x10, 4), (0x80000, 0x8010));
    }

    #[test]
    fn test_straddling_extent_marks_both_clusters() {
        let data_base = 4 * CLUSTER_SIZE;
        let mut bitmap = ClusterBitmap::new(16 * CLUSTER_SIZE);

        // 100 bytes starting 10 bytes before the end of payload cluster 1
        bitmap.mark_used_logical(data_base, 2 * CLUSTER_DATA_SIZE - 10, 100);

        assert!(bitmap.is_free(4));
        assert!(bitmap.is_used(5));
        assert!(bitmap.is_used(6));
        assert!(bitmap.is_free(7));
    }

    #[test]
    fn test_logical_extent_never_under_covered() {
        let data_base = 2 * CLUSTER_SIZE;
        let mut bitmap = ClusterBitmap::new(64 * CLUSTER_SIZE);
        let (offset, length) = (3 * CLUSTER_DATA_SIZE + 0x1234, 5 * CLUSTER_DATA_SIZE);
        bitmap.mark_used_logical(data_base, offset, length);

        for byte in [offset, offset + length / 2, offset + length - 1] {
            let raw_cluster = 2 + byte / CLUSTER_DATA_SIZE;
            assert!(bitmap.is_used(raw_cluster), "cluster {} not marked", raw_cluster);
        }
    }
}
