//! Rewrite pass: overwrite free clusters with filler

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{error, info, instrument, trace};

use super::bitmap::ClusterBitmap;
use super::types::FILLER_BYTE;
use crate::common::CLUSTER_SIZE;
use crate::error::{ScrubError, ScrubResult};
use crate::logging::is_trace_enabled;

/// Overwrite every free cluster of the image at `path` in place
///
/// Used clusters are neither read nor written. The first failed write
/// aborts the pass and leaves the file partially rewritten. Progress is
/// reported every `progress_interval` clusters and once at the end.
///
/// Returns the number of clusters written.
#[instrument(skip(bitmap, progress))]
pub fn rewrite_free_clusters<P>(
    path: &Path,
    bitmap: &ClusterBitmap,
    progress_interval: u64,
    progress: &mut P,
) -> ScrubResult<u64>
where
    P: FnMut(&str, f32),
{
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| {
            error!(?path, "Failed to open image for writing: {}", source);
            ScrubError::Access {
                path: path.to_path_buf(),
                source,
            }
        })?;

    let filler = vec![FILLER_BYTE; CLUSTER_SIZE as usize];
    let count = bitmap.len();
    let interval = progress_interval.max(1);
    let trace_enabled = is_trace_enabled();
    let mut written = 0u64;

    info!(count, free = bitmap.free_count(), "Removing unused data");
    for (cluster, free) in bitmap.iter() {
        let offset = cluster * CLUSTER_SIZE;

        if free {
            if trace_enabled {
                trace!("Freeing 0x{:016x}", offset);
            }
            file.seek(SeekFrom::Start(offset))
                .and_then(|_| file.write_all(&filler))
                .map_err(|source| {
                    error!(cluster, "Scrub aborted, image left partially rewritten: {}", source);
                    ScrubError::Write { cluster, source }
                })?;
            written += 1;
        } else if trace_enabled {
            trace!("Used    0x{:016x}", offset);
        }

        if cluster % interval == 0 {
            let status = format!(
                "Scrubbing: {}/{} ({})",
                cluster,
                count,
                if free { "Free" } else { "Used" }
            );
            progress(&status, cluster as f32 / count as f32);
        }
    }

    file.flush()
        .and_then(|_| file.sync_all())
        .map_err(|source| ScrubError::Write { cluster: count, source })?;

    progress("Scrubbing: done", 1.0);
    info!(written, "Done removing unused data");
    Ok(written)
}
