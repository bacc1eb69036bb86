//! Public API for scrub operations

use chrono::Utc;
use std::path::Path;
use tracing::{error, info, instrument};

use super::bitmap::ClusterBitmap;
use super::marker::{probe, write_tag, TagState};
use super::rewrite::rewrite_free_clusters;
use super::session::ScrubSession;
use super::types::*;
use crate::config::ScrubOptions;
use crate::error::ScrubResult;
use crate::fst::{FileSystemWalker, FstWalker};
use crate::volume::{FileVolume, PartitionOpener};

/// Read the scrub version byte of an image (0 = never scrubbed)
pub fn is_scrubbed(path: &Path) -> ScrubResult<u8> {
    probe(path)
}

/// Build the cluster bitmap without touching the image
#[instrument(skip(opener, walker, options))]
pub fn analyze(
    path: &Path,
    opener: &dyn PartitionOpener,
    walker: &dyn FileSystemWalker,
    options: &ScrubOptions,
) -> ScrubResult<(ScrubReport, ClusterBitmap)> {
    let started_at = Utc::now().to_rfc3339();
    let mut raw = FileVolume::open(path)?;
    let session = ScrubSession::analyze(&mut raw, opener, walker, options)?;

    let mut report = session.report(&path.to_string_lossy(), true, started_at);
    report.finished_at = Some(Utc::now().to_rfc3339());
    Ok((report, session.into_bitmap()))
}

/// Scrub an image using the FST walker and no progress reporting
///
/// Images stamped by an older version are re-scrubbed only when
/// `options.rescrub_stale` is set.
pub fn scrub(path: &Path, opener: &dyn PartitionOpener, options: &ScrubOptions) -> ScrubResult<ScrubOutcome> {
    let rescrub = options.rescrub_stale;
    scrub_with_progress(path, opener, &FstWalker, options, |_, _| {}, |_| rescrub)
}

/// Scrub an image, reporting progress and asking before re-scrubbing
///
/// `progress` receives a status line and the overall fraction done.
/// `confirm_rescrub` is called with the stale version byte when the image
/// was scrubbed by an older version; returning `false` skips the run.
pub fn scrub_with_progress<P, C>(
    path: &Path,
    opener: &dyn PartitionOpener,
    walker: &dyn FileSystemWalker,
    options: &ScrubOptions,
    progress: P,
    confirm_rescrub: C,
) -> ScrubResult<ScrubOutcome>
where
    P: FnMut(&str, f32),
    C: FnOnce(u8) -> bool,
{
    run(path, opener, walker, options, SCRUBBER_VERSION, write_tag, progress, confirm_rescrub)
}

/// Stamps the version byte once the rewrite has finished
type TagWriter = fn(&Path, u8) -> ScrubResult<()>;

#[instrument(skip(opener, walker, options, stamp, progress, confirm_rescrub))]
#[allow(clippy::too_many_arguments)]
fn run<P, C>(
    path: &Path,
    opener: &dyn PartitionOpener,
    walker: &dyn FileSystemWalker,
    options: &ScrubOptions,
    version: u8,
    stamp: TagWriter,
    mut progress: P,
    confirm_rescrub: C,
) -> ScrubResult<ScrubOutcome>
where
    P: FnMut(&str, f32),
    C: FnOnce(u8) -> bool,
{
    match TagState::classify(probe(path)?, version) {
        TagState::Current(tag) => {
            progress("This disc is already scrubbed", 0.0);
            info!(?path, tag, "Already scrubbed, skipping");
            return Ok(ScrubOutcome::AlreadyScrubbed { version: tag });
        }
        TagState::Stale(tag) => {
            if !confirm_rescrub(tag) {
                info!(?path, tag, "Scrubbed by an older version, re-scrub declined");
                return Ok(ScrubOutcome::Declined { version: tag });
            }
            info!(?path, tag, "Re-scrubbing image from an older version");
        }
        TagState::Unscrubbed => {}
    }

    let started_at = Utc::now().to_rfc3339();
    progress("Parsing...", 0.0);

    // The raw view is closed before the image is reopened for writing
    let session = {
        let mut raw = FileVolume::open(path)?;
        ScrubSession::analyze(&mut raw, opener, walker, options)?
    };
    let mut report = session.report(&path.to_string_lossy(), options.dry_run, started_at);

    if options.dry_run {
        report.finished_at = Some(Utc::now().to_rfc3339());
        info!(free = report.free_clusters, reclaimable = report.reclaimed_bytes, "Dry run complete");
        return Ok(ScrubOutcome::Analyzed(report));
    }

    let bitmap = session.into_bitmap();
    let interval = options.progress_interval(bitmap.len());
    report.clusters_written = rewrite_free_clusters(path, &bitmap, interval, &mut progress)?;

    report.tag_committed = match stamp(path, version) {
        Ok(()) => true,
        Err(e) => {
            error!(?path, "Image was scrubbed but could not be stamped: {}", e);
            false
        }
    };
    report.finished_at = Some(Utc::now().to_rfc3339());
    info!(
        written = report.clusters_written,
        reclaimed = report.reclaimed_bytes,
        "Scrub complete"
    );
    Ok(ScrubOutcome::Scrubbed(report))
}
