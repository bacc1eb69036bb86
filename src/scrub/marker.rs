//! Scrub version tag stored in the image
//!
//! One byte at 0x80 (unencrypted padding in the disc header) records the
//! scrubber version that produced the image; 0 means never scrubbed.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

use super::types::{SCRUBBER_VERSION, SCRUB_TAG_OFFSET};
use crate::error::{ScrubError, ScrubResult};

/// What the version tag says about an image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagState {
    Unscrubbed,
    /// Scrubbed by this version or a newer one
    Current(u8),
    /// Scrubbed by an older version
    Stale(u8),
}

impl TagState {
    pub fn from_tag(tag: u8) -> Self {
        Self::classify(tag, SCRUBBER_VERSION)
    }

    /// Classify `tag` against the version `current`
    pub fn classify(tag: u8, current: u8) -> Self {
        match tag {
            0 => TagState::Unscrubbed,
            v if v < current => TagState::Stale(v),
            v => TagState::Current(v),
        }
    }
}

/// Read the version tag; images too short to hold it count as unscrubbed
pub fn probe(path: &Path) -> ScrubResult<u8> {
    let mut file = File::open(path).map_err(|source| ScrubError::Access {
        path: path.to_path_buf(),
        source,
    })?;
    let size = file.metadata()?.len();
    if size <= SCRUB_TAG_OFFSET {
        return Ok(0);
    }

    let mut tag = [0u8; 1];
    file.seek(SeekFrom::Start(SCRUB_TAG_OFFSET))?;
    file.read_exact(&mut tag)
        .map_err(|source| ScrubError::Read { offset: SCRUB_TAG_OFFSET, source })?;
    debug!(?path, tag = tag[0], "Probed scrub tag");
    Ok(tag[0])
}

/// Stamp the current version into the image
pub fn commit(path: &Path) -> ScrubResult<()> {
    write_tag(path, SCRUBBER_VERSION)
}

pub(crate) fn write_tag(path: &Path, version: u8) -> ScrubResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|source| ScrubError::Access {
            path: path.to_path_buf(),
            source,
        })?;
    file.seek(SeekFrom::Start(SCRUB_TAG_OFFSET))?;
    file.write_all(&[version])?;
    file.flush()?;
    debug!(?path, version, "Stamped scrub tag");
    Ok(())
}
