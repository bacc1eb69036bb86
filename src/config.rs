//! Scrub options
//!
//! Options can be built in code or loaded from a JSON file:
//!
//! ```json
//! { "progress_steps": 200, "strict_layout": false, "dry_run": true }
//! ```
//!
//! Missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{ScrubError, ScrubResult};

/// Default number of progress reports over a rewrite pass
pub const DEFAULT_PROGRESS_STEPS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubOptions {
    /// Maximum number of progress reports during the rewrite
    pub progress_steps: u64,
    /// Fail on partition regions outside the image instead of clipping them
    pub strict_layout: bool,
    /// Re-scrub images stamped by an older version without asking
    pub rescrub_stale: bool,
    /// Analyze only; nothing is written
    pub dry_run: bool,
    /// Keep the disc header region (boot header, partition table) intact
    pub reserve_disc_header: bool,
}

impl Default for ScrubOptions {
    fn default() -> Self {
        Self {
            progress_steps: DEFAULT_PROGRESS_STEPS,
            strict_layout: true,
            rescrub_stale: false,
            dry_run: false,
            reserve_disc_header: true,
        }
    }
}

impl ScrubOptions {
    /// Load options from a JSON file
    pub fn load(path: &Path) -> ScrubResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ScrubError::Config(format!("Failed to read '{}': {}", path.display(), e)))?;
        let options: ScrubOptions = serde_json::from_str(&content)?;
        if options.progress_steps == 0 {
            return Err(ScrubError::Config("progress_steps must be at least 1".to_string()));
        }
        info!(path = %path.display(), ?options, "Loaded scrub options");
        Ok(options)
    }

    /// Number of clusters between two progress reports
    pub fn progress_interval(&self, cluster_count: u64) -> u64 {
        (cluster_count / self.progress_steps.max(1)).max(1)
    }
}
