pub mod common;
pub mod config;
pub mod error;
pub mod fst;
pub mod logging;
pub mod scrub;
pub mod volume;

pub use config::ScrubOptions;
pub use error::{ScrubError, ScrubResult};
pub use fst::{FileEntry, FileSystemWalker, FstWalker};
pub use scrub::{
    analyze, is_scrubbed, scrub, scrub_with_progress, ClusterBitmap, Partition, ScrubOutcome, ScrubReport,
    SCRUBBER_VERSION,
};
pub use volume::{ClearPartitionOpener, FileVolume, MemVolume, PartitionOpener, Volume};
