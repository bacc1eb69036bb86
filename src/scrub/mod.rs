//! Disc scrubber: free-space analysis and rewrite for partitioned disc images
//!
//! Finds the clusters of an image that nothing ever reads and overwrites
//! them with 0xFF so the image compresses well. Game-visible content is
//! never modified.
//!
//! ## Disc Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Disc header (0x00000 - 0x50000, kept)                        │
//! │  - 0x00080: scrub version byte (0 = never scrubbed)          │
//! │  - 0x40000: 4 x (partition count, table offset >> 2)         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Partition (one per table entry)                              │
//! │  - +0x000: ticket, header fields at +0x2a4..+0x2c0 (kept)    │
//! │  - TMD, certificate chain (kept)                             │
//! │  - H3 hash table, 0x18000 bytes (kept)                       │
//! │  - Data area: 0x8000-byte clusters, each a 0x400-byte hash   │
//! │    block + 0x7c00 payload bytes (kept only where the boot    │
//! │    header, apploader, DOL, FST or a file lives)              │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Everything else: free, overwritten with 0xFF                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pipeline
//!
//! version probe → partition table (raw view) → per partition: fixed
//! regions, then boot/apploader/DOL/FST/files through the partition's
//! logical view → rewrite of free clusters → version stamp.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use disc_scrubber::{scrub, ClearPartitionOpener, ScrubOptions, ScrubOutcome};
//!
//! let opener = ClearPartitionOpener::new("game.iso");
//! match scrub(Path::new("game.iso"), &opener, &ScrubOptions::default())? {
//!     ScrubOutcome::Scrubbed(report) => println!("{} bytes reclaimed", report.reclaimed_bytes),
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod bitmap;
pub mod catalog;
pub mod dol;
pub mod marker;
mod operations;
mod rewrite;
mod session;
pub mod types;

// Re-export public types
pub use bitmap::{compensate, ClusterBitmap};
pub use marker::{commit, probe, TagState};
pub use session::{is_standard_size, ScrubSession};
pub use types::{
    Partition, PartitionGroup, PartitionHeader, ScrubOutcome, ScrubReport, FILLER_BYTE, SCRUBBER_VERSION,
    SCRUB_TAG_OFFSET,
};

// Re-export public functions
pub use operations::{analyze, is_scrubbed, scrub, scrub_with_progress};
pub use rewrite::rewrite_free_clusters;
