// Common utilities shared across the scrubber

pub mod binary;

// Re-exports for convenience
pub use binary::{be_at, be_from_slice, read_be_at, read_exact_at, shifted_at, ByteWidth, OFFSET_SHIFT};

// Shared constants
pub const CLUSTER_SIZE: u64 = 0x8000; // Raw cluster, hashes included
pub const CLUSTER_HASH_SIZE: u64 = 0x400; // Hash block at the start of every partition cluster
pub const CLUSTER_DATA_SIZE: u64 = CLUSTER_SIZE - CLUSTER_HASH_SIZE; // 0x7c00 payload bytes
