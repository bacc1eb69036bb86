//! Error types for disc scrubbing

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for scrub operations
pub type ScrubResult<T> = Result<T, ScrubError>;

/// Errors that can occur while analyzing or rewriting an image
#[derive(Debug)]
pub enum ScrubError {
    /// Image could not be opened for reading or read/write
    Access { path: PathBuf, source: io::Error },
    /// Failed or short read from a volume view
    Read { offset: u64, source: io::Error },
    /// Write failure during the rewrite pass
    Write { cluster: u64, source: io::Error },
    /// Partition region falls outside the image
    Layout(String),
    /// Partition data is encrypted and the opener cannot decrypt it
    Encrypted { group: u32, index: u32 },
    /// Malformed file system table
    Filesystem(String),
    /// Unreadable or invalid options file
    Config(String),
    /// Other I/O error
    Io(io::Error),
}

impl fmt::Display for ScrubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrubError::Access { path, source } => {
                write!(f, "Cannot access '{}': {}", path.display(), source)
            }
            ScrubError::Read { offset, source } => {
                write!(f, "Read failed at offset 0x{:x}: {}", offset, source)
            }
            ScrubError::Write { cluster, source } => {
                write!(f, "Write failed at cluster {}: {}", cluster, source)
            }
            ScrubError::Layout(e) => write!(f, "Layout error: {}", e),
            ScrubError::Encrypted { group, index } => write!(
                f,
                "Partition {}.{} is encrypted; a decrypting partition opener is required",
                group, index
            ),
            ScrubError::Filesystem(e) => write!(f, "File system error: {}", e),
            ScrubError::Config(e) => write!(f, "Configuration error: {}", e),
            ScrubError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ScrubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScrubError::Access { source, .. } => Some(source),
            ScrubError::Read { source, .. } => Some(source),
            ScrubError::Write { source, .. } => Some(source),
            ScrubError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ScrubError {
    fn from(err: io::Error) -> Self {
        ScrubError::Io(err)
    }
}

impl From<serde_json::Error> for ScrubError {
    fn from(err: serde_json::Error) -> Self {
        ScrubError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_and_source() {
        let err = ScrubError::Write {
            cluster: 7,
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(err.to_string(), "Write failed at cluster 7: disk full");
        assert!(err.source().is_some());

        let err = ScrubError::Layout("partition 0.0 out of range".to_string());
        assert!(err.to_string().starts_with("Layout error"));
        assert!(err.source().is_none());

        let err = ScrubError::Encrypted { group: 0, index: 1 };
        assert!(err.to_string().contains("decrypting partition opener"));
    }
}
