//! Raw view over an image file

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Volume;
use crate::common::read_exact_at;
use crate::error::{ScrubError, ScrubResult};

/// Raw (outer) view of a disc image file, opened read-only
pub struct FileVolume {
    file: File,
    size: u64,
    path: PathBuf,
}

impl FileVolume {
    pub fn open(path: &Path) -> ScrubResult<Self> {
        let access = |source| ScrubError::Access {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(access)?;
        let size = file.metadata().map_err(access)?.len();
        debug!(?path, size, "Opened raw view");

        Ok(Self {
            file,
            size,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Volume for FileVolume {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> ScrubResult<()> {
        read_exact_at(&mut self.file, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_and_read() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&[0, 0, 0, 0, 0x00, 0x01, 0x00, 0x08]).unwrap();

        let mut volume = FileVolume::open(temp.path()).unwrap();
        assert_eq!(volume.size(), 8);
        assert_eq!(volume.read_shifted(4).unwrap(), 0x40020);
    }

    #[test]
    fn test_open_missing_is_access_error() {
        let err = FileVolume::open(Path::new("/nonexistent/image.iso")).err().unwrap();
        assert!(matches!(err, ScrubError::Access { .. }));
    }
}
