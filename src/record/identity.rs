use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

/// Filesystem identity of an image file at the moment it was captured.
///
/// Nothing watches the file afterwards: if it changes on disk the caller has
/// to reload to pick up a fresh identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageIdentity {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl ImageIdentity {
    /// Stat `path`. Creation time is `None` on filesystems that don't record it.
    pub fn capture(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: meta.len(),
            created: meta.created().ok(),
            modified: meta.modified().ok(),
        })
    }

    /// Identity for a path that hasn't been stat'ed yet.
    pub fn unknown(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            size_bytes: 0,
            created: None,
            modified: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reads_size_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, [0u8; 42]).unwrap();
        let id = ImageIdentity::capture(&path).unwrap();
        assert_eq!(id.size_bytes, 42);
        assert!(id.modified.is_some());
        assert_eq!(id.file_name(), "a.png");
    }

    #[test]
    fn capture_missing_file_is_io_error() {
        let err = ImageIdentity::capture(Path::new("/definitely/not/here.dds")).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
