//! Content-addressed thumbnail store.
//!
//! One file per thumbnail, named after a SHA-256 digest of the source file's
//! identity and the target size. Editing a file in a way that keeps its path,
//! size and timestamps will serve a stale thumbnail.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::picture::Picture;
use crate::record::ImageIdentity;

/// Bumped whenever the key derivation or the file layout changes.
pub const CACHE_VERSION: u32 = 1;

const EXTENSION: &str = "bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

fn time_parts(t: Option<SystemTime>) -> (i64, u32) {
    match t.map(|t| t.duration_since(UNIX_EPOCH)) {
        Some(Ok(d)) => (d.as_secs() as i64, d.subsec_nanos()),
        Some(Err(before)) => {
            let d = before.duration();
            (-(d.as_secs() as i64), d.subsec_nanos())
        }
        None => (0, 0),
    }
}

impl CacheKey {
    pub fn derive(identity: &ImageIdentity, width: u32, height: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_VERSION.to_le_bytes());
        hasher.update(identity.path.to_string_lossy().as_bytes());
        hasher.update(identity.size_bytes.to_le_bytes());
        for t in [identity.created, identity.modified] {
            let (secs, nanos) = time_parts(t);
            hasher.update(secs.to_le_bytes());
            hasher.update(nanos.to_le_bytes());
        }
        hasher.update(width.to_le_bytes());
        hasher.update(height.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn file_name(&self) -> String {
        format!("{}.{EXTENSION}", self.to_hex())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug)]
pub struct ThumbnailCache {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl ThumbnailCache {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// `<cache dir>/tex-inspector/thumbnails`, falling back to the home
    /// directory when the platform has no cache directory.
    pub fn default_dir() -> Option<PathBuf> {
        let mut path = dirs_next::cache_dir().or_else(dirs_next::home_dir)?;
        path.push("tex-inspector");
        path.push("thumbnails");
        Some(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// `Ok(None)` on a miss. A present but unreadable entry is an error.
    pub fn load(&self, key: &CacheKey) -> Result<Option<Picture>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Picture::from_chunks(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file and rename so readers never observe a
    /// partial entry.
    pub fn store(&self, key: &CacheKey, picture: &Picture) -> Result<()> {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .dir
            .join(format!("{}.{}.{n}.tmp", key.to_hex(), std::process::id()));
        std::fs::write(&tmp, picture.to_chunks())?;
        if let Err(e) = std::fs::rename(&tmp, self.path_for(key)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::debug!(%key, "stored thumbnail");
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            out.push((path, meta.modified().unwrap_or(UNIX_EPOCH)));
        }
        Ok(out)
    }

    /// Number of cached thumbnails.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete the oldest entries until at most `max_files` remain. Returns the
    /// number removed.
    pub fn prune(&self, max_files: usize) -> Result<usize> {
        let mut entries = self.entries()?;
        if entries.len() <= max_files {
            return Ok(0);
        }
        entries.sort_by_key(|(_, mtime)| *mtime);
        let excess = entries.len() - max_files;
        let mut removed = 0;
        for (path, _) in entries.into_iter().take(excess) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to prune cache entry"),
            }
        }
        tracing::info!(removed, max_files, "pruned thumbnail cache");
        Ok(removed)
    }

    /// Delete every entry. Returns the number removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for (path, _) in self.entries()? {
            std::fs::remove_file(&path)
                .map_err(|e| Error::Cache(format!("cannot remove {}: {e}", path.display())))?;
            removed += 1;
        }
        Ok(removed)
    }
}
