//! Inspector settings
//!
//! Stored as JSON in the user's config directory. Every field has a default,
//! so a missing file or a partial file both load fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::picture::Filter;
use crate::thumbnail::ThumbnailCache;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Thumbnail canvas width in pixels
    pub thumbnail_width: u32,

    /// Thumbnail canvas height in pixels
    pub thumbnail_height: u32,

    /// Kernel used when scaling thumbnails
    pub resample_filter: Filter,

    /// Thumbnail cache location. `None` = platform cache directory
    pub cache_dir: Option<PathBuf>,

    /// Cache entries kept by `prune`
    pub max_cache_files: usize,

    /// Decoded-picture budget for an image list, in MiB
    pub max_image_mem_mb: usize,

    /// Decode containers on the GPU when one is available
    pub use_gpu: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thumbnail_width: 256,
            thumbnail_height: 256,
            resample_filter: Filter::Bilinear,
            cache_dir: None,
            max_cache_files: 7000,
            max_image_mem_mb: 1024,
            use_gpu: true,
        }
    }
}

impl Settings {
    /// `<config dir>/tex-inspector/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("tex-inspector");
        path.push("settings.json");
        Some(path)
    }

    /// Load from `path`, or the default location when `None`. A missing file
    /// yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };
        let settings = match std::fs::read_to_string(&path) {
            Ok(json) => Self::from_json(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(Error::Config(format!(
                "thumbnail size must be non-zero, got {}x{}",
                self.thumbnail_width, self.thumbnail_height
            )));
        }
        Ok(())
    }

    /// Resolved cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(ThumbnailCache::default_dir)
            .ok_or_else(|| Error::Config("no cache directory available on this platform".into()))
    }

    pub fn max_image_mem_bytes(&self) -> usize {
        self.max_image_mem_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!((s.thumbnail_width, s.thumbnail_height), (256, 256));
        assert_eq!(s.resample_filter, Filter::Bilinear);
        assert_eq!(s.max_cache_files, 7000);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_serialization() {
        let mut s = Settings::default();
        s.thumbnail_width = 128;
        s.resample_filter = Filter::Hamming;
        s.cache_dir = Some(PathBuf::from("/tmp/thumbs"));

        let json = s.to_json().unwrap();
        assert!(json.contains("\"hamming\""));
        assert_eq!(Settings::from_json(&json).unwrap(), s);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let s = Settings::from_json(r#"{ "use_gpu": false }"#).unwrap();
        assert!(!s.use_gpu);
        assert_eq!(s.max_image_mem_mb, 1024);
    }

    #[test]
    fn test_zero_thumbnail_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "thumbnail_height": 0 }"#).unwrap();
        assert!(matches!(Settings::load(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let mut s = Settings::default();
        s.max_cache_files = 10;
        s.save(&path).unwrap();
        assert_eq!(Settings::load(Some(&path)).unwrap(), s);
    }
}
