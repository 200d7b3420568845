use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use super::{classify_path, Codecs, FileKind, ImageRecord};
use crate::error::Result;
use crate::gpu::GraphicsDevice;

/// The records of one browsing session, plus which one is on screen.
#[derive(Debug, Default)]
pub struct ImageList {
    records: Vec<ImageRecord>,
    current: Option<usize>,
}

impl ImageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively collect every file under `dir` that looks like an image,
    /// sorted by path. Nothing is loaded.
    pub fn scan_dir(dir: &Path, device: Arc<dyn GraphicsDevice>, codecs: Codecs) -> Result<Self> {
        let mut list = Self::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() || classify_path(entry.path()) == FileKind::Unknown {
                continue;
            }
            list.push(ImageRecord::with_device(
                entry.path(),
                Arc::clone(&device),
                codecs.clone(),
            ));
        }
        tracing::debug!(dir = %dir.display(), count = list.len(), "scanned directory");
        Ok(list)
    }

    pub fn push(&mut self, record: ImageRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ImageRecord> {
        self.records.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ImageRecord> {
        self.records.get_mut(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.records.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut ImageRecord> {
        self.current.and_then(|i| self.records.get_mut(i))
    }

    /// Bytes held by every loaded record.
    pub fn loaded_mem_bytes(&self) -> usize {
        self.records.iter().map(ImageRecord::mem_size_bytes).sum()
    }

    /// Unload least recently used records, never the current one, until the
    /// loaded total fits in `budget_bytes`. Returns how many were unloaded.
    pub fn enforce_memory_budget(&mut self, budget_bytes: usize) -> usize {
        let mut total = self.loaded_mem_bytes();
        if total <= budget_bytes {
            return 0;
        }

        let mut candidates: Vec<usize> = (0..self.records.len())
            .filter(|&i| Some(i) != self.current && self.records[i].is_loaded())
            .collect();
        candidates.sort_by_key(|&i| self.records[i].last_accessed());

        let mut unloaded = 0;
        for i in candidates {
            if total <= budget_bytes {
                break;
            }
            let record = &mut self.records[i];
            total -= record.mem_size_bytes();
            tracing::debug!(path = %record.path().display(), "unloading to stay within memory budget");
            record.unload();
            unloaded += 1;
        }
        unloaded
    }
}
