//! Bounded thread-per-request thumbnail workers.
//!
//! A worker owns the thumbnail it is building until it sends it over a
//! single-shot channel. The owning record polls that channel without
//! blocking, joins the worker once it has reported, and only then touches the
//! picture.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, TryRecvError};

use super::{generate, ThumbnailCache, ThumbnailJob};
use crate::config::Settings;
use crate::error::Result;
use crate::gpu::{self, DeviceFactory};
use crate::picture::{Filter, Picture};
use crate::record::Codecs;

/// Global cap on concurrently running thumbnail workers.
pub fn default_worker_cap() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.saturating_sub(2).max(2)
}

/// Counting permit pool plus everything a worker needs to build a thumbnail.
pub struct ThumbnailScheduler {
    max_workers: usize,
    running: Arc<AtomicUsize>,
    cache: Arc<ThumbnailCache>,
    factory: Arc<dyn DeviceFactory>,
    width: u32,
    height: u32,
    filter: Filter,
}

impl std::fmt::Debug for ThumbnailScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailScheduler")
            .field("max_workers", &self.max_workers)
            .field("running", &self.running())
            .field("size", &(self.width, self.height))
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl ThumbnailScheduler {
    pub fn new(
        cache: Arc<ThumbnailCache>,
        factory: Arc<dyn DeviceFactory>,
        width: u32,
        height: u32,
        filter: Filter,
    ) -> Self {
        Self {
            max_workers: default_worker_cap(),
            running: Arc::new(AtomicUsize::new(0)),
            cache,
            factory,
            width: width.max(1),
            height: height.max(1),
            filter,
        }
    }

    /// Open the cache directory named by `settings` and pick the device
    /// factory it asks for.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let cache = ThumbnailCache::open(settings.cache_dir()?)?;
        Ok(Self::new(
            Arc::new(cache),
            gpu::default_factory(settings.use_gpu),
            settings.thumbnail_width,
            settings.thumbnail_height,
            settings.resample_filter,
        ))
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Take a worker slot if one is free.
    pub fn try_acquire(&self) -> Option<WorkerPermit> {
        self.running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_workers).then_some(n + 1)
            })
            .ok()
            .map(|_| WorkerPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub(crate) fn job(&self, path: PathBuf, codecs: Codecs) -> ThumbnailJob {
        ThumbnailJob {
            path,
            codecs,
            cache: Arc::clone(&self.cache),
            factory: Arc::clone(&self.factory),
            width: self.width,
            height: self.height,
            filter: self.filter,
        }
    }
}

/// One slot of the worker pool. Returned to the pool on drop.
#[derive(Debug)]
pub struct WorkerPermit {
    running: Arc<AtomicUsize>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<Option<Picture>>,
    // Held until the worker is joined
    _permit: WorkerPermit,
}

/// Per-record thumbnail state.
#[derive(Default)]
pub struct ThumbnailSlot {
    requested: bool,
    worker: Option<Worker>,
    picture: Option<Picture>,
}

impl std::fmt::Debug for ThumbnailSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailSlot")
            .field("requested", &self.requested)
            .field("running", &self.is_running())
            .field("ready", &self.picture.is_some())
            .finish()
    }
}

impl ThumbnailSlot {
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start a worker for the file at `path`. Returns `false` and leaves the
    /// slot untouched when a request is already outstanding or the pool is
    /// full. The worker stats the file itself.
    pub fn request(
        &mut self,
        scheduler: &ThumbnailScheduler,
        path: impl Into<PathBuf>,
        codecs: Codecs,
    ) -> bool {
        if self.requested {
            return false;
        }
        let Some(permit) = scheduler.try_acquire() else {
            return false;
        };

        let job = scheduler.job(path.into(), codecs);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let spawned = std::thread::Builder::new()
            .name("thumbnail".into())
            .spawn(move || {
                let picture = generate(&job);
                let _ = tx.send(picture);
            });
        match spawned {
            Ok(handle) => {
                self.requested = true;
                self.worker = Some(Worker {
                    handle,
                    done: rx,
                    _permit: permit,
                });
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to spawn thumbnail worker");
                false
            }
        }
    }

    /// Non-blocking. Collects a finished worker and returns the thumbnail
    /// once it is ready.
    pub fn poll(&mut self) -> Option<&Picture> {
        if let Some(worker) = &self.worker {
            let result = match worker.done.try_recv() {
                Ok(result) => Some(result),
                // Worker died without reporting
                Err(TryRecvError::Disconnected) => Some(None),
                Err(TryRecvError::Empty) => None,
            };
            if let Some(result) = result {
                self.join();
                self.picture = result;
            }
        }
        self.picture.as_ref()
    }

    /// Allow a new request after a failed one. Does nothing while a worker
    /// runs or once a thumbnail exists.
    pub fn unrequest(&mut self) {
        if self.worker.is_none() && self.picture.is_none() {
            self.requested = false;
        }
    }

    /// Wait for any running worker and forget everything.
    pub fn reset(&mut self) {
        self.join();
        self.requested = false;
        self.picture = None;
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                tracing::warn!("thumbnail worker panicked");
            }
        }
    }
}

impl Drop for ThumbnailSlot {
    fn drop(&mut self) {
        self.join();
    }
}
