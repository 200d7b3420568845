//! Thumbnail generation: the cache, the worker scheduler, and the job each
//! worker runs.

pub mod cache;
pub mod scheduler;

pub use cache::{CacheKey, ThumbnailCache, CACHE_VERSION};
pub use scheduler::{default_worker_cap, ThumbnailScheduler, ThumbnailSlot, WorkerPermit};

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::gpu::{DeviceFactory, GraphicsDevice, SoftwareDevice};
use crate::picture::{Filter, Picture};
use crate::record::{classify_file, Codecs, FileKind, ImageIdentity, ImageRecord};

/// Everything a worker needs, owned so it can move to another thread.
pub(crate) struct ThumbnailJob {
    pub path: PathBuf,
    pub codecs: Codecs,
    pub cache: Arc<ThumbnailCache>,
    pub factory: Arc<dyn DeviceFactory>,
    pub width: u32,
    pub height: u32,
    pub filter: Filter,
}

/// Largest size with the source aspect ratio that fits `width` x `height`.
/// The constrained axis hits the bound exactly.
pub fn fit_within(src_w: u32, src_h: u32, width: u32, height: u32) -> (u32, u32) {
    let scale_x = f64::from(width) / f64::from(src_w);
    let scale_y = f64::from(height) / f64::from(src_h);
    if scale_x < scale_y {
        let h = (f64::from(src_h) * scale_x).round() as u32;
        (width, h.max(1))
    } else {
        let w = (f64::from(src_w) * scale_y).round() as u32;
        (w.max(1), height)
    }
}

/// Scale `src` to fit, then center it on a transparent `width` x `height`
/// canvas.
pub fn make_thumbnail(src: &Picture, width: u32, height: u32, filter: Filter) -> Result<Picture> {
    let (w, h) = fit_within(src.width(), src.height(), width, height);
    Ok(src.resample(w, h, filter)?.crop(width, height))
}

fn build(job: &ThumbnailJob, key: &CacheKey) -> Result<Picture> {
    let path = &job.path;
    let device: Arc<dyn GraphicsDevice> = match classify_file(path)? {
        FileKind::Container => job.factory.create()?,
        _ => Arc::new(SoftwareDevice::new()),
    };

    let mut loader = ImageRecord::with_device(path, device, job.codecs.clone());
    loader.try_load()?;
    let source = loader.primary().ok_or(crate::Error::NotLoaded)?;
    let thumb = make_thumbnail(source, job.width, job.height, job.filter)?;

    if let Err(e) = job.cache.store(key, &thumb) {
        tracing::warn!(path = %path.display(), %key, error = %e, "failed to cache thumbnail");
    }
    Ok(thumb)
}

/// Worker body. Serves from the cache when possible, otherwise loads the file
/// and stores the result. Failures are logged and reported as `None`.
pub(crate) fn generate(job: &ThumbnailJob) -> Option<Picture> {
    let path = &job.path;
    let identity = ImageIdentity::capture(path).unwrap_or_else(|e| {
        tracing::debug!(path = %path.display(), error = %e, "stat failed, keying thumbnail by path only");
        ImageIdentity::unknown(path)
    });
    let key = CacheKey::derive(&identity, job.width, job.height);

    match job.cache.load(&key) {
        Ok(Some(picture)) => {
            tracing::debug!(path = %path.display(), %key, "thumbnail cache hit");
            return Some(picture);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(path = %path.display(), %key, error = %e, "ignoring unreadable cache entry"),
    }

    match build(job, &key) {
        Ok(picture) => {
            tracing::info!(path = %path.display(), width = job.width, height = job.height, "generated thumbnail");
            Some(picture)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "thumbnail generation failed");
            None
        }
    }
}
