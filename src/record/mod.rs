//! Image records: one per file, owning its decoded pictures, derived views,
//! device textures and thumbnail state.
//!
//! - `identity.rs` - filesystem identity captured at load
//! - `classify.rs` - raster / container / unknown
//! - `raster.rs` - raster decoder seam backed by the `image` crate
//! - `list.rs` - a directory's worth of records under a memory budget

mod classify;
mod identity;
mod list;
mod raster;

pub use classify::{classify, classify_file, classify_path, FileKind};
pub use identity::ImageIdentity;
pub use list::ImageList;
pub use raster::{ImageCrateDecoder, RasterDecoder, RasterImage};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::container::{self, ContainerParser, DdsParser};
use crate::error::{Error, Result};
use crate::gpu::{descriptor, GraphicsDevice, PixelFormat, TextureHandle};
use crate::picture::{FlipAxis, Picture, Pixel, RotateDir};
use crate::thumbnail::{ThumbnailScheduler, ThumbnailSlot};

/// Decoders a record loads with.
#[derive(Clone)]
pub struct Codecs {
    pub raster: Arc<dyn RasterDecoder>,
    pub container: Arc<dyn ContainerParser>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            raster: Arc::new(ImageCrateDecoder),
            container: Arc::new(DdsParser),
        }
    }
}

impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codecs").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Unloaded,
    Loaded,
    Failed,
}

/// Summary metadata derived at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub kind: FileKind,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub bits_per_pixel: u32,
    pub opaque: bool,
    /// Bytes held by every owned picture, alternate view included.
    pub mem_size_bytes: usize,
    pub mip_levels: usize,
    pub faces: usize,
    pub file_size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Pictures produced by one successful decode, committed all at once.
struct Decoded {
    kind: FileKind,
    pictures: Vec<Picture>,
    alternate: Option<Picture>,
    pixel_format: String,
    bits_per_pixel: u32,
    opacity_hint: Option<bool>,
    mip_levels: usize,
    faces: usize,
}

pub struct ImageRecord {
    identity: ImageIdentity,
    device: Arc<dyn GraphicsDevice>,
    codecs: Codecs,
    state: LoadState,
    load_error: Option<String>,
    pictures: Vec<Picture>,
    alternate: Option<Picture>,
    alt_enabled: bool,
    info: Option<ImageInfo>,
    last_accessed: Option<DateTime<Utc>>,
    tex_primary: Option<TextureHandle>,
    tex_alt: Option<TextureHandle>,
    tex_thumbnail: Option<TextureHandle>,
    thumbnail: ThumbnailSlot,
}

impl std::fmt::Debug for ImageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRecord")
            .field("path", &self.identity.path)
            .field("state", &self.state)
            .field("pictures", &self.pictures.len())
            .field("alt_enabled", &self.alt_enabled)
            .field("thumbnail", &self.thumbnail)
            .finish_non_exhaustive()
    }
}

impl ImageRecord {
    pub fn new(path: impl AsRef<Path>, device: Arc<dyn GraphicsDevice>) -> Self {
        Self::with_device(path, device, Codecs::default())
    }

    pub fn with_device(
        path: impl AsRef<Path>,
        device: Arc<dyn GraphicsDevice>,
        codecs: Codecs,
    ) -> Self {
        Self {
            identity: ImageIdentity::unknown(path.as_ref()),
            device,
            codecs,
            state: LoadState::Unloaded,
            load_error: None,
            pictures: Vec::new(),
            alternate: None,
            alt_enabled: false,
            info: None,
            last_accessed: None,
            tex_primary: None,
            tex_alt: None,
            tex_thumbnail: None,
            thumbnail: ThumbnailSlot::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.identity.path
    }

    pub fn identity(&self) -> &ImageIdentity {
        &self.identity
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// Message of the error that put the record into [`LoadState::Failed`].
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn info(&self) -> Option<&ImageInfo> {
        self.info.as_ref()
    }

    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.last_accessed
    }

    /// Load the file. Returns whether the record ended up loaded; on failure
    /// the error is logged and kept in [`load_error`](Self::load_error).
    pub fn load(&mut self) -> bool {
        match self.try_load() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %self.identity.path.display(), error = %e, "failed to load image");
                false
            }
        }
    }

    pub(crate) fn try_load(&mut self) -> Result<()> {
        if self.is_loaded() {
            self.last_accessed = Some(Utc::now());
            return Ok(());
        }

        let path = self.identity.path.clone();
        let decoded = ImageIdentity::capture(&path).and_then(|identity| {
            let decoded = self.decode(&identity)?;
            Ok((identity, decoded))
        });
        let (identity, decoded) = match decoded {
            Ok(ok) => ok,
            Err(e) => {
                self.state = LoadState::Failed;
                self.load_error = Some(e.to_string());
                return Err(e);
            }
        };

        let mem_size_bytes = decoded
            .pictures
            .iter()
            .chain(decoded.alternate.iter())
            .map(Picture::mem_size_bytes)
            .sum();
        let opaque = decoded
            .opacity_hint
            .unwrap_or_else(|| decoded.pictures.iter().all(Picture::is_opaque));
        let (width, height) = decoded.pictures[0].dimensions();

        self.info = Some(ImageInfo {
            path: path.clone(),
            kind: decoded.kind,
            width,
            height,
            pixel_format: decoded.pixel_format,
            bits_per_pixel: decoded.bits_per_pixel,
            opaque,
            mem_size_bytes,
            mip_levels: decoded.mip_levels,
            faces: decoded.faces,
            file_size: identity.size_bytes,
            modified: identity.modified.map(DateTime::<Utc>::from),
        });
        self.identity = identity;
        self.pictures = decoded.pictures;
        self.alternate = decoded.alternate;
        self.state = LoadState::Loaded;
        self.load_error = None;
        self.last_accessed = Some(Utc::now());

        tracing::info!(
            path = %path.display(),
            width,
            height,
            format = self.info.as_ref().map_or("", |i| i.pixel_format.as_str()),
            "loaded image"
        );
        Ok(())
    }

    fn decode(&self, identity: &ImageIdentity) -> Result<Decoded> {
        let bytes = std::fs::read(&identity.path)?;
        let kind = classify(&identity.path, &bytes[..bytes.len().min(32)]);
        match kind {
            FileKind::Container => match self.decode_container(&bytes)? {
                Some(decoded) => Ok(decoded),
                None => self.decode_raster(&bytes, kind),
            },
            FileKind::Raster => self.decode_raster(&bytes, kind),
            FileKind::Unknown => Err(Error::UnsupportedFormat(format!(
                "{} is not a recognised image",
                identity.file_name()
            ))),
        }
    }

    /// `Ok(None)` when neither container interpretation parses, so the
    /// caller can try the raster decoder instead.
    fn decode_container(&self, bytes: &[u8]) -> Result<Option<Decoded>> {
        let device = self.device.as_ref();

        let cube_err = match self.codecs.container.parse_cubemap(bytes) {
            Ok(cube) => {
                let faces = container::decode_cubemap(device, &cube)?;
                let cross = container::cubemap_cross(&faces)?;
                let format = cube.format();
                return Ok(Some(Decoded {
                    kind: FileKind::Container,
                    pictures: faces,
                    alternate: Some(cross),
                    pixel_format: format.name().to_string(),
                    bits_per_pixel: format.bits(),
                    opacity_hint: (!format.has_alpha()).then_some(true),
                    mip_levels: cube.face(container::CubeFace::PosZ).map_or(1, |t| t.levels()),
                    faces: 6,
                }));
            }
            Err(e) => e,
        };

        let tex = match self.codecs.container.parse_texture_2d(bytes) {
            Ok(tex) => tex,
            Err(e) => {
                tracing::debug!(cubemap = %cube_err, texture = %e, "container parse failed, trying raster decoder");
                return Ok(None);
            }
        };
        let levels = container::decode_texture_2d(device, &tex)?;
        let alternate = if levels.len() > 1 {
            Some(container::mipmap_strip(&levels)?)
        } else {
            None
        };
        let format = tex.format();
        Ok(Some(Decoded {
            kind: FileKind::Container,
            mip_levels: levels.len(),
            pictures: levels,
            alternate,
            pixel_format: format.name().to_string(),
            bits_per_pixel: format.bits(),
            opacity_hint: tex.opacity_hint(),
            faces: 1,
        }))
    }

    fn decode_raster(&self, bytes: &[u8], kind: FileKind) -> Result<Decoded> {
        let raster = self.codecs.raster.decode(bytes)?;
        let pixel_format = match raster.format {
            PixelFormat::Unknown => raster.color,
            f => f.name().to_string(),
        };
        Ok(Decoded {
            kind,
            pictures: vec![raster.picture],
            alternate: None,
            pixel_format,
            bits_per_pixel: raster.bits_per_pixel,
            opacity_hint: (!raster.has_alpha).then_some(true),
            mip_levels: 1,
            faces: 1,
        })
    }

    /// Run [`load`](Self::load) on tokio's blocking pool.
    pub async fn load_detached(mut self) -> Result<Self> {
        tokio::task::spawn_blocking(move || {
            self.load();
            self
        })
        .await
        .map_err(|e| Error::DecodeFailure(format!("load task failed: {e}")))
    }

    /// Release device textures, drop pictures and thumbnail state.
    pub fn unload(&mut self) {
        self.unbind();
        self.thumbnail.reset();
        self.pictures.clear();
        self.alternate = None;
        self.info = None;
        self.state = LoadState::Unloaded;
        self.load_error = None;
    }

    pub fn pictures(&self) -> &[Picture] {
        &self.pictures
    }

    pub fn primary(&self) -> Option<&Picture> {
        self.pictures.first()
    }

    pub fn alternate(&self) -> Option<&Picture> {
        self.alternate.as_ref()
    }

    pub fn alt_enabled(&self) -> bool {
        self.alt_enabled
    }

    pub fn set_alt_enabled(&mut self, enabled: bool) {
        self.alt_enabled = enabled;
    }

    /// Picture that reads and binds go to.
    fn active(&self) -> Option<&Picture> {
        match &self.alternate {
            Some(alt) if self.alt_enabled => Some(alt),
            _ => self.pictures.first(),
        }
    }

    fn using_alt(&self) -> bool {
        self.alt_enabled && self.alternate.is_some()
    }

    pub fn width(&self) -> u32 {
        self.active().map_or(0, Picture::width)
    }

    pub fn height(&self) -> u32 {
        self.active().map_or(0, Picture::height)
    }

    /// Opaque black when nothing is loaded.
    ///
    /// # Panics
    /// Panics if `(x, y)` lies outside a loaded picture.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.active().map_or(Pixel::BLACK, |p| p.pixel(x, y))
    }

    /// Total bytes of owned pictures.
    pub fn mem_size_bytes(&self) -> usize {
        self.pictures
            .iter()
            .chain(self.alternate.iter())
            .map(Picture::mem_size_bytes)
            .sum()
    }

    fn upload(&self, picture: &Picture) -> Result<TextureHandle> {
        let desc = descriptor(PixelFormat::Rgba8)?;
        self.device
            .upload_layer(&desc, picture.width(), picture.height(), picture.as_bytes())
    }

    /// Upload the active picture if it isn't on the device yet and return its
    /// handle.
    pub fn bind(&mut self) -> Result<TextureHandle> {
        let use_alt = self.using_alt();
        let existing = if use_alt { self.tex_alt } else { self.tex_primary };
        if let Some(handle) = existing {
            return Ok(handle);
        }
        let picture = self.active().ok_or(Error::NotLoaded)?;
        let handle = self.upload(picture)?;
        if use_alt {
            self.tex_alt = Some(handle);
        } else {
            self.tex_primary = Some(handle);
        }
        self.last_accessed = Some(Utc::now());
        Ok(handle)
    }

    /// Release every device texture this record holds.
    pub fn unbind(&mut self) {
        for handle in [
            self.tex_primary.take(),
            self.tex_alt.take(),
            self.tex_thumbnail.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.device.release(handle);
        }
    }

    /// Rotate every primary picture. The alternate view is left as built.
    pub fn rotate90(&mut self, dir: RotateDir) {
        self.transform_primary(|p| p.rotate90(dir));
    }

    /// Mirror every primary picture. The alternate view is left as built.
    pub fn flip(&mut self, axis: FlipAxis) {
        self.transform_primary(|p| p.flip(axis));
    }

    fn transform_primary(&mut self, f: impl Fn(&Picture) -> Picture) {
        if self.pictures.is_empty() {
            return;
        }
        self.pictures = self.pictures.iter().map(f).collect();
        if let Some(handle) = self.tex_primary.take() {
            self.device.release(handle);
        }
        if let (Some(info), Some(first)) = (self.info.as_mut(), self.pictures.first()) {
            (info.width, info.height) = first.dimensions();
        }
    }

    /// One-line summary: file name, dimensions, pixel format, file size.
    pub fn info_line(&self) -> String {
        let name = self.identity.file_name();
        match &self.info {
            Some(info) => format!(
                "{name}  {}x{}  {}  {}",
                info.width,
                info.height,
                info.pixel_format,
                human_size(info.file_size)
            ),
            None => format!("{name}  ({:?})", self.state),
        }
    }

    /// Start generating a thumbnail in the background. No-op when one is
    /// already requested or the scheduler has no free worker.
    pub fn request_thumbnail(&mut self, scheduler: &ThumbnailScheduler) -> bool {
        self.thumbnail
            .request(scheduler, self.identity.path.clone(), self.codecs.clone())
    }

    /// Clear a failed request so it can be issued again.
    pub fn unrequest_thumbnail(&mut self) {
        self.thumbnail.unrequest();
    }

    pub fn is_thumbnail_requested(&self) -> bool {
        self.thumbnail.is_requested()
    }

    pub fn is_thumbnail_running(&self) -> bool {
        self.thumbnail.is_running()
    }

    /// The thumbnail, once its worker has finished. Never blocks.
    pub fn thumbnail(&mut self) -> Option<&Picture> {
        self.thumbnail.poll()
    }

    /// Upload the thumbnail once it is ready.
    pub fn bind_thumbnail(&mut self) -> Option<TextureHandle> {
        if self.tex_thumbnail.is_some() {
            return self.tex_thumbnail;
        }
        let picture = self.thumbnail.poll()?.clone();
        match self.upload(&picture) {
            Ok(handle) => {
                self.tex_thumbnail = Some(handle);
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(path = %self.identity.path.display(), error = %e, "failed to upload thumbnail");
                None
            }
        }
    }
}

impl Drop for ImageRecord {
    fn drop(&mut self) {
        self.unbind();
    }
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareDevice;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32, px: [u8; 4]) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(w, h, image::Rgba(px))
            .save(&path)
            .unwrap();
        path
    }

    fn record(path: &Path) -> (ImageRecord, Arc<SoftwareDevice>) {
        let device = Arc::new(SoftwareDevice::new());
        (ImageRecord::new(path, device.clone()), device)
    }

    #[test]
    fn unloaded_record_reads_as_black_and_empty() {
        let (rec, _) = record(Path::new("nothing.png"));
        assert_eq!(rec.state(), LoadState::Unloaded);
        assert_eq!((rec.width(), rec.height()), (0, 0));
        assert_eq!(rec.pixel(100, 100), Pixel::BLACK);
    }

    #[test]
    fn raster_load_fills_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 6, 4, [1, 2, 3, 255]);
        let (mut rec, _) = record(&path);
        assert!(rec.load());
        let info = rec.info().unwrap();
        assert_eq!((info.width, info.height), (6, 4));
        assert_eq!(info.kind, FileKind::Raster);
        assert_eq!(info.mem_size_bytes, 6 * 4 * 4);
        assert!(info.opaque);
        assert_eq!(rec.pixel(5, 3), Pixel::rgb(1, 2, 3));
        assert!(rec.info_line().starts_with("a.png  6x4"));
    }

    #[test]
    fn second_load_is_a_noop_that_touches_access_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 2, 2, [0, 0, 0, 255]);
        let (mut rec, _) = record(&path);
        assert!(rec.load());
        let first = rec.last_accessed().unwrap();
        assert!(rec.load());
        assert!(rec.last_accessed().unwrap() >= first);
        assert_eq!(rec.pictures().len(), 1);
    }

    #[test]
    fn failed_load_leaves_no_pictures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really").unwrap();
        let (mut rec, _) = record(&path);
        assert!(!rec.load());
        assert_eq!(rec.state(), LoadState::Failed);
        assert!(rec.pictures().is_empty());
        assert!(rec.load_error().is_some());
        assert!(matches!(rec.bind(), Err(Error::NotLoaded)));
    }

    #[test]
    fn unknown_files_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let (mut rec, _) = record(&path);
        assert!(matches!(rec.try_load(), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn bind_is_idempotent_and_unbind_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 2, 2, [0, 0, 0, 255]);
        let (mut rec, device) = record(&path);
        assert!(rec.load());
        let a = rec.bind().unwrap();
        let b = rec.bind().unwrap();
        assert_eq!(a, b);
        assert_eq!(device.live_textures(), 1);
        rec.unbind();
        rec.unbind();
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn unload_returns_to_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 2, 2, [0, 0, 0, 255]);
        let (mut rec, device) = record(&path);
        assert!(rec.load());
        rec.bind().unwrap();
        rec.unload();
        assert_eq!(rec.state(), LoadState::Unloaded);
        assert!(rec.info().is_none());
        assert_eq!(device.live_textures(), 0);
        assert!(rec.load());
    }

    #[test]
    fn drop_releases_textures() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 2, 2, [0, 0, 0, 255]);
        let (mut rec, device) = record(&path);
        assert!(rec.load());
        rec.bind().unwrap();
        drop(rec);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn rotate_updates_dimensions_and_drops_primary_texture() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 6, 4, [0, 0, 0, 255]);
        let (mut rec, device) = record(&path);
        assert!(rec.load());
        rec.bind().unwrap();
        rec.rotate90(RotateDir::Clockwise);
        assert_eq!((rec.width(), rec.height()), (4, 6));
        assert_eq!(rec.info().map(|i| (i.width, i.height)), Some((4, 6)));
        assert_eq!(device.live_textures(), 0);
        rec.flip(FlipAxis::Vertical);
        assert_eq!((rec.width(), rec.height()), (4, 6));
    }

    #[tokio::test]
    async fn load_detached_runs_off_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 3, 3, [9, 9, 9, 255]);
        let (rec, _) = record(&path);
        let rec = rec.load_detached().await.unwrap();
        assert!(rec.is_loaded());
        assert_eq!(rec.width(), 3);
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(12), "12 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }

    /// Delegates to a software device but refuses the `fail_at`th upload.
    struct FailingDevice {
        inner: SoftwareDevice,
        uploads: std::sync::atomic::AtomicUsize,
        fail_at: usize,
    }

    impl GraphicsDevice for FailingDevice {
        fn name(&self) -> &str {
            "failing"
        }

        fn upload_layer(
            &self,
            desc: &crate::gpu::UploadDescriptor,
            width: u32,
            height: u32,
            data: &[u8],
        ) -> Result<TextureHandle> {
            let n = self.uploads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if n == self.fail_at {
                return Err(Error::DeviceUploadFailure(format!("upload {n} refused")));
            }
            self.inner.upload_layer(desc, width, height, data)
        }

        fn readback_rgba8(&self, handle: TextureHandle, level: u32) -> Result<Vec<u8>> {
            self.inner.readback_rgba8(handle, level)
        }

        fn release(&self, handle: TextureHandle) {
            self.inner.release(handle)
        }
    }

    /// Always yields a four-level RGBA8 chain, never a cubemap.
    struct ChainParser;

    impl ContainerParser for ChainParser {
        fn parse_cubemap(&self, _bytes: &[u8]) -> Result<container::Cubemap> {
            Err(Error::CorruptContainer("not a cubemap".into()))
        }

        fn parse_texture_2d(&self, _bytes: &[u8]) -> Result<container::Texture2D> {
            let layers = [(8, 4), (4, 2), (2, 1), (1, 1)]
                .into_iter()
                .map(|(width, height)| container::Layer {
                    format: PixelFormat::Rgba8,
                    width,
                    height,
                    data: vec![200; width as usize * height as usize * 4],
                })
                .collect();
            Ok(container::Texture2D { layers })
        }
    }

    #[test]
    fn upload_failure_mid_chain_fails_the_load_and_leaks_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.dds");
        std::fs::write(&path, b"DDS placeholder").unwrap();
        let device = Arc::new(FailingDevice {
            inner: SoftwareDevice::new(),
            uploads: Default::default(),
            fail_at: 3,
        });
        let codecs = Codecs {
            raster: Arc::new(ImageCrateDecoder),
            container: Arc::new(ChainParser),
        };
        let mut rec = ImageRecord::with_device(&path, device.clone(), codecs);

        assert!(!rec.load());
        assert_eq!(rec.state(), LoadState::Failed);
        assert!(rec.pictures().is_empty());
        assert!(rec.info().is_none());
        assert!(rec.load_error().unwrap().contains("upload 3 refused"));
        assert_eq!(device.inner.live_textures(), 0);
    }

    #[test]
    fn thumbnail_request_against_a_full_pool_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 4, 4, [0, 0, 0, 255]);
        let cache = crate::thumbnail::ThumbnailCache::open(dir.path().join("cache")).unwrap();
        let scheduler = ThumbnailScheduler::new(
            Arc::new(cache),
            Arc::new(crate::gpu::SoftwareDeviceFactory),
            8,
            8,
            crate::picture::Filter::Nearest,
        )
        .with_max_workers(1);
        let _busy = scheduler.try_acquire().unwrap();

        let (mut rec, _) = record(&path);
        assert!(!rec.request_thumbnail(&scheduler));
        assert!(!rec.is_thumbnail_requested());
        assert!(!rec.is_thumbnail_running());
        assert_eq!(scheduler.running(), 1);
    }
}
