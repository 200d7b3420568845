//! CPU graphics device.
//!
//! Decodes every layer to RGBA8 at upload time and keeps the result in a
//! handle table, so readback is a copy. Used when no GPU is available, by
//! raster thumbnail workers, and in tests.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image_dds::{ImageFormat, Surface};

use super::format::{PixelFormat, UploadDescriptor};
use super::{DeviceFactory, GraphicsDevice, TextureHandle};
use crate::error::{Error, Result};

struct Stored {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

pub struct SoftwareDevice {
    textures: Mutex<HashMap<u64, Stored>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SoftwareDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareDevice")
            .field("live_textures", &self.live_textures())
            .finish()
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of textures uploaded and not yet released.
    pub fn live_textures(&self) -> usize {
        self.textures.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn name(&self) -> &str {
        "software"
    }

    fn upload_layer(
        &self,
        desc: &UploadDescriptor,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<TextureHandle> {
        if width == 0 || height == 0 {
            return Err(Error::DeviceUploadFailure(format!(
                "cannot upload a {width}x{height} layer"
            )));
        }
        let rgba = decode_layer(desc, width, height, data)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = NonZeroU64::new(id)
            .map(TextureHandle::from_id)
            .ok_or_else(|| Error::DeviceUploadFailure("texture ids exhausted".into()))?;
        self.textures
            .lock()
            .map_err(|_| Error::DeviceUploadFailure("texture table poisoned".into()))?
            .insert(
                id,
                Stored {
                    width,
                    height,
                    rgba,
                },
            );
        Ok(handle)
    }

    fn readback_rgba8(&self, handle: TextureHandle, level: u32) -> Result<Vec<u8>> {
        if level != 0 {
            return Err(Error::DeviceUploadFailure(format!(
                "texture {} has no level {level}",
                handle.id()
            )));
        }
        let textures = self
            .textures
            .lock()
            .map_err(|_| Error::DeviceUploadFailure("texture table poisoned".into()))?;
        let stored = textures.get(&handle.id()).ok_or_else(|| {
            Error::DeviceUploadFailure(format!("unknown texture {}", handle.id()))
        })?;
        debug_assert_eq!(
            stored.rgba.len(),
            stored.width as usize * stored.height as usize * 4
        );
        Ok(stored.rgba.clone())
    }

    fn release(&self, handle: TextureHandle) {
        if let Ok(mut textures) = self.textures.lock() {
            textures.remove(&handle.id());
        }
    }
}

/// Decode one layer of any supported encoding to RGBA8.
pub(crate) fn decode_layer(
    desc: &UploadDescriptor,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<Vec<u8>> {
    if !desc.compressed {
        return desc.expand_to_rgba8(width, height, data);
    }
    let needed = desc.layer_size(width, height)?;
    if data.len() < needed {
        return Err(Error::CorruptContainer(format!(
            "{} layer {width}x{height} needs {needed} bytes, got {}",
            desc.format,
            data.len()
        )));
    }
    let image_format = match desc.format {
        PixelFormat::Bc1 | PixelFormat::Bc1A => ImageFormat::BC1RgbaUnorm,
        PixelFormat::Bc2 => ImageFormat::BC2RgbaUnorm,
        PixelFormat::Bc3 => ImageFormat::BC3RgbaUnorm,
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "no block decoder for {other}"
            )))
        }
    };
    let surface = Surface {
        width,
        height,
        depth: 1,
        layers: 1,
        mipmaps: 1,
        image_format,
        data: &data[..needed],
    };
    let mut rgba = surface
        .decode_rgba8()
        .map_err(|e| Error::DecodeFailure(format!("{} layer {width}x{height}: {e}", desc.format)))?
        .data;

    // Plain BC1 has no alpha; the three-colour black entry stays opaque.
    if desc.format == PixelFormat::Bc1 {
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
    }
    Ok(rgba)
}

/// Hands out fresh [`SoftwareDevice`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareDeviceFactory;

impl DeviceFactory for SoftwareDeviceFactory {
    fn create(&self) -> Result<Arc<dyn GraphicsDevice>> {
        Ok(Arc::new(SoftwareDevice::new()))
    }
}
