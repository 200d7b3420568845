//! Graphics device capability.
//!
//! The loaders never talk to a graphics API directly. They upload layers
//! through [`GraphicsDevice`] and read decompressed RGBA8 back, which lets a
//! GPU do block decompression when one is around and the CPU do it when not.
//!
//! - `format.rs` - pixel format table and upload descriptors
//! - `software.rs` - CPU implementation with BC1/BC2/BC3 decoders
//! - `pipeline.rs` - headless wgpu implementation
//! - `shaders.rs` - WGSL used by the wgpu device

pub mod format;
pub mod pipeline;
pub mod shaders;
pub mod software;

use std::num::NonZeroU64;
use std::sync::Arc;

use crate::error::Result;

pub use format::{descriptor, PixelFormat, UploadDescriptor};
pub use pipeline::{WgpuDevice, WgpuDeviceFactory};
pub use software::{SoftwareDevice, SoftwareDeviceFactory};

/// Opaque handle to a texture owned by a [`GraphicsDevice`].
///
/// Handles are plain ids. Whoever receives one from `upload_layer` owns it
/// and must hand it back through `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(NonZeroU64);

impl TextureHandle {
    pub(crate) fn from_id(id: NonZeroU64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0.get()
    }
}

pub trait GraphicsDevice: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Upload one layer encoded as `desc` into a new single-level texture.
    fn upload_layer(
        &self,
        desc: &UploadDescriptor,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<TextureHandle>;

    /// Read a level of `handle` back as tightly packed RGBA8.
    /// Textures created by `upload_layer` only have level 0.
    fn readback_rgba8(&self, handle: TextureHandle, level: u32) -> Result<Vec<u8>>;

    /// Free the texture. Unknown handles are ignored.
    fn release(&self, handle: TextureHandle);
}

/// Creates devices for thumbnail workers, which never share the main
/// context's device.
pub trait DeviceFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn GraphicsDevice>>;
}

/// Open the wgpu device when `use_gpu` is set and one is available,
/// otherwise the software device.
pub fn default_device(use_gpu: bool) -> Arc<dyn GraphicsDevice> {
    if use_gpu {
        match WgpuDevice::new() {
            Ok(device) => return Arc::new(device),
            Err(e) => tracing::warn!(error = %e, "no usable GPU, decoding on the CPU"),
        }
    }
    Arc::new(SoftwareDevice::new())
}

/// Factory matching [`default_device`].
pub fn default_factory(use_gpu: bool) -> Arc<dyn DeviceFactory> {
    if use_gpu {
        Arc::new(WgpuDeviceFactory)
    } else {
        Arc::new(SoftwareDeviceFactory)
    }
}
