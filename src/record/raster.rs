use image::ColorType;

use crate::error::{Error, Result};
use crate::gpu::PixelFormat;
use crate::picture::Picture;

/// A decoded raster file.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub picture: Picture,
    /// Best matching entry of the format table, `Unknown` for encodings it
    /// doesn't list (greyscale, 16-bit, float).
    pub format: PixelFormat,
    /// Source encoding as the decoder reports it, e.g. `Rgb8` or `L16`.
    pub color: String,
    pub bits_per_pixel: u32,
    pub has_alpha: bool,
}

pub trait RasterDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage>;
}

/// Decodes everything the `image` crate understands.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl RasterDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::DecodeFailure(format!("raster decode failed: {e}")))?;
        let color = img.color();
        let format = match color {
            ColorType::Rgb8 => PixelFormat::Rgb8,
            ColorType::Rgba8 => PixelFormat::Rgba8,
            _ => PixelFormat::Unknown,
        };
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let picture = Picture::from_rgba8(width, height, rgba.as_raw())?;
        Ok(RasterImage {
            picture,
            format,
            color: format!("{color:?}"),
            bits_per_pixel: u32::from(color.bits_per_pixel()),
            has_alpha: color.has_alpha(),
        })
    }
}
