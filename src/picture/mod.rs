//! Normalized in-memory pictures.
//!
//! Every image that passes through the inspector ends up as a [`Picture`]: a
//! row-major, top-down grid of straight (non-premultiplied) RGBA8 pixels.
//! Transforms live in `transform.rs`, filtered resampling in `resample.rs`
//! and the cache serialization in `chunk.rs`.

mod chunk;
mod resample;
mod transform;

pub use resample::Filter;
pub use transform::{FlipAxis, RotateDir};

use crate::error::{Error, Result};

/// One RGBA8 pixel. The layout matches the byte order uploaded to the device.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const TRANSPARENT: Pixel = Pixel::new(0, 0, 0, 0);
    pub const BLACK: Pixel = Pixel::new(0, 0, 0, 255);
    pub const WHITE: Pixel = Pixel::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn is_opaque(&self) -> bool {
        self.a == 255
    }
}

/// Owned RGBA8 picture.
///
/// Invariant: `width > 0`, `height > 0` and `pixels.len() == width * height`.
/// Constructors enforce it, so every `Picture` in the crate is valid.
#[derive(Clone, PartialEq, Eq)]
pub struct Picture {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

// Manual Debug so a 4k picture doesn't dump 16M pixels into a log line
impl std::fmt::Debug for Picture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picture")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Picture {
    /// Allocate a `width` x `height` picture filled with `fill`.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(width: u32, height: u32, fill: Pixel) -> Self {
        assert!(width > 0 && height > 0, "picture dimensions must be non-zero");
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// Wrap an existing pixel vector.
    ///
    /// # Errors
    /// Returns [`Error::DecodeFailure`] if the dimensions are zero or disagree
    /// with the vector length.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Pixel>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::DecodeFailure(format!(
                "picture dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(Error::DecodeFailure(format!(
                "{width}x{height} picture needs {expected} pixels, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Wrap tightly packed RGBA8 bytes, e.g. a device readback.
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                Error::DecodeFailure(format!("{width}x{height} RGBA8 picture is too large"))
            })?;
        if bytes.len() != expected {
            return Err(Error::DecodeFailure(format!(
                "{width}x{height} RGBA8 picture needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| Pixel::new(p[0], p[1], p[2], p[3]))
            .collect();
        Self::from_pixels(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn num_pixels(&self) -> usize {
        self.pixels.len()
    }

    /// Bytes held by the pixel array.
    pub fn mem_size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Pixel>()
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Raw RGBA8 bytes, ready for a device upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}x{} picture",
            self.width,
            self.height
        );
        y as usize * self.width as usize + x as usize
    }

    /// # Panics
    /// Panics if `(x, y)` lies outside the picture.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.pixels[self.index(x, y)]
    }

    /// # Panics
    /// Panics if `(x, y)` lies outside the picture.
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        let idx = self.index(x, y);
        self.pixels[idx] = pixel;
    }

    /// True iff every pixel has full alpha.
    pub fn is_opaque(&self) -> bool {
        self.pixels.iter().all(Pixel::is_opaque)
    }

    /// Copy `src` into this picture with its top-left corner at `(x, y)`.
    /// Parts of `src` falling outside are clipped.
    pub fn blit(&mut self, src: &Picture, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let w = src.width.min(self.width - x) as usize;
        let h = src.height.min(self.height - y);
        for row in 0..h {
            let dst_start = self.index(x, y + row);
            let src_start = row as usize * src.width as usize;
            self.pixels[dst_start..dst_start + w]
                .copy_from_slice(&src.pixels[src_start..src_start + w]);
        }
    }
}
