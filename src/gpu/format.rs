//! Pixel format table.
//!
//! Maps every pixel format the loaders can produce to the descriptor a
//! [`GraphicsDevice`](super::GraphicsDevice) needs to upload a layer of it,
//! and back. Uncompressed formats are expanded to RGBA8 before upload; block
//! compressed formats are uploaded as-is.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgr8,
    Bgra8,
    /// BC1 / DXT1 without alpha. The fourth palette entry is opaque black.
    Bc1,
    /// BC1 / DXT1 with 1-bit alpha.
    Bc1A,
    /// BC2 / DXT3.
    Bc2,
    /// BC3 / DXT5.
    Bc3,
    /// 16-bit packed A1R5G5B5, blue in the low bits.
    Bgra5551,
    /// 16-bit packed A4R4G4B4, blue in the low bits.
    Bgra4444,
    /// 16-bit packed R5G6B5, blue in the low bits.
    Bgr565,
    Unknown,
}

impl PixelFormat {
    pub const KNOWN: [PixelFormat; 11] = [
        PixelFormat::Rgb8,
        PixelFormat::Rgba8,
        PixelFormat::Bgr8,
        PixelFormat::Bgra8,
        PixelFormat::Bc1,
        PixelFormat::Bc1A,
        PixelFormat::Bc2,
        PixelFormat::Bc3,
        PixelFormat::Bgra5551,
        PixelFormat::Bgra4444,
        PixelFormat::Bgr565,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb8 => "R8G8B8",
            PixelFormat::Rgba8 => "R8G8B8A8",
            PixelFormat::Bgr8 => "B8G8R8",
            PixelFormat::Bgra8 => "B8G8R8A8",
            PixelFormat::Bc1 => "BC1DXT1",
            PixelFormat::Bc1A => "BC1DXT1A",
            PixelFormat::Bc2 => "BC2DXT3",
            PixelFormat::Bc3 => "BC3DXT5",
            PixelFormat::Bgra5551 => "G3B5A1R5G2",
            PixelFormat::Bgra4444 => "G4B4A4R4",
            PixelFormat::Bgr565 => "G3B5R5G3",
            PixelFormat::Unknown => "Unknown",
        }
    }

    pub fn from_name(name: &str) -> PixelFormat {
        Self::KNOWN
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .unwrap_or(PixelFormat::Unknown)
    }

    pub fn is_block_compressed(self) -> bool {
        matches!(
            self,
            PixelFormat::Bc1 | PixelFormat::Bc1A | PixelFormat::Bc2 | PixelFormat::Bc3
        )
    }

    /// Bits per pixel in the source encoding.
    pub fn bits(self) -> u32 {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 24,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 32,
            PixelFormat::Bc1 | PixelFormat::Bc1A => 4,
            PixelFormat::Bc2 | PixelFormat::Bc3 => 8,
            PixelFormat::Bgra5551 | PixelFormat::Bgra4444 | PixelFormat::Bgr565 => 16,
            PixelFormat::Unknown => 0,
        }
    }

    /// Whether the encoding can carry anything other than full alpha.
    pub fn has_alpha(self) -> bool {
        !matches!(
            self,
            PixelFormat::Rgb8
                | PixelFormat::Bgr8
                | PixelFormat::Bc1
                | PixelFormat::Bgr565
                | PixelFormat::Unknown
        )
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Order of the colour channels in the source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Rgba,
    Bgr,
    Bgra,
}

/// How a single source element is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    Packed1555,
    Packed4444,
    Packed565,
    /// Compressed 4x4 block.
    Block,
}

/// Texel layout the device stores the layer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    Rgba8,
    Bc1,
    Bc2,
    Bc3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    pub width: u32,
    pub height: u32,
    pub bytes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub format: PixelFormat,
    /// `None` for block compressed data.
    pub channel_order: Option<ChannelOrder>,
    pub element: ElementType,
    pub storage: StorageFormat,
    pub compressed: bool,
    pub block: Option<BlockGeometry>,
}

const BLOCK_8: BlockGeometry = BlockGeometry {
    width: 4,
    height: 4,
    bytes: 8,
};

const BLOCK_16: BlockGeometry = BlockGeometry {
    width: 4,
    height: 4,
    bytes: 16,
};

/// Upload descriptor for `format`.
///
/// # Errors
/// [`Error::UnsupportedFormat`] for [`PixelFormat::Unknown`].
pub fn descriptor(format: PixelFormat) -> Result<UploadDescriptor> {
    let plain = |order, element| UploadDescriptor {
        format,
        channel_order: Some(order),
        element,
        storage: StorageFormat::Rgba8,
        compressed: false,
        block: None,
    };
    let block = |storage, geometry| UploadDescriptor {
        format,
        channel_order: None,
        element: ElementType::Block,
        storage,
        compressed: true,
        block: Some(geometry),
    };

    Ok(match format {
        PixelFormat::Rgb8 => plain(ChannelOrder::Rgb, ElementType::U8),
        PixelFormat::Rgba8 => plain(ChannelOrder::Rgba, ElementType::U8),
        PixelFormat::Bgr8 => plain(ChannelOrder::Bgr, ElementType::U8),
        PixelFormat::Bgra8 => plain(ChannelOrder::Bgra, ElementType::U8),
        PixelFormat::Bgra5551 => plain(ChannelOrder::Bgra, ElementType::Packed1555),
        PixelFormat::Bgra4444 => plain(ChannelOrder::Bgra, ElementType::Packed4444),
        PixelFormat::Bgr565 => plain(ChannelOrder::Bgr, ElementType::Packed565),
        PixelFormat::Bc1 | PixelFormat::Bc1A => block(StorageFormat::Bc1, BLOCK_8),
        PixelFormat::Bc2 => block(StorageFormat::Bc2, BLOCK_16),
        PixelFormat::Bc3 => block(StorageFormat::Bc3, BLOCK_16),
        PixelFormat::Unknown => {
            return Err(Error::UnsupportedFormat(
                "no upload descriptor for unknown pixel format".into(),
            ))
        }
    })
}

impl UploadDescriptor {
    /// Reverse lookup: the pixel format this descriptor was built for, if the
    /// descriptor is one the table produces.
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::KNOWN
            .into_iter()
            .find(|f| descriptor(*f).is_ok_and(|d| d == *self))
            .unwrap_or(PixelFormat::Unknown)
    }

    fn bytes_per_element(&self) -> usize {
        match (self.element, self.channel_order) {
            (ElementType::U8, Some(ChannelOrder::Rgb | ChannelOrder::Bgr)) => 3,
            (ElementType::U8, _) => 4,
            (ElementType::Packed1555 | ElementType::Packed4444 | ElementType::Packed565, _) => 2,
            (ElementType::Block, _) => 0,
        }
    }

    /// Byte length of one `width` x `height` layer in this encoding.
    ///
    /// # Errors
    /// [`Error::CorruptContainer`] when the size does not fit in `usize`,
    /// which only happens for nonsense header dimensions.
    pub fn layer_size(&self, width: u32, height: u32) -> Result<usize> {
        let size = match self.block {
            Some(b) => (width.div_ceil(b.width) as usize)
                .checked_mul(height.div_ceil(b.height) as usize)
                .and_then(|n| n.checked_mul(b.bytes as usize)),
            None => (width as usize)
                .checked_mul(height as usize)
                .and_then(|n| n.checked_mul(self.bytes_per_element())),
        };
        size.ok_or_else(|| {
            Error::CorruptContainer(format!("{} layer {width}x{height} is too large", self.format))
        })
    }

    /// Expand an uncompressed layer to tightly packed RGBA8.
    ///
    /// # Errors
    /// [`Error::UnsupportedFormat`] for compressed descriptors and
    /// [`Error::CorruptContainer`] when `data` is shorter than the layer.
    pub fn expand_to_rgba8(&self, width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
        if self.compressed {
            return Err(Error::UnsupportedFormat(format!(
                "{} is block compressed",
                self.format
            )));
        }
        let needed = self.layer_size(width, height)?;
        if data.len() < needed {
            return Err(Error::CorruptContainer(format!(
                "{} layer {width}x{height} needs {needed} bytes, got {}",
                self.format,
                data.len()
            )));
        }

        let mut out = Vec::with_capacity(needed / self.bytes_per_element() * 4);
        let step = self.bytes_per_element();
        for px in data[..needed].chunks_exact(step) {
            let rgba = match (self.element, self.channel_order) {
                (ElementType::U8, Some(ChannelOrder::Rgb)) => [px[0], px[1], px[2], 255],
                (ElementType::U8, Some(ChannelOrder::Bgr)) => [px[2], px[1], px[0], 255],
                (ElementType::U8, Some(ChannelOrder::Bgra)) => [px[2], px[1], px[0], px[3]],
                (ElementType::U8, _) => [px[0], px[1], px[2], px[3]],
                (ElementType::Packed1555, _) => unpack_1555(u16::from_le_bytes([px[0], px[1]])),
                (ElementType::Packed4444, _) => unpack_4444(u16::from_le_bytes([px[0], px[1]])),
                (ElementType::Packed565, _) => unpack_565(u16::from_le_bytes([px[0], px[1]])),
                (ElementType::Block, _) => unreachable!("block formats rejected above"),
            };
            out.extend_from_slice(&rgba);
        }
        Ok(out)
    }
}

fn expand5(v: u16) -> u8 {
    let v = (v & 0x1f) as u8;
    (v << 3) | (v >> 2)
}

fn expand6(v: u16) -> u8 {
    let v = (v & 0x3f) as u8;
    (v << 2) | (v >> 4)
}

fn expand4(v: u16) -> u8 {
    (v & 0xf) as u8 * 17
}

fn unpack_1555(v: u16) -> [u8; 4] {
    let a = if v & 0x8000 != 0 { 255 } else { 0 };
    [expand5(v >> 10), expand5(v >> 5), expand5(v), a]
}

fn unpack_4444(v: u16) -> [u8; 4] {
    [expand4(v >> 8), expand4(v >> 4), expand4(v), expand4(v >> 12)]
}

fn unpack_565(v: u16) -> [u8; 4] {
    [expand5(v >> 11), expand6(v >> 5), expand5(v), 255]
}
