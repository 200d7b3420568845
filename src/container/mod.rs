//! Texture containers: parsed layers, the device-assisted decode bridge and
//! the composite "alternate view" builders.

pub mod bridge;
pub mod compose;
pub mod dds;

pub use bridge::{decode_cubemap, decode_layer, decode_texture_2d};
pub use compose::{cubemap_cross, mipmap_strip};
pub use dds::DdsParser;

use crate::error::Result;
use crate::gpu::PixelFormat;

/// One encoded image inside a container: a single mip level of a single
/// face.
#[derive(Clone, PartialEq, Eq)]
pub struct Layer {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A 2D texture as its mip chain, largest level first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture2D {
    pub layers: Vec<Layer>,
}

impl Texture2D {
    pub fn format(&self) -> PixelFormat {
        self.layers
            .first()
            .map_or(PixelFormat::Unknown, |l| l.format)
    }

    pub fn levels(&self) -> usize {
        self.layers.len()
    }

    /// `Some(true)` when the encoding cannot carry alpha, so every decoded
    /// pixel is known to be opaque without scanning.
    pub fn opacity_hint(&self) -> Option<bool> {
        match self.format() {
            PixelFormat::Unknown => None,
            f if !f.has_alpha() => Some(true),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl CubeFace {
    /// Order faces are stored in on disk.
    pub const STORAGE_ORDER: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Order decoded faces are handed out in.
    pub const DISPLAY_ORDER: [CubeFace; 6] = [
        CubeFace::PosZ,
        CubeFace::NegZ,
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CubeFace::PosX => "+X",
            CubeFace::NegX => "-X",
            CubeFace::PosY => "+Y",
            CubeFace::NegY => "-Y",
            CubeFace::PosZ => "+Z",
            CubeFace::NegZ => "-Z",
        }
    }
}

/// Six faces, each with its own mip chain. Faces may be listed in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cubemap {
    pub faces: Vec<(CubeFace, Texture2D)>,
}

impl Cubemap {
    pub fn face(&self, face: CubeFace) -> Option<&Texture2D> {
        self.faces.iter().find(|(f, _)| *f == face).map(|(_, t)| t)
    }

    pub fn format(&self) -> PixelFormat {
        self.faces
            .first()
            .map_or(PixelFormat::Unknown, |(_, t)| t.format())
    }
}

/// Splits container bytes into encoded layers. The two interpretations fail
/// independently: a plain 2D file is not a cubemap and vice versa.
pub trait ContainerParser: Send + Sync {
    fn parse_cubemap(&self, bytes: &[u8]) -> Result<Cubemap>;

    fn parse_texture_2d(&self, bytes: &[u8]) -> Result<Texture2D>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_order_is_a_permutation_of_storage_order() {
        let mut display = CubeFace::DISPLAY_ORDER.to_vec();
        display.sort_by_key(|f| CubeFace::STORAGE_ORDER.iter().position(|s| s == f));
        assert_eq!(display, CubeFace::STORAGE_ORDER);
        assert_eq!(CubeFace::DISPLAY_ORDER[0].label(), "+Z");
    }

    #[test]
    fn opacity_hint_follows_format() {
        let layer = |format| Layer {
            format,
            width: 1,
            height: 1,
            data: vec![],
        };
        let bc1 = Texture2D {
            layers: vec![layer(PixelFormat::Bc1)],
        };
        assert_eq!(bc1.opacity_hint(), Some(true));
        let bc3 = Texture2D {
            layers: vec![layer(PixelFormat::Bc3)],
        };
        assert_eq!(bc3.opacity_hint(), None);
    }
}
