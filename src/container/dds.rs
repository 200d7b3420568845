//! DDS container parsing on top of `ddsfile`.

use std::io::Cursor;

use ddsfile::{D3DFormat, Dds, DxgiFormat};

use super::{ContainerParser, CubeFace, Cubemap, Layer, Texture2D};
use crate::error::{Error, Result};
use crate::gpu::{descriptor, PixelFormat};

// DDSCAPS2 bits
const CAPS2_CUBEMAP: u32 = 0x200;
const CAPS2_FACE_BITS: [u32; 6] = [0x400, 0x800, 0x1000, 0x2000, 0x4000, 0x8000];

/// Reads DDS files, legacy and DX10 headers alike.
#[derive(Debug, Default, Clone, Copy)]
pub struct DdsParser;

fn pixel_format(dds: &Dds) -> PixelFormat {
    if let Some(dxgi) = dds.get_dxgi_format() {
        return match dxgi {
            DxgiFormat::BC1_UNorm | DxgiFormat::BC1_UNorm_sRGB => PixelFormat::Bc1A,
            DxgiFormat::BC2_UNorm | DxgiFormat::BC2_UNorm_sRGB => PixelFormat::Bc2,
            DxgiFormat::BC3_UNorm | DxgiFormat::BC3_UNorm_sRGB => PixelFormat::Bc3,
            DxgiFormat::R8G8B8A8_UNorm | DxgiFormat::R8G8B8A8_UNorm_sRGB => PixelFormat::Rgba8,
            DxgiFormat::B8G8R8A8_UNorm | DxgiFormat::B8G8R8A8_UNorm_sRGB => PixelFormat::Bgra8,
            DxgiFormat::B5G5R5A1_UNorm => PixelFormat::Bgra5551,
            DxgiFormat::B4G4R4A4_UNorm => PixelFormat::Bgra4444,
            DxgiFormat::B5G6R5_UNorm => PixelFormat::Bgr565,
            _ => PixelFormat::Unknown,
        };
    }
    match dds.get_d3d_format() {
        // DXT1 may or may not use its 1-bit alpha; assume it does
        Some(D3DFormat::DXT1) => PixelFormat::Bc1A,
        Some(D3DFormat::DXT3) => PixelFormat::Bc2,
        Some(D3DFormat::DXT5) => PixelFormat::Bc3,
        Some(D3DFormat::A8R8G8B8) => PixelFormat::Bgra8,
        Some(D3DFormat::A8B8G8R8) => PixelFormat::Rgba8,
        Some(D3DFormat::R8G8B8) => PixelFormat::Bgr8,
        Some(D3DFormat::A1R5G5B5) => PixelFormat::Bgra5551,
        Some(D3DFormat::A4R4G4B4) => PixelFormat::Bgra4444,
        Some(D3DFormat::R5G6B5) => PixelFormat::Bgr565,
        _ => PixelFormat::Unknown,
    }
}

fn read(bytes: &[u8]) -> Result<Dds> {
    Dds::read(&mut Cursor::new(bytes))
        .map_err(|e| Error::CorruptContainer(format!("DDS read error: {e}")))
}

fn is_cubemap(dds: &Dds) -> bool {
    let legacy = dds.header.caps2.bits() & CAPS2_CUBEMAP != 0;
    let dx10 = dds
        .header10
        .as_ref()
        .is_some_and(|h10| h10.misc_flag.contains(ddsfile::MiscFlag::TEXTURECUBE));
    legacy || dx10
}

/// Cut `levels` mip layers of a `width` x `height` surface out of `data`,
/// starting at `*offset` and advancing it.
fn take_chain(
    data: &[u8],
    offset: &mut usize,
    format: PixelFormat,
    width: u32,
    height: u32,
    levels: u32,
) -> Result<Texture2D> {
    let desc = descriptor(format)?;
    let mut layers = Vec::with_capacity(levels as usize);
    for level in 0..levels {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        let size = desc.layer_size(w, h)?;
        let end = offset.saturating_add(size);
        let bytes = data.get(*offset..end).ok_or_else(|| {
            Error::CorruptContainer(format!(
                "mip level {level} ({w}x{h}) needs bytes {}..{end}, file has {}",
                *offset,
                data.len()
            ))
        })?;
        layers.push(Layer {
            format,
            width: w,
            height: h,
            data: bytes.to_vec(),
        });
        *offset = end;
    }
    Ok(Texture2D { layers })
}

fn surface(dds: &Dds) -> Result<(PixelFormat, u32, u32, u32)> {
    let format = pixel_format(dds);
    if format == PixelFormat::Unknown {
        return Err(Error::UnsupportedFormat(format!(
            "DDS pixel format {:?}/{:?} is not supported",
            dds.get_d3d_format(),
            dds.get_dxgi_format()
        )));
    }
    let width = dds.header.width;
    let height = dds.header.height;
    if width == 0 || height == 0 {
        return Err(Error::CorruptContainer(format!(
            "DDS surface is {width}x{height}"
        )));
    }
    let levels = dds.header.mip_map_count.unwrap_or(1).max(1);
    let max_levels = 32 - width.max(height).leading_zeros();
    if levels > max_levels {
        return Err(Error::CorruptContainer(format!(
            "{levels} mip levels declared for a {width}x{height} surface"
        )));
    }
    if dds.header.depth.unwrap_or(1) > 1 {
        return Err(Error::UnsupportedFormat("volume textures are not supported".into()));
    }
    let base = descriptor(format)?.layer_size(width, height)?;
    if base > dds.data.len() {
        return Err(Error::CorruptContainer(format!(
            "{width}x{height} {format} surface needs {base} bytes, file has {}",
            dds.data.len()
        )));
    }
    Ok((format, width, height, levels))
}

impl ContainerParser for DdsParser {
    fn parse_cubemap(&self, bytes: &[u8]) -> Result<Cubemap> {
        let dds = read(bytes)?;
        if !is_cubemap(&dds) {
            return Err(Error::CorruptContainer("DDS file is not a cubemap".into()));
        }
        let caps2 = dds.header.caps2.bits();
        if dds.header10.is_none() && CAPS2_FACE_BITS.iter().any(|bit| caps2 & bit == 0) {
            return Err(Error::CorruptContainer(
                "partial cubemaps are not supported".into(),
            ));
        }

        let (format, width, height, levels) = surface(&dds)?;
        if width != height {
            return Err(Error::CorruptContainer(format!(
                "cubemap faces must be square, got {width}x{height}"
            )));
        }

        let mut offset = 0;
        let mut faces = Vec::with_capacity(6);
        for face in CubeFace::STORAGE_ORDER {
            let chain = take_chain(&dds.data, &mut offset, format, width, height, levels)?;
            faces.push((face, chain));
        }
        tracing::debug!(%format, width, levels, "parsed DDS cubemap");
        Ok(Cubemap { faces })
    }

    fn parse_texture_2d(&self, bytes: &[u8]) -> Result<Texture2D> {
        let dds = read(bytes)?;
        if is_cubemap(&dds) {
            return Err(Error::CorruptContainer(
                "DDS file is a cubemap, not a 2D texture".into(),
            ));
        }
        let (format, width, height, levels) = surface(&dds)?;
        let mut offset = 0;
        let tex = take_chain(&dds.data, &mut offset, format, width, height, levels)?;
        tracing::debug!(%format, width, height, levels, "parsed DDS texture");
        Ok(tex)
    }
}
