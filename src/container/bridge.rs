//! Turns parsed container layers into pictures by round-tripping each layer
//! through a graphics device.

use super::{CubeFace, Cubemap, Layer, Texture2D};
use crate::error::{Error, Result};
use crate::gpu::{descriptor, GraphicsDevice};
use crate::picture::Picture;

/// Upload one layer, read it back as RGBA8 and release the transient texture.
/// The texture is released even when readback fails.
pub fn decode_layer(device: &dyn GraphicsDevice, layer: &Layer) -> Result<Picture> {
    let desc = descriptor(layer.format)?;
    let handle = device.upload_layer(&desc, layer.width, layer.height, &layer.data)?;
    let readback = device.readback_rgba8(handle, 0);
    device.release(handle);
    Picture::from_rgba8(layer.width, layer.height, &readback?)
}

/// Check the halving rule: level `i` is `max(1, base >> i)` in both
/// dimensions and every level shares the base format.
fn validate_chain(tex: &Texture2D) -> Result<()> {
    let base = tex
        .layers
        .first()
        .ok_or_else(|| Error::CorruptContainer("texture has no layers".into()))?;
    let max_levels = 32 - base.width.max(base.height).leading_zeros();
    if tex.layers.len() > max_levels as usize {
        return Err(Error::CorruptContainer(format!(
            "{} levels for a {}x{} base",
            tex.layers.len(),
            base.width,
            base.height
        )));
    }
    for (level, layer) in tex.layers.iter().enumerate() {
        let w = (base.width >> level).max(1);
        let h = (base.height >> level).max(1);
        if (layer.width, layer.height) != (w, h) {
            return Err(Error::CorruptContainer(format!(
                "level {level} is {}x{}, expected {w}x{h}",
                layer.width, layer.height
            )));
        }
        if layer.format != base.format {
            return Err(Error::CorruptContainer(format!(
                "level {level} is {}, base is {}",
                layer.format, base.format
            )));
        }
    }
    Ok(())
}

/// Decode every mip level, largest first.
pub fn decode_texture_2d(device: &dyn GraphicsDevice, tex: &Texture2D) -> Result<Vec<Picture>> {
    validate_chain(tex)?;
    tex.layers
        .iter()
        .enumerate()
        .map(|(level, layer)| {
            tracing::debug!(level, width = layer.width, height = layer.height, format = %layer.format, "decoding mip level");
            decode_layer(device, layer)
        })
        .collect()
}

/// Decode level 0 of each face, in [`CubeFace::DISPLAY_ORDER`].
pub fn decode_cubemap(device: &dyn GraphicsDevice, cube: &Cubemap) -> Result<Vec<Picture>> {
    if cube.faces.len() != 6 {
        return Err(Error::CorruptContainer(format!(
            "cubemap has {} faces",
            cube.faces.len()
        )));
    }
    let mut size = None;
    let mut pictures = Vec::with_capacity(6);
    for face in CubeFace::DISPLAY_ORDER {
        let tex = cube.face(face).ok_or_else(|| {
            Error::CorruptContainer(format!("cubemap is missing face {}", face.label()))
        })?;
        validate_chain(tex)?;
        let layer = &tex.layers[0];
        match size {
            None => size = Some((layer.width, layer.height)),
            Some(s) if s != (layer.width, layer.height) => {
                return Err(Error::CorruptContainer(format!(
                    "face {} is {}x{}, other faces are {}x{}",
                    face.label(),
                    layer.width,
                    layer.height,
                    s.0,
                    s.1
                )))
            }
            Some(_) => {}
        }
        tracing::debug!(face = face.label(), width = layer.width, "decoding cubemap face");
        pictures.push(decode_layer(device, layer)?);
    }
    Ok(pictures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{PixelFormat, SoftwareDevice};
    use crate::picture::Pixel;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Layer {
        Layer {
            format: PixelFormat::Rgba8,
            width: w,
            height: h,
            data: rgba.repeat((w * h) as usize),
        }
    }

    #[test]
    fn mip_chain_decodes_in_order() {
        let device = SoftwareDevice::new();
        let tex = Texture2D {
            layers: vec![
                solid(64, 64, [1, 0, 0, 255]),
                solid(32, 32, [2, 0, 0, 255]),
                solid(16, 16, [3, 0, 0, 255]),
                solid(8, 8, [4, 0, 0, 255]),
            ],
        };
        let pics = decode_texture_2d(&device, &tex).unwrap();
        let widths: Vec<_> = pics.iter().map(Picture::width).collect();
        assert_eq!(widths, vec![64, 32, 16, 8]);
        assert_eq!(pics[3].pixel(0, 0), Pixel::new(4, 0, 0, 255));
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn non_rectangular_chain_clamps_to_one() {
        let device = SoftwareDevice::new();
        let tex = Texture2D {
            layers: vec![
                solid(4, 1, [0; 4]),
                solid(2, 1, [0; 4]),
                solid(1, 1, [0; 4]),
            ],
        };
        assert_eq!(decode_texture_2d(&device, &tex).unwrap().len(), 3);
    }

    #[test]
    fn wrong_level_size_is_corrupt() {
        let device = SoftwareDevice::new();
        let tex = Texture2D {
            layers: vec![solid(8, 8, [0; 4]), solid(8, 8, [0; 4])],
        };
        assert!(matches!(
            decode_texture_2d(&device, &tex),
            Err(Error::CorruptContainer(_))
        ));
        let empty = Texture2D { layers: vec![] };
        assert!(decode_texture_2d(&device, &empty).is_err());
    }

    #[test]
    fn cubemap_faces_come_out_in_display_order() {
        let device = SoftwareDevice::new();
        // Listed in storage order, each face tagged by its red channel
        let faces = CubeFace::STORAGE_ORDER
            .iter()
            .enumerate()
            .map(|(i, f)| {
                (
                    *f,
                    Texture2D {
                        layers: vec![solid(2, 2, [i as u8, 0, 0, 255])],
                    },
                )
            })
            .collect();
        let pics = decode_cubemap(&device, &Cubemap { faces }).unwrap();
        let tags: Vec<_> = pics.iter().map(|p| p.pixel(0, 0).r).collect();
        // +Z, -Z, +X, -X, +Y, -Y
        assert_eq!(tags, vec![4, 5, 0, 1, 2, 3]);
    }

    #[test]
    fn cubemap_missing_face_is_corrupt() {
        let device = SoftwareDevice::new();
        let faces = CubeFace::STORAGE_ORDER[..5]
            .iter()
            .map(|f| {
                (
                    *f,
                    Texture2D {
                        layers: vec![solid(2, 2, [0; 4])],
                    },
                )
            })
            .collect();
        assert!(matches!(
            decode_cubemap(&device, &Cubemap { faces }),
            Err(Error::CorruptContainer(_))
        ));
    }
}
