//! Composite pictures built from a container's sub-images.

use crate::error::{Error, Result};
use crate::picture::{Picture, Pixel};

/// Cell of each face in the cross, in face units, for faces given in
/// display order (+Z, -Z, +X, -X, +Y, -Y). Row 0 is the top of the canvas.
const CROSS_CELLS: [(u32, u32); 6] = [(1, 1), (3, 1), (2, 1), (0, 1), (1, 2), (1, 0)];

/// Lay six equally sized faces out on a 4x3 cross. Cells without a face are
/// fully transparent.
pub fn cubemap_cross(faces: &[Picture]) -> Result<Picture> {
    let [first, ..] = faces else {
        return Err(Error::CorruptContainer("cubemap cross needs 6 faces, got 0".into()));
    };
    if faces.len() != 6 {
        return Err(Error::CorruptContainer(format!(
            "cubemap cross needs 6 faces, got {}",
            faces.len()
        )));
    }
    let (fw, fh) = first.dimensions();
    if let Some(odd) = faces.iter().find(|f| f.dimensions() != (fw, fh)) {
        return Err(Error::CorruptContainer(format!(
            "cubemap faces differ in size: {fw}x{fh} and {}x{}",
            odd.width(),
            odd.height()
        )));
    }

    let mut canvas = Picture::new(4 * fw, 3 * fh, Pixel::TRANSPARENT);
    for (face, (col, row)) in faces.iter().zip(CROSS_CELLS) {
        canvas.blit(face, col * fw, row * fh);
    }
    Ok(canvas)
}

/// Put mip levels side by side, largest on the left, all top-aligned.
pub fn mipmap_strip(levels: &[Picture]) -> Result<Picture> {
    let [base, ..] = levels else {
        return Err(Error::CorruptContainer("mipmap strip needs at least one level".into()));
    };
    let width: u32 = levels.iter().map(Picture::width).sum();
    let mut canvas = Picture::new(width, base.height(), Pixel::TRANSPARENT);
    let mut x = 0;
    for level in levels {
        canvas.blit(level, x, 0);
        x += level.width();
    }
    Ok(canvas)
}
