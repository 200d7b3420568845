//! Geometric picture transforms. All of them return a fresh [`Picture`].

use image::{imageops, ImageBuffer, Rgba, RgbaImage};

use super::{Picture, Pixel};
use crate::error::{Error, Result};

/// Direction for [`Picture::rotate90`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDir {
    Clockwise,
    AntiClockwise,
}

/// Mirror axis for [`Picture::flip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// Mirror left/right.
    Horizontal,
    /// Mirror top/bottom.
    Vertical,
}

impl Picture {
    /// Center-anchored crop. Growing pads with fully transparent pixels,
    /// shrinking truncates.
    ///
    /// # Panics
    /// Panics if either target dimension is zero.
    pub fn crop(&self, width: u32, height: u32) -> Picture {
        assert!(width > 0 && height > 0, "crop target must be non-zero");
        if (width, height) == self.dimensions() {
            return self.clone();
        }

        let origin_x = i64::from(self.width / 2) - i64::from(width / 2);
        let origin_y = i64::from(self.height / 2) - i64::from(height / 2);
        let mut out = Picture::new(width, height, Pixel::TRANSPARENT);
        for y in 0..height {
            let sy = origin_y + i64::from(y);
            if sy < 0 || sy >= i64::from(self.height) {
                continue;
            }
            for x in 0..width {
                let sx = origin_x + i64::from(x);
                if sx >= 0 && sx < i64::from(self.width) {
                    out.set_pixel(x, y, self.pixel(sx as u32, sy as u32));
                }
            }
        }
        out
    }

    pub fn rotate90(&self, dir: RotateDir) -> Picture {
        match dir {
            RotateDir::Clockwise => self.map_buffer(|view| imageops::rotate90(view)),
            RotateDir::AntiClockwise => self.map_buffer(|view| imageops::rotate270(view)),
        }
    }

    pub fn flip(&self, axis: FlipAxis) -> Picture {
        match axis {
            FlipAxis::Horizontal => self.map_buffer(|view| imageops::flip_horizontal(view)),
            FlipAxis::Vertical => self.map_buffer(|view| imageops::flip_vertical(view)),
        }
    }

    /// Run an `imageops` transform over a borrowed view of the pixels.
    fn map_buffer(&self, op: impl FnOnce(&ImageBuffer<Rgba<u8>, &[u8]>) -> RgbaImage) -> Picture {
        let view = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(self.width, self.height, self.as_bytes());
        let Some(view) = view else {
            return self.clone();
        };
        let out = op(&view);
        let (width, height) = out.dimensions();
        let pixels = out
            .as_raw()
            .chunks_exact(4)
            .map(|p| Pixel::new(p[0], p[1], p[2], p[3]))
            .collect();
        Picture {
            width,
            height,
            pixels,
        }
    }

    /// Halve both dimensions with a 2x2 box average.
    ///
    /// A 1x1 picture is returned unchanged. Odd dimensions are only accepted
    /// when they are exactly 1, in which case the picture is a row or column
    /// and pairs are averaged along the other axis.
    pub fn scale_half(&self) -> Result<Picture> {
        let (w, h) = self.dimensions();
        if (w, h) == (1, 1) {
            return Ok(self.clone());
        }
        if (w & 1 == 1 && w != 1) || (h & 1 == 1 && h != 1) {
            return Err(Error::DecodeFailure(format!(
                "cannot halve {w}x{h}: odd dimension other than 1"
            )));
        }

        let nw = (w / 2).max(1);
        let nh = (h / 2).max(1);
        let mut out = Picture::new(nw, nh, Pixel::TRANSPARENT);
        for y in 0..nh {
            for x in 0..nw {
                let taps: &[(u32, u32)] = if w == 1 {
                    &[(0, 2 * y), (0, 2 * y + 1)]
                } else if h == 1 {
                    &[(2 * x, 0), (2 * x + 1, 0)]
                } else {
                    &[
                        (2 * x, 2 * y),
                        (2 * x + 1, 2 * y),
                        (2 * x, 2 * y + 1),
                        (2 * x + 1, 2 * y + 1),
                    ]
                };
                out.set_pixel(x, y, average(self, taps));
            }
        }
        Ok(out)
    }
}

fn average(pic: &Picture, taps: &[(u32, u32)]) -> Pixel {
    let mut sum = [0u32; 4];
    for &(x, y) in taps {
        let p = pic.pixel(x, y);
        sum[0] += u32::from(p.r);
        sum[1] += u32::from(p.g);
        sum[2] += u32::from(p.b);
        sum[3] += u32::from(p.a);
    }
    let n = taps.len() as u32;
    Pixel::new(
        (sum[0] / n) as u8,
        (sum[1] / n) as u8,
        (sum[2] / n) as u8,
        (sum[3] / n) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Pixel = Pixel::rgb(255, 0, 0);
    const B: Pixel = Pixel::rgb(0, 255, 0);

    fn row() -> Picture {
        Picture::from_pixels(2, 1, vec![A, B]).unwrap()
    }

    #[test]
    fn crop_same_size_is_identity() {
        let pic = Picture::from_pixels(2, 2, vec![A, B, B, A]).unwrap();
        assert_eq!(pic.crop(2, 2), pic);
        assert_eq!(pic.crop(2, 2).crop(2, 2), pic);
    }

    #[test]
    fn crop_larger_pads_transparent() {
        let pic = Picture::new(2, 2, Pixel::WHITE);
        let out = pic.crop(4, 4);
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(out.pixel(0, 0), Pixel::TRANSPARENT);
        assert_eq!(out.pixel(1, 1), Pixel::WHITE);
        assert_eq!(out.pixel(2, 2), Pixel::WHITE);
        assert_eq!(out.pixel(3, 3), Pixel::TRANSPARENT);
    }

    #[test]
    fn crop_smaller_keeps_center() {
        let mut pic = Picture::new(5, 5, Pixel::BLACK);
        pic.set_pixel(2, 2, Pixel::WHITE);
        let out = pic.crop(1, 1);
        assert_eq!(out.pixel(0, 0), Pixel::WHITE);
    }

    #[test]
    fn rotate_moves_left_to_top() {
        let cw = row().rotate90(RotateDir::Clockwise);
        assert_eq!(cw.dimensions(), (1, 2));
        assert_eq!(cw.pixel(0, 0), A);
        assert_eq!(cw.pixel(0, 1), B);

        let acw = row().rotate90(RotateDir::AntiClockwise);
        assert_eq!(acw.pixel(0, 0), B);
        assert_eq!(acw.pixel(0, 1), A);
    }

    #[test]
    fn four_rotations_round_trip() {
        let pic = Picture::from_pixels(3, 2, vec![A, B, A, B, B, A]).unwrap();
        let mut out = pic.clone();
        for _ in 0..4 {
            out = out.rotate90(RotateDir::Clockwise);
        }
        assert_eq!(out, pic);
    }

    #[test]
    fn flip_axes() {
        let h = row().flip(FlipAxis::Horizontal);
        assert_eq!(h.pixel(0, 0), B);
        let col = row().rotate90(RotateDir::Clockwise);
        let v = col.flip(FlipAxis::Vertical);
        assert_eq!(v.pixel(0, 0), B);
    }

    #[test]
    fn rotate_swaps_dimensions_of_a_tall_picture() {
        let pic = Picture::from_pixels(2, 3, vec![A, B, B, A, A, A]).unwrap();
        let cw = pic.rotate90(RotateDir::Clockwise);
        assert_eq!(cw.dimensions(), (3, 2));
        // bottom-left source pixel lands top-left
        assert_eq!(cw.pixel(0, 0), A);
        assert_eq!(cw.pixel(2, 0), A);
        assert_eq!(cw.pixel(2, 1), B);
        assert_eq!(cw.rotate90(RotateDir::AntiClockwise), pic);
    }

    #[test]
    fn scale_half_averages() {
        let pic = Picture::from_pixels(
            2,
            2,
            vec![
                Pixel::new(0, 0, 0, 255),
                Pixel::new(100, 0, 0, 255),
                Pixel::new(0, 100, 0, 255),
                Pixel::new(100, 100, 0, 255),
            ],
        )
        .unwrap();
        let half = pic.scale_half().unwrap();
        assert_eq!(half.pixel(0, 0), Pixel::new(50, 50, 0, 255));
    }

    #[test]
    fn scale_half_rejects_odd() {
        assert!(Picture::new(3, 2, Pixel::BLACK).scale_half().is_err());
        assert_eq!(Picture::new(1, 4, Pixel::BLACK).scale_half().unwrap().dimensions(), (1, 2));
    }
}
