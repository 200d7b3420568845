//! Filtered resampling on top of `fast_image_resize`.
//!
//! Pixels are handed to the resizer as a borrowed `U8x4` view, so the only
//! copy is the destination buffer.

use fast_image_resize as fir;
use serde::{Deserialize, Serialize};

use super::{Picture, Pixel};
use crate::error::{Error, Result};

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    Box,
    #[default]
    Bilinear,
    Bicubic,
    Quadratic,
    Hamming,
}

impl Filter {
    pub const ALL: [Filter; 6] = [
        Filter::Nearest,
        Filter::Box,
        Filter::Bilinear,
        Filter::Bicubic,
        Filter::Quadratic,
        Filter::Hamming,
    ];

    fn algorithm(self) -> fir::ResizeAlg {
        let convolution = |filter| fir::ResizeAlg::Convolution(filter);
        match self {
            Filter::Nearest => fir::ResizeAlg::Nearest,
            Filter::Box => convolution(fir::FilterType::Box),
            Filter::Bilinear => convolution(fir::FilterType::Bilinear),
            Filter::Bicubic => convolution(fir::FilterType::CatmullRom),
            Filter::Hamming => convolution(fir::FilterType::Hamming),
            Filter::Quadratic => match fir::Filter::new("quadratic", quadratic, 1.5) {
                Ok(kernel) => convolution(fir::FilterType::Custom(kernel)),
                Err(_) => convolution(fir::FilterType::Bilinear),
            },
        }
    }
}

/// Quadratic B-spline, support 1.5.
fn quadratic(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 0.5 {
        0.75 - ax * ax
    } else if ax < 1.5 {
        let t = ax - 1.5;
        0.5 * t * t
    } else {
        0.0
    }
}

impl Picture {
    /// Resample to `width` x `height` with `filter`.
    ///
    /// # Errors
    /// [`Error::DecodeFailure`] for a zero target dimension or when the
    /// resizer rejects the buffers.
    pub fn resample(&self, width: u32, height: u32, filter: Filter) -> Result<Picture> {
        if width == 0 || height == 0 {
            return Err(Error::DecodeFailure(format!(
                "cannot resample to {width}x{height}"
            )));
        }
        if (width, height) == self.dimensions() {
            return Ok(self.clone());
        }

        let src = fir::images::ImageRef::new(
            self.width,
            self.height,
            self.as_bytes(),
            fir::PixelType::U8x4,
        )
        .map_err(|e| Error::DecodeFailure(format!("resample source: {e}")))?;
        let mut dst = fir::images::Image::new(width, height, fir::PixelType::U8x4);
        let options = fir::ResizeOptions::new().resize_alg(filter.algorithm());
        fir::Resizer::new()
            .resize(&src, &mut dst, Some(&options))
            .map_err(|e| Error::DecodeFailure(format!("resample to {width}x{height}: {e}")))?;

        let pixels = dst
            .buffer()
            .chunks_exact(4)
            .map(|p| Pixel::new(p[0], p[1], p[2], p[3]))
            .collect();
        Ok(Picture {
            width,
            height,
            pixels,
        })
    }
}
