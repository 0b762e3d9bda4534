// ============================================================================
// IMAGE ↔ MATRIX ADAPTERS: luminance in, clipped 8-bit grayscale out
// ============================================================================

use image::{DynamicImage, GrayImage};
use num_complex::Complex64;

use super::matrix::{ComplexMatrix, next_pow2};
use super::parallel::Dispatcher;
use crate::error::{FilterError, Result};

/// How cells outside the source image are filled before the FFT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaddingMode {
    /// Zero luminance. Produces dark borders after circular convolution.
    #[default]
    Zero,
    /// Repeat the nearest in-bounds pixel.
    Edge,
}

impl PaddingMode {
    pub fn name(self) -> &'static str {
        match self {
            PaddingMode::Zero => "zero",
            PaddingMode::Edge => "edge",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "zero" => Some(PaddingMode::Zero),
            "edge" => Some(PaddingMode::Edge),
            _ => None,
        }
    }
}

/// Luminance matrix plus the original and padded dimensions.
#[derive(Clone, Debug)]
pub struct PaddedMatrix {
    pub matrix: ComplexMatrix,
    pub width: usize,
    pub height: usize,
    pub padded_width: usize,
    pub padded_height: usize,
}

/// Rec. 601 luma from 16-bit channels, scaled to `[0, 1]`.
#[inline]
pub fn luminance(r: u16, g: u16, b: u16) -> f64 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / u16::MAX as f64
}

/// Scale a 16-bit channel by a 16-bit alpha, so transparent pixels read as black.
#[inline]
pub fn premultiply(channel: u16, alpha: u16) -> u16 {
    (channel as u32 * alpha as u32 / u16::MAX as u32) as u16
}

/// Convert `img` to a luminance matrix padded to power-of-two dimensions.
/// Channels are premultiplied by alpha before the luma weights apply.
/// 8-bit sources are widened first so every depth maps onto the same
/// `[0, 1]` scale.
pub fn image_to_matrix(
    img: &DynamicImage,
    padding: PaddingMode,
    dispatcher: &Dispatcher,
) -> Result<PaddedMatrix> {
    let rgba = img.to_rgba16();
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);
    if width == 0 || height == 0 {
        return Err(FilterError::EmptyInput);
    }
    let (padded_width, padded_height) = (next_pow2(width), next_pow2(height));

    let mut matrix = ComplexMatrix::zeros(padded_height, padded_width);
    dispatcher.for_each_row(matrix.as_mut_slice(), padded_width, |y, row| {
        let sy = match padding {
            PaddingMode::Zero if y >= height => return Ok(()),
            PaddingMode::Zero => y,
            PaddingMode::Edge => y.min(height - 1),
        };
        for (x, cell) in row.iter_mut().enumerate() {
            let sx = match padding {
                PaddingMode::Zero if x >= width => break,
                PaddingMode::Zero => x,
                PaddingMode::Edge => x.min(width - 1),
            };
            let [r, g, b, a] = rgba.get_pixel(sx as u32, sy as u32).0;
            let lum = luminance(premultiply(r, a), premultiply(g, a), premultiply(b, a));
            *cell = Complex64::new(lum, 0.0);
        }
        Ok(())
    })?;

    Ok(PaddedMatrix {
        matrix,
        width,
        height,
        padded_width,
        padded_height,
    })
}

/// Map one spatial value to an 8-bit level: clamp to `[0, 1]`, scale by 255,
/// truncate toward zero. NaN maps to 0.
#[inline]
pub fn to_gray_level(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Read the top-left `height × width` region of `matrix` back into a
/// grayscale image.
pub fn matrix_to_image(
    matrix: &ComplexMatrix,
    width: usize,
    height: usize,
    dispatcher: &Dispatcher,
) -> Result<GrayImage> {
    if width > matrix.width() || height > matrix.height() {
        return Err(FilterError::DimensionMismatch {
            expected: (height, width),
            actual: matrix.dims(),
        });
    }
    let mut buf = vec![0u8; width * height];
    dispatcher.for_each_row(&mut buf, width, |y, out| {
        for (o, v) in out.iter_mut().zip(matrix.row(y)) {
            *o = to_gray_level(v.re);
        }
        Ok(())
    })?;
    GrayImage::from_raw(width as u32, height as u32, buf).ok_or(FilterError::DimensionMismatch {
        expected: (height, width),
        actual: matrix.dims(),
    })
}
