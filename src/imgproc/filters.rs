// ============================================================================
// FREQUENCY-DOMAIN FILTERS: convolution (blur) and Wiener deconvolution
// ============================================================================

use num_complex::Complex64;

use super::matrix::ComplexMatrix;
use super::parallel::Dispatcher;
use crate::error::{FilterError, Result};

/// Reject non-finite or negative Wiener constants.
pub fn validate_k(k: f64) -> Result<()> {
    if k.is_finite() && k >= 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidK(k))
    }
}

/// Pointwise product of two spectra, i.e. circular convolution in space.
pub fn apply_convolution(
    image: &ComplexMatrix,
    kernel: &ComplexMatrix,
    dispatcher: &Dispatcher,
) -> Result<ComplexMatrix> {
    image.ensure_same_dims(kernel)?;
    let mut output = ComplexMatrix::zeros(image.height(), image.width());
    let width = output.width();
    dispatcher.for_each_row(output.as_mut_slice(), width, |y, out| {
        for ((o, &g), &h) in out.iter_mut().zip(image.row(y)).zip(kernel.row(y)) {
            *o = g * h;
        }
        Ok(())
    })?;
    Ok(output)
}

/// Wiener deconvolution: `G·conj(H) / (|H|² + k)` per cell.
///
/// A cell whose denominator is exactly zero (`k == 0` and `H == 0`) carries
/// no recoverable signal and is written as zero instead of NaN.
pub fn apply_wiener(
    image: &ComplexMatrix,
    kernel: &ComplexMatrix,
    k: f64,
    dispatcher: &Dispatcher,
) -> Result<ComplexMatrix> {
    validate_k(k)?;
    image.ensure_same_dims(kernel)?;
    let mut output = ComplexMatrix::zeros(image.height(), image.width());
    let width = output.width();
    dispatcher.for_each_row(output.as_mut_slice(), width, |y, out| {
        for ((o, &g), &h) in out.iter_mut().zip(image.row(y)).zip(kernel.row(y)) {
            *o = wiener_cell(g, h, k);
        }
        Ok(())
    })?;
    Ok(output)
}

#[inline]
fn wiener_cell(g: Complex64, h: Complex64, k: f64) -> Complex64 {
    let den = h.norm_sqr() + k;
    if den == 0.0 {
        return Complex64::new(0.0, 0.0);
    }
    g * h.conj() / den
}
