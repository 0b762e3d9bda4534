// ============================================================================
// GAUSSIAN KERNEL SYNTHESIS: normalized PSF, circularly shifted to (0,0)
// ============================================================================

use num_complex::Complex64;

use super::matrix::ComplexMatrix;
use super::parallel::Dispatcher;
use crate::error::{FilterError, Result};

/// Reject non-finite or non-positive spreads.
pub fn validate_sigma(sigma: f64) -> Result<()> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidSigma(sigma))
    }
}

/// Build a `height × width` Gaussian point-spread function.
///
/// Values are `exp(-((x-cx)² + (y-cy)²) / 2σ²)` around the grid centre
/// `(width/2, height/2)`, normalized to sum 1, then shifted with wraparound so
/// the peak lands on `(0, 0)`. If every value underflows to zero the sum is
/// taken as 1 and an all-zero kernel is returned.
pub fn gaussian_kernel(
    width: usize,
    height: usize,
    sigma: f64,
    dispatcher: &Dispatcher,
) -> Result<ComplexMatrix> {
    validate_sigma(sigma)?;
    if width == 0 || height == 0 {
        return Err(FilterError::EmptyInput);
    }

    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let two_s2 = 2.0 * sigma * sigma;

    // Per-row values and partial sums in parallel, reduced sequentially below.
    let rows: Vec<(Vec<f64>, f64)> = dispatcher.map(height, |y| {
        let dy = y as f64 - cy;
        let mut local_sum = 0.0;
        let row: Vec<f64> = (0..width)
            .map(|x| {
                let dx = x as f64 - cx;
                let v = (-(dx * dx + dy * dy) / two_s2).exp();
                local_sum += v;
                v
            })
            .collect();
        Ok((row, local_sum))
    })?;

    let mut sum: f64 = rows.iter().map(|(_, s)| s).sum();
    if sum == 0.0 {
        log_warn!(
            "gaussian kernel {}x{} with sigma {} underflowed to zero; skipping normalization",
            width, height, sigma
        );
        sum = 1.0;
    }

    // Destination (sy, sx) receives source ((sy - h/2) mod h, (sx - w/2) mod w),
    // the inverse of placing (y, x) at ((y + h/2) mod h, (x + w/2) mod w).
    let mut kernel = ComplexMatrix::zeros(height, width);
    let (half_w, half_h) = (width / 2, height / 2);
    dispatcher.for_each_row(kernel.as_mut_slice(), width, |sy, out| {
        let src = &rows[(sy + height - half_h) % height].0;
        for (sx, cell) in out.iter_mut().enumerate() {
            *cell = Complex64::new(src[(sx + width - half_w) % width] / sum, 0.0);
        }
        Ok(())
    })?;

    Ok(kernel)
}
