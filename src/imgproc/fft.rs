// ============================================================================
// FFT ENGINE: recursive radix-2 Cooley-Tukey, 1D and separable 2D
// ============================================================================
//
// Convention: the forward transform is unscaled, the inverse divides by N.
// The inverse reuses the forward path as conj → FFT → conj → / N.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::matrix::ComplexMatrix;
use super::parallel::Dispatcher;
use crate::error::{FilterError, Result};

/// Transform direction for the row passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

/// Forward 1D FFT. `data.len()` must be a non-zero power of two; a length-1
/// sequence is returned unchanged.
pub fn fft1d(data: &[Complex64]) -> Result<Vec<Complex64>> {
    check_length(data.len())?;
    Ok(fft_recursive(data))
}

/// Inverse 1D FFT, scaled by `1/N`.
pub fn ifft1d(data: &[Complex64]) -> Result<Vec<Complex64>> {
    check_length(data.len())?;
    Ok(ifft_unchecked(data))
}

fn check_length(len: usize) -> Result<()> {
    if len == 0 {
        return Err(FilterError::EmptyInput);
    }
    if !len.is_power_of_two() {
        return Err(FilterError::NotPowerOfTwo { len });
    }
    Ok(())
}

/// Split into even/odd halves, transform each, recombine with the twiddle
/// factor `exp(-2πi·k/N)`. Recursion depth is `log2(N)`.
fn fft_recursive(data: &[Complex64]) -> Vec<Complex64> {
    let n = data.len();
    if n <= 1 {
        return data.to_vec();
    }

    let half = n / 2;
    let even: Vec<Complex64> = data.iter().step_by(2).copied().collect();
    let odd: Vec<Complex64> = data.iter().skip(1).step_by(2).copied().collect();
    let even = fft_recursive(&even);
    let odd = fft_recursive(&odd);

    let mut out = vec![Complex64::new(0.0, 0.0); n];
    for k in 0..half {
        let twiddle = Complex64::from_polar(1.0, -2.0 * PI * k as f64 / n as f64);
        let t = twiddle * odd[k];
        out[k] = even[k] + t;
        out[k + half] = even[k] - t;
    }
    out
}

fn ifft_unchecked(data: &[Complex64]) -> Vec<Complex64> {
    let n = data.len() as f64;
    let conj: Vec<Complex64> = data.iter().map(Complex64::conj).collect();
    fft_recursive(&conj)
        .into_iter()
        .map(|v| v.conj() / n)
        .collect()
}

fn transform_line(line: &[Complex64], direction: Direction) -> Vec<Complex64> {
    match direction {
        Direction::Forward => fft_recursive(line),
        Direction::Inverse => ifft_unchecked(line),
    }
}

/// Forward 2D FFT: rows, transpose, rows (the original columns), transpose back.
pub fn fft2d(matrix: &ComplexMatrix, dispatcher: &Dispatcher) -> Result<ComplexMatrix> {
    transform2d(matrix, Direction::Forward, dispatcher)
}

/// Inverse 2D FFT, scaled by `1/(H·W)` overall.
pub fn ifft2d(matrix: &ComplexMatrix, dispatcher: &Dispatcher) -> Result<ComplexMatrix> {
    transform2d(matrix, Direction::Inverse, dispatcher)
}

pub fn transform2d(
    matrix: &ComplexMatrix,
    direction: Direction,
    dispatcher: &Dispatcher,
) -> Result<ComplexMatrix> {
    check_length(matrix.width())?;
    check_length(matrix.height())?;

    let rows_done = transform_rows(matrix.clone(), direction, dispatcher)?;
    let cols_done = transform_rows(rows_done.transpose(), direction, dispatcher)?;
    Ok(cols_done.transpose())
}

/// Transform every row in place, one unit of work per row.
fn transform_rows(
    mut matrix: ComplexMatrix,
    direction: Direction,
    dispatcher: &Dispatcher,
) -> Result<ComplexMatrix> {
    let width = matrix.width();
    dispatcher.for_each_row(matrix.as_mut_slice(), width, |_, row| {
        let out = transform_line(row, direction);
        row.copy_from_slice(&out);
        Ok(())
    })?;
    Ok(matrix)
}
