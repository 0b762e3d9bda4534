// ============================================================================
// COMPLEX MATRIX: row-major grid shared by every stage of the pipeline
// ============================================================================

use num_complex::Complex64;

use crate::error::{FilterError, Result};

/// Smallest power of two that is `>= n` (and at least 1).
pub fn next_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Rectangular `height × width` grid of complex values stored row-major in a
/// single buffer, so a row is always a contiguous `width`-long slice.
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexMatrix {
    width: usize,
    height: usize,
    data: Vec<Complex64>,
}

impl ComplexMatrix {
    /// All-zero matrix.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Complex64::new(0.0, 0.0); width * height],
        }
    }

    /// Wrap an existing row-major buffer. Fails if the buffer is not exactly
    /// `height * width` long.
    pub fn from_vec(height: usize, width: usize, data: Vec<Complex64>) -> Result<Self> {
        if data.len() != width * height {
            return Err(FilterError::JaggedMatrix {
                rows: height,
                width,
                expected: width * height,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Build from nested rows. Every row must have the same length as the first.
    pub fn from_rows(rows: Vec<Vec<Complex64>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(width * height);
        for row in rows {
            if row.len() != width {
                return Err(FilterError::JaggedMatrix {
                    rows: height,
                    width,
                    expected: width * height,
                    actual: data.len() + row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self { width, height, data })
    }

    /// Real-valued grid (imaginary parts zero).
    pub fn from_real(height: usize, width: usize, values: &[f64]) -> Result<Self> {
        let data = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        Self::from_vec(height, width, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(height, width)`, the order used in dimension errors.
    pub fn dims(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, y: usize, x: usize) -> Complex64 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, y: usize, x: usize, value: Complex64) {
        self.data[y * self.width + x] = value;
    }

    pub fn row(&self, y: usize) -> &[Complex64] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [Complex64] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    /// Copy into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<Complex64>> {
        if self.width == 0 {
            return vec![Vec::new(); self.height];
        }
        self.data.chunks(self.width).map(<[Complex64]>::to_vec).collect()
    }

    /// Sum of the real parts of every cell.
    pub fn real_sum(&self) -> f64 {
        self.data.iter().map(|c| c.re).sum()
    }

    /// Swap rows and columns: cell `(y, x)` moves to `(x, y)`.
    pub fn transpose(&self) -> ComplexMatrix {
        let mut out = ComplexMatrix::zeros(self.width, self.height);
        for y in 0..self.height {
            let src = self.row(y);
            for (x, &v) in src.iter().enumerate() {
                out.data[x * self.height + y] = v;
            }
        }
        out
    }

    /// Fail with [`FilterError::DimensionMismatch`] unless `other` has the same shape.
    pub fn ensure_same_dims(&self, other: &ComplexMatrix) -> Result<()> {
        if self.dims() != other.dims() {
            return Err(FilterError::DimensionMismatch {
                expected: self.dims(),
                actual: other.dims(),
            });
        }
        Ok(())
    }

    /// Largest absolute difference between two same-shaped matrices.
    pub fn max_abs_diff(&self, other: &ComplexMatrix) -> Result<f64> {
        self.ensure_same_dims(other)?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max))
    }
}
