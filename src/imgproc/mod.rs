//! FFT-based spatial filtering engine.
//!
//! Leaf-first: [`matrix`] is the shared representation, [`fft`] the 1D/2D
//! transforms, [`parallel`] the bounded dispatcher they run on, [`kernel`]
//! and [`filters`] the frequency-space operators, [`adapters`] the image
//! boundary, and [`pipeline`] strings them together.

pub mod adapters;
pub mod fft;
pub mod filters;
pub mod kernel;
pub mod matrix;
pub mod parallel;
pub mod pipeline;

pub use adapters::{PaddedMatrix, PaddingMode, image_to_matrix, matrix_to_image};
pub use fft::{fft1d, fft2d, ifft1d, ifft2d};
pub use filters::{apply_convolution, apply_wiener};
pub use kernel::gaussian_kernel;
pub use matrix::{ComplexMatrix, next_pow2};
pub use parallel::{Dispatcher, available_workers};
pub use pipeline::{FilterConfig, FilterMode, Processed, filter_matrix, filter_with_kernel, process_image};
