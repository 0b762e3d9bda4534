// ============================================================================
// FILTER PIPELINE: image → padded matrix → FFT → filter → IFFT → image
// ============================================================================
//
// The single entry point shared by the local CLI and the network service.

use std::time::{Duration, Instant};

use image::{DynamicImage, GrayImage};

use super::adapters::{PaddingMode, image_to_matrix, matrix_to_image};
use super::fft::{fft2d, ifft2d};
use super::filters::{apply_convolution, apply_wiener, validate_k};
use super::kernel::{gaussian_kernel, validate_sigma};
use super::matrix::ComplexMatrix;
use super::parallel::Dispatcher;
use crate::error::Result;

/// Which linear filter to apply in frequency space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    /// Gaussian low-pass convolution.
    Blur,
    /// Wiener deconvolution against the same Gaussian.
    Deblur,
}

impl FilterMode {
    /// `"blur"` selects [`FilterMode::Blur`]; any other action deblurs.
    pub fn from_action(action: &str) -> Self {
        if action == "blur" {
            FilterMode::Blur
        } else {
            FilterMode::Deblur
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            FilterMode::Blur => "blur",
            FilterMode::Deblur => "deblur",
        }
    }
}

/// Validated parameters of one job. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterConfig {
    mode: FilterMode,
    sigma: f64,
    k: f64,
}

impl FilterConfig {
    /// Fails unless `sigma > 0` and `k >= 0` (both finite). `k` is checked in
    /// blur mode too so a config never carries a value it would reject later.
    pub fn new(mode: FilterMode, sigma: f64, k: f64) -> Result<Self> {
        validate_sigma(sigma)?;
        validate_k(k)?;
        Ok(Self { mode, sigma, k })
    }

    pub fn blur(sigma: f64) -> Result<Self> {
        Self::new(FilterMode::Blur, sigma, 0.0)
    }

    pub fn deblur(sigma: f64, k: f64) -> Result<Self> {
        Self::new(FilterMode::Deblur, sigma, k)
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn k(&self) -> f64 {
        self.k
    }
}

/// Result of one pipeline run plus the numbers the CLI reports.
#[derive(Clone, Debug)]
pub struct Processed {
    pub image: GrayImage,
    pub width: usize,
    pub height: usize,
    pub padded_width: usize,
    pub padded_height: usize,
    pub elapsed: Duration,
}

/// Filter an already padded, power-of-two luminance matrix and return the
/// spatial result at the same padded size.
pub fn filter_matrix(
    matrix: &ComplexMatrix,
    config: &FilterConfig,
    dispatcher: &Dispatcher,
) -> Result<ComplexMatrix> {
    let kernel = gaussian_kernel(matrix.width(), matrix.height(), config.sigma, dispatcher)?;
    filter_with_kernel(matrix, &kernel, config, dispatcher)
}

/// Same as [`filter_matrix`] with a caller-supplied, already shift-centered kernel.
pub fn filter_with_kernel(
    matrix: &ComplexMatrix,
    kernel: &ComplexMatrix,
    config: &FilterConfig,
    dispatcher: &Dispatcher,
) -> Result<ComplexMatrix> {
    matrix.ensure_same_dims(kernel)?;

    let fft_image = fft2d(matrix, dispatcher)?;
    let fft_kernel = fft2d(kernel, dispatcher)?;

    let filtered = match config.mode {
        FilterMode::Blur => apply_convolution(&fft_image, &fft_kernel, dispatcher)?,
        FilterMode::Deblur => apply_wiener(&fft_image, &fft_kernel, config.k, dispatcher)?,
    };

    ifft2d(&filtered, dispatcher)
}

/// Run the full pipeline on a decoded image.
pub fn process_image(
    img: &DynamicImage,
    config: &FilterConfig,
    padding: PaddingMode,
    dispatcher: &Dispatcher,
) -> Result<Processed> {
    let start = Instant::now();

    let padded = image_to_matrix(img, padding, dispatcher)?;
    log_info!(
        "{}: {}x{} padded to {}x{} (sigma {}, k {}, {} workers)",
        config.mode.action(),
        padded.width,
        padded.height,
        padded.padded_width,
        padded.padded_height,
        config.sigma,
        config.k,
        dispatcher.workers()
    );

    let spatial = filter_matrix(&padded.matrix, config, dispatcher)?;
    let image = matrix_to_image(&spatial, padded.width, padded.height, dispatcher)?;

    let elapsed = start.elapsed();
    log_info!(
        "{} finished in {:.1}ms",
        config.mode.action(),
        elapsed.as_secs_f64() * 1000.0
    );

    Ok(Processed {
        image,
        width: padded.width,
        height: padded.height,
        padded_width: padded.padded_width,
        padded_height: padded.padded_height,
        elapsed,
    })
}
