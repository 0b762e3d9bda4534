// End-to-end checks of the frequency-domain filtering path through the public API.

use approx::assert_abs_diff_eq;
use fftblur::imgproc::{
    ComplexMatrix, Dispatcher, FilterConfig, PaddingMode, filter_matrix, filter_with_kernel,
    gaussian_kernel, process_image,
};
use image::{DynamicImage, GrayImage, Luma};
use num_complex::Complex64;

fn noise_matrix(h: usize, w: usize, seed: u64) -> ComplexMatrix {
    let mut state = seed;
    let values: Vec<f64> = (0..h * w)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        })
        .collect();
    ComplexMatrix::from_real(h, w, &values).unwrap()
}

#[test]
fn dirac_kernel_is_identity() {
    let d = Dispatcher::new(4).unwrap();
    let image = noise_matrix(16, 8, 11);
    let mut dirac = ComplexMatrix::zeros(16, 8);
    dirac.set(0, 0, Complex64::new(1.0, 0.0));

    let cfg = FilterConfig::blur(1.0).unwrap();
    let out = filter_with_kernel(&image, &dirac, &cfg, &d).unwrap();
    assert!(image.max_abs_diff(&out).unwrap() < 1e-12);
}

#[test]
fn blur_preserves_total_intensity() {
    let d = Dispatcher::new(2).unwrap();
    let image = noise_matrix(32, 32, 5);
    let out = filter_matrix(&image, &FilterConfig::blur(2.0).unwrap(), &d).unwrap();
    assert_abs_diff_eq!(out.real_sum(), image.real_sum(), epsilon = 1e-9);
    for v in out.as_slice() {
        assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn wiener_with_tiny_k_undoes_blur() {
    let d = Dispatcher::new(4).unwrap();
    let image = noise_matrix(8, 8, 99);
    let blurred = filter_matrix(&image, &FilterConfig::blur(0.7).unwrap(), &d).unwrap();
    let restored = filter_matrix(&blurred, &FilterConfig::deblur(0.7, 1e-9).unwrap(), &d).unwrap();
    assert!(image.max_abs_diff(&restored).unwrap() < 1e-6);
}

#[test]
fn wiener_with_huge_k_suppresses_signal() {
    let d = Dispatcher::new(4).unwrap();
    let image = noise_matrix(8, 16, 3);
    let out = filter_matrix(&image, &FilterConfig::deblur(1.0, 1e12).unwrap(), &d).unwrap();
    assert!(out.as_slice().iter().all(|v| v.norm() < 1e-9));
}

#[test]
fn kernel_sum_independent_of_worker_count() {
    let one = gaussian_kernel(64, 32, 3.0, &Dispatcher::new(1).unwrap()).unwrap();
    let many = gaussian_kernel(64, 32, 3.0, &Dispatcher::new(4).unwrap()).unwrap();
    assert_eq!(one, many);
    assert_abs_diff_eq!(one.real_sum(), 1.0, epsilon = 1e-12);
}

#[test]
fn constant_gray_image_stays_gray_with_edge_padding() {
    let d = Dispatcher::new(2).unwrap();
    let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([128])));
    let out = process_image(&img, &FilterConfig::blur(1.0).unwrap(), PaddingMode::Edge, &d).unwrap();

    assert_eq!((out.width, out.height), (3, 3));
    assert_eq!((out.padded_width, out.padded_height), (4, 4));
    assert_eq!(out.image.dimensions(), (3, 3));
    for p in out.image.pixels() {
        assert!((127..=128).contains(&p.0[0]), "got {}", p.0[0]);
    }
}

#[test]
fn zero_padding_darkens_borders() {
    let d = Dispatcher::new(2).unwrap();
    let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([128])));
    let out = process_image(&img, &FilterConfig::blur(1.0).unwrap(), PaddingMode::Zero, &d).unwrap();

    assert_eq!(out.image.dimensions(), (3, 3));
    for p in out.image.pixels() {
        assert!(p.0[0] > 0 && p.0[0] < 128, "got {}", p.0[0]);
    }
    // The centre pixel has the most in-image neighbours.
    let centre = out.image.get_pixel(1, 1).0[0];
    assert!(out.image.pixels().all(|p| p.0[0] <= centre));
}

#[test]
fn deblur_of_blur_recovers_image() {
    let d = Dispatcher::new(4).unwrap();
    let src = GrayImage::from_fn(8, 8, |x, y| Luma([((x * 29 + y * 17) % 200 + 20) as u8]));
    let img = DynamicImage::ImageLuma8(src.clone());

    let blurred = process_image(&img, &FilterConfig::blur(0.6).unwrap(), PaddingMode::Zero, &d).unwrap();
    assert_ne!(blurred.image, src);

    // Quantization of the blurred image limits how exact the inverse can be.
    let restored = process_image(
        &DynamicImage::ImageLuma8(blurred.image),
        &FilterConfig::deblur(0.6, 1e-4).unwrap(),
        PaddingMode::Zero,
        &d,
    )
    .unwrap();
    let mean_err: f64 = src
        .pixels()
        .zip(restored.image.pixels())
        .map(|(a, b)| (a.0[0] as f64 - b.0[0] as f64).abs())
        .sum::<f64>()
        / 64.0;
    assert!(mean_err < 6.0, "mean abs error {mean_err}");
}

#[test]
fn invalid_parameters_never_reach_the_engine() {
    assert!(FilterConfig::blur(0.0).is_err());
    assert!(FilterConfig::deblur(1.0, -1e-3).is_err());
    assert!(Dispatcher::new(0).is_err());
}
