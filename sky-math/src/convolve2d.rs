//! Gaussian smoothing for grids with undefined samples
//!
//! Undefined samples are stored as NaN. Convolution skips them and
//! renormalizes by the kernel weight that actually landed on defined data,
//! so holes are filled from their neighborhood instead of being dragged
//! toward zero.

use ndarray::Array2;

/// Create a normalized Gaussian kernel with specified size and sigma
///
/// # Arguments
/// * `size` - Size of the kernel (must be odd)
/// * `sigma` - Standard deviation of the Gaussian in pixels
///
/// # Panics
/// * If `size` is even
pub fn gaussian_kernel(size: usize, sigma: f64) -> Array2<f64> {
    assert!(size % 2 == 1, "Kernel size must be odd");

    let center = size as isize / 2;
    let mut kernel = Array2::from_shape_fn((size, size), |(i, j)| {
        let x = j as isize - center;
        let y = i as isize - center;
        (-((x * x + y * y) as f64) / (2.0 * sigma * sigma)).exp()
    });

    let sum: f64 = kernel.sum();
    if sum > 0.0 {
        kernel.mapv_inplace(|x| x / sum);
    }

    kernel
}

/// Odd kernel size covering +-4 sigma, saturating at `usize::MAX`.
pub fn gaussian_kernel_size(sigma: f64) -> usize {
    let half = (4.0 * sigma).ceil().max(1.0) as usize;
    half.saturating_mul(2).saturating_add(1)
}

/// "Same"-mode convolution that ignores NaN samples.
///
/// Each output pixel is the kernel-weighted mean of the defined samples under
/// the kernel footprint. Pixels whose footprint holds no defined sample are
/// NaN in the output.
pub fn convolve_nan_tolerant(image: &Array2<f64>, kernel: &Array2<f64>) -> Array2<f64> {
    let (img_rows, img_cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();
    let pad_rows = (ker_rows / 2) as isize;
    let pad_cols = (ker_cols / 2) as isize;

    Array2::from_shape_fn((img_rows, img_cols), |(i, j)| {
        let mut sum = 0.0;
        let mut weight = 0.0;

        for ki in 0..ker_rows {
            let row = i as isize + ki as isize - pad_rows;
            if row < 0 || row >= img_rows as isize {
                continue;
            }
            for kj in 0..ker_cols {
                let col = j as isize + kj as isize - pad_cols;
                if col < 0 || col >= img_cols as isize {
                    continue;
                }
                let value = image[[row as usize, col as usize]];
                if value.is_nan() {
                    continue;
                }
                let k = kernel[[ki, kj]];
                sum += value * k;
                weight += k;
            }
        }

        if weight > 0.0 {
            sum / weight
        } else {
            f64::NAN
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_kernel() {
        let kernel = gaussian_kernel(3, 1.0);

        assert_relative_eq!(kernel.sum(), 1.0, epsilon = 1e-10);

        // Center should have highest value
        for ((i, j), &v) in kernel.indexed_iter() {
            if (i, j) != (1, 1) {
                assert!(kernel[[1, 1]] > v);
            }
        }
    }

    #[test]
    #[should_panic(expected = "Kernel size must be odd")]
    fn test_even_kernel_rejected() {
        gaussian_kernel(4, 1.0);
    }

    #[test]
    fn test_kernel_size_covers_four_sigma() {
        assert_eq!(gaussian_kernel_size(3.0), 25);
        assert_eq!(gaussian_kernel_size(0.1), 3);
        assert_eq!(gaussian_kernel_size(1e300), usize::MAX);
        assert_eq!(gaussian_kernel_size(f64::INFINITY) % 2, 1);
    }

    #[test]
    fn test_constant_image_is_preserved() {
        let image = Array2::from_elem((7, 7), 2.5);
        let smoothed = convolve_nan_tolerant(&image, &gaussian_kernel(5, 1.0));
        for v in smoothed.iter() {
            assert_relative_eq!(*v, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_holes_are_filled_from_neighbors() {
        let mut image = Array2::from_elem((5, 5), 1.5);
        image[[2, 2]] = f64::NAN;
        image[[0, 4]] = f64::NAN;

        let smoothed = convolve_nan_tolerant(&image, &gaussian_kernel(3, 1.0));
        assert_relative_eq!(smoothed[[2, 2]], 1.5, epsilon = 1e-12);
        assert_relative_eq!(smoothed[[0, 4]], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_all_undefined_footprint_stays_undefined() {
        let image = Array2::from_elem((4, 4), f64::NAN);
        let smoothed = convolve_nan_tolerant(&image, &gaussian_kernel(3, 1.0));
        assert!(smoothed.iter().all(|v| v.is_nan()));
    }
}
