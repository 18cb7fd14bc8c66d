//! Two-dimensional discrete Fourier transforms over `ndarray` grids.
//!
//! Thin wrappers around `rustfft` that transform rows then columns. The
//! forward transform is unnormalized and the inverse carries the full
//! `1/(rows*cols)` factor, so `ifft2(fft2(x)) == x` up to rounding.
//!
//! Frequency coordinates follow the usual DFT bin layout: index `k` holds
//! frequency `k` for `k <= n/2` and `k - n` above it (see [`fft_indices`]).

use std::cell::RefCell;
use std::sync::Arc;

use ndarray::{Array2, Axis};
use rustfft::{num_complex::Complex64, Fft, FftDirection, FftPlanner};

thread_local! {
    // The planner memoizes plans by length and direction
    static PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Row and column plans for a `(rows, cols)` grid, shared across calls on this thread.
fn plans(
    rows: usize,
    cols: usize,
    direction: FftDirection,
) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
    PLANNER.with(|planner| {
        let mut planner = planner.borrow_mut();
        (
            planner.plan_fft(cols, direction),
            planner.plan_fft(rows, direction),
        )
    })
}

/// Apply a 1-D transform of the given direction along both axes in place.
fn transform_in_place(data: &mut Array2<Complex64>, direction: FftDirection) {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return;
    }

    let (row_fft, col_fft) = plans(rows, cols, direction);

    // Rows of a standard-layout array are contiguous
    let mut scratch = vec![Complex64::new(0.0, 0.0); cols.max(rows)];
    for mut row in data.axis_iter_mut(Axis(0)) {
        for (dst, src) in scratch.iter_mut().zip(row.iter()) {
            *dst = *src;
        }
        row_fft.process(&mut scratch[..cols]);
        for (dst, src) in row.iter_mut().zip(scratch.iter()) {
            *dst = *src;
        }
    }

    for mut col in data.axis_iter_mut(Axis(1)) {
        for (dst, src) in scratch.iter_mut().zip(col.iter()) {
            *dst = *src;
        }
        col_fft.process(&mut scratch[..rows]);
        for (dst, src) in col.iter_mut().zip(scratch.iter()) {
            *dst = *src;
        }
    }
}

/// Forward 2-D DFT of a real grid (unnormalized).
pub fn fft2(input: &Array2<f64>) -> Array2<Complex64> {
    let mut data = input.mapv(|v| Complex64::new(v, 0.0));
    transform_in_place(&mut data, FftDirection::Forward);
    data
}

/// Inverse 2-D DFT, normalized by `1/(rows*cols)`.
pub fn ifft2(input: &Array2<Complex64>) -> Array2<Complex64> {
    let (rows, cols) = input.dim();
    let mut data = input.to_owned();
    transform_in_place(&mut data, FftDirection::Inverse);

    if rows > 0 && cols > 0 {
        let norm = 1.0 / (rows * cols) as f64;
        data.mapv_inplace(|v| v * norm);
    }
    data
}

/// Shift the zero-frequency bin to the center of the grid.
///
/// Bin `(0, 0)` moves to `(rows/2, cols/2)` using integer division, matching
/// the convention for both even and odd sizes.
pub fn fftshift<T: Clone>(input: &Array2<T>) -> Array2<T> {
    let (rows, cols) = input.dim();
    let (shift_r, shift_c) = (rows / 2, cols / 2);

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let src_r = (r + rows - shift_r) % rows;
        let src_c = (c + cols - shift_c) % cols;
        input[[src_r, src_c]].clone()
    })
}

/// Signed integer frequency of every DFT bin for a transform of length `n`.
///
/// Runs `0, 1, ..., n/2` and then the negative frequencies up to `-1`, e.g.
/// `[0, 1, 2, 3, -2, -1]` for `n = 6` and `[0, 1, 2, -2, -1]` for `n = 5`.
pub fn fft_indices(n: usize) -> Vec<i64> {
    let n_i = n as i64;
    (0..n_i)
        .map(|k| if k <= n_i / 2 { k } else { k - n_i })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rustfft::{Direction, Length};

    #[test]
    fn test_fft_indices_even_and_odd() {
        assert_eq!(fft_indices(6), vec![0, 1, 2, 3, -2, -1]);
        assert_eq!(fft_indices(5), vec![0, 1, 2, -2, -1]);
        assert_eq!(fft_indices(1), vec![0]);
    }

    #[test]
    fn test_fft2_of_delta_is_flat() {
        let mut input = Array2::zeros((4, 4));
        input[[0, 0]] = 1.0;

        let spectrum = fft2(&input);
        for value in spectrum.iter() {
            assert_abs_diff_eq!(value.re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(value.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fft2_dc_is_sum() {
        let input = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let spectrum = fft2(&input);
        assert_abs_diff_eq!(spectrum[[0, 0]].re, 45.0, epsilon = 1e-10);
        assert_abs_diff_eq!(spectrum[[0, 0]].im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_inverse_recovers_input() {
        let input = Array2::from_shape_fn((6, 6), |(r, c)| (r * 7 + c * 3) as f64 % 5.0 - 2.0);
        let recovered = ifft2(&fft2(&input));
        for (a, b) in input.iter().zip(recovered.iter()) {
            assert_abs_diff_eq!(*a, b.re, epsilon = 1e-10);
            assert_abs_diff_eq!(b.im, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_plans_are_reused() {
        let (row_a, col_a) = plans(8, 6, FftDirection::Forward);
        let (row_b, col_b) = plans(8, 6, FftDirection::Forward);
        assert!(Arc::ptr_eq(&row_a, &row_b));
        assert!(Arc::ptr_eq(&col_a, &col_b));
        assert_eq!(row_a.len(), 6);
        assert_eq!(col_a.len(), 8);

        let (inverse, _) = plans(8, 6, FftDirection::Inverse);
        assert_eq!(inverse.fft_direction(), FftDirection::Inverse);
        assert!(!Arc::ptr_eq(&row_a, &inverse));
    }

    #[test]
    fn test_fftshift_moves_origin_to_center() {
        let mut even = Array2::zeros((4, 4));
        even[[0, 0]] = 1.0;
        assert_eq!(fftshift(&even)[[2, 2]], 1.0);

        let mut odd = Array2::zeros((5, 5));
        odd[[0, 0]] = 1.0;
        assert_eq!(fftshift(&odd)[[2, 2]], 1.0);

        let input = array![[0, 1, 2], [3, 4, 5], [6, 7, 8]];
        assert_eq!(fftshift(&input), array![[8, 6, 7], [2, 0, 1], [5, 3, 4]]);
    }
}
