//! sky-math - Numerical primitives for flat-sky map analysis
//!
//! This crate provides the domain-agnostic numerics used by the spectral
//! estimators in `xspec`:
//!
//! - **FFT** - 2-D forward/inverse transforms, `fftshift`, DFT frequency indices
//! - **Statistics** - Means, standard errors and column statistics of ensembles
//! - **Convolution** - Gaussian smoothing that tolerates undefined samples
//! - **Lookup** - Nearest-sample lookup over sorted tables
//!
//! # Example
//!
//! ```
//! use ndarray::Array2;
//! use sky_math::{fft2, ifft2};
//!
//! let field = Array2::from_shape_fn((8, 8), |(r, c)| (r + 2 * c) as f64);
//! let round_trip = ifft2(&fft2(&field));
//! assert!((round_trip[[3, 5]].re - field[[3, 5]]).abs() < 1e-9);
//! ```

pub mod convolve2d;
pub mod fft2;
pub mod lookup;
pub mod stats;

// Re-export commonly used types
pub use convolve2d::{convolve_nan_tolerant, gaussian_kernel, gaussian_kernel_size};
pub use fft2::{fft2, fft_indices, fftshift, ifft2};
pub use lookup::{LookupError, Nearest, NearestLookup};
pub use stats::{column_mean_and_std, mean, mean_and_standard_error, std_dev};
