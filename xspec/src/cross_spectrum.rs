//! FFT-based cross power spectrum of two flat-sky maps.
//!
//! Both maps are scaled by the solid angle of one pixel, transformed, and
//! combined as `|F_a·conj(F_b) + F_b·conj(F_a)|`. The symmetrized product is
//! real and non-negative by construction. The result keeps the input shape,
//! with the zero-frequency bin shifted to `(N/2, N/2)`.

use ndarray::Zip;
use sky_math::fft2::{fft2, fftshift};
use thiserror::Error;

use crate::field::{ensure_same_shape, square_side, Field, ShapeError};

/// Errors from spectrum estimation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpectrumError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("map {which} is flagged as a binary mask but holds values other than 0 and 1")]
    NotBinary { which: char },

    #[error("field of view must be finite and positive, got {0} degrees")]
    InvalidFieldOfView(f64),
}

/// Physical and semantic description of the two inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossSpectrumOptions {
    /// Side of the square map in degrees
    pub fov_deg: f64,
    /// First map is a binary (0/1) mask
    pub a_is_mask: bool,
    /// Second map is a binary (0/1) mask
    pub b_is_mask: bool,
}

impl Default for CrossSpectrumOptions {
    fn default() -> Self {
        Self {
            fov_deg: 2.0,
            a_is_mask: false,
            b_is_mask: false,
        }
    }
}

impl CrossSpectrumOptions {
    pub fn with_fov(fov_deg: f64) -> Self {
        Self {
            fov_deg,
            ..Self::default()
        }
    }
}

/// Solid angle of one pixel in steradians for an N×N map spanning `fov_deg`.
pub fn steradians_per_pixel(fov_deg: f64, side: usize) -> f64 {
    let pixel_rad = fov_deg.to_radians() / side as f64;
    pixel_rad * pixel_rad
}

/// Expected auto-spectrum of unit-variance white noise at every frequency.
///
/// Each DFT coefficient of N² unit-variance samples has `E|F|² = N²`; pixel
/// scaling and the symmetrized product add `2·Ω²`.
pub fn unit_power_normalization(fov_deg: f64, side: usize) -> f64 {
    let omega = steradians_per_pixel(fov_deg, side);
    2.0 * omega * omega * (side * side) as f64
}

fn ensure_binary(field: &Field, which: char) -> Result<(), SpectrumError> {
    if field.iter().all(|&v| v == 0.0 || v == 1.0) {
        Ok(())
    } else {
        Err(SpectrumError::NotBinary { which })
    }
}

/// Symmetrized cross power spectrum of `map_a` and `map_b`.
///
/// With `map_b = None` this is the auto-spectrum of `map_a`.
///
/// # Errors
/// * [`SpectrumError::Shape`] if a map is not square or the maps differ in shape
/// * [`SpectrumError::NotBinary`] if a map flagged as a mask holds other values
/// * [`SpectrumError::InvalidFieldOfView`] for a non-positive field of view
pub fn cross_spectrum(
    map_a: &Field,
    map_b: Option<&Field>,
    options: &CrossSpectrumOptions,
) -> Result<Field, SpectrumError> {
    let side = square_side(map_a)?;
    if let Some(b) = map_b {
        ensure_same_shape(map_a, b)?;
    }
    if !options.fov_deg.is_finite() || options.fov_deg <= 0.0 {
        return Err(SpectrumError::InvalidFieldOfView(options.fov_deg));
    }
    if options.a_is_mask {
        ensure_binary(map_a, 'a')?;
    }
    if let (Some(b), true) = (map_b, options.b_is_mask) {
        ensure_binary(b, 'b')?;
    }

    let omega = steradians_per_pixel(options.fov_deg, side);
    let fft_a = fft2(&map_a.mapv(|v| v * omega));

    let power = match map_b {
        None => fft_a.mapv(|f| 2.0 * f.norm_sqr()),
        Some(b) => {
            let fft_b = fft2(&b.mapv(|v| v * omega));
            Zip::from(&fft_a)
                .and(&fft_b)
                .map_collect(|fa, fb| (fa * fb.conj() + fb * fa.conj()).norm())
        }
    };

    Ok(fftshift(&power))
}
