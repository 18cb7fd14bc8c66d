//! Gaussian white-noise fields.
//!
//! Seeded generators used to drive GRF synthesis and to build reproducible
//! test inputs.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};

/// Generate a 2D array of normally distributed values from a fixed seed.
///
/// # Arguments
/// * `size` - Tuple of (height, width) for the output array dimensions
/// * `mean` - Mean value of the normal distribution
/// * `std_dev` - Standard deviation of the normal distribution
/// * `seed` - Random seed for deterministic output
///
/// # Panics
/// * If `std_dev` is negative or not finite
pub fn simple_normal_array(
    size: (usize, usize),
    mean: f64,
    std_dev: f64,
    seed: u64,
) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal_dist = Normal::new(mean, std_dev)
        .expect("Normal distribution parameters must be valid (std_dev >= 0)");
    Array2::from_shape_fn(size, |_| normal_dist.sample(&mut rng))
}

/// Draw an N×N field of independent unit-variance Gaussian samples.
pub fn unit_white_noise<R: Rng + ?Sized>(side: usize, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_fn((side, side), |_| rng.sample::<f64, _>(StandardNormal))
}
