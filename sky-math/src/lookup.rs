//! Nearest-sample lookup over a sorted abscissa.
//!
//! Used to map a continuous coordinate (for example a multipole) onto the
//! closest entry of a coarsely sampled table. Lookups are binary searches, so
//! painting a full grid costs `O(N² log M)` rather than a scan per pixel.
//!
//! # Example
//!
//! ```
//! use sky_math::lookup::NearestLookup;
//!
//! let table = NearestLookup::new(vec![100.0, 200.0, 400.0]).unwrap();
//! assert_eq!(table.nearest(260.0).index, 1);
//! assert!(table.nearest(900.0).clamped);
//! ```

use thiserror::Error;

/// Error type for lookup table construction
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    /// No samples were supplied
    #[error("Lookup table needs at least one sample")]
    Empty,
    /// Samples are not strictly increasing or not finite
    #[error("Lookup samples must be finite and strictly increasing (violated at index {index})")]
    NotSorted { index: usize },
}

/// Result of a nearest-sample query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    /// Index of the closest sample
    pub index: usize,
    /// True when the query lies outside `[first, last]` and was clamped
    pub clamped: bool,
}

/// Strictly increasing samples supporting nearest-neighbor queries.
#[derive(Debug, Clone)]
pub struct NearestLookup {
    samples: Vec<f64>,
}

impl NearestLookup {
    /// Build a lookup over strictly increasing, finite samples.
    pub fn new(samples: Vec<f64>) -> Result<Self, LookupError> {
        if samples.is_empty() {
            return Err(LookupError::Empty);
        }
        if let Some(index) = samples.iter().position(|v| !v.is_finite()) {
            return Err(LookupError::NotSorted { index });
        }
        if let Some(i) = (1..samples.len()).find(|&i| samples[i] <= samples[i - 1]) {
            return Err(LookupError::NotSorted { index: i });
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Find the sample closest to `x`. Ties go to the lower sample.
    pub fn nearest(&self, x: f64) -> Nearest {
        let last = self.samples.len() - 1;
        if x < self.samples[0] {
            return Nearest {
                index: 0,
                clamped: true,
            };
        }
        if x > self.samples[last] {
            return Nearest {
                index: last,
                clamped: true,
            };
        }

        // First sample >= x
        let upper = self.samples.partition_point(|&s| s < x);
        let index = if upper == 0 {
            0
        } else if (self.samples[upper] - x) < (x - self.samples[upper - 1]) {
            upper
        } else {
            upper - 1
        };

        Nearest {
            index,
            clamped: false,
        }
    }
}
