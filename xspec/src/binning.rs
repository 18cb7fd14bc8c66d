//! Multipole binning of the Fourier plane.
//!
//! Bins are defined in multipole units between `lmin` and
//! `lmax = lmin * sqrt(0.5) * N`, the multipole of the corner of an N×N
//! Fourier plane whose unit pixel radius corresponds to `lmin`. For bucketing
//! pixel radii the edges are divided by the smallest edge, so radius 1 pixel
//! lines up with the first edge.
//!
//! Bucketing rule shared by every consumer: a radius belongs to the bin of
//! the last interior edge it reaches (`r >= edge`). Radii below the first
//! interior edge fall in bin 0 and radii at or beyond the last interior edge
//! fall in the final bin, so every pixel lands in exactly one bin.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from constructing a multipole binning
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BinningError {
    #[error("need at least 2 bins, got {nbins}")]
    TooFewBins { nbins: usize },

    #[error("lmax ({lmax}) must exceed lmin ({lmin})")]
    InvalidRange { lmin: f64, lmax: f64 },

    #[error("bin edges must be finite, positive and strictly increasing")]
    NonFinite,
}

/// Spacing of bin edges between `lmin` and `lmax`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BinSpacing {
    #[default]
    Log,
    Linear,
}

/// Multipole of a single Fourier-plane pixel for a map spanning `fov_deg`.
///
/// The fundamental mode of a square patch of side θ is `2π/θ`, i.e.
/// `360 / θ_deg`; a 4 degree patch gives 90.
pub fn fundamental_multipole(fov_deg: f64) -> f64 {
    360.0 / fov_deg
}

/// Ordered multipole bin edges plus the derived pixel-unit edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipoleBinning {
    /// Bin edges in multipole units (length nbins + 1)
    edges: Vec<f64>,
    /// Bin edges divided by the smallest edge
    pixel_edges: Vec<f64>,
    spacing: BinSpacing,
}

impl MultipoleBinning {
    /// Build `nbins` bins spanning `[lmin, lmin * sqrt(0.5) * side]`.
    ///
    /// # Arguments
    /// * `lmin` - Multipole of a unit pixel radius in the Fourier plane
    /// * `nbins` - Number of bins (at least 2)
    /// * `side` - Side length N of the maps to be binned
    /// * `spacing` - Logarithmic or linear edges
    pub fn new(
        lmin: f64,
        nbins: usize,
        side: usize,
        spacing: BinSpacing,
    ) -> Result<Self, BinningError> {
        if nbins < 2 {
            return Err(BinningError::TooFewBins { nbins });
        }
        if !lmin.is_finite() || lmin <= 0.0 {
            return Err(BinningError::NonFinite);
        }

        let lmax = lmin * 0.5_f64.sqrt() * side as f64;
        if lmax.is_nan() || lmax <= lmin {
            return Err(BinningError::InvalidRange { lmin, lmax });
        }

        let mut edges: Vec<f64> = match spacing {
            BinSpacing::Log => {
                let (lo, hi) = (lmin.log10(), lmax.log10());
                (0..=nbins)
                    .map(|i| 10f64.powf(lo + (hi - lo) * i as f64 / nbins as f64))
                    .collect()
            }
            BinSpacing::Linear => (0..=nbins)
                .map(|i| lmin + (lmax - lmin) * i as f64 / nbins as f64)
                .collect(),
        };
        // Endpoints are exact; lmin is the multipole of a unit pixel radius
        edges[0] = lmin;
        edges[nbins] = lmax;

        Self::from_edges(edges, spacing)
    }

    /// Build a binning from explicit multipole edges.
    pub fn from_edges(edges: Vec<f64>, spacing: BinSpacing) -> Result<Self, BinningError> {
        if edges.len() < 3 {
            return Err(BinningError::TooFewBins {
                nbins: edges.len().saturating_sub(1),
            });
        }
        if edges.iter().any(|e| !e.is_finite() || *e <= 0.0)
            || edges.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(BinningError::NonFinite);
        }

        let smallest = edges[0];
        let pixel_edges = edges.iter().map(|e| e / smallest).collect();

        Ok(Self {
            edges,
            pixel_edges,
            spacing,
        })
    }

    pub fn nbins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn lmin(&self) -> f64 {
        self.edges[0]
    }

    pub fn lmax(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    pub fn spacing(&self) -> BinSpacing {
        self.spacing
    }

    /// Bin edges in multipole units
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bin edges in Fourier-plane pixel units (first edge is 1)
    pub fn pixel_edges(&self) -> &[f64] {
        &self.pixel_edges
    }

    /// Bin centers in pixel units (midpoints of consecutive pixel edges)
    pub fn pixel_centers(&self) -> Vec<f64> {
        self.pixel_edges
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }

    /// Bin centers in multipole units
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Bin holding a Fourier-plane radius given in pixel units.
    pub fn bin_index(&self, radius_px: f64) -> usize {
        let interior = &self.pixel_edges[1..self.nbins()];
        interior.partition_point(|&edge| edge <= radius_px)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_edges_span_range() {
        let binning = MultipoleBinning::new(90.0, 10, 64, BinSpacing::Log).unwrap();
        assert_eq!(binning.nbins(), 10);
        assert_eq!(binning.edges().len(), 11);
        assert_relative_eq!(binning.lmin(), 90.0, epsilon = 1e-9);
        assert_relative_eq!(binning.lmax(), 90.0 * 0.5f64.sqrt() * 64.0, epsilon = 1e-9);

        // Constant ratio between consecutive log edges
        let ratios: Vec<f64> = binning.edges().windows(2).map(|w| w[1] / w[0]).collect();
        for r in &ratios {
            assert_relative_eq!(*r, ratios[0], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_end_edges_are_exact() {
        for lmin in [90.0, 97.3, 123.456789, 180.0] {
            for spacing in [BinSpacing::Log, BinSpacing::Linear] {
                for nbins in [7, 13, 29, 60] {
                    let binning = MultipoleBinning::new(lmin, nbins, 64, spacing).unwrap();
                    assert_eq!(binning.lmin().to_bits(), lmin.to_bits());
                    assert_eq!(
                        binning.lmax().to_bits(),
                        (lmin * 0.5_f64.sqrt() * 64.0).to_bits()
                    );
                    assert_eq!(binning.pixel_edges()[0], 1.0);
                }
            }
        }
    }

    #[test]
    fn test_linear_edges_are_evenly_spaced() {
        let binning = MultipoleBinning::new(100.0, 4, 16, BinSpacing::Linear).unwrap();
        let steps: Vec<f64> = binning.edges().windows(2).map(|w| w[1] - w[0]).collect();
        for s in &steps {
            assert_relative_eq!(*s, steps[0], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pixel_edges_start_at_one() {
        let binning = MultipoleBinning::new(90.0, 8, 32, BinSpacing::Log).unwrap();
        assert_eq!(binning.pixel_edges()[0], 1.0);
        assert_relative_eq!(
            *binning.pixel_edges().last().unwrap(),
            32.0 * 0.5f64.sqrt(),
            epsilon = 1e-9
        );
        let pixel_centers = binning.pixel_centers();
        for (c_px, c_l) in pixel_centers.iter().zip(binning.centers()) {
            assert_relative_eq!(c_px * binning.lmin(), c_l, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_invalid_binnings() {
        assert_eq!(
            MultipoleBinning::new(90.0, 1, 64, BinSpacing::Log).unwrap_err(),
            BinningError::TooFewBins { nbins: 1 }
        );
        // A single-pixel map has lmax below lmin
        assert!(matches!(
            MultipoleBinning::new(90.0, 4, 1, BinSpacing::Log).unwrap_err(),
            BinningError::InvalidRange { .. }
        ));
        assert_eq!(
            MultipoleBinning::new(-1.0, 4, 64, BinSpacing::Log).unwrap_err(),
            BinningError::NonFinite
        );
        assert_eq!(
            MultipoleBinning::from_edges(vec![1.0, 3.0, 2.0], BinSpacing::Linear).unwrap_err(),
            BinningError::NonFinite
        );
    }

    #[test]
    fn test_bin_index_rule() {
        let binning =
            MultipoleBinning::from_edges(vec![10.0, 20.0, 40.0, 80.0], BinSpacing::Log).unwrap();
        // Pixel edges: 1, 2, 4, 8
        assert_eq!(binning.bin_index(0.0), 0);
        assert_eq!(binning.bin_index(1.9), 0);
        assert_eq!(binning.bin_index(2.0), 1);
        assert_eq!(binning.bin_index(3.99), 1);
        assert_eq!(binning.bin_index(4.0), 2);
        assert_eq!(binning.bin_index(100.0), 2);
    }

    #[test]
    fn test_fundamental_multipole() {
        assert_relative_eq!(fundamental_multipole(4.0), 90.0);
        assert_relative_eq!(fundamental_multipole(2.0), 180.0);
    }
}
