//! Radial (azimuthal) averaging of Fourier-plane arrays into multipole bins.
//!
//! Pixels are sorted by their distance from a center and the sorted radii are
//! walked once against the pixel-unit bin edges, so each bin is a contiguous
//! run of the sorted samples. Each populated bin reports the mean and the
//! standard error of the mean; bins with no samples are left out of the
//! profile entirely.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sky_math::stats::mean_and_standard_error;

use crate::binning::MultipoleBinning;

/// Point radii are measured from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RadialCenter {
    /// Geometric image center, `((cols-1)/2, (rows-1)/2)`; fractional for even sizes
    #[default]
    Geometric,
    /// Zero-frequency pixel of an `fftshift`ed array, `(cols/2, rows/2)`
    FrequencyOrigin,
    /// Explicit `(x, y)` pixel coordinates
    At { x: f64, y: f64 },
}

impl RadialCenter {
    /// Resolve to `(x, y)` for an array with the given `(rows, cols)`.
    pub fn coordinates(&self, dim: (usize, usize)) -> (f64, f64) {
        let (rows, cols) = dim;
        match *self {
            RadialCenter::Geometric => (
                cols.saturating_sub(1) as f64 / 2.0,
                rows.saturating_sub(1) as f64 / 2.0,
            ),
            RadialCenter::FrequencyOrigin => ((cols / 2) as f64, (rows / 2) as f64),
            RadialCenter::At { x, y } => (x, y),
        }
    }
}

/// Binned radial profile; one entry per populated bin, in bin order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialProfile {
    /// Index of each entry's bin in the originating binning
    pub bin_indices: Vec<usize>,
    /// Bin centers in Fourier-plane pixel units
    pub centers: Vec<f64>,
    /// Mean of the samples in each bin
    pub means: Vec<f64>,
    /// Standard error of the mean (`std / sqrt(count)`)
    pub std_errors: Vec<f64>,
    /// Number of samples in each bin
    pub counts: Vec<usize>,
}

impl RadialProfile {
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Total number of samples assigned to a bin.
    pub fn total_count(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Bin centers converted back to multipole units.
    pub fn multipoles(&self, binning: &MultipoleBinning) -> Vec<f64> {
        self.centers.iter().map(|c| c * binning.lmin()).collect()
    }

    /// Means laid out over all `nbins` bins, with empty bins set to `fill`.
    pub fn dense_means(&self, nbins: usize, fill: f64) -> Vec<f64> {
        let mut dense = vec![fill; nbins];
        for (&i, &m) in self.bin_indices.iter().zip(&self.means) {
            if i < nbins {
                dense[i] = m;
            }
        }
        dense
    }
}

/// Index boundaries of each bin within radii sorted ascending.
///
/// Returns `nbins + 1` offsets; bin `i` covers `offsets[i]..offsets[i + 1]`.
/// The final bin always closes at the end of the samples so the
/// maximum-radius sample is never dropped.
fn bin_offsets(sorted_radii: &[f64], pixel_edges: &[f64]) -> Vec<usize> {
    let nbins = pixel_edges.len() - 1;
    let mut offsets = Vec::with_capacity(nbins + 1);
    offsets.push(0);

    let mut next_edge = 1;
    for (idx, &r) in sorted_radii.iter().enumerate() {
        while next_edge < nbins && r >= pixel_edges[next_edge] {
            offsets.push(idx);
            next_edge += 1;
        }
        if next_edge == nbins {
            break;
        }
    }
    while offsets.len() < nbins {
        offsets.push(sorted_radii.len());
    }
    offsets.push(sorted_radii.len());

    offsets
}

/// Azimuthally average `image` into the bins of `binning`.
///
/// Pure and deterministic: the same inputs always give bit-identical output.
pub fn radial_profile(
    image: &Array2<f64>,
    binning: &MultipoleBinning,
    center: RadialCenter,
) -> RadialProfile {
    let (cx, cy) = center.coordinates(image.dim());

    let mut samples: Vec<(f64, f64)> = image
        .indexed_iter()
        .map(|((y, x), &v)| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            ((dx * dx + dy * dy).sqrt(), v)
        })
        .collect();
    // Stable sort keeps raster order among equal radii
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let radii: Vec<f64> = samples.iter().map(|s| s.0).collect();
    let values: Vec<f64> = samples.iter().map(|s| s.1).collect();
    let offsets = bin_offsets(&radii, binning.pixel_edges());
    let pixel_centers = binning.pixel_centers();

    let mut profile = RadialProfile {
        bin_indices: Vec::new(),
        centers: Vec::new(),
        means: Vec::new(),
        std_errors: Vec::new(),
        counts: Vec::new(),
    };

    for (bin, window) in offsets.windows(2).enumerate() {
        let run = &values[window[0]..window[1]];
        if let Some((mean, std_error)) = mean_and_standard_error(run) {
            profile.bin_indices.push(bin);
            profile.centers.push(pixel_centers[bin]);
            profile.means.push(mean);
            profile.std_errors.push(std_error);
            profile.counts.push(run.len());
        }
    }

    profile
}
