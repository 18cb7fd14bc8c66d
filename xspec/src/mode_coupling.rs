//! Monte-Carlo estimate of the mask mode-coupling matrix.
//!
//! Row `i` of the matrix is the binned power observed through the mask when
//! a Gaussian random field carries power only in multipole bin `i`. For each
//! bin a fresh ensemble of realizations is drawn, masked, transformed and
//! radially binned; the row is the ensemble mean and the matching row of the
//! uncertainty matrix is the ensemble standard deviation.
//!
//! Spectra are divided by [`unit_power_normalization`], so an unmasked field
//! returns `ps_amplitude` on the diagonal and zero elsewhere.
//!
//! Bins are independent and run in parallel, each with its own RNG seeded
//! from `seed + bin`, so results do not depend on thread scheduling.

use std::collections::BTreeSet;
use std::path::Path;

use log::{debug, info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sky_math::fft2::fft_indices;
use sky_math::stats::column_mean_and_std;
use thiserror::Error;

use crate::binning::MultipoleBinning;
use crate::cross_spectrum::{
    cross_spectrum, unit_power_normalization, CrossSpectrumOptions, SpectrumError,
};
use crate::field::{apply_mask, square_side, Mask, ShapeError};
use crate::grf::{GrfError, GrfSynthesizer};
use crate::radial::{radial_profile, RadialCenter};

/// Errors from mode-coupling estimation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModeCouplingError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error(transparent)]
    Grf(#[from] GrfError),

    #[error("at least one realization per bin is required")]
    NoRealizations,

    #[error("injected power amplitude must be finite and non-negative, got {0}")]
    InvalidAmplitude(f64),
}

/// Monte-Carlo settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeCouplingOptions {
    /// Realizations drawn per multipole bin
    pub realizations: usize,
    /// Power injected into the active bin
    pub ps_amplitude: f64,
    /// Side of the map in degrees
    pub fov_deg: f64,
    /// Base seed; `None` draws one from entropy
    pub seed: Option<u64>,
    /// Spread bins across the rayon thread pool
    pub parallel: bool,
}

impl Default for ModeCouplingOptions {
    fn default() -> Self {
        Self {
            realizations: 50,
            ps_amplitude: 100.0,
            fov_deg: 2.0,
            seed: None,
            parallel: true,
        }
    }
}

/// Mode-coupling matrix with its Monte-Carlo uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeCouplingMatrix {
    /// Multipole bin edges the matrix was estimated on
    pub edges: Vec<f64>,
    /// Mean observed binned power; row = injected bin, column = observed bin
    pub mkk: Array2<f64>,
    /// Standard deviation across realizations, same layout as `mkk`
    pub sigma: Array2<f64>,
    /// Realizations per row
    pub realizations: usize,
    /// Power injected into each row's bin
    pub ps_amplitude: f64,
}

impl ModeCouplingMatrix {
    pub fn nbins(&self) -> usize {
        self.mkk.nrows()
    }

    /// Rows that are identically zero (no response to the injected power).
    ///
    /// Such rows make the matrix singular and must be handled before it is
    /// inverted.
    pub fn singular_rows(&self) -> Vec<usize> {
        self.mkk
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|&v| v == 0.0))
            .map(|(i, _)| i)
            .collect()
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file, checking that matrix and edge shapes agree
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        let matrix: Self = serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let nbins = matrix.edges.len().saturating_sub(1);
        if matrix.mkk.dim() != (nbins, nbins) || matrix.sigma.dim() != (nbins, nbins) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "matrix shapes {:?}/{:?} do not match {} bins",
                    matrix.mkk.dim(),
                    matrix.sigma.dim(),
                    nbins
                ),
            ));
        }
        Ok(matrix)
    }
}

/// Distinct squared Fourier radii `sx² + sy²` present on an N×N grid.
fn squared_mode_radii(side: usize) -> Vec<i64> {
    let freqs = fft_indices(side);
    let mut radii = BTreeSet::new();
    for &sx in &freqs {
        for &sy in &freqs {
            radii.insert(sx * sx + sy * sy);
        }
    }
    radii.into_iter().collect()
}

/// Estimator of the coupling a mask induces between multipole bins
pub struct ModeCouplingEstimator<'a> {
    mask: &'a Mask,
    binning: &'a MultipoleBinning,
    options: ModeCouplingOptions,
    side: usize,
    /// Multipole of every distinct Fourier radius, ascending
    mode_ells: Vec<f64>,
    /// Bin of every distinct Fourier radius
    mode_bins: Vec<usize>,
}

impl<'a> ModeCouplingEstimator<'a> {
    pub fn new(
        mask: &'a Mask,
        binning: &'a MultipoleBinning,
        options: ModeCouplingOptions,
    ) -> Result<Self, ModeCouplingError> {
        let side = square_side(mask)?;
        if options.realizations == 0 {
            return Err(ModeCouplingError::NoRealizations);
        }
        if !options.ps_amplitude.is_finite() || options.ps_amplitude < 0.0 {
            return Err(ModeCouplingError::InvalidAmplitude(options.ps_amplitude));
        }
        if !options.fov_deg.is_finite() || options.fov_deg <= 0.0 {
            return Err(SpectrumError::InvalidFieldOfView(options.fov_deg).into());
        }

        let lmin = binning.lmin();
        let (mode_ells, mode_bins) = squared_mode_radii(side)
            .into_iter()
            .map(|m| {
                let radius = (m as f64).sqrt();
                (radius * lmin, binning.bin_index(radius))
            })
            .unzip();

        Ok(Self {
            mask,
            binning,
            options,
            side,
            mode_ells,
            mode_bins,
        })
    }

    /// GRF synthesizer whose power is `ps_amplitude` exactly on the Fourier
    /// modes that radial binning assigns to `bin`, and zero elsewhere.
    fn synthesizer_for_bin(&self, bin: usize) -> Result<GrfSynthesizer, GrfError> {
        let mut input = vec![0.0; self.binning.nbins()];
        input[bin] = self.options.ps_amplitude;

        // Expand the per-bin spectrum onto every distinct Fourier radius
        let ps: Vec<f64> = self.mode_bins.iter().map(|&b| input[b]).collect();
        GrfSynthesizer::new(self.side, &ps, &self.mode_ells, self.binning.lmin())
    }

    /// Estimate one row of the matrix and its uncertainty.
    pub fn estimate_row<R: Rng + ?Sized>(
        &self,
        bin: usize,
        rng: &mut R,
    ) -> Result<(Vec<f64>, Vec<f64>), ModeCouplingError> {
        let nbins = self.binning.nbins();
        let synth = self.synthesizer_for_bin(bin)?;
        let spectrum_opts = CrossSpectrumOptions::with_fov(self.options.fov_deg);
        let norm = unit_power_normalization(self.options.fov_deg, self.side);

        let mut profiles = Vec::with_capacity(self.options.realizations);
        for field in synth.realizations(self.options.realizations, rng) {
            let masked = apply_mask(&field, self.mask)?;
            let power = cross_spectrum(&masked, None, &spectrum_opts)?;
            let profile = radial_profile(&power, self.binning, RadialCenter::FrequencyOrigin);
            let row: Vec<f64> = profile
                .dense_means(nbins, 0.0)
                .into_iter()
                .map(|p| p / norm)
                .collect();
            profiles.push(row);
        }

        // Every row has nbins entries and there is at least one row
        let (mean, std) = column_mean_and_std(&profiles)
            .unwrap_or_else(|_| (vec![0.0; nbins], vec![0.0; nbins]));

        if mean.iter().all(|&v| v == 0.0) {
            warn!("Mode-coupling row {bin} is identically zero; the matrix will be singular");
        }
        debug!(
            "Mode-coupling row {}: diagonal {:.4} +/- {:.4}",
            bin, mean[bin], std[bin]
        );

        Ok((mean, std))
    }

    /// Estimate the full matrix, one independent ensemble per bin.
    pub fn estimate(&self) -> Result<ModeCouplingMatrix, ModeCouplingError> {
        let nbins = self.binning.nbins();
        let base_seed = self
            .options
            .seed
            .unwrap_or_else(|| StdRng::from_entropy().gen());

        let run_bin = |bin: usize| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(bin as u64));
            self.estimate_row(bin, &mut rng)
        };

        let rows: Vec<(Vec<f64>, Vec<f64>)> = if self.options.parallel {
            (0..nbins)
                .into_par_iter()
                .map(run_bin)
                .collect::<Result<_, _>>()?
        } else {
            (0..nbins).map(run_bin).collect::<Result<_, _>>()?
        };

        let mut mkk = Array2::zeros((nbins, nbins));
        let mut sigma = Array2::zeros((nbins, nbins));
        for (i, (mean, std)) in rows.into_iter().enumerate() {
            for j in 0..nbins {
                mkk[[i, j]] = mean[j];
                sigma[[i, j]] = std[j];
            }
        }

        info!(
            "Estimated {}x{} mode-coupling matrix from {} realizations per bin (observed fraction {:.3})",
            nbins,
            nbins,
            self.options.realizations,
            crate::field::observed_fraction(self.mask)
        );

        Ok(ModeCouplingMatrix {
            edges: self.binning.edges().to_vec(),
            mkk,
            sigma,
            realizations: self.options.realizations,
            ps_amplitude: self.options.ps_amplitude,
        })
    }
}

/// Estimate the mode-coupling matrix of `mask` on `binning`.
pub fn compute_mode_coupling(
    mask: &Mask,
    binning: &MultipoleBinning,
    options: ModeCouplingOptions,
) -> Result<ModeCouplingMatrix, ModeCouplingError> {
    ModeCouplingEstimator::new(mask, binning, options)?.estimate()
}
