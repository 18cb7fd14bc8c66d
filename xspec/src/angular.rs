//! Binned angular power spectra and beam transfer functions.
//!
//! Spectra are binned about the zero-frequency pixel of the shifted power
//! array, the same convention the mode-coupling estimator uses, so a profile
//! from here can be deconvolved with a matrix computed for the same binning.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::binning::MultipoleBinning;
use crate::cross_spectrum::{cross_spectrum, CrossSpectrumOptions, SpectrumError};
use crate::field::Field;
use crate::radial::{radial_profile, RadialCenter, RadialProfile};

/// Binned cross power spectrum of two maps, or the auto-spectrum of `map_a`.
pub fn angular_power_spectrum(
    map_a: &Field,
    map_b: Option<&Field>,
    binning: &MultipoleBinning,
    options: &CrossSpectrumOptions,
) -> Result<RadialProfile, SpectrumError> {
    let power = cross_spectrum(map_a, map_b, options)?;
    let profile = radial_profile(&power, binning, RadialCenter::FrequencyOrigin);
    debug!(
        "Angular spectrum: {} of {} bins populated",
        profile.len(),
        binning.nbins()
    );
    Ok(profile)
}

/// Beam transfer function sampled at populated multipole bins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamTransfer {
    pub ells: Vec<f64>,
    /// `B_ℓ`, peak-normalized to 1
    pub transfer: Vec<f64>,
}

impl BeamTransfer {
    /// Beam-deconvolve a binned spectrum sampled on the same bins (`C_ℓ / B_ℓ²`).
    ///
    /// Bins where the beam has no response come out as NaN.
    pub fn deconvolve(&self, spectrum: &[f64]) -> Vec<f64> {
        spectrum
            .iter()
            .zip(&self.transfer)
            .map(|(&c, &b)| if b > 0.0 { c / (b * b) } else { f64::NAN })
            .collect()
    }
}

/// Beam transfer function `B_ℓ = sqrt(C_ℓ) / max sqrt(C_ℓ)` of a point-spread function.
///
/// A PSF with no power gives an all-zero transfer.
pub fn beam_transfer(
    psf: &Field,
    binning: &MultipoleBinning,
    fov_deg: f64,
) -> Result<BeamTransfer, SpectrumError> {
    let profile = angular_power_spectrum(psf, None, binning, &CrossSpectrumOptions::with_fov(fov_deg))?;
    let amplitude: Vec<f64> = profile.means.iter().map(|c| c.max(0.0).sqrt()).collect();
    let peak = amplitude.iter().cloned().fold(0.0_f64, f64::max);

    let transfer = if peak > 0.0 {
        amplitude.iter().map(|a| a / peak).collect()
    } else {
        warn!("PSF has no power; beam transfer is zero everywhere");
        vec![0.0; amplitude.len()]
    };

    Ok(BeamTransfer {
        ells: profile.multipoles(binning),
        transfer,
    })
}
