//! Analysis configuration persisted as JSON.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::binning::{BinSpacing, BinningError, MultipoleBinning};
use crate::cross_spectrum::CrossSpectrumOptions;
use crate::mode_coupling::ModeCouplingOptions;

/// Spectrum and mode-coupling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Side of the square map in degrees
    pub fov_deg: f64,
    /// Multipole of a unit Fourier-plane radius
    pub lmin: f64,
    pub nbins: usize,
    pub spacing: BinSpacing,
    /// Monte-Carlo realizations per mode-coupling row
    pub realizations: usize,
    /// Power injected per mode-coupling row
    pub ps_amplitude: f64,
    pub seed: Option<u64>,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fov_deg: 2.0,
            lmin: 90.0,
            nbins: 60,
            spacing: BinSpacing::Log,
            realizations: 50,
            ps_amplitude: 100.0,
            seed: None,
        }
    }
}

impl SpectrumConfig {
    /// Multipole binning for maps of side `side`.
    pub fn binning(&self, side: usize) -> Result<MultipoleBinning, BinningError> {
        MultipoleBinning::new(self.lmin, self.nbins, side, self.spacing)
    }

    pub fn spectrum_options(&self) -> CrossSpectrumOptions {
        CrossSpectrumOptions::with_fov(self.fov_deg)
    }

    pub fn mode_coupling_options(&self) -> ModeCouplingOptions {
        ModeCouplingOptions {
            realizations: self.realizations,
            ps_amplitude: self.ps_amplitude,
            fov_deg: self.fov_deg,
            seed: self.seed,
            ..ModeCouplingOptions::default()
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        save_json(self, path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        load_json(path)
    }
}

/// Flat-field stacking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatFieldConfig {
    /// Weight exposures by `1/(mean · noise_frames)`; uniform otherwise
    pub inverse_variance_weight: bool,
    /// Smooth over pixels no exposure constrains
    pub infill: bool,
    /// Gaussian sigma of the infill kernel in pixels
    pub infill_smooth_scale: f64,
    /// Exposures required to cover a pixel for its gain to be valid
    pub ff_stack_min: usize,
    /// Gains at or below this floor are treated as invalid
    pub ff_min: f64,
}

impl Default for FlatFieldConfig {
    fn default() -> Self {
        Self {
            inverse_variance_weight: true,
            infill: true,
            infill_smooth_scale: 3.0,
            ff_stack_min: 1,
            ff_min: 0.2,
        }
    }
}

impl FlatFieldConfig {
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        save_json(self, path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        load_json(path)
    }
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, std::io::Error> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SpectrumConfig::default();
        assert_eq!(config.nbins, 60);
        assert_eq!(config.spacing, BinSpacing::Log);
        let binning = config.binning(64).unwrap();
        assert_eq!(binning.nbins(), 60);
        assert_eq!(binning.lmin(), 90.0);

        let mc = config.mode_coupling_options();
        assert_eq!(mc.realizations, 50);
        assert_eq!(mc.ps_amplitude, 100.0);
        assert!(mc.parallel);
    }

    #[test]
    fn test_round_trip_through_file() {
        let config = SpectrumConfig {
            nbins: 12,
            spacing: BinSpacing::Linear,
            seed: Some(7),
            ..SpectrumConfig::default()
        };
        let temp = NamedTempFile::new().unwrap();
        config.save_to_file(temp.path()).unwrap();
        assert_eq!(SpectrumConfig::load_from_file(temp.path()).unwrap(), config);

        let ff = FlatFieldConfig {
            ff_stack_min: 3,
            ..FlatFieldConfig::default()
        };
        let temp = NamedTempFile::new().unwrap();
        ff.save_to_file(temp.path()).unwrap();
        assert_eq!(FlatFieldConfig::load_from_file(temp.path()).unwrap(), ff);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SpectrumConfig =
            serde_json::from_str(r#"{ "nbins": 8, "spacing": "linear" }"#).unwrap();
        assert_eq!(config.nbins, 8);
        assert_eq!(config.spacing, BinSpacing::Linear);
        assert_eq!(config.lmin, 90.0);
    }

    #[test]
    fn test_invalid_json_is_invalid_data() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "not json").unwrap();
        let err = FlatFieldConfig::load_from_file(temp.path()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
