use std::path::PathBuf;

use clap::Parser;

use crate::binning::BinSpacing;
use crate::config::SpectrumConfig;

/// Common arguments shared across spectrum binaries
#[derive(Parser, Debug, Clone)]
pub struct SpectrumArgs {
    /// JSON spectrum configuration; overrides the individual flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Side of the square map in degrees
    #[arg(long, default_value_t = 2.0)]
    pub fov: f64,

    /// Multipole of a unit Fourier-plane radius
    #[arg(long, default_value_t = 90.0)]
    pub lmin: f64,

    /// Number of multipole bins
    #[arg(long, default_value_t = 60)]
    pub nbins: usize,

    /// Use linearly spaced bins instead of logarithmic
    #[arg(long, default_value_t = false)]
    pub linear: bool,

    /// Monte-Carlo realizations per multipole bin
    #[arg(long, default_value_t = 50)]
    pub realizations: usize,

    /// Power injected per multipole bin
    #[arg(long, default_value_t = 100.0)]
    pub amplitude: f64,

    /// Random seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable debug output
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl SpectrumArgs {
    /// Resolve into a configuration, preferring `--config` when given.
    pub fn to_config(&self) -> Result<SpectrumConfig, std::io::Error> {
        if let Some(path) = &self.config {
            return SpectrumConfig::load_from_file(path);
        }
        Ok(SpectrumConfig {
            fov_deg: self.fov,
            lmin: self.lmin,
            nbins: self.nbins,
            spacing: if self.linear {
                BinSpacing::Linear
            } else {
                BinSpacing::Log
            },
            realizations: self.realizations,
            ps_amplitude: self.amplitude,
            seed: self.seed,
        })
    }
}
