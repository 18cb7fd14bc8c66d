//! Angular power spectra of flat-sky maps.
//!
//! This crate estimates binned angular cross-power spectra between square sky
//! maps, characterizes the mode coupling an observation mask introduces, and
//! builds flat-field gain maps from stacks of exposures.
//!
//! - [`cross_spectrum`] and [`radial`] compose into binned spectra ([`angular`])
//! - [`grf`] synthesizes Gaussian random fields with a target spectrum
//! - [`mode_coupling`] runs the Monte-Carlo mask-coupling estimate
//! - [`flat_field`] combines exposures into a per-pixel gain map
//!
//! # Example
//!
//! ```
//! use xspec::binning::{BinSpacing, MultipoleBinning};
//! use xspec::angular::angular_power_spectrum;
//! use xspec::cross_spectrum::CrossSpectrumOptions;
//! use xspec::noise::simple_normal_array;
//!
//! let map = simple_normal_array((32, 32), 0.0, 1.0, 42);
//! let binning = MultipoleBinning::new(90.0, 6, 32, BinSpacing::Log).unwrap();
//! let profile = angular_power_spectrum(&map, None, &binning, &CrossSpectrumOptions::default()).unwrap();
//! assert_eq!(profile.total_count(), 32 * 32);
//! ```

pub mod angular;
pub mod binning;
pub mod config;
pub mod cross_spectrum;
pub mod field;
pub mod flat_field;
pub mod grf;
pub mod mode_coupling;
pub mod noise;
pub mod radial;
pub mod shared_args;

pub use angular::{angular_power_spectrum, beam_transfer, BeamTransfer};
pub use binning::{fundamental_multipole, BinSpacing, BinningError, MultipoleBinning};
pub use config::{FlatFieldConfig, SpectrumConfig};
pub use cross_spectrum::{cross_spectrum, CrossSpectrumOptions, SpectrumError};
pub use field::{apply_mask, Field, Mask, ShapeError};
pub use flat_field::{FlatFieldError, FlatFieldEstimate, FlatFieldEstimator};
pub use grf::{grf_batch, GrfError, GrfSynthesizer};
pub use mode_coupling::{
    compute_mode_coupling, ModeCouplingError, ModeCouplingMatrix, ModeCouplingOptions,
};
pub use radial::{radial_profile, RadialCenter, RadialProfile};
