//! Flat-field (pixel gain) estimation from a stack of science exposures.
//!
//! Each exposure is treated as `gain × sky level` plus noise. Exposures are
//! rescaled by the square root of their own mean and combined with two
//! accumulators, the weighted sum of rescaled exposures and the weighted sum
//! of their rescale factors:
//!
//! ```text
//! gain = Σ wᵢ·mᵢ·Iᵢ/√μᵢ  /  Σ wᵢ·mᵢ·√μᵢ
//! ```
//!
//! where `mᵢ` is the exposure's mask. Taking the ratio keeps partially
//! covered pixels on the same scale as fully covered ones.
//!
//! Means are always computed over each exposure's valid pixels, and the same
//! masked means drive both the inverse-variance weights and the rescaling.
//! Pixels that end up undefined, non-positive, below the gain floor or
//! without enough covering exposures are set to neutral gain 1.0; the
//! returned gain map never holds NaN or infinity.

use log::{debug, info, warn};
use ndarray::{Array2, Zip};
use sky_math::convolve2d::{convolve_nan_tolerant, gaussian_kernel, gaussian_kernel_size};
use thiserror::Error;

use crate::config::FlatFieldConfig;
use crate::field::{ensure_same_shape, Field, Mask, ShapeError};

/// Errors from flat-field estimation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlatFieldError {
    #[error("exposure stack is empty")]
    EmptyStack,

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("got {masks} masks for {images} exposures")]
    MaskCount { images: usize, masks: usize },

    #[error("{what} has {got} entries, expected one per exposure ({expected})")]
    VectorLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("infill smoothing scale must be finite and positive, got {0} px")]
    InvalidSmoothScale(f64),
}

/// Gain map with its validity mask and the weights that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct FlatFieldEstimate {
    /// Multiplicative gain per pixel; 1.0 wherever `valid` is false
    pub gain: Field,
    /// Pixels with a trustworthy gain
    pub valid: Mask,
    /// Per-exposure weights used in the combination (0 for skipped exposures)
    pub weights: Vec<f64>,
    /// Per-exposure means used for weighting and rescaling
    pub means: Vec<f64>,
    /// Number of usable exposures covering each pixel
    pub support: Array2<usize>,
}

impl FlatFieldEstimate {
    /// Divide a raw exposure by the gain map.
    pub fn calibrate(&self, raw: &Field) -> Result<Field, ShapeError> {
        ensure_same_shape(raw, &self.gain)?;
        Ok(raw / &self.gain)
    }

    /// Fraction of pixels with a valid gain.
    pub fn valid_fraction(&self) -> f64 {
        crate::field::observed_fraction(&self.valid)
    }
}

/// Number of exposures whose mask covers each pixel.
pub fn stack_support(masks: &[Mask]) -> Result<Array2<usize>, FlatFieldError> {
    let first = masks.first().ok_or(FlatFieldError::EmptyStack)?;
    let mut support = Array2::zeros(first.dim());
    for mask in masks {
        ensure_same_shape(first, mask)?;
        Zip::from(&mut support).and(mask).for_each(|s, &m| {
            if m {
                *s += 1;
            }
        });
    }
    Ok(support)
}

/// Per-exposure masks restricted to pixels that enough *other* exposures cover.
///
/// Exposure `j` keeps a pixel only if its own mask covers it and strictly
/// more than `ff_stack_min` of the remaining exposures do too, so a flat
/// estimated without exposure `j` is defined wherever `j` is used.
pub fn leave_one_out_masks(
    masks: &[Mask],
    ff_stack_min: usize,
) -> Result<Vec<Mask>, FlatFieldError> {
    let support = stack_support(masks)?;
    Ok(masks
        .iter()
        .map(|mask| {
            Zip::from(mask)
                .and(&support)
                .map_collect(|&m, &s| m && (s - 1) > ff_stack_min)
        })
        .collect())
}

/// Builder for a flat-field estimate over a stack of exposures
pub struct FlatFieldEstimator<'a> {
    images: &'a [Field],
    masks: Option<&'a [Mask]>,
    weights: Option<&'a [f64]>,
    means: Option<&'a [f64]>,
    noise_frames: Option<&'a [f64]>,
    target_mask: Option<&'a Mask>,
}

impl<'a> FlatFieldEstimator<'a> {
    pub fn new(images: &'a [Field]) -> Self {
        Self {
            images,
            masks: None,
            weights: None,
            means: None,
            noise_frames: None,
            target_mask: None,
        }
    }

    /// Per-exposure valid-pixel masks (default: every pixel valid)
    pub fn masks(mut self, masks: &'a [Mask]) -> Self {
        self.masks = Some(masks);
        self
    }

    /// Fixed exposure weights, bypassing inverse-variance weighting
    pub fn weights(mut self, weights: &'a [f64]) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Precomputed exposure means
    pub fn means(mut self, means: &'a [f64]) -> Self {
        self.means = Some(means);
        self
    }

    /// Relative number of noise frames per exposure (default: 1 each)
    pub fn noise_frames(mut self, noise_frames: &'a [f64]) -> Self {
        self.noise_frames = Some(noise_frames);
        self
    }

    /// Pixels allowed to carry a non-neutral gain after infilling
    pub fn target_mask(mut self, target_mask: &'a Mask) -> Self {
        self.target_mask = Some(target_mask);
        self
    }

    fn check_length(
        what: &'static str,
        values: &[f64],
        expected: usize,
    ) -> Result<(), FlatFieldError> {
        if values.len() != expected {
            return Err(FlatFieldError::VectorLength {
                what,
                expected,
                got: values.len(),
            });
        }
        Ok(())
    }

    /// Combine the stack into a gain map.
    ///
    /// Exposures with no valid pixel, or whose mean is zero, negative or
    /// undefined, are skipped with a warning. A stack with no usable
    /// exposure gives neutral gain everywhere and no valid pixel.
    pub fn estimate(&self, config: &FlatFieldConfig) -> Result<FlatFieldEstimate, FlatFieldError> {
        let first = self.images.first().ok_or(FlatFieldError::EmptyStack)?;
        let n = self.images.len();
        for image in self.images {
            ensure_same_shape(first, image)?;
        }
        if let Some(target) = self.target_mask {
            ensure_same_shape(first, target)?;
        }
        let sigma = config.infill_smooth_scale;
        if config.infill && !(sigma.is_finite() && sigma > 0.0) {
            return Err(FlatFieldError::InvalidSmoothScale(sigma));
        }

        let masks: Vec<Mask> = match self.masks {
            Some(masks) => {
                if masks.len() != n {
                    return Err(FlatFieldError::MaskCount {
                        images: n,
                        masks: masks.len(),
                    });
                }
                for mask in masks {
                    ensure_same_shape(first, mask)?;
                }
                masks.to_vec()
            }
            None => vec![Array2::from_elem(first.dim(), true); n],
        };

        let means = match self.means {
            Some(means) => {
                Self::check_length("means", means, n)?;
                means.to_vec()
            }
            None => self
                .images
                .iter()
                .zip(&masks)
                .map(|(image, mask)| masked_mean(image, mask))
                .collect(),
        };

        let usable: Vec<bool> = masks
            .iter()
            .zip(&means)
            .enumerate()
            .map(|(index, (mask, &mean))| {
                if !mask.iter().any(|&v| v) {
                    warn!("Exposure {index} has no valid pixels and is skipped");
                    false
                } else if !(mean.is_finite() && mean > 0.0) {
                    warn!("Exposure {index} has unusable mean {mean} and is skipped");
                    false
                } else {
                    true
                }
            })
            .collect();

        let usable_masks: Vec<&Mask> = masks
            .iter()
            .zip(&usable)
            .filter_map(|(m, &u)| u.then_some(m))
            .collect();
        let mut support = Array2::<usize>::zeros(first.dim());
        for mask in &usable_masks {
            Zip::from(&mut support).and(*mask).for_each(|s, &m| {
                if m {
                    *s += 1;
                }
            });
        }

        let weights: Vec<f64> = match self.weights {
            Some(weights) => {
                Self::check_length("weights", weights, n)?;
                weights
                    .iter()
                    .zip(&usable)
                    .map(|(&w, &u)| if u { w } else { 0.0 })
                    .collect()
            }
            None => {
                let noise_frames = match self.noise_frames {
                    Some(nfr) => {
                        Self::check_length("noise_frames", nfr, n)?;
                        nfr.to_vec()
                    }
                    None => vec![1.0; n],
                };
                exposure_weights(&means, &noise_frames, &usable, config.inverse_variance_weight)
            }
        };

        if usable_masks.is_empty() {
            warn!("No usable exposure in a stack of {n}; flat field is neutral");
            return Ok(FlatFieldEstimate {
                gain: Array2::from_elem(first.dim(), 1.0),
                valid: Array2::from_elem(first.dim(), false),
                weights,
                means,
                support,
            });
        }
        info!("Flat-field exposure weights: {weights:?}");

        let mut numerator = Array2::<f64>::zeros(first.dim());
        let mut denominator = Array2::<f64>::zeros(first.dim());
        for i in 0..n {
            if !usable[i] || weights[i] == 0.0 {
                continue;
            }
            let scale = means[i].sqrt();
            let w = weights[i];
            Zip::from(&mut numerator)
                .and(&mut denominator)
                .and(&self.images[i])
                .and(&masks[i])
                .for_each(|num, den, &value, &m| {
                    if m {
                        *num += w * value / scale;
                        *den += w * scale;
                    }
                });
        }

        let mut estimate = Zip::from(&numerator)
            .and(&denominator)
            .map_collect(|&num, &den| if den != 0.0 { num / den } else { f64::NAN });

        if config.infill {
            let undefined = estimate.iter().filter(|v| !v.is_finite()).count();
            if undefined > 0 {
                let (rows, cols) = estimate.dim();
                // A kernel wider than twice the image reaches nothing new
                let size = gaussian_kernel_size(sigma).min(2 * rows.max(cols) + 1);
                let kernel = gaussian_kernel(size, sigma);
                let smoothed = convolve_nan_tolerant(&estimate, &kernel);
                Zip::from(&mut estimate).and(&smoothed).for_each(|e, &s| {
                    if !e.is_finite() {
                        *e = s;
                    }
                });
                debug!("Infilled {undefined} undefined flat-field pixels (sigma {sigma} px)");
            }

            if let Some(target) = self.target_mask {
                Zip::from(&mut estimate).and(target).for_each(|e, &t| {
                    if !t {
                        *e = 1.0;
                    }
                });
            }
        }

        let valid = Zip::from(&estimate)
            .and(&support)
            .map_collect(|&e, &s| {
                e.is_finite() && e != 0.0 && e > config.ff_min && s >= config.ff_stack_min
            });
        let gain = Zip::from(&estimate)
            .and(&valid)
            .map_collect(|&e, &v| if v { e } else { 1.0 });

        let neutral = valid.iter().filter(|&&v| !v).count();
        if neutral > 0 {
            debug!(
                "{} of {} flat-field pixels set to neutral gain",
                neutral,
                valid.len()
            );
        }

        Ok(FlatFieldEstimate {
            gain,
            valid,
            weights,
            means,
            support,
        })
    }
}

/// Mean over the pixels a mask marks valid (NaN when none are).
fn masked_mean(image: &Field, mask: &Mask) -> f64 {
    let (sum, count) = Zip::from(image)
        .and(mask)
        .fold((0.0, 0usize), |(sum, count), &v, &m| {
            if m {
                (sum + v, count + 1)
            } else {
                (sum, count)
            }
        });
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Normalized exposure weights.
///
/// Inverse-variance weighting gives exposure `i` weight `1/(μᵢ·nfrᵢ)`;
/// otherwise weights are uniform. Skipped exposures get weight 0 and the
/// rest sum to 1.
fn exposure_weights(
    means: &[f64],
    noise_frames: &[f64],
    usable: &[bool],
    inverse_variance: bool,
) -> Vec<f64> {
    let raw: Vec<f64> = means
        .iter()
        .zip(noise_frames)
        .zip(usable)
        .map(|((&mean, &nfr), &used)| match (used, inverse_variance) {
            (false, _) => 0.0,
            (true, true) => 1.0 / (mean * nfr),
            (true, false) => 1.0,
        })
        .collect();

    let total: f64 = raw.iter().sum();
    if total > 0.0 && total.is_finite() {
        raw.iter().map(|w| w / total).collect()
    } else {
        raw
    }
}
