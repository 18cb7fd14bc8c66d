//! Square sky maps and their observation masks.
//!
//! A [`Field`] is any N×N grid of real samples: a science map, a
//! mask-multiplied map or a synthetic realization. A [`Mask`] is the boolean
//! grid of observed pixels that goes with it. Operations never mutate their
//! inputs; each produces a new grid.

use ndarray::Array2;
use thiserror::Error;

/// Real-valued square map
pub type Field = Array2<f64>;

/// Observed-pixel mask (true = observed)
pub type Mask = Array2<bool>;

/// Errors raised when grids do not have compatible shapes
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("field must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("field has no pixels")]
    Empty,
}

/// Require two grids to share a shape, never broadcasting.
pub fn ensure_same_shape<A, B>(left: &Array2<A>, right: &Array2<B>) -> Result<(), ShapeError> {
    if left.dim() != right.dim() {
        return Err(ShapeError::ShapeMismatch {
            left: left.dim(),
            right: right.dim(),
        });
    }
    Ok(())
}

/// Require a non-empty square grid and return its side length.
pub fn square_side<A>(field: &Array2<A>) -> Result<usize, ShapeError> {
    let (rows, cols) = field.dim();
    if rows == 0 || cols == 0 {
        return Err(ShapeError::Empty);
    }
    if rows != cols {
        return Err(ShapeError::NotSquare { rows, cols });
    }
    Ok(rows)
}

/// Multiply a field by a mask, zeroing unobserved pixels.
pub fn apply_mask(field: &Field, mask: &Mask) -> Result<Field, ShapeError> {
    ensure_same_shape(field, mask)?;
    Ok(ndarray::Zip::from(field)
        .and(mask)
        .map_collect(|&v, &m| if m { v } else { 0.0 }))
}

/// Convert a boolean mask to a 0/1 field.
pub fn mask_to_field(mask: &Mask) -> Field {
    mask.mapv(|m| if m { 1.0 } else { 0.0 })
}

/// Fraction of observed pixels.
pub fn observed_fraction(mask: &Mask) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    mask.iter().filter(|&&m| m).count() as f64 / mask.len() as f64
}
