//! Error taxonomy for shadow computations.
//!
//! Every variant is raised during call-entry validation. Once a march has
//! started it cannot fail, so no partial results are ever returned.

use std::fmt;

use crate::precision::Precision;

/// Which input carried a non-finite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFinite {
    Cell { row: usize, col: usize },
    MaxHeight,
    ViewOffset,
}

impl fmt::Display for NonFinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonFinite::Cell { row, col } => write!(f, "height sample at ({row}, {col})"),
            NonFinite::MaxHeight => write!(f, "maximum height bound"),
            NonFinite::ViewOffset => write!(f, "view offset"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("height grid must have at least one row and one column, got {rows}x{cols}")]
    InvalidGridDimensions { rows: usize, cols: usize },

    #[error("non-finite {0}")]
    NonFiniteSample(NonFinite),

    #[error("light direction ({dx}, {dy}, {dz}) is zero, non-finite or not above the horizon")]
    DegenerateDirection { dx: f64, dy: f64, dz: f64 },

    #[error("cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: i64,
        col: i64,
        rows: usize,
        cols: usize,
    },

    #[error("height grid is {grid} precision but light direction is {light}")]
    PrecisionMismatch { grid: Precision, light: Precision },

    #[error("expected {expected} values to match the index list, got {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("shadow computation cancelled")]
    Cancelled,

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl ShadowError {
    pub(crate) fn out_of_bounds(row: usize, col: usize, shape: (usize, usize)) -> Self {
        ShadowError::OutOfBounds {
            row: row as i64,
            col: col as i64,
            rows: shape.0,
            cols: shape.1,
        }
    }
}

pub type ShadowResult<T> = Result<T, ShadowError>;
