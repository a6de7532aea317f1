//! Runtime precision selection.
//!
//! Loaders and bindings that only learn the sample width at runtime wrap
//! their inputs here; the kernel itself stays generic.

use ndarray::Array2;

use crate::error::{ShadowError, ShadowResult};
use crate::grid::{CellIndex, HeightGrid};
use crate::light::{LightDirection, ShadowParams};
use crate::precision::Precision;
use crate::shadowing::{shadow_scores, shadow_scores_at};

#[derive(Debug, Clone)]
pub enum AnyHeightGrid {
    Single(HeightGrid<f32>),
    Double(HeightGrid<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnyLightDirection {
    Single(LightDirection<f32>),
    Double(LightDirection<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnyScores {
    Single(Array2<f32>),
    Double(Array2<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnyScoreList {
    Single(Vec<f32>),
    Double(Vec<f64>),
}

impl AnyHeightGrid {
    pub fn precision(&self) -> Precision {
        match self {
            AnyHeightGrid::Single(_) => Precision::Single,
            AnyHeightGrid::Double(_) => Precision::Double,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            AnyHeightGrid::Single(grid) => grid.shape(),
            AnyHeightGrid::Double(grid) => grid.shape(),
        }
    }
}

impl From<HeightGrid<f32>> for AnyHeightGrid {
    fn from(grid: HeightGrid<f32>) -> Self {
        AnyHeightGrid::Single(grid)
    }
}

impl From<HeightGrid<f64>> for AnyHeightGrid {
    fn from(grid: HeightGrid<f64>) -> Self {
        AnyHeightGrid::Double(grid)
    }
}

impl AnyLightDirection {
    pub fn precision(&self) -> Precision {
        match self {
            AnyLightDirection::Single(_) => Precision::Single,
            AnyLightDirection::Double(_) => Precision::Double,
        }
    }
}

impl From<LightDirection<f32>> for AnyLightDirection {
    fn from(light: LightDirection<f32>) -> Self {
        AnyLightDirection::Single(light)
    }
}

impl From<LightDirection<f64>> for AnyLightDirection {
    fn from(light: LightDirection<f64>) -> Self {
        AnyLightDirection::Double(light)
    }
}

impl AnyScores {
    pub fn precision(&self) -> Precision {
        match self {
            AnyScores::Single(_) => Precision::Single,
            AnyScores::Double(_) => Precision::Double,
        }
    }
}

fn mismatch(grid: &AnyHeightGrid, light: &AnyLightDirection) -> ShadowError {
    ShadowError::PrecisionMismatch {
        grid: grid.precision(),
        light: light.precision(),
    }
}

/// Dense march in whichever width both inputs share.
pub fn shadow_scores_any(
    grid: &AnyHeightGrid,
    light: &AnyLightDirection,
    view_offset: f64,
) -> ShadowResult<AnyScores> {
    log::trace!("dispatching dense march at {} precision", grid.precision());
    match (grid, light) {
        (AnyHeightGrid::Single(g), AnyLightDirection::Single(l)) => {
            let params = ShadowParams::with_view_offset(view_offset as f32);
            shadow_scores(g, l, &params).map(AnyScores::Single)
        }
        (AnyHeightGrid::Double(g), AnyLightDirection::Double(l)) => {
            let params = ShadowParams::with_view_offset(view_offset);
            shadow_scores(g, l, &params).map(AnyScores::Double)
        }
        _ => Err(mismatch(grid, light)),
    }
}

/// Sparse march in whichever width both inputs share.
pub fn shadow_scores_at_any(
    grid: &AnyHeightGrid,
    light: &AnyLightDirection,
    view_offset: f64,
    indices: &[CellIndex],
) -> ShadowResult<AnyScoreList> {
    log::trace!("dispatching sparse march at {} precision", grid.precision());
    match (grid, light) {
        (AnyHeightGrid::Single(g), AnyLightDirection::Single(l)) => {
            let params = ShadowParams::with_view_offset(view_offset as f32);
            shadow_scores_at(g, l, &params, indices).map(AnyScoreList::Single)
        }
        (AnyHeightGrid::Double(g), AnyLightDirection::Double(l)) => {
            let params = ShadowParams::with_view_offset(view_offset);
            shadow_scores_at(g, l, &params, indices).map(AnyScoreList::Double)
        }
        _ => Err(mismatch(grid, light)),
    }
}
