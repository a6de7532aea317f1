//! Immutable terrain height grid with a cached maximum height.

use ndarray::{Array2, ArrayView2};
use ndarray_stats::QuantileExt;

use crate::error::{NonFinite, ShadowError, ShadowResult};
use crate::precision::HeightScalar;

/// A `(row, col)` position in a height grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    pub row: usize,
    pub col: usize,
}

impl CellIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for CellIndex {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Row-major height samples plus the elevation ceiling used to stop marches
/// early.
///
/// The ceiling is computed once at construction or supplied by the caller; it
/// is never recomputed per query.
#[derive(Debug, Clone)]
pub struct HeightGrid<T> {
    heights: Array2<T>,
    max_height: T,
}

impl<T: HeightScalar> HeightGrid<T> {
    /// Build a grid and compute its maximum height.
    pub fn new(heights: Array2<T>) -> ShadowResult<Self> {
        validate_samples(heights.view())?;
        let max_height = *heights.max().map_err(|_| ShadowError::InvalidGridDimensions {
            rows: heights.nrows(),
            cols: heights.ncols(),
        })?;
        Ok(Self {
            heights,
            max_height,
        })
    }

    /// Build a grid with a caller-supplied elevation ceiling.
    ///
    /// The bound is trusted: marches stop as soon as the ray rises above it,
    /// so a bound lower than the true maximum hides taller terrain.
    pub fn with_max_height(heights: Array2<T>, max_height: T) -> ShadowResult<Self> {
        validate_samples(heights.view())?;
        if !max_height.is_finite() {
            return Err(ShadowError::NonFiniteSample(NonFinite::MaxHeight));
        }
        Ok(Self {
            heights,
            max_height,
        })
    }

    pub fn from_shape_vec(rows: usize, cols: usize, samples: Vec<T>) -> ShadowResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(ShadowError::InvalidGridDimensions { rows, cols });
        }
        Self::new(Array2::from_shape_vec((rows, cols), samples)?)
    }

    pub fn height_at(&self, row: usize, col: usize) -> ShadowResult<T> {
        self.heights
            .get((row, col))
            .copied()
            .ok_or_else(|| ShadowError::out_of_bounds(row, col, self.shape()))
    }

    /// Unchecked read for the march loop; callers have bounds-checked.
    #[inline]
    pub(crate) fn sample(&self, row: usize, col: usize) -> T {
        self.heights[[row, col]]
    }

    #[inline]
    pub fn max_height(&self) -> T {
        self.max_height
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.heights.nrows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.heights.ncols()
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.heights.dim()
    }

    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows() && col < self.cols()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.heights.view()
    }

    pub fn into_inner(self) -> Array2<T> {
        self.heights
    }
}

fn validate_samples<T: HeightScalar>(heights: ArrayView2<T>) -> ShadowResult<()> {
    let (rows, cols) = heights.dim();
    if rows == 0 || cols == 0 {
        return Err(ShadowError::InvalidGridDimensions { rows, cols });
    }
    if let Some(((row, col), _)) = heights.indexed_iter().find(|(_, h)| !h.is_finite()) {
        return Err(ShadowError::NonFiniteSample(NonFinite::Cell { row, col }));
    }
    Ok(())
}
