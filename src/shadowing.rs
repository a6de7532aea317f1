//! Shadow casting over a height grid.
//!
//! Each queried cell marches a ray toward the light in one-cell steps along
//! the dominant horizontal axis (a 3-D DDA). The march ends as soon as the
//! ray leaves the grid, rises above the grid's maximum height, or passes
//! below the terrain.
//!
//! Scores are height margins: negative values are the deficit at the
//! occluding sample, non-negative values the smallest clearance seen along a
//! lit ray. A ray exactly touching the terrain counts as lit.

use ndarray::Array2;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{ShadowError, ShadowResult};
use crate::grid::{CellIndex, HeightGrid};
use crate::light::{LightDirection, ShadowParams};
use crate::precision::HeightScalar;

// Sparse queries are split into partitions of this many cells
const SPARSE_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Lit,
    Occluded,
}

impl Visibility {
    /// Binary classification of a margin score.
    #[inline]
    pub fn of<T: HeightScalar>(score: T) -> Self {
        if score < T::ZERO {
            Visibility::Occluded
        } else {
            Visibility::Lit
        }
    }

    pub fn is_lit(self) -> bool {
        self == Visibility::Lit
    }
}

/// Per-step increments, normalized so the dominant horizontal axis advances
/// exactly one cell.
#[derive(Debug, Clone, Copy)]
struct RayStep<T> {
    sx: T,
    sy: T,
    sz: T,
    horizontal: bool,
}

impl<T: HeightScalar> RayStep<T> {
    fn new(light: &LightDirection<T>) -> Self {
        let dominant = light.dominant_horizontal();
        if dominant == T::ZERO {
            // Light at the zenith: the ray never leaves its own column.
            return Self {
                sx: T::ZERO,
                sy: T::ZERO,
                sz: light.dz,
                horizontal: false,
            };
        }
        Self {
            sx: light.dx / dominant,
            sy: light.dy / dominant,
            sz: light.dz / dominant,
            horizontal: true,
        }
    }
}

/// Validate everything a march depends on and precompute the step.
fn prepare<T: HeightScalar>(
    grid: &HeightGrid<T>,
    light: &LightDirection<T>,
    params: &ShadowParams<T>,
) -> ShadowResult<RayStep<T>> {
    if !grid.max_height().is_finite() {
        return Err(ShadowError::NonFiniteSample(crate::error::NonFinite::MaxHeight));
    }
    params.validate()?;
    let light = LightDirection::new(light.dx, light.dy, light.dz)?;
    if !light.is_above_horizon() {
        return Err(light.degenerate());
    }
    Ok(RayStep::new(&light))
}

/// March a single cell. Inputs must already be validated by `prepare`.
#[inline]
fn march_cell<T: HeightScalar>(
    grid: &HeightGrid<T>,
    step: &RayStep<T>,
    view_offset: T,
    row: usize,
    col: usize,
) -> T {
    // Clearance over the cell's own surface
    let mut margin = view_offset;
    if margin < T::ZERO || !step.horizontal {
        return margin;
    }

    let (rows, cols) = grid.shape();
    let max_height = grid.max_height();
    let x0 = T::from_usize(col);
    let y0 = T::from_usize(row);
    let z0 = grid.sample(row, col) + view_offset;

    let mut index = 1usize;
    loop {
        let k = T::from_usize(index);
        let z = z0 + step.sz * k;
        if z > max_height {
            return margin;
        }

        let c = (x0 + step.sx * k).cell_index();
        let r = (y0 + step.sy * k).cell_index();
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            return margin;
        }

        let clearance = z - grid.sample(r as usize, c as usize);
        if clearance < T::ZERO {
            return clearance;
        }
        margin = margin.min(clearance);
        index += 1;
    }
}

#[inline]
fn is_cancelled(cancel_flag: &Option<Arc<AtomicBool>>) -> bool {
    cancel_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Margin score for every cell of the grid, in grid shape.
pub fn shadow_scores<T: HeightScalar>(
    grid: &HeightGrid<T>,
    light: &LightDirection<T>,
    params: &ShadowParams<T>,
) -> ShadowResult<Array2<T>> {
    shadow_scores_tracked(grid, light, params, None, None)
}

/// Dense march with an optional progress counter (cells finished) and a
/// cancel flag checked between row partitions.
pub fn shadow_scores_tracked<T: HeightScalar>(
    grid: &HeightGrid<T>,
    light: &LightDirection<T>,
    params: &ShadowParams<T>,
    progress_counter: Option<Arc<AtomicUsize>>,
    cancel_flag: Option<Arc<AtomicBool>>,
) -> ShadowResult<Array2<T>> {
    let step = prepare(grid, light, params)?;
    let (rows, cols) = grid.shape();
    let view_offset = params.view_offset;

    log::debug!(
        "marching {}x{} grid at {} precision, step ({}, {}, {})",
        rows,
        cols,
        T::PRECISION,
        step.sx,
        step.sy,
        step.sz
    );

    if let Some(ref counter) = progress_counter {
        counter.store(0, Ordering::Relaxed);
    }

    let mut scores = vec![T::ZERO; rows * cols];
    scores
        .par_chunks_mut(cols)
        .enumerate()
        .try_for_each(|(row, out_row)| {
            if is_cancelled(&cancel_flag) {
                return Err(ShadowError::Cancelled);
            }
            for (col, out) in out_row.iter_mut().enumerate() {
                *out = march_cell(grid, &step, view_offset, row, col);
            }
            if let Some(ref counter) = progress_counter {
                counter.fetch_add(cols, Ordering::Relaxed);
            }
            Ok(())
        })
        .inspect_err(|e| log::debug!("dense shadow march aborted: {e}"))?;

    Ok(Array2::from_shape_vec((rows, cols), scores)?)
}

/// Margin scores for an explicit list of cells, in list order.
///
/// Each score equals the dense result at the same cell.
pub fn shadow_scores_at<T: HeightScalar>(
    grid: &HeightGrid<T>,
    light: &LightDirection<T>,
    params: &ShadowParams<T>,
    indices: &[CellIndex],
) -> ShadowResult<Vec<T>> {
    shadow_scores_at_tracked(grid, light, params, indices, None, None)
}

pub fn shadow_scores_at_tracked<T: HeightScalar>(
    grid: &HeightGrid<T>,
    light: &LightDirection<T>,
    params: &ShadowParams<T>,
    indices: &[CellIndex],
    progress_counter: Option<Arc<AtomicUsize>>,
    cancel_flag: Option<Arc<AtomicBool>>,
) -> ShadowResult<Vec<T>> {
    let step = prepare(grid, light, params)?;
    if let Some(bad) = indices.iter().find(|idx| !grid.contains(idx.row, idx.col)) {
        return Err(ShadowError::out_of_bounds(bad.row, bad.col, grid.shape()));
    }
    let view_offset = params.view_offset;

    log::debug!(
        "marching {} of {} cells at {} precision",
        indices.len(),
        grid.rows() * grid.cols(),
        T::PRECISION
    );

    if let Some(ref counter) = progress_counter {
        counter.store(0, Ordering::Relaxed);
    }

    let mut scores = vec![T::ZERO; indices.len()];
    scores
        .par_chunks_mut(SPARSE_CHUNK)
        .zip(indices.par_chunks(SPARSE_CHUNK))
        .try_for_each(|(out_chunk, idx_chunk)| {
            if is_cancelled(&cancel_flag) {
                return Err(ShadowError::Cancelled);
            }
            for (out, idx) in out_chunk.iter_mut().zip(idx_chunk) {
                *out = march_cell(grid, &step, view_offset, idx.row, idx.col);
            }
            if let Some(ref counter) = progress_counter {
                counter.fetch_add(idx_chunk.len(), Ordering::Relaxed);
            }
            Ok(())
        })
        .inspect_err(|e| log::debug!("sparse shadow march aborted: {e}"))?;

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NonFinite;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn spike_grid() -> HeightGrid<f64> {
        let mut heights = Array2::<f64>::zeros((5, 5));
        heights.column_mut(0).fill(10.0);
        HeightGrid::with_max_height(heights, 10.0).unwrap()
    }

    fn rolling_grid(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| ((r * 7 + c * 13) % 11) as f64)
    }

    fn dir(dx: f64, dy: f64, dz: f64) -> LightDirection<f64> {
        LightDirection::new(dx, dy, dz).unwrap()
    }

    #[test]
    fn test_flat_grid_is_lit() {
        let grid = HeightGrid::new(Array2::<f32>::from_elem((6, 9), 3.25)).unwrap();
        for light in [
            LightDirection::new(1.0_f32, 0.0, 0.1).unwrap(),
            LightDirection::new(-0.3, 0.9, 0.05).unwrap(),
            LightDirection::new(0.0, 0.0, 1.0).unwrap(),
        ] {
            let scores = shadow_scores(&grid, &light, &ShadowParams::default()).unwrap();
            assert!(scores.iter().all(|&s| Visibility::of(s).is_lit()));
        }
    }

    #[test]
    fn test_spike_with_light_away_from_spike() {
        let grid = spike_grid();
        let scores = shadow_scores(&grid, &dir(1.0, 0.0, 0.5), &ShadowParams::default()).unwrap();
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_spike_shallow_light_shades_every_column() {
        let grid = spike_grid();
        let scores = shadow_scores(&grid, &dir(-1.0, 0.0, 0.5), &ShadowParams::default()).unwrap();
        for row in scores.rows() {
            assert_eq!(row.to_vec(), vec![0.0, -9.5, -9.0, -8.5, -8.0]);
        }
    }

    #[test]
    fn test_spike_steep_light_clears_max_height() {
        let grid = spike_grid();
        let scores = shadow_scores(&grid, &dir(-1.0, 0.0, 4.0), &ShadowParams::default()).unwrap();
        for row in scores.rows() {
            assert_eq!(row.to_vec(), vec![0.0, -6.0, -2.0, 0.0, 0.0]);
        }
        let occluded: Vec<usize> = scores
            .row(0)
            .iter()
            .enumerate()
            .filter(|(_, s)| Visibility::of(**s) == Visibility::Occluded)
            .map(|(c, _)| c)
            .collect();
        assert_eq!(occluded, vec![1, 2]);
    }

    #[test]
    fn test_diagonal_tower() {
        let mut heights = Array2::<f64>::zeros((4, 4));
        heights[[2, 2]] = 5.0;
        let grid = HeightGrid::new(heights).unwrap();
        let scores = shadow_scores(&grid, &dir(1.0, 1.0, 1.0), &ShadowParams::default()).unwrap();
        assert_eq!(scores[[0, 0]], -3.0);
        assert_eq!(scores[[1, 1]], -4.0);
        assert_eq!(scores[[3, 3]], 0.0);
        // Off the diagonal the ray misses the tower
        assert_eq!(scores[[0, 1]], 0.0);
    }

    #[test]
    fn test_lit_score_is_smallest_clearance() {
        let grid = HeightGrid::new(array![[0.0_f64, 1.5, 0.0, 0.0, 4.0]]).unwrap();
        let scores = shadow_scores(&grid, &dir(1.0, 0.0, 2.0), &ShadowParams::with_view_offset(1.0)).unwrap();
        // From col 0: z = 3 over 1.5, then z = 5 > max
        assert_eq!(scores[[0, 0]], 1.0);
        let grid = HeightGrid::new(array![[0.0_f64, 1.5, 0.0, 0.0, 0.0]]).unwrap();
        let scores = shadow_scores(&grid, &dir(1.0, 0.0, 0.5), &ShadowParams::with_view_offset(1.0)).unwrap();
        // z = 1.5 over 1.5 is a touch, which counts as lit
        assert_eq!(scores[[0, 0]], 0.0);
    }

    #[test]
    fn test_view_offset_lifts_observer_out_of_shadow() {
        let grid = spike_grid();
        let light = dir(-1.0, 0.0, 4.0);
        let ground = shadow_scores(&grid, &light, &ShadowParams::default()).unwrap();
        let raised = shadow_scores(&grid, &light, &ShadowParams::with_view_offset(3.0)).unwrap();
        assert!(ground[[2, 2]] < 0.0);
        assert_eq!(raised[[2, 2]], 3.0);
        assert_eq!(raised[[2, 1]], -3.0);
    }

    #[test]
    fn test_negative_view_offset_self_occludes() {
        let grid = spike_grid();
        let scores = shadow_scores(&grid, &dir(1.0, 0.0, 1.0), &ShadowParams::with_view_offset(-0.25)).unwrap();
        assert!(scores.iter().all(|&s| s == -0.25));
    }

    #[test]
    fn test_zenith_light_is_lit_everywhere() {
        let grid = HeightGrid::new(rolling_grid(5, 7)).unwrap();
        let scores = shadow_scores(&grid, &dir(0.0, 0.0, 1.0), &ShadowParams::with_view_offset(0.5)).unwrap();
        assert!(scores.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_occlusion_monotonicity() {
        let light = dir(-1.0, 0.0, 1.0);
        let mut was_occluded = false;
        for blocker in 0..=10 {
            let mut heights = Array2::<f64>::zeros((1, 6));
            heights[[0, 2]] = blocker as f64;
            let grid = HeightGrid::new(heights).unwrap();
            let score = shadow_scores(&grid, &light, &ShadowParams::default()).unwrap()[[0, 5]];
            let occluded = Visibility::of(score) == Visibility::Occluded;
            assert!(!(was_occluded && !occluded), "raising blocker to {blocker} lit the cell");
            was_occluded = occluded;
        }
        assert!(was_occluded);
    }

    #[test]
    fn test_dense_sparse_consistency() {
        let grid = HeightGrid::new(rolling_grid(17, 23)).unwrap();
        let light = dir(0.3, -0.8, 0.2);
        let params = ShadowParams::with_view_offset(0.75);
        let dense = shadow_scores(&grid, &light, &params).unwrap();

        let indices: Vec<CellIndex> = (0..grid.rows())
            .rev()
            .flat_map(|r| (0..grid.cols()).step_by(3).map(move |c| CellIndex::new(r, c)))
            .chain([CellIndex::new(4, 4), CellIndex::new(4, 4)])
            .collect();
        let sparse = shadow_scores_at(&grid, &light, &params, &indices).unwrap();

        assert_eq!(sparse.len(), indices.len());
        for (idx, score) in indices.iter().zip(&sparse) {
            assert_eq!(score.to_bits(), dense[[idx.row, idx.col]].to_bits());
        }
    }

    #[test]
    fn test_declared_max_height_is_used() {
        let heights = array![[50.0_f64, 0.0, 0.0, 0.0, 0.0]];
        let light = dir(-1.0, 0.0, 1.0);
        let honest = HeightGrid::new(heights.clone()).unwrap();
        let understated = HeightGrid::with_max_height(heights, 2.0).unwrap();

        let honest_scores = shadow_scores(&honest, &light, &ShadowParams::default()).unwrap();
        let understated_scores = shadow_scores(&understated, &light, &ShadowParams::default()).unwrap();

        assert_eq!(honest_scores[[0, 4]], -46.0);
        assert_eq!(understated_scores[[0, 4]], 0.0);
        assert_ne!(honest_scores, understated_scores);
    }

    #[test]
    fn test_idempotent() {
        let grid = HeightGrid::new(rolling_grid(31, 29)).unwrap();
        let light = dir(0.6, 0.45, 0.35);
        let params = ShadowParams::with_view_offset(0.1);
        let first = shadow_scores(&grid, &light, &params).unwrap();
        let second = shadow_scores(&grid, &light, &params).unwrap();
        assert!(first.iter().zip(second.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_precision_agreement() {
        let heights64 = rolling_grid(12, 15);
        let heights32 = heights64.mapv(|h| h as f32);
        let grid64 = HeightGrid::new(heights64).unwrap();
        let grid32 = HeightGrid::new(heights32).unwrap();

        for (dx, dy, dz) in [(-1.0, 0.5, 0.75), (0.25, 1.0, 1.5), (1.0, -1.0, 0.5)] {
            let s64 = shadow_scores(&grid64, &dir(dx, dy, dz), &ShadowParams::default()).unwrap();
            let light32 = LightDirection::new(dx as f32, dy as f32, dz as f32).unwrap();
            let s32 = shadow_scores(&grid32, &light32, &ShadowParams::default()).unwrap();
            for (a, b) in s64.iter().zip(s32.iter()) {
                assert_eq!(Visibility::of(*a), Visibility::of(*b));
                assert_abs_diff_eq!(*a, *b as f64, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_light_below_horizon_rejected() {
        let grid = spike_grid();
        for dz in [0.0, -0.5] {
            let light = dir(1.0, 0.0, dz);
            assert!(matches!(
                shadow_scores(&grid, &light, &ShadowParams::default()),
                Err(ShadowError::DegenerateDirection { .. })
            ));
        }
    }

    #[test]
    fn test_hand_built_degenerate_direction_rejected() {
        let grid = spike_grid();
        let light = LightDirection { dx: 0.0, dy: 0.0, dz: f64::NAN };
        assert!(matches!(
            shadow_scores_at(&grid, &light, &ShadowParams::default(), &[CellIndex::new(0, 0)]),
            Err(ShadowError::DegenerateDirection { .. })
        ));
    }

    #[test]
    fn test_non_finite_view_offset_rejected() {
        let grid = spike_grid();
        let err = shadow_scores(&grid, &dir(1.0, 0.0, 1.0), &ShadowParams::with_view_offset(f64::NAN)).unwrap_err();
        assert!(matches!(err, ShadowError::NonFiniteSample(NonFinite::ViewOffset)));
    }

    #[test]
    fn test_sparse_out_of_bounds_rejected() {
        let grid = spike_grid();
        let indices = [CellIndex::new(0, 0), CellIndex::new(2, 5)];
        assert!(matches!(
            shadow_scores_at(&grid, &dir(1.0, 0.0, 1.0), &ShadowParams::default(), &indices),
            Err(ShadowError::OutOfBounds { row: 2, col: 5, rows: 5, cols: 5 })
        ));
    }

    #[test]
    fn test_progress_counts_every_cell() {
        let grid = HeightGrid::new(rolling_grid(9, 4)).unwrap();
        let counter = Arc::new(AtomicUsize::new(123));
        shadow_scores_tracked(
            &grid,
            &dir(1.0, 0.2, 0.3),
            &ShadowParams::default(),
            Some(counter.clone()),
            None,
        )
        .unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 36);

        let indices = vec![CellIndex::new(1, 1); 10];
        shadow_scores_at_tracked(
            &grid,
            &dir(1.0, 0.2, 0.3),
            &ShadowParams::default(),
            &indices,
            Some(counter.clone()),
            None,
        )
        .unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_cancelled_before_start() {
        let grid = HeightGrid::new(rolling_grid(8, 8)).unwrap();
        let cancel = Arc::new(AtomicBool::new(true));
        let result = shadow_scores_tracked(
            &grid,
            &dir(1.0, 0.0, 0.3),
            &ShadowParams::default(),
            None,
            Some(cancel),
        );
        assert!(matches!(result, Err(ShadowError::Cancelled)));
    }
}
