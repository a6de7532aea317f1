//! PyO3 wrappers around the shadow kernel.
//!
//! The `_f` / `_d` entry points take `float32` / `float64` rasters; both call
//! the same generic kernel. Arrays are copied into owned buffers so the GIL
//! can be released while marching.

use ndarray::{Array2, ArrayView1};
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::assemble::{scatter, BinaryEncoding, DEFAULT_PLACEHOLDER};
use crate::error::{ShadowError, ShadowResult};
use crate::grid::{CellIndex, HeightGrid};
use crate::light::{LightDirection, ShadowParams};
use crate::precision::HeightScalar;
use crate::shadowing::{shadow_scores_at, shadow_scores_tracked};

impl From<ShadowError> for PyErr {
    fn from(err: ShadowError) -> PyErr {
        match err {
            ShadowError::Cancelled => pyo3::exceptions::PyInterruptedError::new_err(err.to_string()),
            other => pyo3::exceptions::PyValueError::new_err(other.to_string()),
        }
    }
}

fn build_grid<T: HeightScalar>(heights: Array2<T>, max_elevation: Option<T>) -> ShadowResult<HeightGrid<T>> {
    match max_elevation {
        Some(max) => HeightGrid::with_max_height(heights, max),
        None => HeightGrid::new(heights),
    }
}

fn raster_pure<T: HeightScalar>(
    heights: Array2<T>,
    sun: [T; 3],
    view_height: T,
    max_elevation: Option<T>,
    progress_counter: Option<Arc<AtomicUsize>>,
    cancel_flag: Option<Arc<AtomicBool>>,
) -> ShadowResult<Array2<T>> {
    let grid = build_grid(heights, max_elevation)?;
    let light = LightDirection::new(sun[0], sun[1], sun[2])?;
    shadow_scores_tracked(
        &grid,
        &light,
        &ShadowParams::with_view_offset(view_height),
        progress_counter,
        cancel_flag,
    )
}

fn indexes_pure<T: HeightScalar>(
    heights: Array2<T>,
    indices: Vec<CellIndex>,
    sun: [T; 3],
    view_height: T,
    max_elevation: T,
    encoding: BinaryEncoding,
) -> ShadowResult<Vec<u8>> {
    let grid = HeightGrid::with_max_height(heights, max_elevation)?;
    let light = LightDirection::new(sun[0], sun[1], sun[2])?;
    let scores = shadow_scores_at(&grid, &light, &ShadowParams::with_view_offset(view_height), &indices)?;
    Ok(encoding.encode_list(&scores))
}

/// Pair parallel row/column index arrays, rejecting negative or oversized
/// entries.
fn cell_indices(
    row_idxs: ArrayView1<i64>,
    col_idxs: ArrayView1<i64>,
    shape: (usize, usize),
) -> ShadowResult<Vec<CellIndex>> {
    if row_idxs.len() != col_idxs.len() {
        return Err(ShadowError::LengthMismatch {
            expected: row_idxs.len(),
            found: col_idxs.len(),
        });
    }
    row_idxs
        .iter()
        .zip(col_idxs.iter())
        .map(|(&r, &c)| {
            let in_bounds = r >= 0 && c >= 0 && (r as u64) < shape.0 as u64 && (c as u64) < shape.1 as u64;
            if in_bounds {
                Ok(CellIndex::new(r as usize, c as usize))
            } else {
                Err(ShadowError::OutOfBounds {
                    row: r,
                    col: c,
                    rows: shape.0,
                    cols: shape.1,
                })
            }
        })
        .collect()
}

#[pyfunction]
/// Margin map for a float32 elevation raster (negative = in shade).
pub fn shadowmap_raster_f(
    py: Python<'_>,
    heightmap: PyReadonlyArray2<f32>,
    sun_x: f32,
    sun_y: f32,
    sun_z: f32,
    view_height: f32,
    max_elevation: f32,
) -> PyResult<Py<PyArray2<f32>>> {
    let heights = heightmap.as_array().to_owned();
    let result = py.allow_threads(|| {
        raster_pure(heights, [sun_x, sun_y, sun_z], view_height, Some(max_elevation), None, None)
    })?;
    Ok(result.into_pyarray(py).unbind())
}

#[pyfunction]
/// Margin map for a float64 elevation raster (negative = in shade).
pub fn shadowmap_raster_d(
    py: Python<'_>,
    heightmap: PyReadonlyArray2<f64>,
    sun_x: f64,
    sun_y: f64,
    sun_z: f64,
    view_height: f64,
    max_elevation: f64,
) -> PyResult<Py<PyArray2<f64>>> {
    let heights = heightmap.as_array().to_owned();
    let result = py.allow_threads(|| {
        raster_pure(heights, [sun_x, sun_y, sun_z], view_height, Some(max_elevation), None, None)
    })?;
    Ok(result.into_pyarray(py).unbind())
}

#[pyfunction]
#[pyo3(signature = (heightmap, row_idxs, col_idxs, sun_x, sun_y, sun_z, max_elevation, shade_value=0, lit_value=254, view_height=0.0))]
#[allow(clippy::too_many_arguments)]
/// Shade/lit bytes for the listed cells of a float32 raster.
pub fn shadowmap_indexes_f(
    py: Python<'_>,
    heightmap: PyReadonlyArray2<f32>,
    row_idxs: PyReadonlyArray1<i64>,
    col_idxs: PyReadonlyArray1<i64>,
    sun_x: f32,
    sun_y: f32,
    sun_z: f32,
    max_elevation: f32,
    shade_value: u8,
    lit_value: u8,
    view_height: f32,
) -> PyResult<Py<PyArray1<u8>>> {
    let heights = heightmap.as_array().to_owned();
    let indices = cell_indices(row_idxs.as_array(), col_idxs.as_array(), heights.dim())?;
    let encoding = BinaryEncoding::new(shade_value, lit_value);
    let result = py.allow_threads(|| {
        indexes_pure(heights, indices, [sun_x, sun_y, sun_z], view_height, max_elevation, encoding)
    })?;
    Ok(result.into_pyarray(py).unbind())
}

#[pyfunction]
#[pyo3(signature = (heightmap, row_idxs, col_idxs, sun_x, sun_y, sun_z, max_elevation, shade_value=0, lit_value=254, view_height=0.0))]
#[allow(clippy::too_many_arguments)]
/// Shade/lit bytes for the listed cells of a float64 raster.
pub fn shadowmap_indexes_d(
    py: Python<'_>,
    heightmap: PyReadonlyArray2<f64>,
    row_idxs: PyReadonlyArray1<i64>,
    col_idxs: PyReadonlyArray1<i64>,
    sun_x: f64,
    sun_y: f64,
    sun_z: f64,
    max_elevation: f64,
    shade_value: u8,
    lit_value: u8,
    view_height: f64,
) -> PyResult<Py<PyArray1<u8>>> {
    let heights = heightmap.as_array().to_owned();
    let indices = cell_indices(row_idxs.as_array(), col_idxs.as_array(), heights.dim())?;
    let encoding = BinaryEncoding::new(shade_value, lit_value);
    let result = py.allow_threads(|| {
        indexes_pure(heights, indices, [sun_x, sun_y, sun_z], view_height, max_elevation, encoding)
    })?;
    Ok(result.into_pyarray(py).unbind())
}

#[pyfunction]
#[pyo3(signature = (shape, row_idxs, col_idxs, values, placeholder=DEFAULT_PLACEHOLDER))]
/// Scatter per-index bytes into a canvas filled with `placeholder`.
pub fn scatter_indexes(
    py: Python<'_>,
    shape: (usize, usize),
    row_idxs: PyReadonlyArray1<i64>,
    col_idxs: PyReadonlyArray1<i64>,
    values: PyReadonlyArray1<u8>,
    placeholder: u8,
) -> PyResult<Py<PyArray2<u8>>> {
    let indices = cell_indices(row_idxs.as_array(), col_idxs.as_array(), shape)?;
    let values = values.as_array().to_vec();
    let canvas = scatter(shape, &indices, &values, placeholder)?;
    Ok(canvas.into_pyarray(py).unbind())
}

/// Runner that exposes pollable progress() and cancel() for a dense march.
///
/// Usage from Python:
///   runner = ShadowRunner()
///   # launch runner.compute(...) in a thread
///   # poll runner.progress() (cells finished) from the main thread
///   # call runner.cancel() to stop between row partitions
#[pyclass]
pub struct ShadowRunner {
    progress: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl Default for ShadowRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[pymethods]
impl ShadowRunner {
    #[new]
    pub fn new() -> Self {
        Self {
            progress: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Dense margin map for a float32 or float64 raster. The output dtype
    /// follows the input. `max_elevation=None` computes the maximum.
    #[pyo3(signature = (heightmap, sun_x, sun_y, sun_z, view_height=0.0, max_elevation=None))]
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &self,
        py: Python<'_>,
        heightmap: &Bound<'_, PyAny>,
        sun_x: f64,
        sun_y: f64,
        sun_z: f64,
        view_height: f64,
        max_elevation: Option<f64>,
    ) -> PyResult<PyObject> {
        self.progress.store(0, Ordering::Relaxed);
        self.cancelled.store(false, Ordering::Relaxed);
        let counter = Some(self.progress.clone());
        let cancel = Some(self.cancelled.clone());

        if let Ok(arr) = heightmap.extract::<PyReadonlyArray2<f32>>() {
            let heights = arr.as_array().to_owned();
            let sun = [sun_x as f32, sun_y as f32, sun_z as f32];
            let max = max_elevation.map(|m| m as f32);
            let result = py.allow_threads(|| {
                raster_pure(heights, sun, view_height as f32, max, counter, cancel)
            })?;
            Ok(result.into_pyarray(py).into_any().unbind())
        } else if let Ok(arr) = heightmap.extract::<PyReadonlyArray2<f64>>() {
            let heights = arr.as_array().to_owned();
            let sun = [sun_x, sun_y, sun_z];
            let result = py.allow_threads(|| {
                raster_pure(heights, sun, view_height, max_elevation, counter, cancel)
            })?;
            Ok(result.into_pyarray(py).into_any().unbind())
        } else {
            Err(pyo3::exceptions::PyTypeError::new_err(
                "heightmap must be a 2-D float32 or float64 array.",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cell_indices_checks_bounds_and_lengths() {
        let rows = array![0_i64, 2];
        let cols = array![1_i64, 0];
        let cells = cell_indices(rows.view(), cols.view(), (3, 2)).unwrap();
        assert_eq!(cells, vec![CellIndex::new(0, 1), CellIndex::new(2, 0)]);

        let negative = array![-1_i64, 0];
        assert!(matches!(
            cell_indices(negative.view(), cols.view(), (3, 2)),
            Err(ShadowError::OutOfBounds { row: -1, col: 1, .. })
        ));
        assert!(matches!(
            cell_indices(rows.view(), array![0_i64].view(), (3, 2)),
            Err(ShadowError::LengthMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_indexes_pure_uses_encoding() {
        let bytes = indexes_pure(
            array![[0.0_f32, 4.0, 0.0]],
            vec![CellIndex::new(0, 0), CellIndex::new(0, 2)],
            [1.0, 0.0, 1.0],
            0.0,
            4.0,
            BinaryEncoding::new(1, 2),
        )
        .unwrap();
        assert_eq!(bytes, vec![1, 2]);
    }
}
