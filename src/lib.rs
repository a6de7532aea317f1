//! Terrain shadow casting over digital surface models.
//!
//! For every queried cell a ray is marched toward the sun across the height
//! grid; the result is a per-cell height margin (negative = in shadow) that
//! callers can threshold or rescale for display.

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod assemble;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod light;
pub mod precision;
#[cfg(feature = "python")]
mod python;
pub mod session;
pub mod shadowing;

pub use assemble::{scatter, BinaryEncoding, ResultMap, DEFAULT_PLACEHOLDER};
pub use dispatch::{AnyHeightGrid, AnyLightDirection, AnyScoreList, AnyScores};
pub use error::{NonFinite, ShadowError, ShadowResult};
pub use grid::{CellIndex, HeightGrid};
pub use light::{LightDirection, ShadowParams};
pub use precision::{HeightScalar, Precision};
pub use session::{ShadowIndex, ShadowMap};
pub use shadowing::{
    shadow_scores, shadow_scores_at, shadow_scores_at_tracked, shadow_scores_tracked, Visibility,
};

#[cfg(feature = "python")]
#[pymodule]
fn shadowmap(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    register_shadowing_module(py_module)?;
    py_module.add("__doc__", "Terrain shadow maps from elevation rasters, implemented in Rust.")?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_shadowing_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "shadowing")?;
    submodule.add("__doc__", "Sun/shade classification of raster cells.")?;
    submodule.add_function(wrap_pyfunction!(python::shadowmap_raster_f, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(python::shadowmap_raster_d, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(python::shadowmap_indexes_f, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(python::shadowmap_indexes_d, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(python::scatter_indexes, &submodule)?)?;
    submodule.add_class::<python::ShadowRunner>()?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}
