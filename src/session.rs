//! Session objects that own their inputs and an explicitly cached result.
//!
//! `compute` runs the kernel and stores the scores; readers get `None` until
//! it has run. Nothing is computed lazily behind an accessor.

use ndarray::Array2;

use crate::assemble::{scatter, BinaryEncoding};
use crate::error::ShadowResult;
use crate::grid::{CellIndex, HeightGrid};
use crate::light::{LightDirection, ShadowParams};
use crate::precision::HeightScalar;
use crate::shadowing::{shadow_scores, shadow_scores_at};

/// Dense shadow map over a whole grid for one light direction.
#[derive(Debug, Clone)]
pub struct ShadowMap<T> {
    grid: HeightGrid<T>,
    light: LightDirection<T>,
    params: ShadowParams<T>,
    scores: Option<Array2<T>>,
}

impl<T: HeightScalar> ShadowMap<T> {
    pub fn new(grid: HeightGrid<T>, light: LightDirection<T>, params: ShadowParams<T>) -> Self {
        Self {
            grid,
            light,
            params,
            scores: None,
        }
    }

    /// Run the kernel (once) and return the cached margins.
    pub fn compute(&mut self) -> ShadowResult<&Array2<T>> {
        let scores = match self.scores.take() {
            Some(scores) => scores,
            None => shadow_scores(&self.grid, &self.light, &self.params)?,
        };
        Ok(&*self.scores.insert(scores))
    }

    pub fn scores(&self) -> Option<&Array2<T>> {
        self.scores.as_ref()
    }

    /// Binary map from the cached scores, if computed.
    pub fn classified(&self, encoding: BinaryEncoding) -> Option<Array2<u8>> {
        self.scores.as_ref().map(|s| encoding.encode_grid(s))
    }

    /// Change the light direction, dropping any cached result.
    pub fn set_light(&mut self, light: LightDirection<T>) {
        self.light = light;
        self.scores = None;
    }

    pub fn grid(&self) -> &HeightGrid<T> {
        &self.grid
    }

    pub fn light(&self) -> &LightDirection<T> {
        &self.light
    }
}

/// Binary visibility for an explicit list of cells.
#[derive(Debug, Clone)]
pub struct ShadowIndex<T> {
    grid: HeightGrid<T>,
    indices: Vec<CellIndex>,
    light: LightDirection<T>,
    params: ShadowParams<T>,
    encoding: BinaryEncoding,
    values: Option<Vec<u8>>,
}

impl<T: HeightScalar> ShadowIndex<T> {
    pub fn new(
        grid: HeightGrid<T>,
        indices: Vec<CellIndex>,
        light: LightDirection<T>,
        params: ShadowParams<T>,
        encoding: BinaryEncoding,
    ) -> Self {
        Self {
            grid,
            indices,
            light,
            params,
            encoding,
            values: None,
        }
    }

    /// Run the kernel (once) and return the cached bytes, in index order.
    pub fn compute(&mut self) -> ShadowResult<&[u8]> {
        let values = match self.values.take() {
            Some(values) => values,
            None => {
                let scores = shadow_scores_at(&self.grid, &self.light, &self.params, &self.indices)?;
                self.encoding.encode_list(&scores)
            }
        };
        Ok(self.values.insert(values).as_slice())
    }

    pub fn values(&self) -> Option<&[u8]> {
        self.values.as_deref()
    }

    /// Grid-shaped canvas with the cached bytes scattered over `placeholder`.
    pub fn canvas(&self, placeholder: u8) -> Option<ShadowResult<Array2<u8>>> {
        self.values
            .as_ref()
            .map(|v| scatter(self.grid.shape(), &self.indices, v, placeholder))
    }

    pub fn indices(&self) -> &[CellIndex] {
        &self.indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::DEFAULT_PLACEHOLDER;
    use ndarray::array;

    fn ridge() -> HeightGrid<f64> {
        HeightGrid::new(array![[0.0, 0.0, 0.0], [0.0, 0.0, 6.0], [0.0, 0.0, 0.0]]).unwrap()
    }

    #[test]
    fn test_shadow_map_caches_until_light_changes() {
        let mut map = ShadowMap::new(
            ridge(),
            LightDirection::new(1.0, 0.0, 1.0).unwrap(),
            ShadowParams::default(),
        );
        assert!(map.scores().is_none());
        assert_eq!(map.compute().unwrap()[[1, 0]], -4.0);
        assert_eq!(
            map.classified(BinaryEncoding::default()).unwrap().row(1).to_vec(),
            vec![0, 0, 254]
        );

        map.set_light(LightDirection::new(-1.0, 0.0, 1.0).unwrap());
        assert!(map.scores().is_none());
        assert!(map.compute().unwrap().iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn test_shadow_index_canvas() {
        let indices = vec![CellIndex::new(1, 0), CellIndex::new(0, 0)];
        let mut index = ShadowIndex::new(
            ridge(),
            indices,
            LightDirection::new(1.0, 0.0, 1.0).unwrap(),
            ShadowParams::default(),
            BinaryEncoding::default(),
        );
        assert!(index.canvas(DEFAULT_PLACEHOLDER).is_none());
        assert_eq!(index.compute().unwrap(), &[0, 254]);
        let canvas = index.canvas(DEFAULT_PLACEHOLDER).unwrap().unwrap();
        assert_eq!(
            canvas,
            array![[254u8, 128, 128], [0, 128, 128], [128, 128, 128]]
        );
    }

    #[test]
    fn test_failed_compute_caches_nothing() {
        let mut index = ShadowIndex::new(
            ridge(),
            vec![CellIndex::new(3, 0)],
            LightDirection::new(1.0, 0.0, 1.0).unwrap(),
            ShadowParams::default(),
            BinaryEncoding::default(),
        );
        assert!(index.compute().is_err());
        assert!(index.values().is_none());
    }
}
