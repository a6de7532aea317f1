//! Shaping kernel output: dense pass-through, sparse scatter onto a
//! placeholder canvas, and binary byte encoding.

use ndarray::Array2;

use crate::error::{ShadowError, ShadowResult};
use crate::grid::CellIndex;
use crate::precision::HeightScalar;
use crate::shadowing::Visibility;

/// Default canvas value for cells that were not queried.
pub const DEFAULT_PLACEHOLDER: u8 = 128;

/// Byte values written for the two visibility classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryEncoding {
    pub shade_value: u8,
    pub lit_value: u8,
}

impl Default for BinaryEncoding {
    fn default() -> Self {
        Self {
            shade_value: 0,
            lit_value: 254,
        }
    }
}

impl BinaryEncoding {
    pub fn new(shade_value: u8, lit_value: u8) -> Self {
        Self {
            shade_value,
            lit_value,
        }
    }

    #[inline]
    pub fn encode<T: HeightScalar>(&self, score: T) -> u8 {
        match Visibility::of(score) {
            Visibility::Lit => self.lit_value,
            Visibility::Occluded => self.shade_value,
        }
    }

    pub fn encode_grid<T: HeightScalar>(&self, scores: &Array2<T>) -> Array2<u8> {
        scores.mapv(|s| self.encode(s))
    }

    pub fn encode_list<T: HeightScalar>(&self, scores: &[T]) -> Vec<u8> {
        scores.iter().map(|&s| self.encode(s)).collect()
    }
}

/// Kernel output in either query shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultMap<T> {
    Dense(Array2<T>),
    Sparse {
        shape: (usize, usize),
        indices: Vec<CellIndex>,
        scores: Vec<T>,
    },
}

impl<T: Copy> ResultMap<T> {
    /// Pair sparse scores with their indices, checking lengths and bounds.
    pub fn sparse(shape: (usize, usize), indices: Vec<CellIndex>, scores: Vec<T>) -> ShadowResult<Self> {
        check_sparse(shape, &indices, scores.len())?;
        Ok(ResultMap::Sparse {
            shape,
            indices,
            scores,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            ResultMap::Dense(scores) => scores.dim(),
            ResultMap::Sparse { shape, .. } => *shape,
        }
    }

    /// Grid-shaped view of the result; unqueried cells hold `placeholder`.
    pub fn into_canvas(self, placeholder: T) -> ShadowResult<Array2<T>> {
        match self {
            ResultMap::Dense(scores) => Ok(scores),
            ResultMap::Sparse {
                shape,
                indices,
                scores,
            } => scatter(shape, &indices, &scores, placeholder),
        }
    }

    pub fn map<U, F: Fn(T) -> U>(self, f: F) -> ResultMap<U> {
        match self {
            ResultMap::Dense(scores) => ResultMap::Dense(scores.mapv(f)),
            ResultMap::Sparse {
                shape,
                indices,
                scores,
            } => ResultMap::Sparse {
                shape,
                indices,
                scores: scores.into_iter().map(f).collect(),
            },
        }
    }
}

/// Allocate a `shape` canvas filled with `placeholder` and assign each value
/// at its index. Later duplicates overwrite earlier ones.
pub fn scatter<T: Copy>(
    shape: (usize, usize),
    indices: &[CellIndex],
    values: &[T],
    placeholder: T,
) -> ShadowResult<Array2<T>> {
    check_sparse(shape, indices, values.len())?;
    let mut canvas = Array2::from_elem(shape, placeholder);
    for (idx, &value) in indices.iter().zip(values) {
        canvas[[idx.row, idx.col]] = value;
    }
    Ok(canvas)
}

fn check_sparse(shape: (usize, usize), indices: &[CellIndex], found: usize) -> ShadowResult<()> {
    if indices.len() != found {
        return Err(ShadowError::LengthMismatch {
            expected: indices.len(),
            found,
        });
    }
    if let Some(bad) = indices.iter().find(|idx| idx.row >= shape.0 || idx.col >= shape.1) {
        return Err(ShadowError::out_of_bounds(bad.row, bad.col, shape));
    }
    Ok(())
}
