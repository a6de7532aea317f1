//! Floating-point width abstraction.
//!
//! The kernel is written once against [`HeightScalar`] and monomorphized for
//! `f32` and `f64`. Runtime width selection happens only in `dispatch`.

use std::fmt::{self, Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Numeric width of a grid or direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Single,
    Double,
}

impl Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Single => write!(f, "32-bit"),
            Precision::Double => write!(f, "64-bit"),
        }
    }
}

/// Scalar type a height grid can be stored and marched in.
pub trait HeightScalar:
    Copy
    + PartialOrd
    + Debug
    + Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    const ZERO: Self;
    const HALF: Self;
    const PRECISION: Precision;

    fn from_f64(value: f64) -> Self;
    fn from_usize(value: usize) -> Self;
    fn to_f64(self) -> f64;
    fn is_finite(self) -> bool;
    fn abs(self) -> Self;
    /// Index of the grid cell whose centre is nearest, cells being centred
    /// on integer coordinates.
    fn cell_index(self) -> isize;

    fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    fn min(self, other: Self) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }
}

macro_rules! impl_height_scalar {
    ($t:ty, $precision:expr) => {
        impl HeightScalar for $t {
            const ZERO: Self = 0.0;
            const HALF: Self = 0.5;
            const PRECISION: Precision = $precision;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn from_usize(value: usize) -> Self {
                value as $t
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }

            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            #[inline]
            fn cell_index(self) -> isize {
                (self + 0.5).floor() as isize
            }
        }
    };
}

impl_height_scalar!(f32, Precision::Single);
impl_height_scalar!(f64, Precision::Double);
