//! Light direction in grid units.

use crate::error::{NonFinite, ShadowError, ShadowResult};
use crate::precision::HeightScalar;

/// Direction from a surface point toward the light source.
///
/// `dx` runs along increasing columns, `dy` along increasing rows, and `dz`
/// is the rise per unit of horizontal travel, already scaled by the ground
/// resolution. Only the ratios matter to the march.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightDirection<T> {
    pub dx: T,
    pub dy: T,
    pub dz: T,
}

impl<T: HeightScalar> LightDirection<T> {
    /// Rejects the zero vector and non-finite components. Vectors at or below
    /// the horizon are accepted here and refused by the kernel.
    pub fn new(dx: T, dy: T, dz: T) -> ShadowResult<Self> {
        let direction = Self { dx, dy, dz };
        let finite = dx.is_finite() && dy.is_finite() && dz.is_finite();
        let nonzero = dx != T::ZERO || dy != T::ZERO || dz != T::ZERO;
        if finite && nonzero {
            Ok(direction)
        } else {
            Err(direction.degenerate())
        }
    }

    /// Step vector toward the sun from solar azimuth (degrees clockwise from
    /// north) and altitude (degrees above the horizon).
    ///
    /// North is toward decreasing row indices. `vertical_scale` converts the
    /// vertical component into height units per grid cell.
    pub fn from_sun_angles(azimuth_deg: f64, altitude_deg: f64, vertical_scale: f64) -> ShadowResult<Self> {
        let azimuth = azimuth_deg.to_radians();
        let altitude = altitude_deg.to_radians();
        Self::new(
            T::from_f64(azimuth.sin() * altitude.cos()),
            T::from_f64(-azimuth.cos() * altitude.cos()),
            T::from_f64(altitude.sin() * vertical_scale),
        )
    }

    pub fn is_above_horizon(&self) -> bool {
        self.dz > T::ZERO
    }

    /// Largest horizontal component; the DDA steps one cell along this axis.
    #[inline]
    pub fn dominant_horizontal(&self) -> T {
        self.dx.abs().max(self.dy.abs())
    }

    pub(crate) fn degenerate(&self) -> ShadowError {
        ShadowError::DegenerateDirection {
            dx: self.dx.to_f64(),
            dy: self.dy.to_f64(),
            dz: self.dz.to_f64(),
        }
    }
}

/// Per-call march parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowParams<T> {
    /// Height of the observer above each queried surface cell.
    pub view_offset: T,
}

impl<T: HeightScalar> Default for ShadowParams<T> {
    fn default() -> Self {
        Self {
            view_offset: T::ZERO,
        }
    }
}

impl<T: HeightScalar> ShadowParams<T> {
    pub fn with_view_offset(view_offset: T) -> Self {
        Self { view_offset }
    }

    pub(crate) fn validate(&self) -> ShadowResult<()> {
        if self.view_offset.is_finite() {
            Ok(())
        } else {
            Err(ShadowError::NonFiniteSample(NonFinite::ViewOffset))
        }
    }
}
