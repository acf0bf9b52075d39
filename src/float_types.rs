// Re-export parry for the appropriate float size
#[cfg(feature = "f64")]
pub use parry3d_f64 as parry3d;

#[cfg(feature = "f32")]
pub use parry3d;

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// Lazily-initialized on-plane tolerance used across the crate.
/// Defaults depend on precision (`f32` vs `f64`), but can be overridden:
///  1) **Build-time**: set env var `ACOUSTIC_BSP_TOLERANCE` (e.g. `ACOUSTIC_BSP_TOLERANCE=1e-7 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

/// Distance under which a computed intersection snaps onto an existing vertex.
static SNAP_TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    #[cfg(feature = "f32")]
    {
        1e-4
    }
    #[cfg(feature = "f64")]
    {
        1e-6
    }
}

fn from_env(value: Option<&'static str>) -> Option<Real> {
    value
        .and_then(|v| Real::from_str(v).ok())
        .filter(|v| v.is_finite())
        .map(|v| v.max(Real::EPSILON))
}

/// Returns the absolute distance within which a point is classified as lying
/// *on* a plane (and within which two vertices are welded together).
pub fn tolerance() -> Real {
    *TOLERANCE_CELL
        .get_or_init(|| from_env(option_env!("ACOUSTIC_BSP_TOLERANCE")).unwrap_or(default_tolerance()))
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
/// Call near program start: `acoustic_bsp::float_types::set_tolerance(1e-7);`
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Returns the distance under which an intersection point is treated as the
/// existing vertex it lands on. No new point is created in that case.
///
/// Falls back to [`tolerance`] unless `ACOUSTIC_BSP_SNAP_TOLERANCE` was set at
/// build time or [`set_snap_tolerance`] was called.
pub fn snap_tolerance() -> Real {
    *SNAP_TOLERANCE_CELL
        .get_or_init(|| from_env(option_env!("ACOUSTIC_BSP_SNAP_TOLERANCE")).unwrap_or_else(tolerance))
}

/// Set the snap tolerance programmatically once (subsequent calls are ignored).
pub fn set_snap_tolerance(value: Real) {
    let _ = SNAP_TOLERANCE_CELL.set(value.max(Real::EPSILON));
}
