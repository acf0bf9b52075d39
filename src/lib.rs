//! Geometric core for **acoustic ray tracing**: mesh repair, [BSP](bsp)
//! painter's ordering and plane clipping of segment sets.
//!
//! The usual pipeline is
//! 1. add transformed scene objects to a [`Mesh`] and call
//!    [`Mesh::solve_conflicts`] to weld, split and tag them into a conforming
//!    triangle set;
//! 2. feed [`Mesh::triangles`] to a [`Context`], [build the
//!    tree](Context::build_tree) once;
//! 3. per point of view, [emit the triangles back to front](Context::build_mesh).
//!
//! A [`Plan`] clips independent sets of 3D segments against planes, e.g.
//! the outline of a wall against the frustum of a beam.
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//!
//! # Tolerances
//! See [`float_types::tolerance`] and [`float_types::snap_tolerance`].

#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod arena;
pub mod bsp;
pub mod color;
pub mod errors;
pub mod float_types;
pub mod mesh;
pub mod plan;
pub mod plane;
pub mod scene;
pub mod triangle;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use arena::{Arena, Handle};
pub use bsp::{BalancedSplittingStrategy, Context, DrawVertex, FirstTriangleStrategy, SplittingPlaneStrategy};
pub use color::Color;
pub use errors::{Error, Result};
pub use float_types::Real;
pub use mesh::{Mesh, RepairOptions, RepairStats};
pub use plan::{Plan, Segment, Source};
pub use plane::Plane;
pub use scene::{Face, Material, Object, SceneObject};
pub use triangle::{NO_OBJECT, Triangle, TriangleId};
