#![warn(missing_docs)]

//! Plane-slicing geometry kernel for lamina.
//!
//! Leaves-first building blocks for the fabrication engines: plane/mesh
//! intersection, convex and concave hull extraction, contour
//! simplification and smoothing, 3D↔2D plane projection, and the solid
//! builders (extruded slabs, swept tubes) derived from closed contours.

use thiserror::Error;

pub mod contour;
pub mod hull;
pub mod intersect;
pub mod solid;

pub use contour::{simplify, smooth_ring, PlaneBasis};
pub use hull::{concave_hull, convex_hull};
pub use intersect::{mesh_plane_intersection, triangles_plane_intersection};
pub use solid::{extrude_ring, sample_closed_curve, tube_mesh};

/// Errors produced by the solid builders.
#[derive(Error, Debug)]
pub enum GeomError {
    /// A closed contour needs at least 3 distinct points.
    #[error("degenerate ring: {0} points")]
    DegenerateRing(usize),

    /// A sweep path collapsed to (near) zero length.
    #[error("degenerate path")]
    DegeneratePath,
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeomError>;
