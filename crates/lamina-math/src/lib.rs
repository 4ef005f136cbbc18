#![warn(missing_docs)]

//! Math types for the lamina slicing engines.
//!
//! Thin wrappers around nalgebra providing domain-specific types for
//! mesh slicing: points, vectors, cutting planes, world transforms,
//! and the tolerance constants shared by the geometry kernel.

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A point in the 2D plane-parameter space of a cutting plane.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A unit direction in 3D space (by convention; not type-enforced).
pub type Dir3 = Vector3<f64>;

/// Distance below which two intersection points are treated as the same
/// point (world units, conventionally millimeters). Two triangles sharing
/// an edge that crosses a cutting plane both produce the shared crossing;
/// this epsilon collapses the pair.
pub const POINT_MERGE_EPS: f64 = 1e-4;

/// A 4x4 affine world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Rotation by Euler angles in degrees, applied as X, then Y, then Z.
    pub fn rotation_euler_deg(rx: f64, ry: f64, rz: f64) -> Self {
        Self::rotation_z(rz.to_radians())
            .then(&Self::rotation_y(ry.to_radians()))
            .then(&Self::rotation_x(rx.to_radians()))
    }

    /// Compose: apply `other` first, then `self` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse transform, if the matrix is invertible (a zero scale
    /// axis is not).
    pub fn inverse(&self) -> Option<Transform> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// An infinite cutting plane: unit normal plus signed offset.
///
/// A point `p` lies on the plane when `normal.dot(p) == offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Unit normal of the plane.
    pub normal: Vec3,
    /// Signed distance of the plane from the origin along the normal.
    pub offset: f64,
}

impl Plane {
    /// Horizontal plane (normal +Y) at the given Y coordinate.
    pub fn horizontal(y: f64) -> Self {
        Self {
            normal: Vec3::y(),
            offset: y,
        }
    }

    /// Vertical plane (normal +X) at the given X coordinate.
    pub fn vertical_x(x: f64) -> Self {
        Self {
            normal: Vec3::x(),
            offset: x,
        }
    }

    /// Vertical plane (normal +Z) at the given Z coordinate.
    pub fn vertical_z(z: f64) -> Self {
        Self {
            normal: Vec3::z(),
            offset: z,
        }
    }

    /// Plane through `point` with the given (not necessarily unit) normal.
    pub fn from_normal_point(normal: Vec3, point: &Point3) -> Self {
        let n = normal.normalize();
        Self {
            offset: n.dot(&point.coords),
            normal: n,
        }
    }

    /// Signed distance from `p` to the plane (positive on the normal side).
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }

    /// A point on the plane (foot of the origin's perpendicular).
    pub fn origin_point(&self) -> Point3 {
        Point3::from(self.normal * self.offset)
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in mm.
    pub linear: f64,
}

impl Tolerance {
    /// Default slicing tolerance, matching [`POINT_MERGE_EPS`].
    pub const DEFAULT: Self = Self {
        linear: POINT_MERGE_EPS,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
