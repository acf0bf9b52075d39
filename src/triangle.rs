//! The triangle record shared by mesh export and the BSP context.

use crate::arena::Handle;
use crate::color::Color;
use crate::float_types::Real;
use crate::plane::Plane;
use nalgebra::{Point3, Vector3};

/// Handle of a [`Triangle`] stored in a BSP context arena.
pub type TriangleId = Handle<Triangle>;

/// Object id meaning "not attributed to any scene object".
pub const NO_OBJECT: i32 = -1;

/// A colored triangle with per-vertex normals and provenance ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub points: [Point3<Real>; 3],
    pub normals: [Vector3<Real>; 3],
    pub color: Color,
    /// Owning scene object, [`NO_OBJECT`] when unknown.
    pub object_id: i32,
    /// Triangles cut from the same source polygon share a face id.
    pub face_id: i32,
    /// Next triangle of a BSP node's coplanar list.
    pub next: Option<TriangleId>,
}

impl Triangle {
    /// Triangle with flat normals, white, without provenance.
    pub fn new(points: [Point3<Real>; 3]) -> Self {
        let n = face_normal(&points);
        Triangle {
            points,
            normals: [n; 3],
            color: Color::default(),
            object_id: NO_OBJECT,
            face_id: NO_OBJECT,
            next: None,
        }
    }

    pub fn with_normals(mut self, normals: [Vector3<Real>; 3]) -> Self {
        self.normals = normals;
        self
    }

    pub const fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub const fn with_ids(mut self, object_id: i32, face_id: i32) -> Self {
        self.object_id = object_id;
        self.face_id = face_id;
        self
    }

    /// Supporting plane, `None` for a degenerate triangle.
    pub fn plane(&self) -> Option<Plane> {
        let [a, b, c] = &self.points;
        Plane::from_points(a, b, c)
    }

    /// Unit normal following the winding, zero when degenerate.
    pub fn face_normal(&self) -> Vector3<Real> {
        face_normal(&self.points)
    }

    pub fn area(&self) -> Real {
        area(&self.points)
    }

    pub fn centroid(&self) -> Point3<Real> {
        let [a, b, c] = &self.points;
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// A triangle whose area vanishes at the scale of `eps`.
    pub fn is_degenerate(&self, eps: Real) -> bool {
        is_degenerate(&self.points, eps)
    }

    /// Same three corners (in any order and either winding) within `eps`.
    pub fn same_footprint(&self, other: &Triangle, eps: Real) -> bool {
        same_footprint(&self.points, &other.points, eps)
    }
}

pub(crate) fn face_normal(points: &[Point3<Real>; 3]) -> Vector3<Real> {
    let [a, b, c] = points;
    (b - a).cross(&(c - a)).try_normalize(Real::EPSILON).unwrap_or_else(Vector3::zeros)
}

pub(crate) fn area(points: &[Point3<Real>; 3]) -> Real {
    let [a, b, c] = points;
    0.5 * (b - a).cross(&(c - a)).norm()
}

/// Degenerate when the triangle's height over its longest edge is within `eps`.
pub(crate) fn is_degenerate(points: &[Point3<Real>; 3], eps: Real) -> bool {
    let [a, b, c] = points;
    let longest = (b - a).norm().max((c - b).norm()).max((a - c).norm());
    if longest <= eps {
        return true;
    }
    2.0 * area(points) / longest <= eps
}

pub(crate) fn same_footprint(lhs: &[Point3<Real>; 3], rhs: &[Point3<Real>; 3], eps: Real) -> bool {
    let eps2 = eps * eps;
    lhs.iter()
        .all(|p| rhs.iter().any(|q| (p - q).norm_squared() <= eps2))
        && rhs
            .iter()
            .all(|q| lhs.iter().any(|p| (p - q).norm_squared() <= eps2))
}

/// Linear interpolation of a normal, renormalized when possible.
pub(crate) fn lerp_normal(a: &Vector3<Real>, b: &Vector3<Real>, t: Real) -> Vector3<Real> {
    let n = a + (b - a) * t;
    n.try_normalize(Real::EPSILON).unwrap_or(n)
}

/// Corner normals blended at `p` by its barycentric weights in `points`.
pub(crate) fn barycentric_normal(points: &[Point3<Real>; 3], normals: &[Vector3<Real>; 3], p: &Point3<Real>) -> Vector3<Real> {
    let [a, b, c] = points;
    let full = (b - a).cross(&(c - a));
    let n2 = full.norm_squared();
    if n2 <= 0.0 {
        return normals[0];
    }
    let wa = (b - p).cross(&(c - p)).dot(&full) / n2;
    let wb = (c - p).cross(&(a - p)).dot(&full) / n2;
    let n = normals[0] * wa + normals[1] * wb + normals[2] * (1.0 - wa - wb);
    n.try_normalize(Real::EPSILON).unwrap_or(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Triangle {
        Triangle::new([
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn area_and_normal() {
        let t = unit();
        assert_eq!(t.area(), 0.5);
        assert_eq!(t.face_normal(), Vector3::z());
        assert_eq!(t.normals, [Vector3::z(); 3]);
        assert!(t.next.is_none());
    }

    #[test]
    fn footprint_ignores_winding() {
        let t = unit();
        let mut reversed = t.clone();
        reversed.points.swap(1, 2);
        assert!(t.same_footprint(&reversed, 1e-9));
        reversed.points[0].x += 0.1;
        assert!(!t.same_footprint(&reversed, 1e-9));
    }

    #[test]
    fn sliver_is_degenerate() {
        let t = Triangle::new([
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1e-9, 0.0),
        ]);
        assert!(t.is_degenerate(1e-6));
        assert!(!unit().is_degenerate(1e-6));
    }

    #[test]
    fn normal_blend_follows_the_corners() {
        let t = unit();
        let normals = [Vector3::x(), Vector3::y(), Vector3::z()];
        let at_corner = barycentric_normal(&t.points, &normals, &t.points[1]);
        assert!((at_corner - Vector3::y()).norm() < 1e-12);
        let mid = barycentric_normal(&t.points, &normals, &t.centroid());
        let expected = Vector3::new(1.0, 1.0, 1.0).normalize();
        assert!((mid - expected).norm() < 1e-12);
    }
}
