//! Oriented planes and point / triangle / segment classification.

use crate::float_types::{Real, tolerance};
use nalgebra::{Point3, Vector3};

// Plane classification bits. A triangle's class is the OR of its vertices'.
pub const ON: i8 = 0;
pub const OUTSIDE: i8 = 1;
pub const INSIDE: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane `n · p = w` with unit normal `n`.
///
/// The half-space the normal points into is *outside* (positive signed
/// distance); the opposite one is *inside*.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Unit normal vector of the plane
    pub normal: Vector3<Real>,
    /// Distance from origin along normal
    pub w: Real,
}

impl Plane {
    /// Create a plane from a (not necessarily unit) normal and the offset
    /// measured along that normal once it is normalized.
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        Plane {
            normal: normal.normalize(),
            w,
        }
    }

    /// Plane through `point` with the given normal.
    pub fn through_point(normal: Vector3<Real>, point: &Point3<Real>) -> Self {
        let normal = normal.normalize();
        let w = normal.dot(&point.coords);
        Plane { normal, w }
    }

    /// Plane through three points, normal following the right-hand rule
    /// `(b - a) × (c - a)`. Returns `None` when the points are collinear.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        let norm = normal.norm();
        if !norm.is_finite() || norm <= Real::EPSILON * (b - a).norm().max((c - a).norm()) {
            return None;
        }
        let normal = normal / norm;
        Some(Plane {
            normal,
            w: normal.dot(&a.coords),
        })
    }

    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub const fn offset(&self) -> Real {
        self.w
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    pub fn flipped(&self) -> Self {
        Plane {
            normal: -self.normal,
            w: -self.w,
        }
    }

    /// Signed distance of `point`, positive on the outside.
    #[inline]
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Classify a point as [`ON`], [`OUTSIDE`] or [`INSIDE`] using the global
    /// tolerance.
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        Self::orient_distance(self.signed_distance(point), tolerance())
    }

    #[inline]
    pub fn orient_distance(distance: Real, eps: Real) -> i8 {
        if distance > eps {
            OUTSIDE
        } else if distance < -eps {
            INSIDE
        } else {
            ON
        }
    }

    /// Bitmask classification of a set of points (usually a triangle).
    pub fn classify_points<'a>(&self, points: impl IntoIterator<Item = &'a Point3<Real>>) -> i8 {
        points
            .into_iter()
            .fold(ON, |acc, p| acc | self.orient_point(p))
    }

    /// Intersection of segment `a → b` with the plane, as the parameter `t`
    /// along the segment and the point itself.
    ///
    /// Returns `None` when the segment is parallel to the plane.
    pub fn intersect_segment(&self, a: &Point3<Real>, b: &Point3<Real>) -> Option<(Real, Point3<Real>)> {
        let denom = self.normal.dot(&(b - a));
        if denom.abs() <= Real::EPSILON {
            return None;
        }
        let t = ((self.w - self.normal.dot(&a.coords)) / denom).clamp(0.0, 1.0);
        Some((t, a + (b - a) * t))
    }

    /// Whether `other` describes the same geometric plane, regardless of
    /// orientation.
    pub fn is_coincident(&self, other: &Plane, eps: Real) -> bool {
        let dot = self.normal.dot(&other.normal);
        if dot >= 0.0 {
            (self.normal - other.normal).norm() <= eps && (self.w - other.w).abs() <= eps
        } else {
            (self.normal + other.normal).norm() <= eps && (self.w + other.w).abs() <= eps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_follows_right_hand_rule() {
        let plane = Plane::from_points(
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_eq!(plane.normal(), Vector3::z());
        assert_eq!(plane.offset(), 0.0);
    }

    #[test]
    fn collinear_points_have_no_plane() {
        let plane = Plane::from_points(
            &Point3::origin(),
            &Point3::new(1.0, 1.0, 1.0),
            &Point3::new(2.0, 2.0, 2.0),
        );
        assert!(plane.is_none());
    }

    #[test]
    fn classify_points_ors_vertex_classes() {
        let plane = Plane::from_normal(Vector3::x(), 1.0);
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 0.0, 0.0);
        let c = Point3::new(1.0, 1.0, 0.0);
        assert_eq!(plane.classify_points([&a, &c]), INSIDE);
        assert_eq!(plane.classify_points([&b, &c]), OUTSIDE);
        assert_eq!(plane.classify_points([&a, &b, &c]), SPANNING);
        assert_eq!(plane.classify_points([&c]), ON);
    }

    #[test]
    fn coincident_ignores_orientation() {
        let plane = Plane::from_normal(Vector3::y(), 2.0);
        assert!(plane.is_coincident(&plane.flipped(), 1e-9));
        assert!(!plane.is_coincident(&Plane::from_normal(Vector3::y(), 2.5), 1e-9));
    }
}
