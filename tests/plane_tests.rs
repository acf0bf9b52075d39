mod support;

use acoustic_bsp::{
    Plane, Triangle,
    float_types::{Real, tolerance},
    plane::{INSIDE, ON, OUTSIDE, SPANNING},
};
use nalgebra::Vector3;
use support::{approx_eq, p, tri};

#[test]
fn flip() {
    let mut plane = Plane::from_normal(Vector3::y(), 2.0);
    plane.flip();
    assert_eq!(plane.normal(), Vector3::new(0.0, -1.0, 0.0));
    assert_eq!(plane.offset(), -2.0);
}

#[test]
fn through_point_and_signed_distance() {
    let plane = Plane::through_point(Vector3::new(0.0, 0.0, 2.0), &p(3.0, -1.0, 4.0));
    assert_eq!(plane.offset(), 4.0);
    assert!(approx_eq(plane.signed_distance(&p(0.0, 0.0, 6.0)), 2.0, 1e-12));
    assert!(approx_eq(plane.signed_distance(&p(9.0, 9.0, 1.0)), -3.0, 1e-12));
}

#[test]
fn orientation_uses_the_tolerance() {
    let plane = Plane::from_normal(Vector3::z(), 0.0);
    let eps: Real = tolerance();
    assert_eq!(plane.orient_point(&p(0.0, 0.0, 0.5 * eps)), ON);
    assert_eq!(plane.orient_point(&p(0.0, 0.0, -0.5 * eps)), ON);
    assert_eq!(plane.orient_point(&p(0.0, 0.0, 2.0 * eps)), OUTSIDE);
    assert_eq!(plane.orient_point(&p(0.0, 0.0, -2.0 * eps)), INSIDE);
}

#[test]
fn classify_triangle() {
    let plane = Plane::from_normal(Vector3::y(), 0.0);
    let crossing = tri([[0.0, -1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 1.0]]);
    let below = tri([[0.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, -2.0, 1.0]]);
    let flat = tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
    let touching = tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    assert_eq!(plane.classify_points(&crossing.points), SPANNING);
    assert_eq!(plane.classify_points(&below.points), INSIDE);
    assert_eq!(plane.classify_points(&flat.points), ON);
    assert_eq!(plane.classify_points(&touching.points), OUTSIDE);
}

#[test]
fn triangle_plane_matches_winding() {
    let t: Triangle = tri([[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 0.0, 1.0]]);
    let plane = t.plane().unwrap();
    assert_eq!(plane.normal(), -Vector3::z());
    assert_eq!(plane.offset(), -1.0);
    assert_eq!(plane.classify_points(&t.points), ON);
}

#[test]
fn intersect_segment() {
    let plane = Plane::from_normal(Vector3::x(), 1.0);
    let (t, point) = plane
        .intersect_segment(&p(0.0, 0.0, 0.0), &p(4.0, 2.0, 0.0))
        .unwrap();
    assert!(approx_eq(t, 0.25, 1e-12));
    assert!(approx_eq(point.y, 0.5, 1e-12));
    assert!(plane
        .intersect_segment(&p(0.0, 0.0, 0.0), &p(0.0, 3.0, 0.0))
        .is_none());
}
