//! Test support library
//! Provides scene fixtures & helper functions shared by the integration tests.
#![allow(dead_code)]

use acoustic_bsp::{
    Face, Object, Triangle,
    float_types::Real,
};
use nalgebra::{Point3, Vector3};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn p(x: Real, y: Real, z: Real) -> Point3<Real> {
    Point3::new(x, y, z)
}

/// Flat-shaded triangle from raw coordinates.
pub fn tri(points: [[Real; 3]; 3]) -> Triangle {
    Triangle::new(points.map(|[x, y, z]| Point3::new(x, y, z)))
}

/// Unit square in the `z = 0` plane with its lower left corner at `(x, y)`,
/// facing `+z`, as a single quad face.
pub fn unit_square(id: i32, x: Real, y: Real) -> Object {
    Object::from_faces(
        id,
        vec![
            p(x, y, 0.0),
            p(x + 1.0, y, 0.0),
            p(x + 1.0, y + 1.0, 0.0),
            p(x, y + 1.0, 0.0),
        ],
        vec![Face::new(vec![0, 1, 2, 3])],
    )
}

/// Axis-aligned box spanning `min`..`max`, six outward facing quads.
pub fn cuboid(id: i32, min: Point3<Real>, max: Point3<Real>) -> Object {
    let corners = (0..8)
        .map(|i| {
            p(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        })
        .collect();
    let faces = [
        [0, 4, 6, 2], // -x
        [1, 3, 7, 5], // +x
        [0, 1, 5, 4], // -y
        [2, 6, 7, 3], // +y
        [0, 2, 3, 1], // -z
        [4, 5, 7, 6], // +z
    ]
    .into_iter()
    .map(|f| Face::new(f.to_vec()))
    .collect();
    Object::from_faces(id, corners, faces)
}

/// Surface area of an axis-aligned box.
pub fn cuboid_area(min: Point3<Real>, max: Point3<Real>) -> Real {
    let d: Vector3<Real> = max - min;
    2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
}

/// Sum of the areas of `triangles`.
pub fn total_area<'a>(triangles: impl IntoIterator<Item = &'a Triangle>) -> Real {
    triangles.into_iter().map(Triangle::area).sum()
}

/// Whether `p` lies strictly inside `t`, more than `margin` away from its
/// edges and within `margin` of its plane.
pub fn strictly_inside(p: &Point3<Real>, t: &Triangle, margin: Real) -> bool {
    let [a, b, c] = &t.points;
    let Some(n) = (b - a).cross(&(c - a)).try_normalize(1e-12) else {
        return false;
    };
    if (p - a).dot(&n).abs() > margin {
        return false;
    }
    [(a, b), (b, c), (c, a)]
        .iter()
        .all(|&(s, e)| (e - s).cross(&(p - s)).dot(&n) / (e - s).norm() > margin)
}

/// Number of triangle pairs that overlap in their interiors without sharing
/// the same three corners: coplanar pairs covering a common patch, or an edge
/// of one passing through the other.
pub fn interior_overlaps(triangles: &[Triangle]) -> usize {
    const MARGIN: Real = 1e-7;
    const STEPS: usize = 8;
    // barycentric sample grid, interior points only
    let samples = |t: &Triangle| -> Vec<Point3<Real>> {
        let mut out = Vec::new();
        for i in 1..STEPS {
            for j in 1..STEPS - i {
                let (u, v) = (i as Real / STEPS as Real, j as Real / STEPS as Real);
                let w = 1.0 - u - v;
                out.push(Point3::from(t.points[0].coords * u + t.points[1].coords * v + t.points[2].coords * w));
            }
        }
        out
    };
    let pierces = |edge_of: &Triangle, t: &Triangle| -> bool {
        let [a, b, c] = &t.points;
        let Some(n) = (b - a).cross(&(c - a)).try_normalize(1e-12) else {
            return false;
        };
        (0..3).any(|i| {
            let (p, q) = (edge_of.points[i], edge_of.points[(i + 1) % 3]);
            let (dp, dq) = ((p - a).dot(&n), (q - a).dot(&n));
            if dp * dq >= 0.0 || dp.abs() <= MARGIN || dq.abs() <= MARGIN {
                return false;
            }
            let x = p + (q - p) * (dp / (dp - dq));
            strictly_inside(&x, t, MARGIN)
        })
    };

    let mut count = 0;
    for (i, s) in triangles.iter().enumerate() {
        for t in &triangles[i + 1..] {
            if s.same_footprint(t, 1e-9) {
                continue;
            }
            let overlap = samples(s).iter().any(|p| strictly_inside(p, t, MARGIN))
                || samples(t).iter().any(|p| strictly_inside(p, s, MARGIN))
                || pierces(s, t)
                || pierces(t, s);
            count += usize::from(overlap);
        }
    }
    count
}

/// Summed area of the triangles that came from `object_id`.
pub fn object_area<'a>(triangles: impl IntoIterator<Item = &'a Triangle>, object_id: i32) -> Real {
    triangles
        .into_iter()
        .filter(|t| t.object_id == object_id)
        .map(Triangle::area)
        .sum()
}
