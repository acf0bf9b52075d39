//! Cutting plan: a set of 3D segments clipped against planes.
//!
//! A [`Plan`] typically starts as the outline of a few triangles and is then
//! narrowed down by successive half-space cuts. [`Plan::cut_in`] keeps what
//! lies on the negative side of a plane, [`Plan::cut_out`] what lies on the
//! positive side, and [`Plan::split`] distributes the segments between two
//! plans.

use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::float_types::{Real, snap_tolerance, tolerance};
use crate::plane::{INSIDE, ON, OUTSIDE, Plane};
use crate::triangle::Triangle;
use nalgebra::Point3;

/// Scene element a segment was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Source {
    pub object_id: i32,
    pub face_id: i32,
}

/// Directed segment `a → b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: Point3<Real>,
    pub b: Point3<Real>,
    pub source: Option<Source>,
}

impl Segment {
    pub const fn new(a: Point3<Real>, b: Point3<Real>) -> Self {
        Segment { a, b, source: None }
    }

    pub const fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn length(&self) -> Real {
        (self.b - self.a).norm()
    }

    pub fn midpoint(&self) -> Point3<Real> {
        Point3::from((self.a.coords + self.b.coords) * 0.5)
    }

    /// Bitmask classification of both endpoints against `plane`.
    pub fn classify(&self, plane: &Plane) -> i8 {
        plane.classify_points([&self.a, &self.b])
    }
}

/// Where the pieces of one segment go after a cut.
#[derive(Debug, Default)]
struct Pieces {
    inside: Option<Segment>,
    outside: Option<Segment>,
    /// The whole segment lies in the plane.
    on: bool,
}

/// Cut `seg` by `plane`.
///
/// An intersection closer than `snap` to an endpoint is that endpoint, and
/// pieces no longer than `snap` are dropped.
fn cut(seg: &Segment, plane: &Plane, eps: Real, snap: Real) -> Pieces {
    let da = plane.signed_distance(&seg.a);
    let db = plane.signed_distance(&seg.b);
    let ca = Plane::orient_distance(da, eps);
    let cb = Plane::orient_distance(db, eps);

    match ca | cb {
        ON => Pieces {
            on: true,
            ..Pieces::default()
        },
        INSIDE => Pieces {
            inside: Some(*seg),
            ..Pieces::default()
        },
        OUTSIDE => Pieces {
            outside: Some(*seg),
            ..Pieces::default()
        },
        _ => {
            let t = da / (da - db);
            let mut p = seg.a + (seg.b - seg.a) * t;
            if (p - seg.a).norm() <= snap {
                p = seg.a;
            } else if (p - seg.b).norm() <= snap {
                p = seg.b;
            }
            let head = Segment { b: p, ..*seg };
            let tail = Segment { a: p, ..*seg };
            let keep = |piece: Segment| (piece.length() > snap).then_some(piece);
            if ca == INSIDE {
                Pieces {
                    inside: keep(head),
                    outside: keep(tail),
                    on: false,
                }
            } else {
                Pieces {
                    inside: keep(tail),
                    outside: keep(head),
                    on: false,
                }
            }
        },
    }
}

/// Ordered list of segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    segments: Vec<Segment>,
}

impl Plan {
    pub const fn new() -> Self {
        Plan { segments: Vec::new() }
    }

    /// Append segment `p1 → p2` and return it for further tagging.
    pub fn add_edge(&mut self, p1: Point3<Real>, p2: Point3<Real>) -> &mut Segment {
        let index = self.segments.len();
        self.segments.push(Segment::new(p1, p2));
        &mut self.segments[index]
    }

    /// Append the three edges of a triangle, following its winding.
    pub fn add_triangle(&mut self, points: [Point3<Real>; 3]) {
        self.add_outline(points, None);
    }

    /// Append the outline of `triangle`, tagged with its object and face.
    pub fn add_triangle_record(&mut self, triangle: &Triangle) {
        let source = Source {
            object_id: triangle.object_id,
            face_id: triangle.face_id,
        };
        self.add_outline(triangle.points, Some(source));
    }

    fn add_outline(&mut self, points: [Point3<Real>; 3], source: Option<Source>) {
        self.segments.reserve(3);
        for i in 0..3 {
            self.segments.push(Segment {
                a: points[i],
                b: points[(i + 1) % 3],
                source,
            });
        }
    }

    /// Keep only what lies on the negative side of `plane`.
    ///
    /// Segments lying in the plane are kept. A segment that only touches the
    /// plane from the positive side is dropped.
    pub fn cut_in(&mut self, plane: &Plane) {
        let (eps, snap) = (tolerance(), snap_tolerance());
        self.segments.retain_mut(|seg| {
            let pieces = cut(seg, plane, eps, snap);
            match pieces.inside {
                Some(piece) => {
                    *seg = piece;
                    true
                },
                None => pieces.on,
            }
        });
    }

    /// Keep only what lies on the positive side of `plane`.
    pub fn cut_out(&mut self, plane: &Plane) {
        let (eps, snap) = (tolerance(), snap_tolerance());
        self.segments.retain_mut(|seg| {
            let pieces = cut(seg, plane, eps, snap);
            match pieces.outside {
                Some(piece) => {
                    *seg = piece;
                    true
                },
                None => pieces.on,
            }
        });
    }

    /// Keep the negative half in `self` and append the positive half to
    /// `out`. Segments lying in the plane stay in `self`.
    pub fn split(&mut self, out: &mut Plan, plane: &Plane) {
        let (eps, snap) = (tolerance(), snap_tolerance());
        self.segments.retain_mut(|seg| {
            let pieces = cut(seg, plane, eps, snap);
            if let Some(piece) = pieces.outside {
                out.segments.push(piece);
            }
            match pieces.inside {
                Some(piece) => {
                    *seg = piece;
                    true
                },
                None => pieces.on,
            }
        });
    }

    /// Side of `plane` the whole plan lies on, as a classification bitmask.
    pub fn classify(&self, plane: &Plane) -> i8 {
        self.segments
            .iter()
            .fold(ON, |acc, seg| acc | seg.classify(plane))
    }

    /// Axis-aligned box around every endpoint, `None` for an empty plan.
    pub fn bounding_box(&self) -> Option<Aabb> {
        let first = self.segments.first()?.a;
        let (mins, maxs) = self
            .segments
            .iter()
            .flat_map(|seg| [seg.a, seg.b])
            .fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p)));
        Some(Aabb::new(mins, maxs))
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Remove all segments, keep the capacity.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Remove all segments and release the storage.
    pub fn flush(&mut self) {
        self.segments = Vec::new();
    }

    pub fn swap(&mut self, other: &mut Plan) {
        std::mem::swap(&mut self.segments, &mut other.segments);
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn x_plane(x: Real) -> Plane {
        Plane::from_normal(Vector3::x(), x)
    }

    #[test]
    fn straddling_segment_is_cut_at_the_plane() {
        let pieces = cut(
            &Segment::new(Point3::new(2.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)),
            &x_plane(1.0),
            1e-9,
            1e-9,
        );
        let inside = pieces.inside.unwrap();
        let outside = pieces.outside.unwrap();
        // direction is kept on both pieces
        assert_eq!(inside.a, Point3::new(1.0, 0.0, 0.0));
        assert_eq!(inside.b, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(outside.a, Point3::new(2.0, 0.0, 0.0));
        assert_eq!(outside.b, Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn intersection_near_an_endpoint_snaps_to_it() {
        let pieces = cut(
            &Segment::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0 + 1e-7, 0.0, 0.0)),
            &x_plane(1.0),
            1e-9,
            1e-6,
        );
        assert_eq!(pieces.inside.unwrap().b, Point3::new(1.0 + 1e-7, 0.0, 0.0));
        assert!(pieces.outside.is_none());
    }

    #[test]
    fn bounding_box_spans_all_endpoints() {
        let mut plan = Plan::new();
        assert!(plan.bounding_box().is_none());
        plan.add_edge(Point3::new(0.0, 2.0, -1.0), Point3::new(1.0, 0.0, 0.0));
        plan.add_edge(Point3::new(-3.0, 0.0, 0.0), Point3::new(0.0, 0.0, 4.0));
        let aabb = plan.bounding_box().unwrap();
        assert_eq!(aabb.mins, Point3::new(-3.0, 0.0, -1.0));
        assert_eq!(aabb.maxs, Point3::new(1.0, 2.0, 4.0));
    }
}
