//! Conflict resolution: T-junctions, crossing edges, vertices and edges
//! inside triangles, coincident triangles.

use super::{EdgeId, Mesh, MeshTriangleId, VertexId};
use crate::errors::{Error, Result};
use crate::float_types::parry3d::bounding_volume::{Aabb, BoundingVolume};
use crate::float_types::{Real, snap_tolerance, tolerance};
use hashbrown::HashMap;
use nalgebra::Point3;

/// Knobs for [`Mesh::solve_conflicts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOptions {
    /// Hard cap on edge and triangle splits; derived from the mesh size when
    /// `None`.
    pub max_splits: Option<usize>,
    /// Splits allowed per live edge and triangle when `max_splits` is `None`.
    pub splits_per_element: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        RepairOptions {
            max_splits: None,
            splits_per_element: 16,
        }
    }
}

/// What a [`Mesh::solve_conflicts`] run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Degenerate triangles unlinked, before and after splitting.
    pub degenerate: usize,
    /// Edges split at a vertex lying inside them.
    pub edge_splits: usize,
    /// Crossing edge pairs resolved with a new shared vertex.
    pub crossings: usize,
    /// Triangles split into a fan around a vertex lying in their interior.
    pub interior_splits: usize,
    /// Edges that passed through a triangle, resolved with a vertex shared by
    /// the edge and the triangle.
    pub piercings: usize,
    /// Triangles marked as duplicates of an earlier one.
    pub coincident: usize,
    /// Rounds of the split passes run.
    pub passes: usize,
}

impl Mesh {
    fn split_budget(&self) -> usize {
        self.options.max_splits.unwrap_or_else(|| {
            let size = self.edge_count() + self.triangle_count();
            self.options.splits_per_element.saturating_mul(size).saturating_add(64)
        })
    }

    /// Make the triangle set conforming.
    ///
    /// 1. unlink degenerate triangles;
    /// 2. split every edge that has a foreign vertex strictly inside it;
    /// 3. split every triangle that has a vertex in its interior into a fan
    ///    around that vertex;
    /// 4. give crossing edges a shared vertex and split both;
    /// 5. where an edge passes through a triangle from one side of its plane
    ///    to the other, split both at the piercing point;
    /// 6. repeat 2 to 5 until a round changes nothing;
    /// 7. mark triangles with identical corners as coincident;
    /// 8. re-derive every triangle's edges.
    ///
    /// Afterwards two triangles overlap in a common plane only if they have
    /// the same three vertices, and one of them is then marked
    /// [`coincident`](super::MeshTriangle::coincident). Triangles in different
    /// planes meet along shared edges only.
    ///
    /// Interior points closer than [`snap_tolerance`] to an endpoint are not
    /// split off. Vertices, edges and triangles are never merged, so the total
    /// area is preserved.
    ///
    /// # Errors
    /// * [`Error::Overflow`] when the split budget runs out,
    /// * [`Error::OutOfMemory`] when an arena cannot grow.
    ///
    /// After an error the mesh is consistent but only partially repaired.
    pub fn solve_conflicts(&mut self) -> Result<RepairStats> {
        let eps = tolerance();
        let snap = snap_tolerance();
        let budget = self.split_budget();
        let mut stats = RepairStats::default();

        let handles: Vec<MeshTriangleId> = self.triangles.handles().collect();
        for &t in &handles {
            if !self.triangles[t].removed && self.triangle_is_degenerate(t, eps) {
                self.unlink_triangle(t);
                stats.degenerate += 1;
            }
        }

        loop {
            stats.passes += 1;
            self.split_t_junctions(eps, snap, budget, &mut stats)?;
            let mut changed = self.split_interior_vertices(eps, budget, &mut stats)?;
            changed += self.split_crossings(eps, snap, budget, &mut stats)?;
            changed += self.split_piercings(eps, budget, &mut stats)?;
            if changed == 0 {
                break;
            }
        }

        stats.coincident = self.mark_coincident();

        for t in self.triangles.handles() {
            if !self.triangles[t].removed && !self.arrange_triangle(t)? {
                stats.degenerate += 1;
            }
        }

        log::debug!(
            "mesh repair: {} edge splits, {} interior splits, {} crossings, {} piercings, {} coincident, {} degenerate in {} passes",
            stats.edge_splits,
            stats.interior_splits,
            stats.crossings,
            stats.piercings,
            stats.coincident,
            stats.degenerate,
            stats.passes
        );
        Ok(stats)
    }

    fn charge_edge_split(stats: &mut RepairStats, budget: usize) -> Result<()> {
        Self::check_budget(stats, budget)?;
        stats.edge_splits += 1;
        Ok(())
    }

    fn charge_interior_split(stats: &mut RepairStats, budget: usize) -> Result<()> {
        Self::check_budget(stats, budget)?;
        stats.interior_splits += 1;
        Ok(())
    }

    fn check_budget(stats: &RepairStats, budget: usize) -> Result<()> {
        if stats.edge_splits + stats.interior_splits >= budget {
            return Err(Error::Overflow(format!(
                "mesh repair exceeded its budget of {budget} splits"
            )));
        }
        Ok(())
    }

    /// Connected vertices sorted by x, for range queries.
    fn connected_by_x(&self) -> Vec<(Real, VertexId)> {
        let mut by_x: Vec<(Real, VertexId)> = self
            .vertices()
            .filter(|(_, v)| v.vlnk.is_some())
            .map(|(id, v)| (v.pos.x, id))
            .collect();
        by_x.sort_by(|l, r| l.0.total_cmp(&r.0));
        by_x
    }

    fn split_t_junctions(&mut self, eps: Real, snap: Real, budget: usize, stats: &mut RepairStats) -> Result<()> {
        let by_x = self.connected_by_x();

        let mut queue: Vec<EdgeId> = self.live_edges().map(|(e, _)| e).collect();
        while let Some(e) = queue.pop() {
            if self.edges[e].removed {
                continue;
            }
            let Some(v) = self.vertex_inside_edge(e, &by_x, eps, snap) else {
                continue;
            };
            Self::charge_edge_split(stats, budget)?;
            queue.extend(self.split_edge(e, v)?);
        }
        Ok(())
    }

    fn split_interior_vertices(&mut self, eps: Real, budget: usize, stats: &mut RepairStats) -> Result<usize> {
        let by_x = self.connected_by_x();
        let mut queue: Vec<MeshTriangleId> = self.live_triangles().map(|(t, _)| t).collect();
        let mut split = 0;
        while let Some(t) = queue.pop() {
            if self.triangles[t].removed {
                continue;
            }
            let Some(v) = self.vertex_inside_triangle(t, &by_x, eps) else {
                continue;
            };
            Self::charge_interior_split(stats, budget)?;
            log::trace!("mesh repair: vertex {v:?} splits triangle {t:?}");
            queue.extend(self.split_triangle_interior(t, v)?);
            split += 1;
        }
        Ok(split)
    }

    /// A connected vertex lying in the interior of triangle `t`.
    fn vertex_inside_triangle(&self, t: MeshTriangleId, by_x: &[(Real, VertexId)], eps: Real) -> Option<VertexId> {
        let corners = self.triangles[t].v;
        let pts = self.points(t);
        let lo = pts[0].x.min(pts[1].x).min(pts[2].x) - eps;
        let hi = pts[0].x.max(pts[1].x).max(pts[2].x) + eps;
        let first = by_x.partition_point(|&(x, _)| x < lo);

        by_x[first..]
            .iter()
            .take_while(|&&(x, _)| x <= hi)
            .map(|&(_, v)| v)
            .filter(|v| !corners.contains(v))
            .find(|&v| point_inside_triangle(&self.vertices[v].pos, &pts, eps))
    }

    /// A connected vertex lying strictly inside edge `e`, nearest to its
    /// first endpoint.
    fn vertex_inside_edge(&self, e: EdgeId, by_x: &[(Real, VertexId)], eps: Real, snap: Real) -> Option<VertexId> {
        let [a, b] = self.edges[e].v;
        let (pa, pb) = (self.vertices[a].pos, self.vertices[b].pos);
        let lo = pa.x.min(pb.x) - eps;
        let hi = pa.x.max(pb.x) + eps;
        let first = by_x.partition_point(|&(x, _)| x < lo);

        by_x[first..]
            .iter()
            .take_while(|&&(x, _)| x <= hi)
            .filter(|&&(_, v)| v != a && v != b)
            .filter_map(|&(_, v)| {
                let p = self.vertices[v].pos;
                point_inside_segment(&p, &pa, &pb, eps, snap).map(|t| (t, v))
            })
            .min_by(|l, r| l.0.total_cmp(&r.0))
            .map(|(_, v)| v)
    }

    fn split_crossings(&mut self, eps: Real, snap: Real, budget: usize, stats: &mut RepairStats) -> Result<usize> {
        let mut boxes: Vec<(EdgeId, Aabb)> = self
            .live_edges()
            .map(|(e, edge)| {
                let (pa, pb) = (self.vertices[edge.v[0]].pos, self.vertices[edge.v[1]].pos);
                let aabb = Aabb::new(pa.inf(&pb), pa.sup(&pb)).loosened(eps);
                (e, aabb)
            })
            .collect();
        boxes.sort_by(|l, r| l.1.mins.x.total_cmp(&r.1.mins.x));

        let mut found = Vec::new();
        for (i, (e1, box1)) in boxes.iter().enumerate() {
            for (e2, box2) in &boxes[i + 1..] {
                if box2.mins.x > box1.maxs.x {
                    break;
                }
                if !box1.intersects(box2) {
                    continue;
                }
                let (ea, eb) = (&self.edges[*e1], &self.edges[*e2]);
                if ea.v.iter().any(|v| eb.v.contains(v)) {
                    continue;
                }
                if let Some(p) = self.edge_crossing(*e1, *e2, eps, snap) {
                    found.push((*e1, *e2, p));
                }
            }
        }

        let mut resolved = 0;
        for (e1, e2, p) in found {
            // an earlier split in this round may have retired either edge
            if self.edges[e1].removed || self.edges[e2].removed {
                continue;
            }
            self.vertices.reserve(1)?;
            let v = self.weld_vertex(p)?;
            if self.edges[e1].v.contains(&v) || self.edges[e2].v.contains(&v) {
                continue;
            }
            Self::charge_edge_split(stats, budget)?;
            self.split_edge(e1, v)?;
            Self::charge_edge_split(stats, budget)?;
            self.split_edge(e2, v)?;
            stats.crossings += 1;
            resolved += 1;
        }
        Ok(resolved)
    }

    fn split_piercings(&mut self, eps: Real, budget: usize, stats: &mut RepairStats) -> Result<usize> {
        let mut faces: Vec<(MeshTriangleId, Aabb)> = self
            .live_triangles()
            .map(|(t, _)| {
                let [a, b, c] = self.points(t);
                (t, Aabb::new(a.inf(&b).inf(&c), a.sup(&b).sup(&c)).loosened(eps))
            })
            .collect();
        faces.sort_by(|l, r| l.1.mins.x.total_cmp(&r.1.mins.x));

        let mut found = Vec::new();
        for (e, edge) in self.live_edges() {
            let [pa, pb] = edge.v.map(|v| self.vertices[v].pos);
            let bounds = Aabb::new(pa.inf(&pb), pa.sup(&pb)).loosened(eps);
            let end = faces.partition_point(|(_, aabb)| aabb.mins.x <= bounds.maxs.x);
            for &(t, aabb) in &faces[..end] {
                if !aabb.intersects(&bounds) || self.triangles[t].v.iter().any(|v| edge.v.contains(v)) {
                    continue;
                }
                if let Some(p) = pierce_point(&pa, &pb, &self.points(t), eps) {
                    found.push((e, t, p));
                }
            }
        }

        let mut resolved = 0;
        for (e, t, p) in found {
            if self.edges[e].removed || self.triangles[t].removed {
                continue;
            }
            // an earlier split in this round may have cut `p` off what is left of `t`
            if !point_inside_triangle(&p, &self.points(t), eps) {
                continue;
            }
            self.vertices.reserve(1)?;
            let v = self.weld_vertex(p)?;
            if self.edges[e].v.contains(&v) || self.triangles[t].v.contains(&v) {
                continue;
            }
            Self::charge_edge_split(stats, budget)?;
            self.split_edge(e, v)?;
            Self::charge_interior_split(stats, budget)?;
            self.split_triangle_interior(t, v)?;
            log::trace!("mesh repair: edge {e:?} pierces triangle {t:?}");
            stats.piercings += 1;
            resolved += 1;
        }
        Ok(resolved)
    }

    /// Point where the interiors of `e1` and `e2` pass within `eps` of each
    /// other, away from all four endpoints.
    fn edge_crossing(&self, e1: EdgeId, e2: EdgeId, eps: Real, snap: Real) -> Option<Point3<Real>> {
        let [a1, b1] = self.edges[e1].v.map(|v| self.vertices[v].pos);
        let [a2, b2] = self.edges[e2].v.map(|v| self.vertices[v].pos);
        let (p, q) = closest_points(&a1, &b1, &a2, &b2)?;
        if (p - q).norm() > eps {
            return None;
        }
        let x = Point3::from((p.coords + q.coords) * 0.5);
        let clear_of = |end: &Point3<Real>| (x - end).norm() > snap;
        (clear_of(&a1) && clear_of(&b1) && clear_of(&a2) && clear_of(&b2)).then_some(x)
    }

    /// Link each triangle to the first earlier triangle with the same
    /// corners. Returns how many were marked.
    fn mark_coincident(&mut self) -> usize {
        let mut seen: HashMap<[VertexId; 3], MeshTriangleId> = HashMap::new();
        let mut marked = 0;
        for t in self.triangles.handles() {
            if self.triangles[t].removed {
                continue;
            }
            let mut key = self.triangles[t].v;
            key.sort();
            let first = *seen.entry(key).or_insert(t);
            let coincident = (first != t).then_some(first);
            marked += usize::from(coincident.is_some());
            self.triangles[t].coincident = coincident;
        }
        marked
    }
}

/// Parameter of `p` along `a → b` when `p` lies within `eps` of the segment,
/// strictly inside it and farther than `snap` from both ends.
fn point_inside_segment(p: &Point3<Real>, a: &Point3<Real>, b: &Point3<Real>, eps: Real, snap: Real) -> Option<Real> {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= snap * snap {
        return None;
    }
    let t = (p - a).dot(&ab) / len2;
    if t <= 0.0 || t >= 1.0 {
        return None;
    }
    if (p - (a + ab * t)).norm() > eps {
        return None;
    }
    ((p - a).norm() > snap && (p - b).norm() > snap).then_some(t)
}

/// Whether `p` lies within `eps` of the plane of `pts`, inside the triangle
/// and farther than `eps` from each of its edges.
fn point_inside_triangle(p: &Point3<Real>, pts: &[Point3<Real>; 3], eps: Real) -> bool {
    let [a, b, c] = pts;
    let Some(n) = (b - a).cross(&(c - a)).try_normalize(Real::EPSILON) else {
        return false;
    };
    if (p - a).dot(&n).abs() > eps {
        return false;
    }
    [(a, b), (b, c), (c, a)].iter().all(|&(s, e)| {
        let edge = e - s;
        let len = edge.norm();
        len > 0.0 && edge.cross(&(p - s)).dot(&n) / len > eps
    })
}

/// Point where segment `a → b` crosses the plane of `pts` inside the
/// triangle, with both ends clearly on opposite sides.
fn pierce_point(a: &Point3<Real>, b: &Point3<Real>, pts: &[Point3<Real>; 3], eps: Real) -> Option<Point3<Real>> {
    let [p0, p1, p2] = pts;
    let n = (p1 - p0).cross(&(p2 - p0)).try_normalize(Real::EPSILON)?;
    let da = (a - p0).dot(&n);
    let db = (b - p0).dot(&n);
    if !((da > eps && db < -eps) || (da < -eps && db > eps)) {
        return None;
    }
    let x = a + (b - a) * (da / (da - db));
    point_inside_triangle(&x, pts, eps).then_some(x)
}

/// Closest points between the interiors of two segments. `None` for parallel
/// segments or when the closest approach lies at an end of either segment.
fn closest_points(
    a1: &Point3<Real>,
    b1: &Point3<Real>,
    a2: &Point3<Real>,
    b2: &Point3<Real>,
) -> Option<(Point3<Real>, Point3<Real>)> {
    let d1 = b1 - a1;
    let d2 = b2 - a2;
    let r = a1 - a2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let b = d1.dot(&d2);
    let c = d1.dot(&r);
    let f = d2.dot(&r);
    let denom = a * e - b * b;
    if denom <= Real::EPSILON * a * e {
        return None;
    }
    let s = (b * f - c * e) / denom;
    let t = (a * f - b * c) / denom;
    if s <= 0.0 || s >= 1.0 || t <= 0.0 || t >= 1.0 {
        return None;
    }
    Some((a1 + d1 * s, a2 + d2 * t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangle::Triangle;

    #[test]
    fn crossing_segments_meet_in_the_middle() {
        let (p, q) = closest_points(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(2.0, 0.0, 0.0),
            &Point3::new(1.0, -1.0, 0.0),
            &Point3::new(1.0, 1.0, 0.0),
        )
        .unwrap();
        assert_eq!(p, Point3::new(1.0, 0.0, 0.0));
        assert_eq!(q, p);
    }

    #[test]
    fn parallel_segments_do_not_cross() {
        let res = closest_points(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(1.0, 1.0, 0.0),
        );
        assert!(res.is_none());
    }

    #[test]
    fn point_near_an_end_is_not_inside() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        assert_eq!(point_inside_segment(&Point3::new(0.25, 0.0, 0.0), &a, &b, 1e-6, 1e-6), Some(0.25));
        assert_eq!(point_inside_segment(&Point3::new(1e-9, 0.0, 0.0), &a, &b, 1e-6, 1e-6), None);
        assert_eq!(point_inside_segment(&Point3::new(0.5, 0.1, 0.0), &a, &b, 1e-6, 1e-6), None);
    }

    #[test]
    fn duplicate_triangles_are_coincident() {
        let mut mesh = Mesh::new();
        let points = [
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let first = mesh.add_triangle(&Triangle::new(points).with_ids(1, 0)).unwrap().unwrap();
        let second = mesh.add_triangle(&Triangle::new(points).with_ids(2, 0)).unwrap().unwrap();
        let stats = mesh.solve_conflicts().unwrap();
        assert_eq!(stats.coincident, 1);
        assert_eq!(mesh.triangle(second).coincident, Some(first));
        assert_eq!(mesh.triangle(first).coincident, None);
        assert!(mesh.validate());
    }

    #[test]
    fn budget_exhaustion_is_overflow() {
        let mut mesh = Mesh::new().with_options(RepairOptions {
            max_splits: Some(0),
            ..RepairOptions::default()
        });
        mesh.add_triangle(&Triangle::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ]))
        .unwrap();
        mesh.add_triangle(&Triangle::new([
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(2.0, -1.0, 0.0),
        ]))
        .unwrap();
        assert!(matches!(mesh.solve_conflicts(), Err(Error::Overflow(_))));
        assert!(mesh.validate());
    }

    #[test]
    fn interior_points_keep_clear_of_the_edges() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        ];
        assert!(point_inside_triangle(&Point3::new(1.0, 1.0, 0.0), &pts, 1e-6));
        // on an edge, off the plane, outside
        assert!(!point_inside_triangle(&Point3::new(2.0, 0.0, 0.0), &pts, 1e-6));
        assert!(!point_inside_triangle(&Point3::new(1.0, 1.0, 0.1), &pts, 1e-6));
        assert!(!point_inside_triangle(&Point3::new(3.0, 3.0, 0.0), &pts, 1e-6));
        // winding does not matter
        let flipped = [pts[0], pts[2], pts[1]];
        assert!(point_inside_triangle(&Point3::new(1.0, 1.0, 0.0), &flipped, 1e-6));
    }

    #[test]
    fn segment_through_a_triangle_pierces_it() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        ];
        let hit = pierce_point(&Point3::new(1.0, 1.0, -1.0), &Point3::new(2.0, 1.0, 1.0), &pts, 1e-6);
        assert_eq!(hit, Some(Point3::new(1.5, 1.0, 0.0)));
        // ends on the plane
        let touch = pierce_point(&Point3::new(1.0, 1.0, 0.0), &Point3::new(1.0, 1.0, 1.0), &pts, 1e-6);
        assert!(touch.is_none());
        // crosses the plane outside the triangle
        let miss = pierce_point(&Point3::new(5.0, 5.0, -1.0), &Point3::new(5.0, 5.0, 1.0), &pts, 1e-6);
        assert!(miss.is_none());
    }
}
