//! Tree construction: plane selection, triangle classification and splitting.

use super::node::{Node, NodeId};
use super::traits::SplittingPlaneStrategy;
use super::Context;
use crate::errors::Result;
use crate::float_types::{Real, tolerance};
use crate::plane::{INSIDE, ON, OUTSIDE, Plane, SPANNING};
use crate::triangle::{self, Triangle, TriangleId};
use nalgebra::{Point3, Vector3};
use std::collections::VecDeque;

/// Where the node of a build task hangs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Root,
    Inside(NodeId),
    Outside(NodeId),
}

/// Triangles to insert below one slot.
#[derive(Debug)]
struct Task {
    slot: Slot,
    triangles: Vec<TriangleId>,
}

/// What the build counted, for the debug log.
#[derive(Debug, Default)]
struct BuildStats {
    nodes: usize,
    shadows: usize,
    splits: usize,
    dropped: usize,
}

impl<S: SplittingPlaneStrategy> Context<S> {
    /// Insert all pending triangles into the tree.
    ///
    /// Tasks are processed first in, first out. A slot that already holds a
    /// node keeps its plane, so triangles added after a previous build are
    /// pushed down the existing tree. Otherwise the strategy picks a plane
    /// among the task's triangles.
    ///
    /// # Errors
    /// * [`Error::OutOfMemory`](crate::errors::Error::OutOfMemory) or
    ///   [`Error::Overflow`](crate::errors::Error::Overflow) when an arena
    ///   cannot grow. The tree is then marked invalid.
    /// * [`Error::BadState`](crate::errors::Error::BadState) if the tree was
    ///   already invalid.
    pub fn build_tree(&mut self) -> Result<()> {
        self.ensure_valid()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        let mut stats = BuildStats::default();
        match self.insert(pending, &mut stats) {
            Ok(()) => {
                log::debug!(
                    "bsp build: {} triangles, {} new nodes ({} shadow), {} splits, {} slivers dropped",
                    count,
                    stats.nodes,
                    stats.shadows,
                    stats.splits,
                    stats.dropped
                );
                Ok(())
            },
            Err(err) => {
                self.valid = false;
                log::warn!("bsp build failed, tree marked invalid: {err}");
                Err(err)
            },
        }
    }

    fn slot_node(&self, slot: Slot) -> Option<NodeId> {
        match slot {
            Slot::Root => self.root,
            Slot::Inside(parent) => self.nodes[parent].inside,
            Slot::Outside(parent) => self.nodes[parent].outside,
        }
    }

    fn set_slot(&mut self, slot: Slot, node: NodeId) {
        match slot {
            Slot::Root => self.root = Some(node),
            Slot::Inside(parent) => self.nodes[parent].inside = Some(node),
            Slot::Outside(parent) => self.nodes[parent].outside = Some(node),
        }
    }

    fn insert(&mut self, triangles: Vec<TriangleId>, stats: &mut BuildStats) -> Result<()> {
        let eps = tolerance();
        let mut queue = VecDeque::new();
        queue.push_back(Task {
            slot: Slot::Root,
            triangles,
        });

        while let Some(Task { slot, triangles }) = queue.pop_front() {
            let node = match self.slot_node(slot) {
                Some(node) => node,
                None => {
                    let Some(plane) = self.strategy.pick_splitting_plane(&self.triangles, &triangles) else {
                        stats.dropped += triangles.len();
                        continue;
                    };
                    let node = self.nodes.alloc(Node::new(plane))?;
                    self.set_slot(slot, node);
                    stats.nodes += 1;
                    node
                },
            };
            let plane = self.nodes[node].plane.clone();

            let mut inside = Vec::new();
            let mut outside = Vec::new();
            for t in triangles {
                let points = self.triangles[t].points;
                let distances = points.map(|p| plane.signed_distance(&p));
                let classes = distances.map(|d| Plane::orient_distance(d, eps));
                match classes.iter().fold(ON, |acc, c| acc | c) {
                    ON => self.place_on(node, t, eps, stats)?,
                    INSIDE => inside.push(t),
                    OUTSIDE => outside.push(t),
                    _ => {
                        stats.splits += 1;
                        for (side, fragment) in split_triangle(&self.triangles[t], &distances, &classes) {
                            if triangle::is_degenerate(&fragment.points, eps) {
                                stats.dropped += 1;
                                continue;
                            }
                            let id = self.triangles.alloc(fragment)?;
                            if side == INSIDE {
                                inside.push(id);
                            } else {
                                outside.push(id);
                            }
                        }
                    },
                }
            }

            if !inside.is_empty() {
                queue.push_back(Task {
                    slot: Slot::Inside(node),
                    triangles: inside,
                });
            }
            if !outside.is_empty() {
                queue.push_back(Task {
                    slot: Slot::Outside(node),
                    triangles: outside,
                });
            }
        }
        Ok(())
    }

    /// Append coplanar triangle `t` to the on-list of `node`.
    ///
    /// If a triangle with the same footprint is already there, `t` moves down
    /// to the shadow node below `node` (created on demand), and further down
    /// for repeated duplicates.
    fn place_on(&mut self, node: NodeId, t: TriangleId, eps: Real, stats: &mut BuildStats) -> Result<()> {
        let mut current = node;
        loop {
            let mut tail = None;
            let mut duplicate = false;
            for (id, tri) in self.on_list(self.nodes[current].on) {
                if tri.same_footprint(&self.triangles[t], eps) {
                    duplicate = true;
                    break;
                }
                tail = Some(id);
            }

            if !duplicate {
                self.triangles[t].next = None;
                match tail {
                    Some(last) => self.triangles[last].next = Some(t),
                    None => self.nodes[current].on = Some(t),
                }
                return Ok(());
            }

            current = match self.nodes[current].inside {
                Some(below) if !self.nodes[below].emit => below,
                inside => {
                    let plane = self.nodes[current].plane.clone();
                    let shadow = self.nodes.alloc(Node::shadow(plane, inside))?;
                    self.nodes[current].inside = Some(shadow);
                    stats.nodes += 1;
                    stats.shadows += 1;
                    shadow
                },
            };
        }
    }
}

/// Cut a straddling triangle along the plane at which `distances` were
/// measured. Fragments keep the winding, color and ids of the source and are
/// tagged with the side ([`INSIDE`] or [`OUTSIDE`]) they fall on.
fn split_triangle(tri: &Triangle, distances: &[Real; 3], classes: &[i8; 3]) -> Vec<(i8, Triangle)> {
    debug_assert_eq!(classes.iter().fold(ON, |acc, c| acc | c), SPANNING);
    let cut = |a: usize, b: usize| -> (Point3<Real>, Vector3<Real>) {
        let t = distances[a] / (distances[a] - distances[b]);
        (
            tri.points[a] + (tri.points[b] - tri.points[a]) * t,
            triangle::lerp_normal(&tri.normals[a], &tri.normals[b], t),
        )
    };
    let fragment = |corners: [(Point3<Real>, Vector3<Real>); 3]| Triangle {
        points: corners.map(|c| c.0),
        normals: corners.map(|c| c.1),
        color: tri.color,
        object_id: tri.object_id,
        face_id: tri.face_id,
        next: None,
    };
    let corner = |i: usize| (tri.points[i], tri.normals[i]);

    if let Some(k) = classes.iter().position(|&c| c == ON) {
        // one corner in the plane: cut the opposite edge
        let (i, j) = ((k + 1) % 3, (k + 2) % 3);
        let p = cut(i, j);
        return vec![
            (classes[i], fragment([corner(k), corner(i), p])),
            (classes[j], fragment([corner(k), p, corner(j)])),
        ];
    }

    // the corner alone on its side
    let k = (0..3)
        .find(|&k| classes[k] != classes[(k + 1) % 3] && classes[k] != classes[(k + 2) % 3])
        .unwrap_or(0);
    let (i, j) = ((k + 1) % 3, (k + 2) % 3);
    let p = cut(k, i);
    let q = cut(k, j);
    vec![
        (classes[k], fragment([corner(k), p, q])),
        (classes[i], fragment([p, corner(i), corner(j)])),
        (classes[i], fragment([p, corner(j), q])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::FirstTriangleStrategy;
    use nalgebra::Matrix4;

    fn tri(points: [[Real; 3]; 3]) -> Triangle {
        Triangle::new(points.map(|[x, y, z]| Point3::new(x, y, z)))
    }

    fn split_by_x(t: &Triangle, x: Real) -> Vec<(i8, Triangle)> {
        let plane = Plane::from_normal(Vector3::x(), x);
        let distances = t.points.map(|p| plane.signed_distance(&p));
        let classes = distances.map(|d| Plane::orient_distance(d, 1e-9));
        split_triangle(t, &distances, &classes)
    }

    #[test]
    fn lone_corner_yields_three_fragments() {
        let t = tri([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0]]);
        let parts = split_by_x(&t, 1.0);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].0, INSIDE);
        assert!(parts[1..].iter().all(|(side, _)| *side == OUTSIDE));
        let area: Real = parts.iter().map(|(_, f)| f.area()).sum();
        assert!((area - t.area()).abs() < 1e-12);
        // winding is kept
        assert!(parts.iter().all(|(_, f)| f.face_normal().z > 0.0));
    }

    #[test]
    fn corner_in_plane_yields_two_fragments() {
        let t = tri([[1.0, 0.0, 0.0], [2.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
        let parts = split_by_x(&t, 1.0);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, OUTSIDE);
        assert_eq!(parts[1].0, INSIDE);
        assert!((parts[0].1.area() - 0.5).abs() < 1e-12);
        assert!((parts[1].1.area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn duplicate_coplanar_triangle_goes_to_a_shadow_node() {
        let mut ctx = Context::with_strategy(FirstTriangleStrategy);
        let t = tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let mut flipped = t.clone();
        flipped.points.swap(1, 2);
        ctx.add_triangles([t.clone(), flipped, t], &Matrix4::identity())
            .unwrap();
        ctx.build_tree().unwrap();

        let root = ctx.root().unwrap();
        assert_eq!(ctx.on_list(ctx.node(root).on).count(), 1);
        let shadow = ctx.node(root).inside.unwrap();
        assert!(!ctx.node(shadow).emit);
        let deeper = ctx.node(shadow).inside.unwrap();
        assert!(!ctx.node(deeper).emit);
        assert_eq!(ctx.emitted_count(), 1);
        assert_eq!(ctx.all_triangles().len(), 3);
    }

    #[test]
    fn incremental_build_reuses_existing_planes() {
        let mut ctx = Context::with_strategy(FirstTriangleStrategy);
        let floor = tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        ctx.add_triangles([floor.clone()], &Matrix4::identity()).unwrap();
        ctx.build_tree().unwrap();
        let root = ctx.root().unwrap();

        let above = tri([[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]);
        let beside = tri([[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]]);
        ctx.add_triangles([above, beside], &Matrix4::identity()).unwrap();
        ctx.build_tree().unwrap();

        assert_eq!(ctx.root(), Some(root));
        assert_eq!(ctx.on_list(ctx.node(root).on).count(), 2);
        assert!(ctx.node(root).outside.is_some());
        assert_eq!(ctx.node_count(), 2);
    }
}
