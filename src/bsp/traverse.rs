//! Back-to-front traversal

use super::node::NodeId;
use super::traits::SplittingPlaneStrategy;
use super::Context;
use crate::color::Color;
use crate::errors::{Error, Result};
use crate::float_types::Real;
use crate::triangle::{Triangle, TriangleId};
use nalgebra::{Point3, Vector3};

/// One corner of an emitted triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawVertex {
    pub position: Point3<Real>,
    pub normal: Vector3<Real>,
    pub color: Color,
}

enum Visit {
    Node(NodeId),
    Emit(NodeId),
}

impl<S: SplittingPlaneStrategy> Context<S> {
    /// Visit the emitted triangles of the tree, farthest from `pov` first.
    ///
    /// At each node the subtree on the far side of the plane is visited
    /// first, then the node's own triangles, then the near side. A point of
    /// view lying in a plane counts as outside it. Pending triangles are not
    /// part of the tree until the next [`build_tree`](Self::build_tree).
    pub fn traverse<F>(&self, pov: &Point3<Real>, mut visit: F) -> Result<()>
    where
        F: FnMut(TriangleId, &Triangle),
    {
        self.ensure_valid()?;
        let mut stack: Vec<Visit> = self.root.map(Visit::Node).into_iter().collect();

        while let Some(item) = stack.pop() {
            match item {
                Visit::Node(id) => {
                    let node = &self.nodes[id];
                    let (near, far) = if node.plane.signed_distance(pov) >= 0.0 {
                        (node.outside, node.inside)
                    } else {
                        (node.inside, node.outside)
                    };
                    // popped in reverse: far, own triangles, near
                    stack.extend(near.map(Visit::Node));
                    if node.emit {
                        stack.push(Visit::Emit(id));
                    }
                    stack.extend(far.map(Visit::Node));
                },
                Visit::Emit(id) => {
                    for (t, tri) in self.on_list(self.nodes[id].on) {
                        visit(t, tri);
                    }
                },
            }
        }
        Ok(())
    }

    /// Append the emitted triangles to `out` in back-to-front order as seen
    /// from `pov`, three vertices per triangle. Returns the triangle count.
    ///
    /// # Errors
    /// * [`Error::BadState`] if a previous build failed,
    /// * [`Error::OutOfMemory`] if `out` cannot grow; `out` is left as it was.
    pub fn build_mesh(&self, pov: &Point3<Real>, out: &mut Vec<DrawVertex>) -> Result<usize> {
        self.ensure_valid()?;
        let count = self.emitted_count();
        out.try_reserve(3 * count).map_err(|_| Error::OutOfMemory {
            requested: out.len() + 3 * count,
        })?;

        self.traverse(pov, |_, tri| {
            out.extend((0..3).map(|i| DrawVertex {
                position: tri.points[i],
                normal: tri.normals[i],
                color: tri.color,
            }));
        })?;
        Ok(count)
    }

    /// Emitted triangles in back-to-front order as seen from `pov`.
    pub fn ordered_triangles(&self, pov: &Point3<Real>) -> Result<Vec<Triangle>> {
        let mut ordered = Vec::with_capacity(self.emitted_count());
        self.traverse(pov, |_, tri| ordered.push(tri.clone()))?;
        Ok(ordered)
    }
}
