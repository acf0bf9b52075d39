//! Binary Space Partitioning (BSP) context
//!
//! A [`Context`] collects world-space triangles, organizes them into a BSP
//! tree ([`Context::build_tree`]) and emits them back to front as seen from a
//! point of view ([`Context::build_mesh`]), which is the order a painter's
//! algorithm or an occlusion sweep needs.
//!
//! Nodes and triangles live in two arenas owned by the context. The plane
//! selection is pluggable through [`SplittingPlaneStrategy`].

pub mod build;
pub mod node;
pub mod traits;
pub mod traverse;

pub use node::{Node, NodeId};
pub use traits::{BalancedSplittingStrategy, FirstTriangleStrategy, SplittingPlaneStrategy};
pub use traverse::DrawVertex;

use crate::arena::Arena;
use crate::errors::{Error, Result};
use crate::float_types::{Real, tolerance};
use crate::scene::{self, Material, SceneObject, Transform};
use crate::triangle::{Triangle, TriangleId};
use nalgebra::Matrix4;

/// BSP builder and traversal state.
#[derive(Debug, Clone)]
pub struct Context<S = BalancedSplittingStrategy> {
    nodes: Arena<Node>,
    triangles: Arena<Triangle>,
    root: Option<NodeId>,
    /// Triangles added since the last [`build_tree`](Self::build_tree).
    pending: Vec<TriangleId>,
    /// Cleared when a build fails half way; only [`clear`](Self::clear) and
    /// [`flush`](Self::flush) restore it.
    valid: bool,
    next_face_id: i32,
    strategy: S,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_strategy(BalancedSplittingStrategy::default())
    }
}

impl<S: SplittingPlaneStrategy> Context<S> {
    pub fn with_strategy(strategy: S) -> Self {
        Context {
            nodes: Arena::new(),
            triangles: Arena::new(),
            root: None,
            pending: Vec::new(),
            valid: true,
            next_face_id: 0,
            strategy,
        }
    }

    /// Cap the node and triangle arenas; growth past a cap is
    /// [`Error::OutOfMemory`].
    pub fn with_limits(mut self, nodes: usize, triangles: usize) -> Self {
        self.nodes.set_limit(nodes);
        self.triangles.set_limit(triangles);
        self
    }

    pub const fn strategy(&self) -> &S {
        &self.strategy
    }

    pub(crate) fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::BadState(
                "BSP tree is incomplete after a failed build; clear the context".into(),
            ))
        }
    }

    fn reserve_pending(&mut self, additional: usize) -> Result<()> {
        self.triangles.reserve(additional)?;
        self.pending
            .try_reserve(additional)
            .map_err(|_| Error::OutOfMemory {
                requested: self.pending.len() + additional,
            })
    }

    /// Queue a triangle for the next build. Degenerate triangles are skipped.
    fn push_pending(&mut self, mut triangle: Triangle) -> Result<Option<TriangleId>> {
        if triangle.is_degenerate(tolerance()) {
            return Ok(None);
        }
        triangle.next = None;
        let t = self.triangles.alloc(triangle)?;
        self.pending.push(t);
        Ok(Some(t))
    }

    /// Transform `object` and queue its triangles, colored with `material`.
    ///
    /// Fan triangles of one face share a face id. The object is validated
    /// before anything is queued.
    pub fn add_object<O: SceneObject + ?Sized>(
        &mut self,
        object: &O,
        transform: &Matrix4<Real>,
        material: &Material,
    ) -> Result<()> {
        self.ensure_valid()?;
        let source = scene::triangulate(object, transform)?;
        let face_base = self.next_face_id;
        let next_face_id = i32::try_from(object.faces().len())
            .ok()
            .and_then(|n| face_base.checked_add(n))
            .ok_or_else(|| Error::Overflow("face ids exhausted".into()))?;
        self.reserve_pending(source.len())?;

        for tri in source {
            self.push_pending(Triangle {
                points: tri.points,
                normals: tri.normals,
                color: material.color,
                object_id: object.id(),
                face_id: face_base + tri.face as i32,
                next: None,
            })?;
        }
        self.next_face_id = next_face_id;
        Ok(())
    }

    /// Transform and queue ready-made triangles, keeping their colors and ids.
    ///
    /// Returns how many were queued; degenerate ones are skipped.
    pub fn add_triangles<I>(&mut self, triangles: I, transform: &Matrix4<Real>) -> Result<usize>
    where
        I: IntoIterator<Item = Triangle>,
    {
        self.ensure_valid()?;
        let transform = Transform::new(transform)?;
        let triangles = triangles.into_iter();
        let mut staged: Vec<Triangle> = Vec::new();
        stage_reserve(&mut staged, triangles.size_hint().0)?;
        for mut tri in triangles {
            if tri.points.iter().any(|p| p.coords.iter().any(|c| !c.is_finite())) {
                return Err(Error::BadState("triangle has non-finite coordinates".into()));
            }
            tri.points = tri.points.map(|p| transform.point(&p));
            tri.normals = tri.normals.map(|n| transform.normal(&n));
            stage_reserve(&mut staged, 1)?;
            staged.push(tri);
        }
        self.reserve_pending(staged.len())?;

        let mut added = 0;
        for tri in staged {
            if self.push_pending(tri)?.is_some() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Drop tree and triangles, keep the allocated capacity. Also recovers
    /// from a failed build.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.triangles.clear();
        self.pending.clear();
        self.root = None;
        self.valid = true;
        self.next_face_id = 0;
    }

    /// Like [`clear`](Self::clear), and release the storage.
    pub fn flush(&mut self) {
        self.nodes.flush();
        self.triangles.flush();
        self.pending = Vec::new();
        self.root = None;
        self.valid = true;
        self.next_face_id = 0;
    }

    /// Exchange contents with `other` in constant time.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn triangle(&self, id: TriangleId) -> &Triangle {
        &self.triangles[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Triangles waiting for the next build.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// No tree and nothing pending.
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.pending.is_empty()
    }

    /// Triangles of the on-list starting at `head`.
    pub fn on_list(&self, head: Option<TriangleId>) -> OnList<'_> {
        OnList {
            triangles: &self.triangles,
            current: head,
        }
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let node = &self.nodes[id];
            stack.extend(
                [node.inside, node.outside]
                    .into_iter()
                    .flatten()
                    .map(|child| (child, depth + 1)),
            );
        }
        deepest
    }

    /// Every triangle linked into the tree, shadow nodes included, in
    /// node-allocation order.
    pub fn all_triangles(&self) -> Vec<Triangle> {
        self.nodes
            .values()
            .flat_map(|node| self.on_list(node.on))
            .map(|(_, tri)| tri.clone())
            .collect()
    }

    /// Number of triangles a traversal emits.
    pub fn emitted_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| node.emit)
            .map(|node| self.on_list(node.on).count())
            .sum()
    }
}

/// Iterator over a node's coplanar triangle list.
pub struct OnList<'a> {
    triangles: &'a Arena<Triangle>,
    current: Option<TriangleId>,
}

impl<'a> Iterator for OnList<'a> {
    type Item = (TriangleId, &'a Triangle);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let tri = &self.triangles[id];
        self.current = tri.next;
        Some((id, tri))
    }
}

fn stage_reserve(staged: &mut Vec<Triangle>, additional: usize) -> Result<()> {
    let requested = staged.len().saturating_add(additional);
    staged
        .try_reserve(additional)
        .map_err(|_| Error::OutOfMemory { requested })
}
