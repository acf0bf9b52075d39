//! BSP tree node record

use crate::arena::Handle;
use crate::plane::Plane;
use crate::triangle::TriangleId;

pub type NodeId = Handle<Node>;

/// A BSP tree node: a splitting plane, the triangles lying in it and the two
/// half-space subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Splitting plane. The normal points to the *outside* subtree.
    pub plane: Plane,

    /// Subtree on the negative side of `plane`.
    pub inside: Option<NodeId>,

    /// Subtree on the positive side of `plane`.
    pub outside: Option<NodeId>,

    /// Head of the list of triangles lying in `plane`, chained through
    /// [`Triangle::next`](crate::triangle::Triangle::next) in insertion order.
    pub on: Option<TriangleId>,

    /// Whether traversal emits the `on` list. Shadow nodes holding duplicate
    /// coplanar triangles are not emitted.
    pub emit: bool,
}

impl Node {
    pub const fn new(plane: Plane) -> Self {
        Self {
            plane,
            inside: None,
            outside: None,
            on: None,
            emit: true,
        }
    }

    /// Non-emitting node sharing `plane`, to hang below the node whose
    /// coplanar triangles it duplicates.
    pub const fn shadow(plane: Plane, inside: Option<NodeId>) -> Self {
        Self {
            plane,
            inside,
            outside: None,
            on: None,
            emit: false,
        }
    }

    pub const fn is_leaf(&self) -> bool {
        self.inside.is_none() && self.outside.is_none()
    }
}
