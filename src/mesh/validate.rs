//! Structural consistency checks for [`Mesh`].

use super::{EdgeId, Mesh, MeshTriangleId, VertexId};

/// First inconsistency found by [`Mesh::check_topology`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("(DegenerateEdge) edge {0:?} joins a vertex to itself")]
    DegenerateEdge(EdgeId),

    #[error("(OpenRing) ring of vertex {0:?} does not close on itself")]
    OpenRing(VertexId),

    #[error("(DeadEdgeInRing) ring of vertex {vertex:?} holds removed edge {edge:?}")]
    DeadEdgeInRing { vertex: VertexId, edge: EdgeId },

    #[error("(ForeignEdgeInRing) ring of vertex {vertex:?} holds edge {edge:?}, which does not touch it")]
    ForeignEdgeInRing { vertex: VertexId, edge: EdgeId },

    #[error("(RingCount) rings hold {found} entries for {edges} live edges")]
    RingCount { edges: usize, found: usize },

    #[error("(EdgeTriangle) edge {edge:?} lists triangle {triangle:?}, which does not use it")]
    EdgeTriangle { edge: EdgeId, triangle: MeshTriangleId },

    #[error("(TriangleEdge) triangle {triangle:?} is not listed on its edge {edge:?}")]
    TriangleEdge { triangle: MeshTriangleId, edge: EdgeId },

    #[error("(TriangleCorners) triangle {0:?} edges do not match its corners")]
    TriangleCorners(MeshTriangleId),
}

impl Mesh {
    /// Verify ring, edge and triangle invariants. Read only.
    pub fn check_topology(&self) -> Result<(), TopologyError> {
        let mut live_edges = 0;
        for (e, edge) in self.live_edges() {
            live_edges += 1;
            if edge.v[0] == edge.v[1] {
                return Err(TopologyError::DegenerateEdge(e));
            }
            for &t in &edge.triangles {
                let tri = &self.triangles[t];
                if tri.removed || !tri.e.contains(&e) {
                    return Err(TopologyError::EdgeTriangle { edge: e, triangle: t });
                }
            }
        }

        // Every ring entry is a live edge touching its vertex and every ring
        // closes, so the total count pins each live edge to both endpoint
        // rings exactly once.
        let mut found = 0;
        for (v, vertex) in self.vertices() {
            let Some(start) = vertex.vlnk else {
                continue;
            };
            let mut e = start;
            let mut closed = false;
            for _ in 0..=live_edges {
                let edge = &self.edges[e];
                if edge.removed {
                    return Err(TopologyError::DeadEdgeInRing { vertex: v, edge: e });
                }
                if !edge.v.contains(&v) {
                    return Err(TopologyError::ForeignEdgeInRing { vertex: v, edge: e });
                }
                found += 1;
                match edge.next[edge.side(v)] {
                    Some(n) if n == start => {
                        closed = true;
                        break;
                    },
                    Some(n) => e = n,
                    None => break,
                }
            }
            if !closed {
                return Err(TopologyError::OpenRing(v));
            }
        }
        if found != 2 * live_edges {
            return Err(TopologyError::RingCount {
                edges: live_edges,
                found,
            });
        }

        for (t, tri) in self.live_triangles() {
            for i in 0..3 {
                let e = tri.e[i];
                let edge = &self.edges[e];
                if edge.removed || !edge.connects(tri.v[i], tri.v[(i + 1) % 3]) {
                    return Err(TopologyError::TriangleCorners(t));
                }
                if !edge.triangles.contains(&t) {
                    return Err(TopologyError::TriangleEdge { triangle: t, edge: e });
                }
            }
        }
        Ok(())
    }

    /// Whether the mesh is structurally consistent. Failures are logged.
    pub fn validate(&self) -> bool {
        match self.check_topology() {
            Ok(()) => true,
            Err(err) => {
                log::warn!("mesh validation failed: {err}");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangle::Triangle;
    use nalgebra::Point3;

    fn single() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_triangle(&Triangle::new([
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]))
        .unwrap();
        mesh
    }

    #[test]
    fn empty_and_single_triangle_are_valid() {
        assert!(Mesh::new().validate());
        assert_eq!(single().check_topology(), Ok(()));
    }

    #[test]
    fn broken_ring_is_reported() {
        let mut mesh = single();
        let (e, _) = mesh.live_edges().next().unwrap();
        mesh.edges[e].next = [None; 2];
        assert!(matches!(mesh.check_topology(), Err(TopologyError::OpenRing(_))));
        assert!(!mesh.validate());
    }

    #[test]
    fn missing_back_reference_is_reported() {
        let mut mesh = single();
        let (e, _) = mesh.live_edges().next().unwrap();
        mesh.edges[e].triangles.clear();
        assert!(matches!(
            mesh.check_topology(),
            Err(TopologyError::TriangleEdge { .. })
        ));
    }
}
