//! Edge rings and the local operations that rewire them.
//!
//! Each vertex owns a circular singly linked list of its incident edges. An
//! edge sits in two rings at once, one per endpoint, so it carries one `next`
//! link per side. The vertex only stores an entry point (`vlnk`); every ring
//! operation walks from there.

use super::{Edge, EdgeId, Mesh, MeshTriangle, MeshTriangleId, VertexId};
use crate::errors::{Error, Result};
use crate::float_types::{Real, tolerance};
use crate::triangle;

/// Iterator over the edges incident to a vertex, in ring order.
pub struct EdgesAround<'a> {
    mesh: &'a Mesh,
    vertex: VertexId,
    start: Option<EdgeId>,
    current: Option<EdgeId>,
    // bounds the walk on a corrupted ring
    remaining: usize,
}

impl Iterator for EdgesAround<'_> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<EdgeId> {
        let e = self.current?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let next = self.mesh.next_around(e, self.vertex);
        self.current = next.filter(|&n| Some(n) != self.start);
        Some(e)
    }
}

impl Mesh {
    /// Edge following `e` in the ring of its endpoint `v`.
    #[inline]
    pub fn next_around(&self, e: EdgeId, v: VertexId) -> Option<EdgeId> {
        let edge = &self.edges[e];
        edge.next[edge.side(v)]
    }

    #[inline]
    fn set_next_around(&mut self, e: EdgeId, v: VertexId, next: Option<EdgeId>) {
        let edge = &mut self.edges[e];
        let side = edge.side(v);
        edge.next[side] = next;
    }

    /// Walk the edge ring of `v`.
    pub fn edges_around(&self, v: VertexId) -> EdgesAround<'_> {
        let start = self.vertices[v].vlnk;
        EdgesAround {
            mesh: self,
            vertex: v,
            start,
            current: start,
            remaining: self.edges.len(),
        }
    }

    /// Number of edges incident to `v`.
    pub fn valence(&self, v: VertexId) -> usize {
        self.edges_around(v).count()
    }

    /// The live edge joining `a` and `b`, if any.
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.edges_around(a)
            .find(|&e| self.edges[e].other(a) == b)
    }

    /// Insert `e` into the ring of `v`, right after the ring's entry edge.
    fn link_into_ring(&mut self, e: EdgeId, v: VertexId) {
        match self.vertices[v].vlnk {
            None => {
                self.set_next_around(e, v, Some(e));
                self.vertices[v].vlnk = Some(e);
            },
            Some(head) => {
                let after = self.next_around(head, v);
                self.set_next_around(e, v, after);
                self.set_next_around(head, v, Some(e));
            },
        }
    }

    /// Remove `e` from the ring of `v`.
    fn unlink_from_ring(&mut self, e: EdgeId, v: VertexId) {
        let next = self.next_around(e, v);
        if next == Some(e) || next.is_none() {
            if self.vertices[v].vlnk == Some(e) {
                self.vertices[v].vlnk = None;
            }
            return;
        }
        let mut prev = e;
        for _ in 0..self.edges.len() {
            match self.next_around(prev, v) {
                Some(n) if n == e => break,
                Some(n) => prev = n,
                None => break,
            }
        }
        self.set_next_around(prev, v, next);
        if self.vertices[v].vlnk == Some(e) {
            self.vertices[v].vlnk = next;
        }
    }

    /// Allocate an edge between two distinct vertices and thread it into both
    /// rings. Does not look for an existing edge.
    pub(crate) fn link_edge(&mut self, a: VertexId, b: VertexId) -> Result<EdgeId> {
        if a == b {
            return Err(Error::BadArguments(format!("edge endpoints are both {a:?}")));
        }
        let e = self.edges.alloc(Edge {
            v: [a, b],
            next: [None; 2],
            triangles: Vec::new(),
            removed: false,
        })?;
        self.link_into_ring(e, a);
        self.link_into_ring(e, b);
        Ok(e)
    }

    /// Take `e` out of both rings and mark it removed.
    pub fn unlink_edge(&mut self, e: EdgeId) {
        if self.edges[e].removed {
            return;
        }
        let [a, b] = self.edges[e].v;
        self.unlink_from_ring(e, a);
        self.unlink_from_ring(e, b);
        let edge = &mut self.edges[e];
        edge.next = [None; 2];
        edge.triangles.clear();
        edge.removed = true;
    }

    pub(crate) fn find_or_create_edge(&mut self, a: VertexId, b: VertexId) -> Result<EdgeId> {
        match self.find_edge(a, b) {
            Some(e) => Ok(e),
            None => self.link_edge(a, b),
        }
    }

    fn drop_triangle_from_edge(&mut self, e: EdgeId, t: MeshTriangleId) {
        self.edges[e].triangles.retain(|&x| x != t);
    }

    fn replace_triangle_on_edge(&mut self, e: EdgeId, from: MeshTriangleId, to: MeshTriangleId) {
        for x in self.edges[e].triangles.iter_mut() {
            if *x == from {
                *x = to;
            }
        }
    }

    /// Reserve one edge slot per pair that is not joined yet.
    fn reserve_missing_edges(&mut self, pairs: &[(VertexId, VertexId)]) -> Result<()> {
        let missing = pairs
            .iter()
            .filter(|&&(a, b)| self.find_edge(a, b).is_none())
            .count();
        self.edges.reserve(missing)
    }

    fn unlink_if_degenerate(&mut self, fragments: &[MeshTriangleId]) {
        let eps = tolerance();
        for &frag in fragments {
            if !self.triangles[frag].removed && self.triangle_is_degenerate(frag, eps) {
                self.unlink_triangle(frag);
            }
        }
    }

    /// Detach `t` from its edges, unlink the edges it leaves bare and mark it
    /// removed.
    pub fn unlink_triangle(&mut self, t: MeshTriangleId) {
        if self.triangles[t].removed {
            return;
        }
        for e in self.triangles[t].e {
            if self.edges[e].removed {
                continue;
            }
            self.drop_triangle_from_edge(e, t);
            if self.edges[e].triangles.is_empty() {
                self.unlink_edge(e);
            }
        }
        let tri = &mut self.triangles[t];
        tri.removed = true;
        tri.coincident = None;
    }

    pub(crate) fn triangle_is_degenerate(&self, t: MeshTriangleId, eps: Real) -> bool {
        let v = self.triangles[t].v;
        v[0] == v[1] || v[1] == v[2] || v[2] == v[0] || triangle::is_degenerate(&self.points(t), eps)
    }

    /// Split every triangle bounded by `e` at vertex `v`, which must lie on
    /// the edge, and retire `e`.
    ///
    /// Returns the live edges incident to `v` afterwards.
    pub fn split_edge(&mut self, e: EdgeId, v: VertexId) -> Result<Vec<EdgeId>> {
        let edge = &self.edges[e];
        if edge.removed {
            return Err(Error::BadArguments(format!("edge {e:?} was removed")));
        }
        if edge.v.contains(&v) {
            return Err(Error::BadArguments(format!("{v:?} is an endpoint of edge {e:?}")));
        }
        let triangles = edge.triangles.clone();
        self.edges.reserve(2 + triangles.len())?;
        self.triangles.reserve(triangles.len())?;

        for t in triangles {
            self.split_triangle(t, e, v)?;
        }
        self.unlink_edge(e);
        Ok(self.edges_around(v).collect())
    }

    /// Split triangle `t` at vertex `v` on its edge `e`.
    ///
    /// With `e = (a, b)` and `c` the opposite corner, `t` becomes `(a, v, c)`
    /// and a new triangle `(v, b, c)` is created with the same attributes. The
    /// normal at `v` is interpolated along `a → b`. Fragments that come out
    /// degenerate are unlinked. `e` itself is left in place without `t`.
    pub fn split_triangle(&mut self, t: MeshTriangleId, e: EdgeId, v: VertexId) -> Result<[MeshTriangleId; 2]> {
        let tri = self.triangles[t];
        if tri.removed {
            return Err(Error::BadArguments(format!("triangle {t:?} was removed")));
        }
        let Some(i) = tri.e.iter().position(|&x| x == e) else {
            return Err(Error::BadArguments(format!("edge {e:?} does not bound triangle {t:?}")));
        };
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        let (a, b, c) = (tri.v[i], tri.v[j], tri.v[k]);
        if v == a || v == b || v == c {
            return Err(Error::BadArguments(format!("{v:?} is a corner of triangle {t:?}")));
        }
        let (e_bc, e_ca) = (tri.e[j], tri.e[k]);

        let pa = self.vertices[a].pos;
        let ab = self.vertices[b].pos - pa;
        let along = if ab.norm_squared() > 0.0 {
            ((self.vertices[v].pos - pa).dot(&ab) / ab.norm_squared()).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let nv = triangle::lerp_normal(&tri.normals[i], &tri.normals[j], along);

        self.reserve_missing_edges(&[(a, v), (v, b), (v, c)])?;
        self.triangles.reserve(1)?;
        let e_av = self.find_or_create_edge(a, v)?;
        let e_vb = self.find_or_create_edge(v, b)?;
        let e_vc = self.find_or_create_edge(v, c)?;

        let t2 = self.triangles.alloc(MeshTriangle {
            v: [v, b, c],
            e: [e_vb, e_bc, e_vc],
            normals: [nv, tri.normals[j], tri.normals[k]],
            coincident: None,
            ..tri
        })?;
        {
            let first = &mut self.triangles[t];
            first.v = [a, v, c];
            first.e = [e_av, e_vc, e_ca];
            first.normals = [tri.normals[i], nv, tri.normals[k]];
            first.coincident = None;
        }

        self.drop_triangle_from_edge(e, t);
        self.replace_triangle_on_edge(e_bc, t, t2);
        self.edges[e_av].triangles.push(t);
        self.edges[e_vc].triangles.extend([t, t2]);
        self.edges[e_vb].triangles.push(t2);

        self.unlink_if_degenerate(&[t, t2]);
        Ok([t, t2])
    }

    /// Split triangle `t` around vertex `v`, which lies in its interior.
    ///
    /// `(a, b, c)` becomes the fan `(a, b, v)`, `(b, c, v)`, `(c, a, v)`, with
    /// `t` keeping the first fragment. All fragments keep the winding, ids and
    /// color of `t`; the normal at `v` is blended from the corner normals.
    /// Fragments that come out degenerate are unlinked.
    pub fn split_triangle_interior(&mut self, t: MeshTriangleId, v: VertexId) -> Result<[MeshTriangleId; 3]> {
        let tri = self.triangles[t];
        if tri.removed {
            return Err(Error::BadArguments(format!("triangle {t:?} was removed")));
        }
        if tri.v.contains(&v) {
            return Err(Error::BadArguments(format!("{v:?} is a corner of triangle {t:?}")));
        }
        let [a, b, c] = tri.v;
        let [e_ab, e_bc, e_ca] = tri.e;
        let nv = triangle::barycentric_normal(&self.points(t), &tri.normals, &self.vertices[v].pos);

        self.reserve_missing_edges(&[(a, v), (b, v), (c, v)])?;
        self.triangles.reserve(2)?;
        let e_av = self.find_or_create_edge(a, v)?;
        let e_bv = self.find_or_create_edge(b, v)?;
        let e_cv = self.find_or_create_edge(c, v)?;

        let t2 = self.triangles.alloc(MeshTriangle {
            v: [b, c, v],
            e: [e_bc, e_cv, e_bv],
            normals: [tri.normals[1], tri.normals[2], nv],
            coincident: None,
            ..tri
        })?;
        let t3 = self.triangles.alloc(MeshTriangle {
            v: [c, a, v],
            e: [e_ca, e_av, e_cv],
            normals: [tri.normals[2], tri.normals[0], nv],
            coincident: None,
            ..tri
        })?;
        {
            let first = &mut self.triangles[t];
            first.v = [a, b, v];
            first.e = [e_ab, e_bv, e_av];
            first.normals = [tri.normals[0], tri.normals[1], nv];
            first.coincident = None;
        }

        self.replace_triangle_on_edge(e_bc, t, t2);
        self.replace_triangle_on_edge(e_ca, t, t3);
        self.edges[e_av].triangles.extend([t3, t]);
        self.edges[e_bv].triangles.extend([t, t2]);
        self.edges[e_cv].triangles.extend([t2, t3]);

        self.unlink_if_degenerate(&[t, t2, t3]);
        Ok([t, t2, t3])
    }

    /// Re-derive the edges of `t` from its vertices.
    ///
    /// The corners are rotated so the lowest vertex handle comes first (the
    /// winding is kept) and each `e[i]` is set to the live edge joining
    /// `v[i]` and `v[i + 1]`. A degenerate triangle is unlinked instead.
    /// Returns whether `t` is still live.
    pub fn arrange_triangle(&mut self, t: MeshTriangleId) -> Result<bool> {
        if self.triangles[t].removed {
            return Ok(false);
        }
        if self.triangle_is_degenerate(t, tolerance()) {
            self.unlink_triangle(t);
            return Ok(false);
        }
        let tri = self.triangles[t];
        let first = (0..3).min_by_key(|&i| tri.v[i]).unwrap_or(0);
        let v = [0, 1, 2].map(|i| tri.v[(first + i) % 3]);
        let normals = [0, 1, 2].map(|i| tri.normals[(first + i) % 3]);

        self.reserve_missing_edges(&[(v[0], v[1]), (v[1], v[2]), (v[2], v[0])])?;
        let mut e = tri.e;
        for i in 0..3 {
            let wanted = self.find_or_create_edge(v[i], v[(i + 1) % 3])?;
            if !self.edges[wanted].triangles.contains(&t) {
                self.edges[wanted].triangles.push(t);
            }
            e[i] = wanted;
        }
        for old in tri.e {
            if !e.contains(&old) && !self.edges[old].removed {
                self.drop_triangle_from_edge(old, t);
                if self.edges[old].triangles.is_empty() {
                    self.unlink_edge(old);
                }
            }
        }
        let rec = &mut self.triangles[t];
        rec.v = v;
        rec.e = e;
        rec.normals = normals;
        Ok(true)
    }
}
