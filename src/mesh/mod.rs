//! `Mesh`: vertex / edge / triangle repair mesh.
//!
//! Objects placed independently in a scene overlap, touch and cross each
//! other. The mesh welds their vertices, threads every edge into the edge
//! ring of both endpoints and lets [`Mesh::solve_conflicts`] split edges and
//! triangles until the triangle set is conforming. [`Mesh::triangles`]
//! exports the result as plain [`Triangle`] records for the BSP context.
//!
//! All records live in [`Arena`]s and reference each other through handles:
//! * a [`Vertex`] points at one edge of its ring (`vlnk`),
//! * an [`Edge`] links to the next edge around each of its endpoints,
//! * a [`MeshTriangle`] lists its vertices and the edges between them.

use crate::arena::{Arena, Handle};
use crate::color::Color;
use crate::errors::{Error, Result};
use crate::float_types::{Real, tolerance};
use crate::scene::{self, Material, SceneObject};
use crate::triangle::{self, NO_OBJECT, Triangle};
use hashbrown::HashMap;
use nalgebra::{Matrix4, Point3, Vector3};

mod repair;
mod topology;
mod validate;

pub use repair::{RepairOptions, RepairStats};
pub use topology::EdgesAround;
pub use validate::TopologyError;

pub type VertexId = Handle<Vertex>;
pub type EdgeId = Handle<Edge>;
pub type MeshTriangleId = Handle<MeshTriangle>;

/// A welded mesh vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub pos: Point3<Real>,
    /// Sequential id in creation order.
    pub id: i32,
    /// Entry into the circular list of edges incident to this vertex.
    pub vlnk: Option<EdgeId>,
}

/// An undirected edge between two distinct vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub v: [VertexId; 2],
    /// `next[k]` is the following edge in the ring of `v[k]`.
    pub next: [Option<EdgeId>; 2],
    /// Live triangles bounded by this edge, normally one or two.
    pub triangles: Vec<MeshTriangleId>,
    pub removed: bool,
}

impl Edge {
    /// Slot (0 or 1) of `v` in this edge.
    #[inline]
    pub fn side(&self, v: VertexId) -> usize {
        debug_assert!(self.v.contains(&v), "vertex {v:?} is not an endpoint");
        usize::from(self.v[0] != v)
    }

    /// The endpoint that is not `v`.
    #[inline]
    pub fn other(&self, v: VertexId) -> VertexId {
        self.v[1 - self.side(v)]
    }

    #[inline]
    pub fn connects(&self, a: VertexId, b: VertexId) -> bool {
        (self.v[0] == a && self.v[1] == b) || (self.v[0] == b && self.v[1] == a)
    }
}

/// A triangle of the repair mesh. `e[i]` joins `v[i]` and `v[(i + 1) % 3]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshTriangle {
    pub v: [VertexId; 3],
    pub e: [EdgeId; 3],
    pub normals: [Vector3<Real>; 3],
    pub color: Color,
    pub object_id: i32,
    pub face_id: i32,
    /// Earlier triangle with exactly the same vertices, set by
    /// [`Mesh::solve_conflicts`].
    pub coincident: Option<MeshTriangleId>,
    pub removed: bool,
}

/// Repair mesh built from scene objects.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: Arena<Vertex>,
    edges: Arena<Edge>,
    triangles: Arena<MeshTriangle>,
    /// Spatial hash used to weld coincident vertices.
    grid: HashMap<[i64; 3], Vec<VertexId>>,
    next_face_id: i32,
    options: RepairOptions,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh whose arenas refuse to grow past the given record counts.
    pub fn with_limits(vertices: usize, edges: usize, triangles: usize) -> Self {
        Mesh {
            vertices: Arena::with_limit(vertices),
            edges: Arena::with_limit(edges),
            triangles: Arena::with_limit(triangles),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: RepairOptions) -> Self {
        self.options = options;
        self
    }

    pub const fn options(&self) -> &RepairOptions {
        &self.options
    }

    /// Transform `object` and insert its triangles.
    ///
    /// The object is validated and enough capacity for its worst case is
    /// reserved before anything is inserted, so a failure leaves the mesh as
    /// it was. Triangles that collapse once their vertices are welded are
    /// skipped.
    ///
    /// # Errors
    /// * [`Error::BadState`] for malformed object geometry,
    /// * [`Error::BadArguments`] for a singular transform,
    /// * [`Error::OutOfMemory`] if an arena cannot grow,
    /// * [`Error::Overflow`] if face ids run out.
    pub fn add_object<O: SceneObject + ?Sized>(
        &mut self,
        object: &O,
        transform: &Matrix4<Real>,
        material: &Material,
    ) -> Result<()> {
        let source = scene::triangulate(object, transform)?;
        let face_base = self.next_face_id;
        let next_face_id = i32::try_from(object.faces().len())
            .ok()
            .and_then(|n| face_base.checked_add(n))
            .ok_or_else(|| Error::Overflow("face ids exhausted".into()))?;

        let n = source.len();
        let new_vertices = object.positions().len().min(3 * n);
        self.reserve(new_vertices, 3 * n, n)?;

        let mut skipped = 0;
        for tri in &source {
            let v = [
                self.weld_vertex(tri.points[0])?,
                self.weld_vertex(tri.points[1])?,
                self.weld_vertex(tri.points[2])?,
            ];
            let face_id = face_base + tri.face as i32;
            if self
                .insert_triangle(v, tri.normals, material.color, object.id(), face_id)?
                .is_none()
            {
                skipped += 1;
            }
        }
        self.next_face_id = next_face_id;

        log::trace!(
            "mesh: object {} added {} triangles ({} collapsed)",
            object.id(),
            n - skipped,
            skipped
        );
        Ok(())
    }

    /// Insert a single world-space triangle.
    ///
    /// A triangle without a face id gets a fresh one. Returns `None` when the
    /// welded corners are not distinct.
    pub fn add_triangle(&mut self, triangle: &Triangle) -> Result<Option<MeshTriangleId>> {
        if triangle.points.iter().any(|p| p.coords.iter().any(|c| !c.is_finite())) {
            return Err(Error::BadState("triangle has non-finite coordinates".into()));
        }
        let (face_id, next_face_id) = if triangle.face_id == NO_OBJECT {
            let id = self.next_face_id;
            let next = id
                .checked_add(1)
                .ok_or_else(|| Error::Overflow("face ids exhausted".into()))?;
            (id, next)
        } else {
            (triangle.face_id, self.next_face_id)
        };
        self.reserve(3, 3, 1)?;
        let v = [
            self.weld_vertex(triangle.points[0])?,
            self.weld_vertex(triangle.points[1])?,
            self.weld_vertex(triangle.points[2])?,
        ];
        let t = self.insert_triangle(v, triangle.normals, triangle.color, triangle.object_id, face_id)?;
        self.next_face_id = next_face_id;
        Ok(t)
    }

    fn reserve(&mut self, vertices: usize, edges: usize, triangles: usize) -> Result<()> {
        self.vertices.reserve(vertices)?;
        self.edges.reserve(edges)?;
        self.triangles.reserve(triangles)?;
        self.grid
            .try_reserve(vertices)
            .map_err(|_| Error::OutOfMemory {
                requested: self.grid.len() + vertices,
            })
    }

    /// Wire a triangle over existing vertices. Returns `None` if two corners
    /// are the same vertex.
    pub(crate) fn insert_triangle(
        &mut self,
        v: [VertexId; 3],
        normals: [Vector3<Real>; 3],
        color: Color,
        object_id: i32,
        face_id: i32,
    ) -> Result<Option<MeshTriangleId>> {
        if v[0] == v[1] || v[1] == v[2] || v[2] == v[0] {
            return Ok(None);
        }
        let e = [
            self.find_or_create_edge(v[0], v[1])?,
            self.find_or_create_edge(v[1], v[2])?,
            self.find_or_create_edge(v[2], v[0])?,
        ];
        let t = self.triangles.alloc(MeshTriangle {
            v,
            e,
            normals,
            color,
            object_id,
            face_id,
            coincident: None,
            removed: false,
        })?;
        for edge in e {
            self.edges[edge].triangles.push(t);
        }
        Ok(Some(t))
    }

    fn grid_key(p: &Point3<Real>) -> [i64; 3] {
        let cell = 4.0 * tolerance();
        [
            (p.x / cell).floor() as i64,
            (p.y / cell).floor() as i64,
            (p.z / cell).floor() as i64,
        ]
    }

    /// Existing vertex within the tolerance of `p`.
    pub fn find_vertex(&self, p: &Point3<Real>) -> Option<VertexId> {
        let eps2 = tolerance() * tolerance();
        let [x, y, z] = Self::grid_key(p);
        let mut best: Option<(Real, VertexId)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(cell) = self.grid.get(&[x + dx, y + dy, z + dz]) else {
                        continue;
                    };
                    for &v in cell {
                        let d2 = (self.vertices[v].pos - p).norm_squared();
                        if d2 <= eps2 && best.is_none_or(|(b, _)| d2 < b) {
                            best = Some((d2, v));
                        }
                    }
                }
            }
        }
        best.map(|(_, v)| v)
    }

    /// Return the vertex at `p`, creating it if no vertex is close enough.
    pub(crate) fn weld_vertex(&mut self, p: Point3<Real>) -> Result<VertexId> {
        if let Some(v) = self.find_vertex(&p) {
            return Ok(v);
        }
        let id = i32::try_from(self.vertices.len())
            .map_err(|_| Error::Overflow("vertex ids exhausted".into()))?;
        let v = self.vertices.alloc(Vertex {
            pos: p,
            id,
            vlnk: None,
        })?;
        self.grid.entry(Self::grid_key(&p)).or_default().push(v);
        Ok(v)
    }

    /// Drop all contents, keep the allocated capacity.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.triangles.clear();
        self.grid.clear();
        self.next_face_id = 0;
    }

    /// Drop all contents and release the storage.
    pub fn flush(&mut self) {
        self.vertices.flush();
        self.edges.flush();
        self.triangles.flush();
        self.grid = HashMap::new();
        self.next_face_id = 0;
    }

    /// Exchange contents with `other` in constant time.
    pub fn swap(&mut self, other: &mut Mesh) {
        std::mem::swap(self, other);
    }

    /// Replace the contents of `self` with a deep copy of `src`.
    pub fn copy_from(&mut self, src: &Mesh) {
        self.clone_from(src);
    }

    pub fn vertex(&self, v: VertexId) -> &Vertex {
        &self.vertices[v]
    }

    pub fn edge(&self, e: EdgeId) -> &Edge {
        &self.edges[e]
    }

    pub fn triangle(&self, t: MeshTriangleId) -> &MeshTriangle {
        &self.triangles[t]
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> + '_ {
        self.vertices.iter()
    }

    pub fn live_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter().filter(|(_, e)| !e.removed)
    }

    pub fn live_triangles(&self) -> impl Iterator<Item = (MeshTriangleId, &MeshTriangle)> + '_ {
        self.triangles.iter().filter(|(_, t)| !t.removed)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.live_edges().count()
    }

    pub fn triangle_count(&self) -> usize {
        self.live_triangles().count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_triangles().next().is_none()
    }

    /// Corner positions of a mesh triangle.
    pub fn points(&self, t: MeshTriangleId) -> [Point3<Real>; 3] {
        self.triangles[t].v.map(|v| self.vertices[v].pos)
    }

    /// Sum of the areas of all live triangles.
    pub fn total_area(&self) -> Real {
        self.live_triangles()
            .map(|(t, _)| triangle::area(&self.points(t)))
            .sum()
    }

    /// Export live triangles as plain records, ready for
    /// [`Context::add_triangles`](crate::bsp::Context::add_triangles).
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.live_triangles().map(|(t, tri)| Triangle {
            points: self.points(t),
            normals: tri.normals,
            color: tri.color,
            object_id: tri.object_id,
            face_id: tri.face_id,
            next: None,
        })
    }
}
