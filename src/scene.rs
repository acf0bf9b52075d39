//! Scene objects as consumed by [`Mesh`](crate::mesh::Mesh) and
//! [`Context`](crate::bsp::Context).
//!
//! An object exposes positions, optional normals and polygonal faces
//! indexing into them. Before anything is inserted, the whole object is
//! validated and expanded into world-space triangles by [`triangulate`]. A
//! malformed object is rejected before any mutation.

use crate::color::Color;
use crate::errors::{Error, Result};
use crate::float_types::Real;
use crate::triangle;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// A polygonal face of a [`SceneObject`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Face {
    /// Indices into [`SceneObject::positions`], counter-clockwise seen from outside.
    pub vertices: Vec<usize>,
    /// Per-corner indices into [`SceneObject::normals`]; empty for flat shading.
    pub normals: Vec<usize>,
}

impl Face {
    pub fn new(vertices: Vec<usize>) -> Self {
        Face {
            vertices,
            normals: Vec::new(),
        }
    }

    pub fn with_normals(vertices: Vec<usize>, normals: Vec<usize>) -> Self {
        Face { vertices, normals }
    }

    pub fn triangle(a: usize, b: usize, c: usize) -> Self {
        Self::new(vec![a, b, c])
    }
}

/// Surface material of an object. Only the color matters to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Material {
    pub color: Color,
}

impl Material {
    pub const fn new(color: Color) -> Self {
        Material { color }
    }
}

/// Geometry source for the mesh and the BSP context.
pub trait SceneObject {
    /// Identifier copied into every triangle produced from this object.
    fn id(&self) -> i32;
    fn positions(&self) -> &[Point3<Real>];
    fn normals(&self) -> &[Vector3<Real>];
    fn faces(&self) -> &[Face];
}

/// Plain in-memory [`SceneObject`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub id: i32,
    pub positions: Vec<Point3<Real>>,
    pub normals: Vec<Vector3<Real>>,
    pub faces: Vec<Face>,
}

impl Object {
    pub fn new(id: i32) -> Self {
        Object {
            id,
            ..Default::default()
        }
    }

    /// Object made of the given positions and faces, flat shaded.
    pub fn from_faces(id: i32, positions: Vec<Point3<Real>>, faces: Vec<Face>) -> Self {
        Object {
            id,
            positions,
            normals: Vec::new(),
            faces,
        }
    }

    pub fn push_position(&mut self, p: Point3<Real>) -> usize {
        self.positions.push(p);
        self.positions.len() - 1
    }

    pub fn push_face(&mut self, face: Face) {
        self.faces.push(face);
    }
}

impl SceneObject for Object {
    fn id(&self) -> i32 {
        self.id
    }

    fn positions(&self) -> &[Point3<Real>] {
        &self.positions
    }

    fn normals(&self) -> &[Vector3<Real>] {
        &self.normals
    }

    fn faces(&self) -> &[Face] {
        &self.faces
    }
}

/// A world-space triangle produced from an object face.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTriangle {
    pub points: [Point3<Real>; 3],
    pub normals: [Vector3<Real>; 3],
    /// Index of the face within its object.
    pub face: usize,
}

/// A transform together with the matrix to apply to normals.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub matrix: Matrix4<Real>,
    pub normal_matrix: Matrix3<Real>,
}

impl Transform {
    /// Validate `matrix` and derive its normal matrix (inverse transpose of
    /// the linear part).
    pub fn new(matrix: &Matrix4<Real>) -> Result<Self> {
        if matrix.iter().any(|c| !c.is_finite()) {
            return Err(Error::BadArguments("transform has non-finite coefficients".into()));
        }
        let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .ok_or_else(|| Error::BadArguments("transform is not invertible".into()))?
            .transpose();
        Ok(Transform {
            matrix: *matrix,
            normal_matrix,
        })
    }

    pub fn identity() -> Self {
        Transform {
            matrix: Matrix4::identity(),
            normal_matrix: Matrix3::identity(),
        }
    }

    #[inline]
    pub fn point(&self, p: &Point3<Real>) -> Point3<Real> {
        self.matrix.transform_point(p)
    }

    #[inline]
    pub fn normal(&self, n: &Vector3<Real>) -> Vector3<Real> {
        let n = self.normal_matrix * n;
        n.try_normalize(Real::EPSILON).unwrap_or(n)
    }
}

/// Validate `object` and expand its faces into world-space triangles.
///
/// Faces with more than three corners are fan-triangulated around their
/// first corner. Corners without normals receive the transformed face normal.
///
/// # Errors
/// * [`Error::BadArguments`] if `transform` is singular or not finite.
/// * [`Error::BadState`] if a face has fewer than three corners, an index is
///   out of range, the normal list does not match the corner list, or a
///   position is not finite.
pub fn triangulate<O: SceneObject + ?Sized>(object: &O, transform: &Matrix4<Real>) -> Result<Vec<SourceTriangle>> {
    let transform = Transform::new(transform)?;
    let positions = object.positions();
    let object_normals = object.normals();

    if let Some(i) = positions.iter().position(|p| p.coords.iter().any(|c| !c.is_finite())) {
        return Err(Error::BadState(format!(
            "object {}: position {i} is not finite",
            object.id()
        )));
    }

    let mut count = 0;
    for (f, face) in object.faces().iter().enumerate() {
        if face.vertices.len() < 3 {
            return Err(Error::BadState(format!(
                "object {}: face {f} references {} vertices",
                object.id(),
                face.vertices.len()
            )));
        }
        if let Some(&i) = face.vertices.iter().find(|&&i| i >= positions.len()) {
            return Err(Error::BadState(format!(
                "object {}: face {f} references vertex {i} of {}",
                object.id(),
                positions.len()
            )));
        }
        if !face.normals.is_empty() {
            if face.normals.len() != face.vertices.len() {
                return Err(Error::BadState(format!(
                    "object {}: face {f} has {} normals for {} vertices",
                    object.id(),
                    face.normals.len(),
                    face.vertices.len()
                )));
            }
            if let Some(&i) = face.normals.iter().find(|&&i| i >= object_normals.len()) {
                return Err(Error::BadState(format!(
                    "object {}: face {f} references normal {i} of {}",
                    object.id(),
                    object_normals.len()
                )));
            }
        }
        count += face.vertices.len() - 2;
    }

    let mut triangles = Vec::new();
    triangles
        .try_reserve(count)
        .map_err(|_| Error::OutOfMemory { requested: count })?;

    for (f, face) in object.faces().iter().enumerate() {
        let corners: Vec<Point3<Real>> = face.vertices.iter().map(|&i| transform.point(&positions[i])).collect();
        for k in 1..corners.len() - 1 {
            let idx = [0, k, k + 1];
            let points = idx.map(|i| corners[i]);
            let normals = if face.normals.is_empty() {
                [triangle::face_normal(&points); 3]
            } else {
                idx.map(|i| transform.normal(&object_normals[face.normals[i]]))
            };
            triangles.push(SourceTriangle {
                points,
                normals,
                face: f,
            });
        }
    }
    Ok(triangles)
}
