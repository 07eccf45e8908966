//! The triangle soup a navmesh is baked from.

use glam::{UVec3, Vec3A};
use thiserror::Error;

use crate::{
    math::{Aabb3d, TriangleIndices as _},
    span::AreaType,
};

/// A mesh used as input for [`Heightfield`](crate::Heightfield) rasterization.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TriMesh {
    /// The vertices of the mesh.
    pub vertices: Vec<Vec3A>,

    /// The triangles of the mesh as indices into [`TriMesh::vertices`].
    /// A triangle `[a, b, c]` faces upwards when `(b - a).cross(c - a)` points up.
    pub indices: Vec<UVec3>,

    /// The area types of the trimesh. Each index corresponds 1:1 to the [`TriMesh::indices`].
    pub area_types: Vec<AreaType>,
}

impl TriMesh {
    /// Extends the trimesh with the vertices and indices of another trimesh.
    /// The indices of `other` will be offset by the number of vertices in `self`.
    pub fn extend(&mut self, other: TriMesh) -> Result<(), TriMeshError> {
        let vertex_count = self.vertices.len() + other.vertices.len();
        let next_vertex_index = u32::try_from(self.vertices.len())
            .ok()
            .filter(|_| u32::try_from(vertex_count).is_ok())
            .ok_or(TriMeshError::TooManyVertices(vertex_count))?;
        self.vertices.extend(other.vertices);
        self.indices
            .extend(other.indices.iter().map(|i| *i + next_vertex_index));
        self.area_types.extend(other.area_types);
        Ok(())
    }

    /// Computes the AABB of the trimesh.
    /// Returns `None` if the trimesh is empty.
    pub fn compute_aabb(&self) -> Option<Aabb3d> {
        Aabb3d::from_verts(&self.vertices)
    }

    /// Marks the triangles as walkable or not based on the threshold angle.
    ///
    /// Triangles whose normal is closer to the up axis than the threshold become
    /// [`AreaType::DEFAULT_WALKABLE`]. All other triangles keep their area type.
    /// Triangles with out of bounds indices are left untouched.
    ///
    /// # Arguments
    ///
    /// * `threshold_rad` - The threshold angle in radians.
    ///
    pub fn mark_walkable_triangles(&mut self, threshold_rad: f32) {
        let threshold_cos = threshold_rad.cos();
        let vertex_count = self.vertices.len() as u32;
        for (indices, area) in self.indices.iter().zip(&mut self.area_types) {
            if indices.max_element() >= vertex_count {
                continue;
            }
            let normal = indices.normal(&self.vertices);
            if normal.y > threshold_cos {
                *area = AreaType::DEFAULT_WALKABLE;
            }
        }
    }
}

/// Errors that can occur when combining [`TriMesh`]es.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriMeshError {
    /// The combined mesh cannot be indexed with `u32`.
    #[error("A trimesh with {0} vertices cannot be indexed with u32")]
    TooManyVertices(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(height: f32) -> TriMesh {
        TriMesh {
            vertices: vec![
                Vec3A::new(0.0, 0.0, 0.0),
                Vec3A::new(0.0, 0.0, 1.0),
                Vec3A::new(1.0, height, 0.0),
            ],
            indices: vec![UVec3::new(0, 1, 2)],
            area_types: vec![AreaType::NOT_WALKABLE],
        }
    }

    #[test]
    fn gentle_slopes_are_walkable() {
        let mut flat = ramp(0.0);
        flat.mark_walkable_triangles(45.0_f32.to_radians());
        assert_eq!(flat.area_types, [AreaType::DEFAULT_WALKABLE]);

        let mut steep = ramp(2.0);
        steep.mark_walkable_triangles(45.0_f32.to_radians());
        assert_eq!(steep.area_types, [AreaType::NOT_WALKABLE]);
    }

    #[test]
    fn downward_faces_are_not_walkable() {
        let mut mesh = ramp(0.0);
        mesh.indices = vec![UVec3::new(0, 2, 1)];
        mesh.mark_walkable_triangles(45.0_f32.to_radians());
        assert_eq!(mesh.area_types, [AreaType::NOT_WALKABLE]);
    }

    #[test]
    fn extending_offsets_indices() {
        let mut mesh = ramp(0.0);
        mesh.extend(ramp(1.0)).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices[1], UVec3::new(3, 4, 5));
        assert_eq!(mesh.area_types.len(), 2);

        let aabb = mesh.compute_aabb().unwrap();
        assert_eq!(aabb.min, Vec3A::ZERO);
        assert_eq!(aabb.max, Vec3A::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn empty_mesh_has_no_aabb() {
        assert_eq!(TriMesh::default().compute_aabb(), None);
    }
}
