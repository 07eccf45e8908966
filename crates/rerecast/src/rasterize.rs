//! Voxelization of triangles into a [`Heightfield`].

use glam::Vec3A;
use thiserror::Error;

use crate::{
    heightfield::{Heightfield, SpanInsertion, SpanInsertionError},
    math::TriangleVertices as _,
    span::{AreaType, Span, SpanBuilder},
    trimesh::TriMesh,
};

impl Heightfield {
    /// Rasterizes all triangles of a [`TriMesh`] into the heightfield.
    ///
    /// # Arguments
    ///
    /// - `trimesh` - The [`TriMesh`] to rasterize. Each triangle uses its entry of [`TriMesh::area_types`].
    /// - `flag_merge_threshold` - The distance where the walkable flag is favored over the non-walkable flag. [Limit: >= 0] [Units: vx]
    ///
    /// # Errors
    ///
    /// Returns an error if the trimesh is malformed, i.e. its area types do not match its triangles
    /// or a triangle references a vertex that does not exist.
    pub fn rasterize_triangles(
        &mut self,
        trimesh: &TriMesh,
        flag_merge_threshold: u16,
    ) -> Result<(), RasterizationError> {
        if trimesh.area_types.len() != trimesh.indices.len() {
            return Err(RasterizationError::AreaTypeCountMismatch {
                triangles: trimesh.indices.len(),
                area_types: trimesh.area_types.len(),
            });
        }
        for (i, triangle) in trimesh.indices.iter().enumerate() {
            let mut vertices = [Vec3A::ZERO; 3];
            for (vertex, index) in vertices.iter_mut().zip(triangle.to_array()) {
                *vertex = *trimesh.vertices.get(index as usize).ok_or(
                    RasterizationError::VertexIndexOutOfBounds {
                        triangle: i,
                        index,
                        vertex_count: trimesh.vertices.len(),
                    },
                )?;
            }
            self.rasterize_triangle(vertices, trimesh.area_types[i], flag_merge_threshold)?;
        }
        Ok(())
    }

    /// Rasterizes a single triangle into the heightfield.
    /// Triangles outside the heightfield's bounds and degenerate triangles are skipped.
    pub fn rasterize_triangle(
        &mut self,
        triangle: [Vec3A; 3],
        area_type: AreaType,
        flag_merge_threshold: u16,
    ) -> Result<(), RasterizationError> {
        let [a, b, c] = triangle;
        if (b - a).cross(c - a).length_squared() == 0.0 {
            return Ok(());
        }
        // If the triangle does not touch the bounding box of the heightfield, skip it.
        let triangle_aabb = triangle.aabb();
        if !self.aabb.intersects(&triangle_aabb) {
            return Ok(());
        }

        let inverse_cell_size = 1.0 / self.cell_size;
        let inverse_cell_height = 1.0 / self.cell_height;
        let by = self.aabb.max.y - self.aabb.min.y;
        let width = self.width as i32;
        let height = self.height as i32;

        // Calculate the footprint of the triangle on the grid's z-axis
        let z0 = ((triangle_aabb.min.z - self.aabb.min.z) * inverse_cell_size) as i32;
        let z1 = ((triangle_aabb.max.z - self.aabb.min.z) * inverse_cell_size) as i32;
        // Use -1 rather than 0 to cut the polygon properly at the start of the tile.
        let z0 = z0.clamp(-1, height - 1);
        let z1 = z1.clamp(0, height - 1);

        let mut remainder = ClipPolygon::from_slice(&triangle);
        for z in z0..=z1 {
            // Clip polygon to row. Store the remaining polygon as well.
            let cell_z = self.aabb.min.z + z as f32 * self.cell_size;
            let (row, rest) = remainder.divide(cell_z + self.cell_size, Axis::Z);
            remainder = rest;
            if row.len < 3 || z < 0 {
                continue;
            }

            // Find the horizontal bounds in the row.
            let (min_x, max_x) = row
                .vertices()
                .iter()
                .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.x), max.max(v.x)));
            let x0 = ((min_x - self.aabb.min.x) * inverse_cell_size) as i32;
            let x1 = ((max_x - self.aabb.min.x) * inverse_cell_size) as i32;
            if x1 < 0 || x0 >= width {
                continue;
            }
            let x0 = x0.clamp(-1, width - 1);
            let x1 = x1.clamp(0, width - 1);

            let mut row_remainder = row;
            for x in x0..=x1 {
                // Clip polygon to column. Store the remaining polygon as well.
                let cell_x = self.aabb.min.x + x as f32 * self.cell_size;
                let (cell, rest) = row_remainder.divide(cell_x + self.cell_size, Axis::X);
                row_remainder = rest;
                if cell.len < 3 || x < 0 {
                    continue;
                }

                // Calculate min and max of the span.
                let (span_min, span_max) = cell
                    .vertices()
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.y), max.max(v.y)));
                let span_min = span_min - self.aabb.min.y;
                let span_max = span_max - self.aabb.min.y;

                // Skip the span if it's completely outside the heightfield bounding box
                if span_max < 0.0 || span_min > by {
                    continue;
                }
                // Clamp the span to the heightfield bounding box.
                let span_min = span_min.max(0.0);
                let span_max = span_max.min(by);

                // Snap the span to the heightfield height grid.
                let min_index = ((span_min * inverse_cell_height).floor() as i32)
                    .clamp(0, Span::MAX_HEIGHT as i32) as u16;
                let max_index = ((span_max * inverse_cell_height).ceil() as i32)
                    .clamp(min_index as i32 + 1, Span::MAX_HEIGHT as i32)
                    as u16;

                self.add_span(SpanInsertion {
                    x: x as u16,
                    z: z as u16,
                    flag_merge_threshold,
                    span: SpanBuilder {
                        min: min_index,
                        max: max_index,
                        area: area_type,
                    }
                    .build(),
                })?;
            }
        }

        Ok(())
    }
}

/// Errors that can occur when rasterizing triangles into a [`Heightfield`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterizationError {
    /// Every triangle needs exactly one area type.
    #[error("Got {area_types} area types for {triangles} triangles")]
    AreaTypeCountMismatch {
        /// The number of triangles in the mesh
        triangles: usize,
        /// The number of area types in the mesh
        area_types: usize,
    },
    /// A triangle references a vertex that does not exist.
    #[error("Triangle {triangle} references vertex {index}, but the mesh only has {vertex_count} vertices")]
    VertexIndexOutOfBounds {
        /// The index of the offending triangle
        triangle: usize,
        /// The offending vertex index
        index: u32,
        /// The number of vertices in the mesh
        vertex_count: usize,
    },
    /// A span landed outside of the heightfield grid.
    #[error(transparent)]
    SpanInsertion(#[from] SpanInsertionError),
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Z,
}

impl Axis {
    #[inline]
    fn of(self, v: Vec3A) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Z => v.z,
        }
    }
}

/// A convex polygon produced by clipping a triangle against axis-aligned slabs.
/// A triangle clipped by a row and then a column never exceeds 7 vertices.
#[derive(Debug, Clone, Copy)]
struct ClipPolygon {
    vertices: [Vec3A; Self::MAX_VERTICES],
    len: usize,
}

impl ClipPolygon {
    const MAX_VERTICES: usize = 7;

    fn empty() -> Self {
        Self {
            vertices: [Vec3A::ZERO; Self::MAX_VERTICES],
            len: 0,
        }
    }

    fn from_slice(vertices: &[Vec3A]) -> Self {
        let mut polygon = Self::empty();
        for vertex in vertices {
            polygon.push(*vertex);
        }
        polygon
    }

    #[inline]
    fn push(&mut self, vertex: Vec3A) {
        if self.len < Self::MAX_VERTICES {
            self.vertices[self.len] = vertex;
            self.len += 1;
        }
    }

    #[inline]
    fn vertices(&self) -> &[Vec3A] {
        &self.vertices[..self.len]
    }

    /// Divides the polygon into the part below `axis_offset` and the part above it.
    fn divide(&self, axis_offset: f32, axis: Axis) -> (Self, Self) {
        let mut below = Self::empty();
        let mut above = Self::empty();
        let vertices = self.vertices();
        if vertices.is_empty() {
            return (below, above);
        }
        let delta = |v: Vec3A| axis_offset - axis.of(v);

        let mut b = vertices.len() - 1;
        for a in 0..vertices.len() {
            let delta_a = delta(vertices[a]);
            let delta_b = delta(vertices[b]);
            let same_side = (delta_a >= 0.0) == (delta_b >= 0.0);
            if !same_side {
                let s = delta_b / (delta_b - delta_a);
                let intersection = vertices[b] + (vertices[a] - vertices[b]) * s;
                below.push(intersection);
                above.push(intersection);
                // Points on the dividing line were already added above.
                if delta_a > 0.0 {
                    below.push(vertices[a]);
                } else if delta_a < 0.0 {
                    above.push(vertices[a]);
                }
            } else {
                // Points on the dividing line go to both sides.
                if delta_a >= 0.0 {
                    below.push(vertices[a]);
                    if delta_a != 0.0 {
                        b = a;
                        continue;
                    }
                }
                above.push(vertices[a]);
            }
            b = a;
        }
        (below, above)
    }
}
