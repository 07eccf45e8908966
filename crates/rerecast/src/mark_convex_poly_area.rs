use glam::{IVec3, Vec2};

use crate::{Aabb2d, AreaType, CompactHeightfield};

impl CompactHeightfield {
    /// Sets the [`AreaType`] of the walkable spans within the given convex volume.
    pub fn mark_convex_poly_area(&mut self, volume: &ConvexVolume) {
        // Compute the bounding box of the polygon
        let Some(aabb) = Aabb2d::from_verts(&volume.vertices) else {
            // The volume is empty
            return;
        };
        let aabb = aabb.extend_y(volume.min_y, volume.max_y);

        // Compute the grid footprint of the polygon
        let inverse_cell = glam::Vec3A::new(
            1.0 / self.cell_size,
            1.0 / self.cell_height,
            1.0 / self.cell_size,
        );
        let min = ((aabb.min - self.aabb.min) * inverse_cell).as_ivec3();
        let max = ((aabb.max - self.aabb.min) * inverse_cell).as_ivec3();

        // Early-out if the polygon lies entirely outside the grid.
        if max.x < 0 || min.x >= self.width as i32 || max.z < 0 || min.z >= self.height as i32 {
            return;
        }

        // Clamp the polygon footprint to the grid
        let min = IVec3::new(min.x.max(0), min.y, min.z.max(0));
        let max = IVec3::new(
            max.x.min(self.width as i32 - 1),
            max.y,
            max.z.min(self.height as i32 - 1),
        );

        for z in min.z..=max.z {
            for x in min.x..=max.x {
                // The point is tested once per cell, not per span.
                let point = Vec2::new(
                    self.aabb.min.x + (x as f32 + 0.5) * self.cell_size,
                    self.aabb.min.z + (z as f32 + 0.5) * self.cell_size,
                );
                if !point_in_poly(point, &volume.vertices) {
                    continue;
                }

                let cell = *self.cell_at(x as u16, z as u16);
                for i in cell.index_range() {
                    // Skip if span is removed
                    if !self.areas[i].is_walkable() {
                        continue;
                    }
                    // Skip if y extents don't overlap
                    let span_y = self.spans[i].y as i32;
                    if span_y < min.y || span_y > max.y {
                        continue;
                    }
                    self.areas[i] = volume.area;
                }
            }
        }
    }
}

/// Even-odd test of `point` against the polygon on the xz-plane.
fn point_in_poly(point: Vec2, vertices: &[Vec2]) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for (i, vi) in vertices.iter().enumerate() {
        let vj = vertices[j];
        if ((vi.y > point.y) != (vj.y > point.y))
            && (point.x < (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A convex volume that marks an area within a [`CompactHeightfield`] as belonging to a specific [`AreaType`]
/// through [`CompactHeightfield::mark_convex_poly_area`].
#[derive(Debug, Default, PartialEq, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvexVolume {
    /// The vertices of the convex volume. In 3D, these represent the X and Z coordinates of the vertices.
    pub vertices: Vec<Vec2>,
    /// The lower Y coordinate of the convex volume.
    pub min_y: f32,
    /// The upper Y coordinate of the convex volume.
    pub max_y: f32,
    /// The area type of the convex volume.
    pub area: AreaType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::flat_compact_heightfield;

    fn square(min: f32, max: f32, area: AreaType) -> ConvexVolume {
        ConvexVolume {
            vertices: vec![
                Vec2::new(min, min),
                Vec2::new(max, min),
                Vec2::new(max, max),
                Vec2::new(min, max),
            ],
            min_y: 0.0,
            max_y: 5.0,
            area,
        }
    }

    #[test]
    fn point_in_square() {
        let volume = square(0.0, 2.0, AreaType(1));
        assert!(point_in_poly(Vec2::new(1.0, 1.0), &volume.vertices));
        assert!(!point_in_poly(Vec2::new(3.0, 1.0), &volume.vertices));
    }

    #[test]
    fn marks_spans_inside_volume() {
        let mut chf = flat_compact_heightfield(6);
        chf.mark_convex_poly_area(&square(1.0, 3.0, AreaType(7)));
        for z in 0..6 {
            for x in 0..6 {
                let i = chf.cell_at(x, z).index() as usize;
                let inside = (1..3).contains(&x) && (1..3).contains(&z);
                let expected = if inside {
                    AreaType(7)
                } else {
                    AreaType::DEFAULT_WALKABLE
                };
                assert_eq!(chf.areas[i], expected, "cell {x},{z}");
            }
        }
    }

    #[test]
    fn ignores_volumes_above_the_floor() {
        let mut chf = flat_compact_heightfield(4);
        let mut volume = square(0.0, 4.0, AreaType(7));
        volume.min_y = 3.0;
        volume.max_y = 6.0;
        chf.mark_convex_poly_area(&volume);
        assert!(chf.areas.iter().all(|a| *a == AreaType::DEFAULT_WALKABLE));
    }

    #[test]
    fn empty_volume_is_a_no_op() {
        let mut chf = flat_compact_heightfield(4);
        let before = chf.clone();
        chf.mark_convex_poly_area(&ConvexVolume::default());
        assert_eq!(chf, before);
    }
}
