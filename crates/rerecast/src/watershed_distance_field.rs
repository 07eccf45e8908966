//! Watershed partitioning
//!   - the classic Recast partitioning
//!   - creates the nicest tessellation
//!   - usually slowest
//!   - partitions the heightfield into nice regions without holes or overlaps
//!   - the are some corner cases where this method creates produces holes and overlaps
//!      - holes may appear when a small obstacles is close to large open area (triangulation can handle this)
//!      - overlaps may occur if you have narrow spiral corridors (i.e stairs), this make triangulation to fail
//!   * generally the best choice if you precompute the navmesh, use this if you have large open areas

use crate::CompactHeightfield;

impl CompactHeightfield {
    /// Distances saturate at this value.
    pub const MAX_DISTANCE: u16 = u8::MAX as u16;

    /// Prepare for region partitioning, by calculating distance field along the walkable surface.
    /// Distances are measured in half cells and saturate at [`CompactHeightfield::MAX_DISTANCE`].
    pub fn build_distance_field(&mut self) {
        let distance_field = self.calculate_distance_field();
        self.max_distance = distance_field.iter().max().copied().unwrap_or_default();
        self.dist = self.box_blur(1, &distance_field);
    }

    fn calculate_distance_field(&self) -> Vec<u16> {
        // Init distance and points.
        let mut distance_field = vec![u16::MAX; self.spans.len()];

        // Mark boundary cells.
        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.cell_at(x, z);
                for i in cell.index_range() {
                    let area = self.areas[i];
                    let connection_count = (0..4)
                        .filter_map(|dir| self.neighbor_index(x as i32, z as i32, i, dir))
                        .filter(|&a_i| self.areas[a_i] == area)
                        .count();
                    if connection_count < 4 {
                        distance_field[i] = 0;
                    }
                }
            }
        }

        self.propagate_distances(&mut distance_field);
        for distance in &mut distance_field {
            *distance = (*distance).min(Self::MAX_DISTANCE);
        }
        distance_field
    }

    /// Smooths the distance field with a 3x3 box filter.
    /// Spans within `2 * threshold` of a boundary keep their distance.
    fn box_blur(&self, threshold: u16, distance_field: &[u16]) -> Vec<u16> {
        let threshold = threshold.saturating_mul(2);
        let mut result = vec![0; distance_field.len()];

        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.cell_at(x, z);
                for i in cell.index_range() {
                    let cd = distance_field[i];
                    if cd <= threshold {
                        result[i] = cd;
                        continue;
                    }

                    let mut d = cd as u32;
                    for dir in 0..4 {
                        let Some(con) = self.spans[i].con(dir) else {
                            d += cd as u32 * 2;
                            continue;
                        };
                        let (a_x, a_z, a_i) = self.con_indices(x as i32, z as i32, dir, con);
                        d += distance_field[a_i] as u32;
                        let dir2 = (dir + 1) & 0x3;
                        if let Some(b_i) = self.neighbor_index(a_x, a_z, a_i, dir2) {
                            d += distance_field[b_i] as u32;
                        } else {
                            d += cd as u32;
                        }
                    }
                    result[i] = ((d + 5) / 9) as u16;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::{AreaType, CompactHeightfield, test_util::flat_compact_heightfield};

    #[test]
    fn distance_grows_towards_the_center() {
        let mut chf = flat_compact_heightfield(9);
        chf.build_distance_field();
        assert_eq!(chf.dist.len(), chf.spans.len());
        let at = |x: u16, z: u16| chf.dist[chf.cell_at(x, z).index() as usize];

        assert_eq!(at(0, 0), 0);
        assert_eq!(at(0, 4), 0);
        assert!(at(1, 4) < at(2, 4));
        assert!(at(2, 4) < at(3, 4));
        assert!(at(3, 4) <= at(4, 4));
        // The field is symmetric.
        assert_eq!(at(2, 4), at(6, 4));
        assert_eq!(at(4, 2), at(4, 6));
        assert_eq!(chf.max_distance, 8);
    }

    #[test]
    fn area_changes_are_boundaries() {
        let mut chf = flat_compact_heightfield(9);
        let center = chf.cell_at(4, 4).index() as usize;
        chf.areas[center] = AreaType(3);
        chf.build_distance_field();
        assert_eq!(chf.dist[center], 0);
        let beside = chf.cell_at(3, 4).index() as usize;
        assert_eq!(chf.dist[beside], 0);
    }

    #[test]
    fn wide_open_areas_saturate() {
        let mut chf = flat_compact_heightfield(300);
        chf.build_distance_field();
        assert_eq!(chf.max_distance, CompactHeightfield::MAX_DISTANCE);
        assert!(chf.dist.iter().all(|&d| d <= CompactHeightfield::MAX_DISTANCE));
        let center = chf.cell_at(150, 150).index() as usize;
        assert_eq!(chf.dist[center], CompactHeightfield::MAX_DISTANCE);
        // Close to the edges the field is unaffected.
        let near_edge = chf.cell_at(3, 150).index() as usize;
        assert_eq!(chf.dist[near_edge], 6);
    }

    #[test]
    fn empty_field_has_no_distance() {
        let mut chf = crate::test_util::grid_compact_heightfield(3, 3, |_, _| false);
        chf.build_distance_field();
        assert!(chf.dist.is_empty());
        assert_eq!(chf.max_distance, 0);
    }
}
