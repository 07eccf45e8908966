use crate::{CompactHeightfield, span::AreaType};

impl CompactHeightfield {
    /// Erodes the walkable area within the heightfield by the specified radius.
    ///
    /// Basically, any spans that are closer to a boundary or obstruction than the specified radius
    /// are marked as un-walkable.
    ///
    /// This method is usually called immediately after the heightfield has been built.
    ///
    /// # Arguments
    ///
    /// - `walkable_radius` - The radius of erosion. [Limits: 0 < value < 255] [Units: vx]
    pub fn erode_walkable_area(&mut self, walkable_radius: u16) {
        let mut distance_to_boundary = vec![u8::MAX as u16; self.spans.len()];

        // Mark boundary cells.
        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.cell_at(x, z);
                for span_index in cell.index_range() {
                    if !self.areas[span_index].is_walkable() {
                        distance_to_boundary[span_index] = 0;
                        continue;
                    }
                    // Check that there is a non-null adjacent span in each of the 4 cardinal directions.
                    let mut neighbor_count = 0;
                    for direction in 0..4 {
                        let Some(neighbor_index) =
                            self.neighbor_index(x as i32, z as i32, span_index, direction)
                        else {
                            break;
                        };
                        if !self.areas[neighbor_index].is_walkable() {
                            break;
                        }
                        neighbor_count += 1;
                    }

                    // At least one missing neighbour, so this is a boundary cell.
                    if neighbor_count != 4 {
                        distance_to_boundary[span_index] = 0;
                    }
                }
            }
        }

        self.propagate_distances(&mut distance_to_boundary);

        let min_boundary_distance = walkable_radius.saturating_mul(2);
        for (area, distance) in self.areas.iter_mut().zip(&distance_to_boundary) {
            if *distance < min_boundary_distance {
                *area = AreaType::NOT_WALKABLE;
            }
        }
    }

    /// Relaxes `distances` in two raster passes so that every span holds its chamfer distance to the
    /// nearest span with a distance of 0. Cardinal steps cost 2, diagonal steps cost 3.
    pub(crate) fn propagate_distances(&self, distances: &mut [u16]) {
        // Pass 1
        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.cell_at(x, z);
                for i in cell.index_range() {
                    let (x, z) = (x as i32, z as i32);
                    // (-1,0)
                    if let Some(con) = self.spans[i].con(0) {
                        let (a_x, a_z, a_i) = self.con_indices(x, z, 0, con);
                        distances[i] = distances[i].min(distances[a_i].saturating_add(2));
                        // (-1,-1)
                        if let Some(b_i) = self.neighbor_index(a_x, a_z, a_i, 3) {
                            distances[i] = distances[i].min(distances[b_i].saturating_add(3));
                        }
                    }
                    // (0,-1)
                    if let Some(con) = self.spans[i].con(3) {
                        let (a_x, a_z, a_i) = self.con_indices(x, z, 3, con);
                        distances[i] = distances[i].min(distances[a_i].saturating_add(2));
                        // (1,-1)
                        if let Some(b_i) = self.neighbor_index(a_x, a_z, a_i, 2) {
                            distances[i] = distances[i].min(distances[b_i].saturating_add(3));
                        }
                    }
                }
            }
        }

        // Pass 2
        for z in (0..self.height).rev() {
            for x in (0..self.width).rev() {
                let cell = *self.cell_at(x, z);
                for i in cell.index_range() {
                    let (x, z) = (x as i32, z as i32);
                    // (1,0)
                    if let Some(con) = self.spans[i].con(2) {
                        let (a_x, a_z, a_i) = self.con_indices(x, z, 2, con);
                        distances[i] = distances[i].min(distances[a_i].saturating_add(2));
                        // (1,1)
                        if let Some(b_i) = self.neighbor_index(a_x, a_z, a_i, 1) {
                            distances[i] = distances[i].min(distances[b_i].saturating_add(3));
                        }
                    }
                    // (0,1)
                    if let Some(con) = self.spans[i].con(1) {
                        let (a_x, a_z, a_i) = self.con_indices(x, z, 1, con);
                        distances[i] = distances[i].min(distances[a_i].saturating_add(2));
                        // (-1,1)
                        if let Some(b_i) = self.neighbor_index(a_x, a_z, a_i, 0) {
                            distances[i] = distances[i].min(distances[b_i].saturating_add(3));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{CompactHeightfield, test_util::flat_compact_heightfield};

    fn walkable_grid(chf: &CompactHeightfield) -> Vec<Vec<bool>> {
        (0..chf.height)
            .map(|z| {
                (0..chf.width)
                    .map(|x| {
                        let cell = chf.cell_at(x, z);
                        cell.index_range().any(|i| chf.areas[i].is_walkable())
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn zero_radius_keeps_everything() {
        let mut chf = flat_compact_heightfield(5);
        chf.erode_walkable_area(0);
        assert!(chf.areas.iter().all(|area| area.is_walkable()));
    }

    #[test]
    fn erodes_ring_per_radius() {
        let mut chf = flat_compact_heightfield(7);
        chf.erode_walkable_area(1);
        let grid = walkable_grid(&chf);
        for (z, row) in grid.iter().enumerate() {
            for (x, walkable) in row.iter().enumerate() {
                let inside = (1..6).contains(&x) && (1..6).contains(&z);
                assert_eq!(*walkable, inside, "cell {x},{z}");
            }
        }

        let mut chf = flat_compact_heightfield(7);
        chf.erode_walkable_area(2);
        let grid = walkable_grid(&chf);
        for (z, row) in grid.iter().enumerate() {
            for (x, walkable) in row.iter().enumerate() {
                let inside = (2..5).contains(&x) && (2..5).contains(&z);
                assert_eq!(*walkable, inside, "cell {x},{z}");
            }
        }
    }

    #[test]
    fn distances_follow_chamfer_metric() {
        let chf = flat_compact_heightfield(5);
        let mut distances = vec![u16::MAX; chf.spans.len()];
        // Seed only the corner span.
        distances[0] = 0;
        chf.propagate_distances(&mut distances);
        let at = |x: u16, z: u16| distances[chf.cell_at(x, z).index() as usize];
        assert_eq!(at(1, 0), 2);
        assert_eq!(at(1, 1), 3);
        assert_eq!(at(2, 1), 5);
        assert_eq!(at(4, 4), 12);
    }
}
