//! Filters that remove unwanted spans from a [`Heightfield`] before it is compacted.

use crate::{
    heightfield::Heightfield,
    math::{dir_offset_x, dir_offset_z},
    span::AreaType,
};

/// The ceiling of the topmost span of a column.
const MAX_HEIGHT: i32 = u16::MAX as i32;

impl Heightfield {
    /// Marks non-walkable spans as walkable if their maximum is within `walkable_climb` of the span below them.
    ///
    /// This removes small obstacles and rasterization artifacts that the agent would be able to walk over
    /// such as curbs. It also allows agents to move up terraced structures like stairs.
    ///
    /// Obstacle spans are marked walkable if: `obstacle_span.max - walkable_span.max < walkable_climb`
    ///
    /// # Arguments
    ///
    /// - `walkable_climb` - Maximum ledge height that is considered to still be traversable. [Limit: >=0] [Units: vx]
    pub fn filter_low_hanging_walkable_obstacles(&mut self, walkable_climb: u16) {
        for column in &mut self.columns {
            let mut previous_max = 0_u16;
            let mut previous_was_walkable = false;
            let mut previous_area = AreaType::NOT_WALKABLE;

            for span in &mut column.spans {
                let walkable = span.area().is_walkable();

                // If current span is not walkable, but there is walkable span just below it and the height difference
                // is small enough for the agent to walk over, mark the current span as walkable too.
                if !walkable
                    && previous_was_walkable
                    && (span.max() as i32 - previous_max as i32) <= walkable_climb as i32
                {
                    span.set_area(previous_area);
                }

                // Copy the original walkable value regardless of whether we changed it.
                // This prevents multiple consecutive non-walkable spans from being erroneously marked as walkable.
                previous_was_walkable = walkable;
                previous_area = span.area();
                previous_max = span.max();
            }
        }
    }

    /// Marks spans that are ledges as not-walkable.
    ///
    /// A ledge is a span with one or more neighbors whose maximum is further away than `walkable_climb`
    /// from the current span's maximum.
    /// This method removes the impact of the overestimation of conservative voxelization
    /// so the resulting mesh will not have regions hanging in the air over ledges.
    ///
    /// A span is a ledge if: `abs(current_span.max - neighbor_span.max) > walkable_climb`
    ///
    /// # Arguments
    ///
    /// - `walkable_height` - Minimum floor to 'ceiling' height that will still allow the floor area to be considered walkable. [Limit: >= 3] [Units: vx]
    /// - `walkable_climb` - Maximum ledge height that is considered to still be traversable. [Limit: >=0] [Units: vx]
    pub fn filter_ledge_spans(&mut self, walkable_height: u16, walkable_climb: u16) {
        let walkable_height = walkable_height as i32;
        let walkable_climb = walkable_climb as i32;
        let mut ledges = Vec::new();

        for z in 0..self.height {
            for x in 0..self.width {
                let spans = &self.columns[self.column_index(x, z)].spans;
                for (span_index, span) in spans.iter().enumerate() {
                    // Skip non-walkable spans.
                    if !span.area().is_walkable() {
                        continue;
                    }

                    let floor = span.max() as i32;
                    let ceiling = spans
                        .get(span_index + 1)
                        .map_or(MAX_HEIGHT, |next| next.min() as i32);

                    // The difference between this walkable area and the lowest neighbor walkable area.
                    // This is the difference between the current span and all neighbor spans that have
                    // enough space for an agent to move between, but not accounting at all for surface slope.
                    let mut lowest_neighbor_floor_difference = MAX_HEIGHT;

                    // Min and max height of accessible neighbours.
                    let mut lowest_traversable_neighbor_floor = floor;
                    let mut highest_traversable_neighbor_floor = floor;

                    for direction in 0..4 {
                        let neighbor_x = x as i32 + dir_offset_x(direction) as i32;
                        let neighbor_z = z as i32 + dir_offset_z(direction) as i32;
                        // Skip neighbors which are out of bounds.
                        if !self.contains(neighbor_x, neighbor_z) {
                            lowest_neighbor_floor_difference = -walkable_climb - 1;
                            break;
                        }
                        let neighbor_spans = &self.columns
                            [self.column_index(neighbor_x as u16, neighbor_z as u16)]
                        .spans;

                        // The most we can step down to the neighbor is the walkable climb distance.
                        // Start with the area under the neighbor span.
                        let neighbor_ceiling = neighbor_spans
                            .first()
                            .map_or(MAX_HEIGHT, |neighbor| neighbor.min() as i32);

                        // Skip neighbour if the gap between the spans is too small.
                        if ceiling.min(neighbor_ceiling) - floor >= walkable_height {
                            lowest_neighbor_floor_difference = -walkable_climb - 1;
                            break;
                        }

                        // For each span in the neighboring column...
                        for (neighbor_index, neighbor_span) in neighbor_spans.iter().enumerate() {
                            let neighbor_floor = neighbor_span.max() as i32;
                            let neighbor_ceiling = neighbor_spans
                                .get(neighbor_index + 1)
                                .map_or(MAX_HEIGHT, |next| next.min() as i32);

                            // Only consider neighboring areas that have enough overlap to be potentially traversable.
                            if ceiling.min(neighbor_ceiling) - floor.max(neighbor_floor)
                                < walkable_height
                            {
                                // No space to traverse between them.
                                continue;
                            }

                            let neighbor_floor_difference = neighbor_floor - floor;
                            lowest_neighbor_floor_difference =
                                lowest_neighbor_floor_difference.min(neighbor_floor_difference);

                            // Find min/max accessible neighbor height.
                            // Only consider neighbors that are at most walkable_climb away.
                            if neighbor_floor_difference.abs() <= walkable_climb {
                                // There is space to move to the neighbor cell and the slope isn't too much.
                                lowest_traversable_neighbor_floor =
                                    lowest_traversable_neighbor_floor.min(neighbor_floor);
                                highest_traversable_neighbor_floor =
                                    highest_traversable_neighbor_floor.max(neighbor_floor);
                            } else if neighbor_floor_difference < -walkable_climb {
                                // We already know this will be considered a ledge span so we can early-out
                                break;
                            }
                        }
                    }

                    // The current span is close to a ledge if the magnitude of the drop to any neighbour span
                    // exceeds the walkable climb distance.
                    // If the difference between all neighbor floors is too large, this is a steep slope.
                    if lowest_neighbor_floor_difference < -walkable_climb
                        || highest_traversable_neighbor_floor - lowest_traversable_neighbor_floor
                            > walkable_climb
                    {
                        ledges.push((self.column_index(x, z), span_index));
                    }
                }
            }
        }

        for (column_index, span_index) in ledges {
            self.columns[column_index].spans[span_index].set_area(AreaType::NOT_WALKABLE);
        }
    }

    /// Marks walkable spans as not walkable if the clearance above the span is less than the specified `walkable_height`.
    ///
    /// For this filter, the clearance above the span is the distance from the span's
    /// maximum to the minimum of the next higher span in the same column.
    /// If there is no higher span in the column, the clearance is computed as the
    /// distance from the top of the span to the maximum heightfield height.
    ///
    /// # Arguments
    ///
    /// - `walkable_height` - Minimum floor to 'ceiling' height that will still allow the floor area to be considered walkable. [Limit: >= 3] [Units: vx]
    pub fn filter_walkable_low_height_spans(&mut self, walkable_height: u16) {
        // Remove walkable flag from spans which do not have enough
        // space above them for the agent to stand there.
        for column in &mut self.columns {
            let ceilings: Vec<i32> = column
                .spans
                .iter()
                .skip(1)
                .map(|span| span.min() as i32)
                .chain(std::iter::once(MAX_HEIGHT))
                .collect();
            for (span, ceiling) in column.spans.iter_mut().zip(ceilings) {
                let floor = span.max() as i32;
                if ceiling - floor < walkable_height as i32 {
                    span.set_area(AreaType::NOT_WALKABLE);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::*;
    use crate::{
        Aabb3d, HeightfieldBuilder,
        heightfield::SpanInsertion,
        span::{Span, SpanBuilder},
    };

    fn heightfield(size: f32) -> Heightfield {
        HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [size, 20.0, size]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap()
    }

    fn span(min: u16, max: u16, area: AreaType) -> Span {
        SpanBuilder { min, max, area }.build()
    }

    fn add(heightfield: &mut Heightfield, x: u16, z: u16, span: Span) {
        heightfield
            .add_span(SpanInsertion {
                x,
                z,
                flag_merge_threshold: 0,
                span,
            })
            .unwrap();
    }

    fn fill(heightfield: &mut Heightfield, max: u16) {
        for z in 0..heightfield.height {
            for x in 0..heightfield.width {
                add(heightfield, x, z, span(0, max, AreaType::DEFAULT_WALKABLE));
            }
        }
    }

    #[test]
    fn low_hanging_obstacle_becomes_walkable() {
        let mut heightfield = heightfield(1.0);
        add(&mut heightfield, 0, 0, span(0, 2, AreaType(3)));
        add(&mut heightfield, 0, 0, span(4, 5, AreaType::NOT_WALKABLE));
        add(&mut heightfield, 0, 0, span(7, 8, AreaType::NOT_WALKABLE));
        heightfield.filter_low_hanging_walkable_obstacles(3);

        let spans = &heightfield.column(0, 0).unwrap().spans;
        assert_eq!(spans[1].area(), AreaType(3));
        // The second obstacle sits on an obstacle, so it stays unwalkable.
        assert_eq!(spans[2].area(), AreaType::NOT_WALKABLE);
    }

    #[test]
    fn high_obstacle_stays_unwalkable() {
        let mut heightfield = heightfield(1.0);
        add(&mut heightfield, 0, 0, span(0, 2, AreaType(3)));
        add(&mut heightfield, 0, 0, span(4, 9, AreaType::NOT_WALKABLE));
        heightfield.filter_low_hanging_walkable_obstacles(3);
        let spans = &heightfield.column(0, 0).unwrap().spans;
        assert_eq!(spans[1].area(), AreaType::NOT_WALKABLE);
    }

    #[test]
    fn low_ceiling_is_unwalkable() {
        let mut heightfield = heightfield(1.0);
        add(&mut heightfield, 0, 0, span(0, 2, AreaType(3)));
        add(&mut heightfield, 0, 0, span(4, 5, AreaType(3)));
        heightfield.filter_walkable_low_height_spans(3);
        let spans = &heightfield.column(0, 0).unwrap().spans;
        assert_eq!(spans[0].area(), AreaType::NOT_WALKABLE);
        assert_eq!(spans[1].area(), AreaType(3));
    }

    #[test]
    fn border_spans_are_ledges() {
        let mut heightfield = heightfield(3.0);
        fill(&mut heightfield, 2);
        heightfield.filter_ledge_spans(3, 1);
        for z in 0..3 {
            for x in 0..3 {
                let walkable = heightfield.span_at(x, z).unwrap().area().is_walkable();
                assert_eq!(walkable, x == 1 && z == 1, "span at {x},{z}");
            }
        }
    }

    #[test]
    fn cliff_next_to_span_is_a_ledge() {
        let mut heightfield = heightfield(5.0);
        fill(&mut heightfield, 2);
        // Raise a plateau in the middle that is too high to climb.
        add(&mut heightfield, 2, 2, span(0, 8, AreaType::DEFAULT_WALKABLE));
        heightfield.filter_ledge_spans(3, 1);
        assert!(!heightfield.span_at(2, 2).unwrap().area().is_walkable());
        assert!(heightfield.span_at(1, 2).unwrap().area().is_walkable());
    }

    #[test]
    fn small_step_is_not_a_ledge() {
        let mut heightfield = heightfield(5.0);
        fill(&mut heightfield, 2);
        add(&mut heightfield, 2, 2, span(0, 3, AreaType::DEFAULT_WALKABLE));
        heightfield.filter_ledge_spans(3, 1);
        assert!(heightfield.span_at(2, 2).unwrap().area().is_walkable());
    }
}
