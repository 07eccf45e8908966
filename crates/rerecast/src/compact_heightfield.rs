//! The dense, neighbor-connected representation of the walkable spans of a [`Heightfield`].

use thiserror::Error;

use crate::{
    Aabb3d,
    compact_cell::CompactCell,
    compact_span::CompactSpan,
    heightfield::Heightfield,
    math::{dir_offset_x, dir_offset_z},
    region::RegionId,
    span::AreaType,
};

/// A packed representation of a [`Heightfield`].
/// Only walkable spans are kept, and every span knows its walkable neighbors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactHeightfield {
    /// The width of the heightfield along the x-axis in cell units
    pub width: u16,
    /// The height of the heightfield along the z-axis in cell units
    pub height: u16,
    /// The walkable height used during the build of the field
    pub walkable_height: u16,
    /// The walkable climb used during the build of the field.
    pub walkable_climb: u16,
    /// The AABB border size used during the build of the field.
    pub border_size: u16,
    /// The maximum distance value of any span within the field.
    pub max_distance: u16,
    /// The maximum region id of any span within the field.
    pub max_region: RegionId,
    /// The AABB of the heightfield
    pub aabb: Aabb3d,
    /// The size of each cell on the xz-plane
    pub cell_size: f32,
    /// The size of each cell along the y-axis
    pub cell_height: f32,
    /// The cells in the heightfield [Size: `width * height`]
    pub cells: Vec<CompactCell>,
    /// All walkable spans in the heightfield
    pub spans: Vec<CompactSpan>,
    /// Vector containing border distance data. [Size: `spans.len()`] once
    /// [`CompactHeightfield::build_distance_field`] ran, empty before.
    pub dist: Vec<u16>,
    /// Vector containing area type data. [Size: `spans.len()`]
    pub areas: Vec<AreaType>,
}

impl Heightfield {
    /// Builds a compact heightfield out of this heightfield.
    /// See [`CompactHeightfield::from_heightfield`].
    pub fn into_compact(
        self,
        walkable_height: u16,
        walkable_climb: u16,
    ) -> Result<CompactHeightfield, CompactHeightfieldError> {
        CompactHeightfield::from_heightfield(self, walkable_height, walkable_climb)
    }
}

impl CompactHeightfield {
    /// The ceiling of the topmost span of a column.
    const MAX_HEIGHT: u16 = u16::MAX;
    /// Connections store the index of the neighbor span within its column in 6 bits.
    /// The highest value is reserved for "not connected".
    pub(crate) const MAX_LAYERS: u8 = CompactSpan::NOT_CONNECTED - 1;

    /// Builds a compact heightfield from a heightfield.
    ///
    /// # Arguments
    ///
    /// - `walkable_height` - Minimum floor to 'ceiling' height that will still allow the floor area to be considered walkable. [Limit: >= 3] [Units: vx]
    /// - `walkable_climb` - Maximum ledge height that is considered to still be traversable. [Limit: >=0] [Units: vx]
    ///
    /// # Errors
    ///
    /// Returns an error if the heightfield holds more walkable spans than a [`CompactCell`] can index.
    /// A column keeps at most its lowest 255 walkable spans, and neighbors beyond the 62nd layer
    /// of a column cannot be connected to. Both limits are reported with a warning.
    pub fn from_heightfield(
        heightfield: Heightfield,
        walkable_height: u16,
        walkable_climb: u16,
    ) -> Result<Self, CompactHeightfieldError> {
        let walkable_span_count = heightfield.walkable_span_count();

        let mut compact_heightfield = Self {
            width: heightfield.width,
            height: heightfield.height,
            walkable_height,
            walkable_climb,
            border_size: 0,
            aabb: heightfield.aabb,
            max_distance: 0,
            max_region: RegionId::NONE,
            cell_size: heightfield.cell_size,
            cell_height: heightfield.cell_height,
            cells: vec![
                CompactCell::default();
                heightfield.width as usize * heightfield.height as usize
            ],
            spans: Vec::with_capacity(walkable_span_count),
            dist: Vec::new(),
            areas: Vec::with_capacity(walkable_span_count),
        };
        compact_heightfield.aabb.max.y += walkable_height as f32 * compact_heightfield.cell_height;

        // Fill in cells and spans
        let mut clamped_columns = 0_usize;
        for z in 0..heightfield.height {
            for x in 0..heightfield.width {
                let column_index = heightfield.column_index(x, z);
                let spans = &heightfield.columns[column_index].spans;
                if spans.is_empty() {
                    // If there are no spans at this cell, just leave the data to index=0, count=0.
                    continue;
                }
                let walkable_count = spans.iter().filter(|s| s.area().is_walkable()).count();
                if walkable_count > u8::MAX as usize {
                    clamped_columns += 1;
                }
                let first_index = u32::try_from(compact_heightfield.spans.len())
                    .map_err(|_| CompactHeightfieldError::TooManySpans(walkable_span_count))?;

                let cell = &mut compact_heightfield.cells[column_index];
                cell.set_index(first_index);
                cell.set_count(0);

                let walkable_spans = spans
                    .iter()
                    .enumerate()
                    .filter(|(_, span)| span.area().is_walkable())
                    .take(u8::MAX as usize);
                for (span_index, span) in walkable_spans {
                    let bot = span.max();
                    let top = spans
                        .get(span_index + 1)
                        .map_or(Self::MAX_HEIGHT, |next| next.min());
                    let mut compact_span = CompactSpan::default();
                    compact_span.y = bot;
                    let height = top.saturating_sub(bot).min(u8::MAX.into()) as u8;
                    compact_span.set_height(height);
                    compact_heightfield.spans.push(compact_span);
                    compact_heightfield.areas.push(span.area());
                    cell.inc_count();
                }
            }
        }

        if clamped_columns > 0 {
            tracing::warn!(
                "{clamped_columns} columns hold more than {max} walkable spans. Only the lowest {max} of each are kept.",
                max = u8::MAX,
            );
        }

        // Find neighbour connections
        let mut max_layer_index = 0_usize;
        for z in 0..compact_heightfield.height {
            for x in 0..compact_heightfield.width {
                let cell = *compact_heightfield.cell_at(x, z);
                for i in cell.index_range() {
                    for dir in 0..4_u8 {
                        compact_heightfield.spans[i].set_con(dir, None);
                        let neighbor_x = x as i32 + dir_offset_x(dir) as i32;
                        let neighbor_z = z as i32 + dir_offset_z(dir) as i32;
                        // First check that the neighbour cell is in bounds.
                        if !compact_heightfield.contains(neighbor_x, neighbor_z) {
                            continue;
                        }

                        // Iterate over all neighbour spans and check if any of the is
                        // accessible from current cell.
                        let neighbor_cell =
                            *compact_heightfield.cell_at(neighbor_x as u16, neighbor_z as u16);
                        let span = compact_heightfield.spans[i].clone();
                        for k in neighbor_cell.index_range() {
                            let neighbor_span = &compact_heightfield.spans[k];
                            let bot = span.y.max(neighbor_span.y) as i32;
                            let top = (span.y as i32 + span.height() as i32)
                                .min(neighbor_span.y as i32 + neighbor_span.height() as i32);

                            // Check that the gap between the spans is walkable,
                            // and that the climb height between the gaps is not too high.
                            let is_walkable = top - bot >= walkable_height as i32;
                            let is_climbable = (neighbor_span.y as i32 - span.y as i32).abs()
                                <= walkable_climb as i32;
                            if !is_walkable || !is_climbable {
                                continue;
                            }
                            // Mark direction as walkable.
                            let layer_index = k - neighbor_cell.index() as usize;
                            if layer_index >= Self::MAX_LAYERS as usize {
                                max_layer_index = max_layer_index.max(layer_index);
                                continue;
                            }
                            compact_heightfield.spans[i].set_con(dir, Some(layer_index as u8));
                            break;
                        }
                    }
                }
            }
        }
        if max_layer_index >= Self::MAX_LAYERS as usize {
            tracing::warn!(
                "Heightfield has too many layers. Max layer index is {max}, but got {max_layer_index}. \
                 Spans above the limit are left unconnected.",
                max = Self::MAX_LAYERS - 1,
            );
        }
        Ok(compact_heightfield)
    }

    #[inline]
    pub(crate) fn column_index(&self, x: u16, z: u16) -> usize {
        x as usize + z as usize * self.width as usize
    }

    #[inline]
    pub(crate) fn contains(&self, x: i32, z: i32) -> bool {
        x >= 0 && x < self.width as i32 && z >= 0 && z < self.height as i32
    }

    /// Returns the cell at the given coordinates. Returns `None` if the coordinates are invalid.
    #[inline]
    pub fn get_cell_at(&self, x: u16, z: u16) -> Option<&CompactCell> {
        if x >= self.width || z >= self.height {
            return None;
        }
        self.cells.get(self.column_index(x, z))
    }

    /// Returns the cell at the given coordinates. Panics if the coordinates are invalid.
    #[inline]
    pub fn cell_at(&self, x: u16, z: u16) -> &CompactCell {
        &self.cells[self.column_index(x, z)]
    }

    /// Follows the connection `con` of a span at `(x, z)` in direction `dir`.
    /// Returns the neighbor's cell coordinates and span index.
    #[inline]
    pub(crate) fn con_indices(&self, x: i32, z: i32, dir: u8, con: u8) -> (i32, i32, usize) {
        let a_x = x + dir_offset_x(dir) as i32;
        let a_z = z + dir_offset_z(dir) as i32;
        let a_i = self.cells[(a_x + a_z * self.width as i32) as usize].index() as usize
            + con as usize;
        (a_x, a_z, a_i)
    }

    /// The index of the span connected to span `i` at `(x, z)` in direction `dir`, if any.
    #[inline]
    pub(crate) fn neighbor_index(&self, x: i32, z: i32, i: usize, dir: u8) -> Option<usize> {
        let con = self.spans[i].con(dir)?;
        Some(self.con_indices(x, z, dir, con).2)
    }
}

/// Errors that can occur when building a compact heightfield.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompactHeightfieldError {
    /// The heightfield holds more walkable spans than a cell can index.
    #[error("The heightfield has {0} walkable spans, but at most {max} are supported", max = u32::MAX)]
    TooManySpans(usize),
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::*;
    use crate::{
        HeightfieldBuilder,
        heightfield::SpanInsertion,
        span::{Span, SpanBuilder},
    };

    fn heightfield(width: f32, depth: f32) -> Heightfield {
        HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [width, 10.0, depth]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap()
    }

    fn add(heightfield: &mut Heightfield, x: u16, z: u16, min: u16, max: u16, area: AreaType) {
        let span: Span = SpanBuilder { min, max, area }.build();
        heightfield
            .add_span(SpanInsertion {
                x,
                z,
                flag_merge_threshold: 0,
                span,
            })
            .unwrap();
    }

    #[test]
    fn keeps_only_walkable_spans() {
        let mut heightfield = heightfield(2.0, 1.0);
        add(&mut heightfield, 0, 0, 0, 2, AreaType(1));
        add(&mut heightfield, 0, 0, 5, 6, AreaType::NOT_WALKABLE);
        add(&mut heightfield, 1, 0, 0, 3, AreaType(2));
        let chf = heightfield.into_compact(2, 1).unwrap();

        assert_eq!(chf.spans.len(), 2);
        assert_eq!(chf.areas, vec![AreaType(1), AreaType(2)]);
        assert_eq!(chf.cell_at(0, 0).index_range(), 0..1);
        assert_eq!(chf.cell_at(1, 0).index_range(), 1..2);
        // Clearance is measured up to the next span, even if it's unwalkable.
        assert_eq!(chf.spans[0].y, 2);
        assert_eq!(chf.spans[0].height(), 3);
        // The topmost span is open to the sky.
        assert_eq!(chf.spans[1].height(), u8::MAX);
    }

    #[test]
    fn connects_climbable_neighbors() {
        let mut heightfield = heightfield(3.0, 1.0);
        add(&mut heightfield, 0, 0, 0, 2, AreaType(1));
        add(&mut heightfield, 1, 0, 0, 3, AreaType(1));
        add(&mut heightfield, 2, 0, 0, 6, AreaType(1));
        let chf = heightfield.into_compact(2, 1).unwrap();

        // +x of span 0 reaches span 1, 1 step up.
        assert_eq!(chf.spans[0].con(2), Some(0));
        assert_eq!(chf.spans[1].con(0), Some(0));
        // Span 2 is too high to climb.
        assert_eq!(chf.spans[1].con(2), None);
        assert_eq!(chf.spans[2].con(0), None);
        // Nothing outside the grid.
        assert_eq!(chf.spans[0].con(0), None);
        assert_eq!(chf.spans[0].con(1), None);
        assert_eq!(chf.spans[0].con(3), None);
    }

    #[test]
    fn picks_the_lowest_reachable_layer() {
        let mut heightfield = heightfield(2.0, 1.0);
        add(&mut heightfield, 0, 0, 0, 5, AreaType(1));
        add(&mut heightfield, 1, 0, 0, 1, AreaType(1));
        add(&mut heightfield, 1, 0, 3, 5, AreaType(1));
        let chf = heightfield.into_compact(2, 1).unwrap();
        assert_eq!(chf.cell_at(1, 0).count(), 2);
        // The lower span in column 1 has a ceiling of 3, too low next to a floor at 5.
        assert_eq!(chf.spans[0].con(2), Some(1));
    }

    #[test]
    fn crowded_columns_keep_their_lowest_spans() {
        let mut heightfield = HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [2.0, 1000.0, 1.0]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap();
        for layer in 0..300 {
            add(&mut heightfield, 0, 0, layer * 2, layer * 2 + 1, AreaType(1));
        }
        add(&mut heightfield, 1, 0, 0, 1, AreaType(1));
        let chf = heightfield.into_compact(1, 1).unwrap();

        assert_eq!(chf.cell_at(0, 0).count(), u8::MAX);
        assert_eq!(chf.cell_at(0, 0).index_range(), 0..255);
        assert_eq!(chf.cell_at(1, 0).index_range(), 255..256);
        assert_eq!(chf.spans.len(), 256);
        let topmost = &chf.spans[254];
        assert_eq!(topmost.y, 254 * 2 + 1);
        // The clearance still reaches up to the first dropped span.
        assert_eq!(topmost.height(), 1);
    }

    #[test]
    fn connections_are_symmetric_on_terraces() {
        let mut heightfield = heightfield(4.0, 4.0);
        for z in 0..4 {
            for x in 0..4 {
                add(&mut heightfield, x, z, 0, 1 + (x + z) % 3, AreaType(1));
            }
        }
        let chf = heightfield.into_compact(2, 1).unwrap();
        for z in 0..4_i32 {
            for x in 0..4_i32 {
                let cell = chf.cell_at(x as u16, z as u16);
                for i in cell.index_range() {
                    for dir in 0..4 {
                        let Some(con) = chf.spans[i].con(dir) else {
                            continue;
                        };
                        let (a_x, a_z, a_i) = chf.con_indices(x, z, dir, con);
                        let back = chf.neighbor_index(a_x, a_z, a_i, (dir + 2) & 0x3);
                        assert_eq!(back, Some(i), "span {i} dir {dir}");
                    }
                }
            }
        }
    }
}
