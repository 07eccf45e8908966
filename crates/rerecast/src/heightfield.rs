//! The heightfield module contains the types and functions for working with [`Heightfield`]s.
//!
//! A heightfield is a 3D grid of [`Span`]s, where each column contains 0, 1, or more spans.

use thiserror::Error;

use crate::{Aabb3d, span::Span};

/// A dynamic heightfield representing obstructed space.
/// Build with [`HeightfieldBuilder`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Heightfield {
    /// The width of the heightfield along the x-axis in cell units
    pub width: u16,
    /// The height of the heightfield along the z-axis in cell units
    pub height: u16,
    /// The AABB of the heightfield
    pub aabb: Aabb3d,
    /// The size of each cell on the xz-plane
    pub cell_size: f32,
    /// The size of each cell along the y-axis
    pub cell_height: f32,
    /// The columns of the heightfield in width*height order
    pub columns: Vec<Column>,
}

/// The spans of one xz-cell of a [`Heightfield`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Column {
    /// The spans of the column, from bottom to top. Never overlapping.
    pub spans: Vec<Span>,
}

impl Heightfield {
    /// Inserts a span into its column, merging it with every span it overlaps.
    #[inline]
    pub(crate) fn add_span(&mut self, insertion: SpanInsertion) -> Result<(), SpanInsertionError> {
        if insertion.x >= self.width || insertion.z >= self.height {
            return Err(SpanInsertionError::ColumnIndexOutOfBounds {
                x: insertion.x,
                z: insertion.z,
            });
        }
        let column_index = self.column_index(insertion.x, insertion.z);
        let spans = &mut self.columns[column_index].spans;

        let mut new_span = insertion.span;
        let mut index = 0;
        // Insert the new span, possibly merging it with existing spans.
        while let Some(current_span) = spans.get(index).copied() {
            if current_span.min() > new_span.max() {
                // Current span is completely above the new span, break.
                break;
            }
            if current_span.max() < new_span.min() {
                // Current span is completely below the new span.  Keep going.
                index += 1;
                continue;
            }
            // The new span overlaps with an existing span.  Merge them.
            if current_span.min() < new_span.min() {
                new_span.set_min(current_span.min());
            }
            if current_span.max() > new_span.max() {
                new_span.set_max(current_span.max());
            }

            // Merge flags.
            if (new_span.max() as i32 - current_span.max() as i32).unsigned_abs()
                <= insertion.flag_merge_threshold as u32
            {
                // Higher area ID numbers indicate higher resolution priority.
                let area = new_span.area().max(current_span.area());
                new_span.set_area(area);
            }

            // The current span is now part of the new one.
            // Keep going because there might be other overlapping spans that also need to be merged.
            spans.remove(index);
        }
        spans.insert(index, new_span);

        Ok(())
    }

    #[inline]
    pub(crate) fn column_index(&self, x: u16, z: u16) -> usize {
        x as usize + z as usize * self.width as usize
    }

    #[inline]
    pub(crate) fn contains(&self, x: i32, z: i32) -> bool {
        x >= 0 && x < self.width as i32 && z >= 0 && z < self.height as i32
    }

    /// Returns the column at the given coordinates.
    /// `None` if the coordinates are out of bounds.
    #[inline]
    pub fn column(&self, x: u16, z: u16) -> Option<&Column> {
        if x >= self.width || z >= self.height {
            return None;
        }
        self.columns.get(self.column_index(x, z))
    }

    /// Returns the lowest span of the column at the given coordinates.
    /// `None` if either the index is out of bounds or there is no span in the column.
    #[inline]
    pub fn span_at(&self, x: u16, z: u16) -> Option<&Span> {
        self.column(x, z)?.spans.first()
    }

    /// The number of spans over all columns.
    pub fn span_count(&self) -> usize {
        self.columns.iter().map(|column| column.spans.len()).sum()
    }

    /// The number of spans over all columns that are walkable.
    pub fn walkable_span_count(&self) -> usize {
        self.columns
            .iter()
            .flat_map(|column| column.spans.iter())
            .filter(|span| span.area().is_walkable())
            .count()
    }
}

/// A builder for [`Heightfield`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightfieldBuilder {
    /// The AABB of the heightfield
    pub aabb: Aabb3d,
    /// The size of each cell on the xz-plane
    pub cell_size: f32,
    /// The size of each cell along the y-axis
    pub cell_height: f32,
}

impl HeightfieldBuilder {
    /// Builds an empty heightfield covering the AABB.
    pub fn build(self) -> Result<Heightfield, HeightfieldBuilderError> {
        if !(self.cell_size > 0.0 && self.cell_height > 0.0) {
            return Err(HeightfieldBuilderError::InvalidCellSize {
                cell_size: self.cell_size,
                cell_height: self.cell_height,
            });
        }
        let width = (self.aabb.max.x - self.aabb.min.x) / self.cell_size + 0.5;
        let height = (self.aabb.max.z - self.aabb.min.z) / self.cell_size + 0.5;
        if !(0.0..=u16::MAX as f32).contains(&width) || !(0.0..=u16::MAX as f32).contains(&height)
        {
            return Err(HeightfieldBuilderError::GridTooLarge { width, height });
        }
        let width = width as u16;
        let height = height as u16;
        let column_count = width as usize * height as usize;
        Ok(Heightfield {
            width,
            height,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            columns: vec![Column::default(); column_count],
        })
    }
}

/// Errors that can occur when building a [`Heightfield`] with [`HeightfieldBuilder::build`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeightfieldBuilderError {
    /// Happens when the cell size or cell height is not strictly positive.
    #[error("Cell size and cell height must be positive, got {cell_size} and {cell_height}")]
    InvalidCellSize {
        /// The requested size of each cell on the xz-plane
        cell_size: f32,
        /// The requested size of each cell along the y-axis
        cell_height: f32,
    },
    /// Happens when the grid does not fit into `u16` cell coordinates or is inverted.
    #[error("Grid dimensions must lie in 0..={max}, got {width}x{height}", max = u16::MAX)]
    GridTooLarge {
        /// The width of the heightfield along the x-axis in cell units
        width: f32,
        /// The height of the heightfield along the z-axis in cell units
        height: f32,
    },
}

/// Errors that can occur when inserting a span into a [`Heightfield`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanInsertionError {
    /// Happens when the column index is out of bounds.
    #[error("column index out of bounds: x={x}, z={z}")]
    ColumnIndexOutOfBounds {
        /// The x-coordinate of the span
        x: u16,
        /// The z-coordinate of the span
        z: u16,
    },
}

pub(crate) struct SpanInsertion {
    /// The x-coordinate of the span
    pub(crate) x: u16,
    /// The z-coordinate of the span
    pub(crate) z: u16,
    /// Maximum difference between the ceilings of two spans to merge area type IDs
    pub(crate) flag_merge_threshold: u16,
    /// The span to insert
    pub(crate) span: Span,
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{
        Aabb3d,
        span::{AreaType, SpanBuilder},
    };

    use super::*;

    fn height_field() -> Heightfield {
        HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [5.0, 5.0, 5.0]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap()
    }

    fn span_low() -> SpanBuilder {
        SpanBuilder {
            min: 2,
            max: 4,
            area: AreaType(2),
        }
    }

    fn span_mid() -> SpanBuilder {
        SpanBuilder {
            min: 4,
            max: 7,
            area: AreaType(2),
        }
    }

    fn span_high() -> SpanBuilder {
        SpanBuilder {
            min: 7,
            max: 10,
            area: AreaType(2),
        }
    }

    fn insert(heightfield: &mut Heightfield, x: u16, z: u16, span: Span, threshold: u16) {
        heightfield
            .add_span(SpanInsertion {
                x,
                z,
                flag_merge_threshold: threshold,
                span,
            })
            .unwrap();
    }

    #[test]
    fn can_create_heightfield() {
        let heightfield = height_field();
        assert_eq!(heightfield.width, 5);
        assert_eq!(heightfield.height, 5);
        assert_eq!(heightfield.columns.len(), 25);
    }

    #[test]
    fn rejects_zero_cell_size() {
        let result = HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [5.0, 5.0, 5.0]),
            cell_size: 0.0,
            cell_height: 1.0,
        }
        .build();
        assert!(matches!(
            result,
            Err(HeightfieldBuilderError::InvalidCellSize { .. })
        ));
    }

    #[test]
    fn can_add_span() {
        let mut heightfield = height_field();
        let expected_span = span_low().build();
        insert(&mut heightfield, 1, 3, expected_span, 0);
        let span = heightfield.span_at(1, 3).unwrap();
        assert_eq!(*span, expected_span);

        let empty_span = heightfield.span_at(3, 1);
        assert_eq!(empty_span, None);
    }

    #[test]
    fn rejects_out_of_bounds_span() {
        let mut heightfield = height_field();
        let result = heightfield.add_span(SpanInsertion {
            x: 5,
            z: 0,
            flag_merge_threshold: 0,
            span: span_low().build(),
        });
        assert_eq!(
            result,
            Err(SpanInsertionError::ColumnIndexOutOfBounds { x: 5, z: 0 })
        );
    }

    #[test]
    fn can_add_multiple_spans_next_to_each_other() {
        let mut heightfield = height_field();
        let expected_span_1 = span_low().build();
        insert(&mut heightfield, 1, 3, expected_span_1, 0);
        let expected_span_2 = span_mid().build();
        insert(&mut heightfield, 2, 3, expected_span_2, 0);

        assert_eq!(*heightfield.span_at(1, 3).unwrap(), expected_span_1);
        assert_eq!(*heightfield.span_at(2, 3).unwrap(), expected_span_2);
        assert_eq!(heightfield.span_at(3, 1), None);
    }

    #[test]
    fn can_add_higher_span_in_same_column() {
        let mut heightfield = height_field();
        let span_low = span_low().build();
        insert(&mut heightfield, 1, 3, span_low, 0);
        let span_high = span_high().build();
        insert(&mut heightfield, 1, 3, span_high, 0);

        let column = heightfield.column(1, 3).unwrap();
        assert_eq!(column.spans, vec![span_low, span_high]);
    }

    #[test]
    fn can_add_lower_span_in_same_column() {
        let mut heightfield = height_field();
        let span_high = span_high().build();
        insert(&mut heightfield, 1, 3, span_high, 0);
        let span_low = span_low().build();
        insert(&mut heightfield, 1, 3, span_low, 0);

        let column = heightfield.column(1, 3).unwrap();
        assert_eq!(column.spans, vec![span_low, span_high]);
    }

    #[test]
    fn can_merge_spans() {
        let mut heightfield = height_field();
        let span_low = span_low().build();
        insert(&mut heightfield, 1, 3, span_low, 0);
        let span_mid = span_mid().build();
        insert(&mut heightfield, 1, 3, span_mid, 0);

        let merged_span = SpanBuilder {
            min: span_low.min(),
            max: span_mid.max(),
            area: span_mid.area(),
        }
        .build();

        let column = heightfield.column(1, 3).unwrap();
        assert_eq!(column.spans, vec![merged_span]);
    }

    #[test]
    fn merge_bridges_multiple_spans() {
        let mut heightfield = height_field();
        insert(&mut heightfield, 0, 0, span_low().build(), 0);
        insert(&mut heightfield, 0, 0, span_high().build(), 0);
        insert(&mut heightfield, 0, 0, span_mid().build(), 0);

        let column = heightfield.column(0, 0).unwrap();
        assert_eq!(column.spans.len(), 1);
        assert_eq!(column.spans[0].min(), 2);
        assert_eq!(column.spans[0].max(), 10);
    }

    #[test]
    fn higher_area_wins_within_merge_threshold() {
        let mut heightfield = height_field();
        let walkable = SpanBuilder {
            min: 0,
            max: 5,
            area: AreaType(10),
        }
        .build();
        let obstacle = SpanBuilder {
            min: 3,
            max: 6,
            area: AreaType::NOT_WALKABLE,
        }
        .build();
        insert(&mut heightfield, 2, 2, walkable, 1);
        insert(&mut heightfield, 2, 2, obstacle, 1);
        assert_eq!(heightfield.span_at(2, 2).unwrap().area(), AreaType(10));

        let mut heightfield = height_field();
        insert(&mut heightfield, 2, 2, walkable, 0);
        insert(&mut heightfield, 2, 2, obstacle, 0);
        assert_eq!(
            heightfield.span_at(2, 2).unwrap().area(),
            AreaType::NOT_WALKABLE
        );
    }

    #[test]
    fn adding_same_span_twice_is_idempotent() {
        let mut heightfield = height_field();
        insert(&mut heightfield, 4, 4, span_mid().build(), 1);
        let once = heightfield.clone();
        insert(&mut heightfield, 4, 4, span_mid().build(), 1);
        assert_eq!(heightfield, once);
    }
}
