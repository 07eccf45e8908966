//! Builders for small synthetic fields shared by the unit tests.

use glam::Vec3A;

use crate::{
    Aabb3d, AreaType, CompactHeightfield, Heightfield, HeightfieldBuilder,
    heightfield::SpanInsertion, span::SpanBuilder,
};

/// A heightfield with unit cells where `floor(x, z)` yields the walkable floor of each column.
pub(crate) fn grid_heightfield(
    width: u16,
    height: u16,
    floor: impl Fn(u16, u16) -> Option<u16>,
) -> Heightfield {
    let mut heightfield = HeightfieldBuilder {
        aabb: Aabb3d::new(Vec3A::ZERO, [width as f32, 20.0, height as f32]),
        cell_size: 1.0,
        cell_height: 1.0,
    }
    .build()
    .unwrap();
    for z in 0..height {
        for x in 0..width {
            let Some(max) = floor(x, z) else {
                continue;
            };
            heightfield
                .add_span(SpanInsertion {
                    x,
                    z,
                    flag_merge_threshold: 0,
                    span: SpanBuilder {
                        min: 0,
                        max,
                        area: AreaType::DEFAULT_WALKABLE,
                    }
                    .build(),
                })
                .unwrap();
        }
    }
    heightfield
}

/// A compact heightfield with unit cells where `walkable(x, z)` decides whether a column has a floor.
pub(crate) fn grid_compact_heightfield(
    width: u16,
    height: u16,
    walkable: impl Fn(u16, u16) -> bool,
) -> CompactHeightfield {
    grid_heightfield(width, height, |x, z| walkable(x, z).then_some(1))
        .into_compact(2, 1)
        .unwrap()
}

/// A fully walkable, flat, square compact heightfield.
pub(crate) fn flat_compact_heightfield(size: u16) -> CompactHeightfield {
    grid_compact_heightfield(size, size, |_, _| true)
}
