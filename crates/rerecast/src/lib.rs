#![doc = include_str!("../../../readme.md")]

mod compact_cell;
mod compact_heightfield;
mod compact_span;
mod config;
mod contours;
mod detail_mesh;
mod erosion;
mod heightfield;
mod main_api;
mod mark_convex_poly_area;
pub(crate) mod math;
mod poly_mesh;
mod pre_filter;
mod rasterize;
mod region;
mod span;
#[cfg(test)]
mod test_util;
mod trimesh;
mod watershed_build_regions;
mod watershed_distance_field;

pub use compact_cell::CompactCell;
pub use compact_heightfield::{CompactHeightfield, CompactHeightfieldError};
pub use compact_span::CompactSpan;
pub use config::{NavmeshConfig, NavmeshConfigBuilder};
pub use contours::{BuildContoursFlags, Contour, ContourSet, ContourVertex, RegionVertexId};
pub use detail_mesh::{DETAIL_EDGE_BOUNDARY, DetailNavmesh, DetailNavmeshError, SubMesh};
pub use heightfield::{
    Column, Heightfield, HeightfieldBuilder, HeightfieldBuilderError, SpanInsertionError,
};
pub use main_api::{Navmesh, generate_navmesh};
pub use mark_convex_poly_area::ConvexVolume;
pub use math::{Aabb2d, Aabb3d};
pub use poly_mesh::{
    MAX_VERTICES_PER_POLYGON, MESH_NULL_IDX, PORTAL_EDGE_FLAG, PolygonMeshError, PolygonNavmesh,
};
pub use rasterize::RasterizationError;
pub use region::RegionId;
pub use span::{AreaType, Span, SpanBuilder};
pub use trimesh::{TriMesh, TriMeshError};
pub use watershed_build_regions::RegionError;
