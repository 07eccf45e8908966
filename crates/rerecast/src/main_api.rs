//! The one-call bake from a [`TriMesh`] to a [`Navmesh`].

use anyhow::Context as _;

use crate::{
    DetailNavmesh, HeightfieldBuilder, NavmeshConfig, PolygonNavmesh, trimesh::TriMesh,
};

/// The result of a navmesh bake.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Navmesh {
    /// The walkable polygons and their adjacency.
    pub polygon: PolygonNavmesh,
    /// The height detail of every polygon in [`Navmesh::polygon`].
    pub detail: DetailNavmesh,
}

/// Bakes a navmesh from a [`TriMesh`] by running every build stage in order.
///
/// The area types of the trimesh decide which triangles are walkable. Use
/// [`TriMesh::mark_walkable_triangles`] with [`NavmeshConfig::walkable_slope_angle`]
/// to classify them by slope first.
///
/// # Errors
///
/// Returns an error if the configuration or the trimesh is invalid. The error names the stage that failed.
pub fn generate_navmesh(trimesh: &TriMesh, config: &NavmeshConfig) -> anyhow::Result<Navmesh> {
    let mut heightfield = HeightfieldBuilder {
        aabb: config.heightfield_aabb(),
        cell_size: config.cell_size,
        cell_height: config.cell_height,
    }
    .build()
    .context("Failed to create the heightfield")?;

    heightfield
        .rasterize_triangles(trimesh, config.walkable_climb)
        .context("Failed to rasterize the trimesh")?;
    tracing::debug!(
        "Rasterized {} triangles into {} spans",
        trimesh.indices.len(),
        heightfield.span_count()
    );

    // Once all geometry is rasterized, we do initial pass of filtering to
    // remove unwanted overhangs caused by the conservative rasterization
    // as well as filter spans where the character cannot possibly stand.
    heightfield.filter_low_hanging_walkable_obstacles(config.walkable_climb);
    heightfield.filter_ledge_spans(config.walkable_height, config.walkable_climb);
    heightfield.filter_walkable_low_height_spans(config.walkable_height);
    tracing::debug!(
        "{} walkable spans remain after filtering",
        heightfield.walkable_span_count()
    );

    let mut compact_heightfield = heightfield
        .into_compact(config.walkable_height, config.walkable_climb)
        .context("Failed to compact the heightfield")?;

    compact_heightfield.erode_walkable_area(config.walkable_radius);
    for volume in &config.area_volumes {
        compact_heightfield.mark_convex_poly_area(volume);
    }

    compact_heightfield.build_distance_field();
    compact_heightfield
        .build_regions(
            config.border_size,
            config.min_region_area,
            config.merge_region_area,
        )
        .context("Failed to partition the heightfield into regions")?;
    tracing::debug!(
        "Partitioned {} spans into {} regions",
        compact_heightfield.spans.len(),
        compact_heightfield.max_region.bits()
    );

    let contours = compact_heightfield.build_contours(
        config.max_simplification_error,
        config.max_edge_len,
        config.contour_flags,
    );
    tracing::debug!("Traced {} contours", contours.contours.len());

    let polygon = contours
        .into_polygon_mesh(config.max_vertices_per_polygon)
        .context("Failed to build the polygon mesh")?;
    tracing::debug!(
        "Built {} polygons from {} vertices",
        polygon.polygon_count(),
        polygon.vertices.len()
    );

    let detail = DetailNavmesh::new(
        &polygon,
        &compact_heightfield,
        config.detail_sample_dist,
        config.detail_sample_max_error,
    )
    .context("Failed to build the detail mesh")?;
    tracing::debug!(
        "Built {} detail triangles from {} vertices",
        detail.triangles.len(),
        detail.vertices.len()
    );

    Ok(Navmesh { polygon, detail })
}

#[cfg(test)]
mod tests {
    use glam::{UVec3, Vec3A};

    use super::*;
    use crate::{Aabb3d, AreaType, NavmeshConfigBuilder};

    fn quad(size: f32) -> TriMesh {
        TriMesh {
            vertices: vec![
                Vec3A::new(0.0, 0.0, 0.0),
                Vec3A::new(0.0, 0.0, size),
                Vec3A::new(size, 0.0, size),
                Vec3A::new(size, 0.0, 0.0),
            ],
            indices: vec![UVec3::new(0, 1, 2), UVec3::new(0, 2, 3)],
            area_types: vec![AreaType::DEFAULT_WALKABLE; 2],
        }
    }

    fn config(size: f32) -> NavmeshConfig {
        NavmeshConfigBuilder {
            cell_size: 1.0,
            cell_height: 1.0,
            agent_height: 2.0,
            agent_radius: 0.0,
            agent_max_climb: 1.0,
            region_min_size: 0.0,
            detail_sample_dist: 0.0,
            aabb: Aabb3d::new([0.0, -1.0, 0.0], [size, 4.0, size]),
            ..NavmeshConfigBuilder::default()
        }
        .build()
    }

    #[test]
    fn flat_quad_bakes_into_one_polygon() {
        let navmesh = generate_navmesh(&quad(10.0), &config(10.0)).unwrap();
        assert_eq!(navmesh.polygon.polygon_count(), 1);
        assert_eq!(navmesh.detail.meshes.len(), 1);
    }

    #[test]
    fn nothing_walkable_bakes_an_empty_navmesh() {
        let mut trimesh = quad(10.0);
        trimesh.area_types = vec![AreaType::NOT_WALKABLE; 2];
        let navmesh = generate_navmesh(&trimesh, &config(10.0)).unwrap();
        assert_eq!(navmesh.polygon.polygon_count(), 0);
        assert!(navmesh.polygon.vertices.is_empty());
        assert_eq!(navmesh.detail, DetailNavmesh::default());
    }

    #[test]
    fn malformed_trimesh_names_the_failing_stage() {
        let mut trimesh = quad(10.0);
        trimesh.area_types.pop();
        let error = generate_navmesh(&trimesh, &config(10.0)).unwrap_err();
        assert_eq!(error.to_string(), "Failed to rasterize the trimesh");
    }
}
