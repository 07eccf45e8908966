use std::collections::VecDeque;

use glam::{U16Vec3, Vec3, Vec3Swizzles as _};
use thiserror::Error;

use crate::{
    CompactHeightfield, PolygonNavmesh, RegionId,
    math::{dir_for_offset, dir_offset_x, dir_offset_z, distance_squared_point_segment_2d, next, prev},
};

/// Set in [`DetailNavmesh::triangle_flags`] for triangle edges that lie on the polygon boundary.
/// Edge `i` of a triangle uses the bits at `2 * i`.
pub const DETAIL_EDGE_BOUNDARY: u8 = 0x1;

const MAX_VERTS: usize = 127;
// Max tris for delaunay is 2n-2-k (n=num verts, k=num hull verts).
const MAX_TRIS: usize = 255;
const MAX_VERTS_PER_EDGE: usize = 32;
const UNSET_HEIGHT: u16 = 0xffff;

/// Contains triangle meshes that represent detailed height data associated
/// with the polygons in its associated polygon mesh object.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DetailNavmesh {
    /// The sub-mesh data, one per polygon of the source [`PolygonNavmesh`].
    pub meshes: Vec<SubMesh>,
    /// The mesh vertices in world space.
    pub vertices: Vec<Vec3>,
    /// The mesh triangles. The indices are relative to [`SubMesh::base_vertex_index`].
    pub triangles: Vec<[u8; 3]>,
    /// The boundary flags of each triangle, see [`DETAIL_EDGE_BOUNDARY`].
    pub triangle_flags: Vec<u8>,
}

/// The slice of a [`DetailNavmesh`] that belongs to one polygon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SubMesh {
    /// The index of the first vertex in [`DetailNavmesh::vertices`].
    pub base_vertex_index: u32,
    /// The number of vertices of the sub-mesh.
    pub vertex_count: u32,
    /// The index of the first triangle in [`DetailNavmesh::triangles`].
    pub base_triangle_index: u32,
    /// The number of triangles of the sub-mesh.
    pub triangle_count: u32,
}

impl DetailNavmesh {
    /// Builds a detail mesh from the provided polygon mesh.
    ///
    /// # Arguments
    ///
    /// - `mesh` - A fully built polygon mesh.
    /// - `heightfield` - The compact heightfield used to build the polygon mesh.
    /// - `sample_distance` - Sets the distance to use when sampling the heightfield. [Limit: >=0] [Units: wu]
    /// - `sample_max_error` - The maximum distance the detail mesh surface should deviate
    ///   from heightfield data. [Limit: >=0] [Units: wu]
    pub fn new(
        mesh: &PolygonNavmesh,
        heightfield: &CompactHeightfield,
        sample_distance: f32,
        sample_max_error: f32,
    ) -> Result<Self, DetailNavmeshError> {
        let mut dmesh = DetailNavmesh::default();
        if mesh.vertices.is_empty() || mesh.polygon_count() == 0 {
            return Ok(dmesh);
        }
        let chf = heightfield;
        validate(mesh, chf)?;

        let cs = mesh.cell_size;
        let ch = mesh.cell_height;
        let orig = Vec3::from(mesh.aabb.min);
        let border_size = mesh.border_size as i32;
        let height_search_radius = 1.max(mesh.max_edge_error.ceil() as i32);

        // Find max size for a polygon area.
        let bounds: Vec<Bounds> = (0..mesh.polygon_count())
            .map(|i| {
                let mut bounds = Bounds {
                    xmin: chf.width as i32,
                    xmax: 0,
                    zmin: chf.height as i32,
                    zmax: 0,
                };
                for v in mesh.polygon_vertices(i) {
                    let v = mesh.vertices[*v as usize];
                    bounds.xmin = bounds.xmin.min(v.x as i32);
                    bounds.xmax = bounds.xmax.max(v.x as i32);
                    bounds.zmin = bounds.zmin.min(v.z as i32);
                    bounds.zmax = bounds.zmax.max(v.z as i32);
                }
                bounds.xmin = 0.max(bounds.xmin - 1);
                bounds.xmax = (chf.width as i32).min(bounds.xmax + 1);
                bounds.zmin = 0.max(bounds.zmin - 1);
                bounds.zmax = (chf.height as i32).min(bounds.zmax + 1);
                bounds
            })
            .collect();

        let polygon_vertex_count: usize = (0..mesh.polygon_count())
            .map(|i| mesh.polygon_vertices(i).len())
            .sum();
        dmesh.meshes = Vec::with_capacity(mesh.polygon_count());
        dmesh.vertices = Vec::with_capacity(polygon_vertex_count + polygon_vertex_count / 2);
        dmesh.triangles = Vec::with_capacity(dmesh.vertices.capacity() * 2);
        dmesh.triangle_flags = Vec::with_capacity(dmesh.vertices.capacity() * 2);

        let mut patch = HeightPatch::default();
        let mut queue = VecDeque::with_capacity(512);
        let mut workspace = PolygonDetail::default();

        for (i, bounds) in bounds.iter().enumerate() {
            let polygon = mesh.polygon_vertices(i);

            // Store polygon vertices for processing.
            let poly: Vec<Vec3> = polygon
                .iter()
                .map(|v| {
                    let v = mesh.vertices[*v as usize].as_vec3();
                    Vec3::new(v.x * cs, v.y * ch, v.z * cs)
                })
                .collect();

            // Get the height data from the area of the polygon.
            patch.reset(bounds);
            patch.fill(
                chf,
                polygon,
                &mesh.vertices,
                border_size,
                mesh.regions[i],
                &mut queue,
            );

            // Build detail mesh.
            workspace.build(
                &poly,
                sample_distance,
                sample_max_error,
                height_search_radius,
                chf,
                &patch,
            );

            // Move detail verts to world space.
            for vertex in &mut workspace.vertices {
                *vertex += orig;
                // [sic] Is this offset necessary?
                vertex.y += chf.cell_height;
            }

            // Store detail submesh.
            dmesh.meshes.push(SubMesh {
                base_vertex_index: dmesh.vertices.len() as u32,
                vertex_count: workspace.vertices.len() as u32,
                base_triangle_index: dmesh.triangles.len() as u32,
                triangle_count: workspace.triangles.len() as u32,
            });
            dmesh.vertices.extend_from_slice(&workspace.vertices);
            for triangle in &workspace.triangles {
                dmesh
                    .triangles
                    .push(triangle.map(|vertex| vertex as u8));
                dmesh
                    .triangle_flags
                    .push(boundary_flags(*triangle, &workspace.hull));
            }
        }

        Ok(dmesh)
    }
}

fn validate(mesh: &PolygonNavmesh, chf: &CompactHeightfield) -> Result<(), DetailNavmeshError> {
    if mesh.border_size != chf.border_size {
        return Err(DetailNavmeshError::BorderSizeMismatch {
            mesh: mesh.border_size,
            heightfield: chf.border_size,
        });
    }
    let nvp = mesh.max_vertices_per_polygon as usize;
    if nvp < 3
        || mesh.polygons.len() != mesh.polygon_count() * nvp
        || mesh.polygon_neighbors.len() != mesh.polygons.len()
    {
        return Err(DetailNavmeshError::InvalidPolygonLayout {
            slots: mesh.polygons.len(),
            polygons: mesh.polygon_count(),
            max_vertices_per_polygon: mesh.max_vertices_per_polygon,
        });
    }
    for polygon in 0..mesh.polygon_count() {
        if let Some(index) = mesh
            .polygon_vertices(polygon)
            .iter()
            .find(|index| **index as usize >= mesh.vertices.len())
        {
            return Err(DetailNavmeshError::VertexIndexOutOfBounds {
                polygon,
                index: *index,
                vertex_count: mesh.vertices.len(),
            });
        }
    }
    let padding = 2 * mesh.border_size as u32;
    if let Some(vertex) = mesh.vertices.iter().position(|v| {
        v.x as u32 + padding > chf.width as u32 || v.z as u32 + padding > chf.height as u32
    }) {
        return Err(DetailNavmeshError::VertexOutsideHeightfield {
            vertex,
            width: chf.width,
            height: chf.height,
        });
    }
    Ok(())
}

/// Errors that can occur when building a [`DetailNavmesh`] with [`DetailNavmesh::new`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetailNavmeshError {
    /// The polygon mesh was not built from the given heightfield.
    #[error("The polygon mesh has a border size of {mesh}, but the heightfield has {heightfield}")]
    BorderSizeMismatch {
        /// The border size of the polygon mesh
        mesh: u16,
        /// The border size of the compact heightfield
        heightfield: u16,
    },
    /// The polygon and neighbor arrays do not match the polygon count.
    #[error(
        "{slots} polygon slots do not hold {polygons} polygons with {max_vertices_per_polygon} vertices each"
    )]
    InvalidPolygonLayout {
        /// The length of the polygon array
        slots: usize,
        /// The number of polygons
        polygons: usize,
        /// The maximum number of vertices per polygon
        max_vertices_per_polygon: u16,
    },
    /// A polygon references a vertex that does not exist.
    #[error("Polygon {polygon} references vertex {index}, but the mesh only has {vertex_count} vertices")]
    VertexIndexOutOfBounds {
        /// The index of the offending polygon
        polygon: usize,
        /// The referenced vertex index
        index: u16,
        /// The number of vertices in the mesh
        vertex_count: usize,
    },
    /// A vertex lies outside of the heightfield.
    #[error("Vertex {vertex} lies outside of the {width}x{height} heightfield")]
    VertexOutsideHeightfield {
        /// The index of the offending vertex
        vertex: usize,
        /// The width of the heightfield
        width: u16,
        /// The height of the heightfield
        height: u16,
    },
}

/// Scratch buffers reused for every polygon of one build.
#[derive(Debug, Default)]
struct PolygonDetail {
    vertices: Vec<Vec3>,
    triangles: Vec<[usize; 3]>,
    edges: Vec<DelaunayEdge>,
    samples: Vec<Sample>,
    /// The polygon outline, including the edge samples, as indices into `vertices`.
    hull: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    x: i32,
    y: u16,
    z: i32,
    added: bool,
}

impl PolygonDetail {
    fn build(
        &mut self,
        input: &[Vec3],
        sample_dist: f32,
        sample_max_error: f32,
        height_search_radius: i32,
        chf: &CompactHeightfield,
        patch: &HeightPatch,
    ) {
        let nin = input.len();
        self.vertices.clear();
        self.vertices.extend_from_slice(input);
        self.triangles.clear();
        self.edges.clear();
        self.hull.clear();

        let cs = chf.cell_size;
        let ch = chf.cell_height;
        let ics = 1.0 / cs;

        // Calculate minimum extents of the polygon based on input data.
        let min_extent_squared = poly_min_extent_squared(input);

        // Tessellate outlines.
        // This is done in separate pass in order to ensure
        // seamless height values across the ply boundaries.
        if sample_dist > 0.0 {
            let mut edge = [Vec3::ZERO; MAX_VERTS_PER_EDGE + 1];
            for i in 0..nin {
                let j = prev(i, nin);
                let mut vj = input[j];
                let mut vi = input[i];
                // Make sure the segments are always handled in same order
                // using lexological sort or else there will be seams.
                let swapped = if (vj.x - vi.x).abs() < 1.0e-6 {
                    vj.z > vi.z
                } else {
                    vj.x > vi.x
                };
                if swapped {
                    std::mem::swap(&mut vj, &mut vi);
                }

                self.hull.push(j);

                // Create samples along the edge.
                let delta = vi - vj;
                let d = delta.xz().length();
                let mut nn = 1 + (d / sample_dist).floor() as usize;
                nn = nn.min(MAX_VERTS_PER_EDGE - 1);
                if self.vertices.len() + nn >= MAX_VERTS {
                    nn = (MAX_VERTS - 1).saturating_sub(self.vertices.len());
                }
                if nn == 0 {
                    continue;
                }
                for (k, pos) in edge.iter_mut().enumerate().take(nn + 1) {
                    let u = k as f32 / nn as f32;
                    *pos = vj + delta * u;
                    pos.y = patch.height_at(*pos, ics, ch, height_search_radius) as f32 * ch;
                }

                // Simplify samples.
                let mut idx = Vec::with_capacity(MAX_VERTS_PER_EDGE);
                idx.extend([0, nn]);
                let mut k = 0;
                while k + 1 < idx.len() {
                    let a = idx[k];
                    let b = idx[k + 1];
                    let va = edge[a];
                    let vb = edge[b];
                    // Find maximum deviation along the segment.
                    let mut maxd = 0.0;
                    let mut maxi = None;
                    for (m, point) in edge.iter().enumerate().take(b).skip(a + 1) {
                        let dev = distance_squared_point_segment_3d(*point, va, vb);
                        if dev > maxd {
                            maxd = dev;
                            maxi = Some(m);
                        }
                    }
                    // If the max deviation is larger than accepted error,
                    // add new point, else continue to next segment.
                    match maxi {
                        Some(maxi) if maxd > sample_max_error * sample_max_error => {
                            idx.insert(k + 1, maxi);
                        }
                        _ => k += 1,
                    }
                }

                // Add new vertices.
                let mut inner = idx[1..idx.len() - 1].to_vec();
                if swapped {
                    inner.reverse();
                }
                for k in inner {
                    self.hull.push(self.vertices.len());
                    self.vertices.push(edge[k]);
                }
            }
        } else {
            self.hull.extend(0..nin);
        }

        // If the polygon minimum extent is small (sliver or small triangle), do not try to add internal points.
        if min_extent_squared < (sample_dist * 2.0) * (sample_dist * 2.0) {
            triangulate_hull(&self.vertices, &self.hull, nin, &mut self.triangles);
            return;
        }

        // Tessellate the base mesh.
        // We're using the triangulate_hull instead of delaunay_hull as it tends to
        // create a bit better triangulation for long thin triangles when there
        // are no internal points.
        triangulate_hull(&self.vertices, &self.hull, nin, &mut self.triangles);

        if self.triangles.is_empty() {
            // Could not triangulate the poly, make sure there is some valid data there.
            tracing::warn!(
                "Could not triangulate polygon ({} verts).",
                self.vertices.len()
            );
            return;
        }

        if sample_dist > 0.0 {
            self.collect_interior_samples(input, sample_dist, ics, ch, height_search_radius, patch);

            // Add the samples starting from the one that has the most
            // error. The procedure stops when all samples are added
            // or when the max error is within treshold.
            for _ in 0..self.samples.len() {
                if self.vertices.len() >= MAX_VERTS {
                    tracing::debug!(
                        "Detail polygon reached the vertex limit of {MAX_VERTS}, skipping remaining samples."
                    );
                    break;
                }

                // Find sample with most error.
                let mut best: Option<(usize, Vec3, f32)> = None;
                for (i, sample) in self.samples.iter().enumerate() {
                    if sample.added {
                        continue;
                    }
                    // The sample location is jittered to get rid of some bad triangulations
                    // which are cause by symmetrical data from the grid structure.
                    let pt = Vec3::new(
                        sample.x as f32 * sample_dist + jitter_x(i) * cs * 0.1,
                        sample.y as f32 * ch,
                        sample.z as f32 * sample_dist + jitter_z(i) * cs * 0.1,
                    );
                    let Some(d) = dist_to_tri_mesh(pt, &self.vertices, &self.triangles) else {
                        // did not hit the mesh.
                        continue;
                    };
                    if d > best.map_or(0.0, |(_, _, best_d)| best_d) {
                        best = Some((i, pt, d));
                    }
                }

                // If the max error is within accepted threshold, stop tesselating.
                let Some((best_i, best_pt, best_d)) = best else {
                    break;
                };
                if best_d <= sample_max_error {
                    break;
                }
                // Mark sample as added.
                self.samples[best_i].added = true;
                // Add the new sample point.
                self.vertices.push(best_pt);

                // TODO: insert the new point into the existing triangulation instead of rebuilding it.
                delaunay_hull(
                    &self.vertices,
                    &self.hull,
                    &mut self.triangles,
                    &mut self.edges,
                );
            }
        }

        if self.triangles.len() > MAX_TRIS {
            tracing::error!(
                "Shrinking detail triangle count from {} to max {MAX_TRIS}.",
                self.triangles.len()
            );
            self.triangles.truncate(MAX_TRIS);
        }
    }

    /// Creates sample locations in a grid, keeping only those well inside the polygon.
    fn collect_interior_samples(
        &mut self,
        input: &[Vec3],
        sample_dist: f32,
        ics: f32,
        ch: f32,
        height_search_radius: i32,
        patch: &HeightPatch,
    ) {
        let (min, max) = input
            .iter()
            .fold((input[0], input[0]), |(min, max), v| (min.min(*v), max.max(*v)));
        let x0 = (min.x / sample_dist).floor() as i32;
        let x1 = (max.x / sample_dist).ceil() as i32;
        let z0 = (min.z / sample_dist).floor() as i32;
        let z1 = (max.z / sample_dist).ceil() as i32;
        self.samples.clear();
        for z in z0..z1 {
            for x in x0..x1 {
                let pt = Vec3::new(
                    x as f32 * sample_dist,
                    (max.y + min.y) * 0.5,
                    z as f32 * sample_dist,
                );
                // Make sure the samples are not too close to the edges.
                // The distance is squared, so the margin is narrower than half a sample.
                if dist_to_poly(input, pt) > -sample_dist / 2.0 {
                    continue;
                }
                self.samples.push(Sample {
                    x,
                    y: patch.height_at(pt, ics, ch, height_search_radius),
                    z,
                    added: false,
                });
            }
        }
    }
}

/// Deterministic pseudo random offset in `[-1, 1]` for sample `i` along the x-axis.
fn jitter_x(i: usize) -> f32 {
    ((i as u32).wrapping_mul(0x8da6_b343) & 0xffff) as f32 / 65535.0 * 2.0 - 1.0
}

/// Deterministic pseudo random offset in `[-1, 1]` for sample `i` along the z-axis.
fn jitter_z(i: usize) -> f32 {
    ((i as u32).wrapping_mul(0xd816_3841) & 0xffff) as f32 / 65535.0 * 2.0 - 1.0
}

fn distance_squared_point_segment_3d(pt: Vec3, p: Vec3, q: Vec3) -> f32 {
    let pq = q - p;
    let d = pq.length_squared();
    let mut t = pq.dot(pt - p);
    if d > 0.0 {
        t /= d;
    }
    let t = t.clamp(0.0, 1.0);
    (p + pq * t - pt).length_squared()
}

/// Signed squared distance from `p` to the polygon outline on the xz-plane, negative inside.
fn dist_to_poly(vertices: &[Vec3], p: Vec3) -> f32 {
    let mut dmin = f32::MAX;
    let mut inside = false;
    for i in 0..vertices.len() {
        let vi = vertices[i];
        let vj = vertices[prev(i, vertices.len())];
        if (vi.z > p.z) != (vj.z > p.z)
            && p.x < (vj.x - vi.x) * (p.z - vi.z) / (vj.z - vi.z) + vi.x
        {
            inside = !inside;
        }
        dmin = dmin.min(distance_squared_point_segment_2d(p.xz(), vj.xz(), vi.xz()));
    }
    if inside { -dmin } else { dmin }
}

/// The smallest vertical distance from `p` to a triangle covering it on the xz-plane.
fn dist_to_tri_mesh(p: Vec3, vertices: &[Vec3], triangles: &[[usize; 3]]) -> Option<f32> {
    triangles
        .iter()
        .filter_map(|[a, b, c]| dist_pt_tri(p, vertices[*a], vertices[*b], vertices[*c]))
        .min_by(f32::total_cmp)
}

/// Vertical distance from point `p` to triangle `a, b, c`.
/// Returns `None` if the point is outside the triangle on the xz-plane.
fn dist_pt_tri(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.xz().dot(v0.xz());
    let dot01 = v0.xz().dot(v1.xz());
    let dot02 = v0.xz().dot(v2.xz());
    let dot11 = v1.xz().dot(v1.xz());
    let dot12 = v1.xz().dot(v2.xz());

    // Compute barycentric coordinates
    let inv_denom = 1.0 / (dot00 * dot11 - dot01 * dot01);
    let u = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let v = (dot00 * dot12 - dot01 * dot02) * inv_denom;

    // If point lies inside the triangle, return interpolated y-coord.
    const EPS: f32 = 1.0e-4;
    if u >= -EPS && v >= -EPS && (u + v) <= 1.0 + EPS {
        let y = a.y + v0.y * u + v1.y * v;
        Some((y - p.y).abs())
    } else {
        None
    }
}

/// Calculates the squared minimum extent of the polygon.
fn poly_min_extent_squared(vertices: &[Vec3]) -> f32 {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let p1 = vertices[i].xz();
            let p2 = vertices[next(i, n)].xz();
            (0..n)
                .filter(|j| *j != i && *j != next(i, n))
                .map(|j| distance_squared_point_segment_2d(vertices[j].xz(), p1, p2))
                .fold(0.0_f32, f32::max)
        })
        .fold(f32::MAX, f32::min)
}

/// Boundary flags of a detail triangle, see [`DETAIL_EDGE_BOUNDARY`].
fn boundary_flags([a, b, c]: [usize; 3], hull: &[usize]) -> u8 {
    let flag = |from: usize, to: usize| {
        if on_hull(from, to, hull) {
            DETAIL_EDGE_BOUNDARY
        } else {
            0
        }
    };
    flag(a, b) | flag(b, c) << 2 | flag(c, a) << 4
}

fn on_hull(a: usize, b: usize, hull: &[usize]) -> bool {
    // All internal sampled points come after the hull so we can early out for those.
    if a >= hull.len() || b >= hull.len() {
        return false;
    }
    (0..hull.len()).any(|i| a == hull[prev(i, hull.len())] && b == hull[i])
}

/// Triangulates the hull by walking left or right from the best starting ear.
fn triangulate_hull(vertices: &[Vec3], hull: &[usize], nin: usize, triangles: &mut Vec<[usize; 3]>) {
    let nhull = hull.len();
    if nhull < 3 {
        return;
    }
    let mut start = 0;
    let mut left = 1;
    let mut right = nhull - 1;

    // Start from an ear with shortest perimeter.
    // This tends to favor well formed triangles as starting point.
    let mut dmin = f32::MAX;
    for i in 0..nhull {
        if hull[i] >= nin {
            // Ears are triangles with original vertices as middle vertex while others are actually line segments on edges
            continue;
        }
        let pi = prev(i, nhull);
        let ni = next(i, nhull);
        let pv = vertices[hull[pi]].xz();
        let cv = vertices[hull[i]].xz();
        let nv = vertices[hull[ni]].xz();
        let d = pv.distance(cv) + cv.distance(nv) + nv.distance(pv);
        if d < dmin {
            start = i;
            left = ni;
            right = pi;
            dmin = d;
        }
    }

    // Add first triangle
    triangles.push([hull[start], hull[left], hull[right]]);

    // Triangulate the polygon by moving left or right,
    // depending on which triangle has shorter perimeter.
    // This heuristic was chose empirically, since it seems
    // handle tessellated straight edges well.
    while next(left, nhull) != right {
        // Check to see if se should advance left or right.
        let nleft = next(left, nhull);
        let nright = prev(right, nhull);

        let cvleft = vertices[hull[left]].xz();
        let nvleft = vertices[hull[nleft]].xz();
        let cvright = vertices[hull[right]].xz();
        let nvright = vertices[hull[nright]].xz();
        let dleft = cvleft.distance(nvleft) + nvleft.distance(cvright);
        let dright = cvright.distance(nvright) + cvleft.distance(nvright);
        if dleft < dright {
            triangles.push([hull[left], hull[nleft], hull[right]]);
            left = nleft;
        } else {
            triangles.push([hull[left], hull[nright], hull[right]]);
            right = nright;
        }
    }
}

/// The face on one side of a [`DelaunayEdge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Undefined,
    Hull,
    Triangle(usize),
}

#[derive(Debug, Clone, Copy)]
struct DelaunayEdge {
    s: usize,
    t: usize,
    /// The face to the left of `s -> t`.
    left: Face,
    /// The face to the left of `t -> s`.
    right: Face,
}

/// Delaunay triangulation of `points` constrained to the given hull.
fn delaunay_hull(
    points: &[Vec3],
    hull: &[usize],
    triangles: &mut Vec<[usize; 3]>,
    edges: &mut Vec<DelaunayEdge>,
) {
    edges.clear();
    triangles.clear();
    let max_edges = points.len() * 10;
    let mut face_count = 0;

    for i in 0..hull.len() {
        let j = prev(i, hull.len());
        add_edge(edges, max_edges, hull[j], hull[i], Face::Hull, Face::Undefined);
    }

    let mut current_edge = 0;
    while current_edge < edges.len() {
        if edges[current_edge].left == Face::Undefined {
            complete_facet(points, edges, max_edges, &mut face_count, current_edge);
        }
        if edges[current_edge].right == Face::Undefined {
            complete_facet(points, edges, max_edges, &mut face_count, current_edge);
        }
        current_edge += 1;
    }

    // Create tris
    let mut faces = vec![[None; 3]; face_count];
    for edge in edges.iter() {
        if let Face::Triangle(f) = edge.right {
            let face = &mut faces[f];
            if face[0].is_none() {
                face[0] = Some(edge.s);
                face[1] = Some(edge.t);
            } else if face[0] == Some(edge.t) {
                face[2] = Some(edge.s);
            } else if face[1] == Some(edge.s) {
                face[2] = Some(edge.t);
            }
        }
        if let Face::Triangle(f) = edge.left {
            let face = &mut faces[f];
            if face[0].is_none() {
                face[0] = Some(edge.t);
                face[1] = Some(edge.s);
            } else if face[0] == Some(edge.s) {
                face[2] = Some(edge.t);
            } else if face[1] == Some(edge.t) {
                face[2] = Some(edge.s);
            }
        }
    }

    let mut i = 0;
    while i < faces.len() {
        if faces[i].iter().all(Option::is_some) {
            i += 1;
            continue;
        }
        tracing::warn!("Removing dangling face {i} {:?}.", faces[i]);
        faces.swap_remove(i);
    }
    triangles.extend(
        faces
            .iter()
            .filter_map(|[a, b, c]| Some([(*a)?, (*b)?, (*c)?])),
    );
}

fn complete_facet(
    points: &[Vec3],
    edges: &mut Vec<DelaunayEdge>,
    max_edges: usize,
    face_count: &mut usize,
    e: usize,
) {
    const EPS: f32 = 1.0e-5;
    const TOLERANCE: f32 = 0.001;

    let edge = edges[e];
    // Cache s and t.
    let (s, t) = if edge.left == Face::Undefined {
        (edge.s, edge.t)
    } else if edge.right == Face::Undefined {
        (edge.t, edge.s)
    } else {
        // Edge already completed.
        return;
    };

    // Find best point on left of edge.
    let mut best = None;
    let mut center = Vec3::ZERO;
    let mut radius = -1.0;
    for u in 0..points.len() {
        if u == s || u == t {
            continue;
        }
        if cross_2d(points[s], points[t], points[u]) <= EPS {
            continue;
        }
        if radius < 0.0 {
            // The circle is not updated yet, do it now.
            best = Some(u);
            (center, radius) = circum_circle(points[s], points[t], points[u]);
            continue;
        }
        let d = center.xz().distance(points[u].xz());
        if d > radius * (1.0 + TOLERANCE) {
            // Outside current circumcircle, skip.
            continue;
        }
        if d >= radius * (1.0 - TOLERANCE) {
            // Inside epsilon circumcircle, do extra tests to make sure the edge is valid.
            // s-u and t-u cannot overlap with s-pt nor t-pt if they exists.
            if overlaps_edges(points, edges, s, u) || overlaps_edges(points, edges, t, u) {
                continue;
            }
        }
        best = Some(u);
        (center, radius) = circum_circle(points[s], points[t], points[u]);
    }

    // Add new triangle or update edge info if s-t is on hull.
    let Some(pt) = best else {
        update_left_face(&mut edges[e], s, t, Face::Hull);
        return;
    };
    let face = Face::Triangle(*face_count);
    // Update face information of edge being completed.
    update_left_face(&mut edges[e], s, t, face);

    // Add new edge or update face info of old edge.
    match find_edge(edges, pt, s) {
        Some(e) => update_left_face(&mut edges[e], pt, s, face),
        None => add_edge(edges, max_edges, pt, s, face, Face::Undefined),
    }
    match find_edge(edges, t, pt) {
        Some(e) => update_left_face(&mut edges[e], t, pt, face),
        None => add_edge(edges, max_edges, t, pt, face, Face::Undefined),
    }
    *face_count += 1;
}

fn find_edge(edges: &[DelaunayEdge], s: usize, t: usize) -> Option<usize> {
    edges
        .iter()
        .position(|e| (e.s == s && e.t == t) || (e.s == t && e.t == s))
}

fn add_edge(
    edges: &mut Vec<DelaunayEdge>,
    max_edges: usize,
    s: usize,
    t: usize,
    left: Face,
    right: Face,
) {
    if edges.len() >= max_edges {
        tracing::error!("Too many detail edges ({}/{max_edges}).", edges.len());
        return;
    }
    // Add edge if not already in the triangulation.
    if find_edge(edges, s, t).is_none() {
        edges.push(DelaunayEdge { s, t, left, right });
    }
}

fn update_left_face(edge: &mut DelaunayEdge, s: usize, t: usize, face: Face) {
    if edge.s == s && edge.t == t && edge.left == Face::Undefined {
        edge.left = face;
    } else if edge.t == s && edge.s == t && edge.right == Face::Undefined {
        edge.right = face;
    }
}

fn overlaps_edges(points: &[Vec3], edges: &[DelaunayEdge], s1: usize, t1: usize) -> bool {
    edges.iter().any(|edge| {
        let (s0, t0) = (edge.s, edge.t);
        // Same or connected edges do not overlap.
        if s0 == s1 || s0 == t1 || t0 == s1 || t0 == t1 {
            return false;
        }
        overlap_seg_seg_2d(points[s0], points[t0], points[s1], points[t1])
    })
}

fn overlap_seg_seg_2d(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> bool {
    let a1 = cross_2d(a, b, d);
    let a2 = cross_2d(a, b, c);
    if a1 * a2 < 0.0 {
        let a3 = cross_2d(c, d, a);
        let a4 = a3 + a2 - a1;
        if a3 * a4 < 0.0 {
            return true;
        }
    }
    false
}

fn cross_2d(p1: Vec3, p2: Vec3, p3: Vec3) -> f32 {
    let u1 = p2.x - p1.x;
    let v1 = p2.z - p1.z;
    let u2 = p3.x - p1.x;
    let v2 = p3.z - p1.z;
    u1 * v2 - v1 * u2
}

/// The circumcircle of `p1, p2, p3` on the xz-plane. Collinear points give a circle of radius 0 at `p1`.
fn circum_circle(p1: Vec3, p2: Vec3, p3: Vec3) -> (Vec3, f32) {
    const EPS: f32 = 1.0e-6;
    // Calculate the circle relative to p1, to avoid some precision issues.
    let v1 = Vec3::ZERO;
    let v2 = p2 - p1;
    let v3 = p3 - p1;

    let cp = cross_2d(v1, v2, v3);
    if cp.abs() <= EPS {
        return (p1, 0.0);
    }
    let v1_sq = v1.xz().length_squared();
    let v2_sq = v2.xz().length_squared();
    let v3_sq = v3.xz().length_squared();
    let center = Vec3::new(
        (v1_sq * (v2.z - v3.z) + v2_sq * (v3.z - v1.z) + v3_sq * (v1.z - v2.z)) / (2.0 * cp),
        0.0,
        (v1_sq * (v3.x - v2.x) + v2_sq * (v1.x - v3.x) + v3_sq * (v2.x - v1.x)) / (2.0 * cp),
    );
    let radius = center.xz().distance(v1.xz());
    (center + p1, radius)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    xmin: i32,
    xmax: i32,
    zmin: i32,
    zmax: i32,
}

/// Heights of the compact heightfield below one polygon, in voxel units.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct HeightPatch {
    data: Vec<u16>,
    xmin: i32,
    zmin: i32,
    width: i32,
    height: i32,
}

impl HeightPatch {
    fn reset(&mut self, bounds: &Bounds) {
        self.xmin = bounds.xmin;
        self.zmin = bounds.zmin;
        self.width = (bounds.xmax - bounds.xmin).max(0);
        self.height = (bounds.zmax - bounds.zmin).max(0);
        self.data.clear();
        self.data
            .resize(self.width as usize * self.height as usize, UNSET_HEIGHT);
    }

    #[inline]
    fn index(&self, x: i32, z: i32) -> usize {
        (x + z * self.width) as usize
    }

    #[inline]
    fn contains(&self, x: i32, z: i32) -> bool {
        (0..self.width).contains(&x) && (0..self.height).contains(&z)
    }

    /// Copies the heights reachable from the polygon's region into the patch.
    ///
    /// Reads to the compact heightfield are offset by `bs`, since the border size offset
    /// is already removed from the polygon mesh vertices.
    fn fill(
        &mut self,
        chf: &CompactHeightfield,
        polygon: &[u16],
        vertices: &[U16Vec3],
        bs: i32,
        region: RegionId,
        queue: &mut VecDeque<(i32, i32, usize)>,
    ) {
        queue.clear();
        self.data.fill(UNSET_HEIGHT);

        let mut empty = true;

        // We cannot sample from this poly if it was created from polys
        // of different regions. If it was then it could potentially be overlapping
        // with polys of that region and the heights sampled here could be wrong.
        if region != RegionId::NONE {
            // Copy the height from the same region, and mark region borders
            // as seed points to fill the rest.
            for hz in 0..self.height {
                let z = self.zmin + hz + bs;
                for hx in 0..self.width {
                    let x = self.xmin + hx + bs;
                    let cell = chf.cell_at(x as u16, z as u16);
                    let Some(i) = cell
                        .index_range()
                        .find(|i| chf.spans[*i].region == region)
                    else {
                        continue;
                    };
                    let index = self.index(hx, hz);
                    self.data[index] = chf.spans[i].y;
                    empty = false;

                    // If any of the neighbours is not in same region,
                    // add the current location as flood fill start
                    let border = (0..4).any(|dir| {
                        chf.neighbor_index(x, z, i, dir)
                            .is_some_and(|a_i| chf.spans[a_i].region != region)
                    });
                    if border {
                        queue.push_back((x, z, i));
                    }
                }
            }
        }

        // if the polygon does not contain any points from the current region (rare, but happens)
        // or if it could potentially be overlapping polygons of the same region,
        // then use the center as the seed point.
        if empty {
            self.seed_with_polygon_center(chf, polygon, vertices, bs, queue);
        }

        // We assume the seed is centered in the polygon, so a BFS to collect
        // height data will ensure we do not move onto overlapping polygons and
        // sample wrong heights.
        while let Some((cx, cz, ci)) = queue.pop_front() {
            for dir in 0..4 {
                let Some(con) = chf.spans[ci].con(dir) else {
                    continue;
                };
                let ax = cx + dir_offset_x(dir) as i32;
                let az = cz + dir_offset_z(dir) as i32;
                let hx = ax - self.xmin - bs;
                let hz = az - self.zmin - bs;
                if !self.contains(hx, hz) {
                    continue;
                }
                let index = self.index(hx, hz);
                if self.data[index] != UNSET_HEIGHT {
                    continue;
                }
                let (ax, az, ai) = chf.con_indices(cx, cz, dir, con);
                self.data[index] = chf.spans[ai].y;
                queue.push_back((ax, az, ai));
            }
        }
    }

    /// Walks from the span closest to a polygon vertex towards the polygon's center and seeds `queue`
    /// with the span found there.
    fn seed_with_polygon_center(
        &mut self,
        chf: &CompactHeightfield,
        polygon: &[u16],
        vertices: &[U16Vec3],
        bs: i32,
        queue: &mut VecDeque<(i32, i32, usize)>,
    ) {
        const OFFSET: [(i32, i32); 9] = [
            (0, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
        ];

        // Find cell closest to a poly vertex
        let mut start = None;
        let mut dmin = UNSET_HEIGHT as i32;
        'search: for vertex in polygon.iter().map(|v| vertices[*v as usize]) {
            for (offset_x, offset_z) in OFFSET {
                let ax = vertex.x as i32 + offset_x;
                let ay = vertex.y as i32;
                let az = vertex.z as i32 + offset_z;
                if !self.contains(ax - self.xmin, az - self.zmin) {
                    continue;
                }
                let cell = chf.cell_at((ax + bs) as u16, (az + bs) as u16);
                for i in cell.index_range() {
                    let d = (ay - chf.spans[i].y as i32).abs();
                    if d < dmin {
                        start = Some((ax, az, i));
                        dmin = d;
                    }
                    if dmin <= 0 {
                        break 'search;
                    }
                }
            }
        }
        let Some(start) = start else {
            tracing::warn!("Found no span near the polygon to seed the height patch from.");
            return;
        };

        // Find center of the polygon
        let (pcx, pcz) = polygon
            .iter()
            .map(|v| vertices[*v as usize])
            .fold((0, 0), |(x, z), v| (x + v.x as i32, z + v.z as i32));
        let pcx = pcx / polygon.len() as i32;
        let pcz = pcz / polygon.len() as i32;

        // DFS to move to the center. Note that we need a DFS here and can not just move
        // directly towards the center without recording intermediate nodes, even though the polygons
        // are convex. In very rare we can get stuck due to contour simplification if we do not
        // record nodes.
        let mut stack = vec![start];
        let mut dirs = [0, 1, 2, 3];
        self.data.fill(0);
        let (mut cx, mut cz, mut ci) = start;
        loop {
            let Some(current) = stack.pop() else {
                tracing::warn!("Walk towards polygon center failed to reach center");
                break;
            };
            (cx, cz, ci) = current;
            if cx == pcx && cz == pcz {
                break;
            }

            // If we are already at the correct X-position, prefer direction
            // directly towards the center in the Y-axis; otherwise prefer
            // direction in the X-axis
            let direct_dir = if cx == pcx {
                dir_for_offset(0, if pcz > cz { 1 } else { -1 })
            } else {
                dir_for_offset(if pcx > cx { 1 } else { -1 }, 0)
            }
            .map_or(3, usize::from);

            // Push the direct dir last so we start with this on next iteration
            dirs.swap(direct_dir, 3);
            for dir in dirs {
                let Some(con) = chf.spans[ci].con(dir) else {
                    continue;
                };
                let new_x = cx + dir_offset_x(dir) as i32;
                let new_z = cz + dir_offset_z(dir) as i32;
                let hpx = new_x - self.xmin;
                let hpz = new_z - self.zmin;
                if !self.contains(hpx, hpz) {
                    continue;
                }
                let index = self.index(hpx, hpz);
                if self.data[index] != 0 {
                    continue;
                }
                self.data[index] = 1;
                let (_, _, new_index) = chf.con_indices(cx + bs, cz + bs, dir, con);
                stack.push((new_x, new_z, new_index));
            }
            dirs.swap(direct_dir, 3);
        }

        // The fill seeds are given in coordinates with borders
        queue.clear();
        queue.push_back((cx + bs, cz + bs, ci));
        self.data.fill(UNSET_HEIGHT);
        let index = self.index(cx - self.xmin, cz - self.zmin);
        self.data[index] = chf.spans[ci].y;
    }

    /// The height below `position`, searching outwards in a spiral of up to `radius` cells
    /// when the cell itself has no height.
    fn height_at(&self, position: Vec3, ics: f32, ch: f32, radius: i32) -> u16 {
        if self.data.is_empty() {
            return UNSET_HEIGHT;
        }
        let ix = (position.x * ics + 0.01).floor() as i32;
        let iz = (position.z * ics + 0.01).floor() as i32;
        let ix = (ix - self.xmin).clamp(0, self.width - 1);
        let iz = (iz - self.zmin).clamp(0, self.height - 1);
        let mut h = self.data[self.index(ix, iz)];
        if h != UNSET_HEIGHT {
            return h;
        }

        // Special case when data might be bad.
        // Walk adjacent cells in a spiral up to 'radius', and look
        // for a pixel which has a valid height.
        let mut x = 1;
        let mut z = 0;
        let mut dx = 1;
        let mut dz = 0;
        let max_size = radius * 2 + 1;
        let max_iter = max_size * max_size - 1;

        let mut next_ring_iter_start = 8;
        let mut next_ring_iters = 16;

        let mut dmin = f32::MAX;
        for i in 0..max_iter {
            let nx = ix + x;
            let nz = iz + z;
            if self.contains(nx, nz) {
                let nh = self.data[self.index(nx, nz)];
                if nh != UNSET_HEIGHT {
                    let d = (nh as f32 * ch - position.y).abs();
                    if d < dmin {
                        h = nh;
                        dmin = d;
                    }
                }
            }
            // We are searching in a grid which looks approximately like this:
            //  __________
            // |2 ______ 2|
            // | |1 __ 1| |
            // | | |__| | |
            // | |______| |
            // |__________|
            // We want to find the best height as close to the center cell as possible. This means that
            // if we find a height in one of the neighbor cells to the center, we don't want to
            // expand further out than the 8 neighbors - we want to limit our search to the closest
            // of these "rings", but the best height in the ring.
            // For example, the center is just 1 cell. We checked that at the entrance to the function.
            // The next "ring" contains 8 cells (marked 1 above). Those are all the neighbors to the center cell.
            // The next one again contains 16 cells (marked 2). In general each ring has 8 additional cells, which
            // can be thought of as adding 2 cells around the "center" of each side when we expand the ring.
            // Here we detect if we are about to enter the next ring, and if we are and we have found
            // a height, we abort the search.
            if i + 1 == next_ring_iter_start {
                if h != UNSET_HEIGHT {
                    break;
                }
                next_ring_iter_start += next_ring_iters;
                next_ring_iters += 8;
            }

            if x == z || (x < 0 && x == -z) || (x > 0 && x == 1 - z) {
                (dx, dz) = (-dz, dx);
            }
            x += dx;
            z += dz;
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        AreaType, BuildContoursFlags,
        test_util::{flat_compact_heightfield, grid_heightfield},
    };

    fn build(chf: &mut CompactHeightfield) -> PolygonNavmesh {
        chf.build_distance_field();
        chf.build_regions(0, 8, 20).unwrap();
        chf.build_contours(1.3, 0, BuildContoursFlags::default())
            .into_polygon_mesh(6)
            .unwrap()
    }

    #[test]
    fn flat_square_keeps_polygon_corners() {
        let mut chf = flat_compact_heightfield(10);
        let mesh = build(&mut chf);
        let detail = DetailNavmesh::new(&mesh, &chf, 0.0, 1.0).unwrap();

        assert_eq!(detail.meshes.len(), 1);
        assert_eq!(
            detail.meshes[0],
            SubMesh {
                base_vertex_index: 0,
                vertex_count: 4,
                base_triangle_index: 0,
                triangle_count: 2,
            }
        );
        assert_eq!(detail.triangles.len(), detail.triangle_flags.len());
        for flags in &detail.triangle_flags {
            // Two edges of each triangle lie on the quad, the third is the diagonal.
            assert_eq!(flags.count_ones(), 2);
        }
        for vertex in &detail.vertices {
            assert_relative_eq!(vertex.y, 2.0);
        }
    }

    #[test]
    fn flat_ground_needs_no_samples() {
        let mut chf = flat_compact_heightfield(10);
        let mesh = build(&mut chf);
        let detail = DetailNavmesh::new(&mesh, &chf, 2.0, 0.5).unwrap();
        assert_eq!(detail.vertices.len(), 4);
        for vertex in &detail.vertices {
            assert_relative_eq!(vertex.y, 2.0);
        }
    }

    #[test]
    fn stairs_get_extra_detail_vertices() {
        let mut chf = grid_heightfield(10, 10, |x, _| Some(1 + x / 3))
            .into_compact(2, 1)
            .unwrap();
        let mesh = build(&mut chf);
        let detail = DetailNavmesh::new(&mesh, &chf, 1.0, 0.1).unwrap();

        let polygon_vertices: usize = (0..mesh.polygon_count())
            .map(|i| mesh.polygon_vertices(i).len())
            .sum();
        assert_eq!(detail.meshes.len(), mesh.polygon_count());
        assert!(detail.vertices.len() > polygon_vertices);
        for vertex in &detail.vertices {
            assert!((2.0 - 1.0e-4..=5.0 + 1.0e-4).contains(&vertex.y), "{vertex}");
        }
        for (sub_mesh_index, sub_mesh) in detail.meshes.iter().enumerate() {
            assert!(sub_mesh.vertex_count as usize <= MAX_VERTS);
            assert!(sub_mesh.triangle_count as usize <= MAX_TRIS);
            let triangles = &detail.triangles[sub_mesh.base_triangle_index as usize..]
                [..sub_mesh.triangle_count as usize];
            for triangle in triangles {
                assert!(
                    triangle.iter().all(|v| (*v as u32) < sub_mesh.vertex_count),
                    "sub mesh {sub_mesh_index} has a triangle outside its vertices"
                );
            }
        }
    }

    #[test]
    fn mismatched_heightfield_is_rejected() {
        let mut chf = flat_compact_heightfield(10);
        let mut mesh = build(&mut chf);
        mesh.border_size = 3;
        assert_eq!(
            DetailNavmesh::new(&mesh, &chf, 0.0, 1.0),
            Err(DetailNavmeshError::BorderSizeMismatch {
                mesh: 3,
                heightfield: 0
            })
        );
    }

    #[test]
    fn empty_mesh_gives_empty_detail() {
        let chf = flat_compact_heightfield(4);
        let detail = DetailNavmesh::new(&PolygonNavmesh::default(), &chf, 1.0, 1.0).unwrap();
        assert_eq!(detail, DetailNavmesh::default());
    }

    #[test]
    fn jitter_is_deterministic_and_bounded() {
        assert_eq!(jitter_x(0), -1.0);
        assert_eq!(jitter_z(0), -1.0);
        for i in 0..1000 {
            assert_eq!(jitter_x(i), jitter_x(i));
            assert!((-1.0..=1.0).contains(&jitter_x(i)));
            assert!((-1.0..=1.0).contains(&jitter_z(i)));
        }
        assert_ne!(jitter_x(1), jitter_z(1));
    }

    #[test]
    fn delaunay_connects_interior_point_to_every_hull_edge() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(5.0, 1.0, 5.0),
        ];
        let mut triangles = Vec::new();
        let mut edges = Vec::new();
        delaunay_hull(&points, &[0, 1, 2, 3], &mut triangles, &mut edges);
        assert_eq!(triangles.len(), 4);
        assert!(triangles.iter().all(|triangle| triangle.contains(&4)));

        delaunay_hull(&points[..4], &[0, 1, 2, 3], &mut triangles, &mut edges);
        assert_eq!(triangles.len(), 2);
    }

    #[test]
    fn triangulated_hull_flags_its_outline() {
        let vertices = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
        ];
        let hull = [0, 1, 2, 3];
        let mut triangles = Vec::new();
        triangulate_hull(&vertices, &hull, 4, &mut triangles);
        assert_eq!(triangles.len(), 2);
        let flags: Vec<_> = triangles.iter().map(|t| boundary_flags(*t, &hull)).collect();
        assert!(flags.iter().all(|f| f.count_ones() == 2));
    }

    #[test]
    fn height_lookup_spirals_to_the_nearest_height() {
        let mut patch = HeightPatch::default();
        patch.reset(&Bounds {
            xmin: 0,
            xmax: 3,
            zmin: 0,
            zmax: 3,
        });
        let index = patch.index(2, 1);
        patch.data[index] = 7;
        assert_eq!(patch.height_at(Vec3::new(1.5, 7.0, 1.5), 1.0, 1.0, 1), 7);
        assert_eq!(patch.height_at(Vec3::new(2.5, 0.0, 1.5), 1.0, 1.0, 1), 7);
    }

    #[test]
    fn polygon_center_seeds_the_patch_without_a_region() {
        let chf = flat_compact_heightfield(6);
        let vertices = [
            U16Vec3::new(0, 1, 0),
            U16Vec3::new(0, 1, 6),
            U16Vec3::new(6, 1, 6),
            U16Vec3::new(6, 1, 0),
        ];
        let mut patch = HeightPatch::default();
        patch.reset(&Bounds {
            xmin: 0,
            xmax: 6,
            zmin: 0,
            zmax: 6,
        });
        let mut queue = VecDeque::new();
        patch.fill(&chf, &[0, 1, 2, 3], &vertices, 0, RegionId::from(1), &mut queue);
        assert!(patch.data.iter().all(|h| *h == 1));
        assert_eq!(chf.areas[0], AreaType::DEFAULT_WALKABLE);
    }
}
