use std::collections::HashMap;

use glam::{IVec2, U16Vec3};
use thiserror::Error;

use crate::{
    Aabb3d, AreaType, RegionId,
    contours::{ContourSet, RegionVertexId},
    math::{intersect, intersect_prop, left, left_on, next, prev, xz},
};

/// Marks unused vertex slots and edges without a neighbor in a [`PolygonNavmesh`].
pub const MESH_NULL_IDX: u16 = 0xffff;

/// The largest supported value for the maximum number of vertices per polygon.
pub const MAX_VERTICES_PER_POLYGON: u16 = 6;

/// Set in a neighbor slot of a [`PolygonNavmesh`] when the edge lies on the border of the
/// heightfield. The low bits hold the direction of the border, see [`PolygonNavmesh::polygon_neighbors`].
pub const PORTAL_EDGE_FLAG: u16 = 0x8000;

/// Represents a polygon mesh suitable for use in building a navigation mesh.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PolygonNavmesh {
    /// The mesh vertices in voxel units, relative to [`Self::aabb`].
    pub vertices: Vec<U16Vec3>,
    /// Polygon vertex indices. Each polygon occupies [`Self::max_vertices_per_polygon`] slots,
    /// unused slots are [`MESH_NULL_IDX`].
    pub polygons: Vec<u16>,
    /// For each slot in [`Self::polygons`], the polygon on the other side of the edge starting at that vertex.
    ///
    /// [`MESH_NULL_IDX`] marks solid edges. Edges on the heightfield border are stored as
    /// [`PORTAL_EDGE_FLAG`] `| dir`, where `dir` is 0 for -x, 1 for +z, 2 for +x and 3 for -z.
    pub polygon_neighbors: Vec<u16>,
    /// The region id assigned to each polygon. [`RegionId::NONE`] if it spans multiple regions.
    pub regions: Vec<RegionId>,
    /// User defined flags for each polygon.
    pub flags: Vec<u16>,
    /// The area id assigned to each polygon.
    pub areas: Vec<AreaType>,
    /// The maximum number of vertices per polygon
    pub max_vertices_per_polygon: u16,
    /// The bounding box of the mesh in world space.
    pub aabb: Aabb3d,
    /// The size of each cell. (On the xz-plane.)
    pub cell_size: f32,
    /// The height of each cell. (The minimum increment along the y-axis.)
    pub cell_height: f32,
    /// The AABB border size used to generate the source data from which the mesh was derived.
    pub border_size: u16,
    /// The max error of the polygon edges in the mesh.
    pub max_edge_error: f32,
}

impl PolygonNavmesh {
    /// The number of polygons in the mesh.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.regions.len()
    }

    /// The vertex slots of the polygon at `index`, including trailing [`MESH_NULL_IDX`] slots.
    #[inline]
    pub fn polygon_slots(&self, index: usize) -> &[u16] {
        let nvp = self.max_vertices_per_polygon as usize;
        &self.polygons[index * nvp..(index + 1) * nvp]
    }

    /// The vertex indices of the polygon at `index`.
    #[inline]
    pub fn polygon_vertices(&self, index: usize) -> &[u16] {
        let slots = self.polygon_slots(index);
        let count = slots.iter().take_while(|v| **v != MESH_NULL_IDX).count();
        &slots[..count]
    }

    /// The neighbor slots of the polygon at `index`, parallel to [`Self::polygon_slots`].
    #[inline]
    pub fn neighbor_slots(&self, index: usize) -> &[u16] {
        let nvp = self.max_vertices_per_polygon as usize;
        &self.polygon_neighbors[index * nvp..(index + 1) * nvp]
    }
}

impl ContourSet {
    /// Builds a polygon mesh from the provided contours.
    ///
    /// Each contour is triangulated, then the triangles are greedily merged into convex polygons
    /// with at most `max_vertices_per_polygon` vertices.
    ///
    /// # Arguments
    ///
    /// - `max_vertices_per_polygon` - The maximum number of vertices allowed for polygons
    ///   generated during the contour to polygon conversion process. [Limit: 3..=[`MAX_VERTICES_PER_POLYGON`]]
    pub fn into_polygon_mesh(
        self,
        max_vertices_per_polygon: u16,
    ) -> Result<PolygonNavmesh, PolygonMeshError> {
        if !(3..=MAX_VERTICES_PER_POLYGON).contains(&max_vertices_per_polygon) {
            return Err(PolygonMeshError::InvalidVerticesPerPolygon(
                max_vertices_per_polygon,
            ));
        }
        let nvp = max_vertices_per_polygon as usize;

        let max_vertices: usize = self
            .contours
            .iter()
            .map(|contour| contour.vertices.len())
            .filter(|len| *len >= 3)
            .sum();
        if max_vertices >= MESH_NULL_IDX as usize - 1 {
            return Err(PolygonMeshError::TooManyVertices(max_vertices));
        }

        let mut vertices = Vec::with_capacity(max_vertices);
        let mut lookup = VertexLookup::default();
        let mut remove_candidates = Vec::with_capacity(max_vertices);
        let mut polygons = Vec::new();

        for (i, contour) in self.contours.iter().enumerate() {
            // Skip null contours.
            if contour.vertices.len() < 3 {
                continue;
            }

            let points: Vec<_> = contour.vertices.iter().map(|v| xz(v.position)).collect();
            let triangulation = triangulate(&points);
            if !triangulation.complete {
                tracing::warn!("Bad triangulation of contour {i}, keeping the partial result.");
            }

            // Add and merge vertices.
            let indices: Vec<u16> = contour
                .vertices
                .iter()
                .map(|vertex| {
                    let index = lookup.add(vertex.position, &mut vertices);
                    if remove_candidates.len() < vertices.len() {
                        remove_candidates.push(false);
                    }
                    if vertex.region.contains(RegionVertexId::BORDER_VERTEX) {
                        // This vertex should be removed.
                        remove_candidates[index as usize] = true;
                    }
                    index
                })
                .collect();

            // Build initial polygons.
            let mut contour_polygons: Vec<_> = triangulation
                .triangles
                .iter()
                .filter(|[a, b, c]| a != b && a != c && b != c)
                .map(|triangle| BuildPolygon {
                    vertices: triangle.iter().map(|t| indices[*t]).collect(),
                    region: contour.region,
                    area: contour.area,
                })
                .collect();
            if contour_polygons.is_empty() {
                continue;
            }

            merge_polygons(&mut contour_polygons, &vertices, nvp);
            polygons.extend(contour_polygons);
        }

        // Remove edge vertices.
        let mut i = 0;
        while i < vertices.len() {
            if !remove_candidates[i] {
                i += 1;
                continue;
            }
            let rem = i as u16;
            if !can_remove_vertex(&polygons, rem) {
                i += 1;
                continue;
            }
            remove_vertex(&mut vertices, &mut polygons, rem, nvp);
            // The vertices after `rem` moved down by one.
            remove_candidates.remove(i);
        }

        if polygons.len() >= MESH_NULL_IDX as usize {
            return Err(PolygonMeshError::TooManyPolygons(polygons.len()));
        }

        let mut mesh = PolygonNavmesh {
            vertices,
            polygons: Vec::with_capacity(polygons.len() * nvp),
            polygon_neighbors: vec![MESH_NULL_IDX; polygons.len() * nvp],
            regions: Vec::with_capacity(polygons.len()),
            flags: vec![0; polygons.len()],
            areas: Vec::with_capacity(polygons.len()),
            max_vertices_per_polygon,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            border_size: self.border_size,
            max_edge_error: self.max_error,
        };
        for polygon in polygons {
            let padding = nvp - polygon.vertices.len();
            mesh.polygons.extend(polygon.vertices);
            mesh.polygons
                .extend(std::iter::repeat_n(MESH_NULL_IDX, padding));
            mesh.regions.push(polygon.region);
            mesh.areas.push(polygon.area);
        }

        mesh.build_adjacency();
        if self.border_size > 0 {
            mesh.mark_portal_edges(self.width, self.height);
        }

        Ok(mesh)
    }
}

impl PolygonNavmesh {
    /// Connects every pair of polygons that share an edge.
    fn build_adjacency(&mut self) {
        let nvp = self.max_vertices_per_polygon as usize;
        let mut edges: Vec<Edge> = Vec::with_capacity(self.polygons.len());
        let mut edges_by_vertices: HashMap<(u16, u16), Vec<usize>> = HashMap::new();

        for i in 0..self.polygon_count() {
            let polygon = self.polygon_vertices(i);
            for j in 0..polygon.len() {
                let v0 = polygon[j];
                let v1 = polygon[next(j, polygon.len())];
                if v0 < v1 {
                    edges_by_vertices
                        .entry((v0, v1))
                        .or_default()
                        .push(edges.len());
                    edges.push(Edge {
                        polygons: [i, i],
                        polygon_edges: [j, 0],
                    });
                }
            }
        }

        for i in 0..self.polygon_count() {
            let polygon = self.polygon_vertices(i);
            for j in 0..polygon.len() {
                let v0 = polygon[j];
                let v1 = polygon[next(j, polygon.len())];
                if v0 <= v1 {
                    continue;
                }
                let Some(candidates) = edges_by_vertices.get(&(v1, v0)) else {
                    continue;
                };
                if let Some(e) = candidates
                    .iter()
                    .copied()
                    .find(|e| edges[*e].polygons[0] == edges[*e].polygons[1])
                {
                    edges[e].polygons[1] = i;
                    edges[e].polygon_edges[1] = j;
                }
            }
        }

        for edge in &edges {
            if edge.polygons[0] != edge.polygons[1] {
                let [p0, p1] = edge.polygons;
                let [e0, e1] = edge.polygon_edges;
                self.polygon_neighbors[p0 * nvp + e0] = p1 as u16;
                self.polygon_neighbors[p1 * nvp + e1] = p0 as u16;
            }
        }
    }

    /// Flags open edges that lie on the border of a heightfield built with a border size.
    fn mark_portal_edges(&mut self, width: u16, height: u16) {
        let nvp = self.max_vertices_per_polygon as usize;
        for i in 0..self.polygon_count() {
            let count = self.polygon_vertices(i).len();
            for j in 0..count {
                // Skip connected edges.
                if self.polygon_neighbors[i * nvp + j] != MESH_NULL_IDX {
                    continue;
                }
                let va = self.vertices[self.polygons[i * nvp + j] as usize];
                let vb = self.vertices[self.polygons[i * nvp + next(j, count)] as usize];
                let side = if va.x == 0 && vb.x == 0 {
                    0
                } else if va.z == height && vb.z == height {
                    1
                } else if va.x == width && vb.x == width {
                    2
                } else if va.z == 0 && vb.z == 0 {
                    3
                } else {
                    continue;
                };
                self.polygon_neighbors[i * nvp + j] = PORTAL_EDGE_FLAG | side;
            }
        }
    }
}

/// Errors that can occur when building a [`PolygonNavmesh`] with [`ContourSet::into_polygon_mesh`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolygonMeshError {
    /// The requested polygon size is not supported.
    #[error(
        "The maximum number of vertices per polygon must lie in 3..={MAX_VERTICES_PER_POLYGON}, got {0}"
    )]
    InvalidVerticesPerPolygon(u16),
    /// The contours have more vertices than a 16 bit index can address.
    #[error("Too many vertices: {0}, at most {max} are supported", max = MESH_NULL_IDX - 2)]
    TooManyVertices(usize),
    /// More polygons were generated than a 16 bit index can address.
    #[error("Too many polygons: {0}, at most {max} are supported", max = MESH_NULL_IDX - 1)]
    TooManyPolygons(usize),
}

/// A polygon while the mesh is being assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildPolygon {
    vertices: Vec<u16>,
    region: RegionId,
    area: AreaType,
}

struct Edge {
    polygons: [usize; 2],
    polygon_edges: [usize; 2],
}

/// Deduplicates vertices that share a column and lie within 2 voxels of each other vertically.
#[derive(Default)]
struct VertexLookup {
    columns: HashMap<(u16, u16), Vec<u16>>,
}

impl VertexLookup {
    fn add(&mut self, position: U16Vec3, vertices: &mut Vec<U16Vec3>) -> u16 {
        let column = self.columns.entry((position.x, position.z)).or_default();
        if let Some(index) = column
            .iter()
            .rev()
            .find(|i| vertices[**i as usize].y.abs_diff(position.y) <= 2)
        {
            return *index;
        }
        let index = vertices.len() as u16;
        vertices.push(position);
        column.push(index);
        index
    }
}

struct Triangulation {
    /// Triangles as indices into the triangulated points.
    triangles: Vec<[usize; 3]>,
    /// Whether every point ended up in a triangle.
    complete: bool,
}

/// Ear-clips the simple polygon `points`, always cutting the ear with the shortest diagonal.
fn triangulate(points: &[IVec2]) -> Triangulation {
    let mut indices: Vec<usize> = (0..points.len()).collect();
    let mut triangles = Vec::with_capacity(points.len().saturating_sub(2));
    if points.len() < 3 {
        return Triangulation {
            triangles,
            complete: false,
        };
    }

    // The vertex after i is an ear when i -> i + 2 is a diagonal.
    let n = indices.len();
    let mut ears: Vec<bool> = vec![false; n];
    for i in 0..n {
        let i1 = next(i, n);
        let i2 = next(i1, n);
        ears[i1] = diagonal(i, i2, &indices, points);
    }

    while indices.len() > 3 {
        let n = indices.len();
        let diagonal_length = |i: usize, i2: usize| {
            let p0 = points[indices[i]];
            let p2 = points[indices[i2]];
            (p2 - p0).length_squared()
        };

        let mut best: Option<(usize, i32)> = None;
        for i in 0..n {
            let i1 = next(i, n);
            if ears[i1] {
                let len = diagonal_length(i, next(i1, n));
                if best.is_none_or(|(_, min_len)| len < min_len) {
                    best = Some((i, len));
                }
            }
        }

        if best.is_none() {
            // The contour might have overlapping segments, for example a notch that
            // touches itself. Loosen the diagonal tests to recover.
            for i in 0..n {
                let i1 = next(i, n);
                let i2 = next(i1, n);
                if diagonal_loose(i, i2, &indices, points) {
                    let len = diagonal_length(i, i2);
                    if best.is_none_or(|(_, min_len)| len < min_len) {
                        best = Some((i, len));
                    }
                }
            }
        }

        let Some((i, _)) = best else {
            // The contour is messed up. This sometimes happens
            // if the contour simplification is too aggressive.
            return Triangulation {
                triangles,
                complete: false,
            };
        };

        let mut i1 = next(i, n);
        let i2 = next(i1, n);
        triangles.push([indices[i], indices[i1], indices[i2]]);

        // Remove P[i1] and update the ear state of its former neighbors.
        indices.remove(i1);
        ears.remove(i1);
        let n = indices.len();
        if i1 >= n {
            i1 = 0;
        }
        let i = prev(i1, n);
        ears[i] = diagonal(prev(i, n), i1, &indices, points);
        ears[i1] = diagonal(i, next(i1, n), &indices, points);
    }

    triangles.push([indices[0], indices[1], indices[2]]);
    Triangulation {
        triangles,
        complete: true,
    }
}

/// Whether the diagonal `i -> j` lies inside the polygon in the neighborhood of `i`.
fn in_cone(i: usize, j: usize, indices: &[usize], points: &[IVec2]) -> bool {
    let n = indices.len();
    let pi = points[indices[i]];
    let pj = points[indices[j]];
    let pi1 = points[indices[next(i, n)]];
    let pin1 = points[indices[prev(i, n)]];

    // If P[i] is a convex vertex [ i+1 left or on (i-1,i) ].
    if left_on(pin1, pi, pi1) {
        return left(pi, pj, pin1) && left(pj, pi, pi1);
    }
    // Assume (i-1,i,i+1) not collinear.
    // else P[i] is reflex.
    !(left_on(pi, pj, pi1) && left_on(pj, pi, pin1))
}

fn in_cone_loose(i: usize, j: usize, indices: &[usize], points: &[IVec2]) -> bool {
    let n = indices.len();
    let pi = points[indices[i]];
    let pj = points[indices[j]];
    let pi1 = points[indices[next(i, n)]];
    let pin1 = points[indices[prev(i, n)]];

    if left_on(pin1, pi, pi1) {
        return left_on(pi, pj, pin1) && left_on(pj, pi, pi1);
    }
    !(left_on(pi, pj, pi1) && left_on(pj, pi, pin1))
}

/// Whether `i -> j` crosses no polygon edge, ignoring the edges incident to `i` and `j`.
fn diagonalie(
    i: usize,
    j: usize,
    indices: &[usize],
    points: &[IVec2],
    crosses: fn(IVec2, IVec2, IVec2, IVec2) -> bool,
) -> bool {
    let n = indices.len();
    let d0 = points[indices[i]];
    let d1 = points[indices[j]];
    (0..n).all(|k| {
        let k1 = next(k, n);
        if k == i || k1 == i || k == j || k1 == j {
            return true;
        }
        let p0 = points[indices[k]];
        let p1 = points[indices[k1]];
        if d0 == p0 || d1 == p0 || d0 == p1 || d1 == p1 {
            return true;
        }
        !crosses(d0, d1, p0, p1)
    })
}

fn diagonal(i: usize, j: usize, indices: &[usize], points: &[IVec2]) -> bool {
    in_cone(i, j, indices, points) && diagonalie(i, j, indices, points, intersect)
}

fn diagonal_loose(i: usize, j: usize, indices: &[usize], points: &[IVec2]) -> bool {
    in_cone_loose(i, j, indices, points) && diagonalie(i, j, indices, points, intersect_prop)
}

/// Repeatedly merges the pair of polygons whose merge is valid and has the shortest shared edge.
fn merge_polygons(polygons: &mut Vec<BuildPolygon>, vertices: &[U16Vec3], nvp: usize) {
    if nvp <= 3 {
        return;
    }
    loop {
        let mut best: Option<MergeCandidate> = None;
        for a in 0..polygons.len() {
            for b in (a + 1)..polygons.len() {
                let Some((edge_a, edge_b, length)) =
                    poly_merge_value(&polygons[a].vertices, &polygons[b].vertices, vertices, nvp)
                else {
                    continue;
                };
                if best.as_ref().is_none_or(|best| length < best.length) {
                    best = Some(MergeCandidate {
                        a,
                        b,
                        edge_a,
                        edge_b,
                        length,
                    });
                }
            }
        }
        let Some(best) = best else {
            break;
        };

        let pb = polygons.swap_remove(best.b);
        let pa = &mut polygons[best.a];
        pa.vertices = merge_polygon_vertices(&pa.vertices, &pb.vertices, best.edge_a, best.edge_b);
        if pa.region != pb.region {
            pa.region = RegionId::NONE;
        }
    }
}

struct MergeCandidate {
    a: usize,
    b: usize,
    edge_a: usize,
    edge_b: usize,
    length: i32,
}

/// If `pa` and `pb` can be merged into a convex polygon with at most `nvp` vertices, returns the
/// index of the shared edge in both polygons and its squared length.
fn poly_merge_value(
    pa: &[u16],
    pb: &[u16],
    vertices: &[U16Vec3],
    nvp: usize,
) -> Option<(usize, usize, i32)> {
    let na = pa.len();
    let nb = pb.len();

    // If the merged polygon would be too big, do not merge.
    if na + nb - 2 > nvp {
        return None;
    }

    // Check if the polygons share an edge.
    let sorted = |v0: u16, v1: u16| if v0 > v1 { (v1, v0) } else { (v0, v1) };
    let (ea, eb) = (0..na).find_map(|i| {
        let edge = sorted(pa[i], pa[(i + 1) % na]);
        (0..nb)
            .find(|j| sorted(pb[*j], pb[(*j + 1) % nb]) == edge)
            .map(|j| (i, j))
    })?;

    // Check to see if the merged polygon would be convex.
    let point = |index: u16| xz(vertices[index as usize]);
    let va = pa[(ea + na - 1) % na];
    let vb = pa[ea];
    let vc = pb[(eb + 2) % nb];
    if !left(point(va), point(vb), point(vc)) {
        return None;
    }
    let va = pb[(eb + nb - 1) % nb];
    let vb = pb[eb];
    let vc = pa[(ea + 2) % na];
    if !left(point(va), point(vb), point(vc)) {
        return None;
    }

    let va = point(pa[ea]);
    let vb = point(pa[(ea + 1) % na]);
    Some((ea, eb, (va - vb).length_squared()))
}

fn merge_polygon_vertices(pa: &[u16], pb: &[u16], ea: usize, eb: usize) -> Vec<u16> {
    let na = pa.len();
    let nb = pb.len();
    let mut merged = Vec::with_capacity(na + nb - 2);
    merged.extend((0..na - 1).map(|i| pa[(ea + 1 + i) % na]));
    merged.extend((0..nb - 1).map(|i| pb[(eb + 1 + i) % nb]));
    merged
}

/// Whether removing `rem` leaves a hole that can be re-triangulated.
fn can_remove_vertex(polygons: &[BuildPolygon], rem: u16) -> bool {
    let mut touched_vertices = 0;
    let mut remaining_edges = 0;
    for polygon in polygons {
        let removed = polygon.vertices.iter().filter(|v| **v == rem).count();
        if removed > 0 {
            touched_vertices += removed;
            remaining_edges += polygon.vertices.len() - (removed + 1);
        }
    }

    // There would be too few edges remaining to create a polygon.
    // This can happen for example when a tip of a triangle is marked
    // as deletion, but there are no other polys that share the vertex.
    // In this case, the vertex should not be removed.
    if remaining_edges <= 2 {
        return false;
    }

    // Find edges which share the removed vertex, keyed by their other end.
    let mut edges: Vec<(u16, u32)> = Vec::with_capacity(touched_vertices * 2);
    for polygon in polygons {
        let n = polygon.vertices.len();
        for j in 0..n {
            let k = prev(j, n);
            let (a, b) = (polygon.vertices[j], polygon.vertices[k]);
            if a != rem && b != rem {
                continue;
            }
            let other = if b == rem { a } else { b };
            match edges.iter_mut().find(|(end, _)| *end == other) {
                Some((_, share_count)) => *share_count += 1,
                None => edges.push((other, 1)),
            }
        }
    }

    // There should be no more than 2 open edges.
    // This catches the case that two non-adjacent polygons
    // share the removed vertex. In that case, do not remove the vertex.
    let open_edges = edges.iter().filter(|(_, count)| *count < 2).count();
    open_edges <= 2
}

#[derive(Debug, Clone, Copy)]
struct HoleEdge {
    from: u16,
    to: u16,
    region: RegionId,
    area: AreaType,
}

/// Removes the vertex `rem`, then re-triangulates and re-merges the hole it leaves behind.
fn remove_vertex(
    vertices: &mut Vec<U16Vec3>,
    polygons: &mut Vec<BuildPolygon>,
    rem: u16,
    nvp: usize,
) {
    // Collect the edges of the removed polygons which do not touch the removed vertex.
    let mut edges = Vec::new();
    let mut i = 0;
    while i < polygons.len() {
        if !polygons[i].vertices.contains(&rem) {
            i += 1;
            continue;
        }
        let polygon = polygons.swap_remove(i);
        let n = polygon.vertices.len();
        for j in 0..n {
            let k = prev(j, n);
            let (from, to) = (polygon.vertices[k], polygon.vertices[j]);
            if from != rem && to != rem {
                edges.push(HoleEdge {
                    from,
                    to,
                    region: polygon.region,
                    area: polygon.area,
                });
            }
        }
    }

    vertices.remove(rem as usize);
    let shift = |v: &mut u16| {
        if *v > rem {
            *v -= 1;
        }
    };
    for polygon in polygons.iter_mut() {
        polygon.vertices.iter_mut().for_each(shift);
    }
    for edge in &mut edges {
        shift(&mut edge.from);
        shift(&mut edge.to);
    }

    let Some(first) = edges.first().copied() else {
        return;
    };

    // Start with one vertex, keep appending connected
    // segments to the start and end of the hole.
    let mut hole = std::collections::VecDeque::with_capacity(edges.len() + 1);
    hole.push_back((first.from, first.region, first.area));
    while !edges.is_empty() {
        let mut matched = false;
        let mut i = 0;
        while i < edges.len() {
            let edge = edges[i];
            let added = if hole.front().is_some_and(|(v, _, _)| *v == edge.to) {
                // The segment matches the beginning of the hole boundary.
                hole.push_front((edge.from, edge.region, edge.area));
                true
            } else if hole.back().is_some_and(|(v, _, _)| *v == edge.from) {
                // The segment matches the end of the hole boundary.
                hole.push_back((edge.to, edge.region, edge.area));
                true
            } else {
                false
            };
            if added {
                edges.swap_remove(i);
                matched = true;
            } else {
                i += 1;
            }
        }
        if !matched {
            break;
        }
    }

    let hole: Vec<_> = hole.into_iter().collect();
    let points: Vec<_> = hole.iter().map(|(v, _, _)| xz(vertices[*v as usize])).collect();
    let triangulation = triangulate(&points);
    if !triangulation.complete {
        tracing::warn!(
            "Bad triangulation while removing border vertex {rem}, keeping the partial result."
        );
    }

    let mut hole_polygons: Vec<_> = triangulation
        .triangles
        .iter()
        .filter(|[a, b, c]| a != b && a != c && b != c)
        .map(|[a, b, c]| {
            let (va, ra, aa) = hole[*a];
            let (vb, rb, _) = hole[*b];
            let (vc, rc, _) = hole[*c];
            // A polygon covering multiple regions has no single region.
            let region = if ra != rb || rb != rc {
                RegionId::NONE
            } else {
                ra
            };
            BuildPolygon {
                vertices: vec![va, vb, vc],
                region,
                area: aa,
            }
        })
        .collect();
    if hole_polygons.is_empty() {
        tracing::warn!("Removing border vertex {rem} left a hole that could not be filled.");
        return;
    }

    merge_polygons(&mut hole_polygons, vertices, nvp);
    polygons.extend(hole_polygons);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Contour, ContourVertex,
        test_util::{flat_compact_heightfield, grid_compact_heightfield},
    };

    fn vertex(x: u16, y: u16, z: u16) -> ContourVertex {
        ContourVertex {
            position: U16Vec3::new(x, y, z),
            region: RegionVertexId::NONE,
        }
    }

    /// An axis aligned rectangle, wound like a region outline.
    fn rectangle(min: (u16, u16), max: (u16, u16), region: u16) -> Contour {
        Contour {
            vertices: vec![
                vertex(min.0, 0, min.1),
                vertex(min.0, 0, max.1),
                vertex(max.0, 0, max.1),
                vertex(max.0, 0, min.1),
            ],
            raw_vertices: Vec::new(),
            region: RegionId::from(region),
            area: AreaType::DEFAULT_WALKABLE,
        }
    }

    fn contour_set(contours: Vec<Contour>, size: u16, border_size: u16) -> ContourSet {
        ContourSet {
            contours,
            aabb: Aabb3d::new([0.0, 0.0, 0.0], [size as f32, 5.0, size as f32]),
            cell_size: 1.0,
            cell_height: 1.0,
            width: size,
            height: size,
            border_size,
            max_error: 1.3,
        }
    }

    /// Twice the area covered by all polygons.
    fn doubled_area(mesh: &PolygonNavmesh) -> i32 {
        (0..mesh.polygon_count())
            .map(|i| {
                let polygon = mesh.polygon_vertices(i);
                let n = polygon.len();
                (0..n)
                    .map(|j| {
                        let a = xz(mesh.vertices[polygon[j] as usize]);
                        let b = xz(mesh.vertices[polygon[next(j, n)] as usize]);
                        a.x * b.y - b.x * a.y
                    })
                    .sum::<i32>()
                    .abs()
            })
            .sum()
    }

    #[track_caller]
    fn assert_reciprocal_adjacency(mesh: &PolygonNavmesh) {
        for i in 0..mesh.polygon_count() {
            for neighbor in mesh.neighbor_slots(i) {
                if *neighbor == MESH_NULL_IDX || neighbor & PORTAL_EDGE_FLAG != 0 {
                    continue;
                }
                let back = mesh.neighbor_slots(*neighbor as usize);
                assert!(
                    back.contains(&(i as u16)),
                    "polygon {neighbor} does not point back to {i}"
                );
            }
        }
    }

    #[test]
    fn square_becomes_a_single_quad() {
        let mesh = contour_set(vec![rectangle((0, 0), (10, 10), 1)], 10, 0)
            .into_polygon_mesh(6)
            .unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.polygon_vertices(0).len(), 4);
        assert_eq!(mesh.polygons.len(), 6);
        assert_eq!(mesh.regions, vec![RegionId::from(1)]);
        assert_eq!(mesh.areas, vec![AreaType::DEFAULT_WALKABLE]);
        assert_eq!(mesh.flags, vec![0]);
        assert!(mesh.polygon_neighbors.iter().all(|n| *n == MESH_NULL_IDX));
        assert_eq!(doubled_area(&mesh), 200);
    }

    #[test]
    fn triangles_are_kept_when_merging_is_disabled() {
        let mesh = contour_set(vec![rectangle((0, 0), (10, 10), 1)], 10, 0)
            .into_polygon_mesh(3)
            .unwrap();
        assert_eq!(mesh.polygon_count(), 2);
        assert_eq!(mesh.polygons.len(), 6);
        assert_eq!(mesh.neighbor_slots(0).iter().filter(|n| **n == 1).count(), 1);
        assert_eq!(mesh.neighbor_slots(1).iter().filter(|n| **n == 0).count(), 1);
        assert_reciprocal_adjacency(&mesh);
        assert_eq!(doubled_area(&mesh), 200);
    }

    #[test]
    fn shared_vertices_are_welded_within_height_tolerance() {
        let left = rectangle((0, 0), (5, 10), 1);
        let mut right = rectangle((5, 0), (10, 10), 2);
        for vertex in &mut right.vertices {
            vertex.position.y = 2;
        }
        let mesh = contour_set(vec![left, right], 10, 0)
            .into_polygon_mesh(6)
            .unwrap();
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.polygon_count(), 2);
        assert!(mesh.neighbor_slots(0).contains(&1));
        assert!(mesh.neighbor_slots(1).contains(&0));
        assert_reciprocal_adjacency(&mesh);
    }

    #[test]
    fn distant_heights_are_not_welded() {
        let left = rectangle((0, 0), (5, 10), 1);
        let mut right = rectangle((5, 0), (10, 10), 2);
        for vertex in &mut right.vertices {
            vertex.position.y = 3;
        }
        let mesh = contour_set(vec![left, right], 10, 0)
            .into_polygon_mesh(6)
            .unwrap();
        assert_eq!(mesh.vertices.len(), 8);
        assert!(mesh.polygon_neighbors.iter().all(|n| *n == MESH_NULL_IDX));
    }

    #[test]
    fn border_vertices_are_removed() {
        let mut contour = rectangle((0, 0), (10, 10), 1);
        contour.vertices.push(ContourVertex {
            position: U16Vec3::new(5, 0, 0),
            region: RegionVertexId::BORDER_VERTEX,
        });
        let mesh = contour_set(vec![contour], 10, 0)
            .into_polygon_mesh(6)
            .unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert!(!mesh.vertices.contains(&U16Vec3::new(5, 0, 0)));
        assert!(mesh.polygons.iter().all(|v| *v == MESH_NULL_IDX || *v < 4));
        assert!(mesh.regions.iter().all(|r| *r == RegionId::from(1)));
        assert_reciprocal_adjacency(&mesh);
        assert_eq!(doubled_area(&mesh), 200);
    }

    #[test]
    fn border_edges_become_portals() {
        let mesh = contour_set(vec![rectangle((0, 0), (10, 10), 1)], 10, 2)
            .into_polygon_mesh(6)
            .unwrap();
        let mut portals: Vec<_> = mesh
            .neighbor_slots(0)
            .iter()
            .copied()
            .filter(|n| *n != MESH_NULL_IDX)
            .collect();
        portals.sort();
        assert_eq!(
            portals,
            vec![
                PORTAL_EDGE_FLAG,
                PORTAL_EDGE_FLAG | 1,
                PORTAL_EDGE_FLAG | 2,
                PORTAL_EDGE_FLAG | 3
            ]
        );
    }

    #[test]
    fn invalid_polygon_sizes_are_rejected() {
        for nvp in [0, 2, MAX_VERTICES_PER_POLYGON + 1] {
            assert_eq!(
                contour_set(Vec::new(), 10, 0).into_polygon_mesh(nvp),
                Err(PolygonMeshError::InvalidVerticesPerPolygon(nvp))
            );
        }
    }

    #[test]
    fn no_contours_give_an_empty_mesh() {
        let mesh = contour_set(Vec::new(), 10, 0).into_polygon_mesh(6).unwrap();
        assert_eq!(mesh.polygon_count(), 0);
        assert!(mesh.vertices.is_empty());
        assert!(mesh.polygons.is_empty());
    }

    #[test]
    fn concave_outline_is_split_into_convex_polygons() {
        // An L shape.
        let contour = Contour {
            vertices: vec![
                vertex(0, 0, 0),
                vertex(0, 0, 10),
                vertex(4, 0, 10),
                vertex(4, 0, 4),
                vertex(10, 0, 4),
                vertex(10, 0, 0),
            ],
            raw_vertices: Vec::new(),
            region: RegionId::from(1),
            area: AreaType::DEFAULT_WALKABLE,
        };
        let mesh = contour_set(vec![contour], 10, 0)
            .into_polygon_mesh(6)
            .unwrap();
        assert!(mesh.polygon_count() >= 2);
        assert_eq!(doubled_area(&mesh), 2 * (10 * 4 + 6 * 4));
        for i in 0..mesh.polygon_count() {
            let polygon = mesh.polygon_vertices(i);
            let n = polygon.len();
            for j in 0..n {
                let a = xz(mesh.vertices[polygon[prev(j, n)] as usize]);
                let b = xz(mesh.vertices[polygon[j] as usize]);
                let c = xz(mesh.vertices[polygon[next(j, n)] as usize]);
                assert!(left_on(a, b, c), "polygon {i} is not convex at {b}");
            }
        }
        assert_reciprocal_adjacency(&mesh);
    }

    #[test]
    fn square_triangulates_into_two_triangles() {
        let points = [
            IVec2::new(0, 0),
            IVec2::new(0, 10),
            IVec2::new(10, 10),
            IVec2::new(10, 0),
        ];
        let triangulation = triangulate(&points);
        assert!(triangulation.complete);
        assert_eq!(triangulation.triangles, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn merge_value_is_the_shared_edge_length() {
        let vertices = [
            U16Vec3::new(0, 0, 0),
            U16Vec3::new(0, 0, 10),
            U16Vec3::new(10, 0, 10),
            U16Vec3::new(10, 0, 0),
        ];
        assert_eq!(
            poly_merge_value(&[0, 1, 2], &[0, 2, 3], &vertices, 6),
            Some((2, 0, 200))
        );
        assert_eq!(poly_merge_value(&[0, 1, 2], &[0, 2, 3], &vertices, 3), None);
        assert_eq!(
            merge_polygon_vertices(&[0, 1, 2], &[0, 2, 3], 2, 0),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn pipeline_square_has_one_polygon() {
        let mut chf = flat_compact_heightfield(10);
        chf.build_distance_field();
        chf.build_regions(0, 8, 20).unwrap();
        let mesh = chf
            .build_contours(1.3, 0, Default::default())
            .into_polygon_mesh(6)
            .unwrap();
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(doubled_area(&mesh), 200);
    }

    #[test]
    fn pipeline_islands_are_not_connected() {
        let mut chf = grid_compact_heightfield(12, 5, |x, _| !(5..7).contains(&x));
        chf.build_distance_field();
        chf.build_regions(0, 8, 20).unwrap();
        let mesh = chf
            .build_contours(1.3, 0, Default::default())
            .into_polygon_mesh(6)
            .unwrap();
        assert_eq!(mesh.polygon_count(), 2);
        assert!(mesh.polygon_neighbors.iter().all(|n| *n == MESH_NULL_IDX));
        assert_eq!(doubled_area(&mesh), 2 * 2 * 25);
    }
}
