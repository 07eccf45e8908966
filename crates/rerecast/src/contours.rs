use glam::{IVec2, U16Vec3};

use crate::{
    Aabb3d, AreaType, CompactHeightfield, RegionId,
    math::{distance_squared_point_segment_2d, intersect, left, left_on, next, prev, xz},
    watershed_build_regions::MAX_CONTOUR_WALK_ITERATIONS,
};

impl CompactHeightfield {
    /// Builds a contour set from the region outlines in the provided compact heightfield.
    ///
    /// The raw contours will match the region outlines exactly. The `max_error` and `max_edge_len`
    /// parameters control how closely the simplified contours will match the raw contours.
    ///
    /// Simplified contours are generated such that the vertices for portals between areas match up.
    /// (They are considered mandatory vertices.)
    ///
    /// Setting `max_edge_len` to zero will disabled the edge length feature.
    ///
    /// # Arguments
    ///
    /// - `max_error` - The maximum distance a simplified contour's border edges should deviate
    ///   the original raw contour. [Limit: >=0] [Units: vx]
    /// - `max_edge_len` - The maximum allowed length for contour edges along the border of the mesh. [Limit: >=0] [Units: vx]
    /// - `build_flags` - Which edges to tessellate, see [`BuildContoursFlags`].
    pub fn build_contours(
        &self,
        max_error: f32,
        max_edge_len: u16,
        build_flags: BuildContoursFlags,
    ) -> ContourSet {
        let border_size = self.border_size;
        let mut aabb = self.aabb;
        if border_size > 0 {
            // If the heightfield was built with border_size, remove the offset
            let pad = border_size as f32 * self.cell_size;
            aabb.min.x += pad;
            aabb.min.z += pad;
            aabb.max.x -= pad;
            aabb.max.z -= pad;
        }

        let max_contours = self.max_region.bits().max(8) as usize;
        let mut contour_set = ContourSet {
            contours: Vec::with_capacity(max_contours),
            aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            width: self.width.saturating_sub(border_size * 2),
            height: self.height.saturating_sub(border_size * 2),
            border_size,
            max_error,
        };

        let mut flags = self.mark_boundary_edges();

        let mut raw_vertices = Vec::with_capacity(256);
        for z in 0..self.height {
            for x in 0..self.width {
                for i in self.cell_at(x, z).index_range() {
                    if flags[i] == 0 || flags[i] == 0xf {
                        flags[i] = 0;
                        continue;
                    }
                    let region = self.spans[i].region;
                    if !region.is_interior() {
                        continue;
                    }
                    let area = self.areas[i];

                    raw_vertices.clear();
                    self.walk_contour(x, z, i, &mut flags, &mut raw_vertices);

                    let mut vertices =
                        simplify_contour(&raw_vertices, max_error, max_edge_len, build_flags);
                    remove_degenerate_segments(&mut vertices);

                    if vertices.len() < 3 {
                        tracing::debug!(
                            "build_contours: dropping degenerate contour of region {} with {} vertices.",
                            region.bits(),
                            vertices.len()
                        );
                        continue;
                    }

                    let mut raw = raw_vertices.clone();
                    if border_size > 0 {
                        // If the heightfield was built with border_size, remove the offset.
                        for vertex in vertices.iter_mut().chain(raw.iter_mut()) {
                            vertex.position.x = vertex.position.x.saturating_sub(border_size);
                            vertex.position.z = vertex.position.z.saturating_sub(border_size);
                        }
                    }

                    contour_set.contours.push(Contour {
                        vertices,
                        raw_vertices: raw,
                        region,
                        area,
                    });
                }
            }
        }

        merge_holes(&mut contour_set.contours);
        contour_set
    }

    /// For each interior span, a 4 bit mask of the directions in which the neighbor belongs to another region.
    fn mark_boundary_edges(&self) -> Vec<u8> {
        let mut flags = vec![0_u8; self.spans.len()];
        for z in 0..self.height {
            for x in 0..self.width {
                for i in self.cell_at(x, z).index_range() {
                    let region = self.spans[i].region;
                    if !region.is_interior() {
                        flags[i] = 0;
                        continue;
                    }
                    let mut res = 0;
                    for dir in 0..4 {
                        let neighbor_region = self
                            .neighbor_index(x as i32, z as i32, i, dir)
                            .map_or(RegionId::NONE, |a_i| self.spans[a_i].region);
                        if neighbor_region == region {
                            res |= 1 << dir;
                        }
                    }
                    // Inverse, mark non connected edges.
                    flags[i] = res ^ 0xf;
                }
            }
        }
        flags
    }

    fn walk_contour(
        &self,
        x: u16,
        z: u16,
        mut i: usize,
        flags: &mut [u8],
        points: &mut Vec<ContourVertex>,
    ) {
        // Choose the first non-connected edge
        let mut dir = 0;
        while flags[i] & (1 << dir) == 0 {
            dir += 1;
        }

        let start_dir = dir;
        let start_i = i;
        let area = self.areas[i];
        let (mut x, mut z) = (x as i32, z as i32);

        let mut closed = false;
        for _ in 0..MAX_CONTOUR_WALK_ITERATIONS {
            if flags[i] & (1 << dir) != 0 {
                // Choose the edge corner
                let (p_y, is_border_vertex) = self.corner_height(x, z, i, dir);
                let (p_x, p_z) = match dir {
                    0 => (x, z + 1),
                    1 => (x + 1, z + 1),
                    2 => (x + 1, z),
                    _ => (x, z),
                };
                let mut r = RegionVertexId::NONE;
                if let Some(a_i) = self.neighbor_index(x, z, i, dir) {
                    r = RegionVertexId::from(self.spans[a_i].region);
                    if area != self.areas[a_i] {
                        r |= RegionVertexId::AREA_BORDER;
                    }
                }
                if is_border_vertex {
                    r |= RegionVertexId::BORDER_VERTEX;
                }
                points.push(ContourVertex {
                    position: U16Vec3::new(p_x as u16, p_y, p_z as u16),
                    region: r,
                });

                // Remove visited edges
                flags[i] &= !(1 << dir);
                // Rotate clockwise
                dir = (dir + 1) & 0x3;
            } else {
                let Some(n_i) = self.neighbor_index(x, z, i, dir) else {
                    // Should not happen.
                    tracing::warn!("build_contours: lost the contour at ({x}, {z}).");
                    return;
                };
                x += crate::math::dir_offset_x(dir) as i32;
                z += crate::math::dir_offset_z(dir) as i32;
                i = n_i;
                // Rotate counterclockwise
                dir = (dir + 3) & 0x3;
            }
            if start_i == i && start_dir == dir {
                closed = true;
                break;
            }
        }
        if !closed {
            tracing::warn!(
                "build_contours: contour walk did not close after {MAX_CONTOUR_WALK_ITERATIONS} steps."
            );
        }
    }

    /// The height of the corner at the end of edge `dir` of span `i`, and whether that corner is a
    /// vertex on the tile border that will be removed when building the polygon mesh.
    fn corner_height(&self, x: i32, z: i32, i: usize, dir: u8) -> (u16, bool) {
        let mut ch = self.spans[i].y;
        let dir_p = (dir + 1) & 0x3;

        // Combine region and area codes in order to prevent
        // border vertices which are in between two areas to be removed.
        let region_and_area =
            |i: usize| self.spans[i].region.bits() as u32 | ((self.areas[i].0 as u32) << 16);
        let mut regs = [0_u32; 4];
        regs[0] = region_and_area(i);

        if let Some(con) = self.spans[i].con(dir) {
            let (a_x, a_z, a_i) = self.con_indices(x, z, dir, con);
            ch = ch.max(self.spans[a_i].y);
            regs[1] = region_and_area(a_i);
            if let Some(b_i) = self.neighbor_index(a_x, a_z, a_i, dir_p) {
                ch = ch.max(self.spans[b_i].y);
                regs[2] = region_and_area(b_i);
            }
        }
        if let Some(con) = self.spans[i].con(dir_p) {
            let (a_x, a_z, a_i) = self.con_indices(x, z, dir_p, con);
            ch = ch.max(self.spans[a_i].y);
            regs[3] = region_and_area(a_i);
            if let Some(b_i) = self.neighbor_index(a_x, a_z, a_i, dir) {
                ch = ch.max(self.spans[b_i].y);
                regs[2] = region_and_area(b_i);
            }
        }

        // Check if the vertex is special edge vertex, these vertices will be removed later.
        let border = RegionId::BORDER_REGION.bits() as u32;
        let is_border_vertex = (0..4).any(|j| {
            let a = regs[j];
            let b = regs[(j + 1) & 0x3];
            let c = regs[(j + 2) & 0x3];
            let d = regs[(j + 3) & 0x3];

            // The vertex is a border vertex there are two same exterior cells in a row,
            // followed by two interior cells and none of the regions are out of bounds.
            let two_same_exts = (a & b & border) != 0 && a == b;
            let two_ints = ((c | d) & border) == 0;
            let ints_same_area = (c >> 16) == (d >> 16);
            let no_zeros = a != 0 && b != 0 && c != 0 && d != 0;
            two_same_exts && two_ints && ints_same_area && no_zeros
        });
        (ch, is_border_vertex)
    }
}

/// Whether `a -> b` runs in positive lexicographic order on the xz-plane.
#[inline]
fn is_lexicographic(a: IVec2, b: IVec2) -> bool {
    b.x > a.x || (b.x == a.x && b.y > a.y)
}

fn simplify_contour(
    points: &[ContourVertex],
    max_error: f32,
    max_edge_len: u16,
    build_flags: BuildContoursFlags,
) -> Vec<ContourVertex> {
    // Simplified vertices, paired with the index of the raw vertex they came from.
    let mut simplified: Vec<(U16Vec3, usize)> = Vec::with_capacity(64);
    let pn = points.len();
    if pn == 0 {
        return Vec::new();
    }

    // Add initial points.
    let has_connections = points.iter().any(|p| p.region.has_neighbor_region());
    if has_connections {
        // The contour has some portals to other regions.
        // Add a new point to every location where the region changes.
        for (i, point) in points.iter().enumerate() {
            let ii = next(i, pn);
            let next_point = &points[ii];
            let different_regs = point.region.region_id() != next_point.region.region_id();
            let area_borders = point.region.contains(RegionVertexId::AREA_BORDER)
                != next_point.region.contains(RegionVertexId::AREA_BORDER);
            if different_regs || area_borders {
                simplified.push((point.position, i));
            }
        }
    }

    if simplified.is_empty() {
        // If there is no connections at all,
        // create some initial points for the simplification process.
        // Find lower-left and upper-right vertices of the contour.
        let mut lower_left = 0;
        let mut upper_right = 0;
        for (i, point) in points.iter().enumerate() {
            let p = xz(point.position);
            let ll = xz(points[lower_left].position);
            let ur = xz(points[upper_right].position);
            if p.x < ll.x || (p.x == ll.x && p.y < ll.y) {
                lower_left = i;
            }
            if p.x > ur.x || (p.x == ur.x && p.y > ur.y) {
                upper_right = i;
            }
        }
        simplified.push((points[lower_left].position, lower_left));
        simplified.push((points[upper_right].position, upper_right));
    }

    // Add points until all raw points are within
    // error tolerance to the simplified shape.
    let max_error_sq = max_error * max_error;
    let mut i = 0;
    while i < simplified.len() {
        let ii = next(i, simplified.len());

        let (a, ai) = simplified[i];
        let (b, bi) = simplified[ii];
        let (mut a, mut b) = (xz(a), xz(b));

        // Find maximum deviation from the segment.
        let mut max_d = 0.0;
        let mut max_i = None;

        // Traverse the segment in lexilogical order so that the
        // max deviation is calculated similarly when traversing
        // opposite segments.
        let (mut ci, c_inc, end_i) = if is_lexicographic(a, b) {
            (next(ai, pn), 1, bi)
        } else {
            std::mem::swap(&mut a, &mut b);
            ((bi + pn - 1) % pn, pn - 1, ai)
        };

        // Tessellate only outer edges or edges between areas.
        let ci_region = points[ci].region;
        if !ci_region.has_neighbor_region() || ci_region.contains(RegionVertexId::AREA_BORDER) {
            while ci != end_i {
                let p = xz(points[ci].position);
                let d = distance_squared_point_segment_2d(p.as_vec2(), a.as_vec2(), b.as_vec2());
                if d > max_d {
                    max_d = d;
                    max_i = Some(ci);
                }
                ci = (ci + c_inc) % pn;
            }
        }

        // If the max deviation is larger than accepted error,
        // add new point, else continue to next segment.
        match max_i {
            Some(max_i) if max_d > max_error_sq => {
                simplified.insert(i + 1, (points[max_i].position, max_i));
            }
            _ => i += 1,
        }
    }

    // Split too long edges.
    let tessellate = build_flags.intersects(
        BuildContoursFlags::TESSELLATE_SOLID_WALL_EDGES | BuildContoursFlags::TESSELLATE_AREA_EDGES,
    );
    if max_edge_len > 0 && tessellate {
        let max_edge_len_sq = max_edge_len as i32 * max_edge_len as i32;
        let mut i = 0;
        while i < simplified.len() {
            let ii = next(i, simplified.len());

            let (a, ai) = simplified[i];
            let (b, bi) = simplified[ii];
            let (a, b) = (xz(a), xz(b));

            // Find maximum deviation from the segment.
            let mut max_i = None;
            let ci = next(ai, pn);

            // Tessellate only outer edges or edges between areas.
            let ci_region = points[ci].region;
            // Wall edges.
            let tessellate_wall = build_flags
                .contains(BuildContoursFlags::TESSELLATE_SOLID_WALL_EDGES)
                && !ci_region.has_neighbor_region();
            // Edges between areas.
            let tessellate_area = build_flags.contains(BuildContoursFlags::TESSELLATE_AREA_EDGES)
                && ci_region.contains(RegionVertexId::AREA_BORDER);

            if tessellate_wall || tessellate_area {
                let d = b - a;
                if d.length_squared() > max_edge_len_sq {
                    // Round based on the segments in lexilogical order so that the
                    // max tesselation is consistent regardless in which direction
                    // segments are traversed.
                    let n = if bi < ai { bi + pn - ai } else { bi - ai };
                    if n > 1 {
                        max_i = Some(if is_lexicographic(a, b) {
                            (ai + n / 2) % pn
                        } else {
                            (ai + n.div_ceil(2)) % pn
                        });
                    }
                }
            }

            // If the max deviation is larger than accepted error,
            // add new point, else continue to next segment.
            match max_i {
                Some(max_i) => simplified.insert(i + 1, (points[max_i].position, max_i)),
                None => i += 1,
            }
        }
    }

    simplified
        .into_iter()
        .map(|(position, raw_index)| {
            // The edge vertex flag is take from the current raw point,
            // and the neighbour region is take from the next raw point.
            let ai = next(raw_index, pn);
            let next_flags = points[ai].region
                & (RegionVertexId::REGION_MASK | RegionVertexId::AREA_BORDER);
            let own_flags = points[raw_index].region & RegionVertexId::BORDER_VERTEX;
            ContourVertex {
                position,
                region: next_flags | own_flags,
            }
        })
        .collect()
}

/// Removes consecutive vertices that coincide on the xz-plane.
fn remove_degenerate_segments(simplified: &mut Vec<ContourVertex>) {
    let mut i = 0;
    while i < simplified.len() && simplified.len() > 1 {
        let ni = next(i, simplified.len());
        if xz(simplified[i].position) == xz(simplified[ni].position) {
            // Degenerate segment, remove.
            simplified.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Signed area of the contour on the xz-plane, rounded away from zero.
/// Outlines have a positive area, holes a negative one.
pub(crate) fn signed_area(vertices: &[ContourVertex]) -> i32 {
    let n = vertices.len();
    let mut area = 0_i32;
    for i in 0..n {
        let vi = xz(vertices[i].position);
        let vj = xz(vertices[prev(i, n)].position);
        area += vi.x * vj.y - vj.x * vi.y;
    }
    area.signum() * ((area.abs() + 1) / 2)
}

struct Hole {
    contour: usize,
    vertices: Vec<ContourVertex>,
    min: IVec2,
    leftmost: usize,
}

impl Hole {
    fn new(contour: usize, vertices: Vec<ContourVertex>) -> Self {
        let mut leftmost = 0;
        let mut min = xz(vertices[0].position);
        for (i, vertex) in vertices.iter().enumerate().skip(1) {
            let p = xz(vertex.position);
            if p.x < min.x || (p.x == min.x && p.y < min.y) {
                min = p;
                leftmost = i;
            }
        }
        Self {
            contour,
            vertices,
            min,
            leftmost,
        }
    }
}

/// Merges every hole contour into the outline contour of its region.
/// Contours that end up empty are removed from the set.
fn merge_holes(contours: &mut Vec<Contour>) {
    let is_hole: Vec<bool> = contours
        .iter()
        .map(|contour| signed_area(&contour.vertices) < 0)
        .collect();
    if !is_hole.contains(&true) {
        return;
    }

    // Collect outline contour and holes contours per region.
    // We assume that there is one outline and multiple holes.
    let region_count = contours
        .iter()
        .map(|contour| contour.region.bits() as usize + 1)
        .max()
        .unwrap_or_default();
    let mut outlines: Vec<Option<usize>> = vec![None; region_count];
    let mut holes: Vec<Vec<usize>> = vec![Vec::new(); region_count];
    for (i, contour) in contours.iter().enumerate() {
        let region = contour.region.bits() as usize;
        // Positively would contours are outlines, negative holes.
        if is_hole[i] {
            holes[region].push(i);
        } else {
            if outlines[region].is_some() {
                tracing::error!("build_contours: Multiple outlines for region {region}.");
            }
            outlines[region] = Some(i);
        }
    }

    // Finally merge each regions holes into the outline.
    for (region, hole_indices) in holes.into_iter().enumerate() {
        if hole_indices.is_empty() {
            continue;
        }
        let Some(outline_index) = outlines[region] else {
            // The region does not have an outline.
            // This can happen if the contour becomes self-overlapping because of
            // too aggressive simplification settings.
            tracing::error!(
                "build_contours: Bad outline for region {region}, contour simplification is likely too aggressive."
            );
            continue;
        };
        let region_holes: Vec<Hole> = hole_indices
            .into_iter()
            .map(|i| Hole::new(i, std::mem::take(&mut contours[i].vertices)))
            .collect();
        let outline = &mut contours[outline_index].vertices;
        merge_region_holes(outline, region_holes);
    }

    contours.retain(|contour| !contour.vertices.is_empty());
}

fn merge_region_holes(outline: &mut Vec<ContourVertex>, mut holes: Vec<Hole>) {
    // Sort holes from left to right.
    holes.sort_by_key(|hole| (hole.min.x, hole.min.y));

    for i in 0..holes.len() {
        let hole = &holes[i];
        let mut best_vertex = hole.leftmost;
        let mut index = None;
        for _ in 0..hole.vertices.len() {
            // Find potential diagonals.
            // The 'best' vertex must be in the cone described by 3 consecutive vertices of the outline.
            // ..o j-1
            //   |
            //   |   * best
            //   |
            // j o-----o j+1
            //         :
            let corner = xz(hole.vertices[best_vertex].position);
            let mut diagonals: Vec<(usize, i32)> = (0..outline.len())
                .filter(|&j| in_cone(j, outline, corner))
                .map(|j| (j, (xz(outline[j].position) - corner).length_squared()))
                .collect();
            // Sort potential diagonals by distance, we want to make the connection as short as possible.
            diagonals.sort_by_key(|&(_, distance)| distance);

            // Find a diagonal that is not intersecting the outline nor the remaining holes.
            index = diagonals.iter().map(|&(j, _)| j).find(|&j| {
                let pt = xz(outline[j].position);
                !intersect_segment_contour(pt, corner, Some(j), outline)
                    && holes[i..]
                        .iter()
                        .all(|other| !intersect_segment_contour(pt, corner, None, &other.vertices))
            });
            // If found non-intersecting diagonal, stop looking.
            if index.is_some() {
                break;
            }
            // All the potential diagonals for the current vertex were intersecting, try next vertex.
            best_vertex = next(best_vertex, hole.vertices.len());
        }

        let Some(index) = index else {
            tracing::warn!(
                "build_contours: Failed to find merge points for hole contour {}, dropping it.",
                hole.contour
            );
            continue;
        };
        *outline = merge_contours(outline, &hole.vertices, index, best_vertex);
    }
}

/// Splices `b` into `a`, connecting vertex `ia` of `a` with vertex `ib` of `b` with a pair of coincident edges.
fn merge_contours(
    a: &[ContourVertex],
    b: &[ContourVertex],
    ia: usize,
    ib: usize,
) -> Vec<ContourVertex> {
    let mut merged = Vec::with_capacity(a.len() + b.len() + 2);
    // Copy contour A.
    merged.extend((0..=a.len()).map(|i| a[(ia + i) % a.len()].clone()));
    // Copy contour B
    merged.extend((0..=b.len()).map(|i| b[(ib + i) % b.len()].clone()));
    merged
}

/// Whether `pj` lies inside the cone formed by vertex `i` of the contour and its two neighbors.
fn in_cone(i: usize, vertices: &[ContourVertex], pj: IVec2) -> bool {
    let n = vertices.len();
    let pi = xz(vertices[i].position);
    let pi1 = xz(vertices[next(i, n)].position);
    let pin1 = xz(vertices[prev(i, n)].position);

    // If P[i] is a convex vertex [ i+1 left or on (i-1,i) ].
    if left_on(pin1, pi, pi1) {
        return left(pi, pj, pin1) && left(pj, pi, pi1);
    }
    // Assume (i-1,i,i+1) not collinear.
    // else P[i] is reflex.
    !(left_on(pi, pj, pi1) && left_on(pj, pi, pin1))
}

/// Whether the segment `d0 -> d1` crosses any edge of the contour, ignoring edges incident to vertex `i`
/// and edges touching the segment's endpoints.
fn intersect_segment_contour(
    d0: IVec2,
    d1: IVec2,
    i: Option<usize>,
    vertices: &[ContourVertex],
) -> bool {
    let n = vertices.len();
    // For each edge (k,k+1) of P
    (0..n).any(|k| {
        let k1 = next(k, n);
        // Skip edges incident to i.
        if i == Some(k) || i == Some(k1) {
            return false;
        }
        let p0 = xz(vertices[k].position);
        let p1 = xz(vertices[k1].position);
        if d0 == p0 || d1 == p0 || d0 == p1 || d1 == p1 {
            return false;
        }
        intersect(d0, d1, p0, p1)
    })
}

/// Represents a group of related contours.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContourSet {
    /// An array of the contours in the set.
    pub contours: Vec<Contour>,
    /// The AABB in world space
    pub aabb: Aabb3d,
    /// The size of each cell. (On the xz-plane.)
    pub cell_size: f32,
    /// The height of each cell. (The minimum increment along the y-axis.)
    pub cell_height: f32,
    /// The width of the set. (Along the x-axis in cell units.)
    pub width: u16,
    /// The height of the set. (Along the z-axis in cell units.)
    pub height: u16,
    /// The AABB border size used to generate the source data from which the contours were derived.
    pub border_size: u16,
    /// The max edge error that this contour set was simplified with.
    pub max_error: f32,
}

/// Represents a simple, non-overlapping contour in field space.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Contour {
    /// Simplified contour vertex and connection data.
    pub vertices: Vec<ContourVertex>,
    /// Raw contour vertex and connection data.
    pub raw_vertices: Vec<ContourVertex>,
    /// Region ID of the contour.
    pub region: RegionId,
    /// Area type of the contour.
    pub area: AreaType,
}

/// A vertex of a [`Contour`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContourVertex {
    /// The position of the vertex in voxel units, relative to the contour set's AABB.
    pub position: U16Vec3,
    /// The region on the other side of the edge starting at this vertex, plus flags.
    pub region: RegionVertexId,
}

bitflags::bitflags! {
    /// The region id field of contour vertices, together with their flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct RegionVertexId: u32 {
        /// No neighbor region and no flags.
        const NONE = 0;

        /// Applied to the region id field of contour vertices in order to extract the region id.
        /// The region id field of a vertex may have several flags applied to it.  So the
        /// fields value can't be used directly.
        const REGION_MASK = RegionId::MAX.bits() as u32;

        /// Border vertex flag.
        /// If a region ID has this bit set, then the associated element lies on
        /// a tile border. If a contour vertex's region ID has this bit set, the
        /// vertex will later be removed in order to match the segments and vertices
        /// at tile boundaries.
        /// (Used during the build process.)
        const BORDER_VERTEX = 0x10_000;

        /// Area border flag.
        /// If a region ID has this bit set, then the associated element lies on
        /// the border of an area.
        /// (Used during the region and contour build process.)
        const AREA_BORDER = 0x20_000;
    }
}

impl RegionVertexId {
    /// The region id without the vertex flags.
    #[inline]
    pub fn region_id(self) -> RegionId {
        RegionId::from(self)
    }

    /// Whether the edge borders any region, including border regions.
    #[inline]
    pub fn has_neighbor_region(self) -> bool {
        self.intersects(RegionVertexId::REGION_MASK)
    }
}

impl From<u32> for RegionVertexId {
    fn from(bits: u32) -> Self {
        RegionVertexId::from_bits_retain(bits)
    }
}

impl From<RegionId> for RegionVertexId {
    fn from(region_id: RegionId) -> Self {
        RegionVertexId::from_bits_retain(region_id.bits() as u32)
    }
}

impl From<RegionVertexId> for RegionId {
    fn from(region_vertex_id: RegionVertexId) -> Self {
        let bits = region_vertex_id.bits() & RegionVertexId::REGION_MASK.bits();
        RegionId::from_bits_retain(bits as u16)
    }
}

bitflags::bitflags! {
    /// Contour build flags used in [`CompactHeightfield::build_contours`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct BuildContoursFlags: u8 {
        /// Tessellate solid (impassable) edges during contour simplification.
        const TESSELLATE_SOLID_WALL_EDGES = 1;
        /// Tessellate edges between areas during contour simplification.
        const TESSELLATE_AREA_EDGES = 2;

        /// Default flags for building contours.
        const DEFAULT = Self::TESSELLATE_SOLID_WALL_EDGES.bits();
    }
}

impl Default for BuildContoursFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{flat_compact_heightfield, grid_compact_heightfield};

    fn vertex(x: u16, z: u16) -> ContourVertex {
        ContourVertex {
            position: U16Vec3::new(x, 0, z),
            region: RegionVertexId::NONE,
        }
    }

    fn positions_xz(vertices: &[ContourVertex]) -> Vec<(u16, u16)> {
        vertices.iter().map(|v| (v.position.x, v.position.z)).collect()
    }

    #[track_caller]
    fn assert_same_corners(vertices: &[ContourVertex], expected: &[(u16, u16)]) {
        let mut actual = positions_xz(vertices);
        actual.sort();
        let mut expected = expected.to_vec();
        expected.sort();
        assert_eq!(actual, expected);
    }

    fn assign_region(chf: &mut CompactHeightfield, region: impl Fn(u16, u16) -> u16) {
        for z in 0..chf.height {
            for x in 0..chf.width {
                for i in chf.cell_at(x, z).index_range() {
                    chf.spans[i].region = RegionId::from(region(x, z));
                }
            }
        }
        chf.max_region = chf
            .spans
            .iter()
            .map(|span| span.region)
            .max()
            .unwrap_or_default();
    }

    #[test]
    fn flat_square_simplifies_to_its_corners() {
        let mut chf = flat_compact_heightfield(10);
        assign_region(&mut chf, |_, _| 1);
        let contour_set = chf.build_contours(1.3, 0, BuildContoursFlags::default());

        assert_eq!(contour_set.contours.len(), 1);
        let contour = &contour_set.contours[0];
        assert_eq!(contour.region, RegionId::from(1));
        assert_eq!(contour.area, AreaType::DEFAULT_WALKABLE);
        assert_eq!(contour.raw_vertices.len(), 40);
        assert_same_corners(&contour.vertices, &[(0, 0), (0, 10), (10, 10), (10, 0)]);
        assert!(contour.vertices.iter().all(|v| v.position.y == 1));
        assert!(signed_area(&contour.vertices) > 0);
    }

    #[test]
    fn long_wall_edges_are_tessellated() {
        let mut chf = flat_compact_heightfield(10);
        assign_region(&mut chf, |_, _| 1);
        let contour_set = chf.build_contours(1.3, 4, BuildContoursFlags::default());
        let contour = &contour_set.contours[0];
        assert!(contour.vertices.len() > 4);
        for (i, vertex) in contour.vertices.iter().enumerate() {
            let next_vertex = &contour.vertices[next(i, contour.vertices.len())];
            let d = xz(next_vertex.position) - xz(vertex.position);
            assert!(d.length_squared() <= 16, "edge {i} is too long");
        }

        let untessellated = chf.build_contours(1.3, 4, BuildContoursFlags::empty());
        assert_eq!(untessellated.contours[0].vertices.len(), 4);
    }

    #[test]
    fn neighboring_regions_share_their_portal_vertices() {
        let mut chf = grid_compact_heightfield(10, 5, |_, _| true);
        assign_region(&mut chf, |x, _| if x < 5 { 1 } else { 2 });
        let contour_set = chf.build_contours(1.3, 0, BuildContoursFlags::default());
        assert_eq!(contour_set.contours.len(), 2);

        let left = &contour_set.contours[0];
        let right = &contour_set.contours[1];
        assert_same_corners(&left.vertices, &[(0, 0), (0, 5), (5, 5), (5, 0)]);
        assert_same_corners(&right.vertices, &[(5, 0), (5, 5), (10, 5), (10, 0)]);

        // The edge along x = 5 leads into the other region.
        let portal = left
            .vertices
            .iter()
            .find(|v| v.region.region_id() == RegionId::from(2))
            .unwrap();
        assert_eq!(portal.position.x, 5);
    }

    #[test]
    fn holes_are_merged_into_the_outline() {
        let mut chf = grid_compact_heightfield(10, 10, |x, z| {
            !((4..6).contains(&x) && (4..6).contains(&z))
        });
        assign_region(&mut chf, |_, _| 1);
        let contour_set = chf.build_contours(1.3, 0, BuildContoursFlags::default());

        assert_eq!(contour_set.contours.len(), 1);
        let vertices = &contour_set.contours[0].vertices;
        // 4 outline corners and 4 hole corners, plus the duplicated ends of the bridge.
        assert_eq!(vertices.len(), 10);
        let positions = positions_xz(vertices);
        for corner in [(4, 4), (4, 6), (6, 6), (6, 4), (0, 0), (10, 10)] {
            assert!(positions.contains(&corner), "missing {corner:?}");
        }
    }

    #[test]
    fn border_offset_is_removed() {
        let mut chf = flat_compact_heightfield(12);
        chf.build_distance_field();
        chf.build_regions(2, 0, 0).unwrap();
        let contour_set = chf.build_contours(1.3, 0, BuildContoursFlags::default());

        assert_eq!(contour_set.border_size, 2);
        assert_eq!(contour_set.width, 8);
        assert_eq!(contour_set.aabb.min.x, 2.0);
        assert_eq!(contour_set.aabb.max.z, 10.0);
        assert_eq!(contour_set.contours.len(), 1);
        assert_same_corners(
            &contour_set.contours[0].vertices,
            &[(0, 0), (0, 8), (8, 8), (8, 0)],
        );
    }

    #[test]
    fn unregioned_field_has_no_contours() {
        let chf = flat_compact_heightfield(5);
        let contour_set = chf.build_contours(1.3, 0, BuildContoursFlags::default());
        assert!(contour_set.contours.is_empty());
    }

    #[test]
    fn degenerate_segments_are_removed() {
        let mut vertices = vec![vertex(0, 0), vertex(0, 0), vertex(3, 0), vertex(3, 3), vertex(0, 0)];
        remove_degenerate_segments(&mut vertices);
        assert_eq!(positions_xz(&vertices), vec![(0, 0), (3, 0), (3, 3)]);
    }

    #[test]
    fn winding_decides_between_outline_and_hole() {
        let outline = vec![vertex(0, 1), vertex(1, 1), vertex(1, 0), vertex(0, 0)];
        assert!(signed_area(&outline) > 0);
        let hole: Vec<_> = outline.iter().rev().cloned().collect();
        assert!(signed_area(&hole) < 0);
        assert_eq!(signed_area(&outline), -signed_area(&hole));
    }

    #[test]
    fn half_cell_loops_keep_their_winding() {
        let outline = vec![vertex(0, 1), vertex(1, 0), vertex(0, 0)];
        assert_eq!(signed_area(&outline), 1);
        let hole: Vec<_> = outline.iter().rev().cloned().collect();
        assert_eq!(signed_area(&hole), -1);
    }

    #[test]
    fn merged_contours_are_joined_by_a_bridge() {
        let a = vec![vertex(0, 0), vertex(0, 9), vertex(9, 9), vertex(9, 0)];
        let b = vec![vertex(4, 4), vertex(5, 4), vertex(5, 5)];
        let merged = merge_contours(&a, &b, 1, 2);
        assert_eq!(
            positions_xz(&merged),
            vec![
                (0, 9),
                (9, 9),
                (9, 0),
                (0, 0),
                (0, 9),
                (5, 5),
                (4, 4),
                (5, 4),
                (5, 5)
            ]
        );
    }

    #[test]
    fn region_vertex_id_strips_flags() {
        let id = RegionVertexId::from(RegionId::from(7))
            | RegionVertexId::AREA_BORDER
            | RegionVertexId::BORDER_VERTEX;
        assert_eq!(id.region_id(), RegionId::from(7));
        assert!(id.has_neighbor_region());
        assert!(!RegionVertexId::AREA_BORDER.has_neighbor_region());
    }
}
