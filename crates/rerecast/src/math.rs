//! Geometry helpers shared by the build stages.

use glam::{IVec2, U16Vec3, UVec3, Vec2, Vec3A};

/// An axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3d {
    /// The minimum corner of the box.
    pub min: Vec3A,
    /// The maximum corner of the box.
    pub max: Vec3A,
}

impl Aabb3d {
    /// Creates a new AABB from its minimum and maximum corners.
    #[inline]
    pub fn new(min: impl Into<Vec3A>, max: impl Into<Vec3A>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Computes the AABB enclosing all given vertices.
    /// Returns `None` if `verts` is empty.
    pub fn from_verts(verts: &[Vec3A]) -> Option<Self> {
        let (first, rest) = verts.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for vert in rest {
            min = min.min(*vert);
            max = max.max(*vert);
        }
        Some(Self { min, max })
    }

    /// Returns whether the two boxes overlap. Touching boxes count as overlapping.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// An axis-aligned bounding box on the xz-plane. `y` of the vectors holds the world z coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb2d {
    /// The minimum corner of the box.
    pub min: Vec2,
    /// The maximum corner of the box.
    pub max: Vec2,
}

impl Aabb2d {
    /// Computes the AABB enclosing all given vertices.
    /// Returns `None` if `verts` is empty.
    pub fn from_verts(verts: &[Vec2]) -> Option<Self> {
        let (first, rest) = verts.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for vert in rest {
            min = min.min(*vert);
            max = max.max(*vert);
        }
        Some(Self { min, max })
    }

    /// Lifts the box into 3D with the given vertical extent.
    #[inline]
    pub fn extend_y(&self, min_y: f32, max_y: f32) -> Aabb3d {
        Aabb3d {
            min: Vec3A::new(self.min.x, min_y, self.min.y),
            max: Vec3A::new(self.max.x, max_y, self.max.y),
        }
    }
}

pub(crate) trait TriangleIndices {
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A;
}

impl TriangleIndices for UVec3 {
    #[inline]
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A {
        let a = vertices[self[0] as usize];
        let b = vertices[self[1] as usize];
        let c = vertices[self[2] as usize];
        let ab = b - a;
        let ac = c - a;
        ab.cross(ac).normalize_or_zero()
    }
}

pub(crate) trait TriangleVertices {
    fn aabb(&self) -> Aabb3d;
}

impl TriangleVertices for [Vec3A; 3] {
    #[inline]
    fn aabb(&self) -> Aabb3d {
        let min = self[0].min(self[1]).min(self[2]);
        let max = self[0].max(self[1]).max(self[2]);
        Aabb3d { min, max }
    }
}

/// Gets the standard width (x-axis) offset for the specified direction.
/// # Arguments
/// - `direction`: The direction. [Limits: 0 <= value < 4]
/// # Returns
///
/// The width offset to apply to the current cell position to move in the direction.
#[inline]
pub(crate) fn dir_offset_x(direction: u8) -> i8 {
    const OFFSET: [i8; 4] = [-1, 0, 1, 0];
    OFFSET[direction as usize & 0x03]
}

/// Gets the standard height (z-axis) offset for the specified direction.
/// # Arguments
/// - `direction`: The direction. [Limits: 0 <= value < 4]
/// # Returns
///
/// The height offset to apply to the current cell position to move in the direction.
#[inline]
pub(crate) fn dir_offset_z(direction: u8) -> i8 {
    const OFFSET: [i8; 4] = [0, 1, 0, -1];
    OFFSET[direction as usize & 0x03]
}

/// Gets the direction for the specified offset. One of x and z should be 0.
/// Returns `None` for offsets that are not a cardinal step.
#[inline]
pub(crate) fn dir_for_offset(x: i32, z: i32) -> Option<u8> {
    match (x, z) {
        (-1, 0) => Some(0),
        (0, 1) => Some(1),
        (1, 0) => Some(2),
        (0, -1) => Some(3),
        _ => None,
    }
}

/// Projects a voxel position onto the xz-plane.
#[inline]
pub(crate) fn xz(position: U16Vec3) -> IVec2 {
    IVec2::new(position.x as i32, position.z as i32)
}

#[inline]
pub(crate) fn next(i: usize, n: usize) -> usize {
    if i + 1 < n { i + 1 } else { 0 }
}

#[inline]
pub(crate) fn prev(i: usize, n: usize) -> usize {
    if i >= 1 { i - 1 } else { n - 1 }
}

/// Twice the signed area of the triangle `a, b, c` on the xz-plane.
/// Negative for counter-clockwise when looking down the y axis.
#[inline]
pub(crate) fn area2(a: IVec2, b: IVec2, c: IVec2) -> i32 {
    (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

/// `c` is strictly left of the directed line `a -> b`.
#[inline]
pub(crate) fn left(a: IVec2, b: IVec2, c: IVec2) -> bool {
    area2(a, b, c) < 0
}

#[inline]
pub(crate) fn left_on(a: IVec2, b: IVec2, c: IVec2) -> bool {
    area2(a, b, c) <= 0
}

#[inline]
pub(crate) fn collinear(a: IVec2, b: IVec2, c: IVec2) -> bool {
    area2(a, b, c) == 0
}

/// Returns true iff `ab` properly intersects `cd`: they share a point interior to both segments.
pub(crate) fn intersect_prop(a: IVec2, b: IVec2, c: IVec2, d: IVec2) -> bool {
    // Eliminate improper cases.
    if collinear(a, b, c) || collinear(a, b, d) || collinear(c, d, a) || collinear(c, d, b) {
        return false;
    }
    (left(a, b, c) ^ left(a, b, d)) && (left(c, d, a) ^ left(c, d, b))
}

/// Returns whether `c` lies on the closed segment `ab`, given the three points are collinear.
fn between(a: IVec2, b: IVec2, c: IVec2) -> bool {
    if !collinear(a, b, c) {
        return false;
    }
    // If ab not vertical, check betweenness on x; else on y.
    if a.x != b.x {
        (a.x <= c.x && c.x <= b.x) || (a.x >= c.x && c.x >= b.x)
    } else {
        (a.y <= c.y && c.y <= b.y) || (a.y >= c.y && c.y >= b.y)
    }
}

/// Returns true iff segments `ab` and `cd` intersect, properly or improperly.
pub(crate) fn intersect(a: IVec2, b: IVec2, c: IVec2, d: IVec2) -> bool {
    intersect_prop(a, b, c, d)
        || between(a, b, c)
        || between(a, b, d)
        || between(c, d, a)
        || between(c, d, b)
}

/// Squared distance from `pt` to the segment `p -> q` on the xz-plane.
pub(crate) fn distance_squared_point_segment_2d(pt: Vec2, p: Vec2, q: Vec2) -> f32 {
    let pq = q - p;
    let d = pq.length_squared();
    let mut t = pq.dot(pt - p);
    if d > 0.0 {
        t /= d;
    }
    let t = t.clamp(0.0, 1.0);
    (p + pq * t - pt).length_squared()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_offsets_round_trip() {
        for dir in 0..4 {
            let x = dir_offset_x(dir) as i32;
            let z = dir_offset_z(dir) as i32;
            assert_eq!(dir_for_offset(x, z), Some(dir));
        }
        assert_eq!(dir_for_offset(1, 1), None);
    }

    #[test]
    fn opposite_directions_cancel() {
        for dir in 0..4 {
            let opposite = (dir + 2) & 0x3;
            assert_eq!(dir_offset_x(dir) + dir_offset_x(opposite), 0);
            assert_eq!(dir_offset_z(dir) + dir_offset_z(opposite), 0);
        }
    }

    #[test]
    fn next_and_prev_wrap() {
        assert_eq!(next(3, 4), 0);
        assert_eq!(next(1, 4), 2);
        assert_eq!(prev(0, 4), 3);
        assert_eq!(prev(2, 4), 1);
    }

    #[test]
    fn crossing_segments_intersect() {
        let a = IVec2::new(0, 0);
        let b = IVec2::new(4, 4);
        let c = IVec2::new(0, 4);
        let d = IVec2::new(4, 0);
        assert!(intersect(a, b, c, d));
        assert!(!intersect(a, IVec2::new(1, 1), c, d));
    }

    #[test]
    fn touching_segments_intersect() {
        let a = IVec2::new(0, 0);
        let b = IVec2::new(4, 0);
        assert!(intersect(a, b, IVec2::new(2, 0), IVec2::new(2, 5)));
    }

    #[test]
    fn point_segment_distance() {
        let p = Vec2::new(0.0, 0.0);
        let q = Vec2::new(10.0, 0.0);
        assert_eq!(distance_squared_point_segment_2d(Vec2::new(5.0, 3.0), p, q), 9.0);
        assert_eq!(distance_squared_point_segment_2d(Vec2::new(-2.0, 0.0), p, q), 4.0);
    }

    #[test]
    fn aabb_from_verts() {
        let aabb = Aabb3d::from_verts(&[
            Vec3A::new(1.0, 2.0, 3.0),
            Vec3A::new(-1.0, 5.0, 0.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3A::new(-1.0, 2.0, 0.0));
        assert_eq!(aabb.max, Vec3A::new(1.0, 5.0, 3.0));
        assert_eq!(Aabb3d::from_verts(&[]), None);
    }
}
