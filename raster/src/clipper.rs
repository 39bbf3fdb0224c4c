//! Homogeneous-space triangle clipping
//!
//! Triangles are classified against the view frustum with a 6-bit clip code
//! per vertex. Triangles crossing a plane are clipped as a polygon whose
//! vertices carry a barycentric weight against the source triangle, then
//! fan-triangulated back into the index stream.

use bitflags::bitflags;
use glam::{Vec3, Vec4};

use crate::vertex::ProjectedVertex;

bitflags! {
    /// Frustum planes a clip-space position lies outside of
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClipCode: u8 {
        const LEFT = 1;
        const RIGHT = 1 << 1;
        const BOTTOM = 1 << 2;
        const TOP = 1 << 3;
        const NEAR = 1 << 4;
        const FAR = 1 << 5;
    }
}

/// Upper bound on clipped polygon size: each plane adds at most one vertex
pub const MAX_POLYGON_VERTICES: usize = 3 + PLANES.len();

struct Plane {
    code: ClipCode,
    coeffs: Vec4,
    /// Component fixed by the plane, and its value as a multiple of `w`
    axis: usize,
    side: f32,
}

const PLANES: [Plane; 6] = [
    Plane {
        code: ClipCode::LEFT,
        coeffs: Vec4::new(1.0, 0.0, 0.0, 1.0),
        axis: 0,
        side: -1.0,
    },
    Plane {
        code: ClipCode::RIGHT,
        coeffs: Vec4::new(-1.0, 0.0, 0.0, 1.0),
        axis: 0,
        side: 1.0,
    },
    Plane {
        code: ClipCode::BOTTOM,
        coeffs: Vec4::new(0.0, 1.0, 0.0, 1.0),
        axis: 1,
        side: -1.0,
    },
    Plane {
        code: ClipCode::TOP,
        coeffs: Vec4::new(0.0, -1.0, 0.0, 1.0),
        axis: 1,
        side: 1.0,
    },
    Plane {
        code: ClipCode::FAR,
        coeffs: Vec4::new(0.0, 0.0, -1.0, 1.0),
        axis: 2,
        side: 1.0,
    },
    Plane {
        code: ClipCode::NEAR,
        coeffs: Vec4::new(0.0, 0.0, 1.0, 0.0),
        axis: 2,
        side: 0.0,
    },
];

impl Plane {
    #[inline]
    fn distance(&self, p: Vec4) -> f32 {
        self.coeffs.dot(p)
    }

    /// Put an interpolated position exactly on the plane
    fn snap(&self, mut p: Vec4) -> Vec4 {
        p[self.axis] = self.side * p.w;
        p
    }
}

/// Clip code of a clip-space position.
///
/// Near is always tested; the other planes only with `all_planes`.
pub fn clip_code(p: Vec4, all_planes: bool) -> ClipCode {
    let mut code = ClipCode::empty();
    if p.z < 0.0 {
        code |= ClipCode::NEAR;
    }
    if all_planes {
        if p.x < -p.w {
            code |= ClipCode::LEFT;
        }
        if p.x > p.w {
            code |= ClipCode::RIGHT;
        }
        if p.y < -p.w {
            code |= ClipCode::BOTTOM;
        }
        if p.y > p.w {
            code |= ClipCode::TOP;
        }
        if p.z > p.w {
            code |= ClipCode::FAR;
        }
    }
    code
}

/// Polygon vertex: clip-space position plus weight against the source triangle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClipVertex {
    pub position: Vec4,
    pub weight: Vec3,
}

impl ClipVertex {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            weight: self.weight.lerp(other.weight, t),
        }
    }
}

/// Fixed-capacity clipping polygon
#[derive(Debug, Clone, Copy)]
pub struct Polygon {
    vertices: [ClipVertex; MAX_POLYGON_VERTICES],
    len: usize,
}

impl Polygon {
    fn empty() -> Self {
        Self {
            vertices: [ClipVertex::default(); MAX_POLYGON_VERTICES],
            len: 0,
        }
    }

    fn triangle(positions: [Vec4; 3]) -> Self {
        let mut poly = Self::empty();
        for (p, weight) in positions.into_iter().zip([Vec3::X, Vec3::Y, Vec3::Z]) {
            poly.push(ClipVertex { position: p, weight });
        }
        poly
    }

    #[inline]
    fn push(&mut self, v: ClipVertex) {
        if self.len < MAX_POLYGON_VERTICES {
            self.vertices[self.len] = v;
            self.len += 1;
        }
    }

    pub fn vertices(&self) -> &[ClipVertex] {
        &self.vertices[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sutherland-Hodgman pass against one plane
    fn clip_against(&self, plane: &Plane) -> Polygon {
        let mut out = Polygon::empty();
        let verts = self.vertices();
        for (i, v0) in verts.iter().enumerate() {
            let v1 = &verts[(i + 1) % verts.len()];
            let d0 = plane.distance(v0.position);
            let d1 = plane.distance(v1.position);

            match (d0 >= 0.0, d1 >= 0.0) {
                (true, true) => out.push(*v1),
                (true, false) => out.push(intersect(plane, v0, v1, d0, d1)),
                (false, true) => {
                    out.push(intersect(plane, v0, v1, d0, d1));
                    out.push(*v1);
                }
                (false, false) => {}
            }
        }
        out
    }
}

fn intersect(plane: &Plane, v0: &ClipVertex, v1: &ClipVertex, d0: f32, d1: f32) -> ClipVertex {
    let t = d0 / (d0 - d1);
    let mut v = v0.lerp(v1, t);
    v.position = plane.snap(v.position);
    v
}

/// Outcome of clipping a single triangle
#[derive(Debug, Clone, Copy)]
pub enum ClipResult {
    /// Entirely inside every tested plane
    Inside,
    /// Entirely outside, or degenerate after clipping
    Outside,
    /// Crossed at least one plane
    Clipped(Polygon),
}

/// Clip one triangle given its clip-space positions
pub fn clip_triangle(positions: [Vec4; 3], clip_all_planes: bool) -> ClipResult {
    let codes = positions.map(|p| clip_code(p, clip_all_planes));
    let any = codes[0] | codes[1] | codes[2];
    if any.is_empty() {
        return ClipResult::Inside;
    }
    if !(codes[0] & codes[1] & codes[2]).is_empty() {
        return ClipResult::Outside;
    }

    let mut poly = Polygon::triangle(positions);
    for plane in PLANES.iter().filter(|p| any.contains(p.code)) {
        poly = poly.clip_against(plane);
        if poly.len() < 3 {
            return ClipResult::Outside;
        }
    }

    // A vertex at or behind the eye would blow up the perspective divide
    if poly.vertices().iter().any(|v| v.position.w <= 0.0) {
        return ClipResult::Outside;
    }
    ClipResult::Clipped(poly)
}

/// A triangle that survived clipping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedTriangle {
    pub indices: [u32; 3],
    /// Index of the input triangle it came from
    pub source: u32,
}

/// Clip an indexed triangle list.
///
/// New vertices are appended to `vertices`; surviving triangles are written
/// to `out` in input order.
pub fn clip(
    vertices: &mut Vec<ProjectedVertex>,
    indices: &[u32],
    clip_all_planes: bool,
    out: &mut Vec<ClippedTriangle>,
) {
    out.clear();
    for (source, tri) in indices.chunks_exact(3).enumerate() {
        let ids = [tri[0], tri[1], tri[2]];
        let positions = ids.map(|i| vertices[i as usize].projected);
        let source = source as u32;

        let poly = match clip_triangle(positions, clip_all_planes) {
            ClipResult::Inside => {
                out.push(ClippedTriangle { indices: ids, source });
                continue;
            }
            ClipResult::Outside => continue,
            ClipResult::Clipped(poly) => poly,
        };

        let mut poly_ids = [0u32; MAX_POLYGON_VERTICES];
        for (slot, v) in poly_ids.iter_mut().zip(poly.vertices()) {
            *slot = if v.weight == Vec3::X {
                ids[0]
            } else if v.weight == Vec3::Y {
                ids[1]
            } else if v.weight == Vec3::Z {
                ids[2]
            } else {
                let src = ids.map(|i| &vertices[i as usize]);
                let blended = ProjectedVertex::weighted([src[0], src[1], src[2]], v.weight, v.position);
                vertices.push(blended);
                (vertices.len() - 1) as u32
            };
        }

        for k in 1..poly.len() - 1 {
            out.push(ClippedTriangle {
                indices: [poly_ids[0], poly_ids[k], poly_ids[k + 1]],
                source,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> ProjectedVertex {
        ProjectedVertex {
            projected: Vec4::new(x, y, z, w),
            ..Default::default()
        }
    }

    #[test]
    fn test_clip_codes() {
        assert_eq!(clip_code(Vec4::new(0.0, 0.0, 0.5, 1.0), true), ClipCode::empty());
        assert_eq!(clip_code(Vec4::new(-2.0, 2.0, 0.5, 1.0), true), ClipCode::LEFT | ClipCode::TOP);
        assert_eq!(clip_code(Vec4::new(0.0, 0.0, 2.0, 1.0), true), ClipCode::FAR);
        assert_eq!(clip_code(Vec4::new(0.0, 0.0, -0.1, 1.0), true), ClipCode::NEAR);
        // Only near is tested without all planes
        assert_eq!(clip_code(Vec4::new(-5.0, 0.0, 2.0, 1.0), false), ClipCode::empty());
    }

    #[test]
    fn test_inside_triangle_passes_through() {
        let mut verts = vec![
            vertex(-0.5, -0.5, 0.5, 1.0),
            vertex(0.5, -0.5, 0.5, 1.0),
            vertex(0.0, 0.5, 0.5, 1.0),
        ];
        let mut out = Vec::new();
        clip(&mut verts, &[0, 1, 2], true, &mut out);
        assert_eq!(out, vec![ClippedTriangle { indices: [0, 1, 2], source: 0 }]);
        assert_eq!(verts.len(), 3);
    }

    #[test]
    fn test_outside_triangle_is_dropped() {
        let mut verts = vec![
            vertex(2.0, 0.0, 0.5, 1.0),
            vertex(3.0, 0.0, 0.5, 1.0),
            vertex(2.5, 1.0, 0.5, 1.0),
        ];
        let mut out = Vec::new();
        clip(&mut verts, &[0, 1, 2], true, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_plane_crossing() {
        // One vertex past the right plane: quad output, two triangles
        let mut verts = vec![
            vertex(0.0, 0.0, 0.5, 1.0),
            vertex(2.0, 0.0, 0.5, 1.0),
            vertex(0.0, 0.5, 0.5, 1.0),
        ];
        let mut out = Vec::new();
        clip(&mut verts, &[0, 1, 2], true, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(verts.len(), 5);
        for v in &verts[3..] {
            assert_eq!(v.projected.x, v.projected.w);
        }
        // Vertices inside the plane keep their indices
        let used: Vec<u32> = out.iter().flat_map(|t| t.indices).collect();
        assert!(used.contains(&0) && used.contains(&2));
        assert!(!used.contains(&1));
    }

    #[test]
    fn test_behind_eye_discarded() {
        let result = clip_triangle(
            [
                Vec4::new(0.0, 0.0, -1.0, -0.5),
                Vec4::new(1.0, 0.0, -1.0, -0.5),
                Vec4::new(0.0, 1.0, -1.0, -0.5),
            ],
            false,
        );
        assert!(matches!(result, ClipResult::Outside));
    }

    #[test]
    fn test_near_only_keeps_offscreen_geometry() {
        let result = clip_triangle(
            [
                Vec4::new(-10.0, 0.0, 0.5, 1.0),
                Vec4::new(10.0, 0.0, 0.5, 1.0),
                Vec4::new(0.0, 10.0, 0.5, 1.0),
            ],
            false,
        );
        assert!(matches!(result, ClipResult::Inside));
    }

    #[test]
    fn test_attributes_interpolated_by_weight() {
        let mut verts = vec![
            vertex(0.0, 0.0, -1.0, 1.0),
            vertex(0.0, 0.0, 1.0, 1.0),
            vertex(0.5, 0.5, 1.0, 1.0),
        ];
        verts[0].tex_coord = glam::Vec2::new(0.0, 0.0);
        verts[1].tex_coord = glam::Vec2::new(1.0, 0.0);
        verts[2].tex_coord = glam::Vec2::new(1.0, 1.0);
        let mut out = Vec::new();
        clip(&mut verts, &[0, 1, 2], true, &mut out);
        assert!(!out.is_empty());
        // Crossing 0 -> 1 at z = 0 is halfway
        let mid = verts[3..]
            .iter()
            .find(|v| v.projected.x == 0.0)
            .map(|v| v.tex_coord);
        assert_eq!(mid, Some(glam::Vec2::new(0.5, 0.0)));
    }
}
