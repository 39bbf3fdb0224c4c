//! Fixed-point triangle setup
//!
//! Raster-space vertices are snapped to 1/16 pixel. Each edge `i` runs from
//! `v[i]` to `v[i + 1]` and has the edge function
//!
//! ```text
//! E_i(p) = B_i * (p.x - v[i].x) + C_i * (p.y - v[i].y) + bias_i
//! B_i = v[i].y - v[i + 1].y
//! C_i = v[i + 1].x - v[i].x
//! ```
//!
//! Raster y points up and front faces are counter-clockwise, so a point is
//! inside when all three edge values are non-negative.

use glam::{IVec2, IVec4, Mat4, Vec3, Vec4};

/// Fractional bits of raster coordinates
pub const SUBPIXEL_BITS: u32 = 4;

/// One pixel in fixed point
pub const SUBPIXEL_ONE: i32 = 1 << SUBPIXEL_BITS;

/// Largest supported framebuffer side in pixels
pub const MAX_RESOLUTION: u32 = 2048;

/// Pixels outside the screen a vertex may reach before the triangle is dropped.
///
/// Together with [`MAX_RESOLUTION`] this keeps every edge value that the
/// rasterizer evaluates inside `i32`.
pub const GUARD_BAND: i32 = 256;

/// Corner of a box where an edge function is largest, indexed by `[B > 0][C > 0]`.
///
/// Corner `k` sits at offset `(k % 2, k / 2)` box sizes from the box origin.
const REJECT_CORNER: [[u8; 2]; 2] = [[0, 2], [1, 3]];

/// Offset of box corner `k` in box sizes
#[inline]
pub const fn corner_offset(k: u8) -> IVec2 {
    IVec2::new((k % 2) as i32, (k / 2) as i32)
}

/// A triangle ready for rasterization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterTriangle {
    /// Fixed-point raster positions
    pub v: [IVec2; 3],
    pub b: [i32; 3],
    pub c: [i32; 3],
    /// Edge values at the raster origin, fill bias included
    pub k: [i32; 3],
    pub bias: [i32; 3],
    /// Twice the signed area in fixed point, always positive
    pub det: i32,
    pub inv_det: f32,
    /// Normalized device depths of the vertices
    pub z: [f32; 3],
    pub vertex_ids: [u32; 3],
    pub texture_id: u32,
    /// Per edge, the box corner with the largest edge value
    pub reject_corner: [u8; 3],
    /// Per edge, the box corner with the smallest edge value
    pub accept_corner: [u8; 3],
}

impl RasterTriangle {
    /// Build a raster triangle from normalized device coordinates.
    ///
    /// Returns `None` for back-facing or degenerate triangles and for
    /// triangles reaching past the guard band.
    pub fn setup(ndc: [Vec3; 3], vertex_ids: [u32; 3], texture_id: u32, raster: &Mat4) -> Option<Self> {
        let lo = -GUARD_BAND as f32;
        let hi = (MAX_RESOLUTION as i32 + GUARD_BAND) as f32;

        let mut v = [IVec2::ZERO; 3];
        let mut z = [0.0; 3];
        for i in 0..3 {
            let p = raster.transform_point3(ndc[i]);
            // Written so NaN fails the test
            if !(p.x >= lo && p.x <= hi && p.y >= lo && p.y <= hi) {
                return None;
            }
            v[i] = IVec2::new(
                (p.x * SUBPIXEL_ONE as f32) as i32,
                (p.y * SUBPIXEL_ONE as f32) as i32,
            );
            z[i] = p.z;
        }

        let mut b = [0; 3];
        let mut c = [0; 3];
        let mut k = [0; 3];
        let mut bias = [0; 3];
        let mut reject_corner = [0; 3];
        let mut accept_corner = [0; 3];
        for i in 0..3 {
            let from = v[i];
            let to = v[(i + 1) % 3];
            let d = to - from;
            b[i] = -d.y;
            c[i] = d.x;

            // Top-left rule: edges heading up, or right along a horizontal,
            // own the pixels lying exactly on them
            bias[i] = if d.y > 0 || (d.y == 0 && d.x > 0) { 0 } else { -1 };

            let origin = -(b[i] as i64 * from.x as i64 + c[i] as i64 * from.y as i64) + bias[i] as i64;
            k[i] = origin as i32;

            let reject = REJECT_CORNER[(b[i] > 0) as usize][(c[i] > 0) as usize];
            reject_corner[i] = reject;
            accept_corner[i] = 3 - reject;
        }

        let det = c[2] as i64 * b[1] as i64 - c[1] as i64 * b[2] as i64;
        if det <= 0 {
            return None;
        }

        Some(Self {
            v,
            b,
            c,
            k,
            bias,
            det: det as i32,
            inv_det: 1.0 / det as f32,
            z,
            vertex_ids,
            texture_id,
            reject_corner,
            accept_corner,
        })
    }

    /// Edge value at a fixed-point position, fill bias included
    #[inline]
    pub fn edge_at(&self, edge: usize, p: IVec2) -> i32 {
        (self.b[edge] as i64 * p.x as i64 + self.c[edge] as i64 * p.y as i64 + self.k[edge] as i64) as i32
    }

    /// Edge values of four positions given relative to a fixed-point base
    #[inline]
    pub fn edge_batch(&self, edge: usize, base: IVec2, dx: IVec4, dy: IVec4) -> IVec4 {
        IVec4::splat(self.edge_at(edge, base)) + dx * self.b[edge] + dy * self.c[edge]
    }

    /// Edge values with the fill bias removed
    #[inline]
    pub fn raw(&self, edge: usize, e: IVec4) -> IVec4 {
        e - IVec4::splat(self.bias[edge])
    }

    /// True if every point of the box lies outside some edge
    pub fn rejects_box(&self, min: IVec2, size: i32) -> bool {
        (0..3).any(|i| self.edge_at(i, min + corner_offset(self.reject_corner[i]) * size) < 0)
    }

    /// Per edge, whether every point of the box lies inside it
    pub fn accepted_edges(&self, min: IVec2, size: i32) -> [bool; 3] {
        [0, 1, 2].map(|i| self.edge_at(i, min + corner_offset(self.accept_corner[i]) * size) >= 0)
    }

    /// True if the point is inside all three edges
    #[inline]
    pub fn contains(&self, p: IVec2) -> bool {
        (0..3).all(|i| self.edge_at(i, p) >= 0)
    }

    /// Per-edge deltas from a block origin to the reject and accept corners
    /// of its four quadrants.
    ///
    /// `block_size` is in pixels; quadrant order is (0,0), (h,0), (0,h), (h,h)
    /// with `h = block_size / 2`.
    pub fn step_vectors(&self, block_size: i32) -> ([IVec4; 3], [IVec4; 3]) {
        let h = block_size / 2 * SUBPIXEL_ONE;
        let qx = IVec4::new(0, h, 0, h);
        let qy = IVec4::new(0, 0, h, h);
        let step = |edge: usize, corner: u8| {
            let off = corner_offset(corner) * h;
            (qx + IVec4::splat(off.x)) * self.b[edge] + (qy + IVec4::splat(off.y)) * self.c[edge]
        };
        (
            [0, 1, 2].map(|i| step(i, self.reject_corner[i])),
            [0, 1, 2].map(|i| step(i, self.accept_corner[i])),
        )
    }

    /// Screen-space barycentrics of `v[0]` and `v[1]` from biased edge values
    #[inline]
    pub fn barycentric(&self, e: &[IVec4; 3]) -> (Vec4, Vec4) {
        let inv = Vec4::splat(self.inv_det);
        (
            self.raw(1, e[1]).as_vec4() * inv,
            self.raw(2, e[2]).as_vec4() * inv,
        )
    }

    /// Interpolated normalized device depth
    #[inline]
    pub fn depth(&self, l0: Vec4, l1: Vec4) -> Vec4 {
        let l2 = Vec4::ONE - l0 - l1;
        l0 * self.z[0] + l1 * self.z[1] + l2 * self.z[2]
    }

    /// Fixed-point bounding box, inclusive
    pub fn bounds(&self) -> (IVec2, IVec2) {
        let min = self.v[0].min(self.v[1]).min(self.v[2]);
        let max = self.v[0].max(self.v[1]).max(self.v[2]);
        (min, max)
    }
}
