//! Quad fragments handed from rasterization to shading

use glam::Vec4;

use crate::quad::{LANES, Vec2x4, Vec3x4};
use crate::vertex::ProjectedVertex;

/// Per-sample, per-lane coverage of a quad.
///
/// Bit `sample * 4 + lane` is set when that sample of that pixel is covered
/// and passed the depth test. 32 samples over 4 lanes fill all 128 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CoverageMask(pub u128);

impl CoverageMask {
    #[inline]
    pub fn set(&mut self, sample: usize, lane: usize) {
        self.0 |= 1 << (sample * LANES + lane);
    }

    #[inline]
    pub fn get(&self, sample: usize, lane: usize) -> bool {
        self.0 & (1 << (sample * LANES + lane)) != 0
    }

    /// Set lanes of one sample from a 4-bit lane mask
    #[inline]
    pub fn set_lanes(&mut self, sample: usize, lanes: u32) {
        self.0 |= ((lanes & 0xf) as u128) << (sample * LANES);
    }

    /// 4-bit lane mask of one sample
    #[inline]
    pub fn lanes(&self, sample: usize) -> u32 {
        ((self.0 >> (sample * LANES)) & 0xf) as u32
    }

    #[inline]
    pub fn any(&self) -> bool {
        self.0 != 0
    }

    /// Number of covered (sample, pixel) pairs
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }
}

/// Up to four neighboring pixels of one triangle, produced by one tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadFragment {
    pub vertex_ids: [u32; 3],
    pub texture_id: u32,
    /// Screen-space barycentrics at the pixel centers
    pub lambda0: Vec4,
    pub lambda1: Vec4,
    /// Raster position of the quad's lower-left pixel, always even
    pub x: i32,
    pub y: i32,
    pub coverage: CoverageMask,
    pub tile_id: u32,
    /// Position in the owning tile's fragment buffer
    pub intra_tile_index: u32,
}

/// Perspective-correct vertex attributes for the four lanes of a quad
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuadAttributes {
    pub position: Vec3x4,
    pub normal: Vec3x4,
    pub tex_coord: Vec2x4,
}

impl QuadFragment {
    /// Interpolate vertex attributes at the pixel centers.
    ///
    /// Screen-space barycentrics are weighted by `1/w` and renormalized so
    /// attributes vary linearly in object space.
    pub fn interpolate(&self, vertices: &[ProjectedVertex]) -> QuadAttributes {
        let [v0, v1, v2] = self.vertex_ids.map(|i| &vertices[i as usize]);

        let b0 = self.lambda0 * v0.inv_w;
        let b1 = self.lambda1 * v1.inv_w;
        let b2 = (Vec4::ONE - self.lambda0 - self.lambda1) * v2.inv_w;
        let norm = (b0 + b1 + b2).recip();
        let b0 = b0 * norm;
        let b1 = b1 * norm;
        let b2 = Vec4::ONE - b0 - b1;

        QuadAttributes {
            position: Vec3x4::blend(v0.position, v1.position, v2.position, b0, b1, b2),
            normal: Vec3x4::blend(v0.normal, v1.normal, v2.normal, b0, b1, b2),
            tex_coord: Vec2x4::blend(v0.tex_coord, v1.tex_coord, v2.tex_coord, b0, b1, b2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    #[test]
    fn test_coverage_bits() {
        let mut mask = CoverageMask::default();
        assert!(!mask.any());
        mask.set(31, 3);
        mask.set_lanes(2, 0b0101);
        assert!(mask.get(31, 3));
        assert!(mask.get(2, 0) && mask.get(2, 2));
        assert!(!mask.get(2, 1));
        assert_eq!(mask.lanes(2), 0b0101);
        assert_eq!(mask.count(), 3);
        assert_eq!(mask.0 >> 127, 1);
    }

    #[test]
    fn test_interpolation_is_perspective_correct() {
        let near = ProjectedVertex {
            inv_w: 1.0,
            tex_coord: Vec2::new(0.0, 0.0),
            normal: Vec3::Z,
            ..Default::default()
        };
        let far = ProjectedVertex {
            inv_w: 0.25,
            tex_coord: Vec2::new(1.0, 0.0),
            normal: Vec3::Z,
            ..Default::default()
        };
        let vertices = [near, far, far];
        let frag = QuadFragment {
            vertex_ids: [0, 1, 2],
            texture_id: 0,
            lambda0: Vec4::splat(0.5),
            lambda1: Vec4::splat(0.5),
            x: 0,
            y: 0,
            coverage: CoverageMask::default(),
            tile_id: 0,
            intra_tile_index: 0,
        };
        let attrs = frag.interpolate(&vertices);
        // Halfway in screen space is a fifth of the way in object space
        assert!((attrs.tex_coord.x.x - 0.2).abs() < 1e-6);
        assert!((attrs.normal.lane(3) - Vec3::Z).length() < 1e-6);
    }
}
