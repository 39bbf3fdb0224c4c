//! 4-lane batch helpers for 2x2 pixel quads
//!
//! Lane order is fixed across the crate:
//!
//! ```text
//! lane 2: (x, y+1)   lane 3: (x+1, y+1)
//! lane 0: (x, y)     lane 1: (x+1, y)
//! ```
//!
//! Raster y grows upward, so lanes 2 and 3 are the upper row of the quad.

use core::ops::{Add, Mul, Sub};
use glam::{BVec4, BVec4A, IVec4, Vec2, Vec3, Vec4};

/// Number of pixels processed together
pub const LANES: usize = 4;

/// Bitmask with every lane set
pub const ALL_LANES: u32 = 0b1111;

/// Fixed-point pixel-center x offsets of each lane relative to the quad origin
pub const QUAD_CENTER_X: IVec4 = IVec4::new(8, 24, 8, 24);

/// Fixed-point pixel-center y offsets of each lane relative to the quad origin
pub const QUAD_CENTER_Y: IVec4 = IVec4::new(8, 8, 24, 24);

/// Pixel x offset of each lane
pub const LANE_DX: [i32; LANES] = [0, 1, 0, 1];

/// Pixel y offset of each lane
pub const LANE_DY: [i32; LANES] = [0, 0, 1, 1];

/// Lanes where `v >= 0`, as a bitmask
#[inline]
pub fn non_negative(v: IVec4) -> u32 {
    v.cmpge(IVec4::ZERO).bitmask()
}

/// Lanes where every edge value is non-negative.
///
/// OR-ing the values keeps the sign bit of any negative lane, so a single
/// comparison tests all three edges at once.
#[inline]
pub fn inside_all(e: &[IVec4; 3]) -> u32 {
    non_negative(e[0] | e[1] | e[2])
}

/// Expand a lane bitmask into a boolean vector
#[inline]
pub fn lanes_from_bits(bits: u32) -> BVec4 {
    BVec4::new(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0)
}

/// Per-lane select: `a` where the bit is set, `b` elsewhere
#[inline]
pub fn select(bits: u32, a: Vec4, b: Vec4) -> Vec4 {
    let mask = BVec4A::new(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0);
    Vec4::select(mask, a, b)
}

/// Structure-of-arrays 2D vector, one lane per quad pixel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2x4 {
    pub x: Vec4,
    pub y: Vec4,
}

impl Vec2x4 {
    pub fn splat(v: Vec2) -> Self {
        Self {
            x: Vec4::splat(v.x),
            y: Vec4::splat(v.y),
        }
    }

    /// Extract one lane
    #[inline]
    pub fn lane(&self, i: usize) -> Vec2 {
        Vec2::new(self.x[i], self.y[i])
    }

    /// Barycentric blend of three values with per-lane weights
    #[inline]
    pub fn blend(a: Vec2, b: Vec2, c: Vec2, w0: Vec4, w1: Vec4, w2: Vec4) -> Self {
        Self {
            x: w0 * a.x + w1 * b.x + w2 * c.x,
            y: w0 * a.y + w1 * b.y + w2 * c.y,
        }
    }
}

/// Structure-of-arrays 3D vector, one lane per quad pixel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3x4 {
    pub x: Vec4,
    pub y: Vec4,
    pub z: Vec4,
}

impl Vec3x4 {
    pub fn splat(v: Vec3) -> Self {
        Self {
            x: Vec4::splat(v.x),
            y: Vec4::splat(v.y),
            z: Vec4::splat(v.z),
        }
    }

    /// Same scalar in every component of every lane
    pub fn gray(v: Vec4) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Extract one lane
    #[inline]
    pub fn lane(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z[i])
    }

    /// Overwrite one lane
    #[inline]
    pub fn set_lane(&mut self, i: usize, v: Vec3) {
        self.x[i] = v.x;
        self.y[i] = v.y;
        self.z[i] = v.z;
    }

    #[inline]
    pub fn dot(&self, other: &Self) -> Vec4 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Per-lane normalization. Zero-length lanes become zero.
    #[inline]
    pub fn normalize_or_zero(&self) -> Self {
        let len_sq = self.dot(self);
        let inv = select(
            len_sq.cmpgt(Vec4::ZERO).bitmask(),
            len_sq.powf(-0.5),
            Vec4::ZERO,
        );
        *self * inv
    }

    /// Barycentric blend of three values with per-lane weights
    #[inline]
    pub fn blend(a: Vec3, b: Vec3, c: Vec3, w0: Vec4, w1: Vec4, w2: Vec4) -> Self {
        Self {
            x: w0 * a.x + w1 * b.x + w2 * c.x,
            y: w0 * a.y + w1 * b.y + w2 * c.y,
            z: w0 * a.z + w1 * b.z + w2 * c.z,
        }
    }
}

impl Add for Vec3x4 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for Vec3x4 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl Mul for Vec3x4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            x: self.x * rhs.x,
            y: self.y * rhs.y,
            z: self.z * rhs.z,
        }
    }
}

impl Mul<Vec4> for Vec3x4 {
    type Output = Self;

    fn mul(self, rhs: Vec4) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

impl Mul<f32> for Vec3x4 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        self * Vec4::splat(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inside_all_requires_every_edge() {
        let e = [
            IVec4::new(1, 0, -1, 5),
            IVec4::new(3, 2, 4, -1),
            IVec4::new(0, 9, 9, 9),
        ];
        assert_eq!(inside_all(&e), 0b0011);
    }

    #[test]
    fn test_select_and_lane_bits() {
        let v = select(0b0101, Vec4::ONE, Vec4::ZERO);
        assert_eq!(v, Vec4::new(1.0, 0.0, 1.0, 0.0));
        assert_eq!(lanes_from_bits(0b1010), BVec4::new(false, true, false, true));
    }

    #[test]
    fn test_normalize_handles_zero_lane() {
        let v = Vec3x4 {
            x: Vec4::new(3.0, 0.0, 0.0, 0.0),
            y: Vec4::new(4.0, 2.0, 0.0, 0.0),
            z: Vec4::ZERO,
        };
        let n = v.normalize_or_zero();
        assert!((n.lane(0) - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-5);
        assert!((n.lane(1) - Vec3::Y).length() < 1e-5);
        assert_eq!(n.lane(2), Vec3::ZERO);
    }
}
