//! Vertex formats

use glam::{Vec2, Vec3, Vec4};

/// An input vertex with position, normal, and UV coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl MeshVertex {
    /// Create a new vertex
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }
}

impl Default for MeshVertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            tex_coord: Vec2::ZERO,
        }
    }
}

/// A vertex after vertex shading.
///
/// `projected` holds the clip-space position until the perspective divide,
/// after which `xyz` is normalized device coordinates and `w` is kept.
/// `inv_w` is only meaningful after the divide.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProjectedVertex {
    pub projected: Vec4,
    pub inv_w: f32,
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl ProjectedVertex {
    /// Blend three vertices with a barycentric weight.
    ///
    /// The clip-space position is taken from `projected` so callers can
    /// supply a value snapped exactly onto a clip plane.
    pub fn weighted(src: [&ProjectedVertex; 3], weight: Vec3, projected: Vec4) -> Self {
        let [a, b, c] = src;
        Self {
            projected,
            inv_w: 0.0,
            position: a.position * weight.x + b.position * weight.y + c.position * weight.z,
            normal: a.normal * weight.x + b.normal * weight.y + c.normal * weight.z,
            tex_coord: a.tex_coord * weight.x + b.tex_coord * weight.y + c.tex_coord * weight.z,
        }
    }

    /// Perspective divide
    #[inline]
    pub fn divide(&mut self) {
        self.inv_w = 1.0 / self.projected.w;
        let w = self.projected.w;
        self.projected = (self.projected.truncate() * self.inv_w).extend(w);
    }

    /// Normalized device coordinates, valid after [`divide`](Self::divide)
    #[inline]
    pub fn ndc(&self) -> Vec3 {
        self.projected.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divide_keeps_w() {
        let mut v = ProjectedVertex {
            projected: Vec4::new(2.0, -4.0, 1.0, 4.0),
            ..Default::default()
        };
        v.divide();
        assert_eq!(v.ndc(), Vec3::new(0.5, -1.0, 0.25));
        assert_eq!(v.projected.w, 4.0);
        assert_eq!(v.inv_w, 0.25);
    }

    #[test]
    fn test_weighted_blends_attributes() {
        let a = ProjectedVertex {
            tex_coord: Vec2::new(0.0, 0.0),
            position: Vec3::X,
            ..Default::default()
        };
        let b = ProjectedVertex {
            tex_coord: Vec2::new(1.0, 0.0),
            position: Vec3::Y,
            ..Default::default()
        };
        let c = ProjectedVertex {
            tex_coord: Vec2::new(0.0, 1.0),
            position: Vec3::Z,
            ..Default::default()
        };
        let v = ProjectedVertex::weighted([&a, &b, &c], Vec3::new(0.5, 0.25, 0.25), Vec4::W);
        assert_eq!(v.tex_coord, Vec2::new(0.25, 0.25));
        assert_eq!(v.position, Vec3::new(0.5, 0.25, 0.25));
        assert_eq!(v.projected, Vec4::W);
    }
}
