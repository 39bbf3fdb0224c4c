//! Per-frame render state and renderer configuration

use glam::{Mat4, Vec3};

use crate::error::{RenderError, Result};
use crate::math::raster_matrix;
use crate::texture::TextureFilter;

/// Largest supported log2 sample count (32x)
pub const MAX_MSAA_LEVEL: u32 = 5;

/// Multisample level, stored as log2 of the sample count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MsaaLevel(u32);

impl MsaaLevel {
    pub const SINGLE: Self = Self(0);

    pub fn new(log2_samples: u32) -> Result<Self> {
        if log2_samples > MAX_MSAA_LEVEL {
            return Err(RenderError::UnsupportedMsaa(log2_samples));
        }
        Ok(Self(log2_samples))
    }

    #[inline]
    pub const fn log2(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn samples(self) -> usize {
        1 << self.0
    }
}

/// Everything a frame needs besides geometry.
///
/// Built by the renderer and handed by reference to every stage; nothing in
/// the pipeline reads global state.
#[derive(Debug, Clone)]
pub struct RenderState {
    model_view: Mat4,
    model_view_inv: Mat4,
    projection: Mat4,
    model_view_projection: Mat4,
    raster: Mat4,
    pub msaa: MsaaLevel,
    /// Drop clockwise triangles; when false they are flipped and drawn
    pub back_face_cull: bool,
    pub texture_filter: TextureFilter,
    /// Recursive quadrant subdivision; when false whole tiles are fine rasterized
    pub hierarchical: bool,
    /// Clip against the side and far planes too, not just near
    pub clip_all_planes: bool,
    pub light_dir: Vec3,
}

impl RenderState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            model_view: Mat4::IDENTITY,
            model_view_inv: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            model_view_projection: Mat4::IDENTITY,
            raster: raster_matrix(width, height),
            msaa: MsaaLevel::SINGLE,
            back_face_cull: true,
            texture_filter: TextureFilter::default(),
            hierarchical: true,
            clip_all_planes: true,
            light_dir: Vec3::new(1.0, 1.0, -1.0),
        }
    }

    /// Replace the transform chain and refresh the derived matrices
    pub fn set_transform(&mut self, model_view: Mat4, projection: Mat4, to_raster: Mat4) {
        self.model_view = model_view;
        self.model_view_inv = model_view.inverse();
        self.projection = projection;
        self.model_view_projection = projection * model_view;
        self.raster = to_raster;
    }

    pub fn model_view(&self) -> &Mat4 {
        &self.model_view
    }

    pub fn model_view_inverse(&self) -> &Mat4 {
        &self.model_view_inv
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn model_view_projection(&self) -> &Mat4 {
        &self.model_view_projection
    }

    pub fn raster(&self) -> &Mat4 {
        &self.raster
    }

    /// Camera position in object space
    pub fn eye_position(&self) -> Vec3 {
        self.model_view_inv.transform_point3(Vec3::ZERO)
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Construction-time renderer options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    /// Binning partitions; 0 uses the rayon pool size
    pub partitions: usize,
    /// Initial log2 sample count
    pub msaa: u32,
    pub hierarchical: bool,
}

impl RendererConfig {
    pub(crate) fn partition_count(&self) -> usize {
        if self.partitions == 0 {
            rayon::current_num_threads().max(1)
        } else {
            self.partitions
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            partitions: 0,
            msaa: 0,
            hierarchical: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msaa_level_bounds() {
        assert_eq!(MsaaLevel::new(5).unwrap().samples(), 32);
        assert_eq!(MsaaLevel::new(0).unwrap().samples(), 1);
        assert_eq!(MsaaLevel::new(6), Err(RenderError::UnsupportedMsaa(6)));
    }

    #[test]
    fn test_eye_position_inverts_model_view() {
        let mut state = RenderState::new(64, 64);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        state.set_transform(view, Mat4::IDENTITY, raster_matrix(64, 64));
        assert!((state.eye_position() - Vec3::new(0.0, 2.0, 5.0)).length() < 1e-4);
    }
}
