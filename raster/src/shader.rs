//! Vertex and pixel shader interfaces
//!
//! Shaders are bound to the renderer as type parameters, so every call in
//! the per-vertex and per-fragment loops is statically dispatched. Pixel
//! shaders work on a whole 2x2 quad at a time.

use core::f32::consts::FRAC_1_PI;

use glam::{Vec2, Vec3, Vec4};

use crate::fragment::{QuadAttributes, QuadFragment};
use crate::quad::{LANES, Vec3x4};
use crate::state::RenderState;
use crate::texture::Texture2D;
use crate::vertex::ProjectedVertex;

/// Ambient term added to the diffuse cosine
const AMBIENT: f32 = 0.2;

/// Blinn-Phong specular exponent
const SHININESS: f32 = 200.0;

/// Read-only inputs shared by every fragment of a frame
pub struct ShadingContext<'a> {
    /// Camera position in object space
    pub eye_pos: Vec3,
    pub light_dir: Vec3,
    pub state: &'a RenderState,
    /// Texture slots addressed by fragment texture id
    pub textures: &'a [Texture2D],
}

pub trait VertexShader: Sync {
    /// Transform one vertex to clip space
    fn execute(&self, state: &RenderState, position: Vec3, normal: Vec3, tex_coord: Vec2) -> ProjectedVertex;
}

pub trait PixelShader: Sync {
    /// Shade the four lanes of a quad, returning linear RGB per lane.
    ///
    /// Lanes not covered by the fragment are shaded too and discarded by the
    /// caller.
    fn shade(&self, fragment: &QuadFragment, attributes: &QuadAttributes, ctx: &ShadingContext<'_>) -> Vec3x4;
}

/// Model-view-projection transform, attributes passed through
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVertexShader;

impl VertexShader for DefaultVertexShader {
    fn execute(&self, state: &RenderState, position: Vec3, normal: Vec3, tex_coord: Vec2) -> ProjectedVertex {
        ProjectedVertex {
            projected: *state.model_view_projection() * position.extend(1.0),
            inv_w: 0.0,
            position,
            normal,
            tex_coord,
        }
    }
}

/// `(max(N.L, 0) + ambient) / pi * 2`
fn diffuse(normal: &Vec3x4, light_dir: Vec3) -> Vec4 {
    let light = Vec3x4::splat(light_dir.normalize_or_zero());
    let cosine = normal.dot(&light).max(Vec4::ZERO);
    (cosine + AMBIENT) * (2.0 * FRAC_1_PI)
}

/// White diffuse surface
#[derive(Debug, Clone, Copy, Default)]
pub struct LambertianShader;

impl PixelShader for LambertianShader {
    fn shade(&self, _fragment: &QuadFragment, attributes: &QuadAttributes, ctx: &ShadingContext<'_>) -> Vec3x4 {
        let normal = attributes.normal.normalize_or_zero();
        Vec3x4::gray(diffuse(&normal, ctx.light_dir))
    }
}

/// Diffuse surface modulated by the fragment's texture
#[derive(Debug, Clone, Copy, Default)]
pub struct LambertianAlbedoShader;

impl PixelShader for LambertianAlbedoShader {
    fn shade(&self, fragment: &QuadFragment, attributes: &QuadAttributes, ctx: &ShadingContext<'_>) -> Vec3x4 {
        let normal = attributes.normal.normalize_or_zero();
        let lit = Vec3x4::gray(diffuse(&normal, ctx.light_dir));

        let Some(texture) = ctx.textures.get(fragment.texture_id as usize) else {
            return lit;
        };

        // UV change across the quad drives mip selection
        let uv = &attributes.tex_coord;
        let lod = texture.lod(uv.lane(1) - uv.lane(0), uv.lane(2) - uv.lane(0));

        let mut albedo = Vec3x4::default();
        for lane in 0..LANES {
            let texel = texture.sample(uv.lane(lane), ctx.state.texture_filter, lod);
            albedo.set_lane(lane, texel.truncate());
        }
        lit * albedo
    }
}

/// White diffuse plus Blinn-Phong highlight
#[derive(Debug, Clone, Copy, Default)]
pub struct BlinnPhongShader;

impl PixelShader for BlinnPhongShader {
    fn shade(&self, _fragment: &QuadFragment, attributes: &QuadAttributes, ctx: &ShadingContext<'_>) -> Vec3x4 {
        let normal = attributes.normal.normalize_or_zero();
        let lambert = diffuse(&normal, ctx.light_dir);

        let light = Vec3x4::splat(ctx.light_dir.normalize_or_zero());
        let eye = (Vec3x4::splat(ctx.eye_pos) - attributes.position).normalize_or_zero();
        let half = (light + eye).normalize_or_zero();
        let cosine = normal.dot(&half).max(Vec4::ZERO);
        let specular = cosine.powf(SHININESS) * 2.0;

        Vec3x4::gray(lambert + specular)
    }
}
