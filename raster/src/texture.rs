//! Textures and filtering

use glam::{Vec2, Vec4};

use crate::error::{RenderError, Result};

/// Texture filtering mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    /// Closest texel of the base level
    Nearest,
    /// Bilinear filtering of the base level
    Linear,
    /// Bilinear filtering of two mip levels, blended by LOD
    #[default]
    Trilinear,
}

#[derive(Debug, Clone)]
struct MipLevel {
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
}

impl MipLevel {
    #[inline]
    fn texel(&self, x: i32, y: i32) -> Vec4 {
        let x = x.rem_euclid(self.width as i32) as usize;
        let y = y.rem_euclid(self.height as i32) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Half-resolution box-filtered copy
    fn downsample(&self) -> MipLevel {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let sx = (x * 2).min(self.width as i32 - 1);
                let sy = (y * 2).min(self.height as i32 - 1);
                let sx1 = (sx + 1).min(self.width as i32 - 1);
                let sy1 = (sy + 1).min(self.height as i32 - 1);
                let sum = self.texel(sx, sy) + self.texel(sx1, sy) + self.texel(sx, sy1) + self.texel(sx1, sy1);
                texels.push(sum * 0.25);
            }
        }
        MipLevel {
            width,
            height,
            texels,
        }
    }

    fn nearest(&self, uv: Vec2) -> Vec4 {
        let x = (uv.x * self.width as f32).floor() as i32;
        let y = (uv.y * self.height as f32).floor() as i32;
        self.texel(x, y)
    }

    fn bilinear(&self, uv: Vec2) -> Vec4 {
        let fx = uv.x * self.width as f32 - 0.5;
        let fy = uv.y * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let bottom = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), tx);
        let top = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), tx);
        bottom.lerp(top, ty)
    }
}

/// An RGBA float texture with a full mip chain and wrap addressing
#[derive(Debug, Clone)]
pub struct Texture2D {
    levels: Vec<MipLevel>,
}

impl Texture2D {
    /// Build a texture from linear RGBA texels, generating mip levels
    pub fn new(width: u32, height: u32, texels: Vec<Vec4>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        if texels.len() != (width * height) as usize {
            return Err(RenderError::InvalidMesh(format!(
                "texture {}x{} expects {} texels, got {}",
                width,
                height,
                width * height,
                texels.len()
            )));
        }

        let mut levels = vec![MipLevel {
            width,
            height,
            texels,
        }];
        while let Some(last) = levels.last() {
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// Single-texel texture returning `color` everywhere
    pub fn constant(color: Vec4) -> Self {
        Self {
            levels: vec![MipLevel {
                width: 1,
                height: 1,
                texels: vec![color],
            }],
        }
    }

    /// Build from 8-bit RGBA bytes, row-major
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let texels = bytes
            .chunks_exact(4)
            .map(|p| Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0)
            .collect();
        Self::new(width, height, texels)
    }

    /// Checkerboard of `cells` x `cells` squares alternating between two colors
    pub fn checkerboard(size: u32, cells: u32, a: Vec4, b: Vec4) -> Result<Self> {
        let cell = (size / cells.max(1)).max(1);
        let texels = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b }
            })
            .collect();
        Self::new(size, size, texels)
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    /// Number of mip levels including the base level
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Mip level of detail from the UV change across one pixel in x and y
    pub fn lod(&self, duv_dx: Vec2, duv_dy: Vec2) -> f32 {
        let size = Vec2::new(self.width() as f32, self.height() as f32);
        let rho = (duv_dx * size).length().max((duv_dy * size).length());
        if rho > 0.0 { rho.log2().max(0.0) } else { 0.0 }
    }

    /// Sample the texture at `uv`
    pub fn sample(&self, uv: Vec2, filter: TextureFilter, lod: f32) -> Vec4 {
        let uv = uv - uv.floor();
        match filter {
            TextureFilter::Nearest => self.levels[0].nearest(uv),
            TextureFilter::Linear => self.levels[0].bilinear(uv),
            TextureFilter::Trilinear => {
                let max_level = (self.levels.len() - 1) as f32;
                let lod = lod.clamp(0.0, max_level);
                let base = lod.floor();
                let t = lod - base;
                let l0 = base as usize;
                let l1 = (l0 + 1).min(self.levels.len() - 1);
                self.levels[l0].bilinear(uv).lerp(self.levels[l1].bilinear(uv), t)
            }
        }
    }
}
