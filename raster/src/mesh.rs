//! Triangle meshes and procedural geometry

use core::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3, Vec4};

use crate::error::{RenderError, Result};
use crate::texture::Texture2D;
use crate::vertex::MeshVertex;

/// Albedo of the texture bound to procedural meshes
const DEFAULT_ALBEDO: f32 = 0.9;

/// Per-vertex attribute access for the vertex stage.
///
/// Vertices are read from worker threads, hence the `Sync` bound.
pub trait VertexSource: Sync {
    fn vertex_count(&self) -> usize;
    fn position(&self, index: usize) -> Vec3;
    fn normal(&self, index: usize) -> Vec3;
    fn tex_coord(&self, index: usize) -> Vec2;
}

impl VertexSource for Vec<MeshVertex> {
    fn vertex_count(&self) -> usize {
        self.len()
    }

    fn position(&self, index: usize) -> Vec3 {
        self[index].position
    }

    fn normal(&self, index: usize) -> Vec3 {
        self[index].normal
    }

    fn tex_coord(&self, index: usize) -> Vec2 {
        self[index].tex_coord
    }
}

/// An indexed triangle list with per-triangle texture slots
#[derive(Debug, Clone, Default)]
pub struct Mesh<S = Vec<MeshVertex>> {
    pub vertices: S,
    /// Three indices per triangle, counter-clockwise when front facing
    pub indices: Vec<u32>,
    /// Texture slot per triangle; empty binds slot 0 everywhere
    pub texture_ids: Vec<u32>,
    pub textures: Vec<Texture2D>,
}

impl<S: VertexSource> Mesh<S> {
    pub fn new(vertices: S, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            texture_ids: Vec::new(),
            textures: Vec::new(),
        }
    }

    /// Replace every texture slot with a single texture
    pub fn with_texture(mut self, texture: Texture2D) -> Self {
        self.texture_ids.clear();
        self.textures = vec![texture];
        self
    }

    /// Get number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Texture slot of a triangle
    #[inline]
    pub fn texture_id(&self, triangle: usize) -> u32 {
        self.texture_ids.get(triangle).copied().unwrap_or(0)
    }

    /// Check index and texture references before rendering
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(RenderError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.vertex_count();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(RenderError::InvalidMesh(format!(
                "index {index} out of range for {vertex_count} vertices"
            )));
        }
        if !self.texture_ids.is_empty() {
            if self.texture_ids.len() != self.triangle_count() {
                return Err(RenderError::InvalidMesh(format!(
                    "{} texture ids for {} triangles",
                    self.texture_ids.len(),
                    self.triangle_count()
                )));
            }
            if let Some(&id) = self.texture_ids.iter().find(|&&id| id as usize >= self.textures.len()) {
                return Err(RenderError::InvalidMesh(format!(
                    "texture id {id} but only {} textures bound",
                    self.textures.len()
                )));
            }
        }
        Ok(())
    }

    fn with_default_texture(self) -> Self {
        self.with_texture(Texture2D::constant(Vec4::new(DEFAULT_ALBEDO, DEFAULT_ALBEDO, DEFAULT_ALBEDO, 1.0)))
    }
}

/// Square in the XZ plane centered at the origin, facing +Y
pub fn plane(size: f32, divisions: u32) -> Mesh {
    let divisions = divisions.max(1);
    let step = size / divisions as f32;
    let half = size * 0.5;
    let row = divisions + 1;

    let mut vertices = Vec::with_capacity((row * row) as usize);
    for k in 0..row {
        for i in 0..row {
            let position = Vec3::new(i as f32 * step - half, 0.0, k as f32 * step - half);
            let uv = Vec2::new(i as f32, k as f32) / divisions as f32;
            vertices.push(MeshVertex::new(position, Vec3::Y, uv));
        }
    }

    let mut indices = Vec::with_capacity((divisions * divisions * 6) as usize);
    for k in 0..divisions {
        for i in 0..divisions {
            let q = [k * row + i, k * row + i + 1, (k + 1) * row + i + 1, (k + 1) * row + i];
            indices.extend_from_slice(&[q[0], q[2], q[1], q[0], q[3], q[2]]);
        }
    }

    Mesh::new(vertices, indices).with_default_texture()
}

/// UV sphere centered at the origin
pub fn sphere(radius: f32, slices: u32, stacks: u32) -> Mesh {
    let slices = slices.max(3);
    let stacks = stacks.max(2);
    let row = slices + 1;

    let mut vertices = Vec::with_capacity((row * (stacks + 1)) as usize);
    for i in 0..=stacks {
        let v = i as f32 / stacks as f32;
        let theta = v * PI;
        for j in 0..=slices {
            let u = j as f32 / slices as f32;
            let phi = u * TAU;
            let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            vertices.push(MeshVertex::new(normal * radius, normal, Vec2::new(u, v)));
        }
    }

    let mut indices = Vec::with_capacity((slices * stacks * 6) as usize);
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * row + j;
            let b = a + 1;
            let c = b + row;
            let d = a + row;
            // a and b meet at the north pole, c and d at the south pole
            if i != 0 {
                indices.extend_from_slice(&[a, b, c]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[a, c, d]);
            }
        }
    }

    Mesh::new(vertices, indices).with_default_texture()
}

/// Unit cube centered at the origin with per-face normals
pub fn cube() -> Mesh {
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    ];
    let corners = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, right, up) in faces {
        let base = vertices.len() as u32;
        for uv in corners {
            let position = (normal + right * (uv.x * 2.0 - 1.0) + up * (uv.y * 2.0 - 1.0)) * 0.5;
            vertices.push(MeshVertex::new(position, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Mesh::new(vertices, indices).with_default_texture()
}
