//! Tile-based software rasterizer
//!
//! Clips projected triangles, sets them up in 4-bit fixed point, bins them
//! into 32x32 tiles and rasterizes each tile hierarchically in 2x2 quads with
//! up to 32 samples per pixel. Covered quads are shaded in parallel and
//! resolved into an RGBA8 image.

pub mod clipper;
pub mod error;
pub mod fragment;
pub mod framebuffer;
pub mod math;
pub mod mesh;
pub mod quad;
pub mod rasterizer;
pub mod renderer;
pub mod shader;
pub mod state;
pub mod texture;
pub mod tiles;
pub mod triangle;
pub mod vertex;

pub use error::{RenderError, Result};
pub use framebuffer::{ClearFlags, FrameBuffer};
pub use mesh::{Mesh, VertexSource};
pub use renderer::{FrameStats, Renderer};
pub use shader::{
    BlinnPhongShader, DefaultVertexShader, LambertianAlbedoShader, LambertianShader, PixelShader, ShadingContext,
    VertexShader,
};
pub use state::{MsaaLevel, RenderState, RendererConfig};
pub use texture::{Texture2D, TextureFilter};
pub use vertex::{MeshVertex, ProjectedVertex};
