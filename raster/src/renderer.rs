//! Renderer surface and the per-frame pipeline
//!
//! A frame runs as a sequence of data-parallel stages, each finished before
//! the next starts: vertex shading, clipping, perspective divide, triangle
//! setup, binning, tile rasterization, fragment shading, write-back and
//! resolve. Buffers are owned by the renderer and reused across frames.

use glam::{Mat4, Vec3};
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::clipper::{ClippedTriangle, clip};
use crate::error::Result;
use crate::framebuffer::{ClearFlags, FrameBuffer, pack_rgba};
use crate::math::raster_matrix;
use crate::mesh::{Mesh, VertexSource};
use crate::quad::LANES;
use crate::rasterizer::TileRasterizer;
use crate::shader::{DefaultVertexShader, LambertianAlbedoShader, PixelShader, ShadingContext, VertexShader};
use crate::state::{MsaaLevel, RenderState, RendererConfig};
use crate::texture::TextureFilter;
use crate::tiles::{Tile, TileBins};
use crate::triangle::RasterTriangle;
use crate::vertex::ProjectedVertex;

/// Per-stage counts of one rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub vertices: usize,
    pub triangles: usize,
    /// Triangles leaving the clipper
    pub clipped: usize,
    /// Triangles that survived setup
    pub rasterized: usize,
    /// Back-facing, degenerate or outside the guard band
    pub culled: usize,
    /// Triangle references across all tile bins
    pub bound: usize,
    pub fragments: usize,
}

/// Tile-binned triangle renderer with its buffers and per-frame scratch space
pub struct Renderer<V = DefaultVertexShader, P = LambertianAlbedoShader> {
    state: RenderState,
    config: RendererConfig,
    frame_buffer: FrameBuffer,
    vertex_shader: V,
    pixel_shader: P,
    vertices: Vec<ProjectedVertex>,
    clipped: Vec<ClippedTriangle>,
    triangles: Vec<RasterTriangle>,
    bins: TileBins,
    tiles: Vec<Tile>,
    /// First shaded quad of each tile
    tile_offsets: Vec<usize>,
    shaded: Vec<[u32; LANES]>,
    frame_count: u64,
}

impl Renderer {
    /// Renderer with the stock transform and textured diffuse shaders
    pub fn new(width: u32, height: u32, config: RendererConfig) -> Result<Self> {
        Self::with_shaders(width, height, config, DefaultVertexShader, LambertianAlbedoShader)
    }
}

impl<V: VertexShader, P: PixelShader> Renderer<V, P> {
    pub fn with_shaders(
        width: u32,
        height: u32,
        config: RendererConfig,
        vertex_shader: V,
        pixel_shader: P,
    ) -> Result<Self> {
        let msaa = MsaaLevel::new(config.msaa)?;
        let frame_buffer = FrameBuffer::new(width, height, msaa)?;
        let grid = *frame_buffer.grid();
        let partitions = config.partition_count();

        let mut state = RenderState::new(width, height);
        state.msaa = msaa;
        state.hierarchical = config.hierarchical;

        info!(
            width,
            height,
            samples = msaa.samples(),
            tiles = grid.tile_count(),
            partitions,
            "renderer initialized"
        );

        Ok(Self {
            state,
            config,
            frame_buffer,
            vertex_shader,
            pixel_shader,
            vertices: Vec::new(),
            clipped: Vec::new(),
            triangles: Vec::new(),
            bins: TileBins::new(partitions, grid.tile_count()),
            tiles: grid.tiles(),
            tile_offsets: Vec::new(),
            shaded: Vec::new(),
            frame_count: 0,
        })
    }

    /// Reallocate for a new resolution and reset the raster transform to match
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.frame_buffer.resize(width, height, self.state.msaa)?;
        self.rebuild_tiles();

        let (model_view, projection) = (*self.state.model_view(), *self.state.projection());
        self.state.set_transform(model_view, projection, raster_matrix(width, height));
        info!(width, height, "renderer resized");
        Ok(())
    }

    /// Switch the sample count, reallocating the sample planes
    pub fn set_msaa_mode(&mut self, log2_samples: u32) -> Result<()> {
        let msaa = MsaaLevel::new(log2_samples)?;
        let (width, height) = (self.frame_buffer.width(), self.frame_buffer.height());
        self.frame_buffer.resize(width, height, msaa)?;
        self.state.msaa = msaa;
        info!(samples = msaa.samples(), "msaa mode changed");
        Ok(())
    }

    fn rebuild_tiles(&mut self) {
        let grid = *self.frame_buffer.grid();
        self.tiles = grid.tiles();
        self.bins.resize(self.config.partition_count(), grid.tile_count());
    }

    pub fn set_transform(&mut self, model_view: Mat4, projection: Mat4, to_raster: Mat4) {
        self.state.set_transform(model_view, projection, to_raster);
    }

    pub fn set_texture_filter(&mut self, filter: TextureFilter) {
        self.state.texture_filter = filter;
    }

    pub fn set_hierarchical(&mut self, enabled: bool) {
        self.state.hierarchical = enabled;
    }

    pub fn set_back_face_cull(&mut self, enabled: bool) {
        self.state.back_face_cull = enabled;
    }

    pub fn set_clip_all_planes(&mut self, enabled: bool) {
        self.state.clip_all_planes = enabled;
    }

    pub fn set_light_dir(&mut self, light_dir: Vec3) {
        self.state.light_dir = light_dir;
    }

    /// Draw a mesh into a freshly cleared frame and resolve it
    pub fn render_mesh<S: VertexSource>(&mut self, mesh: &Mesh<S>) -> Result<FrameStats> {
        mesh.validate()?;

        let state = &self.state;
        let mut stats = FrameStats {
            vertices: mesh.vertices.vertex_count(),
            triangles: mesh.triangle_count(),
            ..Default::default()
        };

        self.frame_buffer.clear(ClearFlags::COLOR | ClearFlags::DEPTH);

        // Vertex shading
        let vertex_shader = &self.vertex_shader;
        let source = &mesh.vertices;
        (0..source.vertex_count())
            .into_par_iter()
            .map(|i| vertex_shader.execute(state, source.position(i), source.normal(i), source.tex_coord(i)))
            .collect_into_vec(&mut self.vertices);

        // Clipping appends new vertices, so it runs on one thread
        clip(&mut self.vertices, &mesh.indices, state.clip_all_planes, &mut self.clipped);
        stats.clipped = self.clipped.len();

        self.vertices.par_iter_mut().for_each(ProjectedVertex::divide);

        let vertices = &self.vertices;
        let raster = state.raster();
        let cull = state.back_face_cull;
        self.triangles.clear();
        self.triangles.par_extend(
            self.clipped
                .par_iter()
                .filter_map(|t| setup_triangle(t, vertices, mesh, raster, cull)),
        );
        stats.rasterized = self.triangles.len();
        stats.culled = stats.clipped - stats.rasterized;

        self.bins.bin(&self.triangles, self.frame_buffer.grid());
        stats.bound = self.bins.total();

        {
            let rasterizer = TileRasterizer::new(&self.triangles, self.frame_buffer.msaa(), state.hierarchical);
            let bins = &self.bins;
            let mut targets = self.frame_buffer.tile_targets();
            self.tiles
                .par_iter_mut()
                .zip(targets.par_iter_mut())
                .for_each(|(tile, target)| {
                    let refs = bins.refs(tile.id as usize);
                    rasterizer.rasterize_tile(tile, refs, target);
                });
        }

        self.tile_offsets.clear();
        for tile in &self.tiles {
            self.tile_offsets.push(stats.fragments);
            stats.fragments += tile.fragments.len();
        }

        // Fragment shading over every tile's fragments, in tile order
        let ctx = ShadingContext {
            eye_pos: state.eye_position(),
            light_dir: state.light_dir,
            state,
            textures: &mesh.textures,
        };
        let pixel_shader = &self.pixel_shader;
        self.shaded.clear();
        self.shaded.par_extend(
            self.tiles
                .par_iter()
                .flat_map_iter(|tile| tile.fragments.iter())
                .map(|fragment| {
                    let attributes = fragment.interpolate(vertices);
                    let rgb = pixel_shader.shade(fragment, &attributes, &ctx);
                    core::array::from_fn(|lane| pack_rgba(rgb.lane(lane)))
                }),
        );

        {
            let shaded = &self.shaded;
            let offsets = &self.tile_offsets;
            let mut targets = self.frame_buffer.tile_targets();
            targets
                .par_iter_mut()
                .zip(self.tiles.par_iter())
                .for_each(|(target, tile)| {
                    for fragment in &tile.fragments {
                        let slot = offsets[fragment.tile_id as usize] + fragment.intra_tile_index as usize;
                        let quad = target.quad_index(fragment.x, fragment.y);
                        target.write_quad(quad, fragment.coverage, shaded[slot]);
                    }
                });
        }

        self.frame_buffer.resolve();
        self.frame_count += 1;

        debug!(
            frame = self.frame_count,
            vertices = self.vertices.len(),
            clipped = stats.clipped,
            rasterized = stats.rasterized,
            culled = stats.culled,
            bound = stats.bound,
            fragments = stats.fragments,
            "frame rendered"
        );
        Ok(stats)
    }

    /// Resolved RGBA8 image, top row first
    pub fn back_buffer(&self) -> &[u8] {
        self.frame_buffer.back_buffer()
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame_buffer
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Frames rendered since construction
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Set up one clipped triangle, or its reverse when back faces are drawn
fn setup_triangle<S: VertexSource>(
    t: &ClippedTriangle,
    vertices: &[ProjectedVertex],
    mesh: &Mesh<S>,
    raster: &Mat4,
    cull: bool,
) -> Option<RasterTriangle> {
    let ndc = t.indices.map(|i| vertices[i as usize].ndc());
    let texture_id = mesh.texture_id(t.source as usize);

    let front = RasterTriangle::setup(ndc, t.indices, texture_id, raster);
    if front.is_some() || cull {
        if front.is_none() {
            trace!(source = t.source, "triangle culled");
        }
        return front;
    }

    let [a, b, c] = t.indices;
    let back = RasterTriangle::setup([ndc[0], ndc[2], ndc[1]], [a, c, b], texture_id, raster);
    if back.is_none() {
        trace!(source = t.source, "degenerate triangle dropped");
    }
    back
}
