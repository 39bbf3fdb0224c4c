//! Tiled multisample framebuffer
//!
//! Depth and color samples are stored tile by tile, then quad by quad, then
//! sample by sample, with the four pixels of a quad packed into one 4-lane
//! value. A quad's depth test for one sample touches a single `Vec4`.
//!
//! Raster row 0 is the bottom of the image. The resolved plane is stored top
//! row first, so resolve flips rows.

use bitflags::bitflags;
use glam::{BVec4, IVec2, UVec4, Vec3, Vec4};
use rayon::prelude::*;

use crate::error::{RenderError, Result};
use crate::fragment::CoverageMask;
use crate::quad::{LANES, lanes_from_bits, select};
use crate::state::MsaaLevel;
use crate::tiles::{QUADS_PER_TILE, TILE_SIZE, TileGrid};
use crate::triangle::MAX_RESOLUTION;

bitflags! {
    /// Buffers reset by [`FrameBuffer::clear`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1;
        const DEPTH = 1 << 1;
    }
}

const SAMPLES_1X: [[i32; 2]; 1] = [[0, 0]];

const SAMPLES_2X: [[i32; 2]; 2] = [[4, 4], [-4, -4]];

const SAMPLES_4X: [[i32; 2]; 4] = [[-2, -6], [6, -2], [-6, 2], [2, 6]];

const SAMPLES_8X: [[i32; 2]; 8] = [
    [1, -3],
    [-1, 3],
    [5, 1],
    [-3, -5],
    [-5, 5],
    [-7, -1],
    [3, 7],
    [7, -7],
];

const SAMPLES_16X: [[i32; 2]; 16] = [
    [1, 1],
    [-1, -3],
    [-3, 2],
    [4, -1],
    [-5, -2],
    [2, 5],
    [5, 3],
    [3, -5],
    [-2, 6],
    [0, -7],
    [-4, -6],
    [-6, 4],
    [-8, 0],
    [7, -4],
    [6, 7],
    [-7, -8],
];

const SAMPLES_32X: [[i32; 2]; 32] = [
    [1, 1],
    [-1, -3],
    [-3, 2],
    [4, -1],
    [-5, -2],
    [2, 5],
    [5, 3],
    [3, -5],
    [-2, 6],
    [0, -7],
    [-4, -6],
    [-6, 4],
    [-8, 0],
    [7, -4],
    [6, 7],
    [-7, -8],
    [1, 3],
    [-3, -3],
    [-3, 0],
    [6, -2],
    [-7, -1],
    [3, 4],
    [7, 3],
    [3, -6],
    [-2, 7],
    [0, -4],
    [-2, -5],
    [-7, 6],
    [-8, 3],
    [4, -1],
    [2, 7],
    [4, -8],
];

/// Sub-pixel sample offsets per MSAA level, in 1/16 pixel from the pixel center
pub const MULTISAMPLE_OFFSETS: [&[[i32; 2]]; 6] = [
    &SAMPLES_1X,
    &SAMPLES_2X,
    &SAMPLES_4X,
    &SAMPLES_8X,
    &SAMPLES_16X,
    &SAMPLES_32X,
];

/// Offset of one sample at the given MSAA level
#[inline]
pub fn sample_offset(msaa: MsaaLevel, sample: usize) -> IVec2 {
    let [x, y] = MULTISAMPLE_OFFSETS[msaa.log2() as usize][sample];
    IVec2::new(x, y)
}

/// Pack a linear color into RGBA8, alpha opaque
#[inline]
pub fn pack_rgba(color: Vec3) -> u32 {
    let c = color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0 + 0.5;
    u32::from_ne_bytes([c.x as u8, c.y as u8, c.z as u8, 255])
}

/// Lane of a pixel within its quad
#[inline]
fn lane_of(x: i32, y: i32) -> usize {
    ((y & 1) * 2 + (x & 1)) as usize
}

/// Quad index of a pixel within its tile
#[inline]
fn quad_of(x: i32, y: i32) -> usize {
    let mask = TILE_SIZE - 1;
    (((y & mask) >> 1) * (TILE_SIZE / 2) + ((x & mask) >> 1)) as usize
}

/// Nearest-wins depth test of four lanes; returns passing lanes
#[inline]
fn depth_test(stored: &mut Vec4, depths: Vec4, lanes: u32) -> u32 {
    let pass = depths.cmple(*stored).bitmask() & lanes;
    *stored = select(pass, depths, *stored);
    pass
}

/// Multisampled depth and color planes, stored tile by tile
pub struct FrameBuffer {
    width: u32,
    height: u32,
    msaa: MsaaLevel,
    grid: TileGrid,
    depth: Vec<Vec4>,
    color: Vec<UVec4>,
    resolved: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, msaa: MsaaLevel) -> Result<Self> {
        let mut fb = Self {
            width: 0,
            height: 0,
            msaa,
            grid: TileGrid::new(0, 0),
            depth: Vec::new(),
            color: Vec::new(),
            resolved: Vec::new(),
        };
        fb.resize(width, height, msaa)?;
        Ok(fb)
    }

    /// Reallocate every plane, cleared
    pub fn resize(&mut self, width: u32, height: u32, msaa: MsaaLevel) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        if width > MAX_RESOLUTION || height > MAX_RESOLUTION {
            return Err(RenderError::ResolutionTooLarge {
                width,
                height,
                max: MAX_RESOLUTION,
            });
        }

        self.width = width;
        self.height = height;
        self.msaa = msaa;
        self.grid = TileGrid::new(width, height);

        let samples = self.grid.tile_count() * QUADS_PER_TILE * msaa.samples();
        self.depth = vec![Vec4::ONE; samples];
        self.color = vec![UVec4::ZERO; samples];
        self.resolved = vec![0; (width * height) as usize];
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn msaa(&self) -> MsaaLevel {
        self.msaa
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Storage index of sample 0 of the quad holding a pixel, and its lane
    #[inline]
    fn slot(&self, x: i32, y: i32) -> (usize, usize) {
        let tile = self.grid.tile_of(x, y);
        ((tile * QUADS_PER_TILE + quad_of(x, y)) * self.msaa.samples(), lane_of(x, y))
    }

    /// Depth test the quad with lower-left pixel `(x, y)` for one sample.
    ///
    /// Lanes active in `lane_mask` whose candidate depth is less than or equal
    /// to the stored depth are written and reported as passing.
    pub fn z_test_quad(&mut self, depths: Vec4, x: i32, y: i32, sample: usize, lane_mask: BVec4) -> BVec4 {
        let (base, _) = self.slot(x, y);
        let pass = depth_test(&mut self.depth[base + sample], depths, lane_mask.bitmask());
        lanes_from_bits(pass)
    }

    /// Write one sample of one pixel
    pub fn set_pixel(&mut self, x: i32, y: i32, sample: usize, rgba: u32) {
        let (base, lane) = self.slot(x, y);
        self.color[base + sample][lane] = rgba;
    }

    /// Stored depth of one sample
    pub fn depth(&self, x: i32, y: i32, sample: usize) -> f32 {
        let (base, lane) = self.slot(x, y);
        self.depth[base + sample][lane]
    }

    /// Stored color of one sample, before resolve
    pub fn sample_color(&self, x: i32, y: i32, sample: usize) -> u32 {
        let (base, lane) = self.slot(x, y);
        self.color[base + sample][lane]
    }

    /// Resolved RGBA8 pixel at raster position `(x, y)`
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        let row = (self.height as i32 - 1 - y) as usize;
        self.resolved[row * self.width as usize + x as usize].to_ne_bytes()
    }

    pub fn clear(&mut self, flags: ClearFlags) {
        if flags.contains(ClearFlags::DEPTH) {
            self.depth.par_iter_mut().for_each(|d| *d = Vec4::ONE);
        }
        if flags.contains(ClearFlags::COLOR) {
            self.color.par_iter_mut().for_each(|c| *c = UVec4::ZERO);
            self.resolved.par_iter_mut().for_each(|c| *c = 0);
        }
    }

    /// Box-filter the samples of every pixel into the resolved plane
    pub fn resolve(&mut self) {
        let samples = self.msaa.samples();
        let height = self.height as i32;
        let width = self.width as usize;
        let color = &self.color;
        let grid = self.grid;

        self.resolved
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, out)| {
                let y = height - 1 - row as i32;
                for (x, px) in out.iter_mut().enumerate() {
                    let x = x as i32;
                    let base = (grid.tile_of(x, y) * QUADS_PER_TILE + quad_of(x, y)) * samples;
                    let lane = lane_of(x, y);
                    if samples == 1 {
                        *px = color[base][lane];
                        continue;
                    }

                    let mut sum = [0u32; 4];
                    for sample in &color[base..base + samples] {
                        for (acc, c) in sum.iter_mut().zip(sample[lane].to_ne_bytes()) {
                            *acc += c as u32;
                        }
                    }
                    let n = samples as u32;
                    *px = u32::from_ne_bytes(sum.map(|s| ((s + n / 2) / n) as u8));
                }
            });
    }

    /// Resolved color as RGBA8 bytes, top row first
    pub fn back_buffer(&self) -> &[u8] {
        bytemuck::cast_slice(&self.resolved)
    }

    /// Disjoint per-tile views for parallel rasterization and write-back
    pub fn tile_targets(&mut self) -> Vec<TileTarget<'_>> {
        let samples = self.msaa.samples();
        let per_tile = QUADS_PER_TILE * samples;
        let grid = self.grid;
        self.depth
            .chunks_mut(per_tile)
            .zip(self.color.chunks_mut(per_tile))
            .enumerate()
            .map(|(id, (depth, color))| TileTarget {
                tile_id: id as u32,
                origin: grid.tile_origin(id),
                samples,
                depth,
                color,
            })
            .collect()
    }
}

/// Exclusive view of one tile's depth and color samples
pub struct TileTarget<'a> {
    pub tile_id: u32,
    pub origin: IVec2,
    samples: usize,
    depth: &'a mut [Vec4],
    color: &'a mut [UVec4],
}

impl TileTarget<'_> {
    /// Quad index of the quad whose lower-left pixel is `(x, y)`
    #[inline]
    pub fn quad_index(&self, x: i32, y: i32) -> usize {
        quad_of(x, y)
    }

    /// Depth test one sample of a quad; returns passing lanes as a bitmask
    #[inline]
    pub fn z_test(&mut self, quad: usize, sample: usize, depths: Vec4, lanes: u32) -> u32 {
        depth_test(&mut self.depth[quad * self.samples + sample], depths, lanes)
    }

    /// Write shaded lane colors to every covered sample of a quad
    pub fn write_quad(&mut self, quad: usize, coverage: CoverageMask, colors: [u32; LANES]) {
        let base = quad * self.samples;
        for (sample, slot) in self.color[base..base + self.samples].iter_mut().enumerate() {
            let lanes = coverage.lanes(sample);
            for (lane, color) in colors.iter().enumerate() {
                if lanes & (1 << lane) != 0 {
                    slot[lane] = *color;
                }
            }
        }
    }
}
