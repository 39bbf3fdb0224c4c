//! Per-tile hierarchical rasterization
//!
//! Each triangle bound to a tile is classified against the tile's quadrants
//! with one 4-lane reject test and one 4-lane accept test per edge. Rejected
//! quadrants are dropped, fully covered ones are filled without edge tests,
//! and the rest are subdivided until they reach [`FINE_BLOCK_SIZE`], where
//! coverage is tested quad by quad.

use glam::{IVec2, IVec4};

use crate::fragment::{CoverageMask, QuadFragment};
use crate::framebuffer::{TileTarget, sample_offset};
use crate::quad::{ALL_LANES, LANE_DX, LANE_DY, LANES, QUAD_CENTER_X, QUAD_CENTER_Y, inside_all, non_negative};
use crate::state::MsaaLevel;
use crate::tiles::{TILE_SIZE, Tile, TriangleRef};
use crate::triangle::{RasterTriangle, SUBPIXEL_BITS, SUBPIXEL_ONE, corner_offset};

/// Blocks at or below this size in pixels are fine rasterized
pub const FINE_BLOCK_SIZE: i32 = 8;

/// Rasterizes bound triangles into one tile at a time
pub struct TileRasterizer<'a> {
    triangles: &'a [RasterTriangle],
    msaa: MsaaLevel,
    hierarchical: bool,
}

impl<'a> TileRasterizer<'a> {
    pub fn new(triangles: &'a [RasterTriangle], msaa: MsaaLevel, hierarchical: bool) -> Self {
        Self {
            triangles,
            msaa,
            hierarchical,
        }
    }

    /// Rasterize every referenced triangle into `tile`, replacing its fragments
    pub fn rasterize_tile<'r>(
        &self,
        tile: &mut Tile,
        refs: impl Iterator<Item = &'r TriangleRef>,
        target: &mut TileTarget<'_>,
    ) {
        tile.fragments.clear();
        for r in refs {
            let tri = &self.triangles[r.triangle as usize];
            if r.trivial_accept {
                self.trivial_accept_block(tri, tile.min, TILE_SIZE, tile, target);
            } else if self.hierarchical {
                self.coarse_rasterize(tri, r.accept_edge, tile.min, TILE_SIZE, tile, target);
            } else {
                self.fine_rasterize(tri, r.accept_edge, tile.min, TILE_SIZE, tile, target);
            }
        }
    }

    /// Classify the four quadrants of a block and recurse
    fn coarse_rasterize(
        &self,
        tri: &RasterTriangle,
        accept: [bool; 3],
        origin: IVec2,
        size: i32,
        tile: &mut Tile,
        target: &mut TileTarget<'_>,
    ) {
        let half = size / 2;
        let (reject_step, accept_step) = tri.step_vectors(size);
        let base = origin * SUBPIXEL_ONE;

        let mut rejected = 0;
        let mut accepted = [ALL_LANES; 3];
        for i in 0..3 {
            if accept[i] {
                continue;
            }
            let e = IVec4::splat(tri.edge_at(i, base));
            rejected |= ALL_LANES & !non_negative(e + reject_step[i]);
            accepted[i] = non_negative(e + accept_step[i]);
        }

        for q in 0..LANES {
            let bit = 1 << q;
            if rejected & bit != 0 {
                continue;
            }
            let quadrant = origin + corner_offset(q as u8) * half;
            if quadrant.x >= tile.max.x || quadrant.y >= tile.max.y {
                continue;
            }

            let edges = accepted.map(|lanes| lanes & bit != 0);
            if edges.iter().all(|&a| a) {
                self.trivial_accept_block(tri, quadrant, half, tile, target);
            } else if half > FINE_BLOCK_SIZE {
                self.coarse_rasterize(tri, edges, quadrant, half, tile, target);
            } else {
                self.fine_rasterize(tri, edges, quadrant, half, tile, target);
            }
        }
    }

    /// Fill a block the triangle fully covers; only depth is tested
    fn trivial_accept_block(
        &self,
        tri: &RasterTriangle,
        origin: IVec2,
        size: i32,
        tile: &mut Tile,
        target: &mut TileTarget<'_>,
    ) {
        let max = (origin + size).min(tile.max);
        self.walk_quads(tri, [true; 3], origin, max, tile, target);
    }

    /// Test coverage quad by quad over the triangle's bounds within a block
    fn fine_rasterize(
        &self,
        tri: &RasterTriangle,
        accept: [bool; 3],
        origin: IVec2,
        size: i32,
        tile: &mut Tile,
        target: &mut TileTarget<'_>,
    ) {
        let (bmin, bmax) = tri.bounds();
        let lo = IVec2::new(bmin.x >> SUBPIXEL_BITS, bmin.y >> SUBPIXEL_BITS)
            .max(origin)
            .max(tile.min);
        let hi = (IVec2::new(bmax.x >> SUBPIXEL_BITS, bmax.y >> SUBPIXEL_BITS) + 1)
            .min(origin + size)
            .min(tile.max);
        if lo.x >= hi.x || lo.y >= hi.y {
            return;
        }

        // Quads start on even pixels
        let lo = IVec2::new(lo.x & !1, lo.y & !1);
        self.walk_quads(tri, accept, lo, hi, tile, target);
    }

    /// Visit the quads of `[min, max)`, stepping edge values incrementally
    fn walk_quads(
        &self,
        tri: &RasterTriangle,
        accept: [bool; 3],
        min: IVec2,
        max: IVec2,
        tile: &mut Tile,
        target: &mut TileTarget<'_>,
    ) {
        let quad_step = 2 * SUBPIXEL_ONE;
        let step_x = tri.b.map(|b| IVec4::splat(b * quad_step));
        let step_y = tri.c.map(|c| IVec4::splat(c * quad_step));
        let mut row = [0, 1, 2].map(|i| tri.edge_batch(i, min * SUBPIXEL_ONE, QUAD_CENTER_X, QUAD_CENTER_Y));

        for y in (min.y..max.y).step_by(2) {
            let mut e = row;
            for x in (min.x..max.x).step_by(2) {
                let lanes = lanes_within(x, y, max);
                let quad = target.quad_index(x, y);
                let coverage = self.quad_coverage(tri, &e, accept, lanes, quad, target);
                if coverage.any() {
                    let (lambda0, lambda1) = tri.barycentric(&e);
                    let intra_tile_index = tile.fragments.len() as u32;
                    tile.fragments.push(QuadFragment {
                        vertex_ids: tri.vertex_ids,
                        texture_id: tri.texture_id,
                        lambda0,
                        lambda1,
                        x,
                        y,
                        coverage,
                        tile_id: tile.id,
                        intra_tile_index,
                    });
                }
                for i in 0..3 {
                    e[i] += step_x[i];
                }
            }
            for i in 0..3 {
                row[i] += step_y[i];
            }
        }
    }

    /// Coverage and depth test of every sample of one quad.
    ///
    /// `e` holds edge values at the pixel centers; accepted edges are treated
    /// as always inside.
    fn quad_coverage(
        &self,
        tri: &RasterTriangle,
        e: &[IVec4; 3],
        accept: [bool; 3],
        lanes: u32,
        quad: usize,
        target: &mut TileTarget<'_>,
    ) -> CoverageMask {
        let mut mask = CoverageMask::default();
        let samples = self.msaa.samples();

        if samples == 1 {
            let covered = lanes & coverage(e, accept);
            if covered != 0 {
                let (l0, l1) = tri.barycentric(e);
                mask.set_lanes(0, target.z_test(quad, 0, tri.depth(l0, l1), covered));
            }
            return mask;
        }

        for sample in 0..samples {
            let off = sample_offset(self.msaa, sample);
            let es = [0, 1, 2].map(|i| e[i] + IVec4::splat(tri.b[i] * off.x + tri.c[i] * off.y));
            let covered = lanes & coverage(&es, accept);
            if covered == 0 {
                continue;
            }
            let (l0, l1) = tri.barycentric(&es);
            mask.set_lanes(sample, target.z_test(quad, sample, tri.depth(l0, l1), covered));
        }
        mask
    }
}

/// Lanes inside all edges that are not already accepted
#[inline]
fn coverage(e: &[IVec4; 3], accept: [bool; 3]) -> u32 {
    if accept == [true; 3] {
        return ALL_LANES;
    }
    let masked = [0, 1, 2].map(|i| if accept[i] { IVec4::ZERO } else { e[i] });
    inside_all(&masked)
}

/// Lanes of the quad at `(x, y)` that lie below `max`
#[inline]
fn lanes_within(x: i32, y: i32, max: IVec2) -> u32 {
    let mut lanes = 0;
    for lane in 0..LANES {
        if x + LANE_DX[lane] < max.x && y + LANE_DY[lane] < max.y {
            lanes |= 1 << lane;
        }
    }
    lanes
}
