//! Screen tiles and triangle binning

use glam::IVec2;
use rayon::prelude::*;

use crate::fragment::QuadFragment;
use crate::triangle::{RasterTriangle, SUBPIXEL_BITS, SUBPIXEL_ONE};

/// log2 of the tile size in pixels
pub const TILE_SIZE_LOG2: u32 = 5;

/// Tile size in pixels (32x32 keeps a tile's depth samples cache resident)
pub const TILE_SIZE: i32 = 1 << TILE_SIZE_LOG2;

/// 2x2 quads per tile
pub const QUADS_PER_TILE: usize = (TILE_SIZE as usize / 2) * (TILE_SIZE as usize / 2);

/// Triangles spanning at most this many tiles per axis skip the corner tests
const SMALL_TRIANGLE_TILES: i32 = 3;

/// A rendering tile
#[derive(Debug, Clone)]
pub struct Tile {
    pub id: u32,
    /// Lower-left pixel
    pub min: IVec2,
    /// Exclusive upper bound, clamped to the screen
    pub max: IVec2,
    /// Fragments emitted while rasterizing this tile
    pub fragments: Vec<QuadFragment>,
}

impl Tile {
    /// Fixed-point lower-left corner
    #[inline]
    pub fn fixed_min(&self) -> IVec2 {
        self.min * SUBPIXEL_ONE
    }
}

/// A triangle bound to a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleRef {
    pub triangle: u32,
    /// Edges known to contain the whole tile
    pub accept_edge: [bool; 3],
    /// All three edges contain the tile
    pub trivial_accept: bool,
}

impl TriangleRef {
    pub fn new(triangle: u32, accept_edge: [bool; 3]) -> Self {
        Self {
            triangle,
            accept_edge,
            trivial_accept: accept_edge.iter().all(|&a| a),
        }
    }
}

/// Tile layout of a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    cols: u32,
    rows: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cols: width.div_ceil(TILE_SIZE as u32),
            rows: height.div_ceil(TILE_SIZE as u32),
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile_count(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    /// Tile containing a pixel
    #[inline]
    pub fn tile_of(&self, x: i32, y: i32) -> usize {
        ((y >> TILE_SIZE_LOG2) as u32 * self.cols + (x >> TILE_SIZE_LOG2) as u32) as usize
    }

    /// Lower-left pixel of a tile
    #[inline]
    pub fn tile_origin(&self, id: usize) -> IVec2 {
        let id = id as u32;
        IVec2::new((id % self.cols) as i32, (id / self.cols) as i32) * TILE_SIZE
    }

    /// Build all tiles, row by row from the bottom of the screen
    pub fn tiles(&self) -> Vec<Tile> {
        let screen = IVec2::new(self.width as i32, self.height as i32);
        (0..self.tile_count())
            .map(|id| {
                let min = self.tile_origin(id);
                Tile {
                    id: id as u32,
                    min,
                    max: (min + TILE_SIZE).min(screen),
                    fragments: Vec::new(),
                }
            })
            .collect()
    }

    /// Inclusive range of tiles a triangle's bounding box overlaps
    pub fn tile_range(&self, tri: &RasterTriangle) -> Option<(IVec2, IVec2)> {
        let (min, max) = tri.bounds();
        let shift = TILE_SIZE_LOG2 + SUBPIXEL_BITS;
        let last = IVec2::new(self.cols as i32 - 1, self.rows as i32 - 1);

        let lo = IVec2::new(min.x >> shift, min.y >> shift);
        let hi = IVec2::new(max.x >> shift, max.y >> shift);
        if hi.x < 0 || hi.y < 0 || lo.x > last.x || lo.y > last.y {
            return None;
        }
        Some((lo.max(IVec2::ZERO), hi.min(last)))
    }
}

/// Bin one triangle into per-tile lists
pub fn bin_triangle(tri: &RasterTriangle, index: u32, grid: &TileGrid, bins: &mut [Vec<TriangleRef>]) {
    let Some((lo, hi)) = grid.tile_range(tri) else {
        return;
    };
    let cols = grid.cols() as i32;
    let span = hi - lo + IVec2::ONE;

    // Small triangles are cheaper to reject during rasterization
    if span.x <= SMALL_TRIANGLE_TILES && span.y <= SMALL_TRIANGLE_TILES {
        for ty in lo.y..=hi.y {
            for tx in lo.x..=hi.x {
                bins[(ty * cols + tx) as usize].push(TriangleRef::new(index, [false; 3]));
            }
        }
        return;
    }

    let tile_fixed = TILE_SIZE * SUBPIXEL_ONE;
    for ty in lo.y..=hi.y {
        for tx in lo.x..=hi.x {
            let corner = IVec2::new(tx, ty) * tile_fixed;
            if tri.rejects_box(corner, tile_fixed) {
                continue;
            }
            let accept = tri.accepted_edges(corner, tile_fixed);
            bins[(ty * cols + tx) as usize].push(TriangleRef::new(index, accept));
        }
    }
}

/// Per-partition tile lists, `[partition][tile]`.
///
/// Each partition bins a contiguous range of triangles into its own lists,
/// so binning needs no synchronization. Reading a tile walks the partitions
/// in order, which preserves submission order.
#[derive(Debug, Clone, Default)]
pub struct TileBins {
    partitions: Vec<Vec<Vec<TriangleRef>>>,
}

impl TileBins {
    pub fn new(partitions: usize, tile_count: usize) -> Self {
        let mut bins = Self::default();
        bins.resize(partitions, tile_count);
        bins
    }

    /// Resize keeping existing allocations where possible
    pub fn resize(&mut self, partitions: usize, tile_count: usize) {
        self.partitions.resize_with(partitions.max(1), Vec::new);
        for lists in &mut self.partitions {
            lists.resize_with(tile_count, Vec::new);
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Bin every triangle, replacing the previous frame's contents
    pub fn bin(&mut self, triangles: &[RasterTriangle], grid: &TileGrid) {
        let chunk = triangles.len().div_ceil(self.partitions.len()).max(1);
        self.partitions
            .par_iter_mut()
            .enumerate()
            .for_each(|(partition, lists)| {
                lists.iter_mut().for_each(Vec::clear);
                let start = (partition * chunk).min(triangles.len());
                let end = (start + chunk).min(triangles.len());
                for (offset, tri) in triangles[start..end].iter().enumerate() {
                    bin_triangle(tri, (start + offset) as u32, grid, lists);
                }
            });
    }

    /// Merged references of one tile
    pub fn refs(&self, tile: usize) -> impl Iterator<Item = &TriangleRef> + '_ {
        self.partitions.iter().flat_map(move |lists| lists[tile].iter())
    }

    /// Total references across all tiles
    pub fn total(&self) -> usize {
        self.partitions.iter().flatten().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    fn triangle(points: [(f32, f32); 3]) -> RasterTriangle {
        let ndc = points.map(|(x, y)| Vec3::new(x, y, 0.5));
        RasterTriangle::setup(ndc, [0, 1, 2], 0, &Mat4::IDENTITY).unwrap()
    }

    #[test]
    fn test_grid_clamps_partial_tiles() {
        let grid = TileGrid::new(100, 40);
        assert_eq!((grid.cols(), grid.rows()), (4, 2));
        let tiles = grid.tiles();
        assert_eq!(tiles.len(), 8);
        assert_eq!(tiles[3].min, IVec2::new(96, 0));
        assert_eq!(tiles[3].max, IVec2::new(100, 32));
        assert_eq!(tiles[7].max, IVec2::new(100, 40));
        assert_eq!(grid.tile_of(97, 33), 7);
    }

    #[test]
    fn test_small_triangle_binned_unconditionally() {
        let grid = TileGrid::new(128, 128);
        let tri = triangle([(1.0, 1.0), (40.0, 1.0), (1.0, 40.0)]);
        let mut bins = vec![Vec::new(); grid.tile_count()];
        bin_triangle(&tri, 7, &grid, &mut bins);
        let bound: Vec<usize> = (0..bins.len()).filter(|&t| !bins[t].is_empty()).collect();
        assert_eq!(bound, vec![0, 1, 4, 5]);
        // Tile 5 lies past the hypotenuse but small triangles skip the test
        assert_eq!(bins[5][0], TriangleRef::new(7, [false; 3]));
    }

    #[test]
    fn test_large_triangle_rejects_and_accepts_tiles() {
        let grid = TileGrid::new(256, 256);
        let tri = triangle([(-8.0, -8.0), (264.0, -8.0), (-8.0, 264.0)]);
        let mut bins = vec![Vec::new(); grid.tile_count()];
        bin_triangle(&tri, 0, &grid, &mut bins);

        // Bottom-left tile is deep inside
        assert!(bins[0][0].trivial_accept);
        // Top-right tile is beyond the hypotenuse
        assert!(bins[grid.tile_count() - 1].is_empty());
        // Tiles straddling the hypotenuse keep that edge open
        let diagonal = &bins[7][0];
        assert!(!diagonal.trivial_accept);
        assert!(!diagonal.accept_edge[1]);
    }

    #[test]
    fn test_offscreen_triangle_not_binned() {
        let grid = TileGrid::new(64, 64);
        let tri = triangle([(-100.0, -100.0), (-80.0, -100.0), (-100.0, -80.0)]);
        assert!(grid.tile_range(&tri).is_none());
    }

    #[test]
    fn test_partitions_preserve_order() {
        let grid = TileGrid::new(64, 64);
        let tris: Vec<RasterTriangle> = (0..10)
            .map(|i| triangle([(i as f32, 0.0), (i as f32 + 8.0, 0.0), (i as f32, 8.0)]))
            .collect();
        let mut bins = TileBins::new(3, grid.tile_count());
        bins.bin(&tris, &grid);
        let order: Vec<u32> = bins.refs(0).map(|r| r.triangle).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert_eq!(bins.total(), 10);

        // Rebinning clears the previous frame
        bins.bin(&tris[..2], &grid);
        assert_eq!(bins.total(), 2);
    }
}
