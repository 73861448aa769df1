//! Tile partitioning of the frame buffer.
//!
//! Tiles are handed out from the center of the image outward so the most
//! important part of the composition shows up first.

use ember_math::{IVec2, UVec2};

/// Number of tiles along each axis needed to cover `size`.
pub fn tile_grid(size: UVec2, tile_size: u32) -> UVec2 {
    let tile_size = tile_size.max(1);
    UVec2::new(size.x.div_ceil(tile_size), size.y.div_ceil(tile_size))
}

/// Pixel positions (top-left corners) of every tile, in a square spiral
/// starting at the center tile.
pub fn spiral_tiles(size: UVec2, tile_size: u32) -> Vec<UVec2> {
    let tile_size = tile_size.max(1);
    let grid = tile_grid(size, tile_size).as_ivec2();
    let total = (grid.x * grid.y) as usize;
    let center = grid / 2;

    let in_grid = |tile: IVec2| tile.cmpge(IVec2::ZERO).all() && tile.cmplt(grid).all();

    let mut tiles = Vec::with_capacity(total);
    if total == 0 {
        return tiles;
    }
    tiles.push(center.as_uvec2() * tile_size);

    let mut ring = 1;
    while tiles.len() < total {
        // Walk the ring clockwise from its top-left corner, which the last
        // leg emits
        let mut tile = center - IVec2::splat(ring);
        for step in [IVec2::X, IVec2::Y, IVec2::NEG_X, IVec2::NEG_Y] {
            for _ in 0..ring * 2 {
                tile += step;
                if in_grid(tile) {
                    tiles.push(tile.as_uvec2() * tile_size);
                }
            }
        }
        ring += 1;
    }

    tiles
}

/// Pixel extent of the tile at `position`, clipped to the buffer.
pub fn tile_extent(position: UVec2, tile_size: u32, size: UVec2) -> UVec2 {
    (position + UVec2::splat(tile_size)).min(size).saturating_sub(position)
}

/// Scheduling record of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStatus {
    /// Top-left pixel of the tile
    pub position: UVec2,
    /// Worker the tile was dispatched to, if any
    pub worker: Option<usize>,
    pub completed: bool,
}

impl TileStatus {
    pub fn new(position: UVec2) -> Self {
        Self {
            position,
            worker: None,
            completed: false,
        }
    }
}
