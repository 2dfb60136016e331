use std::time::Duration;

use rand::prelude::*;
use tracing::debug;

/// Largest supported tile factor; the grid edge is `2^tile_factor`, so at
/// most 64×64 tiles.
pub const MAX_TILE_FACTOR: u32 = 6;

/// Tiles in the largest grid. The tile uniform array is sized for this.
pub const MAX_TILES: usize = 1 << (2 * MAX_TILE_FACTOR);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchPolicy {
    /// Minimum time a tile keeps its image before it may switch.
    pub interval: Duration,
    /// Share of eligible tiles switched per frame, in `[0, 1]`.
    pub fraction: f32,
}

impl Default for SwitchPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            fraction: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tile {
    pub display_index: usize,
    pub elapsed: Duration,
}

impl Tile {
    /// Ring slot shown by this tile, or `None` while the ring is empty.
    pub fn slot(&self, occupancy: usize) -> Option<usize> {
        (occupancy > 0).then(|| self.display_index % occupancy)
    }
}

/// Pixel rectangle covered by one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct TileScheduler {
    tile_factor: u32,
    tiles: Vec<Tile>,
    candidates: Vec<usize>,
    rng: StdRng,
}

fn clamp_factor(tile_factor: u32) -> u32 {
    tile_factor.min(MAX_TILE_FACTOR)
}

fn tiles_for(tile_factor: u32) -> Vec<Tile> {
    let edge = 1usize << tile_factor;
    vec![Tile::default(); edge * edge]
}

impl TileScheduler {
    pub fn new(tile_factor: u32, seed: u64) -> Self {
        let tile_factor = clamp_factor(tile_factor);
        Self {
            tile_factor,
            tiles: tiles_for(tile_factor),
            candidates: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn tile_factor(&self) -> u32 {
        self.tile_factor
    }

    /// Tiles per grid edge, `2^tile_factor`.
    pub fn grid_size(&self) -> u32 {
        1 << self.tile_factor
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Changes the grid edge. Tiles are rebuilt (index 0, no elapsed time)
    /// only when the clamped factor actually differs. Returns whether it did.
    pub fn set_tile_factor(&mut self, tile_factor: u32) -> bool {
        let tile_factor = clamp_factor(tile_factor);
        if tile_factor == self.tile_factor {
            return false;
        }
        debug!(from = self.tile_factor, to = tile_factor, "resizing tile grid");
        self.tile_factor = tile_factor;
        self.tiles = tiles_for(tile_factor);
        true
    }

    /// Ages every tile by `dt` and switches `floor(fraction × eligible)` of
    /// the tiles whose dwell time reached the interval. Selection is uniform
    /// over the eligible set. Returns how many tiles switched.
    pub fn advance(&mut self, dt: Duration, policy: &SwitchPolicy, occupancy: usize) -> usize {
        self.candidates.clear();
        for (index, tile) in self.tiles.iter_mut().enumerate() {
            tile.elapsed = tile.elapsed.saturating_add(dt);
            if tile.elapsed >= policy.interval {
                self.candidates.push(index);
            }
        }
        if occupancy == 0 || self.candidates.is_empty() {
            return 0;
        }

        // Stays in f32 so settings like 0.7 of 10 land on 7, not 6.
        let fraction = policy.fraction.clamp(0.0, 1.0);
        let amount = ((fraction * self.candidates.len() as f32).floor() as usize)
            .min(self.candidates.len());
        if amount == 0 {
            return 0;
        }

        let (chosen, _) = self.candidates.partial_shuffle(&mut self.rng, amount);
        for &index in chosen.iter() {
            let tile = &mut self.tiles[index];
            tile.display_index = (tile.display_index + 1) % occupancy;
            tile.elapsed = Duration::ZERO;
        }
        amount
    }

    /// Ring slot for tile `index`, see [`Tile::slot`].
    pub fn slot_for(&self, index: usize, occupancy: usize) -> Option<usize> {
        self.tiles.get(index)?.slot(occupancy)
    }

    /// Rectangle of tile `index` (row-major from the top-left) in a
    /// `width × height` target. Edges are integer-divided so the grid covers
    /// every pixel exactly once.
    pub fn tile_rect(&self, index: usize, width: u32, height: u32) -> TileRect {
        grid_rect(self.tile_factor, index, width, height)
    }
}

/// Rectangle of tile `index` in a grid with `2^tile_factor` tiles per edge.
pub fn grid_rect(tile_factor: u32, index: usize, width: u32, height: u32) -> TileRect {
    let cells = 1u64 << clamp_factor(tile_factor);
    let index = index as u64 % (cells * cells);
    let (row, col) = (index / cells, index % cells);
    let edge = |cell: u64, extent: u32| (cell * u64::from(extent) / cells) as u32;
    let (x0, x1) = (edge(col, width), edge(col + 1, width));
    let (y0, y1) = (edge(row, height), edge(row + 1, height));
    TileRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}
