//! Tile map model - static walkable/blocked grid

use rand::Rng;

use super::entity::PLAYER_SPRITE_HEIGHT;

/// Tile edge length in pixels (shared by convention with clients)
pub const GRID_SIZE: f32 = 32.0;
/// Arena dimensions in tiles
pub const MAP_ROWS: usize = 36;
pub const MAP_COLS: usize = 50;

/// Spawn position used when no empty tile is found within the attempt budget
const FALLBACK_SPAWN: (f32, f32) = (48.0, 64.0);

/// A single map cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Floor,
    Wall,
}

/// Immutable tile grid. Row-major flat storage, indexed `(col, row)`.
#[derive(Debug, Clone)]
pub struct TileMap {
    rows: usize,
    cols: usize,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// Build a map from a wire-style grid (`0` = floor, anything else = wall).
    pub fn from_grid(grid: &[Vec<u8>]) -> Self {
        let rows = grid.len();
        let cols = grid.first().map(|r| r.len()).unwrap_or(0);
        let mut tiles = Vec::with_capacity(rows * cols);
        for row in grid {
            for col in 0..cols {
                let cell = row.get(col).copied().unwrap_or(1);
                tiles.push(if cell == 0 { Tile::Floor } else { Tile::Wall });
            }
        }
        Self { rows, cols, tiles }
    }

    /// The default arena: walled border plus an interior block with a hollow cell.
    pub fn arena() -> Self {
        let mut tiles = vec![Tile::Floor; MAP_ROWS * MAP_COLS];
        for row in 0..MAP_ROWS {
            for col in 0..MAP_COLS {
                if row == 0 || row == MAP_ROWS - 1 || col == 0 || col == MAP_COLS - 1 {
                    tiles[row * MAP_COLS + col] = Tile::Wall;
                }
            }
        }
        for row in 4..9 {
            for col in 4..9 {
                tiles[row * MAP_COLS + col] = Tile::Wall;
            }
        }
        // Hollow cell inside the block
        tiles[5 * MAP_COLS + 5] = Tile::Floor;

        Self {
            rows: MAP_ROWS,
            cols: MAP_COLS,
            tiles,
        }
    }

    /// Map width in pixels
    pub fn width_px(&self) -> f32 {
        self.cols as f32 * GRID_SIZE
    }

    /// Map height in pixels
    pub fn height_px(&self) -> f32 {
        self.rows as f32 * GRID_SIZE
    }

    /// Tile at grid indices; out-of-bounds reads as `Wall`
    pub fn tile(&self, col: i32, row: i32) -> Tile {
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return Tile::Wall;
        }
        self.tiles[row as usize * self.cols + col as usize]
    }

    /// Whether the pixel coordinate lies on a floor tile inside the map
    pub fn is_walkable(&self, px: f32, py: f32) -> bool {
        if px < 0.0 || py < 0.0 || px >= self.width_px() || py >= self.height_px() {
            return false;
        }
        let col = (px / GRID_SIZE).floor() as i32;
        let row = (py / GRID_SIZE).floor() as i32;
        self.tile(col, row) == Tile::Floor
    }

    /// Pick a random empty floor tile and return a feet-anchored spawn point.
    ///
    /// Samples at most `rows * cols` tiles; a degenerate map falls back to a
    /// fixed coordinate instead of failing.
    pub fn find_empty_spawn(&self, rng: &mut impl Rng) -> (f32, f32) {
        let max_attempts = self.rows * self.cols;
        for _ in 0..max_attempts {
            let col = rng.gen_range(0..self.cols);
            let row = rng.gen_range(0..self.rows);
            if self.tiles[row * self.cols + col] == Tile::Floor {
                let x = col as f32 * GRID_SIZE + GRID_SIZE / 2.0;
                let y = row as f32 * GRID_SIZE + PLAYER_SPRITE_HEIGHT / 2.0;
                return (x, y);
            }
        }
        FALLBACK_SPAWN
    }

    /// Wire encoding of the grid: `0` = floor, `1` = wall
    pub fn wire_grid(&self) -> Vec<Vec<u8>> {
        (0..self.rows)
            .map(|row| {
                (0..self.cols)
                    .map(|col| match self.tiles[row * self.cols + col] {
                        Tile::Floor => 0,
                        Tile::Wall => 1,
                    })
                    .collect()
            })
            .collect()
    }
}
