//! Axis-separated slide collision against the tile map

use super::entity::{PLAYER_SPRITE_HEIGHT, PLAYER_SPRITE_WIDTH};
use super::map::TileMap;

/// Whether a feet-anchored sprite box at `(x, y)` overlaps any blocked tile.
///
/// Tests the four corners of the box. The bottom edge is inset one pixel so
/// the entity does not collide with the tile it is standing on.
pub fn collides(map: &TileMap, x: f32, y: f32) -> bool {
    let half_width = PLAYER_SPRITE_WIDTH / 2.0;
    let check_points = [
        (x - half_width, y - PLAYER_SPRITE_HEIGHT), // top-left
        (x + half_width, y - PLAYER_SPRITE_HEIGHT), // top-right
        (x - half_width, y - 1.0),                  // bottom-left
        (x + half_width, y - 1.0),                  // bottom-right
    ];
    check_points.iter().any(|&(px, py)| !map.is_walkable(px, py))
}

/// Resolve a movement delta with per-axis sliding.
///
/// The X move is attempted in isolation and dropped if it collides; the Y
/// move is then attempted from the (possibly updated) X. Diagonal movement
/// into a corner slides along the open axis instead of stopping dead.
pub fn resolve_slide(map: &TileMap, x: f32, y: f32, dx: f32, dy: f32) -> (f32, f32) {
    let mut new_x = x;
    if dx != 0.0 && !collides(map, x + dx, y) {
        new_x = x + dx;
    }
    let mut new_y = y;
    if dy != 0.0 && !collides(map, new_x, y + dy) {
        new_y = y + dy;
    }
    (new_x, new_y)
}
