//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::game::combat::{CombatState, Facing};

/// Pressed arrow keys as the browser client reports them.
/// Absent or malformed fields deserialize to released.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KeyState {
    #[serde(default, rename = "ArrowUp")]
    pub up: bool,
    #[serde(default, rename = "ArrowDown")]
    pub down: bool,
    #[serde(default, rename = "ArrowLeft")]
    pub left: bool,
    #[serde(default, rename = "ArrowRight")]
    pub right: bool,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Bind this connection to a new player
    #[serde(rename_all = "camelCase")]
    JoinGame { name: String },

    /// Replace the player's input vector
    Input {
        #[serde(default)]
        keys: KeyState,
    },

    /// Set the aim angle in radians
    #[serde(rename_all = "camelCase")]
    AimUpdate { angle: f32 },

    /// Request a ranged attack (cooldown-gated)
    Shoot,

    /// Request a thrust melee attack (cooldown-gated)
    Pierce,

    /// Request a swing melee attack (cooldown-gated)
    Slice,

    /// Leave the game (also synthesized on disconnect)
    LeaveGame,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Connection handshake
    #[serde(rename_all = "camelCase")]
    Welcome { id: Uuid, server_time: u64 },

    /// Full-state snapshot, broadcast every tick
    #[serde(rename_all = "camelCase")]
    GameStateUpdate {
        players: HashMap<Uuid, PlayerView>,
        projectiles: Vec<ProjectileView>,
        /// Tile grid, `0` = floor, `1` = wall
        map: Vec<Vec<u8>>,
        map_width: u32,
        map_height: u32,
    },

    /// Sent to exactly the connection whose player died
    GameOver,
}

/// Serializable view of a player, decoupled from the internal mutable state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub health: i32,
    pub aim_angle: f32,
    pub state: CombatState,
    pub direction: Facing,
    pub frame: u32,
    pub is_attacking: bool,
    pub flash_red: bool,
}

/// Serializable view of a projectile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileView {
    pub id: Uuid,
    pub shooter_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}
