//! Entity state - players and projectiles

use rand::Rng;
use uuid::Uuid;

use super::combat::{CombatState, Facing};
use super::map::TileMap;

/// Sprite box dimensions (must match the client sprite sheet)
pub const PLAYER_SPRITE_WIDTH: f32 = 16.0;
pub const PLAYER_SPRITE_HEIGHT: f32 = 34.0;
/// Hit circle around the visual center
pub const PLAYER_RADIUS: f32 = PLAYER_SPRITE_WIDTH / 2.0;

/// Movement speed in pixels per tick
pub const PLAYER_SPEED: f32 = 3.0;
pub const PLAYER_START_HEALTH: i32 = 100;
pub const MAX_NAME_LEN: usize = 15;

pub const PROJECTILE_SPEED: f32 = 6.0;
pub const PROJECTILE_RADIUS: f32 = 4.0;
pub const PROJECTILE_DAMAGE: i32 = 20;

/// Minimum interval between ranged shots
pub const SHOT_COOLDOWN_MS: u64 = 500;
/// Duration of the muzzle-flash style attack flag after a shot
pub const SHOT_FLASH_MS: u64 = 100;
/// Duration of the damage feedback flash
pub const DAMAGE_FLASH_MS: u64 = 500;

/// Pressed-key state staged by the session gateway, read by the tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl InputState {
    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

/// Authoritative per-player state, owned by the room
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: Uuid,
    pub name: String,

    // Feet-anchored position (bottom-center of the sprite box)
    pub x: f32,
    pub y: f32,

    pub health: i32,
    pub speed: f32,
    pub input: InputState,
    pub aim_angle: f32,

    // Combat state machine
    pub state: CombatState,
    pub facing: Facing,
    pub frame: u32,
    pub last_frame_time: u64,
    pub last_shot_time: u64,
    pub last_attack_time: u64,
    pub attack_flash_until: u64,
    pub flash_red_until: u64,
}

impl PlayerState {
    /// Spawn a new player on a random empty floor tile
    pub fn new(id: Uuid, name: String, map: &TileMap, rng: &mut impl Rng, now: u64) -> Self {
        let (x, y) = map.find_empty_spawn(rng);
        Self {
            id,
            name,
            x,
            y,
            health: PLAYER_START_HEALTH,
            speed: PLAYER_SPEED,
            input: InputState::default(),
            aim_angle: 0.0,
            state: CombatState::Idle,
            facing: Facing::Down,
            frame: 0,
            last_frame_time: now,
            last_shot_time: 0,
            last_attack_time: 0,
            attack_flash_until: 0,
            flash_red_until: 0,
        }
    }

    /// Sprite center, offset up from the feet anchor. Aim and damage
    /// geometry uses this rather than the feet position.
    pub fn visual_center(&self) -> (f32, f32) {
        (self.x, self.y - PLAYER_SPRITE_HEIGHT / 2.0)
    }
}

/// A live projectile
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: Uuid,
    pub shooter_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
}

impl Projectile {
    /// Spawn from the shooter's visual center along the current aim angle
    pub fn new(shooter: &PlayerState) -> Self {
        let (x, y) = shooter.visual_center();
        Self {
            id: Uuid::new_v4(),
            shooter_id: shooter.id,
            x,
            y,
            vel_x: shooter.aim_angle.cos() * PROJECTILE_SPEED,
            vel_y: shooter.aim_angle.sin() * PROJECTILE_SPEED,
            radius: PROJECTILE_RADIUS,
        }
    }

    /// Advance one tick
    pub fn advance(&mut self) {
        self.x += self.vel_x;
        self.y += self.vel_y;
    }

    /// Circle test against a player's visual center
    pub fn hits(&self, center_x: f32, center_y: f32) -> bool {
        let dx = self.x - center_x;
        let dy = self.y - center_y;
        let reach = PLAYER_RADIUS + self.radius;
        dx * dx + dy * dy < reach * reach
    }
}

/// Clamp a requested display name to something presentable
pub fn sanitize_name(raw: &str, session_id: Uuid) -> String {
    let trimmed: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        format!("Player_{}", &session_id.to_string()[..8])
    } else {
        trimmed
    }
}
