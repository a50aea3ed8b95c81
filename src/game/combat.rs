//! Combat state machine - movement/attack states, animation timing, damage

use serde::{Deserialize, Serialize};

use super::entity::{PlayerState, Projectile, SHOT_COOLDOWN_MS, SHOT_FLASH_MS};

/// Minimum interval between melee attacks
pub const ATTACK_COOLDOWN_MS: u64 = 1000;
/// How long an attack animation holds the state machine
pub const ATTACK_DURATION_MS: u64 = 500;
/// Frame index at which a melee swing lands
pub const MELEE_IMPACT_FRAME: u32 = 1;
/// Melee reach measured between visual centers
pub const MELEE_RANGE: f32 = 48.0;
pub const MELEE_DAMAGE: i32 = 20;

pub const FRAME_DURATION_WALK_MS: u64 = 100;
pub const FRAME_DURATION_IDLE_MS: u64 = 200;
pub const FRAME_DURATION_ATTACK_MS: u64 = 125;
pub const MAX_FRAMES_WALK: u32 = 6;
pub const MAX_FRAMES_IDLE: u32 = 4;
pub const MAX_FRAMES_ATTACK: u32 = 8;

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatState {
    Idle,
    Walk,
    /// Ranged/thrust attack animation
    Pierce,
    /// Melee swing animation
    Slice,
}

impl CombatState {
    pub fn is_attack(self) -> bool {
        matches!(self, CombatState::Pierce | CombatState::Slice)
    }

    fn frame_duration_ms(self) -> u64 {
        match self {
            CombatState::Walk => FRAME_DURATION_WALK_MS,
            CombatState::Idle => FRAME_DURATION_IDLE_MS,
            CombatState::Pierce | CombatState::Slice => FRAME_DURATION_ATTACK_MS,
        }
    }

    fn max_frames(self) -> u32 {
        match self {
            CombatState::Walk => MAX_FRAMES_WALK,
            CombatState::Idle => MAX_FRAMES_IDLE,
            CombatState::Pierce | CombatState::Slice => MAX_FRAMES_ATTACK,
        }
    }
}

/// Sprite facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Up,
    Down,
    SideLeft,
    SideRight,
}

impl Facing {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Facing::SideLeft | Facing::SideRight)
    }

    /// Facing from the dominant movement axis. Vertical wins ties, down
    /// before up, matching the client's sprite selection.
    pub fn from_movement(dx: f32, dy: f32) -> Option<Facing> {
        if dy > 0.0 {
            Some(Facing::Down)
        } else if dy < 0.0 {
            Some(Facing::Up)
        } else if dx > 0.0 {
            Some(Facing::SideRight)
        } else if dx < 0.0 {
            Some(Facing::SideLeft)
        } else {
            None
        }
    }

    /// Quadrant test on the aim angle: horizontal when |cos| dominates,
    /// vertical otherwise, with the sign picking the side. Screen-space y
    /// grows downward, so a positive sine aims down.
    pub fn from_aim(angle: f32) -> Facing {
        let (sin, cos) = angle.sin_cos();
        if cos.abs() >= sin.abs() {
            if cos > 0.0 {
                Facing::SideRight
            } else {
                Facing::SideLeft
            }
        } else if sin > 0.0 {
            Facing::Down
        } else {
            Facing::Up
        }
    }
}

/// Stateless helpers driving the per-player state machine
pub struct CombatSystem;

impl CombatSystem {
    /// Request a melee attack. Silently ignored while the attack cooldown is
    /// still running. Returns whether the attack started.
    pub fn request_melee(player: &mut PlayerState, kind: CombatState, now: u64) -> bool {
        debug_assert!(kind.is_attack());
        if now.saturating_sub(player.last_attack_time) < ATTACK_COOLDOWN_MS {
            return false;
        }
        // Slice keeps an existing horizontal facing; everything else is
        // recomputed from the aim, decoupled from movement input.
        let facing = if kind == CombatState::Slice && player.facing.is_horizontal() {
            player.facing
        } else {
            Facing::from_aim(player.aim_angle)
        };
        player.facing = facing;
        player.last_attack_time = now;
        Self::transition(player, kind, now);
        true
    }

    /// Request a ranged shot. Cooldown-gated; returns the spawned projectile
    /// when the shot is accepted.
    pub fn request_shot(player: &mut PlayerState, now: u64) -> Option<Projectile> {
        if now.saturating_sub(player.last_shot_time) < SHOT_COOLDOWN_MS {
            return None;
        }
        player.last_shot_time = now;
        player.attack_flash_until = now + SHOT_FLASH_MS;
        Some(Projectile::new(player))
    }

    /// Advance the state machine and animation for one tick.
    ///
    /// `dx`/`dy` is the already-normalized movement delta. Returns true when
    /// the animation advanced onto the melee impact frame this tick, which
    /// is the attacker's one chance per swing to deal damage.
    pub fn step(player: &mut PlayerState, dx: f32, dy: f32, now: u64) -> bool {
        // Attack animations expire on a fixed timer, resolving back to
        // walk/idle from whatever the input says right now.
        if player.state.is_attack()
            && now.saturating_sub(player.last_attack_time) >= ATTACK_DURATION_MS
        {
            let next = if player.input.any() {
                CombatState::Walk
            } else {
                CombatState::Idle
            };
            Self::transition(player, next, now);
        }

        // Movement drives idle/walk and facing, but never interrupts an
        // attack animation.
        if !player.state.is_attack() {
            let moving = dx != 0.0 || dy != 0.0;
            let next = if moving {
                CombatState::Walk
            } else {
                CombatState::Idle
            };
            if next != player.state {
                Self::transition(player, next, now);
            }
            if let Some(facing) = Facing::from_movement(dx, dy) {
                player.facing = facing;
            }
        }

        // Frame cadence is wall-clock based, independent of the tick rate
        let mut advanced = false;
        if now > player.last_frame_time + player.state.frame_duration_ms() {
            player.frame = (player.frame + 1) % player.state.max_frames();
            player.last_frame_time = now;
            advanced = true;
        }

        advanced && player.state.is_attack() && player.frame == MELEE_IMPACT_FRAME
    }

    fn transition(player: &mut PlayerState, next: CombatState, now: u64) {
        player.state = next;
        player.frame = 0;
        player.last_frame_time = now;
    }
}
