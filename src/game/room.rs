//! Room state and authoritative tick loop

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::{unix_millis, TICK_DURATION_MICROS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::collision;
use super::combat::{CombatState, CombatSystem, MELEE_DAMAGE, MELEE_RANGE};
use super::entity::{
    sanitize_name, InputState, PlayerState, Projectile, DAMAGE_FLASH_MS, PROJECTILE_DAMAGE,
};
use super::map::TileMap;
use super::snapshot::SnapshotBuilder;
use super::{Outbound, SessionEvent};

/// Derive the movement delta for one tick from the staged input. Diagonal
/// movement is scaled so its magnitude equals the axial speed.
pub fn movement_delta(input: &InputState, speed: f32) -> (f32, f32) {
    let mut dx = 0.0;
    let mut dy = 0.0;
    if input.up {
        dy -= speed;
    }
    if input.down {
        dy += speed;
    }
    if input.left {
        dx -= speed;
    }
    if input.right {
        dx += speed;
    }
    if dx != 0.0 && dy != 0.0 {
        dx *= std::f32::consts::FRAC_1_SQRT_2;
        dy *= std::f32::consts::FRAC_1_SQRT_2;
    }
    (dx, dy)
}

/// The simulation context: exclusively owns every live entity. Session
/// gateways reach it only through the event channel, so all mutation
/// happens on the room task.
pub struct RoomState {
    pub seed: u64,
    pub map: TileMap,
    pub players: HashMap<Uuid, PlayerState>,
    pub projectiles: Vec<Projectile>,
    pub rng: ChaCha8Rng,
}

impl RoomState {
    pub fn new(map: TileMap, seed: u64) -> Self {
        Self {
            seed,
            map,
            players: HashMap::new(),
            projectiles: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Apply a single session event. Unknown sessions and cooldown
    /// violations are silent no-ops.
    pub fn handle_event(&mut self, event: SessionEvent, now: u64) {
        let id = event.session_id;
        match event.msg {
            ClientMsg::JoinGame { name } => {
                if self.players.contains_key(&id) {
                    debug!(session_id = %id, "Duplicate join ignored");
                    return;
                }
                let name = sanitize_name(&name, id);
                let player = PlayerState::new(id, name.clone(), &self.map, &mut self.rng, now);
                info!(session_id = %id, name = %name, x = player.x, y = player.y, "Player joined");
                self.players.insert(id, player);
            }
            ClientMsg::Input { keys } => {
                if let Some(player) = self.players.get_mut(&id) {
                    player.input = InputState {
                        up: keys.up,
                        down: keys.down,
                        left: keys.left,
                        right: keys.right,
                    };
                }
            }
            ClientMsg::AimUpdate { angle } => {
                if let Some(player) = self.players.get_mut(&id) {
                    // A non-finite angle leaves the aim unchanged
                    if angle.is_finite() {
                        player.aim_angle = angle;
                    }
                }
            }
            ClientMsg::Shoot => {
                if let Some(player) = self.players.get_mut(&id) {
                    if let Some(projectile) = CombatSystem::request_shot(player, now) {
                        self.projectiles.push(projectile);
                    }
                }
            }
            ClientMsg::Pierce => {
                if let Some(player) = self.players.get_mut(&id) {
                    CombatSystem::request_melee(player, CombatState::Pierce, now);
                }
            }
            ClientMsg::Slice => {
                if let Some(player) = self.players.get_mut(&id) {
                    CombatSystem::request_melee(player, CombatState::Slice, now);
                }
            }
            ClientMsg::LeaveGame => {
                if self.players.remove(&id).is_some() {
                    info!(session_id = %id, "Player left");
                }
                // In-flight projectiles owned by this id keep flying until
                // they hit something or exit the map.
            }
        }
    }

    /// Advance the whole simulation by one tick. Returns targeted messages
    /// produced by the tick (currently only game-over notifications).
    pub fn run_tick(&mut self, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();

        // Players: movement, state machine, collision, melee
        let ids: Vec<Uuid> = self.players.keys().copied().collect();
        let mut impactors: Vec<Uuid> = Vec::new();
        for id in ids {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            let (dx, dy) = movement_delta(&player.input, player.speed);
            if CombatSystem::step(player, dx, dy, now) {
                impactors.push(id);
            }
            let (new_x, new_y) = collision::resolve_slide(&self.map, player.x, player.y, dx, dy);
            player.x = new_x;
            player.y = new_y;
        }
        for attacker_id in impactors {
            self.apply_melee(attacker_id, now);
        }

        // Projectiles: advance, then wall/bounds and player hits
        self.update_projectiles(now);

        // Death sweep: anyone at zero health leaves the live set and gets a
        // game-over addressed to their own connection only
        let dead: Vec<Uuid> = self
            .players
            .iter()
            .filter(|(_, p)| p.health <= 0)
            .map(|(&id, _)| id)
            .collect();
        for id in dead {
            self.players.remove(&id);
            info!(session_id = %id, "Player died");
            out.push(Outbound::to(id, ServerMsg::GameOver));
        }

        out
    }

    /// Melee impact: fixed damage to every other player whose visual center
    /// is within range of the attacker's visual center.
    fn apply_melee(&mut self, attacker_id: Uuid, now: u64) {
        let Some(attacker) = self.players.get(&attacker_id) else {
            return;
        };
        let (ax, ay) = attacker.visual_center();

        for (&id, target) in self.players.iter_mut() {
            if id == attacker_id {
                continue;
            }
            let (tx, ty) = target.visual_center();
            let (dx, dy) = (tx - ax, ty - ay);
            if dx * dx + dy * dy < MELEE_RANGE * MELEE_RANGE {
                target.health -= MELEE_DAMAGE;
                target.flash_red_until = now + DAMAGE_FLASH_MS;
                debug!(
                    attacker = %attacker_id,
                    target = %id,
                    health = target.health,
                    "Melee hit"
                );
            }
        }
    }

    fn update_projectiles(&mut self, now: u64) {
        let Self {
            map,
            players,
            projectiles,
            ..
        } = self;

        projectiles.retain_mut(|proj| {
            proj.advance();

            // Walls and map bounds consume the projectile
            if !map.is_walkable(proj.x, proj.y) {
                return false;
            }

            // First non-owner hit consumes the projectile; it can never
            // damage two players or its own shooter
            for (&id, player) in players.iter_mut() {
                if id == proj.shooter_id {
                    continue;
                }
                let (cx, cy) = player.visual_center();
                if proj.hits(cx, cy) {
                    player.health -= PROJECTILE_DAMAGE;
                    player.flash_red_until = now + DAMAGE_FLASH_MS;
                    debug!(
                        shooter = %proj.shooter_id,
                        target = %id,
                        health = player.health,
                        "Projectile hit"
                    );
                    return false;
                }
            }
            true
        });
    }
}

/// Handle to the running room
#[derive(Clone)]
pub struct RoomHandle {
    pub input_tx: mpsc::Sender<SessionEvent>,
    pub outbound_tx: broadcast::Sender<Outbound>,
    pub player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// The authoritative game room: one fixed-rate task owning all state
pub struct GameRoom {
    state: RoomState,
    input_rx: mpsc::Receiver<SessionEvent>,
    outbound_tx: broadcast::Sender<Outbound>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
}

impl GameRoom {
    pub fn new(map: TileMap, seed: u64) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            input_tx,
            outbound_tx: outbound_tx.clone(),
            player_count: player_count.clone(),
        };

        let snapshot_builder = SnapshotBuilder::new(&map);
        let room = Self {
            state: RoomState::new(map, seed),
            input_rx,
            outbound_tx,
            snapshot_builder,
            player_count,
        };

        (room, handle)
    }

    /// Run the authoritative tick loop. Never returns while the server is up.
    pub async fn run(mut self) {
        info!(seed = self.state.seed, "Room started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // One clock read drives the entire tick
            let now = unix_millis();

            // Drain staged session events
            while let Ok(event) = self.input_rx.try_recv() {
                self.state.handle_event(event, now);
            }

            let messages = self.state.run_tick(now);
            for msg in messages {
                let _ = self.outbound_tx.send(msg);
            }

            self.player_count
                .store(self.state.players.len(), Ordering::Relaxed);

            // Fire-and-forget broadcast; lagging clients skip snapshots
            let snapshot = self.snapshot_builder.build(
                &self.state.players,
                &self.state.projectiles,
                now,
            );
            let _ = self.outbound_tx.send(Outbound::broadcast(snapshot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::{ATTACK_DURATION_MS, Facing};
    use crate::game::entity::{PLAYER_SPEED, PLAYER_START_HEALTH};

    const T0: u64 = 100_000;

    fn open_room(cols: usize, rows: usize) -> RoomState {
        // No border walls: collision scenarios place their own
        let grid = vec![vec![0u8; cols]; rows];
        RoomState::new(TileMap::from_grid(&grid), 42)
    }

    fn join(state: &mut RoomState, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        state.handle_event(
            SessionEvent {
                session_id: id,
                msg: ClientMsg::JoinGame { name: name.into() },
                received_at: T0,
            },
            T0,
        );
        id
    }

    fn send(state: &mut RoomState, id: Uuid, msg: ClientMsg, now: u64) {
        state.handle_event(
            SessionEvent {
                session_id: id,
                msg,
                received_at: now,
            },
            now,
        );
    }

    fn place(state: &mut RoomState, id: Uuid, x: f32, y: f32) {
        let p = state.players.get_mut(&id).unwrap();
        p.x = x;
        p.y = y;
        p.last_shot_time = 0;
        p.last_attack_time = 0;
    }

    #[test]
    fn join_and_leave_manage_the_live_set() {
        let mut state = open_room(10, 10);
        let id = join(&mut state, "Ada");
        assert!(state.players.contains_key(&id));

        send(&mut state, id, ClientMsg::LeaveGame, T0);
        assert!(state.players.is_empty());
    }

    #[test]
    fn events_for_unknown_sessions_are_ignored() {
        let mut state = open_room(10, 10);
        let ghost = Uuid::new_v4();
        send(&mut state, ghost, ClientMsg::Shoot, T0);
        send(&mut state, ghost, ClientMsg::Pierce, T0);
        send(
            &mut state,
            ghost,
            ClientMsg::Input {
                keys: Default::default(),
            },
            T0,
        );
        assert!(state.players.is_empty());
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn non_finite_aim_is_dropped() {
        let mut state = open_room(10, 10);
        let id = join(&mut state, "Ada");
        send(&mut state, id, ClientMsg::AimUpdate { angle: 1.25 }, T0);
        assert_eq!(state.players[&id].aim_angle, 1.25);

        send(
            &mut state,
            id,
            ClientMsg::AimUpdate {
                angle: f32::INFINITY,
            },
            T0,
        );
        assert_eq!(state.players[&id].aim_angle, 1.25);
    }

    #[test]
    fn diagonal_speed_matches_axial_speed() {
        let input = InputState {
            up: true,
            right: true,
            ..Default::default()
        };
        let (dx, dy) = movement_delta(&input, PLAYER_SPEED);
        let magnitude = (dx * dx + dy * dy).sqrt();
        assert!((magnitude - PLAYER_SPEED).abs() < 1e-4);

        // Opposite keys cancel
        let input = InputState {
            up: true,
            down: true,
            ..Default::default()
        };
        assert_eq!(movement_delta(&input, PLAYER_SPEED), (0.0, 0.0));
    }

    #[test]
    fn walk_into_wall_blocks_x_but_keeps_walking_state() {
        // Wall at tile (2,1), player inside tile (1,1)
        let mut grid = vec![vec![0u8; 5]; 5];
        grid[1][2] = 1;
        let mut state = RoomState::new(TileMap::from_grid(&grid), 42);

        let id = join(&mut state, "Ada");
        place(&mut state, id, 55.0, 48.0);
        send(
            &mut state,
            id,
            ClientMsg::Input {
                keys: crate::ws::protocol::KeyState {
                    right: true,
                    ..Default::default()
                },
            },
            T0,
        );

        state.run_tick(T0 + 33);

        let p = &state.players[&id];
        assert_eq!(p.x, 55.0);
        assert_eq!(p.state, CombatState::Walk);
        assert_eq!(p.facing, Facing::SideRight);
    }

    #[test]
    fn free_movement_advances_position() {
        let mut state = open_room(20, 20);
        let id = join(&mut state, "Ada");
        place(&mut state, id, 200.0, 200.0);
        send(
            &mut state,
            id,
            ClientMsg::Input {
                keys: crate::ws::protocol::KeyState {
                    down: true,
                    ..Default::default()
                },
            },
            T0,
        );

        state.run_tick(T0 + 33);
        let p = &state.players[&id];
        assert_eq!(p.y, 200.0 + PLAYER_SPEED);
        assert_eq!(p.facing, Facing::Down);
    }

    #[test]
    fn melee_damages_nearby_player_exactly_once() {
        let mut state = open_room(20, 20);
        let attacker = join(&mut state, "attacker");
        let defender = join(&mut state, "defender");
        place(&mut state, attacker, 200.0, 200.0);
        place(&mut state, defender, 230.0, 200.0); // 30px apart, inside range

        send(&mut state, attacker, ClientMsg::Slice, T0);
        assert_eq!(state.players[&attacker].state, CombatState::Slice);

        // Run 30Hz ticks through the full attack and a little beyond
        let mut now = T0;
        while now < T0 + ATTACK_DURATION_MS + 200 {
            now += 33;
            state.run_tick(now);
        }

        assert_eq!(
            state.players[&defender].health,
            PLAYER_START_HEALTH - MELEE_DAMAGE
        );
        assert!(state.players[&defender].flash_red_until > T0);
        // Attacker is back to idle and untouched
        assert_eq!(state.players[&attacker].state, CombatState::Idle);
        assert_eq!(state.players[&attacker].health, PLAYER_START_HEALTH);
    }

    #[test]
    fn melee_out_of_range_misses() {
        let mut state = open_room(20, 20);
        let attacker = join(&mut state, "attacker");
        let defender = join(&mut state, "defender");
        place(&mut state, attacker, 200.0, 200.0);
        place(&mut state, defender, 200.0 + MELEE_RANGE + 10.0, 200.0);

        send(&mut state, attacker, ClientMsg::Pierce, T0);
        let mut now = T0;
        while now < T0 + ATTACK_DURATION_MS + 100 {
            now += 33;
            state.run_tick(now);
        }

        assert_eq!(state.players[&defender].health, PLAYER_START_HEALTH);
    }

    #[test]
    fn projectile_hits_once_and_never_its_shooter() {
        let mut state = open_room(30, 20);
        let shooter = join(&mut state, "shooter");
        let target = join(&mut state, "target");
        let bystander = join(&mut state, "bystander");
        place(&mut state, shooter, 100.0, 200.0);
        // Target and bystander overlap so a piercing projectile could hit both
        place(&mut state, target, 160.0, 200.0);
        place(&mut state, bystander, 168.0, 200.0);

        send(&mut state, shooter, ClientMsg::AimUpdate { angle: 0.0 }, T0);
        send(&mut state, shooter, ClientMsg::Shoot, T0);
        assert_eq!(state.projectiles.len(), 1);

        let mut now = T0;
        for _ in 0..30 {
            now += 33;
            state.run_tick(now);
        }

        assert!(state.projectiles.is_empty());
        let hit_target = state.players[&target].health < PLAYER_START_HEALTH;
        let hit_bystander = state.players[&bystander].health < PLAYER_START_HEALTH;
        // Exactly one of the two took exactly one hit
        assert!(hit_target ^ hit_bystander);
        let victim_health = state.players[&target]
            .health
            .min(state.players[&bystander].health);
        assert_eq!(victim_health, PLAYER_START_HEALTH - PROJECTILE_DAMAGE);
        assert_eq!(state.players[&shooter].health, PLAYER_START_HEALTH);
    }

    #[test]
    fn projectile_shot_at_point_blank_spares_the_shooter() {
        let mut state = open_room(30, 20);
        let shooter = join(&mut state, "shooter");
        place(&mut state, shooter, 300.0, 300.0);

        // Fire straight down through the shooter's own hit circle
        send(
            &mut state,
            shooter,
            ClientMsg::AimUpdate {
                angle: std::f32::consts::FRAC_PI_2,
            },
            T0,
        );
        send(&mut state, shooter, ClientMsg::Shoot, T0);

        let mut now = T0;
        for _ in 0..10 {
            now += 33;
            state.run_tick(now);
        }
        assert_eq!(state.players[&shooter].health, PLAYER_START_HEALTH);
    }

    #[test]
    fn projectile_dies_on_wall_and_bounds() {
        let mut grid = vec![vec![0u8; 10]; 10];
        grid[3][6] = 1;
        let mut state = RoomState::new(TileMap::from_grid(&grid), 42);
        let shooter = join(&mut state, "shooter");
        // Visual center at y=111, row 3; wall tile (6,3) spans x 192..224
        place(&mut state, shooter, 128.0, 128.0);
        send(&mut state, shooter, ClientMsg::AimUpdate { angle: 0.0 }, T0);
        send(&mut state, shooter, ClientMsg::Shoot, T0);

        let mut now = T0;
        for _ in 0..20 {
            now += 33;
            state.run_tick(now);
        }
        assert!(state.projectiles.is_empty());

        // And off the map edge with no wall in the way
        let mut state = open_room(10, 10);
        let shooter = join(&mut state, "shooter");
        place(&mut state, shooter, 160.0, 160.0);
        send(
            &mut state,
            shooter,
            ClientMsg::AimUpdate {
                angle: std::f32::consts::PI,
            },
            T0,
        );
        send(&mut state, shooter, ClientMsg::Shoot, T0);
        let mut now = T0;
        for _ in 0..40 {
            now += 33;
            state.run_tick(now);
        }
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn death_removes_player_and_notifies_only_them() {
        let mut state = open_room(20, 20);
        let attacker = join(&mut state, "attacker");
        let defender = join(&mut state, "defender");
        place(&mut state, attacker, 200.0, 200.0);
        place(&mut state, defender, 220.0, 200.0);
        state.players.get_mut(&defender).unwrap().health = MELEE_DAMAGE;

        send(&mut state, attacker, ClientMsg::Slice, T0);

        let mut game_overs = Vec::new();
        let mut now = T0;
        while now < T0 + ATTACK_DURATION_MS + 100 {
            now += 33;
            for msg in state.run_tick(now) {
                if matches!(msg.msg, ServerMsg::GameOver) {
                    game_overs.push(msg.target);
                }
            }
        }

        assert_eq!(game_overs, vec![Some(defender)]);
        assert!(!state.players.contains_key(&defender));
        assert!(state.players.contains_key(&attacker));
    }

    #[test]
    fn disconnect_leaves_projectiles_in_flight() {
        let mut state = open_room(30, 20);
        let shooter = join(&mut state, "shooter");
        place(&mut state, shooter, 300.0, 300.0);
        send(&mut state, shooter, ClientMsg::AimUpdate { angle: 0.0 }, T0);
        send(&mut state, shooter, ClientMsg::Shoot, T0);
        send(&mut state, shooter, ClientMsg::LeaveGame, T0);

        state.run_tick(T0 + 33);
        assert_eq!(state.projectiles.len(), 1);
    }
}
