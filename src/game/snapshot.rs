//! Snapshot construction for broadcast

use std::collections::HashMap;
use uuid::Uuid;

use crate::ws::protocol::{PlayerView, ProjectileView, ServerMsg};

use super::entity::{PlayerState, Projectile};
use super::map::TileMap;

/// Builds the wire snapshot each tick. The tile grid is immutable after
/// initialization, so its wire encoding is computed once up front.
pub struct SnapshotBuilder {
    wire_grid: Vec<Vec<u8>>,
    map_width: u32,
    map_height: u32,
}

impl SnapshotBuilder {
    pub fn new(map: &TileMap) -> Self {
        Self {
            wire_grid: map.wire_grid(),
            map_width: map.width_px() as u32,
            map_height: map.height_px() as u32,
        }
    }

    /// Build a full snapshot message. Rebuilt fresh every tick, no diffing.
    pub fn build(
        &self,
        players: &HashMap<Uuid, PlayerState>,
        projectiles: &[Projectile],
        now: u64,
    ) -> ServerMsg {
        let player_views: HashMap<Uuid, PlayerView> = players
            .iter()
            .map(|(&id, p)| {
                (
                    id,
                    PlayerView {
                        id,
                        name: p.name.clone(),
                        x: p.x,
                        y: p.y,
                        health: p.health,
                        aim_angle: p.aim_angle,
                        state: p.state,
                        direction: p.facing,
                        frame: p.frame,
                        is_attacking: p.state.is_attack() || now < p.attack_flash_until,
                        flash_red: now < p.flash_red_until,
                    },
                )
            })
            .collect();

        let projectile_views: Vec<ProjectileView> = projectiles
            .iter()
            .map(|proj| ProjectileView {
                id: proj.id,
                shooter_id: proj.shooter_id,
                x: proj.x,
                y: proj.y,
                size: proj.radius,
            })
            .collect();

        ServerMsg::GameStateUpdate {
            players: player_views,
            projectiles: projectile_views,
            map: self.wire_grid.clone(),
            map_width: self.map_width,
            map_height: self.map_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{MAP_COLS, MAP_ROWS};

    #[test]
    fn snapshot_round_trip_preserves_map() {
        let map = TileMap::arena();
        let builder = SnapshotBuilder::new(&map);
        let msg = builder.build(&HashMap::new(), &[], 0);

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::GameStateUpdate {
                map: grid,
                map_width,
                map_height,
                ..
            } => {
                assert_eq!(grid, map.wire_grid());
                assert_eq!(map_width, MAP_COLS as u32 * 32);
                assert_eq!(map_height, MAP_ROWS as u32 * 32);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn derived_flags_use_expiry_timestamps() {
        let map = TileMap::arena();
        let builder = SnapshotBuilder::new(&map);

        let mut rng = rand::thread_rng();
        let mut players = HashMap::new();
        let mut p = PlayerState::new(Uuid::new_v4(), "p".into(), &map, &mut rng, 1_000);
        p.attack_flash_until = 1_100;
        p.flash_red_until = 1_500;
        let id = p.id;
        players.insert(id, p);

        let view = |now: u64| match builder.build(&players, &[], now) {
            ServerMsg::GameStateUpdate { mut players, .. } => players.remove(&id).unwrap(),
            other => panic!("unexpected message: {other:?}"),
        };

        let v = view(1_050);
        assert!(v.is_attacking);
        assert!(v.flash_red);

        let v = view(1_600);
        assert!(!v.is_attacking);
        assert!(!v.flash_red);
    }
}
