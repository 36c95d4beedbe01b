//! Primary gun, scatter fan and projectile flight/impacts
//!
//! Also routes the fire button each tick: a held weapon power-up takes over
//! from the gun until its charges run out.

use crate::game::constants::{pilot, projectile::*, ship};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{EntityId, GameState, PlayerId, PowerUpState, Projectile};
use crate::game::systems::physics::ArenaBounds;
use crate::game::systems::{asteroid, homing, joust, laser, lifecycle, mine};
use crate::util::vec2::Vec2;

/// Gap between the hull and a freshly spawned projectile
const MUZZLE_CLEARANCE: f32 = RADIUS + 2.0;

pub fn spawn_projectile(state: &mut GameState, owner_id: PlayerId, position: Vec2, velocity: Vec2) -> EntityId {
    let id = state.next_entity_id();
    state.projectiles.push(Projectile {
        id,
        owner_id,
        position,
        velocity,
        spawned_at: state.now_ms,
        alive: true,
    });
    id
}

/// Restore one round of ammo every `RELOAD_MS` while below max
pub fn update_reload(state: &mut GameState) {
    let now = state.now_ms;
    for player in state.players.iter_mut().filter(|p| p.has_live_ship()) {
        let s = &mut player.ship;
        if s.ammo >= s.max_ammo {
            s.reload_started_at = None;
            continue;
        }
        let started = s.reload_started_at.get_or_insert(now);
        while now - *started >= ship::RELOAD_MS && s.ammo < s.max_ammo {
            s.ammo += 1;
            *started += ship::RELOAD_MS;
        }
        if s.ammo >= s.max_ammo {
            s.reload_started_at = None;
        }
    }
}

/// Fire the primary gun if ammo and cooldown allow
pub fn fire_primary(state: &mut GameState, index: usize, fx: &mut impl EffectsSink) -> Option<EntityId> {
    let now = state.now_ms;
    let player = state.players.get_mut(index)?;
    let s = &mut player.ship;
    if s.ammo == 0 || now - s.last_shot_at < ship::FIRE_COOLDOWN_MS {
        return None;
    }

    if s.ammo == s.max_ammo {
        s.reload_started_at = Some(now);
    }
    s.ammo -= 1;
    s.last_shot_at = now;

    let owner = player.id;
    let position = s.nose(MUZZLE_CLEARANCE);
    let velocity = s.motion.forward() * SPEED;
    let id = spawn_projectile(state, owner, position, velocity);
    fx.emit(GameEvent::sound(SoundKind::Fire, Some(owner)));
    Some(id)
}

/// Fan of `SCATTER_COUNT` projectiles, one charge per volley
pub fn fire_scatter(state: &mut GameState, index: usize, fx: &mut impl EffectsSink) -> bool {
    let now = state.now_ms;
    let Some(player) = state.players.get_mut(index) else {
        return false;
    };
    let Some(PowerUpState::Scatter { charges, last_fired_at }) = &mut player.power_up else {
        return false;
    };
    if now - *last_fired_at < ship::FIRE_COOLDOWN_MS {
        return false;
    }
    *last_fired_at = now;
    *charges = charges.saturating_sub(1);
    if *charges == 0 {
        player.power_up = None;
    }

    let owner = player.id;
    let motion = player.ship.motion;
    for i in 0..SCATTER_COUNT {
        let t = i as f32 / (SCATTER_COUNT - 1) as f32 * 2.0 - 1.0;
        let dir = Vec2::from_angle(motion.angle + t * SCATTER_SPREAD);
        let position = motion.position + dir * (ship::RADIUS + MUZZLE_CLEARANCE);
        spawn_projectile(state, owner, position, dir * SPEED);
    }
    fx.emit(GameEvent::sound(SoundKind::Scatter, Some(owner)));
    true
}

/// Route every live ship's fire button to its held weapon or the gun
pub fn fire_weapons(state: &mut GameState, fx: &mut impl EffectsSink) {
    for index in 0..state.players.len() {
        let player = &state.players[index];
        let fire = player.input.fire;
        let pressed = fire && !player.fire_was_down;
        let live = player.has_live_ship();
        let held = player.power_up;

        if live && fire {
            match held {
                Some(PowerUpState::Laser { .. }) => {
                    laser::fire(state, index, fx);
                }
                Some(PowerUpState::Scatter { .. }) => {
                    fire_scatter(state, index, fx);
                }
                Some(PowerUpState::Mine { .. }) if pressed => {
                    mine::drop_mine(state, index, fx);
                }
                Some(PowerUpState::Homing { .. }) if pressed => {
                    homing::launch(state, index, fx);
                }
                Some(held) if held.replaces_gun() => {}
                _ => {
                    fire_primary(state, index, fx);
                }
            }
        }

        state.players[index].fire_was_down = fire;
    }
}

/// Move projectiles and cull those that left the arena or timed out
pub fn update(state: &mut GameState, dt: f32) {
    let bounds = ArenaBounds::default();
    let now = state.now_ms;
    for projectile in state.projectiles.iter_mut().filter(|p| p.alive) {
        projectile.position += projectile.velocity * dt;
        if !bounds.contains(projectile.position) || projectile.is_expired(now) {
            projectile.alive = false;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Impact {
    Ship(PlayerId),
    Pilot(PlayerId),
    Asteroid(usize),
}

fn find_impact(state: &GameState, projectile: &Projectile) -> Option<Impact> {
    let ship_reach = ship::RADIUS + RADIUS;
    if let Some(target) = state.players.iter().find(|p| {
        p.id != projectile.owner_id
            && p.has_live_ship()
            && p.ship.motion.position.distance_sq_to(projectile.position) <= ship_reach * ship_reach
    }) {
        return Some(Impact::Ship(target.id));
    }

    let pilot_reach = pilot::RADIUS + RADIUS;
    if let Some(target) = state.pilots.iter().find(|p| {
        p.alive
            && p.player_id != projectile.owner_id
            && p.position.distance_sq_to(projectile.position) <= pilot_reach * pilot_reach
    }) {
        return Some(Impact::Pilot(target.player_id));
    }

    asteroid::first_overlapping(state, projectile.position, RADIUS).map(Impact::Asteroid)
}

/// Resolve projectile impacts against ships, pilots and asteroids.
///
/// Each projectile is consumed by its first impact. A side hit on a jousting
/// ship is parried by the sword instead.
pub fn resolve_hits(state: &mut GameState, fx: &mut impl EffectsSink) {
    for index in 0..state.projectiles.len() {
        let projectile = state.projectiles[index].clone();
        if !projectile.alive {
            continue;
        }
        let Some(impact) = find_impact(state, &projectile) else {
            continue;
        };
        state.projectiles[index].alive = false;

        match impact {
            Impact::Ship(victim) => {
                if joust::try_parry(state, victim, projectile.position, fx) {
                    continue;
                }
                lifecycle::hit_ship(state, victim, Some(projectile.owner_id), true, fx);
            }
            Impact::Pilot(victim) => {
                lifecycle::kill_pilot(state, victim, Some(projectile.owner_id), fx);
            }
            Impact::Asteroid(rock) => asteroid::destroy(state, rock, fx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Player, PlayerKind, PlayerState, ShipMotion};
    use uuid::Uuid;

    fn create_test_state() -> GameState {
        let mut state = GameState::new(21);
        for i in 0..2u64 {
            let mut player = Player::new(Uuid::from_u128(i as u128 + 1), PlayerKind::Human, format!("P{i}"), i as u8, i);
            player
                .ship
                .respawn(ShipMotion::at(Vec2::new(200.0 + 200.0 * i as f32, 400.0), 0.0), -10_000.0);
            state.players.push(player);
        }
        state
    }

    #[test]
    fn test_fire_decrements_ammo_by_one() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();

        assert!(fire_primary(&mut state, 0, &mut fx).is_some());
        assert_eq!(state.players[0].ship.ammo, ship::MAX_AMMO - 1);
        assert_eq!(state.projectiles.len(), 1);
    }

    #[test]
    fn test_fire_rejected_during_cooldown() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();

        fire_primary(&mut state, 0, &mut fx);
        state.now_ms += ship::FIRE_COOLDOWN_MS - 1.0;
        assert!(fire_primary(&mut state, 0, &mut fx).is_none());
        assert_eq!(state.projectiles.len(), 1);

        state.now_ms += 1.0;
        assert!(fire_primary(&mut state, 0, &mut fx).is_some());
    }

    #[test]
    fn test_fire_rejected_without_ammo() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.players[0].ship.ammo = 0;
        assert!(fire_primary(&mut state, 0, &mut fx).is_none());
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn test_reload_restores_one_per_interval() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();

        for _ in 0..ship::MAX_AMMO {
            fire_primary(&mut state, 0, &mut fx);
            state.now_ms += ship::FIRE_COOLDOWN_MS;
        }
        assert_eq!(state.players[0].ship.ammo, 0);

        // Reload cycle started with the first shot at t=0
        state.now_ms = ship::RELOAD_MS - 1.0;
        update_reload(&mut state);
        assert_eq!(state.players[0].ship.ammo, 0);

        state.now_ms = ship::RELOAD_MS;
        update_reload(&mut state);
        assert_eq!(state.players[0].ship.ammo, 1);

        state.now_ms = ship::RELOAD_MS * 10.0;
        update_reload(&mut state);
        assert_eq!(state.players[0].ship.ammo, ship::MAX_AMMO);
        assert!(state.players[0].ship.reload_started_at.is_none());
    }

    #[test]
    fn test_projectile_leaves_arena() {
        let mut state = create_test_state();
        spawn_projectile(&mut state, Uuid::nil(), Vec2::new(1195.0, 400.0), Vec2::new(SPEED, 0.0));
        update(&mut state, 0.1);
        assert!(!state.projectiles[0].alive);
    }

    #[test]
    fn test_projectile_destroys_enemy_ship() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        let owner = state.players[0].id;
        let target = state.players[1].ship.motion.position;
        spawn_projectile(&mut state, owner, target - Vec2::new(5.0, 0.0), Vec2::new(SPEED, 0.0));

        resolve_hits(&mut state, &mut fx);

        assert_eq!(state.players[1].state, PlayerState::Ejected);
        assert_eq!(state.players[0].kills, 1);
        assert!(!state.projectiles[0].alive);
    }

    #[test]
    fn test_projectile_ignores_owner() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        let owner = state.players[0].id;
        let at = state.players[0].ship.motion.position;
        spawn_projectile(&mut state, owner, at, Vec2::new(SPEED, 0.0));

        resolve_hits(&mut state, &mut fx);
        assert!(state.projectiles[0].alive);
        assert!(state.players[0].ship.alive);
    }

    #[test]
    fn test_scatter_fans_out_and_spends_charge() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.players[0].power_up = PowerUpState::fresh(crate::game::state::PowerUpKind::Scatter);

        assert!(fire_scatter(&mut state, 0, &mut fx));
        assert_eq!(state.projectiles.len(), SCATTER_COUNT);
        assert!(matches!(
            state.players[0].power_up,
            Some(PowerUpState::Scatter { charges, .. }) if charges == crate::game::constants::powerup::SCATTER_CHARGES - 1
        ));
        assert_eq!(state.players[0].ship.ammo, ship::MAX_AMMO);
    }

    #[test]
    fn test_fire_weapons_uses_gun_while_held() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.players[0].input.fire = true;

        fire_weapons(&mut state, &mut fx);
        assert_eq!(state.projectiles.len(), 1);
        assert!(state.players[0].fire_was_down);
    }
}
