//! Map turret: target lock, bounded aim, blast-radius bullets

use crate::game::constants::{pilot, ship, turret::*};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{GameState, PlayerId, Turret, TurretBullet};
use crate::game::systems::homing::turn_toward;
use crate::game::systems::physics::ArenaBounds;
use crate::game::systems::{asteroid, mine};
use crate::util::vec2::{angle_diff, Vec2};

/// Nearest live ship inside the detection radius
fn nearest_ship(state: &GameState, from: Vec2) -> Option<(PlayerId, Vec2)> {
    state
        .players
        .iter()
        .filter(|p| p.has_live_ship())
        .map(|p| (p.id, p.ship.motion.position))
        .filter(|(_, pos)| pos.distance_to(from) <= DETECTION_RADIUS)
        .min_by(|a, b| a.1.distance_sq_to(from).total_cmp(&b.1.distance_sq_to(from)))
}

/// Lock, aim and fire
pub fn update(state: &mut GameState, fx: &mut impl EffectsSink, dt: f32) {
    let now = state.now_ms;
    let Some(turret) = state.turret.as_ref() else {
        return;
    };

    let locked = turret
        .target
        .and_then(|id| state.get_player(id))
        .filter(|p| p.has_live_ship())
        .map(|p| (p.id, p.ship.motion.position))
        .filter(|(_, pos)| pos.distance_to(turret.position) <= DETECTION_RADIUS);
    let target = locked.or_else(|| nearest_ship(state, turret.position));

    let Some(turret) = state.turret.as_mut() else {
        return;
    };
    turret.target = target.map(|(id, _)| id);
    let Some((_, aim)) = target else {
        return;
    };

    let desired = (aim - turret.position).angle();
    turret.aim_angle = turn_toward(turret.aim_angle, desired, TURN_RATE * dt);

    let aligned = angle_diff(turret.aim_angle, desired).abs() <= AIM_TOLERANCE;
    if !aligned || now - turret.last_fired_at < FIRE_COOLDOWN_MS {
        return;
    }
    turret.last_fired_at = now;

    let dir = Vec2::from_angle(turret.aim_angle);
    let position = turret.position + dir * ORBIT_RADIUS;
    let id = state.next_entity_id();
    state.turret_bullets.push(TurretBullet {
        id,
        position,
        velocity: dir * BULLET_SPEED,
        spawned_at: now,
        alive: true,
    });
    fx.emit(GameEvent::sound(SoundKind::TurretFire, None));
}

/// Move bullets; each bursts on contact, at a wall or on timeout
pub fn update_bullets(state: &mut GameState, fx: &mut impl EffectsSink, dt: f32) {
    let now = state.now_ms;
    let bounds = ArenaBounds::default();
    let mut bursts = Vec::new();

    for index in 0..state.turret_bullets.len() {
        let bullet = &mut state.turret_bullets[index];
        if !bullet.alive {
            continue;
        }
        bullet.position += bullet.velocity * dt;
        let position = bullet.position;

        let expired = now - bullet.spawned_at >= BULLET_LIFETIME_MS || !bounds.contains(position);
        let touching = expired
            || state.players.iter().any(|p| {
                p.has_live_ship() && p.ship.motion.position.distance_to(position) <= ship::RADIUS + BULLET_RADIUS
            })
            || state
                .pilots
                .iter()
                .any(|p| p.alive && p.position.distance_to(position) <= pilot::RADIUS + BULLET_RADIUS)
            || asteroid::first_overlapping(state, position, BULLET_RADIUS).is_some();

        if touching {
            state.turret_bullets[index].alive = false;
            bursts.push(position);
        }
    }

    for centre in bursts {
        fx.emit(GameEvent::sound(SoundKind::TurretBlast, None));
        mine::blast(state, centre, BLAST_RADIUS, None, fx);
    }
}

/// Create the turret for a new round when enabled
pub fn reset(state: &mut GameState) {
    state.turret = state.settings.turret_enabled.then(Turret::centred);
    state.turret_bullets.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::physics::DT;
    use crate::game::state::{Player, PlayerKind, PlayerState, ShipMotion};
    use uuid::Uuid;

    fn create_test_state(ship_at: Vec2) -> GameState {
        let mut state = GameState::new(3);
        state.settings.turret_enabled = true;
        reset(&mut state);
        let mut player = Player::new(Uuid::from_u128(1), PlayerKind::Human, "P".into(), 0, 0);
        player.ship.respawn(ShipMotion::at(ship_at, 0.0), -10_000.0);
        state.players.push(player);
        state
    }

    #[test]
    fn test_ignores_ships_out_of_range() {
        let mut state = create_test_state(Vec2::new(20.0, 20.0));
        let mut fx: Vec<GameEvent> = Vec::new();
        update(&mut state, &mut fx, DT);
        assert!(state.turret.as_ref().unwrap().target.is_none());
        assert!(state.turret_bullets.is_empty());
    }

    #[test]
    fn test_aim_turns_at_bounded_rate() {
        let mut state = create_test_state(Vec2::new(600.0, 400.0 + 200.0));
        let mut fx: Vec<GameEvent> = Vec::new();
        update(&mut state, &mut fx, DT);
        let turret = state.turret.as_ref().unwrap();
        assert!((turret.aim_angle - TURN_RATE * DT).abs() < 1e-5);
        assert!(state.turret_bullets.is_empty());
    }

    #[test]
    fn test_fires_when_aligned_and_bullet_blasts_ship() {
        let mut state = create_test_state(Vec2::new(600.0 + 150.0, 400.0));
        let mut fx: Vec<GameEvent> = Vec::new();

        for _ in 0..120 {
            state.now_ms += DT as f64 * 1000.0;
            update(&mut state, &mut fx, DT);
            update_bullets(&mut state, &mut fx, DT);
            if state.players[0].state == PlayerState::Ejected {
                break;
            }
        }
        assert_eq!(state.players[0].state, PlayerState::Ejected);
        assert_eq!(state.players[0].kills, 0);
    }

    #[test]
    fn test_disabled_turret_is_removed() {
        let mut state = create_test_state(Vec2::new(100.0, 100.0));
        state.settings.turret_enabled = false;
        reset(&mut state);
        assert!(state.turret.is_none());
    }
}
