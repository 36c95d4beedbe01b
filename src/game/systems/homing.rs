//! Homing missiles: nearest-enemy acquisition and bounded-turn steering

use crate::game::constants::{homing::*, pilot, ship};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{GameState, HomingMissile, PlayerId, PowerUpState};
use crate::game::systems::physics::ArenaBounds;
use crate::game::systems::{asteroid, joust, lifecycle};
use crate::util::vec2::{angle_diff, normalize_angle, Vec2};

pub fn launch(state: &mut GameState, index: usize, fx: &mut impl EffectsSink) -> bool {
    let now = state.now_ms;
    let Some(player) = state.players.get_mut(index) else {
        return false;
    };
    let Some(PowerUpState::Homing { charges }) = &mut player.power_up else {
        return false;
    };
    *charges = charges.saturating_sub(1);
    if *charges == 0 {
        player.power_up = None;
    }

    let owner_id = player.id;
    let motion = player.ship.motion;
    let id = state.next_entity_id();
    state.missiles.push(HomingMissile {
        id,
        owner_id,
        position: player_nose(&motion.position, motion.angle),
        velocity: motion.forward() * SPEED,
        angle: motion.angle,
        target: None,
        spawned_at: now,
        alive: true,
    });
    fx.emit(GameEvent::sound(SoundKind::MissileLaunch, Some(owner_id)));
    true
}

fn player_nose(position: &Vec2, angle: f32) -> Vec2 {
    *position + Vec2::from_angle(angle) * (ship::RADIUS + RADIUS + 2.0)
}

/// Nearest live enemy ship within the detection radius
pub fn acquire_target(state: &GameState, owner: PlayerId, from: Vec2) -> Option<PlayerId> {
    state
        .players
        .iter()
        .filter(|p| p.id != owner && p.has_live_ship())
        .map(|p| (p.id, p.ship.motion.position.distance_sq_to(from)))
        .filter(|(_, d)| *d <= DETECTION_RADIUS * DETECTION_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Rotate `current` toward `desired` by at most `max_step`
pub fn turn_toward(current: f32, desired: f32, max_step: f32) -> f32 {
    let diff = angle_diff(current, desired);
    normalize_angle(current + diff.clamp(-max_step, max_step))
}

/// Steer, move and cull missiles
pub fn update(state: &mut GameState, dt: f32) {
    let now = state.now_ms;
    let bounds = ArenaBounds::default();

    for index in 0..state.missiles.len() {
        let missile = &state.missiles[index];
        if !missile.alive {
            continue;
        }

        // Keep a valid lock, otherwise reacquire
        let locked = missile
            .target
            .and_then(|id| state.get_player(id))
            .filter(|p| p.has_live_ship())
            .filter(|p| p.ship.motion.position.distance_to(missile.position) <= DETECTION_RADIUS)
            .map(|p| (p.id, p.ship.motion.position));
        let target = locked.or_else(|| {
            acquire_target(state, missile.owner_id, missile.position)
                .and_then(|id| state.get_player(id).map(|p| (id, p.ship.motion.position)))
        });

        let missile = &mut state.missiles[index];
        missile.target = target.map(|(id, _)| id);
        if let Some((_, aim)) = target {
            let desired = (aim - missile.position).angle();
            missile.angle = turn_toward(missile.angle, desired, TURN_RATE * dt);
        }
        missile.velocity = Vec2::from_angle(missile.angle) * SPEED;
        missile.position += missile.velocity * dt;

        if !bounds.contains(missile.position) || missile.is_expired(now) {
            missile.alive = false;
        }
    }
}

/// Missile impacts; shields absorb, jousting ships may parry from the side
pub fn resolve_hits(state: &mut GameState, fx: &mut impl EffectsSink) {
    let ship_reach = ship::RADIUS + RADIUS;
    let pilot_reach = pilot::RADIUS + RADIUS;

    for index in 0..state.missiles.len() {
        let missile = state.missiles[index].clone();
        if !missile.alive {
            continue;
        }

        let ship_hit = state
            .players
            .iter()
            .find(|p| {
                p.id != missile.owner_id
                    && p.has_live_ship()
                    && p.ship.motion.position.distance_to(missile.position) <= ship_reach
            })
            .map(|p| p.id);
        if let Some(victim) = ship_hit {
            state.missiles[index].alive = false;
            if !joust::try_parry(state, victim, missile.position, fx) {
                lifecycle::hit_ship(state, victim, Some(missile.owner_id), true, fx);
            }
            continue;
        }

        let pilot_hit = state
            .pilots
            .iter()
            .find(|p| p.alive && p.player_id != missile.owner_id && p.position.distance_to(missile.position) <= pilot_reach)
            .map(|p| p.player_id);
        if let Some(victim) = pilot_hit {
            state.missiles[index].alive = false;
            lifecycle::kill_pilot(state, victim, Some(missile.owner_id), fx);
            continue;
        }

        if let Some(rock) = asteroid::first_overlapping(state, missile.position, RADIUS) {
            state.missiles[index].alive = false;
            asteroid::destroy(state, rock, fx);
        }
    }
}
