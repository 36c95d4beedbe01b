//! Joust power-up: side swords that kill, parry and smash.
//!
//! A contact counts as "from the side" when its bearing in the ship's local
//! frame lies within `SIDE_HALF_ARC` of +-90 degrees. Anything arriving from
//! the front or back passes the swords and reaches the hull.

use crate::game::constants::{joust::*, pilot, projectile, ship};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{GameState, PlayerId, PowerUpState, ShipMotion};
use crate::game::systems::{asteroid, lifecycle};
use crate::util::vec2::{angle_diff, Vec2};
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Which side of `motion` the point lies on, if it is a side approach
pub fn side_of(motion: &ShipMotion, point: Vec2) -> Option<Side> {
    let bearing = angle_diff(motion.angle, (point - motion.position).angle());
    if angle_diff(FRAC_PI_2, bearing).abs() <= SIDE_HALF_ARC {
        Some(Side::Left)
    } else if angle_diff(-FRAC_PI_2, bearing).abs() <= SIDE_HALF_ARC {
        Some(Side::Right)
    } else {
        None
    }
}

/// Distance from the ship centre covered by a sword
#[inline]
pub fn reach() -> f32 {
    ship::RADIUS + SWORD_LENGTH
}

fn sword_active(held: &Option<PowerUpState>, side: Side) -> bool {
    match (held, side) {
        (Some(PowerUpState::Joust { left_active, .. }), Side::Left) => *left_active,
        (Some(PowerUpState::Joust { right_active, .. }), Side::Right) => *right_active,
        _ => false,
    }
}

/// Spend one sword; drops the power-up once both are gone
fn consume_sword(state: &mut GameState, holder: PlayerId, side: Side) {
    let Some(player) = state.get_player_mut(holder) else {
        return;
    };
    if let Some(PowerUpState::Joust { left_active, right_active }) = &mut player.power_up {
        match side {
            Side::Left => *left_active = false,
            Side::Right => *right_active = false,
        }
        if !*left_active && !*right_active {
            player.power_up = None;
        }
    }
}

/// Parry a projectile-like hit at `point` on `holder`'s ship.
///
/// Returns true when a sword on that side blocked it.
pub fn try_parry(state: &mut GameState, holder: PlayerId, point: Vec2, fx: &mut impl EffectsSink) -> bool {
    let Some(player) = state.get_player(holder) else {
        return false;
    };
    if !player.has_live_ship() {
        return false;
    }
    let Some(side) = side_of(&player.ship.motion, point) else {
        return false;
    };
    if !sword_active(&player.power_up, side) {
        return false;
    }
    consume_sword(state, holder, side);
    fx.emit(GameEvent::sound(SoundKind::Parry, Some(holder)));
    true
}

#[derive(Debug, Clone, Copy)]
enum Strike {
    Ship(PlayerId),
    Pilot(PlayerId),
    Projectile(usize),
    Asteroid(usize),
}

/// First thing inside `holder`'s sword reach on an armed side
fn find_strike(state: &GameState, index: usize) -> Option<(Strike, Side)> {
    let holder = &state.players[index];
    let motion = &holder.ship.motion;
    let armed = |point: Vec2, radius: f32| -> Option<Side> {
        if motion.position.distance_to(point) > reach() + radius {
            return None;
        }
        side_of(motion, point).filter(|side| sword_active(&holder.power_up, *side))
    };

    for other in state.players.iter() {
        if other.id != holder.id && other.has_live_ship() {
            if let Some(side) = armed(other.ship.motion.position, ship::RADIUS) {
                return Some((Strike::Ship(other.id), side));
            }
        }
    }
    for p in state.pilots.iter().filter(|p| p.alive && p.player_id != holder.id) {
        if let Some(side) = armed(p.position, pilot::RADIUS) {
            return Some((Strike::Pilot(p.player_id), side));
        }
    }
    for (i, p) in state.projectiles.iter().enumerate() {
        if p.alive && p.owner_id != holder.id {
            if let Some(side) = armed(p.position, projectile::RADIUS) {
                return Some((Strike::Projectile(i), side));
            }
        }
    }
    for (i, a) in state.asteroids.iter().enumerate() {
        if a.alive {
            if let Some(side) = armed(a.position, a.radius) {
                return Some((Strike::Asteroid(i), side));
            }
        }
    }
    None
}

/// Sword checks for every jousting ship. Each contact spends the sword on
/// that side.
pub fn update(state: &mut GameState, fx: &mut impl EffectsSink) {
    for index in 0..state.players.len() {
        // A holder can use both swords in one tick
        for _ in 0..2 {
            let holder = &state.players[index];
            if !holder.has_live_ship() || !matches!(holder.power_up, Some(PowerUpState::Joust { .. })) {
                break;
            }
            let holder_id = holder.id;
            let Some((strike, side)) = find_strike(state, index) else {
                break;
            };

            consume_sword(state, holder_id, side);
            match strike {
                Strike::Ship(victim) => {
                    lifecycle::hit_ship(state, victim, Some(holder_id), false, fx);
                }
                Strike::Pilot(victim) => {
                    lifecycle::kill_pilot(state, victim, Some(holder_id), fx);
                }
                Strike::Projectile(i) => {
                    state.projectiles[i].alive = false;
                    fx.emit(GameEvent::sound(SoundKind::Parry, Some(holder_id)));
                }
                Strike::Asteroid(i) => asteroid::destroy(state, i, fx),
            }
        }
    }
}
