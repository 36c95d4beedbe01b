//! Laser power-up: instant line-vs-circle sweep along the ship's nose

use smallvec::SmallVec;

use crate::game::constants::{laser::*, pilot, ship};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{GameState, LaserBeam, PlayerId, PowerUpState};
use crate::game::systems::{asteroid, lifecycle};
use crate::util::vec2::segment_distance;

/// Fire the held laser if its cooldown has elapsed
pub fn fire(state: &mut GameState, index: usize, fx: &mut impl EffectsSink) -> bool {
    let now = state.now_ms;
    let Some(player) = state.players.get_mut(index) else {
        return false;
    };
    let Some(PowerUpState::Laser { charges, last_fired_at }) = &mut player.power_up else {
        return false;
    };
    if now - *last_fired_at < COOLDOWN_MS {
        return false;
    }
    *last_fired_at = now;
    *charges = charges.saturating_sub(1);
    if *charges == 0 {
        player.power_up = None;
    }

    let owner_id = player.id;
    let start = player.ship.nose(0.0);
    let end = start + player.ship.motion.forward() * LENGTH;
    let id = state.next_entity_id();
    state.lasers.push(LaserBeam {
        id,
        owner_id,
        start,
        end,
        spawned_at: now,
        resolved: false,
    });
    fx.emit(GameEvent::sound(SoundKind::Laser, Some(owner_id)));
    true
}

#[derive(Debug, Default)]
struct BeamHits {
    ships: SmallVec<[PlayerId; 4]>,
    pilots: SmallVec<[PlayerId; 4]>,
    asteroids: SmallVec<[usize; 8]>,
}

fn sweep(state: &GameState, beam: &LaserBeam) -> BeamHits {
    let half_width = WIDTH * 0.5;
    let mut hits = BeamHits::default();

    for player in state.players.iter() {
        if player.id != beam.owner_id
            && player.has_live_ship()
            && segment_distance(beam.start, beam.end, player.ship.motion.position) <= ship::RADIUS + half_width
        {
            hits.ships.push(player.id);
        }
    }
    for p in state.pilots.iter() {
        if p.alive
            && p.player_id != beam.owner_id
            && segment_distance(beam.start, beam.end, p.position) <= pilot::RADIUS + half_width
        {
            hits.pilots.push(p.player_id);
        }
    }
    for (i, a) in state.asteroids.iter().enumerate() {
        if a.alive && segment_distance(beam.start, beam.end, a.position) <= a.radius + half_width {
            hits.asteroids.push(i);
        }
    }
    hits
}

/// Apply every beam fired this tick. The beam passes through everything it
/// touches; shields do not stop it.
pub fn resolve(state: &mut GameState, fx: &mut impl EffectsSink) {
    for index in 0..state.lasers.len() {
        if state.lasers[index].resolved {
            continue;
        }
        state.lasers[index].resolved = true;
        let beam = state.lasers[index].clone();
        let hits = sweep(state, &beam);

        for victim in hits.ships {
            lifecycle::hit_ship(state, victim, Some(beam.owner_id), false, fx);
        }
        for victim in hits.pilots {
            lifecycle::kill_pilot(state, victim, Some(beam.owner_id), fx);
        }
        for rock in hits.asteroids {
            asteroid::destroy(state, rock, fx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::powerup;
    use crate::game::state::{Player, PlayerKind, PlayerState, PowerUpKind, ShipMotion};
    use crate::util::vec2::Vec2;
    use uuid::Uuid;

    fn create_test_state() -> GameState {
        let mut state = GameState::new(8);
        for (i, x) in [100.0f32, 400.0, 700.0].into_iter().enumerate() {
            let mut player = Player::new(Uuid::from_u128(i as u128 + 1), PlayerKind::Human, format!("P{i}"), i as u8, i as u64);
            player.ship.respawn(ShipMotion::at(Vec2::new(x, 300.0), 0.0), -10_000.0);
            state.players.push(player);
        }
        state.players[0].power_up = PowerUpState::fresh(PowerUpKind::Laser);
        state
    }

    #[test]
    fn test_beam_passes_through_every_ship_in_line() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();

        assert!(fire(&mut state, 0, &mut fx));
        resolve(&mut state, &mut fx);

        assert_eq!(state.players[1].state, PlayerState::Ejected);
        assert_eq!(state.players[2].state, PlayerState::Ejected);
        assert_eq!(state.players[0].kills, 2);
        assert!(state.players[0].ship.alive);
    }

    #[test]
    fn test_beam_ignores_shield() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.players[1].power_up = PowerUpState::fresh(PowerUpKind::Shield);

        fire(&mut state, 0, &mut fx);
        resolve(&mut state, &mut fx);
        assert!(!state.players[1].ship.alive);
    }

    #[test]
    fn test_charges_and_cooldown() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();

        assert!(fire(&mut state, 0, &mut fx));
        assert!(!fire(&mut state, 0, &mut fx));
        for _ in 1..powerup::LASER_CHARGES {
            state.now_ms += COOLDOWN_MS;
            assert!(fire(&mut state, 0, &mut fx));
        }
        assert!(state.players[0].power_up.is_none());
        assert_eq!(state.lasers.len(), powerup::LASER_CHARGES as usize);
    }

    #[test]
    fn test_resolved_beam_is_not_applied_twice() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        fire(&mut state, 0, &mut fx);
        resolve(&mut state, &mut fx);

        // Respawn a target in the old beam path
        state.players[1].ship.respawn(ShipMotion::at(Vec2::new(400.0, 300.0), 0.0), -10_000.0);
        state.players[1].state = PlayerState::Active;
        resolve(&mut state, &mut fx);
        assert!(state.players[1].ship.alive);
    }
}
