//! Mine power-up: proximity trigger, arming delay, area blast

use crate::game::constants::mine::*;
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{GameState, Mine, PlayerId, PowerUpState};
use crate::game::systems::{asteroid, collision, lifecycle};
use crate::util::vec2::Vec2;

/// Drop a mine behind the ship
pub fn drop_mine(state: &mut GameState, index: usize, fx: &mut impl EffectsSink) -> bool {
    let now = state.now_ms;
    let Some(player) = state.players.get_mut(index) else {
        return false;
    };
    let Some(PowerUpState::Mine { charges }) = &mut player.power_up else {
        return false;
    };
    *charges = charges.saturating_sub(1);
    if *charges == 0 {
        player.power_up = None;
    }

    let owner_id = player.id;
    let motion = player.ship.motion;
    let position = motion.position - motion.forward() * DROP_OFFSET;
    let id = state.next_entity_id();
    state.mines.push(Mine {
        id,
        owner_id,
        position,
        spawned_at: now,
        triggered_at: None,
        alive: true,
    });
    fx.emit(GameEvent::sound(SoundKind::MineDrop, Some(owner_id)));
    true
}

/// Blast everything in range except the owner's own ship and pilot
pub fn blast(
    state: &mut GameState,
    centre: Vec2,
    radius: f32,
    owner: Option<PlayerId>,
    fx: &mut impl EffectsSink,
) {
    let ships = collision::ships_within(state, centre, radius);
    let pilots = collision::pilots_within(state, centre, radius);

    for victim in ships.into_iter().filter(|v| Some(*v) != owner) {
        lifecycle::hit_ship(state, victim, owner, true, fx);
    }
    for victim in pilots.into_iter().filter(|v| Some(*v) != owner) {
        lifecycle::kill_pilot(state, victim, owner, fx);
    }
    for index in 0..state.asteroids.len() {
        let rock = &state.asteroids[index];
        if rock.alive && rock.position.distance_to(centre) <= radius + rock.radius {
            asteroid::destroy(state, index, fx);
        }
    }
    fx.emit(GameEvent::shake(0.8, 300.0));
}

/// Trigger, arm and detonate mines
pub fn update(state: &mut GameState, fx: &mut impl EffectsSink) {
    let now = state.now_ms;
    let mut detonations = Vec::new();

    for mine in state.mines.iter_mut().filter(|m| m.alive) {
        match mine.triggered_at {
            None => {
                let enemy_near = state.players.iter().any(|p| {
                    p.id != mine.owner_id
                        && p.has_live_ship()
                        && p.ship.motion.position.distance_to(mine.position) <= TRIGGER_RADIUS
                });
                if enemy_near {
                    mine.triggered_at = Some(now);
                }
            }
            Some(at) if now - at >= ARM_DELAY_MS => {
                mine.alive = false;
                detonations.push((mine.position, mine.owner_id));
            }
            Some(_) => {}
        }
    }

    for (centre, owner) in detonations {
        fx.emit(GameEvent::sound(SoundKind::MineBlast, Some(owner)));
        blast(state, centre, BLAST_RADIUS, Some(owner), fx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Player, PlayerKind, PlayerState, PowerUpKind, ShipMotion};
    use uuid::Uuid;

    fn create_test_state() -> GameState {
        let mut state = GameState::new(4);
        for (i, x) in [300.0f32, 800.0].into_iter().enumerate() {
            let mut player = Player::new(Uuid::from_u128(i as u128 + 1), PlayerKind::Human, format!("P{i}"), i as u8, i as u64);
            player.ship.respawn(ShipMotion::at(Vec2::new(x, 400.0), 0.0), -10_000.0);
            state.players.push(player);
        }
        state.players[0].power_up = PowerUpState::fresh(PowerUpKind::Mine);
        state
    }

    #[test]
    fn test_drop_places_mine_behind_ship() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        assert!(drop_mine(&mut state, 0, &mut fx));
        assert_eq!(state.mines.len(), 1);
        assert!((state.mines[0].position.x - (300.0 - DROP_OFFSET)).abs() < 1e-3);
    }

    #[test]
    fn test_owner_does_not_trigger_own_mine() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        drop_mine(&mut state, 0, &mut fx);
        update(&mut state, &mut fx);
        assert!(state.mines[0].triggered_at.is_none());
    }

    #[test]
    fn test_enemy_triggers_then_blast_after_delay() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        drop_mine(&mut state, 0, &mut fx);
        let mine_pos = state.mines[0].position;
        state.players[1].ship.motion.position = mine_pos + Vec2::new(TRIGGER_RADIUS - 5.0, 0.0);

        update(&mut state, &mut fx);
        assert_eq!(state.mines[0].triggered_at, Some(0.0));
        assert!(state.players[1].ship.alive);

        state.now_ms = ARM_DELAY_MS;
        update(&mut state, &mut fx);
        assert!(!state.mines[0].alive);
        assert_eq!(state.players[1].state, PlayerState::Ejected);
        assert_eq!(state.players[0].kills, 1);
    }

    #[test]
    fn test_untriggered_mine_expires() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        drop_mine(&mut state, 0, &mut fx);
        state.now_ms = LIFETIME_MS;
        assert!(state.mines[0].is_expired(state.now_ms));
    }
}
