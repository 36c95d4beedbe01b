//! Power-up spawning, magnet attraction and pickup

use bitvec::prelude::*;
use tracing::debug;

use crate::game::constants::{arena, powerup::*};
use crate::game::error::GameError;
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{GameState, Player, PlayerId, PowerUp, PowerUpKind, PowerUpState};
use crate::game::systems::physics::{reflect_walls, ArenaBounds};
use crate::util::vec2::Vec2;

/// Whether `player` may attract and collect a power-up of `kind`
fn eligible(player: &Player, kind: PowerUpKind) -> bool {
    player.has_live_ship() && (kind.is_instant() || player.power_up.is_none())
}

/// Spawn one power-up at a random spot
pub fn spawn(state: &mut GameState) -> PowerUp {
    let rng = &mut state.rng.power_ups;
    let margin = arena::SPAWN_MARGIN;
    let kind = rng.pick(&PowerUpKind::ALL).copied().unwrap_or(PowerUpKind::Shield);
    let position = Vec2::new(
        rng.range(margin, arena::WIDTH - margin),
        rng.range(margin, arena::HEIGHT - margin),
    );
    let id = state.next_entity_id();
    let power_up = PowerUp {
        id,
        kind,
        position,
        velocity: Vec2::ZERO,
        spawned_at: state.now_ms,
        magnet_target: None,
        alive: true,
    };
    state.power_ups.push(power_up.clone());
    power_up
}

fn spawn_due(state: &mut GameState) {
    if !state.settings.power_ups_enabled {
        return;
    }
    let active = state.power_ups.iter().filter(|p| p.alive).count();
    if active >= MAX_ACTIVE || state.now_ms - state.last_power_up_spawn_at < SPAWN_INTERVAL_MS {
        return;
    }
    state.last_power_up_spawn_at = state.now_ms;
    let spawned = spawn(state);
    debug!("Power-up {:?} spawned at {:?}", spawned.kind, spawned.position);
}

/// Lock each free power-up onto the nearest eligible ship that nothing else
/// is already flying toward.
fn assign_magnets(state: &mut GameState) {
    let mut claimed = bitvec![0; state.players.len()];

    // Drop locks whose target stopped being eligible
    for index in 0..state.power_ups.len() {
        let power_up = &state.power_ups[index];
        let Some(target) = power_up.magnet_target else {
            continue;
        };
        match state.player_index(target) {
            Some(slot) if power_up.alive && eligible(&state.players[slot], power_up.kind) && !claimed[slot] => {
                claimed.set(slot, true);
            }
            _ => state.power_ups[index].magnet_target = None,
        }
    }

    for power_up in state.power_ups.iter_mut().filter(|p| p.alive && p.magnet_target.is_none()) {
        let nearest = state
            .players
            .iter()
            .enumerate()
            .filter(|(slot, p)| !claimed[*slot] && eligible(p, power_up.kind))
            .map(|(slot, p)| (slot, p.ship.motion.position.distance_to(power_up.position)))
            .filter(|(_, d)| *d <= MAGNET_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((slot, _)) = nearest {
            claimed.set(slot, true);
            power_up.magnet_target = Some(state.players[slot].id);
        }
    }
}

fn move_power_ups(state: &mut GameState, dt: f32) {
    let bounds = ArenaBounds::default();
    for power_up in state.power_ups.iter_mut().filter(|p| p.alive) {
        let pull = power_up
            .magnet_target
            .and_then(|id| state.players.iter().find(|p| p.id == id))
            .map(|p| p.ship.motion.position);
        if let Some(target) = pull {
            let dir = (target - power_up.position).normalize();
            power_up.velocity = (power_up.velocity + dir * MAGNET_ACCEL * dt).clamp_length(MAGNET_MAX_SPEED);
        }
        power_up.position += power_up.velocity * dt;
        reflect_walls(&mut power_up.position, &mut power_up.velocity, RADIUS, &bounds, 0.5, 0.0);
    }
}

/// Give `kind` to the player at `index`; Reverse hits everyone else instead
pub fn award(state: &mut GameState, index: usize, kind: PowerUpKind, fx: &mut impl EffectsSink) {
    let now = state.now_ms;
    let collector = state.players[index].id;

    if kind.is_instant() {
        for other in state.players.iter_mut().filter(|p| p.id != collector) {
            other.reversed_until = now + REVERSE_DURATION_MS;
        }
    } else {
        state.players[index].power_up = PowerUpState::fresh(kind);
    }
    state.roster_dirty = true;

    debug!("{} picked up {:?}", collector, kind);
    fx.emit(GameEvent::sound(SoundKind::PowerUpPickup, Some(collector)));
}

fn collect(state: &mut GameState, fx: &mut impl EffectsSink) {
    for index in 0..state.power_ups.len() {
        let power_up = &state.power_ups[index];
        if !power_up.alive {
            continue;
        }
        let collector = state.players.iter().position(|p| {
            eligible(p, power_up.kind) && p.ship.motion.position.distance_to(power_up.position) <= PICKUP_RADIUS
        });
        if let Some(slot) = collector {
            let kind = power_up.kind;
            state.power_ups[index].alive = false;
            award(state, slot, kind, fx);
        }
    }
}

/// Spawn, attract and collect power-ups for one tick
pub fn update(state: &mut GameState, fx: &mut impl EffectsSink, dt: f32) {
    spawn_due(state);
    assign_magnets(state);
    move_power_ups(state, dt);
    collect(state, fx);
}

/// Hand `kind` straight to a player (developer command)
pub fn grant(
    state: &mut GameState,
    player_id: PlayerId,
    kind: PowerUpKind,
    fx: &mut impl EffectsSink,
) -> Result<(), GameError> {
    let index = state.player_index(player_id).ok_or(GameError::NotFound)?;
    let player = &state.players[index];
    if !player.has_live_ship() {
        return Err(GameError::InvalidState("player has no ship in play".to_string()));
    }
    if !kind.is_instant() && player.power_up.is_some() {
        return Err(GameError::PowerUpOccupied);
    }
    award(state, index, kind, fx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::physics::DT;
    use crate::game::state::{PlayerKind, ShipMotion};
    use uuid::Uuid;

    fn create_test_state() -> GameState {
        let mut state = GameState::new(5);
        for (i, x) in [300.0f32, 900.0].into_iter().enumerate() {
            let mut player = Player::new(Uuid::from_u128(i as u128 + 1), PlayerKind::Human, format!("P{i}"), i as u8, i as u64);
            player.ship.respawn(ShipMotion::at(Vec2::new(x, 400.0), 0.0), -10_000.0);
            state.players.push(player);
        }
        state
    }

    fn place(state: &mut GameState, kind: PowerUpKind, at: Vec2) {
        let id = state.next_entity_id();
        state.power_ups.push(PowerUp {
            id,
            kind,
            position: at,
            velocity: Vec2::ZERO,
            spawned_at: state.now_ms,
            magnet_target: None,
            alive: true,
        });
    }

    #[test]
    fn test_spawns_on_interval_up_to_cap() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.players.clear();

        for step in 1..=10 {
            state.now_ms = SPAWN_INTERVAL_MS * step as f64;
            update(&mut state, &mut fx, 0.0);
        }
        assert_eq!(state.power_ups.len(), MAX_ACTIVE);
    }

    #[test]
    fn test_disabled_power_ups_never_spawn() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.settings.power_ups_enabled = false;
        state.now_ms = SPAWN_INTERVAL_MS * 3.0;
        update(&mut state, &mut fx, DT);
        assert!(state.power_ups.is_empty());
    }

    #[test]
    fn test_one_power_up_in_flight_per_ship() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.last_power_up_spawn_at = f64::INFINITY;
        place(&mut state, PowerUpKind::Laser, Vec2::new(360.0, 400.0));
        place(&mut state, PowerUpKind::Mine, Vec2::new(380.0, 400.0));

        update(&mut state, &mut fx, DT);
        let owner = state.players[0].id;
        let locked: Vec<_> = state.power_ups.iter().filter(|p| p.magnet_target == Some(owner)).collect();
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].kind, PowerUpKind::Laser);
    }

    #[test]
    fn test_holder_does_not_attract_second_power_up() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.last_power_up_spawn_at = f64::INFINITY;
        state.players[0].power_up = PowerUpState::fresh(PowerUpKind::Shield);
        place(&mut state, PowerUpKind::Laser, Vec2::new(310.0, 400.0));

        update(&mut state, &mut fx, DT);
        assert!(state.power_ups[0].alive);
        assert!(state.power_ups[0].magnet_target.is_none());
        assert_eq!(state.players[0].power_up.map(|p| p.kind()), Some(PowerUpKind::Shield));
    }

    #[test]
    fn test_magnet_pulls_into_pickup() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.last_power_up_spawn_at = f64::INFINITY;
        place(&mut state, PowerUpKind::Homing, Vec2::new(300.0 + MAGNET_RADIUS - 5.0, 400.0));

        for _ in 0..120 {
            update(&mut state, &mut fx, DT);
        }
        assert!(!state.power_ups[0].alive);
        assert_eq!(state.players[0].power_up.map(|p| p.kind()), Some(PowerUpKind::Homing));
        assert!(fx.contains(&GameEvent::sound(SoundKind::PowerUpPickup, Some(state.players[0].id))));
    }

    #[test]
    fn test_reverse_affects_everyone_else() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        state.players[0].power_up = PowerUpState::fresh(PowerUpKind::Mine);
        state.now_ms = 100.0;

        award(&mut state, 0, PowerUpKind::Reverse, &mut fx);
        assert_eq!(state.players[0].reversed_until, 0.0);
        assert_eq!(state.players[1].reversed_until, 100.0 + REVERSE_DURATION_MS);
        assert_eq!(state.players[0].power_up.map(|p| p.kind()), Some(PowerUpKind::Mine));
    }

    #[test]
    fn test_grant_respects_exclusivity() {
        let mut state = create_test_state();
        let mut fx: Vec<GameEvent> = Vec::new();
        let id = state.players[0].id;

        assert!(grant(&mut state, id, PowerUpKind::Joust, &mut fx).is_ok());
        assert_eq!(grant(&mut state, id, PowerUpKind::Laser, &mut fx), Err(GameError::PowerUpOccupied));
        assert!(grant(&mut state, id, PowerUpKind::Reverse, &mut fx).is_ok());
        assert_eq!(grant(&mut state, Uuid::nil(), PowerUpKind::Laser, &mut fx), Err(GameError::NotFound));
    }
}
