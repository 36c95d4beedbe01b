//! Ship destruction, pilot ejection/death, respawn and per-tick cleanup

use tracing::debug;

use crate::game::constants::{game, laser};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{GameState, Pilot, PlayerId, PlayerState, PowerUpState};
use crate::game::systems::asteroid;

/// What a damaging hit did to a ship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Dead, invulnerable or unknown target
    Ignored,
    /// Shield took the hit
    Absorbed,
    Destroyed,
}

/// Apply one hit to `victim`'s ship.
///
/// When `shieldable` is set a held shield loses one charge instead of the ship
/// being destroyed.
pub fn hit_ship(
    state: &mut GameState,
    victim: PlayerId,
    attacker: Option<PlayerId>,
    shieldable: bool,
    fx: &mut impl EffectsSink,
) -> HitOutcome {
    let now = state.now_ms;
    let Some(player) = state.get_player_mut(victim) else {
        return HitOutcome::Ignored;
    };
    if !player.has_live_ship() || player.ship.is_invulnerable(now) {
        return HitOutcome::Ignored;
    }

    if shieldable {
        if let Some(PowerUpState::Shield { hits_remaining }) = &mut player.power_up {
            *hits_remaining = hits_remaining.saturating_sub(1);
            if *hits_remaining == 0 {
                player.power_up = None;
            }
            fx.emit(GameEvent::sound(SoundKind::ShieldHit, Some(victim)));
            return HitOutcome::Absorbed;
        }
    }

    destroy_ship(state, victim, attacker, fx);
    HitOutcome::Destroyed
}

/// Destroy a ship outright and eject its pilot at the ship's pose
pub fn destroy_ship(
    state: &mut GameState,
    victim: PlayerId,
    attacker: Option<PlayerId>,
    fx: &mut impl EffectsSink,
) {
    let now = state.now_ms;
    let Some(player) = state.get_player_mut(victim) else {
        return;
    };
    if !player.has_live_ship() {
        return;
    }

    player.ship.alive = false;
    player.state = PlayerState::Ejected;
    player.power_up = None;
    let pilot = Pilot::eject(victim, &player.ship.motion, now);

    state.pilots.retain(|p| p.player_id != victim);
    state.pilots.push(pilot);
    credit_kill(state, victim, attacker);
    state.roster_dirty = true;

    debug!("Ship of {} destroyed by {:?}", victim, attacker);
    fx.emit(GameEvent::sound(SoundKind::Explosion, Some(victim)));
    fx.emit(GameEvent::sound(SoundKind::PilotEject, Some(victim)));
    fx.emit(GameEvent::shake(0.6, 250.0));
}

/// Kill `victim`'s pilot, removing the player from the round.
///
/// Returns false when there was no live pilot to kill.
pub fn kill_pilot(
    state: &mut GameState,
    victim: PlayerId,
    killer: Option<PlayerId>,
    fx: &mut impl EffectsSink,
) -> bool {
    let Some(pilot) = state.pilots.iter_mut().find(|p| p.player_id == victim && p.alive) else {
        return false;
    };
    pilot.alive = false;

    if let Some(player) = state.get_player_mut(victim) {
        player.state = PlayerState::Spectating;
    }
    credit_kill(state, victim, killer);
    schedule_elimination_check(state);
    state.roster_dirty = true;

    debug!("Pilot of {} killed by {:?}", victim, killer);
    fx.emit(GameEvent::sound(SoundKind::PilotKilled, Some(victim)));
    fx.emit(GameEvent::shake(0.3, 150.0));
    true
}

fn credit_kill(state: &mut GameState, victim: PlayerId, killer: Option<PlayerId>) {
    if let Some(killer) = killer.filter(|k| *k != victim) {
        if let Some(player) = state.get_player_mut(killer) {
            player.kills += 1;
        }
    }
}

/// Schedule a win-condition evaluation after the grace window.
///
/// Several eliminations in quick succession keep the earliest deadline.
pub fn schedule_elimination_check(state: &mut GameState) {
    let deadline = state.now_ms + game::ELIMINATION_GRACE_MS;
    let pending = &mut state.match_state.pending_elimination_check;
    *pending = Some(pending.map_or(deadline, |current| current.min(deadline)));
}

/// Respawn ships whose pilot survived long enough
pub fn respawn_survivors(state: &mut GameState, fx: &mut impl EffectsSink) {
    let now = state.now_ms;
    let survivors: Vec<Pilot> = state
        .pilots
        .iter()
        .filter(|p| p.alive && p.survived(now))
        .cloned()
        .collect();

    for pilot in survivors {
        let Some(player) = state.get_player_mut(pilot.player_id) else {
            continue;
        };
        if player.state != PlayerState::Ejected {
            continue;
        }
        let mut motion = player.ship.motion;
        motion.position = pilot.position;
        motion.angle = pilot.angle;
        player.ship.respawn(motion, now);
        player.state = PlayerState::Active;
        state.roster_dirty = true;

        if let Some(p) = state.pilots.iter_mut().find(|p| p.player_id == pilot.player_id) {
            p.alive = false;
        }
        fx.emit(GameEvent::sound(SoundKind::Respawn, Some(pilot.player_id)));
    }
}

/// Expiry pass: drop dead or timed-out entities and top up asteroids
pub fn cleanup(state: &mut GameState) {
    let now = state.now_ms;

    state.pilots.retain(|p| p.alive);
    state.projectiles.retain(|p| p.alive);
    state.lasers.retain(|l| now - l.spawned_at < laser::BEAM_MS);
    state.mines.retain(|m| m.alive && !m.is_expired(now));
    state.missiles.retain(|m| m.alive);
    state.asteroids.retain(|a| a.alive);
    state.power_ups.retain(|p| p.alive && !p.is_expired(now));
    state.turret_bullets.retain(|b| b.alive);

    asteroid::top_up(state);
}
