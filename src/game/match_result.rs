//! Round results and standings
//!
//! Evaluates the win condition once the elimination grace window has passed
//! and builds the tallies sent with every round result.

use tracing::info;

use crate::game::state::{GameState, PlayerId};
use crate::net::protocol::{RoundResult, Standing};

/// How a round was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Exactly one player left contending
    Won(PlayerId),
    /// Nobody left
    Tie,
}

/// Evaluate a due elimination check.
///
/// Returns `None` while the grace window is open, when no check is pending, or
/// when two or more players are still contending. A due check is always
/// consumed.
pub fn evaluate(state: &mut GameState) -> Option<RoundOutcome> {
    let deadline = state.match_state.pending_elimination_check?;
    if state.now_ms < deadline {
        return None;
    }
    state.match_state.pending_elimination_check = None;

    let mut contenders = state.players.iter().filter(|p| p.is_contending());
    match (contenders.next(), contenders.next()) {
        (None, _) => Some(RoundOutcome::Tie),
        (Some(only), None) => Some(RoundOutcome::Won(only.id)),
        _ => None,
    }
}

/// Ranked standings: round wins, then kills, then join order
pub fn standings(state: &GameState) -> Vec<Standing> {
    let mut ranked: Vec<_> = state.players.iter().collect();
    ranked.sort_by(|a, b| {
        b.round_wins
            .cmp(&a.round_wins)
            .then_with(|| b.kills.cmp(&a.kills))
            .then_with(|| a.joined_order.cmp(&b.joined_order))
    });

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, p)| Standing {
            player_id: p.id,
            name: p.name.clone(),
            rank: (i + 1) as u32,
            round_wins: p.round_wins,
            kills: p.kills,
            is_bot: p.is_bot(),
        })
        .collect()
}

/// Credit the round and report whether the match is over
pub fn apply(state: &mut GameState, outcome: RoundOutcome) -> RoundResult {
    let target = state.settings.round_win_target;
    let round = state.match_state.round;

    let (winner, game_over) = match outcome {
        RoundOutcome::Won(id) => {
            let wins = state.get_player_mut(id).map(|p| {
                p.round_wins += 1;
                p.round_wins
            });
            (Some(id), wins.is_some_and(|w| w >= target))
        }
        RoundOutcome::Tie => (None, false),
    };
    state.roster_dirty = true;

    match winner {
        Some(id) => info!("Round {} won by {} (match over: {})", round, id, game_over),
        None => info!("Round {} ended in a tie", round),
    }

    RoundResult {
        round,
        winner,
        is_tie: winner.is_none(),
        game_over,
        standings: standings(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::game::ELIMINATION_GRACE_MS;
    use crate::game::state::{Player, PlayerKind, PlayerState};
    use uuid::Uuid;

    fn create_test_state(players: usize) -> GameState {
        let mut state = GameState::new(1);
        for i in 0..players {
            state.players.push(Player::new(
                Uuid::from_u128(i as u128 + 1),
                PlayerKind::Human,
                format!("P{i}"),
                i as u8,
                i as u64,
            ));
        }
        state.match_state.round = 1;
        state
    }

    #[test]
    fn test_nothing_pending() {
        let mut state = create_test_state(2);
        assert_eq!(evaluate(&mut state), None);
    }

    #[test]
    fn test_waits_for_grace_window() {
        let mut state = create_test_state(2);
        state.players[1].state = PlayerState::Spectating;
        state.match_state.pending_elimination_check = Some(ELIMINATION_GRACE_MS);

        state.now_ms = ELIMINATION_GRACE_MS - 1.0;
        assert_eq!(evaluate(&mut state), None);
        assert!(state.match_state.pending_elimination_check.is_some());

        state.now_ms = ELIMINATION_GRACE_MS;
        assert_eq!(evaluate(&mut state), Some(RoundOutcome::Won(state.players[0].id)));
        assert!(state.match_state.pending_elimination_check.is_none());
    }

    #[test]
    fn test_double_elimination_is_a_tie() {
        let mut state = create_test_state(2);
        for p in state.players.iter_mut() {
            p.state = PlayerState::Spectating;
        }
        state.match_state.pending_elimination_check = Some(0.0);
        assert_eq!(evaluate(&mut state), Some(RoundOutcome::Tie));
    }

    #[test]
    fn test_two_contenders_clear_pending() {
        let mut state = create_test_state(3);
        state.players[2].state = PlayerState::Spectating;
        state.players[1].state = PlayerState::Ejected;
        state.match_state.pending_elimination_check = Some(0.0);
        assert_eq!(evaluate(&mut state), None);
        assert!(state.match_state.pending_elimination_check.is_none());
    }

    #[test]
    fn test_apply_reaches_target() {
        let mut state = create_test_state(2);
        state.settings.round_win_target = 2;
        let winner = state.players[1].id;

        let first = apply(&mut state, RoundOutcome::Won(winner));
        assert!(!first.game_over);
        assert_eq!(first.standings[0].player_id, winner);

        let second = apply(&mut state, RoundOutcome::Won(winner));
        assert!(second.game_over);
        assert_eq!(second.winner, Some(winner));
    }

    #[test]
    fn test_tie_credits_nobody() {
        let mut state = create_test_state(2);
        let result = apply(&mut state, RoundOutcome::Tie);
        assert!(result.is_tie);
        assert!(!result.game_over);
        assert!(state.players.iter().all(|p| p.round_wins == 0));
    }

    #[test]
    fn test_standings_order() {
        let mut state = create_test_state(3);
        state.players[0].kills = 5;
        state.players[2].round_wins = 1;
        let ranked = standings(&state);
        assert_eq!(ranked[0].player_id, state.players[2].id);
        assert_eq!(ranked[1].player_id, state.players[0].id);
        assert_eq!(ranked[2].rank, 3);
    }
}
