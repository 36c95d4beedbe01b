//! Bot decisions and the per-bot state they carry between ticks

use hashbrown::HashMap;
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;

use crate::game::constants::ai::*;
use crate::game::state::{BotKind, GameState, Player, PlayerId, PlayerKind, PlayerState};
use crate::util::vec2::{angle_diff, Vec2};

/// AI behavior mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiBehavior {
    /// Turn toward a target and shoot when lined up
    Hunt,
    /// Pilot on foot, running from the nearest ship
    Evade,
    /// Nothing worth chasing
    #[default]
    Idle,
}

/// Buttons a bot holds until its next decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotAction {
    pub rotate: bool,
    pub fire: bool,
    pub dash: bool,
}

/// Decision state for one bot
#[derive(Debug, Clone, Default)]
pub struct AiState {
    pub behavior: AiBehavior,
    pub target_id: Option<PlayerId>,
    /// Simulation time of the next re-evaluation
    pub next_decision_at: f64,
    pub action: BotAction,
}

/// Output of one decision pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub behavior: AiBehavior,
    pub target_id: Option<PlayerId>,
    pub action: BotAction,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            behavior: AiBehavior::Idle,
            target_id: None,
            action: BotAction::default(),
        }
    }
}

/// AI manager for all bots
#[derive(Debug, Clone, Default)]
pub struct AiManager {
    states: HashMap<PlayerId, AiState, FxBuildHasher>,
}

impl AiManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bot(&mut self, player_id: PlayerId) {
        self.states.insert(player_id, AiState::default());
    }

    pub fn unregister_bot(&mut self, player_id: PlayerId) {
        self.states.remove(&player_id);
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&AiState> {
        self.states.get(&player_id)
    }

    /// Forget cached actions so every bot decides on the next tick
    pub fn reset_decisions(&mut self) {
        for ai in self.states.values_mut() {
            *ai = AiState::default();
        }
    }

    /// Refresh due decisions and write every bot's buttons into its input.
    ///
    /// Due bots are visited in roster order and each draws one roll from the
    /// AI stream before any decision runs, so the parallel pass sees the same
    /// numbers on every run.
    pub fn update(&mut self, state: &mut GameState) {
        let now = state.now_ms;

        let due_bots: Vec<usize> = state
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == PlayerKind::Bot(BotKind::Ai) && p.is_contending())
            .filter(|(_, p)| self.states.get(&p.id).is_some_and(|ai| now >= ai.next_decision_at))
            .map(|(index, _)| index)
            .collect();
        let due: Vec<(usize, f32)> = due_bots
            .into_iter()
            .map(|index| (index, state.rng.ai.next_f32()))
            .collect();

        // Compute decisions in parallel against a read-only view
        let view: &GameState = state;
        let decisions: Vec<(PlayerId, Decision)> = due
            .par_iter()
            .map(|&(index, roll)| (view.players[index].id, decide(view, index, roll)))
            .collect();

        // Apply decisions (sequential, roster order)
        for (bot_id, decision) in decisions {
            if let Some(ai) = self.states.get_mut(&bot_id) {
                ai.behavior = decision.behavior;
                ai.target_id = decision.target_id;
                ai.action = decision.action;
                ai.next_decision_at = now + REACTION_MS;
            }
        }

        for player in state.players.iter_mut() {
            let Some(ai) = self.states.get_mut(&player.id) else {
                continue;
            };
            if player.state == PlayerState::Spectating {
                player.input.press(false, false, now);
                continue;
            }
            player.input.press(ai.action.rotate, ai.action.fire, now);
            if ai.action.dash {
                player.dash_queued = true;
                // One dash per decision
                ai.action.dash = false;
            }
        }
    }
}

fn nearest(candidates: impl Iterator<Item = (PlayerId, Vec2)>, from: Vec2) -> Option<(PlayerId, Vec2, f32)> {
    candidates
        .map(|(id, pos)| (id, pos, pos.distance_to(from)))
        .min_by(|a, b| a.2.total_cmp(&b.2))
}

/// Pure decision for the bot at `index` given a pre-drawn `roll` in [0, 1)
pub fn decide(state: &GameState, index: usize, roll: f32) -> Decision {
    let Some(bot) = state.players.get(index) else {
        return Decision::default();
    };
    match bot.state {
        PlayerState::Active if bot.ship.alive => decide_ship(state, bot, roll),
        PlayerState::Ejected => decide_pilot(state, bot),
        _ => Decision::default(),
    }
}

fn decide_ship(state: &GameState, bot: &Player, roll: f32) -> Decision {
    let motion = &bot.ship.motion;

    let ships = state
        .players
        .iter()
        .filter(|p| p.id != bot.id && p.has_live_ship())
        .map(|p| (p.id, p.ship.motion.position));
    let pilots = state
        .pilots
        .iter()
        .filter(|p| p.alive && p.player_id != bot.id)
        .map(|p| (p.player_id, p.position));
    let target = nearest(ships, motion.position).or_else(|| nearest(pilots, motion.position));

    let near_rock = state
        .asteroids
        .iter()
        .any(|a| a.alive && a.position.distance_to(motion.position) <= DODGE_RADIUS + a.radius);
    let dash = near_rock && roll < DODGE_CHANCE && motion.dash_cooldown <= 0.0;

    let Some((target_id, target_pos, distance)) = target else {
        // Wander: turn now and then so the bot does not hug a wall
        return Decision {
            behavior: AiBehavior::Idle,
            target_id: None,
            action: BotAction {
                rotate: roll < 0.3,
                fire: false,
                dash,
            },
        };
    };

    let desired = (target_pos - motion.position).angle();
    let aligned = angle_diff(motion.angle, desired).abs() <= AIM_TOLERANCE;

    Decision {
        behavior: AiBehavior::Hunt,
        target_id: Some(target_id),
        action: BotAction {
            rotate: !aligned,
            fire: aligned && distance <= FIRE_RANGE && bot.ship.ammo > 0,
            dash,
        },
    }
}

fn decide_pilot(state: &GameState, bot: &Player) -> Decision {
    let Some(pilot) = state.pilot_of(bot.id) else {
        return Decision::default();
    };
    let threats = state
        .players
        .iter()
        .filter(|p| p.id != bot.id && p.has_live_ship())
        .map(|p| (p.id, p.ship.motion.position));
    let Some((threat_id, threat_pos, _)) = nearest(threats, pilot.position) else {
        return Decision::default();
    };

    let away = (pilot.position - threat_pos).angle();
    let facing_away = angle_diff(pilot.angle, away).abs() <= AIM_TOLERANCE * 3.0;

    Decision {
        behavior: AiBehavior::Evade,
        target_id: Some(threat_id),
        action: BotAction {
            rotate: !facing_away,
            fire: facing_away,
            dash: false,
        },
    }
}

/// Display name for the `n`th bot added to a room
pub fn bot_name(n: usize) -> String {
    format!("Bot {}", n)
}
