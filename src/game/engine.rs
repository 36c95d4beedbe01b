//! Authoritative simulation engine
//!
//! One [`Simulation`] owns a room: roster, phase machine, leader, bot brains
//! and the per-tick pipeline. Commands are applied between ticks; `advance`
//! runs one fixed step and returns the snapshot it broadcast.

use std::f32::consts::{PI, TAU};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::constants::{arena, game};
use crate::game::error::GameError;
use crate::game::events::{EffectsSink, GameEvent};
use crate::game::match_result::{self, RoundOutcome};
use crate::game::settings::{AdvancedSettings, GameMode};
use crate::game::state::{
    BotKind, GameState, MatchPhase, Player, PlayerId, PlayerKind, PlayerState, PowerUpKind, PowerUpState, ShipMotion,
};
use crate::game::systems::ai::{bot_name, AiManager};
use crate::game::systems::{
    asteroid, collision, homing, joust, laser, lifecycle, mine, physics, powerup, projectile, turret,
};
use crate::net::protocol::{ClientMessage, GameSnapshot, PlayerInput, PlayerList, RoomMeta};
use crate::util::vec2::Vec2;

/// Source of wall-clock time for per-round seeding
pub trait WallClock: Send {
    fn now_ms(&self) -> u64;
}

/// Real time since the Unix epoch
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Pinned clock for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl WallClock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}

/// Seat `index` of `count` on an ellipse inside the arena, facing the centre
pub fn seat(index: usize, count: usize) -> ShipMotion {
    let centre = Vec2::new(arena::WIDTH * 0.5, arena::HEIGHT * 0.5);
    let rx = arena::WIDTH * 0.5 - arena::SPAWN_MARGIN;
    let ry = arena::HEIGHT * 0.5 - arena::SPAWN_MARGIN;
    let theta = PI + TAU * index as f32 / count.max(1) as f32;
    let position = centre + Vec2::new(rx * theta.cos(), ry * theta.sin());
    ShipMotion::at(position, (centre - position).angle())
}

fn sanitize_name(raw: &str) -> Option<String> {
    let name: String = raw.trim().chars().take(game::MAX_NAME_LEN).collect();
    (!name.is_empty()).then_some(name)
}

pub struct Simulation<S: EffectsSink> {
    state: GameState,
    sink: S,
    clock: Box<dyn WallClock>,
    bots: AiManager,
    leader: Option<PlayerId>,
    dev_mode: bool,
    roster_revision: u64,
    next_join_order: u64,
    bots_added: usize,
    max_players: usize,
}

impl<S: EffectsSink> Simulation<S> {
    pub fn new(sink: S) -> Self {
        Self::with_clock(sink, Box::new(SystemClock))
    }

    pub fn with_clock(sink: S, clock: Box<dyn WallClock>) -> Self {
        let seed = clock.now_ms() as u32;
        Self {
            state: GameState::new(seed),
            sink,
            clock,
            bots: AiManager::new(),
            leader: None,
            dev_mode: false,
            roster_revision: 0,
            next_join_order: 0,
            bots_added: 0,
            max_players: game::MAX_PLAYERS,
        }
    }

    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players.clamp(game::MIN_PLAYERS, game::MAX_PLAYERS);
        self
    }

    pub fn with_settings(mut self, settings: AdvancedSettings) -> Self {
        self.state.settings = settings;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct state access for scenario setup
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn leader(&self) -> Option<PlayerId> {
        self.leader
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn bots(&self) -> &AiManager {
        &self.bots
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Apply one inbound message. A rejection is also reported to `session`
    /// as an error event.
    pub fn handle(&mut self, session: PlayerId, message: ClientMessage) -> Result<(), GameError> {
        let result = match message {
            ClientMessage::Join { name } => self.join(session, name),
            ClientMessage::Leave => self.leave(session),
            ClientMessage::Rename { name } => self.rename(session, &name),
            ClientMessage::Input(input) => self.input(session, input),
            ClientMessage::QueueDash => self.queue_dash(session),
            ClientMessage::StartMatch => self.start_match(session),
            ClientMessage::RestartToLobby => self.restart_to_lobby(session),
            ClientMessage::SetMode { mode } => self.set_mode(session, mode),
            ClientMessage::SetAdvancedSettings(settings) => self.set_advanced_settings(session, settings),
            ClientMessage::AddAiBot => self.add_ai_bot(session).map(|_| ()),
            ClientMessage::AddLocalPlayer => self.add_local_player(session),
            ClientMessage::RemoveBot { target } => self.remove_bot(session, target),
            ClientMessage::KickPlayer { target } => self.kick_player(session, target),
            ClientMessage::SetDevMode { enabled } => self.set_dev_mode(session, enabled),
            ClientMessage::DevGrantPowerUp { kind } => self.dev_grant_power_up(session, kind),
        };

        if let Err(err) = &result {
            debug!("Rejected command from {}: {}", session, err);
            self.sink.emit(GameEvent::Error {
                session,
                code: err.code(),
                message: err.to_string(),
            });
        }
        result
    }

    pub fn join(&mut self, session: PlayerId, name: Option<String>) -> Result<(), GameError> {
        if self.state.get_player(session).is_some() {
            return Ok(());
        }
        if self.state.players.len() >= self.max_players {
            warn!("Join from {} rejected: room full", session);
            return Err(GameError::RoomFull);
        }

        let order = self.next_join_order;
        self.next_join_order += 1;
        let name = name
            .as_deref()
            .and_then(sanitize_name)
            .unwrap_or_else(|| format!("Player {}", self.state.human_count() + 1));
        let mut player = Player::new(session, PlayerKind::Human, name, self.state.free_color_slot(), order);
        player.ship.max_ammo = self.state.settings.max_ammo;
        if self.state.phase() != MatchPhase::Lobby {
            player.state = PlayerState::Spectating;
        }

        info!("Player {} ({}) joined", player.name, session);
        self.state.players.push(player);
        if self.leader.is_none() {
            self.leader = Some(session);
        }
        self.state.roster_dirty = true;
        self.emit_room_meta();
        Ok(())
    }

    pub fn leave(&mut self, session: PlayerId) -> Result<(), GameError> {
        self.remove_player(session)?;
        info!("Player {} left", session);
        Ok(())
    }

    pub fn rename(&mut self, session: PlayerId, name: &str) -> Result<(), GameError> {
        let name = sanitize_name(name).ok_or_else(|| GameError::InvalidState("name must not be empty".to_string()))?;
        let player = self.state.get_player_mut(session).ok_or(GameError::NotFound)?;
        player.name = name;
        self.state.roster_dirty = true;
        Ok(())
    }

    /// Latest held buttons. Inputs at or below the last applied sequence are
    /// stale and ignored.
    pub fn input(&mut self, session: PlayerId, input: PlayerInput) -> Result<(), GameError> {
        let now = self.state.now_ms;
        let player = self.state.get_player_mut(session).ok_or(GameError::NotFound)?;
        if input.sequence <= player.last_input_seq {
            return Ok(());
        }
        player.input.press(input.rotate, input.fire, now);
        player.input.client_time_ms = input.client_time_ms;
        player.last_input_seq = input.sequence;
        Ok(())
    }

    pub fn queue_dash(&mut self, session: PlayerId) -> Result<(), GameError> {
        let player = self.state.get_player_mut(session).ok_or(GameError::NotFound)?;
        if player.has_live_ship() {
            player.dash_queued = true;
        }
        Ok(())
    }

    pub fn start_match(&mut self, session: PlayerId) -> Result<(), GameError> {
        self.require_leader(session)?;
        self.require_phase(MatchPhase::Lobby)?;
        if self.state.players.len() < game::MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                required: game::MIN_PLAYERS,
            });
        }

        for player in self.state.players.iter_mut() {
            player.kills = 0;
            player.round_wins = 0;
            player.state = PlayerState::Active;
        }
        info!("Match started with {} players", self.state.players.len());
        self.enter_countdown(1);
        Ok(())
    }

    pub fn restart_to_lobby(&mut self, session: PlayerId) -> Result<(), GameError> {
        self.require_leader(session)?;
        if self.state.phase() == MatchPhase::Lobby {
            return Err(GameError::InvalidPhase {
                phase: MatchPhase::Lobby.as_str(),
            });
        }
        self.enter_lobby();
        Ok(())
    }

    pub fn set_mode(&mut self, session: PlayerId, mode: GameMode) -> Result<(), GameError> {
        self.require_leader(session)?;
        self.require_phase(MatchPhase::Lobby)?;
        self.state.mode = mode;
        self.emit_room_meta();
        Ok(())
    }

    pub fn set_advanced_settings(&mut self, session: PlayerId, settings: AdvancedSettings) -> Result<(), GameError> {
        self.require_leader(session)?;
        self.require_phase(MatchPhase::Lobby)?;
        settings.validate()?;
        for player in self.state.players.iter_mut() {
            player.ship.max_ammo = settings.max_ammo;
        }
        self.state.settings = settings;
        self.emit_room_meta();
        Ok(())
    }

    /// Add a scripted bot; its id comes from the entity-id stream
    pub fn add_ai_bot(&mut self, session: PlayerId) -> Result<PlayerId, GameError> {
        self.require_leader(session)?;
        self.require_phase(MatchPhase::Lobby)?;
        if self.state.players.len() >= self.max_players {
            return Err(GameError::RoomFull);
        }

        let id = loop {
            let rng = &mut self.state.rng.entity_ids;
            let raw = (0..4).fold(0u128, |acc, _| (acc << 32) | rng.next_u32() as u128);
            let candidate = Uuid::from_u128(raw);
            if self.state.get_player(candidate).is_none() {
                break candidate;
            }
        };

        self.bots_added += 1;
        let order = self.next_join_order;
        self.next_join_order += 1;
        let mut bot = Player::new(
            id,
            PlayerKind::Bot(BotKind::Ai),
            bot_name(self.bots_added),
            self.state.free_color_slot(),
            order,
        );
        bot.ship.max_ammo = self.state.settings.max_ammo;

        info!("Bot {} ({}) added", bot.name, id);
        self.state.players.push(bot);
        self.bots.register_bot(id);
        self.state.roster_dirty = true;
        Ok(id)
    }

    /// Same-device players need local input capture, which this build lacks
    pub fn add_local_player(&mut self, _session: PlayerId) -> Result<(), GameError> {
        Err(GameError::LocalPlayerUnsupported)
    }

    pub fn remove_bot(&mut self, session: PlayerId, target: PlayerId) -> Result<(), GameError> {
        self.require_leader(session)?;
        match self.state.get_player(target) {
            Some(p) if p.is_bot() => {}
            _ => return Err(GameError::NotFound),
        }
        self.remove_player(target)?;
        info!("Bot {} removed", target);
        Ok(())
    }

    pub fn kick_player(&mut self, session: PlayerId, target: PlayerId) -> Result<(), GameError> {
        self.require_leader(session)?;
        if target == session {
            return Err(GameError::InvalidState("cannot kick yourself".to_string()));
        }
        self.remove_player(target)?;
        info!("Player {} kicked by {}", target, session);
        Ok(())
    }

    pub fn set_dev_mode(&mut self, session: PlayerId, enabled: bool) -> Result<(), GameError> {
        self.require_leader(session)?;
        self.dev_mode = enabled;
        info!("Dev mode {}", if enabled { "enabled" } else { "disabled" });
        self.sink.emit(GameEvent::DevModeChanged { enabled });
        self.emit_room_meta();
        Ok(())
    }

    pub fn dev_grant_power_up(&mut self, session: PlayerId, kind: PowerUpKind) -> Result<(), GameError> {
        if !self.dev_mode {
            return Err(GameError::DevModeRequired);
        }
        self.require_phase(MatchPhase::Playing)?;
        powerup::grant(&mut self.state, session, kind, &mut self.sink)
    }

    fn require_leader(&self, session: PlayerId) -> Result<(), GameError> {
        if self.leader == Some(session) {
            Ok(())
        } else {
            Err(GameError::LeaderOnly)
        }
    }

    fn require_phase(&self, expected: MatchPhase) -> Result<(), GameError> {
        let phase = self.state.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(GameError::InvalidPhase { phase: phase.as_str() })
        }
    }

    fn remove_player(&mut self, id: PlayerId) -> Result<(), GameError> {
        let index = self.state.player_index(id).ok_or(GameError::NotFound)?;
        let removed = self.state.players.remove(index);
        self.state.pilots.retain(|p| p.player_id != id);
        for power_up in self.state.power_ups.iter_mut() {
            if power_up.magnet_target == Some(id) {
                power_up.magnet_target = None;
            }
        }
        if removed.is_bot() {
            self.bots.unregister_bot(id);
        }

        if self.leader == Some(id) {
            self.leader = self.state.players.iter().find(|p| !p.is_bot()).map(|p| p.id);
            info!("Leader is now {:?}", self.leader);
        }

        if self.state.phase() == MatchPhase::Playing && removed.is_contending() {
            lifecycle::schedule_elimination_check(&mut self.state);
        }
        self.state.roster_dirty = true;
        self.check_quorum();
        self.emit_room_meta();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase machine
    // ------------------------------------------------------------------

    fn check_quorum(&mut self) {
        if self.state.phase().requires_quorum() && self.state.players.len() < game::MIN_PLAYERS {
            info!("Below {} players, returning to lobby", game::MIN_PLAYERS);
            self.enter_lobby();
        }
    }

    fn set_phase(&mut self, phase: MatchPhase, deadline: Option<f64>, winner: Option<PlayerId>) {
        let now = self.state.now_ms;
        let ms = &mut self.state.match_state;
        ms.phase = phase;
        ms.phase_started_at = now;
        ms.phase_deadline = deadline;
        ms.winner = winner;
        info!("Phase -> {} (round {})", phase.as_str(), ms.round);
        self.sink.emit(GameEvent::PhaseChanged { phase, winner });
        self.emit_room_meta();
    }

    fn enter_lobby(&mut self) {
        self.state.clear_round_entities();
        self.state.match_state.round = 0;
        self.state.match_state.pending_elimination_check = None;
        self.state.match_state.countdown_announced = None;
        for player in self.state.players.iter_mut() {
            player.state = PlayerState::Active;
            player.ship.alive = false;
            player.power_up = None;
            player.reversed_until = 0.0;
            player.dash_queued = false;
        }
        self.bots.reset_decisions();
        self.state.roster_dirty = true;
        self.set_phase(MatchPhase::Lobby, None, None);
    }

    fn enter_countdown(&mut self, round: u32) {
        let seconds = (game::COUNTDOWN_MS / 1000.0).ceil() as u32;
        self.state.match_state.round = round;
        self.state.match_state.countdown_announced = Some(seconds);
        self.set_phase(MatchPhase::Countdown, Some(self.state.now_ms + game::COUNTDOWN_MS), None);
        self.sink.emit(GameEvent::Countdown { seconds });
    }

    fn enter_playing(&mut self) {
        let now = self.state.now_ms;
        let round = self.state.match_state.round;
        let base_seed = (self.clock.now_ms() as u32) ^ round;
        self.state.match_state.base_seed = base_seed;
        self.state.rng.reseed(base_seed);
        info!("Round {} seeded with {:#010x}", round, base_seed);

        self.state.clear_round_entities();
        self.bots.reset_decisions();

        let count = self.state.players.len();
        let max_ammo = self.state.settings.max_ammo;
        let starting = self.state.settings.starting_power_ups;
        for index in 0..count {
            let held = if starting {
                self.state
                    .rng
                    .power_ups
                    .pick(&PowerUpKind::HOLDABLE)
                    .copied()
                    .and_then(PowerUpState::fresh)
            } else {
                None
            };
            let player = &mut self.state.players[index];
            player.ship.max_ammo = max_ammo;
            player.ship.respawn(seat(index, count), now);
            player.state = PlayerState::Active;
            player.power_up = held;
            player.reversed_until = 0.0;
            player.dash_queued = false;
        }

        let field = self.state.settings.initial_asteroids(self.state.mode);
        asteroid::spawn_field(&mut self.state, field);
        turret::reset(&mut self.state);
        self.state.last_power_up_spawn_at = now;
        self.state.match_state.pending_elimination_check = None;
        self.state.match_state.countdown_announced = None;
        self.state.roster_dirty = true;

        self.set_phase(MatchPhase::Playing, None, None);
    }

    fn finish_round(&mut self, outcome: RoundOutcome) {
        let result = match_result::apply(&mut self.state, outcome);
        let winner = result.winner;
        let game_over = result.game_over;
        self.sink.emit(GameEvent::RoundResult(result));

        if game_over {
            self.set_phase(MatchPhase::GameEnd, None, winner);
        } else {
            let deadline = self.state.now_ms + game::ROUND_END_MS;
            self.set_phase(MatchPhase::RoundEnd, Some(deadline), winner);
        }
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Run one fixed step of `dt` seconds and broadcast the resulting snapshot
    pub fn advance(&mut self, dt: f32) -> GameSnapshot {
        self.state.tick += 1;
        self.state.now_ms += dt as f64 * 1000.0;
        let now = self.state.now_ms;

        match self.state.phase() {
            MatchPhase::Lobby | MatchPhase::GameEnd => {}
            MatchPhase::Countdown => {
                let deadline = self.state.match_state.phase_deadline.unwrap_or(now);
                if now >= deadline {
                    self.sink.emit(GameEvent::Countdown { seconds: 0 });
                    self.enter_playing();
                } else {
                    let seconds = ((deadline - now) / 1000.0).ceil() as u32;
                    if self.state.match_state.countdown_announced.is_some_and(|last| seconds < last) {
                        self.state.match_state.countdown_announced = Some(seconds);
                        self.sink.emit(GameEvent::Countdown { seconds });
                    }
                }
            }
            MatchPhase::Playing => self.step_playing(dt),
            MatchPhase::RoundEnd => {
                if self.state.match_state.phase_deadline.is_some_and(|d| now >= d) {
                    let next = self.state.match_state.round + 1;
                    self.enter_countdown(next);
                }
            }
        }

        if self.state.roster_dirty {
            self.state.roster_dirty = false;
            self.emit_player_list();
        }

        let mut snapshot = GameSnapshot::from_game_state(&self.state);
        snapshot.tick_duration_ms = dt as f64 * 1000.0;
        self.sink.emit(GameEvent::Snapshot(snapshot.clone()));
        snapshot
    }

    fn step_playing(&mut self, dt: f32) {
        let state = &mut self.state;
        let fx = &mut self.sink;

        self.bots.update(state);

        physics::integrate_ships(state, fx, dt);
        projectile::update_reload(state);
        projectile::fire_weapons(state, fx);
        physics::integrate_pilots(state, dt);
        physics::integrate_asteroids(state, dt);

        for ram in collision::resolve_all(state) {
            lifecycle::kill_pilot(state, ram.victim, Some(ram.killer), fx);
        }

        projectile::update(state, dt);
        projectile::resolve_hits(state, fx);
        laser::resolve(state, fx);
        mine::update(state, fx);
        homing::update(state, dt);
        homing::resolve_hits(state, fx);
        joust::update(state, fx);
        turret::update(state, fx, dt);
        turret::update_bullets(state, fx, dt);

        powerup::update(state, fx, dt);

        lifecycle::respawn_survivors(state, fx);
        lifecycle::cleanup(state);

        if let Some(outcome) = match_result::evaluate(state) {
            self.finish_round(outcome);
        }
    }

    // ------------------------------------------------------------------
    // Outbound metadata
    // ------------------------------------------------------------------

    fn emit_player_list(&mut self) {
        self.roster_revision += 1;
        let list = PlayerList::from_game_state(&self.state, self.leader, self.roster_revision);
        self.sink.emit(GameEvent::PlayerList(list));
    }

    pub fn room_meta(&self) -> RoomMeta {
        RoomMeta {
            leader: self.leader,
            phase: self.state.phase(),
            mode: self.state.mode,
            settings: self.state.settings.clone(),
            dev_mode: self.dev_mode,
            max_players: self.max_players as u32,
        }
    }

    fn emit_room_meta(&mut self) {
        let meta = self.room_meta();
        self.sink.emit(GameEvent::RoomMeta(meta));
    }
}
