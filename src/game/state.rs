//! Game state definitions and structures
//!
//! Contains every authoritative entity (players and their ships, pilots,
//! projectiles, asteroids, power-ups, weapon entities, turret) plus the
//! round/match state. Only the simulation engine mutates these.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::game::constants::{arena, game, homing, mine, pilot, powerup, projectile, ship};
use crate::game::settings::{AdvancedSettings, GameMode};
use crate::util::rng::RngStreams;
use crate::util::vec2::Vec2;

/// Unique player identifier (also the transport session id for humans)
pub type PlayerId = Uuid;

/// Entity identifier for non-player entities
pub type EntityId = u64;

/// Asteroid outline, generated once at spawn
pub type Outline = SmallVec<[Vec2; 12]>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BotKind {
    /// Scripted AI driven by the bot system
    Ai,
    /// Same-device local player (not supported by this build)
    Local,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerKind {
    Human,
    Bot(BotKind),
}

impl PlayerKind {
    pub fn is_bot(self) -> bool {
        matches!(self, PlayerKind::Bot(_))
    }
}

/// Lifecycle of a player within a round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Flying a ship
    #[default]
    Active,
    /// Ship destroyed, pilot still alive
    Ejected,
    /// Out of the round
    Spectating,
}

/// Last input received from a player
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct InputState {
    pub rotate: bool,
    pub fire: bool,
    /// Simulation time at which rotate was last pressed
    pub rotate_pressed_at: f64,
    /// Simulation time at which fire was last pressed
    pub fire_pressed_at: f64,
    pub client_time_ms: f64,
}

impl InputState {
    /// Replace the held buttons, stamping rising edges with `now`
    pub fn press(&mut self, rotate: bool, fire: bool, now: f64) {
        if rotate && !self.rotate {
            self.rotate_pressed_at = now;
        }
        if fire && !self.fire {
            self.fire_pressed_at = now;
        }
        self.rotate = rotate;
        self.fire = fire;
    }
}

/// Kinematic state shared by the authority and the client predictor
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipMotion {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    /// Residual spin from collisions (rad/s)
    pub angular_velocity: f32,
    /// Seconds until the next dash is allowed
    pub dash_cooldown: f32,
    /// Rotation input is inverted (Reverse power-up)
    pub reversed: bool,
}

impl ShipMotion {
    pub fn at(position: Vec2, angle: f32) -> Self {
        Self {
            position,
            angle,
            ..Default::default()
        }
    }

    #[inline]
    pub fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.angle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ship {
    pub motion: ShipMotion,
    pub alive: bool,
    pub invulnerable_until: f64,
    pub ammo: u8,
    pub max_ammo: u8,
    /// Simulation time of the last primary shot (negative = never)
    pub last_shot_at: f64,
    /// Start of the running reload cycle, `None` when full
    pub reload_started_at: Option<f64>,
}

impl Ship {
    pub fn new(max_ammo: u8) -> Self {
        Self {
            motion: ShipMotion::default(),
            alive: false,
            invulnerable_until: 0.0,
            ammo: max_ammo,
            max_ammo,
            last_shot_at: f64::NEG_INFINITY,
            reload_started_at: None,
        }
    }

    pub fn is_invulnerable(&self, now: f64) -> bool {
        now < self.invulnerable_until
    }

    /// Put the ship back into play at `motion`, fully loaded
    pub fn respawn(&mut self, motion: ShipMotion, now: f64) {
        self.motion = ShipMotion {
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            dash_cooldown: 0.0,
            ..motion
        };
        self.alive = true;
        self.invulnerable_until = now + ship::SPAWN_INVULNERABLE_MS;
        self.ammo = self.max_ammo;
        self.last_shot_at = f64::NEG_INFINITY;
        self.reload_started_at = None;
    }

    /// Muzzle point just ahead of the hull
    pub fn nose(&self, clearance: f32) -> Vec2 {
        self.motion.position + self.motion.forward() * (ship::RADIUS + clearance)
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PowerUpKind {
    Laser,
    Shield,
    Scatter,
    Mine,
    Reverse,
    Joust,
    Homing,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 7] = [
        PowerUpKind::Laser,
        PowerUpKind::Shield,
        PowerUpKind::Scatter,
        PowerUpKind::Mine,
        PowerUpKind::Reverse,
        PowerUpKind::Joust,
        PowerUpKind::Homing,
    ];

    /// Kinds that can be granted at round start (Reverse is never held)
    pub const HOLDABLE: [PowerUpKind; 6] = [
        PowerUpKind::Laser,
        PowerUpKind::Shield,
        PowerUpKind::Scatter,
        PowerUpKind::Mine,
        PowerUpKind::Joust,
        PowerUpKind::Homing,
    ];

    pub fn is_instant(self) -> bool {
        self == PowerUpKind::Reverse
    }
}

/// A held power-up and its per-kind payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum PowerUpState {
    Laser { charges: u8, last_fired_at: f64 },
    Shield { hits_remaining: u8 },
    Scatter { charges: u8, last_fired_at: f64 },
    Mine { charges: u8 },
    Joust { left_active: bool, right_active: bool },
    Homing { charges: u8 },
}

impl PowerUpState {
    /// Fresh payload for `kind`; `None` for instantaneous kinds
    pub fn fresh(kind: PowerUpKind) -> Option<Self> {
        Some(match kind {
            PowerUpKind::Laser => PowerUpState::Laser {
                charges: powerup::LASER_CHARGES,
                last_fired_at: f64::NEG_INFINITY,
            },
            PowerUpKind::Shield => PowerUpState::Shield {
                hits_remaining: powerup::SHIELD_HITS,
            },
            PowerUpKind::Scatter => PowerUpState::Scatter {
                charges: powerup::SCATTER_CHARGES,
                last_fired_at: f64::NEG_INFINITY,
            },
            PowerUpKind::Mine => PowerUpState::Mine {
                charges: powerup::MINE_CHARGES,
            },
            PowerUpKind::Joust => PowerUpState::Joust {
                left_active: true,
                right_active: true,
            },
            PowerUpKind::Homing => PowerUpState::Homing {
                charges: powerup::HOMING_CHARGES,
            },
            PowerUpKind::Reverse => return None,
        })
    }

    pub fn kind(&self) -> PowerUpKind {
        match self {
            PowerUpState::Laser { .. } => PowerUpKind::Laser,
            PowerUpState::Shield { .. } => PowerUpKind::Shield,
            PowerUpState::Scatter { .. } => PowerUpKind::Scatter,
            PowerUpState::Mine { .. } => PowerUpKind::Mine,
            PowerUpState::Joust { .. } => PowerUpKind::Joust,
            PowerUpState::Homing { .. } => PowerUpKind::Homing,
        }
    }

    /// Whether the fire button is routed to this power-up instead of the gun
    pub fn replaces_gun(&self) -> bool {
        matches!(
            self,
            PowerUpState::Laser { .. }
                | PowerUpState::Scatter { .. }
                | PowerUpState::Mine { .. }
                | PowerUpState::Homing { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub kind: PlayerKind,
    pub name: String,
    pub color_slot: u8,
    pub kills: u32,
    pub round_wins: u32,
    pub state: PlayerState,
    pub input: InputState,
    /// Highest input sequence applied by the authority
    pub last_input_seq: u64,
    pub dash_queued: bool,
    /// Fire button state seen by the previous weapons pass (edge detection)
    pub fire_was_down: bool,
    /// Join order, used for seating and leader election
    pub joined_order: u64,
    /// Rotation stays inverted until this simulation time
    pub reversed_until: f64,
    pub power_up: Option<PowerUpState>,
    pub ship: Ship,
}

impl Player {
    pub fn new(id: PlayerId, kind: PlayerKind, name: String, color_slot: u8, joined_order: u64) -> Self {
        Self {
            id,
            kind,
            name,
            color_slot,
            kills: 0,
            round_wins: 0,
            state: PlayerState::Active,
            input: InputState::default(),
            last_input_seq: 0,
            dash_queued: false,
            fire_was_down: false,
            joined_order,
            reversed_until: 0.0,
            power_up: None,
            ship: Ship::new(ship::MAX_AMMO),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.kind.is_bot()
    }

    /// Still in the round (flying or ejected)
    pub fn is_contending(&self) -> bool {
        self.state != PlayerState::Spectating
    }

    /// Ship is in play and can interact
    pub fn has_live_ship(&self) -> bool {
        self.state == PlayerState::Active && self.ship.alive
    }
}

/// Ejected pilot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pilot {
    pub player_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub spawned_at: f64,
    pub alive: bool,
}

impl Pilot {
    pub fn eject(player_id: PlayerId, motion: &ShipMotion, now: f64) -> Self {
        Self {
            player_id,
            position: motion.position,
            velocity: motion.forward() * pilot::EJECT_SPEED,
            angle: motion.angle,
            spawned_at: now,
            alive: true,
        }
    }

    pub fn survived(&self, now: f64) -> bool {
        now - self.spawned_at >= pilot::SURVIVAL_MS
    }
}

/// Primary gun / scatter projectile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Projectile {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub spawned_at: f64,
    pub alive: bool,
}

impl Projectile {
    pub fn is_expired(&self, now: f64) -> bool {
        now - self.spawned_at >= projectile::LIFETIME_MS
    }
}

/// Instant laser sweep, kept briefly for rendering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaserBeam {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub start: Vec2,
    pub end: Vec2,
    pub spawned_at: f64,
    /// Hits have been applied
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mine {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    pub spawned_at: f64,
    /// Set when an enemy enters the trigger radius
    pub triggered_at: Option<f64>,
    pub alive: bool,
}

impl Mine {
    pub fn is_expired(&self, now: f64) -> bool {
        self.triggered_at.is_none() && now - self.spawned_at >= mine::LIFETIME_MS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HomingMissile {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub target: Option<PlayerId>,
    pub spawned_at: f64,
    pub alive: bool,
}

impl HomingMissile {
    pub fn is_expired(&self, now: f64) -> bool {
        now - self.spawned_at >= homing::LIFETIME_MS
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AsteroidSize {
    Large,
    Small,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asteroid {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub spin: f32,
    pub size: AsteroidSize,
    pub radius: f32,
    /// Convex outline relative to the centre, unrotated
    pub outline: Outline,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerUp {
    pub id: EntityId,
    pub kind: PowerUpKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub spawned_at: f64,
    /// Ship this power-up is being pulled toward
    pub magnet_target: Option<PlayerId>,
    pub alive: bool,
}

impl PowerUp {
    pub fn is_expired(&self, now: f64) -> bool {
        self.magnet_target.is_none() && now - self.spawned_at >= powerup::LIFETIME_MS
    }
}

/// Stationary map hazard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turret {
    pub position: Vec2,
    pub aim_angle: f32,
    pub target: Option<PlayerId>,
    pub last_fired_at: f64,
}

impl Turret {
    pub fn centred() -> Self {
        Self {
            position: Vec2::new(arena::WIDTH * 0.5, arena::HEIGHT * 0.5),
            aim_angle: 0.0,
            target: None,
            last_fired_at: f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurretBullet {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub spawned_at: f64,
    pub alive: bool,
}

/// Match phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MatchPhase {
    /// Waiting for the leader to start
    #[default]
    Lobby,
    Countdown,
    Playing,
    /// Round result on screen, next countdown follows
    RoundEnd,
    GameEnd,
}

impl MatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchPhase::Lobby => "LOBBY",
            MatchPhase::Countdown => "COUNTDOWN",
            MatchPhase::Playing => "PLAYING",
            MatchPhase::RoundEnd => "ROUND_END",
            MatchPhase::GameEnd => "GAME_END",
        }
    }

    /// Phases that need at least `MIN_PLAYERS` to continue
    pub fn requires_quorum(self) -> bool {
        matches!(
            self,
            MatchPhase::Countdown | MatchPhase::Playing | MatchPhase::RoundEnd
        )
    }
}

/// Round/match state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchState {
    pub phase: MatchPhase,
    pub round: u32,
    pub phase_started_at: f64,
    /// Countdown or round-end expiry
    pub phase_deadline: Option<f64>,
    pub winner: Option<PlayerId>,
    /// Win conditions are evaluated once the clock passes this deadline
    pub pending_elimination_check: Option<f64>,
    pub base_seed: u32,
    /// Last whole-second countdown value announced
    pub countdown_announced: Option<u32>,
}

impl Default for MatchState {
    fn default() -> Self {
        Self {
            phase: MatchPhase::Lobby,
            round: 0,
            phase_started_at: 0.0,
            phase_deadline: None,
            winner: None,
            pending_elimination_check: None,
            base_seed: 0,
            countdown_announced: None,
        }
    }
}

/// Complete authoritative state of one room
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    /// Monotonic simulation clock (ms)
    pub now_ms: f64,
    pub match_state: MatchState,
    pub mode: GameMode,
    pub settings: AdvancedSettings,
    /// Roster in join order
    pub players: Vec<Player>,
    pub pilots: Vec<Pilot>,
    pub projectiles: Vec<Projectile>,
    pub lasers: Vec<LaserBeam>,
    pub mines: Vec<Mine>,
    pub missiles: Vec<HomingMissile>,
    pub asteroids: Vec<Asteroid>,
    pub power_ups: Vec<PowerUp>,
    pub turret: Option<Turret>,
    pub turret_bullets: Vec<TurretBullet>,
    pub rng: RngStreams,
    pub last_power_up_spawn_at: f64,
    pub last_asteroid_spawn_at: f64,
    /// Large asteroids the field is topped up to during the round
    pub asteroid_target: usize,
    /// Roster metadata changed since the last player-list broadcast
    pub roster_dirty: bool,
    next_entity_id: EntityId,
}

impl GameState {
    pub fn new(seed: u32) -> Self {
        Self {
            tick: 0,
            now_ms: 0.0,
            match_state: MatchState::default(),
            mode: GameMode::default(),
            settings: AdvancedSettings::default(),
            players: Vec::new(),
            pilots: Vec::new(),
            projectiles: Vec::new(),
            lasers: Vec::new(),
            mines: Vec::new(),
            missiles: Vec::new(),
            asteroids: Vec::new(),
            power_ups: Vec::new(),
            turret: None,
            turret_bullets: Vec::new(),
            rng: RngStreams::new(seed),
            last_power_up_spawn_at: 0.0,
            last_asteroid_spawn_at: 0.0,
            asteroid_target: 0,
            roster_dirty: false,
            next_entity_id: 1,
        }
    }

    /// Generate a new unique entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn phase(&self) -> MatchPhase {
        self.match_state.phase
    }

    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn pilot_of(&self, id: PlayerId) -> Option<&Pilot> {
        self.pilots.iter().find(|p| p.player_id == id && p.alive)
    }

    pub fn human_count(&self) -> usize {
        self.players.iter().filter(|p| !p.is_bot()).count()
    }

    pub fn bot_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_bot()).count()
    }

    pub fn live_ship_count(&self) -> usize {
        self.players.iter().filter(|p| p.has_live_ship()).count()
    }

    /// Lowest colour slot not used by anyone in the room
    pub fn free_color_slot(&self) -> u8 {
        (0..game::MAX_PLAYERS as u8)
            .find(|slot| self.players.iter().all(|p| p.color_slot != *slot))
            .unwrap_or(0)
    }

    /// Drop every round-scoped entity
    pub fn clear_round_entities(&mut self) {
        self.pilots.clear();
        self.projectiles.clear();
        self.lasers.clear();
        self.mines.clear();
        self.missiles.clear();
        self.asteroids.clear();
        self.power_ups.clear();
        self.turret_bullets.clear();
        self.turret = None;
    }

    /// Total entity count excluding players
    pub fn entity_count(&self) -> usize {
        self.pilots.len()
            + self.projectiles.len()
            + self.lasers.len()
            + self.mines.len()
            + self.missiles.len()
            + self.asteroids.len()
            + self.power_ups.len()
            + self.turret_bullets.len()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(0)
    }
}
