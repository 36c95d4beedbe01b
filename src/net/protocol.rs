use serde::{Deserialize, Serialize};

use crate::game::constants::physics::TICK_DURATION_MS;
use crate::game::error::ErrorCode;
use crate::game::events::{GameEvent, SoundKind};
use crate::game::settings::{AdvancedSettings, GameMode};
use crate::game::state::{
    AsteroidSize, EntityId, GameState, MatchPhase, Outline, PlayerId, PlayerKind, PlayerState, PowerUpKind,
    PowerUpState, ShipMotion,
};
use crate::util::vec2::Vec2;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Join the room, optionally with a display name
    Join { name: Option<String> },
    Leave,
    Rename { name: String },
    /// Held buttons for the current frame
    Input(PlayerInput),
    QueueDash,
    StartMatch,
    RestartToLobby,
    SetMode { mode: GameMode },
    SetAdvancedSettings(AdvancedSettings),
    AddAiBot,
    AddLocalPlayer,
    RemoveBot { target: PlayerId },
    KickPlayer { target: PlayerId },
    SetDevMode { enabled: bool },
    DevGrantPowerUp { kind: PowerUpKind },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    PlayerList(PlayerList),
    RoomMeta(RoomMeta),
    PhaseChanged {
        phase: MatchPhase,
        winner: Option<PlayerId>,
    },
    Countdown {
        seconds: u32,
    },
    RoundResult(RoundResult),
    Snapshot(GameSnapshot),
    SoundCue {
        kind: SoundKind,
        actor: Option<PlayerId>,
    },
    ScreenShake {
        intensity: f32,
        duration_ms: f32,
    },
    DashParticles {
        actor: PlayerId,
        position: Vec2,
        angle: f32,
        color_slot: u8,
    },
    DevModeChanged {
        enabled: bool,
    },
    /// A command from this session was rejected
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// Who receives an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Session(PlayerId),
}

/// Map an engine event to its wire message and recipients
pub fn route(event: GameEvent) -> (Audience, ServerMessage) {
    let message = match event {
        GameEvent::Error { session, code, message } => {
            return (Audience::Session(session), ServerMessage::Error { code, message });
        }
        GameEvent::PlayerList(list) => ServerMessage::PlayerList(list),
        GameEvent::RoomMeta(meta) => ServerMessage::RoomMeta(meta),
        GameEvent::PhaseChanged { phase, winner } => ServerMessage::PhaseChanged { phase, winner },
        GameEvent::Countdown { seconds } => ServerMessage::Countdown { seconds },
        GameEvent::RoundResult(result) => ServerMessage::RoundResult(result),
        GameEvent::Snapshot(snapshot) => ServerMessage::Snapshot(snapshot),
        GameEvent::SoundCue { kind, actor } => ServerMessage::SoundCue { kind, actor },
        GameEvent::ScreenShake { intensity, duration_ms } => ServerMessage::ScreenShake { intensity, duration_ms },
        GameEvent::DashParticles {
            actor,
            position,
            angle,
            color_slot,
        } => ServerMessage::DashParticles {
            actor,
            position,
            angle,
            color_slot,
        },
        GameEvent::DevModeChanged { enabled } => ServerMessage::DevModeChanged { enabled },
    };
    (Audience::All, message)
}

/// Player input state for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Input sequence number (for reconciliation)
    pub sequence: u64,
    pub rotate: bool,
    pub fire: bool,
    /// Client timestamp for RTT measurement
    #[serde(default)]
    pub client_time_ms: f64,
}

/// One roster row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerListEntry {
    pub id: PlayerId,
    pub name: String,
    pub kind: PlayerKind,
    pub color_slot: u8,
    pub kills: u32,
    pub round_wins: u32,
    pub state: PlayerState,
    pub is_leader: bool,
    pub power_up: Option<PowerUpKind>,
}

/// Ordered roster; `revision` increases with every broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerList {
    pub revision: u64,
    pub entries: Vec<PlayerListEntry>,
}

impl PlayerList {
    pub fn from_game_state(state: &GameState, leader: Option<PlayerId>, revision: u64) -> Self {
        Self {
            revision,
            entries: state
                .players
                .iter()
                .map(|p| PlayerListEntry {
                    id: p.id,
                    name: p.name.clone(),
                    kind: p.kind,
                    color_slot: p.color_slot,
                    kills: p.kills,
                    round_wins: p.round_wins,
                    state: p.state,
                    is_leader: Some(p.id) == leader,
                    power_up: p.power_up.map(|held| held.kind()),
                })
                .collect(),
        }
    }
}

/// Room-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMeta {
    pub leader: Option<PlayerId>,
    pub phase: MatchPhase,
    pub mode: GameMode,
    pub settings: AdvancedSettings,
    pub dev_mode: bool,
    pub max_players: u32,
}

/// One row of the round tallies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub name: String,
    pub rank: u32,
    pub round_wins: u32,
    pub kills: u32,
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub winner: Option<PlayerId>,
    pub is_tie: bool,
    /// The winner reached the round target
    pub game_over: bool,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub player_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
    pub dash_cooldown: f32,
    pub reversed: bool,
    pub alive: bool,
    pub invulnerable: bool,
    pub ammo: u8,
    pub max_ammo: u8,
    pub color_slot: u8,
    pub power_up: Option<PowerUpState>,
    /// Highest input sequence the authority has applied for this player
    pub last_input_seq: u64,
}

impl ShipSnapshot {
    /// Kinematic state the client predictor resumes from
    pub fn motion(&self) -> ShipMotion {
        ShipMotion {
            position: self.position,
            velocity: self.velocity,
            angle: self.angle,
            angular_velocity: self.angular_velocity,
            dash_cooldown: self.dash_cooldown,
            reversed: self.reversed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotSnapshot {
    pub player_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsteroidSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub size: AsteroidSize,
    pub radius: f32,
    pub outline: Outline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpSnapshot {
    pub id: EntityId,
    pub kind: PowerUpKind,
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserSnapshot {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub start: Vec2,
    pub end: Vec2,
    pub age_ms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineSnapshot {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    pub triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissileSnapshot {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurretSnapshot {
    pub position: Vec2,
    pub aim_angle: f32,
    pub target: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurretBulletSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Immutable per-tick view of the room, one flat array per entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub host_tick: u64,
    pub tick_duration_ms: f64,
    pub phase: MatchPhase,
    pub round: u32,
    /// Milliseconds left on the countdown or round-end timer
    pub phase_remaining_ms: Option<f64>,
    pub ships: Vec<ShipSnapshot>,
    pub pilots: Vec<PilotSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub asteroids: Vec<AsteroidSnapshot>,
    pub power_ups: Vec<PowerUpSnapshot>,
    pub lasers: Vec<LaserSnapshot>,
    pub mines: Vec<MineSnapshot>,
    pub missiles: Vec<MissileSnapshot>,
    pub turret: Option<TurretSnapshot>,
    pub turret_bullets: Vec<TurretBulletSnapshot>,
}

impl GameSnapshot {
    pub fn from_game_state(state: &GameState) -> Self {
        let now = state.now_ms;

        Self {
            host_tick: state.tick,
            tick_duration_ms: TICK_DURATION_MS,
            phase: state.match_state.phase,
            round: state.match_state.round,
            phase_remaining_ms: state.match_state.phase_deadline.map(|d| (d - now).max(0.0)),
            ships: state
                .players
                .iter()
                .filter(|p| p.is_contending())
                .map(|p| ShipSnapshot {
                    player_id: p.id,
                    position: p.ship.motion.position,
                    velocity: p.ship.motion.velocity,
                    angle: p.ship.motion.angle,
                    angular_velocity: p.ship.motion.angular_velocity,
                    dash_cooldown: p.ship.motion.dash_cooldown,
                    reversed: p.ship.motion.reversed,
                    alive: p.has_live_ship(),
                    invulnerable: p.ship.is_invulnerable(now),
                    ammo: p.ship.ammo,
                    max_ammo: p.ship.max_ammo,
                    color_slot: p.color_slot,
                    power_up: p.power_up,
                    last_input_seq: p.last_input_seq,
                })
                .collect(),
            pilots: state
                .pilots
                .iter()
                .map(|p| PilotSnapshot {
                    player_id: p.player_id,
                    position: p.position,
                    velocity: p.velocity,
                    angle: p.angle,
                    alive: p.alive,
                })
                .collect(),
            projectiles: state
                .projectiles
                .iter()
                .filter(|p| p.alive)
                .map(|p| ProjectileSnapshot {
                    id: p.id,
                    owner_id: p.owner_id,
                    position: p.position,
                    velocity: p.velocity,
                })
                .collect(),
            asteroids: state
                .asteroids
                .iter()
                .filter(|a| a.alive)
                .map(|a| AsteroidSnapshot {
                    id: a.id,
                    position: a.position,
                    velocity: a.velocity,
                    angle: a.angle,
                    size: a.size,
                    radius: a.radius,
                    outline: a.outline.clone(),
                })
                .collect(),
            power_ups: state
                .power_ups
                .iter()
                .filter(|p| p.alive)
                .map(|p| PowerUpSnapshot {
                    id: p.id,
                    kind: p.kind,
                    position: p.position,
                    velocity: p.velocity,
                })
                .collect(),
            lasers: state
                .lasers
                .iter()
                .map(|l| LaserSnapshot {
                    id: l.id,
                    owner_id: l.owner_id,
                    start: l.start,
                    end: l.end,
                    age_ms: (now - l.spawned_at) as f32,
                })
                .collect(),
            mines: state
                .mines
                .iter()
                .filter(|m| m.alive)
                .map(|m| MineSnapshot {
                    id: m.id,
                    owner_id: m.owner_id,
                    position: m.position,
                    triggered: m.triggered_at.is_some(),
                })
                .collect(),
            missiles: state
                .missiles
                .iter()
                .filter(|m| m.alive)
                .map(|m| MissileSnapshot {
                    id: m.id,
                    owner_id: m.owner_id,
                    position: m.position,
                    velocity: m.velocity,
                    angle: m.angle,
                })
                .collect(),
            turret: state.turret.as_ref().map(|t| TurretSnapshot {
                position: t.position,
                aim_angle: t.aim_angle,
                target: t.target,
            }),
            turret_bullets: state
                .turret_bullets
                .iter()
                .filter(|b| b.alive)
                .map(|b| TurretBulletSnapshot {
                    id: b.id,
                    position: b.position,
                    velocity: b.velocity,
                })
                .collect(),
        }
    }

    /// Authority time this snapshot was taken at
    pub fn host_time_ms(&self) -> f64 {
        self.host_tick as f64 * self.tick_duration_ms
    }

    pub fn ship(&self, player_id: PlayerId) -> Option<&ShipSnapshot> {
        self.ships.iter().find(|s| s.player_id == player_id)
    }
}

/// Encode a message using bincode's standard config
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a message using bincode's standard config
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, CodecError> {
    bincode::serde::decode_from_slice(data, bincode::config::standard())
        .map(|(msg, _)| msg)
        .map_err(|e| CodecError::Decode(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Player, ShipMotion};
    use uuid::Uuid;

    fn create_test_state() -> GameState {
        let mut state = GameState::new(9);
        let mut player = Player::new(Uuid::from_u128(1), PlayerKind::Human, "Ace".into(), 2, 0);
        player.ship.respawn(ShipMotion::at(Vec2::new(100.0, 200.0), 0.5), 0.0);
        player.last_input_seq = 17;
        state.players.push(player);
        state.tick = 42;
        state
    }

    #[test]
    fn test_client_message_input() {
        let msg = ClientMessage::Input(PlayerInput {
            sequence: 42,
            rotate: true,
            fire: false,
            client_time_ms: 1234.5,
        });
        let encoded = encode(&msg).unwrap();
        let decoded: ClientMessage = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_snapshot_carries_reconcile_fields() {
        let state = create_test_state();
        let snapshot = GameSnapshot::from_game_state(&state);

        assert_eq!(snapshot.host_tick, 42);
        assert!((snapshot.host_time_ms() - 42.0 * TICK_DURATION_MS).abs() < 1e-9);
        let ship = snapshot.ship(Uuid::from_u128(1)).unwrap();
        assert_eq!(ship.last_input_seq, 17);
        assert!(ship.alive);
        assert!(ship.invulnerable);
        assert_eq!(ship.color_slot, 2);
    }

    #[test]
    fn test_snapshot_survives_codec() {
        let state = create_test_state();
        let snapshot = GameSnapshot::from_game_state(&state);
        let bytes = encode(&ServerMessage::Snapshot(snapshot.clone())).unwrap();
        match decode::<ServerMessage>(&bytes).unwrap() {
            ServerMessage::Snapshot(decoded) => assert_eq!(decoded, snapshot),
            other => panic!("Wrong message type: {other:?}"),
        }
    }

    #[test]
    fn test_errors_route_to_one_session() {
        let session = Uuid::from_u128(5);
        let (audience, message) = route(GameEvent::Error {
            session,
            code: ErrorCode::LeaderOnly,
            message: "nope".into(),
        });
        assert_eq!(audience, Audience::Session(session));
        assert!(matches!(message, ServerMessage::Error { code: ErrorCode::LeaderOnly, .. }));

        let (audience, _) = route(GameEvent::Countdown { seconds: 2 });
        assert_eq!(audience, Audience::All);
    }

    #[test]
    fn test_player_list_marks_leader() {
        let state = create_test_state();
        let list = PlayerList::from_game_state(&state, Some(Uuid::from_u128(1)), 3);
        assert_eq!(list.revision, 3);
        assert!(list.entries[0].is_leader);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let result: Result<ClientMessage, _> = decode(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
