//! Outbound events and the effects sink
//!
//! The engine never talks to a socket. Everything it wants the outside world
//! to know (roster changes, phase changes, cosmetic cues, snapshots, command
//! rejections) is pushed synchronously into an [`EffectsSink`].

use serde::{Deserialize, Serialize};

use crate::game::error::ErrorCode;
use crate::game::state::{MatchPhase, PlayerId};
use crate::net::protocol::{GameSnapshot, PlayerList, RoomMeta, RoundResult};
use crate::util::vec2::Vec2;

/// Audio cue identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundKind {
    Fire,
    Laser,
    Scatter,
    MineDrop,
    MineBlast,
    MissileLaunch,
    Explosion,
    PilotEject,
    PilotKilled,
    Respawn,
    PowerUpPickup,
    ShieldHit,
    Parry,
    Dash,
    TurretFire,
    TurretBlast,
    AsteroidBreak,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
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
    /// Rejected command, delivered to `session` only
    Error {
        session: PlayerId,
        code: ErrorCode,
        message: String,
    },
}

impl GameEvent {
    pub fn sound(kind: SoundKind, actor: Option<PlayerId>) -> Self {
        GameEvent::SoundCue { kind, actor }
    }

    pub fn shake(intensity: f32, duration_ms: f32) -> Self {
        GameEvent::ScreenShake {
            intensity,
            duration_ms,
        }
    }
}

/// Receiver for everything the engine emits
pub trait EffectsSink {
    fn emit(&mut self, event: GameEvent);
}

impl EffectsSink for Vec<GameEvent> {
    fn emit(&mut self, event: GameEvent) {
        self.push(event);
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EffectsSink for NullSink {
    fn emit(&mut self, _event: GameEvent) {}
}

impl<S: EffectsSink + ?Sized> EffectsSink for &mut S {
    fn emit(&mut self, event: GameEvent) {
        (**self).emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_collects_in_order() {
        let mut sink: Vec<GameEvent> = Vec::new();
        sink.emit(GameEvent::Countdown { seconds: 3 });
        sink.emit(GameEvent::sound(SoundKind::Fire, None));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0], GameEvent::Countdown { seconds: 3 });
    }

    #[test]
    fn test_borrowed_sink_forwards() {
        let mut inner: Vec<GameEvent> = Vec::new();
        {
            let mut borrowed = &mut inner;
            borrowed.emit(GameEvent::shake(0.5, 200.0));
        }
        assert_eq!(inner.len(), 1);
    }
}
