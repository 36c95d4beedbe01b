//! Client-side prediction and reconciliation
//!
//! The local ship is stepped every frame with the same integrator the
//! authority uses. Each captured input is kept until a snapshot acknowledges
//! its sequence. On every snapshot the authoritative ship is taken as ground
//! truth, unacknowledged inputs are replayed on top of it, and the resulting
//! divergence decides whether the correction is ignored, blended or snapped.

use std::collections::VecDeque;

use crate::game::systems::physics::{step_ship, ArenaBounds, ShipControls, ShipTuning};
use crate::game::settings::{AdvancedSettings, GameMode};
use crate::game::state::{PlayerId, ShipMotion};
use crate::net::protocol::{GameSnapshot, PlayerInput, RoomMeta};
use crate::util::vec2::lerp_angle;

/// Default in-flight input cap (~2 s at 60 Hz)
pub const DEFAULT_MAX_PENDING: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionConfig {
    /// Divergence below this is treated as rounding noise (units)
    pub ignore_threshold: f32,
    /// Divergence at or above this snaps immediately (units)
    pub snap_threshold: f32,
    /// Fraction of a mid-size correction applied per reconcile
    pub blend_factor: f32,
    pub max_pending: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            ignore_threshold: 0.5,
            snap_threshold: 60.0,
            blend_factor: 0.35,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Buttons sampled for one local frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalControls {
    pub rotate: bool,
    pub fire: bool,
    pub dash: bool,
}

/// A sent input awaiting acknowledgement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInput {
    pub input: PlayerInput,
    pub controls: ShipControls,
    pub dt: f32,
}

/// What a reconcile did to the predicted ship
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Divergence below the ignore threshold
    Ignored { divergence: f32 },
    Blended { divergence: f32 },
    /// Also used when a ship first appears or respawns
    Snapped { divergence: f32 },
    /// Ship absent or dead in the snapshot
    Dropped,
}

/// Correction counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionTelemetry {
    pub ignored: u64,
    pub blended: u64,
    pub snapped: u64,
    pub dropped: u64,
}

impl CorrectionTelemetry {
    fn record(&mut self, correction: Correction) {
        match correction {
            Correction::Ignored { .. } => self.ignored += 1,
            Correction::Blended { .. } => self.blended += 1,
            Correction::Snapped { .. } => self.snapped += 1,
            Correction::Dropped => self.dropped += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.ignored + self.blended + self.snapped + self.dropped
    }
}

/// Replay `inputs` from `start`. Pure: an empty replay returns `start` unchanged.
pub fn replay<'a>(
    start: ShipMotion,
    inputs: impl IntoIterator<Item = &'a PendingInput>,
    tuning: &ShipTuning,
    bounds: &ArenaBounds,
) -> ShipMotion {
    let mut motion = start;
    for pending in inputs {
        step_ship(&mut motion, pending.controls, tuning, bounds, pending.dt);
    }
    motion
}

/// Move `from` a fraction `t` toward `to`; non-kinematic fields come from `to`
fn blend(from: &ShipMotion, to: &ShipMotion, t: f32) -> ShipMotion {
    ShipMotion {
        position: from.position.lerp(to.position, t),
        velocity: from.velocity.lerp(to.velocity, t),
        angle: lerp_angle(from.angle, to.angle, t),
        ..*to
    }
}

pub struct Predictor {
    player_id: PlayerId,
    config: PredictionConfig,
    tuning: ShipTuning,
    bounds: ArenaBounds,
    next_sequence: u64,
    client_time_ms: f64,
    pending: VecDeque<PendingInput>,
    predicted: Option<ShipMotion>,
    telemetry: CorrectionTelemetry,
}

impl Predictor {
    pub fn new(player_id: PlayerId) -> Self {
        Self::with_config(player_id, PredictionConfig::default())
    }

    pub fn with_config(player_id: PlayerId, config: PredictionConfig) -> Self {
        Self {
            player_id,
            config,
            tuning: ShipTuning::for_match(GameMode::default(), &AdvancedSettings::default()),
            bounds: ArenaBounds::default(),
            // The authority ignores sequence 0
            next_sequence: 1,
            client_time_ms: 0.0,
            pending: VecDeque::with_capacity(config.max_pending),
            predicted: None,
            telemetry: CorrectionTelemetry::default(),
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Entity the interpolation buffer must leave alone
    pub fn owned_entity(&self) -> Option<PlayerId> {
        self.predicted.map(|_| self.player_id)
    }

    pub fn predicted(&self) -> Option<&ShipMotion> {
        self.predicted.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn telemetry(&self) -> CorrectionTelemetry {
        self.telemetry
    }

    /// Pick up handling changes from the room (mode, restitution, friction)
    pub fn apply_room_meta(&mut self, meta: &RoomMeta) {
        self.tuning = ShipTuning::for_match(meta.mode, &meta.settings);
    }

    /// Stamp, queue and locally apply one frame of input. Returns the input to send.
    pub fn capture(&mut self, controls: LocalControls, dt: f32) -> PlayerInput {
        self.client_time_ms += dt as f64 * 1000.0;
        let input = PlayerInput {
            sequence: self.next_sequence,
            rotate: controls.rotate,
            fire: controls.fire,
            client_time_ms: self.client_time_ms,
        };
        self.next_sequence += 1;

        let ship_controls = ShipControls {
            rotate: controls.rotate,
            dash: controls.dash,
        };
        if self.pending.len() >= self.config.max_pending {
            self.pending.pop_front();
        }
        self.pending.push_back(PendingInput {
            input,
            controls: ship_controls,
            dt,
        });

        if let Some(motion) = self.predicted.as_mut() {
            step_ship(motion, ship_controls, &self.tuning, &self.bounds, dt);
        }
        input
    }

    /// Fold an authoritative snapshot into the prediction
    pub fn reconcile(&mut self, snapshot: &GameSnapshot) -> Correction {
        let correction = self.reconcile_inner(snapshot);
        self.telemetry.record(correction);
        correction
    }

    fn reconcile_inner(&mut self, snapshot: &GameSnapshot) -> Correction {
        let ship = match snapshot.ship(self.player_id) {
            Some(ship) if ship.alive => ship,
            _ => {
                self.predicted = None;
                self.pending.clear();
                return Correction::Dropped;
            }
        };

        let ack = ship.last_input_seq;
        while self.pending.front().is_some_and(|p| p.input.sequence <= ack) {
            self.pending.pop_front();
        }

        let corrected = replay(ship.motion(), &self.pending, &self.tuning, &self.bounds);

        let Some(previous) = self.predicted else {
            self.predicted = Some(corrected);
            return Correction::Snapped { divergence: 0.0 };
        };

        let divergence = previous.position.distance_to(corrected.position);
        if divergence < self.config.ignore_threshold {
            Correction::Ignored { divergence }
        } else if divergence < self.config.snap_threshold {
            self.predicted = Some(blend(&previous, &corrected, self.config.blend_factor));
            Correction::Blended { divergence }
        } else {
            self.predicted = Some(corrected);
            Correction::Snapped { divergence }
        }
    }
}
