//! Client netcode
//!
//! [`ClientView`] pairs the predictor for the local ship with the
//! interpolation buffer for everything else. They only share the id of the
//! ship the predictor currently owns.

pub mod interpolation;
pub mod prediction;

use crate::game::state::PlayerId;
use crate::net::protocol::{PlayerInput, ServerMessage};

use interpolation::{RenderFrame, SnapshotBuffer};
use prediction::{Correction, LocalControls, Predictor};

pub struct ClientView {
    predictor: Predictor,
    buffer: SnapshotBuffer,
}

impl ClientView {
    pub fn new(local_player: PlayerId) -> Self {
        Self {
            predictor: Predictor::new(local_player),
            buffer: SnapshotBuffer::default(),
        }
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    /// Feed one server message received at local time `now_ms`.
    /// Returns the correction when the message was a snapshot.
    pub fn on_message(&mut self, message: &ServerMessage, now_ms: f64) -> Option<Correction> {
        match message {
            ServerMessage::RoomMeta(meta) => {
                self.predictor.apply_room_meta(meta);
                None
            }
            ServerMessage::Snapshot(snapshot) => {
                let correction = self.predictor.reconcile(snapshot);
                self.buffer.set_excluded(self.predictor.owned_entity());
                self.buffer.push(snapshot.clone(), now_ms);
                Some(correction)
            }
            _ => None,
        }
    }

    /// Capture local input for this render frame and sample remote entities
    pub fn frame(&mut self, controls: LocalControls, dt: f32, now_ms: f64) -> (PlayerInput, Option<RenderFrame>) {
        let input = self.predictor.capture(controls, dt);
        (input, self.buffer.sample(now_ms))
    }
}
