//! Inbound command queue
//!
//! Uses crossbeam-channel for lock-free MPSC hand-off from transport handlers
//! to the tick loop. Commands are applied in arrival order between ticks.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::state::PlayerId;
use crate::net::protocol::ClientMessage;

/// One message from one session
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub session: PlayerId,
    pub message: ClientMessage,
}

/// Bounded queue drained once per tick
pub struct CommandQueue {
    sender: Sender<Command>,
    receiver: Receiver<Command>,
    capacity: usize,
}

impl CommandQueue {
    /// Capacity must cover the burst between two ticks (8 players at a few
    /// messages per frame is well under the default).
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Clonable handle for a transport task
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Returns false when the queue is full
    #[inline]
    pub fn try_submit(&self, session: PlayerId, message: ClientMessage) -> bool {
        self.sender.try_send(Command { session, message }).is_ok()
    }

    /// Everything queued since the last drain, in arrival order
    pub fn drain(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(256)
    }
}

#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<Command>,
}

impl CommandSender {
    #[inline]
    pub fn try_send(&self, session: PlayerId, message: ClientMessage) -> Result<(), CommandQueueError> {
        self.sender
            .try_send(Command { session, message })
            .map_err(|e| match e {
                TrySendError::Full(_) => CommandQueueError::Full,
                TrySendError::Disconnected(_) => CommandQueueError::Disconnected,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandQueueError {
    /// Backpressure: the tick loop has fallen behind
    #[error("command queue is full")]
    Full,
    /// The tick loop has stopped
    #[error("command queue is closed")]
    Disconnected,
}
