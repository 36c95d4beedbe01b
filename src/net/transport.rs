//! Transport seam
//!
//! The engine only knows [`EffectsSink`]. A [`Transport`] moves encoded
//! messages between sessions and the host; [`TransportSink`] bridges the two
//! by routing each event and encoding it once. [`LoopbackTransport`] is the
//! in-process build where the host is also a player.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::events::{EffectsSink, GameEvent};
use crate::game::state::PlayerId;
use crate::metrics::Metrics;
use crate::net::protocol::{decode, encode, route, Audience, ClientMessage, CodecError, ServerMessage};

/// Frames a loopback client may have queued before new ones are dropped
const CLIENT_BACKLOG: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Backpressure,
}

/// Byte-level message pipe between sessions and the host
pub trait Transport: Send {
    /// Decoded inbound messages since the last poll. A session that went
    /// away is reported as a `Leave` from that session.
    fn poll_inbound(&mut self) -> Vec<(PlayerId, ClientMessage)>;

    fn send_to(&mut self, session: PlayerId, bytes: &[u8]) -> Result<(), TransportError>;

    fn broadcast(&mut self, bytes: &[u8]);
}

/// Adapts a transport to the engine's effects sink
pub struct TransportSink<T: Transport> {
    transport: T,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Transport> TransportSink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> EffectsSink for TransportSink<T> {
    fn emit(&mut self, event: GameEvent) {
        let (audience, message) = route(event);
        let bytes = match encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode outbound message: {}", e);
                return;
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
            metrics.bytes_sent.fetch_add(bytes.len() as u64, Ordering::Relaxed);
            if matches!(message, ServerMessage::Snapshot(_)) {
                metrics.snapshot_bytes.store(bytes.len() as u64, Ordering::Relaxed);
            }
        }

        match audience {
            Audience::All => self.transport.broadcast(&bytes),
            Audience::Session(session) => {
                if let Err(e) = self.transport.send_to(session, &bytes) {
                    debug!("Send to {} failed: {}", session, e);
                }
            }
        }
    }
}

/// In-process transport over crossbeam channels
pub struct LoopbackTransport {
    inbound_tx: Sender<(PlayerId, Vec<u8>)>,
    inbound_rx: Receiver<(PlayerId, Vec<u8>)>,
    clients: HashMap<PlayerId, Sender<Vec<u8>>, FxBuildHasher>,
    /// Sessions whose client went away, reported on the next poll
    dropped: Vec<PlayerId>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = bounded(CLIENT_BACKLOG);
        Self {
            inbound_tx,
            inbound_rx,
            clients: HashMap::with_hasher(FxBuildHasher),
            dropped: Vec::new(),
        }
    }

    /// Open a client under a fresh random session id
    pub fn connect(&mut self) -> LoopbackClient {
        self.connect_as(Uuid::new_v4())
    }

    /// Open a client under a chosen session id
    pub fn connect_as(&mut self, session: PlayerId) -> LoopbackClient {
        let (tx, rx) = bounded(CLIENT_BACKLOG);
        self.clients.insert(session, tx);
        info!("Loopback client {} connected", session);
        LoopbackClient {
            session,
            outbound: self.inbound_tx.clone(),
            inbound: rx,
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn disconnect(&mut self, session: PlayerId) {
        if self.clients.remove(&session).is_some() {
            info!("Loopback client {} disconnected", session);
            self.dropped.push(session);
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn poll_inbound(&mut self) -> Vec<(PlayerId, ClientMessage)> {
        let mut messages = Vec::new();
        for (session, bytes) in self.inbound_rx.try_iter() {
            match decode::<ClientMessage>(&bytes) {
                Ok(message) => messages.push((session, message)),
                Err(e) => warn!("Dropping malformed message from {}: {}", session, e),
            }
        }
        messages.extend(self.dropped.drain(..).map(|session| (session, ClientMessage::Leave)));
        messages
    }

    fn send_to(&mut self, session: PlayerId, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(tx) = self.clients.get(&session) else {
            return Err(TransportError::Closed);
        };
        match tx.try_send(bytes.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Backpressure),
            Err(TrySendError::Disconnected(_)) => {
                self.disconnect(session);
                Err(TransportError::Closed)
            }
        }
    }

    fn broadcast(&mut self, bytes: &[u8]) {
        let mut gone = Vec::new();
        for (session, tx) in self.clients.iter() {
            if let Err(TrySendError::Disconnected(_)) = tx.try_send(bytes.to_vec()) {
                gone.push(*session);
            }
        }
        for session in gone {
            self.disconnect(session);
        }
    }
}

/// One session's end of a [`LoopbackTransport`]
pub struct LoopbackClient {
    session: PlayerId,
    outbound: Sender<(PlayerId, Vec<u8>)>,
    inbound: Receiver<Vec<u8>>,
}

impl LoopbackClient {
    pub fn session(&self) -> PlayerId {
        self.session
    }

    pub fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let bytes = encode(message)?;
        self.outbound.try_send((self.session, bytes)).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backpressure,
            TrySendError::Disconnected(_) => TransportError::Closed,
        })
    }

    /// Next pending message, if any
    pub fn try_recv(&self) -> Result<Option<ServerMessage>, TransportError> {
        match self.inbound.try_recv() {
            Ok(bytes) => Ok(Some(decode(&bytes)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }

    /// Every pending message, skipping any that fail to decode
    pub fn drain(&self) -> Vec<ServerMessage> {
        self.inbound
            .try_iter()
            .filter_map(|bytes| match decode(&bytes) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Client {} dropped a malformed message: {}", self.session, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::error::ErrorCode;

    #[test]
    fn test_client_messages_reach_host() {
        let mut transport = LoopbackTransport::new();
        let client = transport.connect_as(Uuid::from_u128(7));
        client.send(&ClientMessage::Join { name: Some("Ann".into()) }).unwrap();
        client.send(&ClientMessage::QueueDash).unwrap();

        let inbound = transport.poll_inbound();
        assert_eq!(inbound.len(), 2);
        assert_eq!(inbound[0].0, Uuid::from_u128(7));
        assert_eq!(inbound[1].1, ClientMessage::QueueDash);
    }

    #[test]
    fn test_errors_go_to_one_session() {
        let mut transport = LoopbackTransport::new();
        let a = transport.connect_as(Uuid::from_u128(1));
        let b = transport.connect_as(Uuid::from_u128(2));
        let mut sink = TransportSink::new(transport);

        sink.emit(GameEvent::Countdown { seconds: 3 });
        sink.emit(GameEvent::Error {
            session: a.session(),
            code: ErrorCode::LeaderOnly,
            message: "no".into(),
        });

        assert_eq!(a.drain().len(), 2);
        let b_messages = b.drain();
        assert_eq!(b_messages, vec![ServerMessage::Countdown { seconds: 3 }]);
    }

    #[test]
    fn test_dropped_client_reported_as_leave() {
        let mut transport = LoopbackTransport::new();
        let client = transport.connect_as(Uuid::from_u128(3));
        drop(client);

        transport.broadcast(&[0u8]);
        assert_eq!(transport.client_count(), 0);
        assert_eq!(
            transport.poll_inbound(),
            vec![(Uuid::from_u128(3), ClientMessage::Leave)]
        );
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let mut transport = LoopbackTransport::new();
        let client = transport.connect();
        client.outbound.try_send((client.session(), vec![0xFF, 0xFF, 0xFF])).unwrap();
        assert!(transport.poll_inbound().is_empty());
    }

    #[test]
    fn test_sink_counts_bytes() {
        let metrics = Arc::new(Metrics::new());
        let mut sink = TransportSink::new(LoopbackTransport::new()).with_metrics(metrics.clone());
        sink.emit(GameEvent::DevModeChanged { enabled: true });
        assert_eq!(metrics.messages_sent.load(Ordering::Relaxed), 1);
        assert!(metrics.bytes_sent.load(Ordering::Relaxed) > 0);
    }
}
