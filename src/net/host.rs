//! Host loop
//!
//! Owns one room: the engine, its transport and the inbound command queue.
//! Each tick pulls transport traffic into the queue, applies every queued
//! command, then advances the simulation one fixed step.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::engine::{FixedClock, Simulation, SystemClock, WallClock};
use crate::game::input_buffer::{CommandQueue, CommandSender};
use crate::game::settings::AdvancedSettings;
use crate::metrics::Metrics;
use crate::net::protocol::GameSnapshot;
use crate::net::transport::{Transport, TransportSink};

pub struct HostRunner<T: Transport> {
    sim: Simulation<TransportSink<T>>,
    queue: CommandQueue,
    metrics: Arc<Metrics>,
    dt: f32,
}

impl<T: Transport> HostRunner<T> {
    pub fn new(transport: T, config: &ServerConfig, settings: AdvancedSettings, metrics: Arc<Metrics>) -> Self {
        let clock: Box<dyn WallClock> = match config.room_seed {
            Some(seed) => Box::new(FixedClock(seed)),
            None => Box::new(SystemClock),
        };
        let sink = TransportSink::new(transport).with_metrics(metrics.clone());
        let sim = Simulation::with_clock(sink, clock)
            .with_max_players(config.max_players)
            .with_settings(settings);

        Self {
            sim,
            queue: CommandQueue::default(),
            metrics,
            dt: config.dt(),
        }
    }

    /// Handle for feeding commands from outside the transport
    pub fn command_sender(&self) -> CommandSender {
        self.queue.sender()
    }

    pub fn simulation(&self) -> &Simulation<TransportSink<T>> {
        &self.sim
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.sim.sink_mut().transport_mut()
    }

    /// Apply pending commands and run one step
    pub fn tick(&mut self) -> GameSnapshot {
        for (session, message) in self.sim.sink_mut().transport_mut().poll_inbound() {
            if !self.queue.try_submit(session, message) {
                self.metrics.dropped_commands.fetch_add(1, Ordering::Relaxed);
                warn!("Command queue full, dropping message from {}", session);
            }
        }

        for command in self.queue.drain() {
            self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
            if self.sim.handle(command.session, command.message).is_err() {
                self.metrics.rejected_commands.fetch_add(1, Ordering::Relaxed);
            }
        }

        let start = Instant::now();
        let snapshot = self.sim.advance(self.dt);
        self.metrics.record_tick_time(start.elapsed());
        self.metrics.observe(self.sim.state());
        snapshot
    }

    /// Tick on a fixed interval until `shutdown` resolves
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let mut ticker = interval(Duration::from_secs_f32(self.dt));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("Host loop started at {:.0} Hz", 1.0 / self.dt);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.tick();
                    if snapshot.host_tick % (60 * 30) == 0 {
                        debug!(
                            "Tick {}: {} ships, {} asteroids, phase {}",
                            snapshot.host_tick,
                            snapshot.ships.len(),
                            snapshot.asteroids.len(),
                            snapshot.phase.as_str()
                        );
                    }
                }
                _ = &mut shutdown => {
                    info!("Host loop stopping");
                    break;
                }
            }
        }
    }
}
