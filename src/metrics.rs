//! Prometheus-compatible metrics endpoint
//!
//! Exposes room metrics in Prometheus text format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::state::{GameState, MatchPhase};

/// Samples kept for tick-time percentiles
const TICK_HISTORY: usize = 600;

/// Metrics registry for one room
#[derive(Debug)]
pub struct Metrics {
    // Roster
    pub total_players: AtomicU64,
    pub human_players: AtomicU64,
    pub bot_players: AtomicU64,
    pub live_ships: AtomicU64,

    // Entities
    pub pilot_count: AtomicU64,
    pub projectile_count: AtomicU64,
    pub asteroid_count: AtomicU64,
    pub power_up_count: AtomicU64,
    pub hazard_count: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Match
    pub phase: AtomicU64,
    pub round: AtomicU64,

    // Network
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub snapshot_bytes: AtomicU64,
    pub rejected_commands: AtomicU64,
    pub dropped_commands: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

fn phase_code(phase: MatchPhase) -> u64 {
    match phase {
        MatchPhase::Lobby => 0,
        MatchPhase::Countdown => 1,
        MatchPhase::Playing => 2,
        MatchPhase::RoundEnd => 3,
        MatchPhase::GameEnd => 4,
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_players: AtomicU64::new(0),
            human_players: AtomicU64::new(0),
            bot_players: AtomicU64::new(0),
            live_ships: AtomicU64::new(0),
            pilot_count: AtomicU64::new(0),
            projectile_count: AtomicU64::new(0),
            asteroid_count: AtomicU64::new(0),
            power_up_count: AtomicU64::new(0),
            hazard_count: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            phase: AtomicU64::new(0),
            round: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            snapshot_bytes: AtomicU64::new(0),
            rejected_commands: AtomicU64::new(0),
            dropped_commands: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();
            let at = |q: f32| sorted[((sorted.len() as f32 * q) as usize).min(sorted.len() - 1)];

            self.tick_time_p95_us.store(at(0.95), Ordering::Relaxed);
            self.tick_time_p99_us.store(at(0.99), Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Refresh roster and entity gauges from the room state
    pub fn observe(&self, state: &GameState) {
        let bots = state.bot_count() as u64;
        self.total_players.store(state.players.len() as u64, Ordering::Relaxed);
        self.bot_players.store(bots, Ordering::Relaxed);
        self.human_players.store(state.players.len() as u64 - bots, Ordering::Relaxed);
        self.live_ships.store(state.live_ship_count() as u64, Ordering::Relaxed);

        #[cfg(feature = "metrics_extended")]
        self.observe_entities(state);

        self.phase.store(phase_code(state.phase()), Ordering::Relaxed);
        self.round.store(state.match_state.round as u64, Ordering::Relaxed);
    }

    #[cfg(feature = "metrics_extended")]
    fn observe_entities(&self, state: &GameState) {
        self.pilot_count.store(state.pilots.len() as u64, Ordering::Relaxed);
        self.projectile_count.store(state.projectiles.len() as u64, Ordering::Relaxed);
        self.asteroid_count.store(state.asteroids.len() as u64, Ordering::Relaxed);
        self.power_up_count.store(state.power_ups.len() as u64, Ordering::Relaxed);
        self.hazard_count.store(
            (state.mines.len() + state.missiles.len() + state.lasers.len() + state.turret_bullets.len()) as u64,
            Ordering::Relaxed,
        );
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("ship_arena_players_total", "Players in the room", "gauge",
            self.total_players.load(Ordering::Relaxed));
        metric!("ship_arena_players_human", "Human players", "gauge",
            self.human_players.load(Ordering::Relaxed));
        metric!("ship_arena_players_bot", "Bot players", "gauge",
            self.bot_players.load(Ordering::Relaxed));
        metric!("ship_arena_live_ships", "Ships currently in play", "gauge",
            self.live_ships.load(Ordering::Relaxed));

        metric!("ship_arena_pilots", "Ejected pilots", "gauge",
            self.pilot_count.load(Ordering::Relaxed));
        metric!("ship_arena_projectiles", "Active projectiles", "gauge",
            self.projectile_count.load(Ordering::Relaxed));
        metric!("ship_arena_asteroids", "Asteroids", "gauge",
            self.asteroid_count.load(Ordering::Relaxed));
        metric!("ship_arena_power_ups", "Power-ups on the field", "gauge",
            self.power_up_count.load(Ordering::Relaxed));
        metric!("ship_arena_hazards", "Mines, missiles, beams and turret bullets", "gauge",
            self.hazard_count.load(Ordering::Relaxed));

        metric!("ship_arena_tick_time_microseconds", "Last tick time", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("ship_arena_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("ship_arena_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("ship_arena_tick_time_max_microseconds", "Maximum tick time in window", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("ship_arena_tick_count", "Ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("ship_arena_phase", "Match phase (0=Lobby, 4=GameEnd)", "gauge",
            self.phase.load(Ordering::Relaxed));
        metric!("ship_arena_round", "Current round", "gauge",
            self.round.load(Ordering::Relaxed));

        metric!("ship_arena_messages_sent_total", "Messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("ship_arena_messages_received_total", "Messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("ship_arena_bytes_sent_total", "Bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("ship_arena_snapshot_bytes", "Size of the last encoded snapshot", "gauge",
            self.snapshot_bytes.load(Ordering::Relaxed));
        metric!("ship_arena_rejected_commands_total", "Commands rejected with an error", "counter",
            self.rejected_commands.load(Ordering::Relaxed));
        metric!("ship_arena_dropped_commands_total", "Commands dropped by a full queue", "counter",
            self.dropped_commands.load(Ordering::Relaxed));
        metric!("ship_arena_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `/metrics` and `/health` until the listener fails
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = if request.starts_with("GET /metrics") {
                        let body = metrics.to_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /health") {
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK"
                            .to_string()
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => debug!("Failed to read from metrics socket {}: {}", peer, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{BotKind, Player, PlayerKind};
    use uuid::Uuid;

    #[test]
    fn test_record_tick_time() {
        let metrics = Metrics::new();
        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 100);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) >= 1000);
        assert_eq!(metrics.tick_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_observe_counts_roster() {
        let mut state = GameState::new(1);
        state.players.push(Player::new(Uuid::from_u128(1), PlayerKind::Human, "A".into(), 0, 0));
        state
            .players
            .push(Player::new(Uuid::from_u128(2), PlayerKind::Bot(BotKind::Ai), "B".into(), 1, 1));
        state.match_state.phase = MatchPhase::Playing;

        let metrics = Metrics::new();
        metrics.observe(&state);
        assert_eq!(metrics.human_players.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.bot_players.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.phase.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.total_players.store(4, Ordering::Relaxed);
        metrics.rejected_commands.store(2, Ordering::Relaxed);

        let output = metrics.to_prometheus();
        assert!(output.contains("ship_arena_players_total 4"));
        assert!(output.contains("ship_arena_rejected_commands_total 2"));
        assert!(output.contains("# TYPE ship_arena_tick_count counter"));
    }
}
