use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ship_arena_server::config::ServerConfig;
use ship_arena_server::metrics::{self, Metrics};
use ship_arena_server::net::host::HostRunner;
use ship_arena_server::net::protocol::{ClientMessage, ServerMessage};
use ship_arena_server::net::transport::{LoopbackClient, LoopbackTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Ship Arena host v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    let settings = config.load_settings()?;
    info!(
        "Configuration loaded: {} Hz, max_players={}, bots={}, seed={:?}",
        config.tick_rate, config.max_players, config.bot_count, config.room_seed
    );

    let metrics = Arc::new(Metrics::new());
    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    // The host plays through the same loopback seam as any client
    let mut host = HostRunner::new(LoopbackTransport::new(), &config, settings, metrics);
    let host_client = host.transport_mut().connect();
    host_client.send(&ClientMessage::Join {
        name: Some("Host".to_string()),
    })?;
    for _ in 0..config.bot_count {
        host_client.send(&ClientMessage::AddAiBot)?;
    }
    if config.bot_count > 0 {
        host_client.send(&ClientMessage::StartMatch)?;
    }

    tokio::spawn(watch_room(host_client));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    host.run(shutdown).await;
    info!("Host stopped");
    Ok(())
}

/// Log what the host's own session sees
async fn watch_room(client: LoopbackClient) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(100));
    loop {
        ticker.tick().await;
        for message in client.drain() {
            match message {
                ServerMessage::PhaseChanged { phase, winner } => {
                    info!("Phase {} (winner: {:?})", phase.as_str(), winner)
                }
                ServerMessage::RoundResult(result) => {
                    for standing in &result.standings {
                        info!(
                            "  #{} {} wins={} kills={}",
                            standing.rank, standing.name, standing.round_wins, standing.kills
                        );
                    }
                }
                ServerMessage::Error { code, message } => warn!("Host command rejected: {} ({})", message, code),
                _ => {}
            }
        }
    }
}
