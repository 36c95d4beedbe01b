use std::path::{Path, PathBuf};

use crate::game::constants::{game, physics};
use crate::game::settings::AdvancedSettings;

/// Host configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Simulation steps per second
    pub tick_rate: u32,
    /// Pin the per-round seed clock for reproducible runs; `None` uses wall time
    pub room_seed: Option<u64>,
    /// Bots added when the room opens
    pub bot_count: usize,
    pub metrics_port: u16,
    /// Room capacity including bots
    pub max_players: usize,
    /// Optional JSON file of advanced settings
    pub settings_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: physics::TICK_RATE,
            room_seed: None,
            bot_count: 0,
            metrics_port: 9090,
            max_players: game::MAX_PLAYERS,
            settings_path: None,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (20..=240).contains(&parsed) => config.tick_rate = parsed,
                _ => tracing::warn!("TICK_RATE must be 20-240, got '{}', using default", rate),
            }
        }

        if let Ok(seed) = std::env::var("ROOM_SEED") {
            if seed.eq_ignore_ascii_case("random") {
                let drawn = rand::random::<u64>();
                tracing::info!("ROOM_SEED drawn at random: {}", drawn);
                config.room_seed = Some(drawn);
            } else if let Ok(parsed) = seed.parse::<u64>() {
                config.room_seed = Some(parsed);
            } else {
                tracing::warn!("Invalid ROOM_SEED '{}', using wall clock", seed);
            }
        }

        if let Ok(bots) = std::env::var("BOT_COUNT") {
            if let Ok(parsed) = bots.parse::<usize>() {
                config.bot_count = parsed;
            } else {
                tracing::warn!("Invalid BOT_COUNT '{}', using default", bots);
            }
        }

        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = parsed,
                _ => tracing::warn!("Invalid METRICS_PORT '{}', using default", port),
            }
        }

        if let Ok(max) = std::env::var("MAX_PLAYERS") {
            match max.parse::<usize>() {
                Ok(parsed) if (game::MIN_PLAYERS..=game::MAX_PLAYERS).contains(&parsed) => {
                    config.max_players = parsed
                }
                _ => tracing::warn!(
                    "MAX_PLAYERS must be {}-{}, got '{}', using default",
                    game::MIN_PLAYERS,
                    game::MAX_PLAYERS,
                    max
                ),
            }
        }

        if let Ok(path) = std::env::var("GAME_SETTINGS_PATH") {
            config.settings_path = Some(PathBuf::from(path));
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate == 0 {
            return Err("tick_rate cannot be 0".to_string());
        }
        if self.max_players < game::MIN_PLAYERS {
            return Err(format!("max_players must be at least {}", game::MIN_PLAYERS));
        }
        // The host occupies one seat
        if self.bot_count >= self.max_players {
            return Err("bot_count must leave a seat for the host".to_string());
        }
        Ok(())
    }

    /// Seconds per simulation step
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Advanced settings from `settings_path`, or defaults when unset
    pub fn load_settings(&self) -> anyhow::Result<AdvancedSettings> {
        match &self.settings_path {
            Some(path) => read_settings(path),
            None => Ok(AdvancedSettings::default()),
        }
    }
}

fn read_settings(path: &Path) -> anyhow::Result<AdvancedSettings> {
    let raw = std::fs::read_to_string(path)?;
    let settings: AdvancedSettings = serde_json::from_str(&raw)?;
    settings.validate()?;
    Ok(settings)
}
