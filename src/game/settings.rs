//! Match modes and leader-adjustable advanced settings

use serde::{Deserialize, Serialize};

use crate::game::constants::{asteroid, game, ship};
use crate::game::error::GameError;

/// Handling preset chosen by the leader in the lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameMode {
    #[default]
    Standard,
    /// Slower ships and turning, for new players
    Sane,
    /// Faster ships, twice the asteroids
    Chaotic,
}

impl GameMode {
    pub fn speed_multiplier(self) -> f32 {
        match self {
            GameMode::Standard => 1.0,
            GameMode::Sane => 0.75,
            GameMode::Chaotic => 1.3,
        }
    }

    pub fn rotation_multiplier(self) -> f32 {
        match self {
            GameMode::Standard => 1.0,
            GameMode::Sane => 0.8,
            GameMode::Chaotic => 1.15,
        }
    }

    pub fn asteroid_multiplier(self) -> usize {
        match self {
            GameMode::Chaotic => 2,
            _ => 1,
        }
    }
}

/// Settings a leader can change while in the lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    pub round_win_target: u32,
    /// Large asteroids in the initial field (before the mode multiplier)
    pub asteroid_count: usize,
    pub starting_power_ups: bool,
    pub power_ups_enabled: bool,
    pub turret_enabled: bool,
    pub max_ammo: u8,
    /// Restitution used for ship/pilot collisions and wall bounces
    pub ship_restitution: f32,
    /// Coulomb friction coefficient used for ship/pilot collisions and walls
    pub ship_friction: f32,
    pub asteroid_restitution: f32,
    pub asteroid_friction: f32,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            round_win_target: game::DEFAULT_ROUND_WIN_TARGET,
            asteroid_count: 4,
            starting_power_ups: false,
            power_ups_enabled: true,
            turret_enabled: false,
            max_ammo: ship::MAX_AMMO,
            ship_restitution: 0.6,
            ship_friction: 0.15,
            asteroid_restitution: 0.8,
            asteroid_friction: 0.05,
        }
    }
}

impl AdvancedSettings {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), GameError> {
        if !(1..=15).contains(&self.round_win_target) {
            return Err(GameError::InvalidState(
                "round win target must be between 1 and 15".to_string(),
            ));
        }
        if self.asteroid_count > 16 {
            return Err(GameError::InvalidState(
                "at most 16 asteroids".to_string(),
            ));
        }
        if !(1..=10).contains(&self.max_ammo) {
            return Err(GameError::InvalidState(
                "max ammo must be between 1 and 10".to_string(),
            ));
        }
        let unit = 0.0..=1.0;
        for (name, value) in [
            ("ship_restitution", self.ship_restitution),
            ("ship_friction", self.ship_friction),
            ("asteroid_restitution", self.asteroid_restitution),
            ("asteroid_friction", self.asteroid_friction),
        ] {
            if !unit.contains(&value) {
                return Err(GameError::InvalidState(format!(
                    "{name} must be within 0..=1"
                )));
            }
        }
        Ok(())
    }

    /// Large asteroids spawned at round start for `mode`
    pub fn initial_asteroids(&self, mode: GameMode) -> usize {
        (self.asteroid_count * mode.asteroid_multiplier()).min(asteroid::MAX_FIELD)
    }
}
