/// Simulation clock constants
pub mod physics {
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 60.0;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: f64 = 1000.0 / TICK_RATE as f64;
    /// Mass per squared unit of radius (mass = DENSITY * r^2)
    pub const DENSITY: f32 = 0.01;
    /// Allowed residual overlap after a contact is resolved
    pub const CONTACT_EPSILON: f32 = 1e-3;
}

/// Arena geometry
pub mod arena {
    pub const WIDTH: f32 = 1200.0;
    pub const HEIGHT: f32 = 800.0;
    /// Distance from the walls at which ships are placed on spawn
    pub const SPAWN_MARGIN: f32 = 90.0;
}

/// Ship handling
pub mod ship {
    pub const RADIUS: f32 = 16.0;
    /// Turn rate while the rotate button is held (rad/s)
    pub const ROTATION_SPEED: f32 = 4.2;
    /// Cruise speed in STANDARD mode (units/s)
    pub const TARGET_SPEED: f32 = 190.0;
    /// Exponential response toward the target velocity (1/s)
    pub const VELOCITY_RESPONSE: f32 = 3.5;
    /// Velocity impulse added by a dash
    pub const DASH_IMPULSE: f32 = 320.0;
    /// Seconds between dashes
    pub const DASH_COOLDOWN: f32 = 1.2;
    /// Residual collision spin decay (1/s)
    pub const SPIN_DAMPING: f32 = 4.0;
    /// Spin gained per unit of tangential contact speed
    pub const SPIN_TRANSFER: f32 = 0.02;
    pub const MAX_SPIN: f32 = 8.0;
    pub const MAX_AMMO: u8 = 3;
    pub const RELOAD_MS: f64 = 1200.0;
    pub const FIRE_COOLDOWN_MS: f64 = 180.0;
    pub const SPAWN_INVULNERABLE_MS: f64 = 2000.0;
}

/// Ejected pilot
pub mod pilot {
    pub const RADIUS: f32 = 8.0;
    pub const SURVIVAL_MS: f64 = 4000.0;
    /// Pilot drifts forward at this speed, slowing with drag
    pub const EJECT_SPEED: f32 = 60.0;
    pub const DRAG: f32 = 1.5;
    pub const ROTATION_SPEED: f32 = 3.0;
    pub const THRUST: f32 = 120.0;
}

/// Primary gun projectile
pub mod projectile {
    pub const RADIUS: f32 = 3.0;
    pub const SPEED: f32 = 430.0;
    pub const LIFETIME_MS: f64 = 1600.0;
    /// Scatter power-up fan
    pub const SCATTER_COUNT: usize = 5;
    pub const SCATTER_SPREAD: f32 = 0.5;
}

/// Asteroid field
pub mod asteroid {
    pub const LARGE_RADIUS_MIN: f32 = 34.0;
    pub const LARGE_RADIUS_MAX: f32 = 44.0;
    pub const SMALL_RADIUS_MIN: f32 = 15.0;
    pub const SMALL_RADIUS_MAX: f32 = 21.0;
    pub const SPEED_MIN: f32 = 20.0;
    pub const SPEED_MAX: f32 = 60.0;
    pub const MAX_SPIN: f32 = 1.2;
    /// Spin gained per unit of tangential contact speed
    pub const SPIN_TRANSFER: f32 = 0.01;
    /// Small asteroids produced by one large asteroid
    pub const SPLIT_COUNT: usize = 2;
    /// Angular spread of split fragments around the parent heading
    pub const SPLIT_SPREAD: f32 = 0.6;
    pub const SPLIT_SPEED_BOOST: f32 = 1.3;
    pub const VERTEX_MIN: u32 = 7;
    pub const VERTEX_MAX: u32 = 11;
    pub const JAGGEDNESS: f32 = 0.25;
    /// New asteroid is added while the field is below target, at this period
    pub const RESPAWN_INTERVAL_MS: f64 = 2500.0;
    /// Hard cap on large asteroids in the initial field
    pub const MAX_FIELD: usize = 24;
}

/// Power-ups
pub mod powerup {
    pub const RADIUS: f32 = 12.0;
    pub const SPAWN_INTERVAL_MS: f64 = 6000.0;
    pub const LIFETIME_MS: f64 = 14000.0;
    pub const MAX_ACTIVE: usize = 3;
    pub const MAGNET_RADIUS: f32 = 110.0;
    pub const MAGNET_ACCEL: f32 = 900.0;
    pub const MAGNET_MAX_SPEED: f32 = 420.0;
    pub const PICKUP_RADIUS: f32 = 22.0;
    pub const SHIELD_HITS: u8 = 2;
    pub const LASER_CHARGES: u8 = 3;
    pub const SCATTER_CHARGES: u8 = 3;
    pub const MINE_CHARGES: u8 = 2;
    pub const HOMING_CHARGES: u8 = 2;
    pub const REVERSE_DURATION_MS: f64 = 5000.0;
}

/// Laser power-up
pub mod laser {
    pub const LENGTH: f32 = 700.0;
    pub const WIDTH: f32 = 4.0;
    pub const COOLDOWN_MS: f64 = 450.0;
    /// Beam stays visible for this long after the sweep
    pub const BEAM_MS: f64 = 140.0;
}

/// Mine power-up
pub mod mine {
    pub const RADIUS: f32 = 7.0;
    pub const TRIGGER_RADIUS: f32 = 70.0;
    pub const ARM_DELAY_MS: f64 = 600.0;
    pub const BLAST_RADIUS: f32 = 95.0;
    pub const LIFETIME_MS: f64 = 20000.0;
    pub const DROP_OFFSET: f32 = 26.0;
}

/// Homing missile power-up
pub mod homing {
    pub const RADIUS: f32 = 5.0;
    pub const SPEED: f32 = 260.0;
    pub const TURN_RATE: f32 = 2.6;
    pub const DETECTION_RADIUS: f32 = 450.0;
    pub const LIFETIME_MS: f64 = 4500.0;
}

/// Joust power-up
pub mod joust {
    /// Sword reach measured from the ship hull
    pub const SWORD_LENGTH: f32 = 22.0;
    /// Half-width of the side arc around +-90 degrees (radians)
    pub const SIDE_HALF_ARC: f32 = std::f32::consts::FRAC_PI_4;
}

/// Map turret
pub mod turret {
    pub const RADIUS: f32 = 24.0;
    pub const DETECTION_RADIUS: f32 = 320.0;
    /// Muzzle distance from the turret centre
    pub const ORBIT_RADIUS: f32 = 34.0;
    pub const TURN_RATE: f32 = 2.2;
    pub const AIM_TOLERANCE: f32 = 0.12;
    pub const FIRE_COOLDOWN_MS: f64 = 1400.0;
    pub const BULLET_SPEED: f32 = 240.0;
    pub const BULLET_RADIUS: f32 = 6.0;
    pub const BULLET_LIFETIME_MS: f64 = 1800.0;
    pub const BLAST_RADIUS: f32 = 48.0;
}

/// Bot behaviour
pub mod ai {
    /// Bots re-evaluate at this interval and replay their cached action between
    pub const REACTION_MS: f64 = 150.0;
    pub const AIM_TOLERANCE: f32 = 0.18;
    pub const FIRE_RANGE: f32 = 520.0;
    pub const DODGE_RADIUS: f32 = 70.0;
    pub const DODGE_CHANCE: f32 = 0.35;
}

/// Game/match constants
pub mod game {
    /// Minimum players to start or keep a match running (including bots)
    pub const MIN_PLAYERS: usize = 2;
    pub const MAX_PLAYERS: usize = 8;
    pub const COUNTDOWN_MS: f64 = 3000.0;
    pub const ROUND_END_MS: f64 = 3000.0;
    /// Delay between an elimination and the win-condition evaluation
    pub const ELIMINATION_GRACE_MS: f64 = 350.0;
    pub const DEFAULT_ROUND_WIN_TARGET: u32 = 3;
    pub const MAX_NAME_LEN: usize = 16;
}

/// Mass for a circular body of `radius`
#[inline]
pub fn radius_to_mass(radius: f32) -> f32 {
    physics::DENSITY * radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_grows_with_radius() {
        assert!(radius_to_mass(asteroid::LARGE_RADIUS_MIN) > radius_to_mass(ship::RADIUS));
        assert!(radius_to_mass(ship::RADIUS) > radius_to_mass(pilot::RADIUS));
    }

    #[test]
    fn test_tick_duration_matches_rate() {
        assert!((physics::TICK_DURATION_MS - physics::DT as f64 * 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_split_fragments_fit_inside_parent() {
        assert!(asteroid::SMALL_RADIUS_MAX * 2.0 <= asteroid::LARGE_RADIUS_MAX * 1.2);
        assert!(asteroid::SPLIT_COUNT >= 2);
    }
}
