//! Per-tick motion integration and arena wall reflection

use rayon::prelude::*;

use crate::game::constants::{arena, pilot, ship};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::settings::{AdvancedSettings, GameMode};
use crate::game::state::{GameState, Pilot, PlayerState, ShipMotion};
use crate::util::vec2::{normalize_angle, Vec2};

/// Buttons that drive ship kinematics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipControls {
    pub rotate: bool,
    pub dash: bool,
}

/// Per-match handling parameters for `step_ship`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipTuning {
    pub rotation_speed: f32,
    pub target_speed: f32,
    pub velocity_response: f32,
    pub dash_impulse: f32,
    pub dash_cooldown: f32,
    pub spin_damping: f32,
    pub wall_restitution: f32,
    pub wall_friction: f32,
}

impl ShipTuning {
    pub fn for_match(mode: GameMode, settings: &AdvancedSettings) -> Self {
        Self {
            rotation_speed: ship::ROTATION_SPEED * mode.rotation_multiplier(),
            target_speed: ship::TARGET_SPEED * mode.speed_multiplier(),
            velocity_response: ship::VELOCITY_RESPONSE,
            dash_impulse: ship::DASH_IMPULSE,
            dash_cooldown: ship::DASH_COOLDOWN,
            spin_damping: ship::SPIN_DAMPING,
            wall_restitution: settings.ship_restitution,
            wall_friction: settings.ship_friction,
        }
    }
}

impl Default for ShipTuning {
    fn default() -> Self {
        Self::for_match(GameMode::Standard, &AdvancedSettings::default())
    }
}

/// Axis-aligned arena rectangle `[0, width] x [0, height]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub width: f32,
    pub height: f32,
}

impl ArenaBounds {
    pub fn centre(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

impl Default for ArenaBounds {
    fn default() -> Self {
        Self {
            width: arena::WIDTH,
            height: arena::HEIGHT,
        }
    }
}

/// What happened during one kinematic step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub dashed: bool,
    pub hit_wall: bool,
}

/// Advance one ship by `dt` seconds.
///
/// This is the only ship integrator: the authority runs it every tick and the
/// client predictor replays it over unacknowledged inputs, so both sides agree
/// bit for bit given the same starting motion and inputs.
pub fn step_ship(
    motion: &mut ShipMotion,
    controls: ShipControls,
    tuning: &ShipTuning,
    bounds: &ArenaBounds,
    dt: f32,
) -> StepOutcome {
    let mut outcome = StepOutcome::default();

    // Rotation: held button plus residual collision spin
    let turn = match (controls.rotate, motion.reversed) {
        (false, _) => 0.0,
        (true, false) => 1.0,
        (true, true) => -1.0,
    };
    motion.angle = normalize_angle(
        motion.angle + turn * tuning.rotation_speed * dt + motion.angular_velocity * dt,
    );
    motion.angular_velocity *= (-tuning.spin_damping * dt).exp();

    motion.dash_cooldown = (motion.dash_cooldown - dt).max(0.0);
    if controls.dash && motion.dash_cooldown <= 0.0 {
        motion.velocity += motion.forward() * tuning.dash_impulse;
        motion.dash_cooldown = tuning.dash_cooldown;
        outcome.dashed = true;
    }

    // Exponential approach toward cruise velocity
    let desired = motion.forward() * tuning.target_speed;
    let blend = 1.0 - (-tuning.velocity_response * dt).exp();
    motion.velocity += (desired - motion.velocity) * blend;

    motion.position += motion.velocity * dt;

    outcome.hit_wall = reflect_walls(
        &mut motion.position,
        &mut motion.velocity,
        ship::RADIUS,
        bounds,
        tuning.wall_restitution,
        tuning.wall_friction,
    );
    outcome
}

/// Clamp a circle inside the arena, reflecting the normal velocity component
/// with `restitution` and damping the tangential one by `friction`.
pub fn reflect_walls(
    position: &mut Vec2,
    velocity: &mut Vec2,
    radius: f32,
    bounds: &ArenaBounds,
    restitution: f32,
    friction: f32,
) -> bool {
    let mut hit = false;

    if position.x < radius {
        position.x = radius;
        if velocity.x < 0.0 {
            velocity.x = -velocity.x * restitution;
            velocity.y *= 1.0 - friction;
        }
        hit = true;
    } else if position.x > bounds.width - radius {
        position.x = bounds.width - radius;
        if velocity.x > 0.0 {
            velocity.x = -velocity.x * restitution;
            velocity.y *= 1.0 - friction;
        }
        hit = true;
    }

    if position.y < radius {
        position.y = radius;
        if velocity.y < 0.0 {
            velocity.y = -velocity.y * restitution;
            velocity.x *= 1.0 - friction;
        }
        hit = true;
    } else if position.y > bounds.height - radius {
        position.y = bounds.height - radius;
        if velocity.y > 0.0 {
            velocity.y = -velocity.y * restitution;
            velocity.x *= 1.0 - friction;
        }
        hit = true;
    }

    hit
}

/// Pilot movement: rotate button turns, fire button thrusts, drag otherwise
pub fn step_pilot(pilot: &mut Pilot, rotate: bool, thrust: bool, bounds: &ArenaBounds, dt: f32) {
    if rotate {
        pilot.angle = normalize_angle(pilot.angle + pilot::ROTATION_SPEED * dt);
    }
    if thrust {
        pilot.velocity += Vec2::from_angle(pilot.angle) * pilot::THRUST * dt;
    }
    pilot.velocity *= (-pilot::DRAG * dt).exp();
    pilot.position += pilot.velocity * dt;
    reflect_walls(
        &mut pilot.position,
        &mut pilot.velocity,
        pilot::RADIUS,
        bounds,
        0.5,
        0.0,
    );
}

/// Integrate every live ship from its player's held input
pub fn integrate_ships(state: &mut GameState, fx: &mut impl EffectsSink, dt: f32) {
    let tuning = ShipTuning::for_match(state.mode, &state.settings);
    let bounds = ArenaBounds::default();
    let now = state.now_ms;

    for player in state.players.iter_mut() {
        if !player.has_live_ship() {
            player.dash_queued = false;
            continue;
        }

        let motion = &mut player.ship.motion;
        motion.reversed = now < player.reversed_until;

        let controls = ShipControls {
            rotate: player.input.rotate,
            dash: player.dash_queued,
        };
        // A dash that cannot fire now is dropped, not deferred
        player.dash_queued = false;

        let outcome = step_ship(motion, controls, &tuning, &bounds, dt);
        if outcome.dashed {
            fx.emit(GameEvent::DashParticles {
                actor: player.id,
                position: motion.position,
                angle: motion.angle,
                color_slot: player.color_slot,
            });
            fx.emit(GameEvent::sound(SoundKind::Dash, Some(player.id)));
        }
    }
}

/// Integrate pilots from their owner's buttons
pub fn integrate_pilots(state: &mut GameState, dt: f32) {
    let bounds = ArenaBounds::default();
    let players = &state.players;

    state.pilots.par_iter_mut().for_each(|pilot| {
        if !pilot.alive {
            return;
        }
        let input = players
            .iter()
            .find(|p| p.id == pilot.player_id && p.state == PlayerState::Ejected)
            .map(|p| p.input)
            .unwrap_or_default();
        step_pilot(pilot, input.rotate, input.fire, &bounds, dt);
    });
}

/// Drift, spin and wall-bounce asteroids
pub fn integrate_asteroids(state: &mut GameState, dt: f32) {
    let bounds = ArenaBounds::default();
    let restitution = state.settings.asteroid_restitution;
    let friction = state.settings.asteroid_friction;

    state.asteroids.par_iter_mut().for_each(|asteroid| {
        asteroid.position += asteroid.velocity * dt;
        asteroid.angle = normalize_angle(asteroid.angle + asteroid.spin * dt);
        reflect_walls(
            &mut asteroid.position,
            &mut asteroid.velocity,
            asteroid.radius,
            &bounds,
            restitution,
            friction,
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::physics::DT;
    use std::f32::consts::FRAC_PI_2;

    fn create_test_motion() -> ShipMotion {
        ShipMotion::at(Vec2::new(600.0, 400.0), 0.0)
    }

    #[test]
    fn test_velocity_approaches_target_speed() {
        let tuning = ShipTuning::default();
        let bounds = ArenaBounds {
            width: 1.0e6,
            height: 1.0e6,
        };
        let mut motion = ShipMotion::at(Vec2::new(5.0e5, 5.0e5), 0.0);

        for _ in 0..600 {
            step_ship(&mut motion, ShipControls::default(), &tuning, &bounds, DT);
        }

        assert!((motion.velocity.length() - tuning.target_speed).abs() < 1.0);
        assert!(motion.velocity.x > 0.0);
    }

    #[test]
    fn test_exponential_smoothing_formula() {
        let tuning = ShipTuning::default();
        let bounds = ArenaBounds::default();
        let mut motion = create_test_motion();

        step_ship(&mut motion, ShipControls::default(), &tuning, &bounds, DT);

        let expected = tuning.target_speed * (1.0 - (-tuning.velocity_response * DT).exp());
        assert!((motion.velocity.x - expected).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_direction_flips_when_reversed() {
        let tuning = ShipTuning::default();
        let bounds = ArenaBounds::default();
        let rotate = ShipControls {
            rotate: true,
            dash: false,
        };

        let mut normal = create_test_motion();
        step_ship(&mut normal, rotate, &tuning, &bounds, DT);
        assert!(normal.angle > 0.0);

        let mut reversed = create_test_motion();
        reversed.reversed = true;
        step_ship(&mut reversed, rotate, &tuning, &bounds, DT);
        assert!(reversed.angle < 0.0);
    }

    #[test]
    fn test_dash_respects_cooldown() {
        let tuning = ShipTuning::default();
        let bounds = ArenaBounds::default();
        let dash = ShipControls {
            rotate: false,
            dash: true,
        };
        let mut motion = create_test_motion();

        let first = step_ship(&mut motion, dash, &tuning, &bounds, DT);
        assert!(first.dashed);
        assert!(motion.velocity.x > tuning.dash_impulse * 0.9);

        let second = step_ship(&mut motion, dash, &tuning, &bounds, DT);
        assert!(!second.dashed);
    }

    #[test]
    fn test_spin_decays() {
        let tuning = ShipTuning::default();
        let bounds = ArenaBounds::default();
        let mut motion = create_test_motion();
        motion.angular_velocity = 4.0;

        for _ in 0..120 {
            step_ship(&mut motion, ShipControls::default(), &tuning, &bounds, DT);
        }
        assert!(motion.angular_velocity.abs() < 0.01);
    }

    #[test]
    fn test_wall_reflection_keeps_ship_inside() {
        let tuning = ShipTuning::default();
        let bounds = ArenaBounds::default();
        let mut motion = ShipMotion::at(Vec2::new(600.0, 2.0), -FRAC_PI_2);
        motion.velocity = Vec2::new(0.0, -200.0);

        let outcome = step_ship(&mut motion, ShipControls::default(), &tuning, &bounds, DT);

        assert!(outcome.hit_wall);
        assert!(motion.position.y >= ship::RADIUS);
        assert!(motion.velocity.y > 0.0);
    }

    #[test]
    fn test_pilot_drag_slows_drift() {
        let mut pilot = Pilot {
            player_id: uuid::Uuid::nil(),
            position: Vec2::new(600.0, 400.0),
            velocity: Vec2::new(pilot::EJECT_SPEED, 0.0),
            angle: 0.0,
            spawned_at: 0.0,
            alive: true,
        };
        let bounds = ArenaBounds::default();
        for _ in 0..60 {
            step_pilot(&mut pilot, false, false, &bounds, DT);
        }
        assert!(pilot.velocity.length() < pilot::EJECT_SPEED * 0.5);
    }
}
