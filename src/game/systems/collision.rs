//! Circle-circle impulse resolution and the per-tick pair passes
//!
//! One routine backs every body pair; only restitution, friction and mass
//! differ between ship, pilot, asteroid and turret contacts.

use crate::game::constants::{asteroid as asteroid_consts, pilot, radius_to_mass, ship, turret};
use crate::game::state::{GameState, PlayerId, PlayerState};
use crate::util::vec2::Vec2;

/// A circular body taking part in one contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// Zero for immovable bodies
    pub inv_mass: f32,
}

impl Body {
    pub fn new(position: Vec2, velocity: Vec2, radius: f32) -> Self {
        Self {
            position,
            velocity,
            radius,
            inv_mass: 1.0 / radius_to_mass(radius),
        }
    }

    pub fn fixed(position: Vec2, radius: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
            inv_mass: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactParams {
    pub restitution: f32,
    /// Coulomb coefficient; the tangential impulse never exceeds friction * normal impulse
    pub friction: f32,
}

/// Result of a resolved contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit normal pointing from `a` to `b`
    pub normal: Vec2,
    pub penetration: f32,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    /// Tangential speed of `b` relative to `a` before the impulse
    pub tangent_speed: f32,
}

/// Resolve one circle pair in place.
///
/// Returns `None` when the bodies do not touch. Overlapping bodies are pushed
/// apart along the normal in proportion to inverse mass; an impulse is only
/// applied when they are approaching.
pub fn resolve_circles(a: &mut Body, b: &mut Body, params: ContactParams) -> Option<Contact> {
    let total_inv = a.inv_mass + b.inv_mass;
    if total_inv <= 0.0 {
        return None;
    }

    let delta = b.position - a.position;
    let radii = a.radius + b.radius;
    let dist_sq = delta.length_sq();
    if dist_sq > radii * radii {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON {
        delta * (1.0 / dist)
    } else {
        Vec2::RIGHT
    };
    let penetration = radii - dist;

    // Positional correction
    if penetration > 0.0 {
        let correction = normal * (penetration / total_inv);
        a.position -= correction * a.inv_mass;
        b.position += correction * b.inv_mass;
    }

    let relative = b.velocity - a.velocity;
    let vn = relative.dot(normal);
    let tangent = normal.perpendicular();
    let vt = relative.dot(tangent);

    let mut contact = Contact {
        normal,
        penetration,
        normal_impulse: 0.0,
        tangent_impulse: 0.0,
        tangent_speed: vt,
    };

    if vn > 0.0 {
        return Some(contact);
    }

    let j = -(1.0 + params.restitution) * vn / total_inv;
    a.velocity -= normal * (j * a.inv_mass);
    b.velocity += normal * (j * b.inv_mass);

    let max_friction = params.friction * j;
    let jt = (-vt / total_inv).clamp(-max_friction, max_friction);
    a.velocity -= tangent * (jt * a.inv_mass);
    b.velocity += tangent * (jt * b.inv_mass);

    contact.normal_impulse = j;
    contact.tangent_impulse = jt;
    Some(contact)
}

/// Spin a ship picks up from a glancing contact
#[inline]
pub fn spin_from_contact(current: f32, tangent_speed: f32) -> f32 {
    (current + ship::SPIN_TRANSFER * tangent_speed).clamp(-ship::MAX_SPIN, ship::MAX_SPIN)
}

/// A pilot touched by an enemy ship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PilotRam {
    pub victim: PlayerId,
    pub killer: PlayerId,
}

/// Run every body pair for this tick.
///
/// Ship/pilot contact is not a bounce: an enemy ship touching a pilot kills
/// it, which is reported back for the lifecycle system.
pub fn resolve_all(state: &mut GameState) -> Vec<PilotRam> {
    let ship_params = ContactParams {
        restitution: state.settings.ship_restitution,
        friction: state.settings.ship_friction,
    };
    let rock_params = ContactParams {
        restitution: state.settings.asteroid_restitution,
        friction: state.settings.asteroid_friction,
    };

    resolve_ship_pairs(state, ship_params);
    resolve_ship_asteroid_pairs(state, ship_params);
    resolve_pilot_asteroid_pairs(state, rock_params);
    resolve_asteroid_pairs(state, rock_params);
    resolve_turret_contacts(state, ship_params, rock_params);
    find_pilot_rams(state)
}

fn live_ship_indices(state: &GameState) -> Vec<usize> {
    state
        .players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.has_live_ship())
        .map(|(i, _)| i)
        .collect()
}

fn resolve_ship_pairs(state: &mut GameState, params: ContactParams) {
    let live = live_ship_indices(state);
    for (n, &i) in live.iter().enumerate() {
        for &j in &live[n + 1..] {
            let (left, right) = state.players.split_at_mut(j);
            let a_ship = &mut left[i].ship.motion;
            let b_ship = &mut right[0].ship.motion;

            let mut a = Body::new(a_ship.position, a_ship.velocity, ship::RADIUS);
            let mut b = Body::new(b_ship.position, b_ship.velocity, ship::RADIUS);
            if let Some(contact) = resolve_circles(&mut a, &mut b, params) {
                a_ship.position = a.position;
                a_ship.velocity = a.velocity;
                a_ship.angular_velocity = spin_from_contact(a_ship.angular_velocity, contact.tangent_speed);
                b_ship.position = b.position;
                b_ship.velocity = b.velocity;
                b_ship.angular_velocity = spin_from_contact(b_ship.angular_velocity, -contact.tangent_speed);
            }
        }
    }
}

fn resolve_ship_asteroid_pairs(state: &mut GameState, params: ContactParams) {
    for player in state.players.iter_mut().filter(|p| p.has_live_ship()) {
        let motion = &mut player.ship.motion;
        for asteroid in state.asteroids.iter_mut().filter(|a| a.alive) {
            let mut a = Body::new(motion.position, motion.velocity, ship::RADIUS);
            let mut b = Body::new(asteroid.position, asteroid.velocity, asteroid.radius);
            if let Some(contact) = resolve_circles(&mut a, &mut b, params) {
                motion.position = a.position;
                motion.velocity = a.velocity;
                motion.angular_velocity = spin_from_contact(motion.angular_velocity, contact.tangent_speed);
                asteroid.position = b.position;
                asteroid.velocity = b.velocity;
            }
        }
    }
}

fn resolve_pilot_asteroid_pairs(state: &mut GameState, params: ContactParams) {
    for pilot in state.pilots.iter_mut().filter(|p| p.alive) {
        for asteroid in state.asteroids.iter_mut().filter(|a| a.alive) {
            let mut a = Body::new(pilot.position, pilot.velocity, pilot::RADIUS);
            let mut b = Body::new(asteroid.position, asteroid.velocity, asteroid.radius);
            if resolve_circles(&mut a, &mut b, params).is_some() {
                pilot.position = a.position;
                pilot.velocity = a.velocity;
                asteroid.position = b.position;
                asteroid.velocity = b.velocity;
            }
        }
    }
}

fn resolve_asteroid_pairs(state: &mut GameState, params: ContactParams) {
    let count = state.asteroids.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let (left, right) = state.asteroids.split_at_mut(j);
            let first = &mut left[i];
            let second = &mut right[0];
            if !first.alive || !second.alive {
                continue;
            }
            let mut a = Body::new(first.position, first.velocity, first.radius);
            let mut b = Body::new(second.position, second.velocity, second.radius);
            if let Some(contact) = resolve_circles(&mut a, &mut b, params) {
                first.position = a.position;
                first.velocity = a.velocity;
                second.position = b.position;
                second.velocity = b.velocity;
                // Rubbing surfaces turn the two rocks in opposite directions
                let spin = contact.tangent_speed * asteroid_consts::SPIN_TRANSFER;
                first.spin = (first.spin + spin).clamp(-asteroid_consts::MAX_SPIN, asteroid_consts::MAX_SPIN);
                second.spin = (second.spin - spin).clamp(-asteroid_consts::MAX_SPIN, asteroid_consts::MAX_SPIN);
            }
        }
    }
}

/// The turret is an immovable obstacle for ships and asteroids
fn resolve_turret_contacts(state: &mut GameState, ship_params: ContactParams, rock_params: ContactParams) {
    let Some(turret_pos) = state.turret.as_ref().map(|t| t.position) else {
        return;
    };

    for player in state.players.iter_mut().filter(|p| p.has_live_ship()) {
        let motion = &mut player.ship.motion;
        let mut a = Body::fixed(turret_pos, turret::RADIUS);
        let mut b = Body::new(motion.position, motion.velocity, ship::RADIUS);
        if let Some(contact) = resolve_circles(&mut a, &mut b, ship_params) {
            motion.position = b.position;
            motion.velocity = b.velocity;
            motion.angular_velocity = spin_from_contact(motion.angular_velocity, contact.tangent_speed);
        }
    }

    for asteroid in state.asteroids.iter_mut().filter(|a| a.alive) {
        let mut a = Body::fixed(turret_pos, turret::RADIUS);
        let mut b = Body::new(asteroid.position, asteroid.velocity, asteroid.radius);
        if resolve_circles(&mut a, &mut b, rock_params).is_some() {
            asteroid.position = b.position;
            asteroid.velocity = b.velocity;
        }
    }
}

fn find_pilot_rams(state: &GameState) -> Vec<PilotRam> {
    let reach = ship::RADIUS + pilot::RADIUS;
    let mut rams = Vec::new();

    for pilot in state.pilots.iter().filter(|p| p.alive) {
        let killer = state
            .players
            .iter()
            .filter(|p| p.has_live_ship() && p.id != pilot.player_id)
            .find(|p| p.ship.motion.position.distance_sq_to(pilot.position) <= reach * reach);
        if let Some(killer) = killer {
            rams.push(PilotRam {
                victim: pilot.player_id,
                killer: killer.id,
            });
        }
    }
    rams
}

/// Players whose live ship overlaps `point` within `radius`
pub fn ships_within(state: &GameState, point: Vec2, radius: f32) -> Vec<PlayerId> {
    state
        .players
        .iter()
        .filter(|p| p.has_live_ship())
        .filter(|p| p.ship.motion.position.distance_to(point) <= radius + ship::RADIUS)
        .map(|p| p.id)
        .collect()
}

/// Pilots overlapping `point` within `radius`
pub fn pilots_within(state: &GameState, point: Vec2, radius: f32) -> Vec<PlayerId> {
    state
        .pilots
        .iter()
        .filter(|p| p.alive)
        .filter(|p| p.position.distance_to(point) <= radius + pilot::RADIUS)
        .filter(|p| {
            state
                .get_player(p.player_id)
                .is_some_and(|owner| owner.state == PlayerState::Ejected)
        })
        .map(|p| p.player_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::physics;
    use crate::game::state::{Player, PlayerKind, ShipMotion};
    use crate::game::systems::asteroid;
    use uuid::Uuid;

    const PARAMS: ContactParams = ContactParams {
        restitution: 0.6,
        friction: 0.2,
    };

    #[test]
    fn test_separated_bodies_untouched() {
        let mut a = Body::new(Vec2::new(0.0, 0.0), Vec2::ZERO, 10.0);
        let mut b = Body::new(Vec2::new(25.0, 0.0), Vec2::ZERO, 10.0);
        assert!(resolve_circles(&mut a, &mut b, PARAMS).is_none());
        assert_eq!(a.position, Vec2::ZERO);
    }

    #[test]
    fn test_no_lasting_penetration() {
        let cases = [
            (Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0), 16.0, 40.0),
            (Vec2::new(10.0, 10.0), Vec2::new(12.0, 15.0), 8.0, 16.0),
            (Vec2::new(0.0, 0.0), Vec2::new(30.0, 1.0), 16.0, 16.0),
        ];
        for (pa, pb, ra, rb) in cases {
            let mut a = Body::new(pa, Vec2::new(50.0, 0.0), ra);
            let mut b = Body::new(pb, Vec2::new(-50.0, 10.0), rb);
            resolve_circles(&mut a, &mut b, PARAMS).unwrap();
            let dist = a.position.distance_to(b.position);
            assert!(dist >= ra + rb - physics::CONTACT_EPSILON, "dist {dist}");
        }
    }

    #[test]
    fn test_coincident_centres_use_fallback_normal() {
        let mut a = Body::new(Vec2::new(100.0, 100.0), Vec2::ZERO, 10.0);
        let mut b = Body::new(Vec2::new(100.0, 100.0), Vec2::ZERO, 10.0);
        let contact = resolve_circles(&mut a, &mut b, PARAMS).unwrap();
        assert_eq!(contact.normal, Vec2::RIGHT);
        assert!(b.position.x > a.position.x);
        assert!((a.position.distance_to(b.position) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_separating_bodies_get_no_impulse() {
        let mut a = Body::new(Vec2::new(0.0, 0.0), Vec2::new(-10.0, 0.0), 10.0);
        let mut b = Body::new(Vec2::new(15.0, 0.0), Vec2::new(10.0, 0.0), 10.0);
        let contact = resolve_circles(&mut a, &mut b, PARAMS).unwrap();
        assert_eq!(contact.normal_impulse, 0.0);
        assert_eq!(a.velocity, Vec2::new(-10.0, 0.0));
        assert_eq!(b.velocity, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_head_on_equal_masses_bounce() {
        let mut a = Body::new(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), 10.0);
        let mut b = Body::new(Vec2::new(19.0, 0.0), Vec2::new(-100.0, 0.0), 10.0);
        let params = ContactParams {
            restitution: 1.0,
            friction: 0.0,
        };
        resolve_circles(&mut a, &mut b, params).unwrap();
        assert!((a.velocity.x + 100.0).abs() < 1e-3);
        assert!((b.velocity.x - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_friction_clamped_to_coulomb_cone() {
        let mut a = Body::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 10.0);
        let mut b = Body::new(Vec2::new(19.0, 0.0), Vec2::new(0.0, 500.0), 10.0);
        let contact = resolve_circles(&mut a, &mut b, PARAMS).unwrap();
        assert!(contact.tangent_impulse.abs() <= PARAMS.friction * contact.normal_impulse + 1e-6);
        assert!(contact.tangent_speed > 0.0);
    }

    #[test]
    fn test_heavier_body_moves_less() {
        let mut small = Body::new(Vec2::new(0.0, 0.0), Vec2::ZERO, 10.0);
        let mut large = Body::new(Vec2::new(30.0, 0.0), Vec2::ZERO, 40.0);
        resolve_circles(&mut small, &mut large, PARAMS).unwrap();
        let small_shift = small.position.length();
        let large_shift = (large.position - Vec2::new(30.0, 0.0)).length();
        assert!(small_shift > large_shift);
    }

    #[test]
    fn test_fixed_body_does_not_move() {
        let mut wall = Body::fixed(Vec2::new(0.0, 0.0), 24.0);
        let mut ship_body = Body::new(Vec2::new(30.0, 0.0), Vec2::new(-50.0, 0.0), 16.0);
        resolve_circles(&mut wall, &mut ship_body, PARAMS).unwrap();
        assert_eq!(wall.position, Vec2::ZERO);
        assert!(ship_body.velocity.x > 0.0);
        assert!(ship_body.position.x >= 40.0 - physics::CONTACT_EPSILON);
    }

    #[test]
    fn test_spin_transfer_is_clamped() {
        assert_eq!(spin_from_contact(0.0, 1.0e6), ship::MAX_SPIN);
        assert_eq!(spin_from_contact(0.0, -1.0e6), -ship::MAX_SPIN);
    }

    /// Two rocks touching along x, the second sliding past along y
    fn create_test_rock_pair() -> GameState {
        let mut state = GameState::new(5);
        asteroid::spawn_large(&mut state);
        asteroid::spawn_large(&mut state);
        let gap = state.asteroids[0].radius + state.asteroids[1].radius - 2.0;
        let (first, second) = state.asteroids.split_at_mut(1);
        first[0].position = Vec2::new(400.0, 400.0);
        first[0].velocity = Vec2::new(30.0, 0.0);
        first[0].spin = 0.0;
        second[0].position = Vec2::new(400.0 + gap, 400.0);
        second[0].velocity = Vec2::new(0.0, 40.0);
        second[0].spin = 0.0;
        state
    }

    #[test]
    fn test_rubbing_asteroids_counter_rotate() {
        let mut state = create_test_rock_pair();
        resolve_asteroid_pairs(&mut state, PARAMS);

        let first = state.asteroids[0].spin;
        let second = state.asteroids[1].spin;
        assert!(first != 0.0);
        assert!(first.signum() != second.signum());
        assert!((first + second).abs() < 1e-6);
    }

    #[test]
    fn test_asteroid_spin_scales_with_transfer_constant() {
        let mut state = create_test_rock_pair();
        resolve_asteroid_pairs(&mut state, PARAMS);

        let expected = (40.0 * asteroid_consts::SPIN_TRANSFER).min(asteroid_consts::MAX_SPIN);
        assert!((state.asteroids[0].spin.abs() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_rubbing_ships_counter_rotate() {
        let mut state = GameState::new(9);
        for (n, (x, vy)) in [(300.0f32, 0.0f32), (300.0 + ship::RADIUS * 2.0 - 1.0, 60.0)].into_iter().enumerate() {
            let mut player = Player::new(Uuid::from_u128(n as u128 + 1), PlayerKind::Human, format!("P{n}"), n as u8, n as u64);
            player.ship.respawn(ShipMotion::at(Vec2::new(x, 300.0), 0.0), 0.0);
            player.ship.motion.velocity = Vec2::new(if n == 0 { 20.0 } else { 0.0 }, vy);
            player.ship.motion.angular_velocity = 0.0;
            state.players.push(player);
        }
        resolve_ship_pairs(&mut state, PARAMS);

        let a = state.players[0].ship.motion.angular_velocity;
        let b = state.players[1].ship.motion.angular_velocity;
        assert!(a != 0.0);
        assert_eq!(a, -b);
    }
}
