//! Cross-system behaviour on hand-built states

use ship_arena_server::game::constants::{asteroid as asteroid_consts, physics, ship};
use ship_arena_server::game::error::GameError;
use ship_arena_server::game::events::GameEvent;
use ship_arena_server::game::state::{AsteroidSize, GameState, Player, PlayerId, PlayerKind, PowerUpKind, ShipMotion};
use ship_arena_server::game::systems::collision::{resolve_circles, Body, ContactParams};
use ship_arena_server::game::systems::lifecycle::{self, HitOutcome};
use ship_arena_server::game::systems::{asteroid, powerup, projectile};
use ship_arena_server::util::rng::SeededRng;
use ship_arena_server::util::vec2::Vec2;
use uuid::Uuid;

fn id(n: u128) -> PlayerId {
    Uuid::from_u128(n)
}

/// Two live, no longer invulnerable ships facing right
fn create_test_state() -> GameState {
    let mut state = GameState::new(17);
    for (i, x) in [300.0f32, 900.0].into_iter().enumerate() {
        let mut player = Player::new(id(i as u128 + 1), PlayerKind::Human, format!("P{i}"), i as u8, i as u64);
        player.ship.respawn(ShipMotion::at(Vec2::new(x, 400.0), 0.0), -10_000.0);
        state.players.push(player);
    }
    state
}

#[test]
fn test_contacts_never_leave_bodies_overlapping() {
    let mut rng = SeededRng::new(2024);
    let params = ContactParams {
        restitution: 0.6,
        friction: 0.15,
    };

    for _ in 0..500 {
        let ra = rng.range(8.0, 44.0);
        let rb = rng.range(8.0, 44.0);
        let pa = Vec2::new(rng.range(0.0, 100.0), rng.range(0.0, 100.0));
        let offset = Vec2::from_angle(rng.range(0.0, std::f32::consts::TAU)) * rng.range(0.0, ra + rb);
        let mut a = Body::new(pa, Vec2::new(rng.range(-200.0, 200.0), rng.range(-200.0, 200.0)), ra);
        let mut b = Body::new(pa + offset, Vec2::new(rng.range(-200.0, 200.0), rng.range(-200.0, 200.0)), rb);

        if resolve_circles(&mut a, &mut b, params).is_some() {
            let gap = a.position.distance_to(b.position) - (ra + rb);
            assert!(gap >= -physics::CONTACT_EPSILON * (ra + rb), "residual overlap {}", -gap);
        }
    }
}

#[test]
fn test_fixed_body_does_not_move() {
    let params = ContactParams {
        restitution: 1.0,
        friction: 0.0,
    };
    let mut wall = Body::fixed(Vec2::new(600.0, 400.0), 24.0);
    let mut ship_body = Body::new(Vec2::new(630.0, 400.0), Vec2::new(-100.0, 0.0), ship::RADIUS);

    resolve_circles(&mut wall, &mut ship_body, params).unwrap();
    assert_eq!(wall.position, Vec2::new(600.0, 400.0));
    assert_eq!(wall.velocity, Vec2::ZERO);
    assert!(ship_body.velocity.x > 0.0);
    assert!((ship_body.velocity.x - 100.0).abs() < 1e-3);
}

#[test]
fn test_elastic_head_on_swaps_velocities() {
    let params = ContactParams {
        restitution: 1.0,
        friction: 0.0,
    };
    let mut a = Body::new(Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0), ship::RADIUS);
    let mut b = Body::new(Vec2::new(30.0, 0.0), Vec2::new(-50.0, 0.0), ship::RADIUS);

    resolve_circles(&mut a, &mut b, params).unwrap();
    assert!(a.velocity.approx_eq(Vec2::new(-50.0, 0.0), 1e-3));
    assert!(b.velocity.approx_eq(Vec2::new(50.0, 0.0), 1e-3));
}

#[test]
fn test_ammo_drains_then_reloads_one_at_a_time() {
    let mut state = create_test_state();
    let mut fx: Vec<GameEvent> = Vec::new();

    assert!(projectile::fire_primary(&mut state, 0, &mut fx).is_some());
    state.now_ms = ship::FIRE_COOLDOWN_MS / 2.0;
    assert!(projectile::fire_primary(&mut state, 0, &mut fx).is_none(), "cooldown");
    state.now_ms = ship::FIRE_COOLDOWN_MS;
    assert!(projectile::fire_primary(&mut state, 0, &mut fx).is_some());
    state.now_ms = ship::FIRE_COOLDOWN_MS * 2.0;
    assert!(projectile::fire_primary(&mut state, 0, &mut fx).is_some());
    assert_eq!(state.players[0].ship.ammo, 0);

    state.now_ms = ship::FIRE_COOLDOWN_MS * 3.0;
    assert!(projectile::fire_primary(&mut state, 0, &mut fx).is_none(), "empty");
    assert_eq!(state.projectiles.len(), 3);

    // Reload runs from the first shot that left the magazine full
    state.now_ms = ship::RELOAD_MS;
    projectile::update_reload(&mut state);
    assert_eq!(state.players[0].ship.ammo, 1);
    state.now_ms = ship::RELOAD_MS * 2.0 - 1.0;
    projectile::update_reload(&mut state);
    assert_eq!(state.players[0].ship.ammo, 1);
    state.now_ms = ship::RELOAD_MS * 3.0;
    projectile::update_reload(&mut state);
    assert_eq!(state.players[0].ship.ammo, 3);
    assert_eq!(state.players[0].ship.reload_started_at, None);
}

#[test]
fn test_large_asteroid_splits_small_does_not() {
    let mut state = create_test_state();
    let mut fx: Vec<GameEvent> = Vec::new();
    asteroid::spawn_large(&mut state);
    let parent = state.asteroids[0].clone();

    asteroid::destroy(&mut state, 0, &mut fx);
    let fragments: Vec<_> = state.asteroids.iter().filter(|a| a.alive).cloned().collect();
    assert_eq!(fragments.len(), asteroid_consts::SPLIT_COUNT);
    for fragment in &fragments {
        assert_eq!(fragment.size, AsteroidSize::Small);
        assert!(fragment.radius >= asteroid_consts::SMALL_RADIUS_MIN);
        assert!(fragment.radius <= asteroid_consts::SMALL_RADIUS_MAX);
        assert!(fragment.position.distance_to(parent.position) <= parent.radius);
    }

    // Fragments keep travelling the parent's way
    let total = fragments.iter().fold(Vec2::ZERO, |acc, f| acc + f.velocity);
    assert!(total.normalize().dot(parent.velocity.normalize()) > 0.9);

    let small = state.asteroids.iter().position(|a| a.alive).unwrap();
    let before = state.asteroids.len();
    asteroid::destroy(&mut state, small, &mut fx);
    assert_eq!(state.asteroids.len(), before);
    assert!(!state.asteroids[small].alive);
}

#[test]
fn test_one_power_up_at_a_time() {
    let mut state = create_test_state();
    let mut fx: Vec<GameEvent> = Vec::new();

    powerup::grant(&mut state, id(1), PowerUpKind::Laser, &mut fx).unwrap();
    assert_eq!(
        powerup::grant(&mut state, id(1), PowerUpKind::Shield, &mut fx),
        Err(GameError::PowerUpOccupied)
    );
    assert_eq!(state.players[0].power_up.map(|p| p.kind()), Some(PowerUpKind::Laser));

    // Reverse is instant and lands on everyone else
    powerup::grant(&mut state, id(1), PowerUpKind::Reverse, &mut fx).unwrap();
    assert_eq!(state.players[0].power_up.map(|p| p.kind()), Some(PowerUpKind::Laser));
    assert_eq!(state.players[0].reversed_until, 0.0);
    assert!(state.players[1].reversed_until > state.now_ms);
}

#[test]
fn test_shield_absorbs_then_breaks() {
    let mut state = create_test_state();
    let mut fx: Vec<GameEvent> = Vec::new();
    powerup::grant(&mut state, id(2), PowerUpKind::Shield, &mut fx).unwrap();

    assert_eq!(lifecycle::hit_ship(&mut state, id(2), Some(id(1)), true, &mut fx), HitOutcome::Absorbed);
    assert_eq!(lifecycle::hit_ship(&mut state, id(2), Some(id(1)), true, &mut fx), HitOutcome::Absorbed);
    assert!(state.players[1].power_up.is_none());
    assert_eq!(lifecycle::hit_ship(&mut state, id(2), Some(id(1)), true, &mut fx), HitOutcome::Destroyed);
    assert!(state.pilot_of(id(2)).is_some());
    assert_eq!(state.players[0].kills, 1);
}

#[test]
fn test_unshieldable_hit_ignores_shield() {
    let mut state = create_test_state();
    let mut fx: Vec<GameEvent> = Vec::new();
    powerup::grant(&mut state, id(2), PowerUpKind::Shield, &mut fx).unwrap();

    assert_eq!(lifecycle::hit_ship(&mut state, id(2), Some(id(1)), false, &mut fx), HitOutcome::Destroyed);
}

#[test]
fn test_invulnerable_ship_ignores_hits() {
    let mut state = create_test_state();
    let mut fx: Vec<GameEvent> = Vec::new();
    let now = state.now_ms;
    state.players[1].ship.respawn(ShipMotion::at(Vec2::new(900.0, 400.0), 0.0), now);

    assert_eq!(lifecycle::hit_ship(&mut state, id(2), Some(id(1)), true, &mut fx), HitOutcome::Ignored);
    assert!(state.players[1].has_live_ship());
}
