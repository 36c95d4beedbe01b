//! Asteroid field: spawning, outline generation, splitting and top-up

use std::f32::consts::TAU;

use crate::game::constants::{arena, asteroid::*};
use crate::game::events::{EffectsSink, GameEvent, SoundKind};
use crate::game::state::{Asteroid, AsteroidSize, EntityId, GameState, Outline};
use crate::util::rng::SeededRng;
use crate::util::vec2::Vec2;

/// Minimum distance between a new asteroid and any live ship
const SPAWN_CLEARANCE: f32 = 120.0;
const SPAWN_ATTEMPTS: usize = 8;

/// Random convex outline of `radius`, as a hull of jittered rim points
pub fn generate_outline(rng: &mut SeededRng, radius: f32) -> Outline {
    let count = VERTEX_MIN + rng.below(VERTEX_MAX - VERTEX_MIN + 1);
    let mut points: Outline = (0..count)
        .map(|i| {
            let step = TAU / count as f32;
            let angle = i as f32 * step + rng.range(-0.3, 0.3) * step;
            let rim = radius * (1.0 - JAGGEDNESS * rng.next_f32());
            Vec2::from_angle(angle) * rim
        })
        .collect();
    convex_hull(&mut points)
}

/// Monotone-chain hull, counter-clockwise
fn convex_hull(points: &mut Outline) -> Outline {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    if points.len() < 3 {
        return points.clone();
    }

    let mut hull = Outline::new();
    for &p in points.iter() {
        while hull.len() >= 2 && (hull[hull.len() - 1] - hull[hull.len() - 2]).cross(p - hull[hull.len() - 2]) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in points.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && (hull[hull.len() - 1] - hull[hull.len() - 2]).cross(p - hull[hull.len() - 2]) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

fn random_radius(rng: &mut SeededRng, size: AsteroidSize) -> f32 {
    match size {
        AsteroidSize::Large => rng.range(LARGE_RADIUS_MIN, LARGE_RADIUS_MAX),
        AsteroidSize::Small => rng.range(SMALL_RADIUS_MIN, SMALL_RADIUS_MAX),
    }
}

/// Build an asteroid, drawing every random value from the asteroid stream
pub fn make_asteroid(
    state: &mut GameState,
    size: AsteroidSize,
    position: Vec2,
    velocity: Vec2,
) -> Asteroid {
    let id = state.next_entity_id();
    let rng = &mut state.rng.asteroids;
    let radius = random_radius(rng, size);
    let outline = generate_outline(rng, radius);
    Asteroid {
        id,
        position,
        velocity,
        angle: rng.range(-std::f32::consts::PI, std::f32::consts::PI),
        spin: rng.range(-MAX_SPIN, MAX_SPIN),
        size,
        radius,
        outline,
        alive: true,
    }
}

/// Spawn one large asteroid at a random clear spot
pub fn spawn_large(state: &mut GameState) -> EntityId {
    let margin = LARGE_RADIUS_MAX;
    let mut position = Vec2::ZERO;
    for _ in 0..SPAWN_ATTEMPTS {
        let rng = &mut state.rng.asteroids;
        position = Vec2::new(
            rng.range(margin, arena::WIDTH - margin),
            rng.range(margin, arena::HEIGHT - margin),
        );
        let clear = state
            .players
            .iter()
            .filter(|p| p.has_live_ship())
            .all(|p| p.ship.motion.position.distance_to(position) >= SPAWN_CLEARANCE);
        if clear {
            break;
        }
    }

    let rng = &mut state.rng.asteroids;
    let heading = rng.range(0.0, TAU);
    let speed = rng.range(SPEED_MIN, SPEED_MAX);
    let asteroid = make_asteroid(state, AsteroidSize::Large, position, Vec2::from_angle(heading) * speed);
    let id = asteroid.id;
    state.asteroids.push(asteroid);
    id
}

/// Initial field for a new round
pub fn spawn_field(state: &mut GameState, count: usize) {
    for _ in 0..count {
        spawn_large(state);
    }
    state.asteroid_target = count;
    state.last_asteroid_spawn_at = state.now_ms;
}

/// Fragments a destroyed asteroid of `size` breaks into
pub fn split_fragments(size: AsteroidSize) -> usize {
    match size {
        AsteroidSize::Large => SPLIT_COUNT,
        AsteroidSize::Small => 0,
    }
}

/// Destroy the asteroid at `index`, spawning fragments for large ones.
///
/// Fragments fan out around the parent's heading so their summed momentum
/// keeps the parent's direction.
pub fn destroy(state: &mut GameState, index: usize, fx: &mut impl EffectsSink) {
    let Some(parent) = state.asteroids.get_mut(index) else {
        return;
    };
    if !parent.alive {
        return;
    }
    parent.alive = false;
    let (position, velocity, angle, size) = (parent.position, parent.velocity, parent.angle, parent.size);

    fx.emit(GameEvent::sound(SoundKind::AsteroidBreak, None));

    let count = split_fragments(size);
    if count == 0 {
        return;
    }

    let (direction, speed) = velocity.normalize_with_length();
    let heading = if speed > f32::EPSILON { direction.angle() } else { angle };
    let fragment_speed = speed.max(SPEED_MIN) * SPLIT_SPEED_BOOST;

    for i in 0..count {
        let t = if count > 1 {
            i as f32 / (count - 1) as f32 * 2.0 - 1.0
        } else {
            0.0
        };
        let dir = Vec2::from_angle(heading + t * SPLIT_SPREAD);
        let offset = dir.perpendicular() * (t * SMALL_RADIUS_MAX);
        let fragment = make_asteroid(state, AsteroidSize::Small, position + offset, dir * fragment_speed);
        state.asteroids.push(fragment);
    }
}

/// Keep the field topped up during a round
pub fn top_up(state: &mut GameState) {
    let alive = state.asteroids.iter().filter(|a| a.alive).count();
    if alive >= state.asteroid_target {
        return;
    }
    if state.now_ms - state.last_asteroid_spawn_at < RESPAWN_INTERVAL_MS {
        return;
    }
    spawn_large(state);
    state.last_asteroid_spawn_at = state.now_ms;
}

/// Index of the first live asteroid overlapping a circle
pub fn first_overlapping(state: &GameState, point: Vec2, radius: f32) -> Option<usize> {
    state
        .asteroids
        .iter()
        .position(|a| a.alive && a.position.distance_to(point) <= a.radius + radius)
}
