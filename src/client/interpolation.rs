//! Snapshot interpolation buffer
//!
//! Remote entities are drawn slightly in the past so there are usually two
//! snapshots to blend between. The lag grows with measured arrival jitter.
//! When the render cursor outruns the newest snapshot, entities coast on
//! their last velocity for a bounded window, then hold.

use std::collections::VecDeque;

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

use crate::game::state::{EntityId, PlayerId};
use crate::net::protocol::GameSnapshot;
use crate::util::vec2::{lerp_angle, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationConfig {
    /// Frames kept
    pub capacity: usize,
    pub base_delay_ms: f64,
    /// Delay added per millisecond of smoothed jitter
    pub jitter_multiplier: f64,
    pub min_delay_ms: f64,
    pub max_delay_ms: f64,
    /// EMA weight of each new jitter sample
    pub jitter_smoothing: f64,
    pub max_extrapolation_ms: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            base_delay_ms: 50.0,
            jitter_multiplier: 2.0,
            min_delay_ms: 35.0,
            max_delay_ms: 250.0,
            jitter_smoothing: 0.1,
            max_extrapolation_ms: 120.0,
        }
    }
}

/// Stable identity of an interpolated entity across frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Ship(PlayerId),
    Pilot(PlayerId),
    Projectile(EntityId),
    Asteroid(EntityId),
    PowerUp(EntityId),
    Missile(EntityId),
    TurretBullet(EntityId),
}

/// Render-ready pose of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderEntity {
    pub key: EntityKey,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub alive: bool,
    /// 1.0 opaque; below 1 while fading in or out at a frame boundary
    pub alpha: f32,
}

/// Interpolated view at one render cursor
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    /// Authority time being shown
    pub cursor_ms: f64,
    /// How far past the newest snapshot entities were projected
    pub extrapolated_ms: f64,
    pub entities: Vec<RenderEntity>,
}

impl RenderFrame {
    pub fn get(&self, key: EntityKey) -> Option<&RenderEntity> {
        self.entities.iter().find(|e| e.key == key)
    }
}

/// Flatten every moving entity in a snapshot, skipping `excluded`'s ship
pub fn render_entities(snapshot: &GameSnapshot, excluded: Option<PlayerId>) -> Vec<RenderEntity> {
    let entity = |key, position, velocity, angle, alive| RenderEntity {
        key,
        position,
        velocity,
        angle,
        alive,
        alpha: 1.0,
    };

    let mut out = Vec::with_capacity(
        snapshot.ships.len()
            + snapshot.pilots.len()
            + snapshot.projectiles.len()
            + snapshot.asteroids.len()
            + snapshot.power_ups.len()
            + snapshot.missiles.len()
            + snapshot.turret_bullets.len(),
    );

    out.extend(
        snapshot
            .ships
            .iter()
            .filter(|s| Some(s.player_id) != excluded)
            .map(|s| entity(EntityKey::Ship(s.player_id), s.position, s.velocity, s.angle, s.alive)),
    );
    out.extend(
        snapshot
            .pilots
            .iter()
            .map(|p| entity(EntityKey::Pilot(p.player_id), p.position, p.velocity, p.angle, p.alive)),
    );
    out.extend(
        snapshot
            .projectiles
            .iter()
            .map(|p| entity(EntityKey::Projectile(p.id), p.position, p.velocity, p.velocity.angle(), true)),
    );
    out.extend(
        snapshot
            .asteroids
            .iter()
            .map(|a| entity(EntityKey::Asteroid(a.id), a.position, a.velocity, a.angle, true)),
    );
    out.extend(
        snapshot
            .power_ups
            .iter()
            .map(|p| entity(EntityKey::PowerUp(p.id), p.position, p.velocity, 0.0, true)),
    );
    out.extend(
        snapshot
            .missiles
            .iter()
            .map(|m| entity(EntityKey::Missile(m.id), m.position, m.velocity, m.angle, true)),
    );
    out.extend(
        snapshot
            .turret_bullets
            .iter()
            .map(|b| entity(EntityKey::TurretBullet(b.id), b.position, b.velocity, b.velocity.angle(), true)),
    );
    out
}

struct Frame {
    host_time_ms: f64,
    snapshot: GameSnapshot,
}

pub struct SnapshotBuffer {
    config: InterpolationConfig,
    frames: VecDeque<Frame>,
    /// Smoothed |arrival interval - authority interval|
    jitter_ms: f64,
    /// Smoothed authority time minus local arrival time
    clock_offset_ms: Option<f64>,
    last_arrival_ms: Option<f64>,
    excluded: Option<PlayerId>,
}

impl SnapshotBuffer {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            frames: VecDeque::with_capacity(config.capacity),
            jitter_ms: 0.0,
            clock_offset_ms: None,
            last_arrival_ms: None,
            excluded: None,
        }
    }

    /// Ship drawn by the predictor instead of this buffer
    pub fn set_excluded(&mut self, excluded: Option<PlayerId>) {
        self.excluded = excluded;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ms
    }

    pub fn latest(&self) -> Option<&GameSnapshot> {
        self.frames.back().map(|f| &f.snapshot)
    }

    /// Current interpolation delay
    pub fn delay_ms(&self) -> f64 {
        (self.config.base_delay_ms + self.jitter_ms * self.config.jitter_multiplier)
            .clamp(self.config.min_delay_ms, self.config.max_delay_ms)
    }

    /// Authority time estimated for local time `now_ms`
    pub fn authority_time_ms(&self, now_ms: f64) -> Option<f64> {
        self.clock_offset_ms.map(|offset| now_ms + offset)
    }

    /// Store a snapshot received at local time `arrival_ms`. Stale or
    /// duplicate ticks are ignored.
    pub fn push(&mut self, snapshot: GameSnapshot, arrival_ms: f64) -> bool {
        let host_time_ms = snapshot.host_time_ms();
        let previous_host_time = match self.frames.back() {
            Some(newest) if snapshot.host_tick <= newest.snapshot.host_tick => return false,
            Some(newest) => Some(newest.host_time_ms),
            None => None,
        };

        let alpha = self.config.jitter_smoothing;
        if let (Some(last_arrival), Some(last_host)) = (self.last_arrival_ms, previous_host_time) {
            let deviation = ((arrival_ms - last_arrival) - (host_time_ms - last_host)).abs();
            self.jitter_ms += alpha * (deviation - self.jitter_ms);
        }
        self.last_arrival_ms = Some(arrival_ms);

        let offset = host_time_ms - arrival_ms;
        self.clock_offset_ms = Some(match self.clock_offset_ms {
            Some(current) => current + alpha * (offset - current),
            None => offset,
        });

        if self.frames.len() >= self.config.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(Frame { host_time_ms, snapshot });
        true
    }

    /// Interpolated view for local time `now_ms`
    pub fn sample(&self, now_ms: f64) -> Option<RenderFrame> {
        let cursor = self.authority_time_ms(now_ms)? - self.delay_ms();
        self.sample_at(cursor)
    }

    /// Interpolated view at an explicit authority time
    pub fn sample_at(&self, cursor_ms: f64) -> Option<RenderFrame> {
        let oldest = self.frames.front()?;
        let newest = self.frames.back()?;

        if cursor_ms <= oldest.host_time_ms {
            return Some(RenderFrame {
                cursor_ms,
                extrapolated_ms: 0.0,
                entities: render_entities(&oldest.snapshot, self.excluded),
            });
        }

        if cursor_ms >= newest.host_time_ms {
            let ahead = (cursor_ms - newest.host_time_ms).min(self.config.max_extrapolation_ms);
            let seconds = (ahead / 1000.0) as f32;
            let entities = render_entities(&newest.snapshot, self.excluded)
                .into_iter()
                .map(|mut e| {
                    if e.alive {
                        e.position += e.velocity * seconds;
                    }
                    e
                })
                .collect();
            return Some(RenderFrame {
                cursor_ms,
                extrapolated_ms: ahead,
                entities,
            });
        }

        // Bracketing pair: older.time <= cursor < newer.time
        let newer_index = self.frames.iter().position(|f| f.host_time_ms > cursor_ms)?;
        let older = &self.frames[newer_index - 1];
        let newer = &self.frames[newer_index];
        let span = newer.host_time_ms - older.host_time_ms;
        let t = if span > 0.0 {
            ((cursor_ms - older.host_time_ms) / span) as f32
        } else {
            1.0
        };

        Some(RenderFrame {
            cursor_ms,
            extrapolated_ms: 0.0,
            entities: blend_frames(&older.snapshot, &newer.snapshot, t, self.excluded),
        })
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(InterpolationConfig::default())
    }
}

/// Per-entity blend of two bracketing snapshots at fraction `t`
fn blend_frames(older: &GameSnapshot, newer: &GameSnapshot, t: f32, excluded: Option<PlayerId>) -> Vec<RenderEntity> {
    let old_entities = render_entities(older, excluded);
    let new_entities = render_entities(newer, excluded);

    let mut by_key: HashMap<EntityKey, RenderEntity, FxBuildHasher> =
        HashMap::with_capacity_and_hasher(old_entities.len(), FxBuildHasher);
    by_key.extend(old_entities.iter().map(|e| (e.key, *e)));

    let mut out = Vec::with_capacity(new_entities.len() + old_entities.len());
    for new in &new_entities {
        let blended = match by_key.remove(&new.key) {
            // Respawn or death in between: no slide across the arena
            Some(old) if old.alive != new.alive => *new,
            Some(old) => RenderEntity {
                key: new.key,
                position: old.position.lerp(new.position, t),
                velocity: old.velocity.lerp(new.velocity, t),
                angle: lerp_angle(old.angle, new.angle, t),
                alive: new.alive,
                alpha: 1.0,
            },
            // Appears at its first known position
            None => RenderEntity { alpha: t, ..*new },
        };
        out.push(blended);
    }

    // Gone in the newer frame: fade where it was last seen
    out.extend(
        old_entities
            .iter()
            .filter(|e| by_key.contains_key(&e.key))
            .map(|e| RenderEntity { alpha: 1.0 - t, ..*e }),
    );
    out
}
