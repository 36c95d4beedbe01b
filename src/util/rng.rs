//! Deterministic seeded random streams.
//!
//! Every source of randomness in a round draws from one of four named
//! xorshift32 streams. Given the same base seed and the same call sequence,
//! all derived randomness is reproducible.

use serde::{Deserialize, Serialize};

/// xorshift32 generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    /// Seed 0 would lock xorshift at zero forever, so it is remapped.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        // 24 high bits keep the result strictly below 1.0
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform float in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform integer in [0, max)
    pub fn below(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        ((self.next_u32() as u64 * max as u64) >> 32) as u32
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.below(items.len() as u32) as usize)
        }
    }
}

/// Which logical stream a draw belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngStream {
    Asteroids,
    PowerUps,
    Ai,
    EntityIds,
}

impl RngStream {
    fn salt(self) -> u32 {
        match self {
            RngStream::Asteroids => 0xA5_7E_01_D5,
            RngStream::PowerUps => 0x90_3E_0B_5A,
            RngStream::Ai => 0x0B_07_A1_11,
            RngStream::EntityIds => 0x1D_5E_ED_77,
        }
    }
}

/// The four per-room streams, reseeded together at the start of each round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngStreams {
    base_seed: u32,
    pub asteroids: SeededRng,
    pub power_ups: SeededRng,
    pub ai: SeededRng,
    pub entity_ids: SeededRng,
}

impl RngStreams {
    pub fn new(base_seed: u32) -> Self {
        let derive = |stream: RngStream| SeededRng::new(base_seed ^ stream.salt());
        Self {
            base_seed,
            asteroids: derive(RngStream::Asteroids),
            power_ups: derive(RngStream::PowerUps),
            ai: derive(RngStream::Ai),
            entity_ids: derive(RngStream::EntityIds),
        }
    }

    pub fn base_seed(&self) -> u32 {
        self.base_seed
    }

    pub fn reseed(&mut self, base_seed: u32) {
        *self = Self::new(base_seed);
    }

    pub fn stream(&mut self, stream: RngStream) -> &mut SeededRng {
        match stream {
            RngStream::Asteroids => &mut self.asteroids,
            RngStream::PowerUps => &mut self.power_ups,
            RngStream::Ai => &mut self.ai,
            RngStream::EntityIds => &mut self.entity_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededRng::new(1234);
        let mut b = SeededRng::new(1234);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_zero_seed_is_not_degenerate() {
        let mut rng = SeededRng::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_float_range() {
        let mut rng = SeededRng::new(42);
        for _ in 0..1000 {
            let f = rng.next_f32();
            assert!((0.0..1.0).contains(&f));
            let r = rng.range(-5.0, 5.0);
            assert!((-5.0..5.0).contains(&r));
            assert!(rng.below(7) < 7);
        }
    }

    #[test]
    fn test_streams_are_independent() {
        let mut streams = RngStreams::new(99);
        let first_asteroid = streams.asteroids.next_u32();

        // Draining another stream must not move the asteroid stream
        let mut other = RngStreams::new(99);
        for _ in 0..50 {
            other.ai.next_u32();
        }
        assert_eq!(other.asteroids.next_u32(), first_asteroid);
        assert_ne!(streams.asteroids.state(), streams.power_ups.state());
    }

    #[test]
    fn test_reseed_restores_sequence() {
        let mut streams = RngStreams::new(7);
        let expected = streams.stream(RngStream::PowerUps).next_u32();
        streams.stream(RngStream::PowerUps).next_u32();

        streams.reseed(7);
        assert_eq!(streams.power_ups.next_u32(), expected);
        assert_eq!(streams.base_seed(), 7);
    }
}
