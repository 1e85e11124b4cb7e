//! Injectable randomness.
//!
//! Every random draw in the simulator goes through [`RandomSource`] so a
//! run can be replayed from a seed, and tests can script exact outcomes.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::VecDeque;
use uuid::{Builder, Uuid};

/// Source of uniform random values.
pub trait RandomSource {
    /// Uniform in `[0, 1)`
    fn next_f64(&mut self) -> f64;

    fn next_u64(&mut self) -> u64;

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform integer in `low..=high`.
    fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        let span = f64::from(high - low + 1);
        let offset = (self.next_f64() * span) as u32;
        low + offset.min(high - low)
    }

    /// Uniform in `[-half_width, half_width)`.
    fn spread(&mut self, half_width: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * half_width
    }

    /// Uniform index into a collection of `len` items.
    fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = (self.next_f64() * len as f64) as usize;
        Some(index.min(len - 1))
    }

    /// Version 4 UUID built from this source.
    fn uuid(&mut self) -> Uuid {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.next_u64().to_le_bytes());
        bytes[8..].copy_from_slice(&self.next_u64().to_le_bytes());
        Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Seedable pseudo-random source.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// Replays a fixed list of values, then repeats a fallback.
///
/// With the default fallback of `0.999` no probabilistic event fires once
/// the script runs out.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    fallback: f64,
    counter: u64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: 0.999,
            counter: 0,
        }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new([]).with_fallback(value)
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }

    fn next_u64(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }
}
