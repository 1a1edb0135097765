use crate::config::SeedMode;
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// A producer of the bytes handed to the target through the interception API.
///
/// `draw` returns `None` only when the source is finite and has run dry; the
/// random source never does.
pub trait ByteSource: Send {
    fn draw(&mut self) -> Option<u8>;
}

/// Seeded pseudo-random byte generator.
///
/// Backed by ChaCha8, so a given seed yields the same byte stream on every
/// platform and in every process.
#[derive(Debug, Clone)]
pub struct RandomSource {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_mode(mode: &SeedMode) -> Self {
        Self::new(mode.resolve())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_byte(&mut self) -> u8 {
        (self.rng.next_u32() & 0xff) as u8
    }
}

impl ByteSource for RandomSource {
    fn draw(&mut self) -> Option<u8> {
        Some(self.next_byte())
    }
}

/// Sub-second nanoseconds of the realtime clock.
pub fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::from(elapsed.subsec_nanos()))
        .unwrap_or_default()
}

/// Feeds the bytes of a previously captured vector back to the target, in the
/// order they were originally drawn.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    pending: VecDeque<u8>,
}

impl ReplaySource {
    pub fn new(bytes: impl IntoIterator<Item = u8>) -> Self {
        Self {
            pending: bytes.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl ByteSource for ReplaySource {
    fn draw(&mut self) -> Option<u8> {
        self.pending.pop_front()
    }
}
