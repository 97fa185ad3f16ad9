//! Injectable entropy source.
//!
//! Randomness is an external collaborator: the engine never reaches for a
//! global RNG directly, so callers can swap in a seeded source and get
//! reproducible, deterministic runs in tests.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Uniform draws the policies need: `[0, 1)` reals and `[0, k)` integers.
pub trait EntropySource {
    fn next_f64(&mut self) -> f64;
    fn next_index(&mut self, bound: usize) -> usize;
}

/// `rand`-backed entropy source seeded from the OS's default source.
pub struct ThreadEntropy(rand::rngs::ThreadRng);

impl Default for ThreadEntropy {
    fn default() -> Self {
        Self(rand::thread_rng())
    }
}

impl EntropySource for ThreadEntropy {
    fn next_f64(&mut self) -> f64 {
        self.0.gen()
    }

    fn next_index(&mut self, bound: usize) -> usize {
        self.0.gen_range(0..bound)
    }
}

/// Deterministic entropy source for reproducible tests.
#[derive(Clone)]
pub struct SeededEntropy(StdRng);

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl EntropySource for SeededEntropy {
    fn next_f64(&mut self) -> f64 {
        self.0.gen()
    }

    fn next_index(&mut self, bound: usize) -> usize {
        self.0.gen_range(0..bound)
    }
}
