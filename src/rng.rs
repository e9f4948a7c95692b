use rand_core::{Error, RngCore};
use std::time::{SystemTime, UNIX_EPOCH};

// --- Pseudo-Random Number Generator (Hand-rolled) ---
// Algorithm: xoshiro256** (StarStar)
// Reference: https://prng.di.unimi.it/

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// Root seed used when the caller does not supply one.
pub const DEFAULT_ROOT_SEED: u64 = 123_456_789;

#[inline]
fn splitmix64(s: &mut u64) -> u64 {
    *s = s.wrapping_add(GOLDEN_GAMMA);
    let mut z = *s;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

#[derive(Clone, Debug)]
pub struct Rng {
    state: [u64; 4],
}

impl Rng {
    pub fn from_seed(mut seed: u64) -> Self {
        // SplitMix64 expands one 64-bit seed into the four xoshiro words.
        Rng {
            state: [
                splitmix64(&mut seed),
                splitmix64(&mut seed),
                splitmix64(&mut seed),
                splitmix64(&mut seed),
            ],
        }
    }

    pub fn from_entropy() -> Self {
        // Time alone is predictable; mix in a heap address (ASLR).
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let heap_var = Box::new(0u8);
        let ptr_val = &*heap_var as *const u8 as u64;
        Self::from_seed(nanos ^ ptr_val)
    }

    /// Derives an independent generator, leaving `self` advanced by one step.
    pub fn split(&mut self) -> Rng {
        Rng::from_seed(self.next_u64())
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let result = self.state[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);

        let t = self.state[1] << 17;

        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];

        self.state[2] ^= t;

        self.state[3] = self.state[3].rotate_left(45);

        result
    }

    // (u64 >> 11) * 2^-53, in [0.0, 1.0)
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) * (1.0 / 9007199254740992.0)
    }
}

impl RngCore for Rng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        Rng::next_u64(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut i = 0;
        while i < dest.len() {
            let bytes = Rng::next_u64(self).to_le_bytes();
            let n = std::cmp::min(dest.len() - i, 8);
            dest[i..i + n].copy_from_slice(&bytes[..n]);
            i += n;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Uniform randomness consumed by the draw engine.
///
/// Implemented for every `RngCore`, so any rand-ecosystem generator can be
/// injected in place of [`Rng`].
pub trait UniformSource {
    /// Uniform float in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Uniform integer in `[0, range)`. `range` must be non-zero.
    fn below(&mut self, range: u64) -> u64;
}

impl<R: RngCore + ?Sized> UniformSource for R {
    #[inline]
    fn uniform(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64) * (1.0 / 9007199254740992.0)
    }

    // Rejection sampling, no modulo bias.
    // https://lemire.me/blog/2019/06/06/nearly-divisionless-random-integer-generation-on-various-systems/
    fn below(&mut self, range: u64) -> u64 {
        debug_assert!(range > 0);
        let threshold = (0u64.wrapping_sub(range)) % range;
        loop {
            let x = self.next_u64();
            if x >= threshold {
                return x % range;
            }
        }
    }
}

/// Splittable seed sequence: child `i` gets its own well-mixed 64-bit seed
/// derived only from `(root, i)`, so trials can run in any order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedSequence {
    root: u64,
}

impl SeedSequence {
    pub fn new(root: u64) -> Self {
        // Pre-mix so that nearby roots do not yield overlapping child streams.
        let mut s = root;
        SeedSequence {
            root: splitmix64(&mut s),
        }
    }

    pub fn spawn(&self, index: u64) -> u64 {
        let mut s = self.root ^ index.wrapping_mul(GOLDEN_GAMMA).rotate_left(17);
        splitmix64(&mut s)
    }

    pub fn rng(&self, index: u64) -> Rng {
        Rng::from_seed(self.spawn(index))
    }
}
