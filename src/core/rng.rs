//! Game Randomness
//!
//! Every probabilistic decision in the engine (golden rolls, spawn windows,
//! jams, hit rolls, accident victims, loot) draws through the [`Dice`] trait.
//! Production code uses [`GameRng`], an Xorshift128+ generator; tests script
//! the exact draws they need.

use sha2::{Digest, Sha256};

/// Source of random draws used by the game rules.
///
/// Only [`Dice::unit`] and [`Dice::int_inclusive`] must be provided; the rest
/// derive from them so a scripted implementation controls every outcome.
pub trait Dice: Send {
    /// Uniform real in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform integer in `[lo, hi]`. Returns `lo` when `hi <= lo`.
    fn int_inclusive(&mut self, lo: i64, hi: i64) -> i64;

    /// Uniform real in `[lo, hi)`. Returns `lo` when the range is empty.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.unit()
    }

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Uniform index into a collection of `len` elements.
    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.int_inclusive(0, len as i64 - 1) as usize
    }
}

/// Xorshift128+ generator.
///
/// Seeded through SplitMix64 so that weak seeds still spread over the whole
/// state space.
#[derive(Clone, Debug)]
pub struct GameRng {
    state: [u64; 2],
}

impl Default for GameRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl GameRng {
    /// Create a generator from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create a generator seeded from the wall clock and a process-unique id.
    pub fn from_entropy() -> Self {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        let salt = uuid::Uuid::new_v4();
        Self::new(derive_seed(&nanos.to_le_bytes(), salt.as_bytes()))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }
}

impl Dice for GameRng {
    #[inline]
    fn unit(&mut self) -> f64 {
        // 53 random mantissa bits
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    #[inline]
    fn int_inclusive(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo) as u64 + 1;
        lo + (self.next_u64() % span) as i64
    }
}

/// SplitMix64 for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a 64-bit seed from arbitrary entropy inputs.
pub fn derive_seed(time_entropy: &[u8], salt: &[u8]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"DUCKHUNT_SEED_V1");
    hasher.update(time_entropy);
    hasher.update(salt);
    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// SCRIPTED DICE (tests)
// =============================================================================

/// Dice that replay queued draws, for pinning exact outcomes in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedDice {
    units: std::collections::VecDeque<f64>,
    ints: std::collections::VecDeque<i64>,
}

#[cfg(test)]
impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue unit draws (also consumed by `uniform` and `chance`).
    pub fn units(mut self, draws: &[f64]) -> Self {
        self.units.extend(draws.iter().copied());
        self
    }

    /// Queue integer draws (also consumed by `index`).
    pub fn ints(mut self, draws: &[i64]) -> Self {
        self.ints.extend(draws.iter().copied());
        self
    }

    pub fn push_unit(&mut self, draw: f64) {
        self.units.push_back(draw);
    }

    pub fn push_int(&mut self, draw: i64) {
        self.ints.push_back(draw);
    }

    pub fn is_drained(&self) -> bool {
        self.units.is_empty() && self.ints.is_empty()
    }
}

#[cfg(test)]
impl Dice for ScriptedDice {
    fn unit(&mut self) -> f64 {
        self.units.pop_front().expect("scripted dice ran out of unit draws")
    }

    fn int_inclusive(&mut self, lo: i64, hi: i64) -> i64 {
        let draw = self.ints.pop_front().expect("scripted dice ran out of int draws");
        assert!(
            draw >= lo && draw <= hi.max(lo),
            "scripted int {} outside [{}, {}]",
            draw,
            lo,
            hi
        );
        draw
    }
}

// =============================================================================
// TESTS
// =============================================================================
