// Deterministic, seedable pseudo-random number generator for exercise generation.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// The generator is hand-rolled so that a given seed produces the same
// practice material on every platform and compiler version.
//
// Every random decision in `sightread_music` (pattern choice, scale-step walk
// direction, chord choice, random key resolution) draws from a `PracticeRng`
// that the caller owns and passes in explicitly. Nothing in the engine reaches
// for an ambient/global random source, so tests can pin a seed and replay the
// exact same measures.
//
// **Critical constraint: determinism.** Every method must produce identical
// output given the same prior state. Do not introduce floating-point
// arithmetic into the core generator, and do not consult any other source of
// entropy from here.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG, the engine's sole source of randomness.
///
/// A practice session owns exactly one of these alongside its music stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PracticeRng {
    s: [u64; 4],
}

impl PracticeRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two instances created with the same seed produce identical sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Seed from the system clock. Only the CLI uses this when no `--seed`
    /// is given; library code always receives a caller-owned generator.
    pub fn from_time() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(nanos)
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range; // = (2^64 - range) % range
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Generate a uniform random `usize` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Generate a uniform random `usize` in `[low, high]`.
    ///
    /// Panics if `low > high`.
    pub fn range_usize_inclusive(&mut self, low: usize, high: usize) -> usize {
        assert!(low <= high, "range_usize_inclusive: low must be <= high");
        self.range_u64(low as u64, high as u64 + 1) as usize
    }

    /// Generate a uniform random `i32` in `[low, high]`.
    ///
    /// Used for signed scale-step offsets. Panics if `low > high`.
    pub fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        assert!(low <= high, "range_i32_inclusive: low must be <= high");
        let span = (high as i64 - low as i64) as u64 + 1;
        (low as i64 + self.range_u64(0, span) as i64) as i32
    }

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one element uniformly. Returns `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.range_usize(0, items.len())])
        }
    }

    /// Pick one element with probability proportional to its weight.
    ///
    /// Returns `None` when the slice is empty or every weight is zero.
    pub fn choose_weighted<'a, T>(&mut self, items: &'a [(T, u32)]) -> Option<&'a T> {
        let total: u64 = items.iter().map(|&(_, w)| w as u64).sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.range_u64(0, total);
        for (item, weight) in items {
            let w = *weight as u64;
            if roll < w {
                return Some(item);
            }
            roll -= w;
        }
        None
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_same_seed_same_output() {
        let mut a = PracticeRng::new(42);
        let mut b = PracticeRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = PracticeRng::new(42);
        let mut b = PracticeRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = PracticeRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_usize_within_bounds() {
        let mut rng = PracticeRng::new(555);
        for _ in 0..10_000 {
            let v = rng.range_usize(5, 15);
            assert!((5..15).contains(&v), "range_usize out of range: {v}");
        }
    }

    #[test]
    fn range_usize_inclusive_reaches_upper_bound() {
        let mut rng = PracticeRng::new(666);
        let mut saw_max = false;
        for _ in 0..10_000 {
            let v = rng.range_usize_inclusive(2, 8);
            assert!((2..=8).contains(&v), "range_usize_inclusive out of range: {v}");
            saw_max |= v == 8;
        }
        assert!(saw_max, "range_usize_inclusive should reach the upper bound");
    }

    #[test]
    fn range_i32_inclusive_covers_negative_span() {
        let mut rng = PracticeRng::new(7);
        let mut seen = [false; 7];
        for _ in 0..10_000 {
            let v = rng.range_i32_inclusive(-3, 3);
            assert!((-3..=3).contains(&v), "range_i32_inclusive out of range: {v}");
            seen[(v + 3) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s), "every offset in -3..=3 should appear");
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = PracticeRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn choose_empty_is_none() {
        let mut rng = PracticeRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert_eq!(rng.choose(&[9]), Some(&9));
    }

    #[test]
    fn choose_weighted_skips_zero_weights() {
        let mut rng = PracticeRng::new(3);
        let items = [('a', 0), ('b', 5), ('c', 0)];
        for _ in 0..1000 {
            assert_eq!(rng.choose_weighted(&items), Some(&'b'));
        }
        let nothing = [('a', 0)];
        assert!(rng.choose_weighted(&nothing).is_none());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = PracticeRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: PracticeRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
