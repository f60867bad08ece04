// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Hand-rolled so the output stream is identical on every platform and
// compiler, with no dependency on external RNG crates.
//
// This crate is the single source of randomness for `cantabile_music`. Every
// probabilistic choice in melody generation (motif length, variation kind,
// infraction triggers, rest placement, tie-breaks between equal candidates)
// draws from one `SeededRng` that the caller creates and threads through the
// call chain as `&mut SeededRng`. There is no ambient/global generator.
//
// **Critical constraint: determinism.** The same seed and the same sequence
// of calls must yield the same values everywhere. The core generator uses
// integer arithmetic only; float helpers derive from the integer stream with
// exact conversions.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG, seeded from a single `u64`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeededRng {
    s: [u64; 4],
}

impl SeededRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two generators created with the same seed produce identical streams.
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

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// Uses the upper 53 bits of a `u64`, which is exactly the f64 mantissa
    /// width including the implicit bit.
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

    /// Generate a uniform random `usize` in `[low, high]` (inclusive on both ends).
    ///
    /// Panics if `low > high`.
    pub fn range_usize_inclusive(&mut self, low: usize, high: usize) -> usize {
        assert!(low <= high, "range_usize_inclusive: low must be <= high");
        self.range_u64(low as u64, high as u64 + 1) as usize
    }

    /// Generate a uniform random `i32` in `[low, high]` (inclusive).
    ///
    /// Panics if `low > high`.
    pub fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        assert!(low <= high, "range_i32_inclusive: low must be <= high");
        let span = (high as i64 - low as i64) as u64 + 1;
        (low as i64 + self.range_u64(0, span) as i64) as i32
    }

    /// Return `true` with probability `p`, `false` otherwise.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    /// One value is consumed from the stream either way, so call sequences
    /// stay aligned regardless of `p`.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick a uniformly random element of `items`, or `None` if empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let i = self.range_usize(0, items.len());
        items.get(i)
    }

    /// Pick an index with probability proportional to `weights[i]`.
    ///
    /// Negative and NaN weights count as zero. Returns `None` when no weight
    /// is positive. Consumes exactly one value from the stream when it
    /// returns `Some`.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let total: f64 = weights.iter().map(|&w| clean(w)).sum();
        if total <= 0.0 {
            return None;
        }
        let target = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            let w = clean(w);
            if w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = Some(i);
            if cumulative > target {
                return Some(i);
            }
        }
        // Float rounding can leave `target` a hair above the running sum.
        last_positive
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
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = SeededRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_u64_within_bounds() {
        let mut rng = SeededRng::new(999);
        for _ in 0..10_000 {
            let v = rng.range_u64(10, 20);
            assert!((10..20).contains(&v), "range_u64 out of range: {v}");
        }
    }

    #[test]
    fn range_usize_inclusive_reaches_both_ends() {
        let mut rng = SeededRng::new(666);
        let mut saw_low = false;
        let mut saw_high = false;
        for _ in 0..10_000 {
            let v = rng.range_usize_inclusive(2, 5);
            assert!((2..=5).contains(&v), "range_usize_inclusive out of range: {v}");
            saw_low |= v == 2;
            saw_high |= v == 5;
        }
        assert!(saw_low && saw_high, "both bounds should be reachable");
    }

    #[test]
    fn range_i32_inclusive_handles_negative_bounds() {
        let mut rng = SeededRng::new(31);
        for _ in 0..10_000 {
            let v = rng.range_i32_inclusive(-3, 3);
            assert!((-3..=3).contains(&v), "range_i32_inclusive out of range: {v}");
        }
        assert_eq!(rng.range_i32_inclusive(7, 7), 7);
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = SeededRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn random_bool_distribution() {
        let mut rng = SeededRng::new(42);
        let n = 10_000;
        let hits = (0..n).filter(|_| rng.random_bool(0.3)).count();
        let pct = hits as f64 / n as f64;
        assert!(
            (0.27..0.33).contains(&pct),
            "random_bool(0.3) should be ~30%, got {:.1}%",
            pct * 100.0
        );
    }

    #[test]
    fn choose_empty_is_none() {
        let mut rng = SeededRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert_eq!(rng.choose(&[9]), Some(&9));
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = SeededRng::new(7);
        for _ in 0..1000 {
            let i = rng.weighted_index(&[0.0, 2.0, 0.0, 1.0]);
            assert!(matches!(i, Some(1) | Some(3)), "zero-weight index chosen: {i:?}");
        }
        assert_eq!(rng.weighted_index(&[0.0, -1.0, f64::NAN]), None);
    }

    #[test]
    fn weighted_index_follows_proportions() {
        let mut rng = SeededRng::new(99);
        let n = 20_000;
        let ones = (0..n)
            .filter(|_| rng.weighted_index(&[1.0, 3.0]) == Some(1))
            .count();
        let pct = ones as f64 / n as f64;
        assert!((0.72..0.78).contains(&pct), "expected ~75%, got {pct:.3}");
    }

    #[test]
    fn serialization_roundtrip_continues_stream() {
        let mut rng = SeededRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SeededRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
