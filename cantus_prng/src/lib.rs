// Seeded random stream for melody evolution.
//
// xoshiro256++ (Blackman & Vigna, 2019), state expanded from a single `u64`
// seed with SplitMix64. Every stochastic decision in a Cantus run (initial
// population, mutation, tournament draws, crossover points) pulls from one
// `CantusRng` owned by the engine and passed down as `&mut`. Nothing reads a
// global or thread-local generator, so a seed fully determines a run.
//
// The generator keeps no floating-point state and the integer helpers use
// rejection sampling, so draws are identical on every platform. Only
// `next_f64` converts to float, and it does so from a fixed 53-bit slice.

use serde::{Deserialize, Serialize};

/// The run's random stream.
///
/// Cloning forks the stream: the clone replays exactly what the original
/// would have produced from that point on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CantusRng {
    s: [u64; 4],
}

impl CantusRng {
    /// Seed a new stream. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut s = [0u64; 4];
        for word in &mut s {
            *word = splitmix64(&mut sm);
        }
        Self { s }
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = self.s;
        let result = s0.wrapping_add(s3).rotate_left(23).wrapping_add(s0);

        let t = s1 << 17;
        let s2 = s2 ^ s0;
        let s3 = s3 ^ s1;
        let s1 = s1 ^ s2;
        let s0 = s0 ^ s3;
        self.s = [s0, s1, s2 ^ t, s3.rotate_left(45)];

        result
    }

    /// Uniform `f64` in [0, 1), built from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)`.
    ///
    /// Panics if the range is empty.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: empty range {low}..{high}");
        let span = high - low;
        if span.is_power_of_two() {
            return low + (self.next_u64() & (span - 1));
        }
        // Reject the short final bucket so every residue is equally likely.
        let threshold = span.wrapping_neg() % span;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + r % span;
            }
        }
    }

    /// Uniform `usize` in `[low, high)`. Panics if the range is empty.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Uniform `i32` in `[low, high]`, both ends included.
    pub fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        assert!(low <= high, "range_i32_inclusive: low {low} > high {high}");
        let span = (i64::from(high) - i64::from(low) + 1) as u64;
        (i64::from(low) + self.range_u64(0, span) as i64) as i32
    }

    /// Index into a collection of `len` items. Panics when `len == 0`.
    pub fn choose_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "choose_index: cannot choose from an empty collection");
        self.range_usize(0, len)
    }

    /// `true` with probability `p`. `p <= 0` never fires, `p >= 1` always does.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Fair coin flip.
    pub fn coin(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
