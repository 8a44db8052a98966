//! Value-sequence generators
//!
//! Seeded generators shaped like the bands of real archives, plus
//! `proptest` strategies for arbitrary band contents.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of a generated band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePattern {
    /// Small non-negative values, like counts and flags.
    Small,
    /// Non-negative values spread over several byte lengths.
    Large,
    /// Values of both signs around zero.
    Signed,
    /// Non-decreasing values, like sorted offsets.
    Sorted,
    /// A handful of values repeated often, like popular references.
    Skewed,
    /// One value repeated.
    Constant,
    /// Any `i32`.
    Random,
}

impl ValuePattern {
    /// Every pattern.
    pub const ALL: [ValuePattern; 7] = [
        ValuePattern::Small,
        ValuePattern::Large,
        ValuePattern::Signed,
        ValuePattern::Sorted,
        ValuePattern::Skewed,
        ValuePattern::Constant,
        ValuePattern::Random,
    ];

    /// True if every value is non-negative.
    pub fn is_unsigned(self) -> bool {
        !matches!(self, ValuePattern::Signed | ValuePattern::Random)
    }
}

/// `n` values of `pattern`, reproducible from `seed`.
pub fn generate(pattern: ValuePattern, n: usize, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    match pattern {
        ValuePattern::Small => (0..n).map(|_| rng.gen_range(0..16)).collect(),
        ValuePattern::Large => (0..n)
            .map(|_| {
                let bits = rng.gen_range(1..31);
                rng.gen_range(0..1i32 << bits)
            })
            .collect(),
        ValuePattern::Signed => (0..n).map(|_| rng.gen_range(-500..500)).collect(),
        ValuePattern::Sorted => {
            let mut x = 0i32;
            (0..n)
                .map(|_| {
                    x = x.saturating_add(rng.gen_range(0..40));
                    x
                })
                .collect()
        }
        ValuePattern::Skewed => {
            let favored = [3, 17, 17, 17, 250, 1000];
            (0..n)
                .map(|_| {
                    if rng.gen_bool(0.9) {
                        favored[rng.gen_range(0..favored.len())]
                    } else {
                        rng.gen_range(0..100_000)
                    }
                })
                .collect()
        }
        ValuePattern::Constant => vec![rng.gen_range(0..300); n],
        ValuePattern::Random => (0..n).map(|_| rng.gen()).collect(),
    }
}

/// Strategy for the contents of an unsigned band of up to `max_len` values.
pub fn band_values(max_len: usize) -> impl Strategy<Value = Vec<i32>> {
    prop_oneof![
        prop::collection::vec(0..64i32, 0..=max_len),
        prop::collection::vec(0..i32::MAX, 0..=max_len),
        prop::collection::vec(prop::sample::select(vec![0, 1, 2, 191, 192, 1000]), 0..=max_len),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_reproducible() {
        for pattern in ValuePattern::ALL {
            let a = generate(pattern, 50, 7);
            assert_eq!(a.len(), 50);
            assert_eq!(a, generate(pattern, 50, 7), "{:?}", pattern);
            if pattern.is_unsigned() {
                assert!(a.iter().all(|&v| v >= 0), "{:?}", pattern);
            }
        }
    }

    #[test]
    fn test_sorted_is_sorted() {
        let values = generate(ValuePattern::Sorted, 200, 1);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }
}
