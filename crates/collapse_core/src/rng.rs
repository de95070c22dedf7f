//! Random source abstraction for the solver.
//!
//! The solver only ever asks for a float in a half-open range or an integer
//! in an inclusive range, so that is all the trait requires. Two generators
//! are provided:
//!
//! - `StdRandom`: wraps `rand::rngs::StdRng` (fast, good for normal use)
//! - `DotNetRandom`: wraps `clr_random::CLRRandom`, which reproduces the
//!   sequence of .NET `System.Random` for a given seed
//!
//! Seed management belongs to the caller (see `retry`).

use clr_random::CLRRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_core::SeedableRng as RandCoreSeedableRng;
use serde::{Deserialize, Serialize};

/// Uniform random generator consumed by the solver.
pub trait RandomSource {
    /// Returns a float in `[lo, hi)`. Returns `lo` when the range is empty.
    fn float_in_range(&mut self, lo: f64, hi: f64) -> f64;

    /// Returns an integer in `[lo, hi]`, both ends inclusive.
    /// Returns `lo` when `hi < lo`.
    fn int_in_range(&mut self, lo: i32, hi: i32) -> i32;

    /// Returns a float in `[0.0, 1.0)`.
    fn next_double(&mut self) -> f64 {
        self.float_in_range(0.0, 1.0)
    }

    /// Returns a non-negative seed for a sub-generator.
    fn next_seed(&mut self) -> i32 {
        self.int_in_range(0, i32::MAX - 1)
    }
}

/// Standard Rust RNG wrapper using `rand::rngs::StdRng`.
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Create a new StdRandom from an i32 seed.
    pub fn from_seed(seed: i32) -> Self {
        // Match .NET: negative seeds use their absolute value.
        let abs_seed = if seed == i32::MIN {
            i32::MAX as u64
        } else {
            seed.unsigned_abs() as u64
        };
        Self {
            rng: StdRng::seed_from_u64(abs_seed),
        }
    }

    pub fn from_u64_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for StdRandom {
    fn float_in_range(&mut self, lo: f64, hi: f64) -> f64 {
        if !(hi > lo) {
            return lo;
        }
        self.rng.gen_range(lo..hi)
    }

    fn int_in_range(&mut self, lo: i32, hi: i32) -> i32 {
        if hi < lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    fn next_double(&mut self) -> f64 {
        self.rng.gen()
    }
}

/// .NET-compatible RNG wrapper using `clr_random::CLRRandom`.
///
/// Produces the same sequence as `new System.Random(seed)`, which makes
/// runs reproducible against tools that use .NET randomness.
pub struct DotNetRandom {
    rng: CLRRandom,
    seed: i32,
}

impl DotNetRandom {
    pub fn from_seed(seed: i32) -> Self {
        Self {
            rng: CLRRandom::from_seed(clr_random::Seed::from(seed)),
            seed,
        }
    }
}

impl std::fmt::Debug for DotNetRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DotNetRandom")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl RandomSource for DotNetRandom {
    fn float_in_range(&mut self, lo: f64, hi: f64) -> f64 {
        if !(hi > lo) {
            return lo;
        }
        let value = lo + self.rng.next_f64() * (hi - lo);
        // Rounding can land exactly on `hi` for wide ranges.
        if value >= hi {
            lo
        } else {
            value
        }
    }

    fn int_in_range(&mut self, lo: i32, hi: i32) -> i32 {
        if hi < lo {
            return lo;
        }
        // .NET: (int)(Sample() * range) + minValue, with range = hi - lo + 1
        let range = hi as i64 - lo as i64 + 1;
        let sample = self.rng.next_f64();
        ((sample * range as f64) as i64 + lo as i64).min(hi as i64) as i32
    }

    fn next_double(&mut self) -> f64 {
        self.rng.next_f64()
    }

    fn next_seed(&mut self) -> i32 {
        // Same as .NET `Random.Next()`.
        self.rng.next_i32()
    }
}

/// Selects which generator a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngKind {
    #[default]
    Std,
    DotNet,
}

impl RngKind {
    pub fn build(self, seed: i32) -> Box<dyn RandomSource> {
        match self {
            RngKind::Std => Box::new(StdRandom::from_seed(seed)),
            RngKind::DotNet => Box::new(DotNetRandom::from_seed(seed)),
        }
    }
}

impl std::str::FromStr for RngKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "std" => Ok(RngKind::Std),
            "dotnet" | "dot_net" => Ok(RngKind::DotNet),
            other => Err(format!("unknown rng kind '{}' (expected std or dotnet)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_random_ranges() {
        let mut rng = StdRandom::from_seed(42);

        for _ in 0..200 {
            let v = rng.float_in_range(2.0, 5.0);
            assert!((2.0..5.0).contains(&v));
        }

        for _ in 0..200 {
            let v = rng.int_in_range(10, 12);
            assert!((10..=12).contains(&v));
        }

        for _ in 0..200 {
            let v = rng.next_double();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_int_in_range_is_inclusive() {
        let mut rng = StdRandom::from_seed(7);
        let mut seen = [false; 3];
        for _ in 0..500 {
            seen[rng.int_in_range(0, 2) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s), "upper bound never produced");

        let mut rng = DotNetRandom::from_seed(7);
        let mut seen = [false; 3];
        for _ in 0..500 {
            seen[rng.int_in_range(0, 2) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s), "upper bound never produced");
    }

    #[test]
    fn test_empty_ranges_return_lower_bound() {
        let mut rng = StdRandom::from_seed(1);
        assert_eq!(rng.float_in_range(3.0, 3.0), 3.0);
        assert_eq!(rng.int_in_range(5, 4), 5);

        let mut rng = DotNetRandom::from_seed(1);
        assert_eq!(rng.float_in_range(3.0, 1.0), 3.0);
        assert_eq!(rng.int_in_range(9, 9), 9);
    }

    #[test]
    fn test_dotnet_random_matches_csharp_next() {
        let mut rng = DotNetRandom::from_seed(42);

        // new Random(42).Next() x 10
        let expected = [
            1434747710, 302596119, 269548474, 1122627734, 361709742, 563913476, 1555655117,
            1101493307, 372913049, 1634773126,
        ];

        for (i, &exp) in expected.iter().enumerate() {
            let got = rng.next_seed();
            assert_eq!(got, exp, "mismatch at index {}", i);
        }
    }

    #[test]
    fn test_dotnet_random_next_double_matches_csharp() {
        let mut rng = DotNetRandom::from_seed(42);
        let got = rng.next_double();
        assert!((got - 0.6681064659115423).abs() < 1e-15, "got {}", got);
    }

    #[test]
    fn test_generators_are_deterministic() {
        for kind in [RngKind::Std, RngKind::DotNet] {
            let mut a = kind.build(123);
            let mut b = kind.build(123);
            for _ in 0..100 {
                assert_eq!(a.int_in_range(0, 1000), b.int_in_range(0, 1000));
                assert_eq!(a.next_double(), b.next_double());
            }
        }
    }

    #[test]
    fn test_rng_kind_from_str() {
        assert_eq!("std".parse::<RngKind>(), Ok(RngKind::Std));
        assert_eq!("dotnet".parse::<RngKind>(), Ok(RngKind::DotNet));
        assert!("mersenne".parse::<RngKind>().is_err());
    }
}
