//! # Primality Tester Facade
//!
//! Two-stage screening in front of the device: trivial cases and a fixed
//! small-prime trial division catch most random composites on the CPU,
//! so a device dispatch only happens for candidates with no factor in the
//! table. The device work itself goes through the [`RoundRunner`] seam.

use rug::Integer;
use tracing::debug;

use crate::candidate;
use crate::error::Result;
use crate::gpu::RoundRunner;
use crate::params;

/// Trial-division set: all primes up to 311. Membership is an immediate
/// prime verdict; divisibility (without membership) an immediate
/// composite one.
pub const SMALL_PRIMES: [u32; 64] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307,
    311,
];

// SplitMix64 increment; steps the per-test seed stream
const SEED_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

pub struct PrimalityTester {
    candidate: Integer,
    runner: Box<dyn RoundRunner>,
    seed: u64,
}

impl PrimalityTester {
    pub fn new(runner: Box<dyn RoundRunner>, seed: u64) -> Self {
        Self {
            candidate: Integer::new(),
            runner,
            seed,
        }
    }

    /// Parse a decimal candidate into the tester.
    pub fn set_number(&mut self, input: &str) -> Result<()> {
        self.candidate = candidate::parse_candidate(input)?;
        Ok(())
    }

    /// Install an already-constructed candidate (random/huge modes).
    pub fn set_candidate(&mut self, n: Integer) {
        self.candidate = n;
    }

    pub fn candidate(&self) -> &Integer {
        &self.candidate
    }

    /// Full probabilistic test with `rounds` witness rounds.
    ///
    /// Composite answers are exact; a `true` means no witness accused the
    /// candidate, which at 64 rounds leaves an error probability below
    /// 4^-64.
    pub fn is_prime(&mut self, rounds: u32) -> Result<bool> {
        if self.candidate < 2u32 {
            return Ok(false);
        }
        if self.candidate == 2u32 || self.candidate == 3u32 {
            return Ok(true);
        }
        if self.candidate.is_even() {
            return Ok(false);
        }
        if let Some(verdict) = small_prime_screen(&self.candidate) {
            debug!(verdict, "small-prime screen settled the candidate");
            return Ok(verdict);
        }

        let params = params::build(&self.candidate, rounds, self.next_seed())?;
        let outcome = self.runner.run(&params)?;
        debug!(
            digits = crate::estimate_digits(&self.candidate),
            verdict = %outcome.verdict,
            rounds_completed = outcome.rounds_completed,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "witness rounds finished"
        );
        Ok(outcome.verdict.is_probably_prime())
    }

    fn next_seed(&mut self) -> u64 {
        let seed = self.seed;
        self.seed = self.seed.wrapping_add(SEED_GAMMA);
        seed
    }
}

/// Settle an odd candidate by trial division, or pass it through.
fn small_prime_screen(n: &Integer) -> Option<bool> {
    for p in SMALL_PRIMES {
        if *n == p {
            return Some(true);
        }
        if n.is_divisible_u(p) {
            return Some(false);
        }
    }
    None
}
