//! Candidate acquisition: decimal parsing and seeded random generation.
//!
//! Random candidates with a requested digit count are drawn uniformly from
//! [10^(d−1), 10^d) and forced odd, so every generated value has exactly
//! `d` digits and a chance of being prime. Huge mode scales the digit
//! count as a power of ten; capacity enforcement happens later, at encode
//! time, so oversized requests fail with the transfer error rather than
//! being silently clamped.

use rug::ops::Pow;
use rug::rand::RandState;
use rug::Integer;

use crate::error::{Result, TesterError};

/// Largest huge-mode exponent: 10^6 decimal digits.
pub const MAX_HUGE_EXPONENT: u32 = 6;

/// Parse a non-negative decimal candidate.
pub fn parse_candidate(input: &str) -> Result<Integer> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TesterError::Parse("empty candidate".into()));
    }
    let n = Integer::from_str_radix(trimmed, 10)
        .map_err(|e| TesterError::Parse(format!("{trimmed:?}: {e}")))?;
    if n < 0 {
        return Err(TesterError::Parse(format!(
            "candidate must be non-negative, got {n}"
        )));
    }
    Ok(n)
}

/// Seeded GMP random state; one per run, shared across batch draws.
pub fn seeded_rng(seed: u64) -> RandState<'static> {
    let mut rng = RandState::new();
    rng.seed(&Integer::from(seed));
    rng
}

/// Uniform odd candidate with exactly `digits` decimal digits.
pub fn random_with_digits(digits: u32, rng: &mut RandState) -> Result<Integer> {
    if digits == 0 {
        return Err(TesterError::Parse("digit count must be at least 1".into()));
    }
    let floor = Integer::from(10u32).pow(digits - 1);
    let span = Integer::from(9u32 * &floor);
    let mut n = floor + span.random_below(rng);
    // Force odd; keeps the digit count since the low digit only moves up
    n.set_bit(0, true);
    Ok(n)
}

/// Huge-mode candidate: 10^exponent decimal digits, exponent in 1..=6.
pub fn huge_candidate(exponent: u32, rng: &mut RandState) -> Result<Integer> {
    if !(1..=MAX_HUGE_EXPONENT).contains(&exponent) {
        return Err(TesterError::Parse(format!(
            "huge exponent must be in 1..={MAX_HUGE_EXPONENT}, got {exponent}"
        )));
    }
    random_with_digits(10u32.pow(exponent), rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_padded_decimals() {
        assert_eq!(parse_candidate("97").unwrap(), 97);
        assert_eq!(parse_candidate("  1000003\n").unwrap(), 1000003);
        assert_eq!(
            parse_candidate("170141183460469231731687303715884105727").unwrap(),
            Integer::from_str_radix("170141183460469231731687303715884105727", 10).unwrap()
        );
    }

    #[test]
    fn rejects_empty_garbage_and_negatives() {
        for bad in ["", "   ", "12a3", "0x10", "--5", "-17"] {
            assert!(
                matches!(parse_candidate(bad), Err(TesterError::Parse(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn random_candidates_have_exact_digit_count() {
        let mut rng = seeded_rng(7);
        for digits in [1u32, 2, 5, 10, 40, 100] {
            let n = random_with_digits(digits, &mut rng).unwrap();
            assert_eq!(n.to_string().len(), digits as usize, "wrong width for {digits}");
            assert!(n.is_odd());
        }
    }

    #[test]
    fn random_candidates_are_seed_deterministic() {
        let a = random_with_digits(30, &mut seeded_rng(99)).unwrap();
        let b = random_with_digits(30, &mut seeded_rng(99)).unwrap();
        let c = random_with_digits(30, &mut seeded_rng(100)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_digit_request_is_rejected() {
        assert!(matches!(
            random_with_digits(0, &mut seeded_rng(0)),
            Err(TesterError::Parse(_))
        ));
    }

    #[test]
    fn huge_mode_scales_digits_by_power_of_ten() {
        let mut rng = seeded_rng(3);
        assert_eq!(huge_candidate(1, &mut rng).unwrap().to_string().len(), 10);
        assert_eq!(huge_candidate(2, &mut rng).unwrap().to_string().len(), 100);
        assert_eq!(huge_candidate(3, &mut rng).unwrap().to_string().len(), 1000);
    }

    #[test]
    fn huge_mode_rejects_out_of_range_exponents() {
        let mut rng = seeded_rng(0);
        for bad in [0u32, 7, 100] {
            assert!(matches!(
                huge_candidate(bad, &mut rng),
                Err(TesterError::Parse(_))
            ));
        }
    }
}
