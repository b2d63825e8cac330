pub mod candidate;
pub mod codec;
pub mod error;
pub mod gpu;
pub mod mont;
pub mod params;
pub mod schedule;
pub mod tester;

use rug::Integer;

/// Approximate decimal digit count from the bit length. Off by at most one,
/// but free even for multi-million-digit candidates.
pub fn estimate_digits(n: &Integer) -> u64 {
    let bits = n.significant_bits();
    if bits == 0 {
        return 1;
    }
    (bits as f64 * std::f64::consts::LOG10_2) as u64 + 1
}

/// Exact decimal digit count. Converts to a base-10 string, so prefer
/// [`estimate_digits`] when the candidate is huge and exactness is optional.
pub fn exact_digits(n: &Integer) -> u64 {
    n.to_string_radix(10).len() as u64
}
