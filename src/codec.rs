//! # Codec — Fixed-Limb Big-Integer Transfer Encoding
//!
//! Converts between host-side arbitrary-precision integers (`rug::Integer`)
//! and the fixed-capacity limb array the compute kernel operates on. The
//! device has no allocator, so every big integer crosses the bus as exactly
//! [`MAX_LIMBS`] 32-bit limbs plus an active-limb count.
//!
//! ## Invariant
//!
//! `size == 0` iff the value is zero; otherwise `limbs[size-1] != 0`. Encode
//! always produces this canonical (trimmed) form (GMP's limb export trims
//! for us), and decode only reads `limbs[0..size)`, so trailing garbage
//! beyond `size` can never change a decoded value. Equality and zero tests
//! on the device depend on this.

use bytemuck::{Pod, Zeroable};
use rug::integer::Order;
use rug::Integer;

use crate::error::{Result, TesterError};

/// Limb capacity of the device encoding.
pub const MAX_LIMBS: usize = 128;

/// Bits per limb.
pub const LIMB_BITS: u32 = 32;

/// Largest representable magnitude: 2^4096 - 1.
pub const MAX_BITS: u32 = MAX_LIMBS as u32 * LIMB_BITS;

/// A non-negative integer in device layout: little-endian 32-bit limbs with
/// an explicit active-limb count. Matches the WGSL `BigInt` struct field for
/// field, so whole blocks of these upload with a single cast.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct FixedLimbInteger {
    pub size: u32,
    pub limbs: [u32; MAX_LIMBS],
}

impl FixedLimbInteger {
    pub const ZERO: Self = Self {
        size: 0,
        limbs: [0; MAX_LIMBS],
    };

    pub fn is_zero(&self) -> bool {
        self.size == 0
    }

    /// The active limbs, least significant first.
    pub fn active_limbs(&self) -> &[u32] {
        &self.limbs[..(self.size as usize).min(MAX_LIMBS)]
    }
}

/// Encode a non-negative integer into device layout.
///
/// Fails with [`TesterError::CapacityExceeded`] when the value needs more
/// than [`MAX_BITS`] bits. Nothing is written on failure; the caller's
/// buffers stay untouched.
pub fn encode(value: &Integer) -> Result<FixedLimbInteger> {
    debug_assert!(!value.is_negative(), "the transfer encoding is sign-free");
    let bits = value.significant_bits();
    if bits > MAX_BITS {
        return Err(TesterError::CapacityExceeded {
            bits: bits as u64,
            max: MAX_BITS as u64,
        });
    }

    let digits = value.to_digits::<u32>(Order::Lsf);
    debug_assert!(digits.len() <= MAX_LIMBS);
    debug_assert!(digits.last().map_or(true, |&top| top != 0));

    let mut out = FixedLimbInteger::ZERO;
    out.size = digits.len() as u32;
    out.limbs[..digits.len()].copy_from_slice(&digits);
    Ok(out)
}

/// Reconstruct the integer from `limbs[0..size)`.
pub fn decode(encoded: &FixedLimbInteger) -> Integer {
    Integer::from_digits(encoded.active_limbs(), Order::Lsf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rug::ops::Pow;

    #[test]
    fn encode_zero_has_size_zero() {
        let enc = encode(&Integer::new()).unwrap();
        assert_eq!(enc.size, 0);
        assert!(enc.is_zero());
        assert_eq!(decode(&enc), Integer::new());
    }

    #[test]
    fn encode_small_values_roundtrip() {
        for v in [1u64, 2, 97, 1000, u32::MAX as u64, u64::MAX] {
            let n = Integer::from(v);
            let enc = encode(&n).unwrap();
            assert_eq!(decode(&enc), n, "roundtrip failed for {}", v);
        }
    }

    #[test]
    fn encode_trims_trailing_zero_limbs() {
        // 2^32 occupies exactly two limbs: [0, 1]
        let n = Integer::from(1u64) << 32u32;
        let enc = encode(&n).unwrap();
        assert_eq!(enc.size, 2);
        assert_eq!(enc.limbs[0], 0);
        assert_eq!(enc.limbs[1], 1);
        assert_eq!(enc.limbs[2], 0);
    }

    #[test]
    fn encode_top_limb_is_nonzero() {
        let n = Integer::from(12345u64) * Integer::from(10u32).pow(100);
        let enc = encode(&n).unwrap();
        assert_ne!(enc.limbs[enc.size as usize - 1], 0);
    }

    #[test]
    fn encode_accepts_full_capacity() {
        // 2^4096 - 1 is the largest encodable value (all 128 limbs set)
        let n = (Integer::from(1u32) << MAX_BITS) - 1u32;
        let enc = encode(&n).unwrap();
        assert_eq!(enc.size, MAX_LIMBS as u32);
        assert_eq!(decode(&enc), n);
    }

    #[test]
    fn encode_rejects_above_capacity() {
        let n = Integer::from(1u32) << MAX_BITS;
        match encode(&n) {
            Err(TesterError::CapacityExceeded { bits, max }) => {
                assert_eq!(bits, MAX_BITS as u64 + 1);
                assert_eq!(max, MAX_BITS as u64);
            }
            Err(other) => panic!("expected CapacityExceeded, got {:?}", other),
            Ok(_) => panic!("encode accepted an oversized value"),
        }
    }

    #[test]
    fn decode_ignores_limbs_beyond_size() {
        let mut enc = encode(&Integer::from(7u32)).unwrap();
        // Stale data past `size` must not leak into the decoded value
        enc.limbs[50] = 0xdead_beef;
        assert_eq!(decode(&enc), Integer::from(7u32));
    }

    #[test]
    fn struct_layout_matches_device_expectation() {
        // One u32 count plus 128 limbs, no padding
        assert_eq!(
            std::mem::size_of::<FixedLimbInteger>(),
            4 * (MAX_LIMBS + 1)
        );
    }
}
