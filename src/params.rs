//! # Params — Witness Parameter Assembly
//!
//! Turns a candidate that survived the small-prime filter into everything
//! one device test needs: the Miller–Rabin decomposition n−1 = d·2^s, the
//! encoded operand block (including the Montgomery constants the kernel
//! multiplies with), the scalar dispatch parameters, and the per-test
//! witness pool. Built once per test, immutable after upload.

use bytemuck::{Pod, Zeroable};
use rug::rand::RandState;
use rug::Integer;

use crate::codec::{self, FixedLimbInteger};
use crate::error::{Result, TesterError};
use crate::mont::MontgomeryCtx;

/// Pool slots generated per requested round.
pub const WITNESS_POOL_FACTOR: u32 = 16;

/// Big-integer operands, uploaded once per test as read-only storage.
///
/// `r2` is R² mod n for R = 2^(32·limb_count); together with `n0_inv` in
/// [`DispatchParams`] it lets the kernel run entirely in the Montgomery
/// domain without ever dividing.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct OperandBlock {
    pub n: FixedLimbInteger,
    pub n_minus_1: FixedLimbInteger,
    pub d: FixedLimbInteger,
    pub r2: FixedLimbInteger,
}

/// Scalar kernel parameters, uploaded as the uniform buffer and rewritten
/// before every dispatch slice. Field order matches the WGSL struct.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DispatchParams {
    /// Power-of-two exponent from n−1 = d·2^s.
    pub s: u32,
    /// Significant bits of d (exponentiation loop bound).
    pub d_bits: u32,
    /// -n⁻¹ mod 2³².
    pub n0_inv: u32,
    /// Active limbs of n; all kernel loops run to this bound.
    pub limb_count: u32,
    /// Full round budget for the test.
    pub rounds_total: u32,
    /// First global round index covered by this dispatch.
    pub slice_start: u32,
    /// Rounds covered by this dispatch.
    pub slice_len: u32,
    /// Logical lanes this dispatch was sized for.
    pub lane_count: u32,
    /// Entropy folded into witness-pool indexing.
    pub seed: u32,
    /// Length of the witness pool in u32 slots.
    pub pool_len: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

/// One test's complete parameter set.
pub struct WitnessParameters {
    pub operands: OperandBlock,
    pub s: u32,
    pub d_bits: u32,
    pub n0_inv: u32,
    pub limb_count: u32,
    pub rounds: u32,
    pub seed: u32,
    pub pool: Vec<u32>,
}

impl WitnessParameters {
    /// Scalars for one dispatch slice over `[slice_start, slice_start + slice_len)`.
    pub fn dispatch_params(&self, slice_start: u32, slice_len: u32, lane_count: u32) -> DispatchParams {
        DispatchParams {
            s: self.s,
            d_bits: self.d_bits,
            n0_inv: self.n0_inv,
            limb_count: self.limb_count,
            rounds_total: self.rounds,
            slice_start,
            slice_len,
            lane_count,
            seed: self.seed,
            pool_len: self.pool.len() as u32,
            _pad0: 0,
            _pad1: 0,
        }
    }
}

/// Build the parameter block for an odd candidate n > 3.
///
/// Factors n−1 = d·2^s with d odd, encodes the operands, and precomputes
/// the Montgomery constants. `CapacityExceeded` propagates from the codec
/// before anything else is assembled.
pub fn build(n: &Integer, rounds: u32, seed: u64) -> Result<WitnessParameters> {
    if !n.is_odd() || *n <= 3 {
        return Err(TesterError::InvalidCandidate(format!(
            "witness testing needs an odd candidate above 3, got {}",
            clipped(n)
        )));
    }

    let encoded_n = codec::encode(n)?;

    let n_minus_1 = Integer::from(n - 1u32);
    let s = n_minus_1
        .find_one(0)
        .expect("n-1 of an odd n > 3 is even and nonzero");
    let d = Integer::from(&n_minus_1 >> s);
    debug_assert!(d.is_odd());
    debug_assert_eq!(Integer::from(&d << s), n_minus_1);

    let ctx = MontgomeryCtx::new(n);
    let operands = OperandBlock {
        n: encoded_n,
        n_minus_1: codec::encode(&n_minus_1)?,
        d: codec::encode(&d)?,
        r2: codec::encode(&ctx.r2_value())?,
    };

    Ok(WitnessParameters {
        operands,
        s,
        d_bits: d.significant_bits(),
        n0_inv: ctx.n_prime(),
        limb_count: ctx.limb_count() as u32,
        rounds,
        seed: fold_seed(seed),
        pool: witness_pool(rounds, seed),
    })
}

/// Fresh pool of pseudo-random witness material, deterministic per seed.
pub fn witness_pool(rounds: u32, seed: u64) -> Vec<u32> {
    let mut rng = RandState::new();
    rng.seed(&Integer::from(seed));
    // At least one slot so the device binding is never empty
    let len = rounds.max(1).saturating_mul(WITNESS_POOL_FACTOR);
    (0..len).map(|_| rng.bits(32)).collect()
}

/// Pool slot feeding a given global round index.
pub fn pool_slot(seed: u32, round: u32, pool_len: u32) -> u32 {
    (seed.wrapping_add(round.wrapping_mul(WITNESS_POOL_FACTOR))) % pool_len
}

/// Clamp raw pool material into a usable witness base in [2, n−2].
///
/// For a single-limb modulus the raw value is reduced into range (the
/// filter guarantees n >= 5, so `n0 - 3 >= 2`); wider moduli exceed any
/// u32, where flooring at 2 is enough. Without this, pool values divisible
/// by a small n would read as base ≡ 0 and falsely accuse primes. The
/// kernel computes the same expression.
pub fn derive_witness(raw: u32, n0: u32, limb_count: u32) -> u32 {
    if limb_count == 1 {
        2 + raw % (n0 - 3)
    } else {
        raw.max(2)
    }
}

fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

fn clipped(n: &Integer) -> String {
    let s = n.to_string();
    if s.len() <= 24 {
        s
    } else {
        format!("{}…({} digits)", &s[..24], s.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use rug::ops::Pow;

    #[test]
    fn build_decomposes_n_minus_1() {
        // 97 - 1 = 96 = 3 * 2^5
        let p = build(&Integer::from(97u32), 8, 1).unwrap();
        assert_eq!(p.s, 5);
        assert_eq!(codec::decode(&p.operands.d), Integer::from(3u32));
        assert_eq!(codec::decode(&p.operands.n_minus_1), Integer::from(96u32));
    }

    #[test]
    fn build_reconstructs_n_minus_1_exactly() {
        for v in [5u64, 13, 101, 561, 7919, 0xffff_fff1] {
            let n = Integer::from(v);
            let p = build(&n, 4, 42).unwrap();
            let d = codec::decode(&p.operands.d);
            assert!(d.is_odd(), "d must be odd for n={}", v);
            let rebuilt = d << p.s;
            assert_eq!(rebuilt, Integer::from(v - 1), "d·2^s != n-1 for n={}", v);
        }
    }

    #[test]
    fn build_rejects_even_and_tiny_candidates() {
        for v in [0u32, 1, 2, 3, 4, 100] {
            assert!(
                matches!(build(&Integer::from(v), 4, 0), Err(TesterError::InvalidCandidate(_))),
                "build accepted {}",
                v
            );
        }
    }

    #[test]
    fn build_propagates_capacity_errors() {
        let oversized = (Integer::from(1u32) << 4096u32) + 1u32;
        assert!(matches!(
            build(&oversized, 4, 0),
            Err(TesterError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn build_montgomery_constants_match_modulus() {
        let n = Integer::from(10u32).pow(50) + 151u32; // odd, multi-limb
        let p = build(&n, 4, 9).unwrap();
        let r2 = codec::decode(&p.operands.r2);
        let r = Integer::from(1u32) << (32 * p.limb_count);
        assert_eq!(r2, Integer::from(r.square() % &n));
    }

    #[test]
    fn witness_pool_is_seed_deterministic() {
        let a = witness_pool(8, 1234);
        let b = witness_pool(8, 1234);
        let c = witness_pool(8, 1235);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), (8 * WITNESS_POOL_FACTOR) as usize);
    }

    #[test]
    fn witness_pool_never_empty() {
        assert_eq!(witness_pool(0, 7).len(), WITNESS_POOL_FACTOR as usize);
    }

    #[test]
    fn pool_slots_distinct_per_round() {
        let pool_len = 64 * WITNESS_POOL_FACTOR;
        let slots: std::collections::HashSet<u32> =
            (0..64).map(|r| pool_slot(99, r, pool_len)).collect();
        assert_eq!(slots.len(), 64, "rounds must not share pool slots");
    }

    #[test]
    fn derived_witness_stays_in_range() {
        for raw in [0u32, 1, 2, 100, 0xdead_beef, u32::MAX] {
            // Single-limb: witness in [2, n-2]
            let w = derive_witness(raw, 101, 1);
            assert!((2..=99).contains(&w), "witness {} out of range for n=101", w);
            // Multi-limb: just floored at 2
            let w = derive_witness(raw, 0x1234, 4);
            assert!(w >= 2);
        }
    }

    #[test]
    fn dispatch_params_layout_is_tight() {
        assert_eq!(std::mem::size_of::<DispatchParams>(), 48);
        assert_eq!(std::mem::size_of::<OperandBlock>(), 4 * 4 * 129);
    }
}
