//! # Mont — Multi-Limb Montgomery Arithmetic
//!
//! The host-side twin of the compute kernel's modular arithmetic. The kernel
//! works on 32-bit limb vectors with no division anywhere; this module
//! implements the identical algorithm on the host so that
//!
//! 1. the parameter builder can precompute the kernel's constants
//!    (`-n⁻¹ mod 2³²` and `R² mod n`), and
//! 2. the tests can cross-validate every step against GMP before the same
//!    arithmetic ever runs on a device.
//!
//! ## Algorithm: CIOS Montgomery Multiplication
//!
//! For a fixed odd modulus n of L limbs, Montgomery form represents a as
//! ā = a·R mod n with R = 2^(32·L). The CIOS (Coarsely Integrated Operand
//! Scanning) loop interleaves one limb of schoolbook multiplication with one
//! limb of reduction: after each partial product row, m = t₀·(-n⁻¹) mod 2³²
//! is chosen so that adding m·n zeroes the lowest limb, which is then
//! shifted away. No division by n is ever performed, and the running value
//! stays below 2n, so a single conditional subtract finishes the job.
//!
//! ## References
//!
//! - Peter L. Montgomery, "Modular Multiplication Without Trial Division",
//!   Mathematics of Computation, 44(170):519–521, 1985.
//! - Koç, Acar, Kaliski, "Analyzing and Comparing Montgomery Multiplication
//!   Algorithms", IEEE Micro 16(3):26–33, 1996 (CIOS).

use rug::integer::Order;
use rug::Integer;

/// Montgomery context for a fixed odd multi-limb modulus.
///
/// All vectors are little-endian 32-bit limbs of the modulus width.
pub struct MontgomeryCtx {
    /// The modulus (odd, > 1), canonical limbs.
    n: Vec<u32>,
    /// -n⁻¹ mod 2³² (precomputed via Hensel lifting).
    n_prime: u32,
    /// R² mod n (used for converting to Montgomery form).
    r2: Vec<u32>,
    /// R mod n (Montgomery form of 1).
    one: Vec<u32>,
}

/// Pad an integer to exactly `len` little-endian limbs.
pub fn to_limbs(value: &Integer, len: usize) -> Vec<u32> {
    let mut limbs = value.to_digits::<u32>(Order::Lsf);
    debug_assert!(limbs.len() <= len, "value wider than the modulus");
    limbs.resize(len, 0);
    limbs
}

/// Rebuild an integer from little-endian limbs (trailing zeros are fine).
pub fn from_limbs(limbs: &[u32]) -> Integer {
    Integer::from_digits(limbs, Order::Lsf)
}

/// a >= b for equal-length little-endian limb slices.
fn ge(a: &[u32], b: &[u32]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    for i in (0..a.len()).rev() {
        if a[i] != b[i] {
            return a[i] > b[i];
        }
    }
    true
}

/// a -= b over equal-length limb slices; returns the final borrow.
fn sub_in_place(a: &mut [u32], b: &[u32]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    let mut borrow: u64 = 0;
    for i in 0..a.len() {
        let lhs = a[i] as u64;
        let rhs = b[i] as u64 + borrow;
        if lhs >= rhs {
            a[i] = (lhs - rhs) as u32;
            borrow = 0;
        } else {
            a[i] = (lhs + (1u64 << 32) - rhs) as u32;
            borrow = 1;
        }
    }
    borrow as u32
}

impl MontgomeryCtx {
    /// Create a Montgomery context for the given odd modulus n > 1.
    pub fn new(n: &Integer) -> Self {
        debug_assert!(n.is_odd() && *n > 1, "Montgomery requires odd modulus > 1");

        let limbs = n.to_digits::<u32>(Order::Lsf);
        let len = limbs.len();

        // Hensel lifting: compute n⁻¹ mod 2³² from the lowest limb.
        // Starting with n⁻¹ ≡ 1 (mod 2) for odd n, each iteration doubles
        // precision. 5 iterations: 2^1 → 2^2 → 2^4 → 2^8 → 2^16 → 2^32.
        let n0 = limbs[0];
        let mut inv: u32 = 1;
        for _ in 0..5 {
            inv = inv.wrapping_mul(2u32.wrapping_sub(n0.wrapping_mul(inv)));
        }
        let n_prime = inv.wrapping_neg(); // -n⁻¹ mod 2³²

        // R = 2^(32·len); R mod n and R² mod n via GMP.
        let r = Integer::from(1u32) << (32 * len as u32);
        let one = to_limbs(&Integer::from(&r % n), len);
        let r2 = to_limbs(&Integer::from(r.square() % n), len);

        MontgomeryCtx {
            n: limbs,
            n_prime,
            r2,
            one,
        }
    }

    /// Modulus width in limbs.
    pub fn limb_count(&self) -> usize {
        self.n.len()
    }

    /// -n⁻¹ mod 2³², as the kernel consumes it.
    pub fn n_prime(&self) -> u32 {
        self.n_prime
    }

    /// R² mod n as an integer, for encoding into the operand block.
    pub fn r2_value(&self) -> Integer {
        from_limbs(&self.r2)
    }

    /// The Montgomery form of 1 (= R mod n).
    pub fn one(&self) -> &[u32] {
        &self.one
    }

    /// Convert a normal value to Montgomery form: ā = a·R mod n.
    pub fn to_mont(&self, a: &[u32]) -> Vec<u32> {
        self.mul(a, &self.r2)
    }

    /// Convert from Montgomery form back to normal: a = ā·R⁻¹ mod n.
    pub fn from_mont(&self, a: &[u32]) -> Vec<u32> {
        let mut plain_one = vec![0u32; self.limb_count()];
        plain_one[0] = 1;
        self.mul(a, &plain_one)
    }

    /// Montgomery multiplication: a·b·R⁻¹ mod n (CIOS).
    /// Both inputs and output are in Montgomery form.
    pub fn mul(&self, a: &[u32], b: &[u32]) -> Vec<u32> {
        let len = self.limb_count();
        debug_assert_eq!(a.len(), len);
        debug_assert_eq!(b.len(), len);

        let mut t = vec![0u32; len + 2];
        for i in 0..len {
            // t += a[i] * b
            let ai = a[i] as u64;
            let mut carry: u64 = 0;
            for j in 0..len {
                let acc = t[j] as u64 + ai * b[j] as u64 + carry;
                t[j] = acc as u32;
                carry = acc >> 32;
            }
            let acc = t[len] as u64 + carry;
            t[len] = acc as u32;
            t[len + 1] = (acc >> 32) as u32;

            // Reduction: add m·n so the lowest limb cancels, then shift it out
            let m = t[0].wrapping_mul(self.n_prime) as u64;
            let acc = t[0] as u64 + m * self.n[0] as u64;
            debug_assert_eq!(acc as u32, 0, "REDC must cancel the low limb");
            let mut carry = acc >> 32;
            for j in 1..len {
                let acc = t[j] as u64 + m * self.n[j] as u64 + carry;
                t[j - 1] = acc as u32;
                carry = acc >> 32;
            }
            let acc = t[len] as u64 + carry;
            t[len - 1] = acc as u32;
            t[len] = t[len + 1] + (acc >> 32) as u32;
            t[len + 1] = 0;
        }

        // Result is below 2n: one conditional subtract normalizes it
        if t[len] != 0 || ge(&t[..len], &self.n) {
            let borrow = sub_in_place(&mut t[..len], &self.n);
            debug_assert_eq!(borrow, t[len], "subtract must consume the overflow limb");
        }
        t.truncate(len);
        t
    }

    /// Montgomery squaring.
    pub fn sqr(&self, a: &[u32]) -> Vec<u32> {
        self.mul(a, a)
    }

    /// Modular exponentiation in Montgomery form, scanning `exp` bits from
    /// the least significant end. Input base must be in Montgomery form;
    /// returns the result in Montgomery form.
    pub fn pow_mod(&self, base: &[u32], exp: &Integer) -> Vec<u32> {
        let mut result = self.one.clone();
        let mut b = base.to_vec();
        let bits = exp.significant_bits();
        for i in 0..bits {
            if exp.get_bit(i) {
                result = self.mul(&result, &b);
            }
            if i + 1 < bits {
                b = self.sqr(&b);
            }
        }
        result
    }
}

/// One Miller–Rabin witness round, exactly as the kernel runs it.
///
/// Requires odd n > 3 and a witness in [2, n-2]. Returns true when the
/// witness proves n composite; false means n survived this round. The whole
/// sequence stays in the Montgomery domain (the domain map is a bijection,
/// so comparing against the mapped 1 and n-1 is exact).
pub fn witness_round(n: &Integer, witness: u32) -> bool {
    debug_assert!(n.is_odd() && *n > 3);

    let ctx = MontgomeryCtx::new(n);
    let len = ctx.limb_count();

    let n_minus_1 = Integer::from(n - 1u32);
    let s = n_minus_1.find_one(0).expect("n-1 of an odd n > 3 is even and nonzero");
    let d = Integer::from(&n_minus_1 >> s);

    let w_m = ctx.to_mont(&to_limbs(&Integer::from(witness), len));
    let minus_one_m = ctx.to_mont(&to_limbs(&n_minus_1, len));

    // acc = witness^d in Montgomery form
    let mut acc = ctx.pow_mod(&w_m, &d);
    if acc == ctx.one || acc == minus_one_m {
        return false;
    }
    for _ in 1..s {
        acc = ctx.sqr(&acc);
        if acc == minus_one_m {
            return false;
        }
        if acc == ctx.one {
            // Reached 1 without passing n-1: nontrivial square root of 1
            return true;
        }
    }
    true
}
