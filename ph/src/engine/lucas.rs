//! In-process Lucas-Lehmer kernel over `num-bigint`

use num_bigint::BigUint;
use num_traits::{One, Zero};
use tracing::debug;

use super::{EngineError, ResidueEngine};

/// Construct `2^p - 1` exactly
pub fn mersenne(p: u64) -> BigUint {
    (BigUint::one() << p) - BigUint::one()
}

/// Return `k` when `modulus == 2^k - 1` (k >= 1)
fn mersenne_exponent(modulus: &BigUint) -> Option<u64> {
    let bits = modulus.bits();
    if bits > 0 && modulus.count_ones() == bits {
        Some(bits)
    } else {
        None
    }
}

/// Reduce `x` modulo `2^k - 1` using `x = (x & M) + (x >> k)`
fn reduce_mersenne(mut x: BigUint, k: u64, modulus: &BigUint) -> BigUint {
    while x.bits() > k {
        x = (&x & modulus) + (&x >> k);
    }
    if &x == modulus { BigUint::zero() } else { x }
}

/// Compute `x - 2 (mod modulus)` for `x < modulus`
fn sub_two(x: BigUint, two: &BigUint, modulus: &BigUint) -> BigUint {
    if &x >= two { x - two } else { x + modulus - two }
}

/// The Lucas-Lehmer kernel used by workers unless another engine is plugged in
///
/// Mersenne-form moduli are reduced with shifts and masks; anything else falls
/// back to generic division. Both paths produce identical residues.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ResidueEngine for NativeEngine {
    fn advance(&self, residue: &BigUint, modulus: &BigUint, steps: u64) -> Result<BigUint, EngineError> {
        debug!(modulus_bits = modulus.bits(), steps, "NativeEngine::advance: called");
        if modulus.is_zero() {
            return Err(EngineError::fault("modulus is zero"));
        }
        if residue >= modulus {
            return Err(EngineError::fault(format!(
                "residue ({} bits) is not below modulus ({} bits)",
                residue.bits(),
                modulus.bits()
            )));
        }

        let two = BigUint::from(2u32) % modulus;
        let shape = mersenne_exponent(modulus);
        debug!(?shape, "NativeEngine::advance: modulus shape");

        let mut r = residue.clone();
        for _ in 0..steps {
            let square = &r * &r;
            let reduced = match shape {
                Some(k) => reduce_mersenne(square, k, modulus),
                None => square % modulus,
            };
            r = sub_two(reduced, &two, modulus);
        }

        if &r >= modulus {
            return Err(EngineError::fault("kernel produced a residue outside the modulus"));
        }
        Ok(r)
    }

    fn mersenne(&self, p: u64) -> BigUint {
        mersenne(p)
    }
}
