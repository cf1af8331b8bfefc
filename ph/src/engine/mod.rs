//! Residue engine - the modular-arithmetic capability workers consume
//!
//! The loop only depends on the [`ResidueEngine`] contract. [`NativeEngine`]
//! is the bundled implementation; a faster kernel (FFT multiplication, GPU)
//! can be plugged in behind the same trait.

use num_bigint::BigUint;

mod error;
mod lucas;
mod primality;

pub use error::EngineError;
pub use lucas::{NativeEngine, mersenne};
pub use primality::{Verdict, classify, is_prime_small, is_probable_prime};

/// Contract for the squaring-and-reduction kernel
///
/// `advance` is CPU-bound and never yields. Callers on an async runtime should
/// run it on the blocking pool.
pub trait ResidueEngine: Send + Sync {
    /// Apply `r -> (r^2 - 2) mod modulus` exactly `steps` times
    ///
    /// Requires `residue < modulus` and returns a value below `modulus`.
    /// Any internal failure is a `ComputationFault`, never a wrong residue.
    fn advance(&self, residue: &BigUint, modulus: &BigUint, steps: u64) -> Result<BigUint, EngineError>;

    /// Construct `2^p - 1`
    fn mersenne(&self, p: u64) -> BigUint;

    /// Exact primality for values in native range
    fn is_prime_small(&self, n: u64) -> bool {
        primality::is_prime_small(n)
    }

    /// Probabilistic primality; `false` is definite, `true` is only probable
    fn is_probable_prime(&self, n: &BigUint) -> bool {
        primality::is_probable_prime(n)
    }

    /// Routed check: exact below 2^64, probabilistic above
    fn classify(&self, n: &BigUint) -> Verdict {
        primality::classify(n)
    }
}
