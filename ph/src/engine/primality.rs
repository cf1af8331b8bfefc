//! Primality predicates and the small/large routing rule

use num_bigint::BigUint;
use num_prime::PrimalityTestConfig;
use num_prime::nt_funcs::{is_prime, is_prime64};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outcome of a routed primality check
///
/// `ProbablePrime` is only ever produced for values wider than 64 bits, where
/// the test is probabilistic. `Composite` is always definite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Prime,
    ProbablePrime,
    Composite,
}

impl Verdict {
    /// Whether the value should be reported as (probably) prime
    pub fn is_prime(&self) -> bool {
        !matches!(self, Verdict::Composite)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Prime => write!(f, "prime"),
            Verdict::ProbablePrime => write!(f, "probable prime"),
            Verdict::Composite => write!(f, "composite"),
        }
    }
}

/// Deterministic primality for any `u64`
pub fn is_prime_small(n: u64) -> bool {
    is_prime64(n)
}

/// Baillie-PSW probable-prime test for arbitrary-width values
pub fn is_probable_prime(n: &BigUint) -> bool {
    debug!(bits = n.bits(), "is_probable_prime: called");
    is_prime(n, Some(PrimalityTestConfig::bpsw())).probably()
}

/// Route to the exact test whenever the value fits in 64 bits
pub fn classify(n: &BigUint) -> Verdict {
    match n.to_u64() {
        Some(small) => {
            debug!(n = small, "classify: native range");
            if is_prime_small(small) {
                Verdict::Prime
            } else {
                Verdict::Composite
            }
        }
        None => {
            debug!(bits = n.bits(), "classify: wide value, probabilistic path");
            if is_probable_prime(n) {
                Verdict::ProbablePrime
            } else {
                Verdict::Composite
            }
        }
    }
}
