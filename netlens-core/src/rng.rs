//! Random number generator construction.
//!
//! Every stochastic algorithm takes `&mut impl Rng`; callers pick a seeded
//! generator for reproducible runs or an entropy-seeded one otherwise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `StdRng` seeded from `seed`, or from OS entropy when `None`.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Standard normal draw via the Box-Muller transform.
pub fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps ln finite.
    let u1: f64 = 1.0 - rng.gen_range(0.0..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
