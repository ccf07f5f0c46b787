// generate.rs — Program generation entry point
//
// Orchestrates TypeEnvironment + StatementBuilder into one frozen Program.
// Randomness is an explicit injected seed: identical (seed, limits) pairs
// produce identical programs, so any divergence finding can be regenerated.
//
// Preconditions: limits validated (caller contract; violations fail fast).
// Postconditions: the returned Program satisfies every GenLimits bound.
// Failure modes: none — generation always succeeds for valid limits.
// Side effects: none.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::ast::{Program, TypeTag};
use crate::cfg::GenLimits;
use crate::stmtgen::StmtBuilder;
use crate::tyenv::TypeEnvironment;

/// Parameters beyond the accumulator: at least two so most programs mix
/// scalar, array, and loop-bound material.
const MIN_EXTRA_PARAMS: usize = 2;
const MAX_EXTRA_PARAMS: usize = 6;

/// Generate one program from an explicit seed.
pub fn generate(seed: u64, limits: &GenLimits) -> Program {
    // Caller contract: limits are validated before generation begins.
    assert!(
        limits.validate().is_ok(),
        "generate() called with invalid limits"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut env = TypeEnvironment::new(limits.array_size);
    let extra = rng.gen_range(MIN_EXTRA_PARAMS..=MAX_EXTRA_PARAMS);
    for _ in 0..extra {
        let ty = match rng.gen_range(0..3) {
            0 => TypeTag::Int,
            1 => TypeTag::Real,
            _ => TypeTag::RealArray,
        };
        env.declare_param(ty);
    }

    let body = StmtBuilder::new(&mut rng, limits).block(&mut env, 0);
    env.into_program(body)
}

/// SHA-256 fingerprint of a rendered source text, as lowercase hex.
/// Recorded next to each generated test so a resumed run can verify it is
/// extending the same program set.
pub fn source_fingerprint(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let mut s = String::with_capacity(64);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}
