// inputs.rs — Random input-vector sampling
//
// Given a parameter-type signature, produces stringified argument vectors
// for a test run. Real draws are stratified across magnitude classes (near
// zero, unit, moderate, large) because rounding and contraction divergence
// concentrates at the edges of the representable range. Integer parameters
// are not a differential target and take a fixed sentinel.
//
// Preconditions: signature from the emitters (declaration order).
// Postconditions: one value per scalar, `array_len` values per array;
//                 every call advances the generator, so consecutive calls
//                 yield independent vectors.
// Failure modes: none.
// Side effects: advances the RNG.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ast::TypeTag;

/// Fixed value for int parameters (loop trip counts).
pub const INT_SENTINEL: &str = "5";

pub struct InputSampler {
    rng: ChaCha8Rng,
    array_len: usize,
}

impl InputSampler {
    pub fn with_seed(seed: u64, array_len: usize) -> Self {
        InputSampler {
            rng: ChaCha8Rng::seed_from_u64(seed),
            array_len,
        }
    }

    /// Produce one input vector for the signature: stringified values in
    /// parameter order, arrays flattened to one value per element.
    pub fn sample(&mut self, signature: &[TypeTag]) -> Vec<String> {
        let mut out = Vec::new();
        for ty in signature {
            match ty {
                TypeTag::Int => out.push(INT_SENTINEL.to_string()),
                TypeTag::Real => out.push(self.real()),
                TypeTag::RealArray => {
                    for _ in 0..self.array_len {
                        out.push(self.real());
                    }
                }
            }
        }
        out
    }

    /// One stratified real draw, rendered in a form atof() accepts exactly.
    fn real(&mut self) -> String {
        let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let v = match self.rng.gen_range(0..4u8) {
            // Near zero: 10^-5 .. 10^-30 magnitudes.
            0 => {
                let e = self.rng.gen_range(5..=30);
                sign * self.rng.gen_range(1.0..10.0) * 10f64.powi(-e)
            }
            // Unit interval.
            1 => sign * self.rng.gen_range(0.0..1.0),
            // Moderate magnitudes.
            2 => sign * self.rng.gen_range(1.0..1.0e3),
            // Large magnitudes: up to 10^30.
            _ => {
                let e = self.rng.gen_range(5..=30);
                sign * self.rng.gen_range(1.0..10.0) * 10f64.powi(e)
            }
        };
        format!("{v:e}")
    }
}
