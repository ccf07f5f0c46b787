// fpdrift — floating-point differential tester
//
// Library root. Generates bounded random real-arithmetic programs, renders
// them for CPU/CUDA/HIP toolchains, drives the compile × optimize × execute
// matrix, and classifies output divergences.

pub mod ast;
pub mod cfg;
pub mod divergence;
pub mod emit;
pub mod error;
pub mod exprgen;
pub mod generate;
pub mod inputs;
pub mod job;
pub mod layout;
pub mod matrix;
pub mod report;
pub mod stmtgen;
pub mod store;
pub mod toolchain;
pub mod tyenv;
