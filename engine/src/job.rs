// job.rs — Structured identity for compile/run jobs
//
// Every job and result carries a first-class `{program, compiler, opt}` key.
// On-disk artifact names are *derived* from the key; they are never parsed
// back into one.
//
// Preconditions: none (types only).
// Postconditions: `binary_file_name` is deterministic per key.
// Failure modes: none.
// Side effects: none.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ── Compiler identity ───────────────────────────────────────────────────

/// Compiler toolchain families with distinct flag dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerFamily {
    Gcc,
    Clang,
    Nvcc,
    Hipcc,
    Pgi,
    Xlc,
    Other,
}

/// A compiler under test: a short stable name (used in result keys and
/// artifact names) and the executable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSpec {
    pub name: String,
    pub path: PathBuf,
}

impl CompilerSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        CompilerSpec {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Family detection by substring of the configured name, so entries
    /// like "my_nvcc_122" select the right dialect.
    pub fn family(&self) -> CompilerFamily {
        let n = self.name.as_str();
        if n.contains("nvcc") {
            CompilerFamily::Nvcc
        } else if n.contains("hipcc") {
            CompilerFamily::Hipcc
        } else if n.contains("clang") {
            CompilerFamily::Clang
        } else if n.contains("gcc") {
            CompilerFamily::Gcc
        } else if n.contains("pgi") {
            CompilerFamily::Pgi
        } else if n.contains("xlc") {
            CompilerFamily::Xlc
        } else {
            CompilerFamily::Other
        }
    }
}

// ── Optimization level ──────────────────────────────────────────────────

/// Fused-multiply-add contraction sub-variant of an optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FmaVariant {
    On,
    Off,
}

/// A (flag, fma) pairing, e.g. `-O0` with contraction disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptLevel {
    /// The optimization flag as passed to the compiler, e.g. "-O0".
    pub flag: String,
    pub fma: FmaVariant,
}

impl OptLevel {
    pub fn new(flag: impl Into<String>, fma: FmaVariant) -> Self {
        OptLevel {
            flag: flag.into(),
            fma,
        }
    }

    /// Stable tag used in result-store keys and artifact names:
    /// "O0", "O0_nofma", "O3", ...
    pub fn tag(&self) -> String {
        let base = self.flag.trim_start_matches('-');
        match self.fma {
            FmaVariant::On => base.to_string(),
            FmaVariant::Off => format!("{base}_nofma"),
        }
    }
}

// ── Job key ─────────────────────────────────────────────────────────────

/// Identity of one compiled binary in the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKey {
    /// Program identity: run-relative path stem, e.g. "_tests/_group_1/_test_3".
    pub program: String,
    pub compiler: String,
    pub opt: OptLevel,
}

impl JobKey {
    /// Binary file name derived from the key. The stem is the test file
    /// stem only (the group directory supplies the rest of the path).
    pub fn binary_file_name(&self, stem: &str) -> String {
        format!("{stem}-{}-{}.exe", self.compiler, self.opt.tag())
    }
}
