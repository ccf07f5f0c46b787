// divergence.rs — Output comparison and divergence classification
//
// Compares two compilers' recorded outputs cell by cell, filters benign
// floating-point representation differences, and classifies what survives.
// Two filter policies exist because they answer different questions:
//
//   SignInsensitive — pairwise equivalence for {0,-0}, {nan,-nan},
//     {inf,-inf} only; everything else compares exactly. The default.
//   SkipTokens — unconditionally ignore any comparison where either side
//     exactly matches an opaque token (e.g. "nan", "inf"). Coarser; for
//     triaging noisy runs.
//
// Preconditions: a populated ResultStore.
// Postconditions: records are emitted only for cells where both compilers
//                 recorded a result at the same optimization level.
// Failure modes: UsageError when either compiler has no recorded results.
// Side effects: none.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::EngineError;
use crate::store::{ResultCell, ResultStore};

// ── Equivalence filter ──────────────────────────────────────────────────

/// Named divergence-filtering policies. Exactly one is active per analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPolicy {
    /// Pairwise sign-insensitive equivalence for zero/nan/inf.
    SignInsensitive,
    /// Blanket skip when either output equals one of these tokens.
    SkipTokens(Vec<String>),
}

/// Sign-insensitive textual equivalence, for exactly three value classes.
/// "0"/"-0", "nan"/"-nan", and "inf"/"-inf" are equivalent; nothing else
/// gains sign insensitivity ("5" vs "-5" stays a divergence).
pub fn equivalent(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let sa = a.strip_prefix('-').unwrap_or(a);
    let sb = b.strip_prefix('-').unwrap_or(b);
    sa == sb && matches!(sa, "0" | "nan" | "inf")
}

// ── Classification ──────────────────────────────────────────────────────

/// Output value class, by simple textual inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bucket {
    Nan,
    Inf,
    Zero,
    Num,
}

pub fn bucket(s: &str) -> Bucket {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    match unsigned {
        "nan" => Bucket::Nan,
        "inf" => Bucket::Inf,
        _ => match unsigned.parse::<f64>() {
            Ok(v) if v == 0.0 => Bucket::Zero,
            // Unparseable text is treated as an opaque number: the record
            // still surfaces, statistics just bucket it coarsely.
            _ => Bucket::Num,
        },
    }
}

/// Unordered bucket-pair category, for aggregate statistics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    NanVsInf,
    NanVsZero,
    NanVsNum,
    InfVsZero,
    InfVsNum,
    NumVsZero,
    NumVsNum,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::NanVsInf,
        Category::NanVsZero,
        Category::NanVsNum,
        Category::InfVsZero,
        Category::InfVsNum,
        Category::NumVsZero,
        Category::NumVsNum,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::NanVsInf => "nan_vs_inf",
            Category::NanVsZero => "nan_vs_zero",
            Category::NanVsNum => "nan_vs_num",
            Category::InfVsZero => "inf_vs_zero",
            Category::InfVsNum => "inf_vs_num",
            Category::NumVsZero => "num_vs_zero",
            Category::NumVsNum => "num_vs_num",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // pad() honors width/alignment flags; report columns rely on them.
        f.pad(self.name())
    }
}

/// Categorize a surviving divergence. Total: every output pair maps to
/// exactly one category. Textually unequal outputs in the same bucket
/// (reachable only for zeros under SkipTokens) count as num_vs_num —
/// zeros are ordinary numbers for statistics.
pub fn categorize(a: &str, b: &str) -> Category {
    let (x, y) = (bucket(a).min(bucket(b)), bucket(a).max(bucket(b)));
    match (x, y) {
        (Bucket::Nan, Bucket::Inf) => Category::NanVsInf,
        (Bucket::Nan, Bucket::Zero) => Category::NanVsZero,
        (Bucket::Nan, Bucket::Num) => Category::NanVsNum,
        (Bucket::Inf, Bucket::Zero) => Category::InfVsZero,
        (Bucket::Inf, Bucket::Num) => Category::InfVsNum,
        (Bucket::Zero, Bucket::Num) => Category::NumVsZero,
        _ => Category::NumVsNum,
    }
}

// ── Records ─────────────────────────────────────────────────────────────

/// One suspected miscompilation: same program, input, and optimization
/// level; different output from two compilers. Immutable audit value.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceRecord {
    pub program: String,
    pub input: String,
    pub opt_tag: String,
    pub compiler_a: String,
    pub compiler_b: String,
    pub cell_a: ResultCell,
    pub cell_b: ResultCell,
    pub category: Category,
}

// ── Analyzer ────────────────────────────────────────────────────────────

pub struct DivergenceAnalyzer {
    policy: FilterPolicy,
}

impl DivergenceAnalyzer {
    pub fn new(policy: FilterPolicy) -> Self {
        DivergenceAnalyzer { policy }
    }

    /// Compare two compilers across every (program, input, opt) cell where
    /// both recorded a result.
    pub fn compare(
        &self,
        store: &ResultStore,
        compiler_a: &str,
        compiler_b: &str,
    ) -> Result<Vec<DivergenceRecord>, EngineError> {
        for name in [compiler_a, compiler_b] {
            if !store.has_compiler(name) {
                return Err(EngineError::Usage(format!(
                    "compiler '{name}' has no recorded results"
                )));
            }
        }

        let mut records = Vec::new();
        for (program, input, compilers) in store.iter() {
            let (Some(cells_a), Some(cells_b)) =
                (compilers.get(compiler_a), compilers.get(compiler_b))
            else {
                continue;
            };
            for (opt_tag, cell_a) in cells_a {
                let Some(cell_b) = cells_b.get(opt_tag) else {
                    continue;
                };
                let (out_a, out_b) = (cell_a.output.as_str(), cell_b.output.as_str());
                if out_a == out_b || self.filtered(out_a, out_b) {
                    continue;
                }
                records.push(DivergenceRecord {
                    program: program.clone(),
                    input: input.clone(),
                    opt_tag: opt_tag.clone(),
                    compiler_a: compiler_a.to_string(),
                    compiler_b: compiler_b.to_string(),
                    cell_a: cell_a.clone(),
                    cell_b: cell_b.clone(),
                    category: categorize(out_a, out_b),
                });
            }
        }
        Ok(records)
    }

    fn filtered(&self, a: &str, b: &str) -> bool {
        match &self.policy {
            FilterPolicy::SignInsensitive => equivalent(a, b),
            FilterPolicy::SkipTokens(tokens) => {
                tokens.iter().any(|t| t == a) || tokens.iter().any(|t| t == b)
            }
        }
    }
}

// ── Persistence shape ───────────────────────────────────────────────────

type CellTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>>;

/// Nested JSON restricted to divergent cells:
/// program → input → compiler → opt → recorded value.
pub fn divergences_json(records: &[DivergenceRecord]) -> Value {
    let mut tree = CellTree::new();
    for r in records {
        let input = tree
            .entry(r.program.clone())
            .or_default()
            .entry(r.input.clone())
            .or_default();
        for (compiler, cell) in [(&r.compiler_a, &r.cell_a), (&r.compiler_b, &r.cell_b)] {
            input
                .entry(compiler.clone())
                .or_default()
                .insert(r.opt_tag.clone(), cell.to_string());
        }
    }
    serde_json::to_value(tree).unwrap_or(Value::Null)
}
