// exprgen.rs — Bounded random expression construction
//
// Builds real-typed expression trees over a TypeEnvironment. Every
// recursive call carries a node budget; once the budget cannot fit a
// compound production the builder falls back to a terminal (literal,
// variable, or array read), so construction terminates for any RNG stream.
//
// Preconditions: limits validated (max_expression_size >= 1).
// Postconditions: returned trees satisfy `expr.size() <= budget`.
// Failure modes: none.
// Side effects: advances the RNG.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::ast::{BinOp, CmpOp, Cond, Expr, IndexExpr, MathFn};
use crate::cfg::GenLimits;
use crate::tyenv::TypeEnvironment;

const BIN_OPS: [BinOp; 4] = [BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::Div];
const CMP_OPS: [CmpOp; 4] = [CmpOp::Lt, CmpOp::Gt, CmpOp::Le, CmpOp::Ge];

/// Non-terminal production kinds, used for the uniform choice.
#[derive(Clone, Copy, PartialEq)]
enum Production {
    Literal,
    Variable,
    Binary,
    ArrayRead,
}

pub struct ExprBuilder<'a> {
    rng: &'a mut ChaCha8Rng,
    limits: &'a GenLimits,
}

impl<'a> ExprBuilder<'a> {
    pub fn new(rng: &'a mut ChaCha8Rng, limits: &'a GenLimits) -> Self {
        ExprBuilder { rng, limits }
    }

    /// Build a real-typed expression with at most `budget` tree nodes.
    pub fn real_expr(&mut self, env: &TypeEnvironment, budget: usize) -> Expr {
        debug_assert!(budget >= 1);

        // Math calls are probability-gated rather than part of the uniform
        // choice, so MATH_FUNC_PROBABILITY directly controls call density.
        if self.limits.math_func_allowed
            && budget >= 2
            && self.rng.gen_bool(self.limits.math_func_probability)
        {
            let func = MathFn::ALL[self.rng.gen_range(0..MathFn::ALL.len())];
            let arg = self.real_expr(env, budget - 1);
            return Expr::Call {
                func,
                arg: Box::new(arg),
            };
        }

        let mut candidates = vec![Production::Literal, Production::Variable];
        if !env.arrays().is_empty() {
            candidates.push(Production::ArrayRead);
        }
        // A binary node needs one node for itself and one per operand.
        if budget >= 3 {
            candidates.push(Production::Binary);
        }

        match candidates[self.rng.gen_range(0..candidates.len())] {
            Production::Literal => Expr::Lit(self.literal()),
            Production::Variable => Expr::Var(self.pick(env.real_scalars())),
            Production::ArrayRead => Expr::Index {
                array: self.pick(env.arrays()),
                index: self.index_expr(env),
            },
            Production::Binary => {
                let op = BIN_OPS[self.rng.gen_range(0..BIN_OPS.len())];
                let lhs_budget = self.rng.gen_range(1..=budget - 2);
                let rhs_budget = budget - 1 - lhs_budget;
                let lhs = self.real_expr(env, lhs_budget);
                let rhs = self.real_expr(env, rhs_budget);
                Expr::Bin {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
        }
    }

    /// Build a condition comparing two bounded real expressions.
    pub fn cond(&mut self, env: &TypeEnvironment) -> Cond {
        let budget = self.limits.max_expression_size;
        Cond {
            lhs: self.real_expr(env, budget),
            op: CMP_OPS[self.rng.gen_range(0..CMP_OPS.len())],
            rhs: self.real_expr(env, budget),
        }
    }

    /// In-bounds index: the innermost loop variable when one is in scope
    /// (loop bounds never exceed the array length), else a literal.
    pub fn index_expr(&mut self, env: &TypeEnvironment) -> IndexExpr {
        match env.current_loop_var() {
            Some(v) if self.rng.gen_bool(0.5) => IndexExpr::LoopVar(v.to_string()),
            _ => IndexExpr::Lit(self.rng.gen_range(0..env.array_len())),
        }
    }

    /// One-decimal literal in (0, 100). Kept coarse so emitted text is
    /// identical however the host formats floats.
    fn literal(&mut self) -> f64 {
        self.rng.gen_range(1..=999) as f64 / 10.0
    }

    fn pick(&mut self, names: Vec<String>) -> String {
        debug_assert!(!names.is_empty());
        let i = self.rng.gen_range(0..names.len());
        names.into_iter().nth(i).unwrap_or_default()
    }
}
