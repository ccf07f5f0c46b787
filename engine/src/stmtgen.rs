// stmtgen.rs — Bounded random statement/block construction
//
// Builds statement trees (assignments, conditionals, loops) over a mutable
// TypeEnvironment using ExprBuilder for every expression position. Nesting
// depth and per-block sibling construct counts are capped so generated
// programs stay small enough to compile and execute quickly at scale.
//
// Preconditions: limits validated.
// Postconditions: every block has 1..=MAX_LINES_IN_BLOCK statements; block
//   depth never exceeds MAX_NESTING_LEVELS; sibling nested constructs per
//   block never exceed MAX_SAME_LEVEL_BLOCKS.
// Failure modes: none.
// Side effects: advances the RNG; declares locals/loop vars in the
//   environment.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::ast::{AssignOp, AssignTarget, Block, LoopBound, Stmt};
use crate::cfg::GenLimits;
use crate::exprgen::ExprBuilder;
use crate::tyenv::TypeEnvironment;

/// Probability that a statement slot becomes a nested construct when the
/// depth and sibling caps still allow one.
const NEST_PROBABILITY: f64 = 0.35;

pub struct StmtBuilder<'a> {
    rng: &'a mut ChaCha8Rng,
    limits: &'a GenLimits,
}

impl<'a> StmtBuilder<'a> {
    pub fn new(rng: &'a mut ChaCha8Rng, limits: &'a GenLimits) -> Self {
        StmtBuilder { rng, limits }
    }

    /// Build a block at the given nesting depth (top level = 0).
    pub fn block(&mut self, env: &mut TypeEnvironment, depth: usize) -> Block {
        let lines = self.rng.gen_range(1..=self.limits.max_lines_in_block);
        let mut nested_here = 0usize;
        let mut stmts = Vec::with_capacity(lines);

        for _ in 0..lines {
            let can_nest = depth < self.limits.max_nesting_levels
                && nested_here < self.limits.max_same_level_blocks;
            if can_nest && self.rng.gen_bool(NEST_PROBABILITY) {
                nested_here += 1;
                if self.rng.gen_bool(0.5) {
                    stmts.push(self.if_stmt(env, depth));
                } else {
                    stmts.push(self.loop_stmt(env, depth));
                }
            } else {
                stmts.push(self.assignment(env));
            }
        }

        Block { stmts }
    }

    fn assignment(&mut self, env: &mut TypeEnvironment) -> Stmt {
        let value = self.expr(env);
        let arrays = env.arrays();
        let has_array = !arrays.is_empty();

        // Accumulating into `comp` dominates so every program's output
        // depends on most of its body.
        let choice = self.rng.gen_range(0..if has_array { 4 } else { 3 });
        let (target, op) = match choice {
            0 | 1 => (AssignTarget::Var("comp".to_string()), AssignOp::Accum),
            2 => {
                let name = env.declare_local();
                (AssignTarget::Var(name), AssignOp::Set)
            }
            _ => {
                let mut eb = ExprBuilder::new(self.rng, self.limits);
                let index = eb.index_expr(env);
                let i = self.rng.gen_range(0..arrays.len());
                (
                    AssignTarget::Element {
                        array: arrays[i].clone(),
                        index,
                    },
                    AssignOp::Set,
                )
            }
        };

        Stmt::Assign { target, op, value }
    }

    fn if_stmt(&mut self, env: &mut TypeEnvironment, depth: usize) -> Stmt {
        let cond = ExprBuilder::new(self.rng, self.limits).cond(env);
        let then_block = self.block(env, depth + 1);
        let else_block = if self.rng.gen_bool(0.5) {
            Some(self.block(env, depth + 1))
        } else {
            None
        };
        Stmt::If {
            cond,
            then_block,
            else_block,
        }
    }

    fn loop_stmt(&mut self, env: &mut TypeEnvironment, depth: usize) -> Stmt {
        // Int-parameter bounds carry the runtime sentinel value 5; only use
        // one when the loop variable stays a valid index for every array.
        let int_params = env.int_params();
        let param_bound_ok =
            !int_params.is_empty() && (env.arrays().is_empty() || env.array_len() >= 5);

        let bound = if param_bound_ok && self.rng.gen_bool(0.5) {
            let i = self.rng.gen_range(0..int_params.len());
            LoopBound::IntParam(int_params[i].clone())
        } else {
            LoopBound::Lit(self.rng.gen_range(1..=env.array_len() as u32))
        };

        let var = env.push_loop_var();
        let body = self.block(env, depth + 1);
        env.pop_loop_var();

        Stmt::Loop { var, bound, body }
    }

    fn expr(&mut self, env: &TypeEnvironment) -> crate::ast::Expr {
        ExprBuilder::new(self.rng, self.limits).real_expr(env, self.limits.max_expression_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeTag;
    use rand::SeedableRng;

    fn max_depth(block: &Block) -> usize {
        block
            .stmts
            .iter()
            .map(|s| match s {
                Stmt::Assign { .. } => 0,
                Stmt::If {
                    then_block,
                    else_block,
                    ..
                } => {
                    let t = 1 + max_depth(then_block);
                    let e = else_block.as_ref().map(|b| 1 + max_depth(b)).unwrap_or(0);
                    t.max(e)
                }
                Stmt::Loop { body, .. } => 1 + max_depth(body),
            })
            .max()
            .unwrap_or(0)
    }

    fn check_block(block: &Block, limits: &GenLimits) {
        assert!(!block.stmts.is_empty());
        assert!(block.stmts.len() <= limits.max_lines_in_block);
        let nested = block
            .stmts
            .iter()
            .filter(|s| !matches!(s, Stmt::Assign { .. }))
            .count();
        assert!(nested <= limits.max_same_level_blocks);
        for s in &block.stmts {
            match s {
                Stmt::Assign { value, .. } => {
                    assert!(value.size() <= limits.max_expression_size)
                }
                Stmt::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    assert!(cond.lhs.size() <= limits.max_expression_size);
                    assert!(cond.rhs.size() <= limits.max_expression_size);
                    check_block(then_block, limits);
                    if let Some(b) = else_block {
                        check_block(b, limits);
                    }
                }
                Stmt::Loop { body, .. } => check_block(body, limits),
            }
        }
    }

    #[test]
    fn blocks_respect_all_limits() {
        let limits = GenLimits::default();
        for seed in 0..100u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut env = TypeEnvironment::new(limits.array_size);
            env.declare_param(TypeTag::Int);
            env.declare_param(TypeTag::RealArray);
            let block = StmtBuilder::new(&mut rng, &limits).block(&mut env, 0);
            check_block(&block, &limits);
            assert!(max_depth(&block) <= limits.max_nesting_levels);
        }
    }

    #[test]
    fn zero_nesting_allows_only_assignments() {
        let mut limits = GenLimits::default();
        limits.max_nesting_levels = 0;
        for seed in 0..50u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut env = TypeEnvironment::new(limits.array_size);
            let block = StmtBuilder::new(&mut rng, &limits).block(&mut env, 0);
            assert!(block
                .stmts
                .iter()
                .all(|s| matches!(s, Stmt::Assign { .. })));
        }
    }
}
