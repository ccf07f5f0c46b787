// AST node types for generated test programs.
//
// A Program is constructed once by the generator and frozen: every emitter
// renders the same tree, and reproducibility of divergence findings depends
// on the frozen AST being the single ground truth behind all variants.
//
// Preconditions: produced by the generator within configured bounds.
// Postconditions: expression trees carry their node count via `Expr::size`.
// Failure modes: none (data-only module).
// Side effects: none.

// ── Types ──

/// The type of a declared variable, for its entire lifetime in a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Real,
    RealArray,
}

// ── Expressions ──

/// Arithmetic binary operator. Deliberately restricted to the four
/// operations whose optimization paths the tester targets. Division by
/// zero stays a legitimate runtime behavior under test: inf/nan results
/// are classified by the analyzer, never suppressed by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// Unary math library functions the generator may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Fabs,
    Floor,
    Ceil,
}

impl MathFn {
    pub const ALL: [MathFn; 15] = [
        MathFn::Sqrt,
        MathFn::Exp,
        MathFn::Log,
        MathFn::Sin,
        MathFn::Cos,
        MathFn::Tan,
        MathFn::Asin,
        MathFn::Acos,
        MathFn::Atan,
        MathFn::Sinh,
        MathFn::Cosh,
        MathFn::Tanh,
        MathFn::Fabs,
        MathFn::Floor,
        MathFn::Ceil,
    ];

    pub fn c_name(self) -> &'static str {
        match self {
            MathFn::Sqrt => "sqrt",
            MathFn::Exp => "exp",
            MathFn::Log => "log",
            MathFn::Sin => "sin",
            MathFn::Cos => "cos",
            MathFn::Tan => "tan",
            MathFn::Asin => "asin",
            MathFn::Acos => "acos",
            MathFn::Atan => "atan",
            MathFn::Sinh => "sinh",
            MathFn::Cosh => "cosh",
            MathFn::Tanh => "tanh",
            MathFn::Fabs => "fabs",
            MathFn::Floor => "floor",
            MathFn::Ceil => "ceil",
        }
    }
}

/// Index expression for array reads/writes. Always int-typed and always in
/// bounds: a literal below the array length, or an in-scope loop variable
/// whose loop bound never exceeds the array length.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexExpr {
    Lit(usize),
    LoopVar(String),
}

/// A real-typed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(f64),
    Var(String),
    Bin {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: MathFn,
        arg: Box<Expr>,
    },
    Index {
        array: String,
        index: IndexExpr,
    },
}

impl Expr {
    /// Number of nodes in the tree. Invariant: <= MAX_EXPRESSION_SIZE.
    pub fn size(&self) -> usize {
        match self {
            Expr::Lit(_) | Expr::Var(_) | Expr::Index { .. } => 1,
            Expr::Bin { lhs, rhs, .. } => 1 + lhs.size() + rhs.size(),
            Expr::Call { arg, .. } => 1 + arg.size(),
        }
    }
}

// ── Conditions ──

/// Relational operator for conditional statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

/// A condition comparing two real expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    pub lhs: Expr,
    pub op: CmpOp,
    pub rhs: Expr,
}

// ── Statements ──

/// Assignment target: a scalar real variable or an array element.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Var(String),
    Element { array: String, index: IndexExpr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Accum,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Accum => "+=",
        }
    }
}

/// Loop trip count: an int parameter (sentinel runtime value) or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopBound {
    Lit(u32),
    IntParam(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Expr,
    },
    If {
        cond: Cond,
        then_block: Block,
        else_block: Option<Block>,
    },
    Loop {
        var: String,
        bound: LoopBound,
        body: Block,
    },
}

/// Ordered statement sequence. Invariants: <= MAX_LINES_IN_BLOCK statements;
/// nested blocks never exceed MAX_NESTING_LEVELS depth; sibling nested
/// constructs per block <= MAX_SAME_LEVEL_BLOCKS.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

// ── Program ──

/// A declared parameter, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeTag,
}

/// A complete generated test program. Immutable after generation.
///
/// The first parameter is always the real-typed accumulator `comp`: it is
/// fed from the input vector like every other parameter, mutated by the
/// body, and printed as the single output line.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub params: Vec<Param>,
    /// Scalar real locals, declared (zero-initialized) at function entry.
    pub locals: Vec<String>,
    pub body: Block,
    /// Fixed length of every RealArray parameter.
    pub array_len: usize,
}

impl Program {
    /// Ordered parameter-type signature. Identical across all emitters for
    /// the same program, so one input vector drives binaries built from any
    /// rendered variant.
    pub fn signature(&self) -> Vec<TypeTag> {
        self.params.iter().map(|p| p.ty).collect()
    }

    /// Name of the printed accumulator.
    pub fn result_var(&self) -> &str {
        &self.params[0].name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_size_counts_nodes() {
        // comp + sqrt(2.5)  →  Bin(Var, Call(Lit)) = 4 nodes
        let e = Expr::Bin {
            op: BinOp::Add,
            lhs: Box::new(Expr::Var("comp".into())),
            rhs: Box::new(Expr::Call {
                func: MathFn::Sqrt,
                arg: Box::new(Expr::Lit(2.5)),
            }),
        };
        assert_eq!(e.size(), 4);
    }

    #[test]
    fn signature_preserves_declaration_order() {
        let p = Program {
            params: vec![
                Param {
                    name: "comp".into(),
                    ty: TypeTag::Real,
                },
                Param {
                    name: "var_1".into(),
                    ty: TypeTag::RealArray,
                },
                Param {
                    name: "var_2".into(),
                    ty: TypeTag::Int,
                },
            ],
            locals: vec![],
            body: Block::default(),
            array_len: 10,
        };
        assert_eq!(
            p.signature(),
            vec![TypeTag::Real, TypeTag::RealArray, TypeTag::Int]
        );
        assert_eq!(p.result_var(), "comp");
    }
}
