// tyenv.rs — Type environment for program generation
//
// Tracks declared parameters, scalar real locals, and the loop-variable
// scope stack while a program is being built. Names are allocated in
// generation order, so identical seeds yield identical environments.
//
// Preconditions: array_len >= 1.
// Postconditions: `into_program` hands every declaration to the frozen AST.
// Failure modes: none.
// Side effects: none.

use crate::ast::{Block, Param, Program, TypeTag};

/// Mutable declaration state consulted by the expression and statement
/// builders, consumed by the emitters via the finished Program.
#[derive(Debug)]
pub struct TypeEnvironment {
    params: Vec<Param>,
    locals: Vec<String>,
    /// Innermost-last stack of in-scope loop variables.
    loop_vars: Vec<String>,
    array_len: usize,
    next_local: u32,
}

impl TypeEnvironment {
    /// Create an environment with the accumulator `comp` already declared
    /// as the first (real-typed) parameter.
    pub fn new(array_len: usize) -> Self {
        TypeEnvironment {
            params: vec![Param {
                name: "comp".to_string(),
                ty: TypeTag::Real,
            }],
            locals: Vec::new(),
            loop_vars: Vec::new(),
            array_len,
            next_local: 1,
        }
    }

    pub fn array_len(&self) -> usize {
        self.array_len
    }

    /// Declare a fresh parameter of the given type; names follow the
    /// declaration index ("var_1", "var_2", ...).
    pub fn declare_param(&mut self, ty: TypeTag) -> String {
        let name = format!("var_{}", self.params.len());
        self.params.push(Param {
            name: name.clone(),
            ty,
        });
        name
    }

    /// Declare a fresh scalar real local ("tmp_1", "tmp_2", ...). Locals
    /// are zero-initialized at function entry so any read is defined.
    pub fn declare_local(&mut self) -> String {
        let name = format!("tmp_{}", self.next_local);
        self.next_local += 1;
        self.locals.push(name.clone());
        name
    }

    pub fn push_loop_var(&mut self) -> String {
        let name = format!("i_{}", self.loop_vars.len());
        self.loop_vars.push(name.clone());
        name
    }

    pub fn pop_loop_var(&mut self) {
        self.loop_vars.pop();
    }

    /// Innermost loop variable, if any statement is being built inside a loop.
    pub fn current_loop_var(&self) -> Option<&str> {
        self.loop_vars.last().map(String::as_str)
    }

    /// Names readable in a real-typed expression position: the accumulator,
    /// real parameters, and declared locals.
    pub fn real_scalars(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.ty == TypeTag::Real)
            .map(|p| p.name.clone())
            .chain(self.locals.iter().cloned())
            .collect()
    }

    /// Names of real-array parameters.
    pub fn arrays(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.ty == TypeTag::RealArray)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Names of int parameters (loop-bound candidates).
    pub fn int_params(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.ty == TypeTag::Int)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Freeze the environment and body into an immutable Program.
    pub fn into_program(self, body: Block) -> Program {
        debug_assert!(self.loop_vars.is_empty(), "unbalanced loop scope");
        Program {
            params: self.params,
            locals: self.locals,
            body,
            array_len: self.array_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comp_is_always_first() {
        let env = TypeEnvironment::new(10);
        let sig = env.into_program(Block::default()).signature();
        assert_eq!(sig, vec![TypeTag::Real]);
    }

    #[test]
    fn declaration_order_is_stable() {
        let mut env = TypeEnvironment::new(10);
        assert_eq!(env.declare_param(TypeTag::Int), "var_1");
        assert_eq!(env.declare_param(TypeTag::RealArray), "var_2");
        assert_eq!(env.declare_param(TypeTag::Real), "var_3");
        assert_eq!(env.declare_local(), "tmp_1");
        assert_eq!(env.declare_local(), "tmp_2");

        assert_eq!(env.int_params(), vec!["var_1"]);
        assert_eq!(env.arrays(), vec!["var_2"]);
        assert_eq!(env.real_scalars(), vec!["comp", "var_3", "tmp_1", "tmp_2"]);

        let prog = env.into_program(Block::default());
        assert_eq!(
            prog.signature(),
            vec![
                TypeTag::Real,
                TypeTag::Int,
                TypeTag::RealArray,
                TypeTag::Real
            ]
        );
    }

    #[test]
    fn loop_scope_stack() {
        let mut env = TypeEnvironment::new(10);
        assert!(env.current_loop_var().is_none());
        let outer = env.push_loop_var();
        assert_eq!(outer, "i_0");
        let inner = env.push_loop_var();
        assert_eq!(inner, "i_1");
        assert_eq!(env.current_loop_var(), Some("i_1"));
        env.pop_loop_var();
        assert_eq!(env.current_loop_var(), Some("i_0"));
        env.pop_loop_var();
        assert!(env.current_loop_var().is_none());
    }
}
