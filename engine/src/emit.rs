// emit.rs — Source rendering for plain C, CUDA, and HIP
//
// All three emitters consume the same frozen Program and share one body
// renderer, so expression structure, operator order, and parameter order
// are byte-identical across variants; only the kernel wrapping and the
// device-buffer plumbing differ. Nothing here re-randomizes or reorders.
//
// Preconditions: Program produced by the generator (bounds hold, array
//                reads in bounds, locals zero-initialized).
// Postconditions: returned SourceUnit carries the rendered text and the
//                 ordered parameter-type signature, identical for every
//                 backend rendering of the same Program.
// Failure modes: none from rendering; descriptor parsing rejects unknown
//                type names.
// Side effects: none.

use crate::ast::{
    AssignTarget, Block, Cond, Expr, IndexExpr, LoopBound, Param, Program, Stmt, TypeTag,
};
use crate::cfg::RealType;
use crate::error::EngineError;

// ── Public types ────────────────────────────────────────────────────────

/// Target compilation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Plain,
    Cuda,
    Hip,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Plain, Backend::Cuda, Backend::Hip];

    /// Source file extension for this backend.
    pub fn extension(self) -> &'static str {
        match self {
            Backend::Plain => "c",
            Backend::Cuda => "cu",
            Backend::Hip => "hip",
        }
    }
}

/// One rendered source variant plus its signature side output. The
/// signature is persisted by the caller as the input-descriptor file the
/// InputSampler consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub text: String,
    pub signature: Vec<TypeTag>,
}

// ── Entry points ────────────────────────────────────────────────────────

/// Render one backend variant of a frozen program.
pub fn emit(program: &Program, backend: Backend, real: RealType) -> SourceUnit {
    let mut ctx = EmitCtx {
        program,
        real,
        out: String::with_capacity(2048),
    };
    match backend {
        Backend::Plain => ctx.emit_plain(),
        Backend::Cuda => ctx.emit_kernel(Gpu::Cuda),
        Backend::Hip => ctx.emit_kernel(Gpu::Hip),
    }
    SourceUnit {
        text: ctx.out,
        signature: program.signature(),
    }
}

/// Input-descriptor line: comma-separated C type names, one per parameter,
/// in declaration order. Consumed verbatim by the input sampler.
pub fn input_descriptor(program: &Program, real: RealType) -> String {
    let names: Vec<&str> = program
        .params
        .iter()
        .map(|p| match p.ty {
            TypeTag::Int => "int",
            TypeTag::Real => real.c_name(),
            TypeTag::RealArray => real.ptr_name(),
        })
        .collect();
    format!("{}\n", names.join(","))
}

/// Parse a persisted descriptor line back into the parameter signature.
/// Inverse of `input_descriptor` for either real type, so a run directory
/// alone is enough to resample inputs for its programs.
pub fn signature_from_descriptor(line: &str) -> crate::error::Result<Vec<TypeTag>> {
    line.trim()
        .split(',')
        .map(|name| match name.trim() {
            "int" => Ok(TypeTag::Int),
            "float" | "double" => Ok(TypeTag::Real),
            "float*" | "double*" => Ok(TypeTag::RealArray),
            other => Err(EngineError::Usage(format!(
                "unknown parameter type `{other}` in input descriptor"
            ))),
        })
        .collect()
}

// ── Internal context ────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
enum Gpu {
    Cuda,
    Hip,
}

struct EmitCtx<'a> {
    program: &'a Program,
    real: RealType,
    out: String,
}

impl<'a> EmitCtx<'a> {
    // ── Plain C ──

    fn emit_plain(&mut self) {
        self.line(0, "#include <math.h>");
        self.line(0, "#include <stdio.h>");
        self.line(0, "#include <stdlib.h>");
        self.blank();
        let params = self.param_list();
        self.line(0, &format!("void compute({params}) {{"));
        self.emit_locals();
        self.emit_body();
        self.line(
            1,
            &format!("printf(\"%.17g\\n\", {});", self.program.result_var()),
        );
        self.line(0, "}");
        self.blank();
        self.line(0, "int main(int argc, char **argv) {");
        self.emit_argv_parsing();
        let args = self.call_args(None);
        self.line(1, &format!("compute({args});"));
        self.emit_frees("free");
        self.line(1, "return 0;");
        self.line(0, "}");
    }

    // ── CUDA / HIP ──

    fn emit_kernel(&mut self, gpu: Gpu) {
        if gpu == Gpu::Hip {
            self.line(0, "#include <hip/hip_runtime.h>");
        }
        self.line(0, "#include <math.h>");
        self.line(0, "#include <stdio.h>");
        self.line(0, "#include <stdlib.h>");
        self.blank();
        let params = self.param_list();
        self.line(0, &format!("__global__ void compute({params}) {{"));
        self.emit_locals();
        self.emit_body();
        self.line(
            1,
            &format!("printf(\"%.17g\\n\", {});", self.program.result_var()),
        );
        self.line(0, "}");
        self.blank();
        self.line(0, "int main(int argc, char **argv) {");
        self.emit_argv_parsing();
        self.emit_device_buffers(gpu);
        let args = self.call_args(Some("d_"));
        self.line(1, &format!("compute<<<1, 1>>>({args});"));
        match gpu {
            Gpu::Cuda => self.line(1, "cudaDeviceSynchronize();"),
            Gpu::Hip => self.line(1, "hipDeviceSynchronize();"),
        }
        self.emit_device_frees(gpu);
        self.emit_frees("free");
        self.line(1, "return 0;");
        self.line(0, "}");
    }

    // ── Shared pieces ──

    fn param_list(&self) -> String {
        let real = self.real.c_name();
        self.program
            .params
            .iter()
            .map(|p| match p.ty {
                TypeTag::Int => format!("int {}", p.name),
                TypeTag::Real => format!("{real} {}", p.name),
                TypeTag::RealArray => format!("{real} *{}", p.name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn emit_locals(&mut self) {
        let real = self.real.c_name();
        let program = self.program;
        for name in &program.locals {
            self.line(1, &format!("{real} {name} = 0.0;"));
        }
    }

    fn emit_body(&mut self) {
        let program = self.program;
        self.render_block(&program.body, 1);
    }

    /// Parse argv into host-side parameter values. Scalars consume one
    /// argument; arrays consume one argument per element.
    fn emit_argv_parsing(&mut self) {
        let real = self.real.c_name();
        let len = self.program.array_len;
        let program = self.program;
        let mut arg = 1usize;
        for Param { name, ty } in &program.params {
            match ty {
                TypeTag::Int => {
                    self.line(1, &format!("int {name} = atoi(argv[{arg}]);"));
                    arg += 1;
                }
                TypeTag::Real => {
                    self.line(1, &format!("{real} {name} = atof(argv[{arg}]);"));
                    arg += 1;
                }
                TypeTag::RealArray => {
                    self.line(
                        1,
                        &format!("{real} *{name} = ({real} *)malloc(sizeof({real}) * {len});"),
                    );
                    self.line(1, &format!("for (int i = 0; i < {len}; ++i) {{"));
                    self.line(2, &format!("{name}[i] = atof(argv[{arg} + i]);"));
                    self.line(1, "}");
                    arg += len;
                }
            }
        }
    }

    /// Allocate device copies of array parameters and upload them.
    fn emit_device_buffers(&mut self, gpu: Gpu) {
        let real = self.real.c_name();
        let len = self.program.array_len;
        let (malloc, memcpy, kind) = match gpu {
            Gpu::Cuda => ("cudaMalloc", "cudaMemcpy", "cudaMemcpyHostToDevice"),
            Gpu::Hip => ("hipMalloc", "hipMemcpy", "hipMemcpyHostToDevice"),
        };
        for name in self.array_params() {
            self.line(1, &format!("{real} *d_{name};"));
            self.line(
                1,
                &format!("{malloc}(&d_{name}, sizeof({real}) * {len});"),
            );
            self.line(
                1,
                &format!("{memcpy}(d_{name}, {name}, sizeof({real}) * {len}, {kind});"),
            );
        }
    }

    fn emit_device_frees(&mut self, gpu: Gpu) {
        let free = match gpu {
            Gpu::Cuda => "cudaFree",
            Gpu::Hip => "hipFree",
        };
        for name in self.array_params() {
            self.line(1, &format!("{free}(d_{name});"));
        }
    }

    fn emit_frees(&mut self, free: &str) {
        for name in self.array_params() {
            self.line(1, &format!("{free}({name});"));
        }
    }

    fn array_params(&self) -> Vec<String> {
        self.program
            .params
            .iter()
            .filter(|p| p.ty == TypeTag::RealArray)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Kernel call argument list; array params get `prefix` when launching
    /// with device buffers.
    fn call_args(&self, prefix: Option<&str>) -> String {
        self.program
            .params
            .iter()
            .map(|p| match (p.ty, prefix) {
                (TypeTag::RealArray, Some(pre)) => format!("{pre}{}", p.name),
                _ => p.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ── Body rendering (identical across backends) ──

    fn render_block(&mut self, block: &Block, indent: usize) {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Assign { target, op, value } => {
                    let t = render_target(target);
                    self.line(
                        indent,
                        &format!("{t} {} {};", op.symbol(), render_expr(value)),
                    );
                }
                Stmt::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    self.line(indent, &format!("if ({}) {{", render_cond(cond)));
                    self.render_block(then_block, indent + 1);
                    if let Some(eb) = else_block {
                        self.line(indent, "} else {");
                        self.render_block(eb, indent + 1);
                    }
                    self.line(indent, "}");
                }
                Stmt::Loop { var, bound, body } => {
                    let b = match bound {
                        LoopBound::Lit(n) => n.to_string(),
                        LoopBound::IntParam(p) => p.clone(),
                    };
                    self.line(
                        indent,
                        &format!("for (int {var} = 0; {var} < {b}; ++{var}) {{"),
                    );
                    self.render_block(body, indent + 1);
                    self.line(indent, "}");
                }
            }
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

// ── Expression rendering ────────────────────────────────────────────────

/// Render an expression. Binary nodes are fully parenthesized so operator
/// order is fixed by the frozen tree, not by any backend's precedence.
pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Lit(v) => format!("{v:.1}"),
        Expr::Var(name) => name.clone(),
        Expr::Bin { op, lhs, rhs } => {
            format!(
                "({} {} {})",
                render_expr(lhs),
                op.symbol(),
                render_expr(rhs)
            )
        }
        Expr::Call { func, arg } => format!("{}({})", func.c_name(), render_expr(arg)),
        Expr::Index { array, index } => format!("{array}[{}]", render_index(index)),
    }
}

fn render_index(index: &IndexExpr) -> String {
    match index {
        IndexExpr::Lit(n) => n.to_string(),
        IndexExpr::LoopVar(v) => v.clone(),
    }
}

fn render_cond(cond: &Cond) -> String {
    format!(
        "{} {} {}",
        render_expr(&cond.lhs),
        cond.op.symbol(),
        render_expr(&cond.rhs)
    )
}

fn render_target(target: &AssignTarget) -> String {
    match target {
        AssignTarget::Var(name) => name.clone(),
        AssignTarget::Element { array, index } => format!("{array}[{}]", render_index(index)),
    }
}
