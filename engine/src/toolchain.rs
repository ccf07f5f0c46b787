// toolchain.rs — External compiler and binary invocation
//
// The one module that shells out. Everything above it talks to the
// `Toolchain` trait, so the matrix runner and its tests never depend on
// real compilers being installed.
//
// Flag dialects differ per compiler family; the mapping lives here and
// nowhere else. Contraction control in particular has no portable
// spelling.
//
// Preconditions: compile requests carry absolute or run-relative paths
//                that exist.
// Postconditions: `compile` leaves a binary at the requested output path
//                 on success.
// Failure modes: CompileFailure (reported, non-fatal) from `compile`;
//                Spawn/Execution (fatal) from `execute`.
// Side effects: spawns processes, writes the output binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{CompileFailure, EngineError};
use crate::job::{CompilerFamily, CompilerSpec, FmaVariant, OptLevel};

// ── Flag dialects ───────────────────────────────────────────────────────

/// Baseline flags a family always receives.
pub fn family_flags(family: CompilerFamily) -> &'static [&'static str] {
    match family {
        CompilerFamily::Gcc | CompilerFamily::Clang => &["-std=c99"],
        CompilerFamily::Nvcc => &["-arch=sm_60"],
        CompilerFamily::Hipcc => &["--amdgpu-target=gfx906"],
        CompilerFamily::Pgi => &["-c99"],
        CompilerFamily::Xlc | CompilerFamily::Other => &[],
    }
}

/// The family's spelling of "disable fused multiply-add contraction".
pub fn no_fma_flag(family: CompilerFamily) -> Option<&'static str> {
    match family {
        CompilerFamily::Gcc | CompilerFamily::Clang => Some("-ffp-contract=off"),
        CompilerFamily::Nvcc => Some("--fmad=false"),
        CompilerFamily::Hipcc => Some("--amdgpu-no-fma"),
        CompilerFamily::Pgi => Some("-nofma"),
        CompilerFamily::Xlc => Some("-qfloat=nomaf"),
        CompilerFamily::Other => None,
    }
}

/// GPU toolchains link the math library implicitly; host compilers need -lm.
fn links_libm(family: CompilerFamily) -> bool {
    !matches!(family, CompilerFamily::Nvcc | CompilerFamily::Hipcc)
}

// ── Requests ────────────────────────────────────────────────────────────

/// One compile invocation: source in, binary out, under a given compiler
/// and optimization level.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub compiler: CompilerSpec,
    pub opt: OptLevel,
    pub source: PathBuf,
    pub output: PathBuf,
}

impl CompileRequest {
    /// Full argument vector, in the order the command line is assembled.
    pub fn args(&self) -> Vec<String> {
        let family = self.compiler.family();
        let mut args = vec![self.opt.flag.clone()];
        args.extend(family_flags(family).iter().map(|s| s.to_string()));
        if self.opt.fma == FmaVariant::Off {
            if let Some(flag) = no_fma_flag(family) {
                args.push(flag.to_string());
            }
        }
        args.push("-o".to_string());
        args.push(self.output.display().to_string());
        args.push(self.source.display().to_string());
        if links_libm(family) {
            args.push("-lm".to_string());
        }
        args
    }

    /// Human-readable command line, for failure reports.
    pub fn command_line(&self) -> String {
        render_command(&self.compiler.path, &self.args())
    }
}

pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut s = program.display().to_string();
    for a in args {
        s.push(' ');
        s.push_str(a);
    }
    s
}

// ── Trait ───────────────────────────────────────────────────────────────

/// Process-spawning seam. `Sync` because the matrix runner shares one
/// instance across its worker pool.
pub trait Toolchain: Sync {
    /// Compile one source to one binary. Failures are data, not fatal.
    fn compile(&self, req: &CompileRequest) -> Result<(), CompileFailure>;

    /// Run a test binary with stringified arguments and return the single
    /// output line it prints. Any failure here is fatal to the run.
    fn execute(&self, binary: &Path, args: &[String]) -> crate::error::Result<String>;
}

// ── System implementation ───────────────────────────────────────────────

/// The real thing: `std::process::Command` against installed compilers.
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn compile(&self, req: &CompileRequest) -> Result<(), CompileFailure> {
        let args = req.args();
        let command = req.command_line();
        let out = Command::new(&req.compiler.path)
            .args(&args)
            .output()
            .map_err(|e| CompileFailure {
                command: command.clone(),
                status: None,
                stderr: e.to_string(),
            })?;
        if out.status.success() {
            Ok(())
        } else {
            Err(CompileFailure {
                command,
                status: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            })
        }
    }

    fn execute(&self, binary: &Path, args: &[String]) -> crate::error::Result<String> {
        let command = render_command(binary, args);
        let out = Command::new(binary)
            .args(args)
            .output()
            .map_err(|e| EngineError::Spawn {
                command: command.clone(),
                source: e,
            })?;
        if !out.status.success() {
            return Err(EngineError::Execution {
                command,
                // Signal deaths have no code; report the raw -1 the shell
                // convention uses for them.
                status: out.status.code().unwrap_or(-1),
            });
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        Ok(stdout.lines().next().unwrap_or("").trim().to_string())
    }
}
