// Integration tests: generated C actually compiles and runs under a real
// host compiler, and the compile/execute/compare pipeline closes end to
// end on live binaries.
//
// Skipped automatically if no C compiler is found.

use std::path::PathBuf;
use std::process::Command;

use fpdrift::cfg::{GenLimits, RealType};
use fpdrift::divergence::{DivergenceAnalyzer, FilterPolicy};
use fpdrift::emit::{emit, Backend};
use fpdrift::generate::generate;
use fpdrift::inputs::InputSampler;
use fpdrift::job::{CompilerSpec, FmaVariant, JobKey, OptLevel};
use fpdrift::matrix::{ExecJob, MatrixRunner};
use fpdrift::store::ResultStore;
use fpdrift::toolchain::{CompileRequest, SystemToolchain, Toolchain};

fn find_c_compiler() -> Option<CompilerSpec> {
    for name in ["cc", "gcc", "clang"] {
        let found = Command::new(name)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if found {
            // Resolved via PATH; the configured path is the bare name.
            return Some(CompilerSpec::new(name, name));
        }
    }
    None
}

fn compile(
    spec: &CompilerSpec,
    opt: &OptLevel,
    source: &PathBuf,
    output: &PathBuf,
) -> Result<(), String> {
    SystemToolchain
        .compile(&CompileRequest {
            compiler: spec.clone(),
            opt: opt.clone(),
            source: source.clone(),
            output: output.clone(),
        })
        .map_err(|f| format!("{f}\n{}", f.stderr))
}

#[test]
fn generated_programs_compile_and_print_one_line() {
    let Some(spec) = find_c_compiler() else {
        eprintln!("SKIP: no C compiler found");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let limits = GenLimits::default();
    let opt = OptLevel::new("-O0", FmaVariant::On);

    for seed in 0..5u64 {
        let program = generate(seed, &limits);
        let unit = emit(&program, Backend::Plain, RealType::Double);
        let source = dir.path().join(format!("_test_{seed}.c"));
        let binary = dir.path().join(format!("_test_{seed}.exe"));
        std::fs::write(&source, &unit.text).unwrap();

        compile(&spec, &opt, &source, &binary)
            .unwrap_or_else(|e| panic!("seed {seed}: {e}\n{}", unit.text));

        let mut sampler = InputSampler::with_seed(seed, limits.array_size);
        let args = sampler.sample(&unit.signature);
        let line = SystemToolchain.execute(&binary, &args).unwrap();
        assert!(!line.is_empty(), "seed {seed}: empty output");
        // %.17g prints a plain number, nan, or inf; all must parse.
        let value: f64 = line
            .parse()
            .unwrap_or_else(|_| panic!("seed {seed}: unparseable output {line:?}"));
        let _ = value;
    }
}

#[test]
fn matrix_over_live_binaries_finds_no_self_divergence() {
    let Some(spec) = find_c_compiler() else {
        eprintln!("SKIP: no C compiler found");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let limits = GenLimits::default();
    let opts = [
        OptLevel::new("-O0", FmaVariant::On),
        OptLevel::new("-O3", FmaVariant::On),
    ];

    // Same binary set registered under two compiler names: identical
    // outputs by construction, so the analyzer must stay silent.
    let program = generate(42, &limits);
    let unit = emit(&program, Backend::Plain, RealType::Double);
    let source = dir.path().join("_test_1.c");
    std::fs::write(&source, &unit.text).unwrap();

    let mut sampler = InputSampler::with_seed(42, limits.array_size);
    let vectors: Vec<Vec<String>> = (0..3).map(|_| sampler.sample(&unit.signature)).collect();

    let mut jobs = Vec::new();
    for alias in ["first", "second"] {
        for opt in &opts {
            let binary = dir.path().join(format!("_test_1-{alias}-{}.exe", opt.tag()));
            compile(&spec, opt, &source, &binary).unwrap();
            for args in &vectors {
                jobs.push(ExecJob {
                    key: JobKey {
                        program: "_tests/_group_1/_test_1".to_string(),
                        compiler: alias.to_string(),
                        opt: opt.clone(),
                    },
                    binary: binary.clone(),
                    args: args.clone(),
                });
            }
        }
    }

    let toolchain = SystemToolchain;
    let runner = MatrixRunner::new(&toolchain, Some(2), true);
    let mut store = ResultStore::new();
    let summary = runner.run(jobs, &mut store).unwrap();
    assert_eq!(summary.executed, 12); // 2 aliases x 2 opts x 3 inputs
    assert_eq!(store.len(), 12);

    let analyzer = DivergenceAnalyzer::new(FilterPolicy::SignInsensitive);
    let records = analyzer.compare(&store, "first", "second").unwrap();
    assert!(
        records.is_empty(),
        "identical binaries diverged: {records:?}"
    );
}

#[test]
fn resume_skips_recorded_cells_on_live_binaries() {
    let Some(spec) = find_c_compiler() else {
        eprintln!("SKIP: no C compiler found");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let limits = GenLimits::default();
    let opt = OptLevel::new("-O0", FmaVariant::On);

    let program = generate(7, &limits);
    let unit = emit(&program, Backend::Plain, RealType::Double);
    let source = dir.path().join("_test_1.c");
    let binary = dir.path().join("_test_1-cc-O0.exe");
    std::fs::write(&source, &unit.text).unwrap();
    compile(&spec, &opt, &source, &binary).unwrap();

    let mut sampler = InputSampler::with_seed(7, limits.array_size);
    let jobs: Vec<ExecJob> = (0..2)
        .map(|_| ExecJob {
            key: JobKey {
                program: "p".to_string(),
                compiler: "cc".to_string(),
                opt: opt.clone(),
            },
            binary: binary.clone(),
            args: sampler.sample(&unit.signature),
        })
        .collect();

    let toolchain = SystemToolchain;
    let runner = MatrixRunner::new(&toolchain, Some(1), false);
    let mut store = ResultStore::new();
    let first = runner.run(jobs.clone(), &mut store).unwrap();
    assert_eq!(first.executed, 2);

    let second = runner.run(jobs, &mut store).unwrap();
    assert_eq!(second.executed, 0);
    assert_eq!(second.skipped, 2);
}
