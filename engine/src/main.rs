use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fpdrift::cfg::Config;
use fpdrift::divergence::{divergences_json, DivergenceAnalyzer, DivergenceRecord, FilterPolicy};
use fpdrift::emit::{emit, input_descriptor, signature_from_descriptor, Backend};
use fpdrift::error::EngineError;
use fpdrift::generate::{generate, source_fingerprint};
use fpdrift::inputs::InputSampler;
use fpdrift::job::{CompilerFamily, JobKey};
use fpdrift::layout::RunLayout;
use fpdrift::matrix::{ExecJob, MatrixRunner};
use fpdrift::report::render_report;
use fpdrift::store::ResultStore;
use fpdrift::toolchain::{CompileRequest, SystemToolchain, Toolchain};

/// Decorrelates input sampling from program generation under one seed.
const INPUT_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Parser, Debug)]
#[command(
    name = "fpdrift",
    version,
    about = "Differential tester for floating-point code generation across compilers"
)]
struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print per-phase progress
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate random test programs and input vectors into a fresh run directory
    Generate {
        /// Directory the run directory is created under
        #[arg(long, default_value = "runs")]
        base: PathBuf,

        /// Root random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Compile every program with every configured compiler and optimization level
    Compile {
        /// Run directory produced by `generate`
        run: PathBuf,
    },
    /// Execute the compiled matrix, resuming any cells already recorded
    Run {
        run: PathBuf,

        /// Worker pool size (overrides the config)
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Compare recorded outputs and persist surviving divergences
    Divergence {
        run: PathBuf,

        /// Comma-separated compiler names; defaults to all with results
        #[arg(long)]
        compilers: Option<String>,

        /// Skip any comparison where either output matches a configured token
        #[arg(long)]
        skip_tokens: bool,
    },
    /// Divergence analysis plus a human-readable report with sources
    Report {
        run: PathBuf,

        #[arg(long)]
        compilers: Option<String>,

        #[arg(long)]
        skip_tokens: bool,
    },
    /// Full pipeline: generate, compile, run, report
    Full {
        #[arg(long, default_value = "runs")]
        base: PathBuf,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[arg(long)]
        jobs: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => Config::load(path),
        None => {
            let cfg = Config::default();
            cfg.validate().map_err(EngineError::from).map(|_| cfg)
        }
    };
    let cfg = match cfg {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fpdrift: error: {e}");
            std::process::exit(2);
        }
    };

    let verbose = cli.verbose;
    let outcome = match cli.command {
        Command::Generate { base, seed } => cmd_generate(&cfg, &base, seed, verbose).map(|_| ()),
        Command::Compile { run } => {
            RunLayout::open(&run).and_then(|l| cmd_compile(&cfg, &l, verbose))
        }
        Command::Run { run, jobs } => {
            RunLayout::open(&run).and_then(|l| cmd_run(&cfg, &l, jobs, verbose))
        }
        Command::Divergence {
            run,
            compilers,
            skip_tokens,
        } => RunLayout::open(&run)
            .and_then(|l| cmd_analyze(&cfg, &l, compilers.as_deref(), skip_tokens, false)),
        Command::Report {
            run,
            compilers,
            skip_tokens,
        } => RunLayout::open(&run)
            .and_then(|l| cmd_analyze(&cfg, &l, compilers.as_deref(), skip_tokens, true)),
        Command::Full { base, seed, jobs } => cmd_generate(&cfg, &base, seed, verbose)
            .and_then(|layout| {
                cmd_compile(&cfg, &layout, verbose)?;
                cmd_run(&cfg, &layout, jobs, verbose)?;
                cmd_analyze(&cfg, &layout, None, false, true)
            }),
    };

    if let Err(e) = outcome {
        eprintln!("fpdrift: error: {e}");
        let code = match e {
            EngineError::Config(_) | EngineError::Usage(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

/// Backends a compiler list actually needs; plain C is always rendered
/// because fingerprints and reports key off it.
fn needed_backends(cfg: &Config) -> Vec<Backend> {
    let mut backends = vec![Backend::Plain];
    for spec in &cfg.compilers {
        let backend = backend_for(spec.family());
        if !backends.contains(&backend) {
            backends.push(backend);
        }
    }
    backends
}

fn backend_for(family: CompilerFamily) -> Backend {
    match family {
        CompilerFamily::Nvcc => Backend::Cuda,
        CompilerFamily::Hipcc => Backend::Hip,
        _ => Backend::Plain,
    }
}

fn write_json(path: &PathBuf, value: &impl serde::Serialize) -> Result<(), EngineError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| EngineError::Json {
        path: path.clone(),
        source: e,
    })?;
    std::fs::write(path, text).map_err(|e| EngineError::io(path.clone(), e))
}

// ── Generate ────────────────────────────────────────────────────────────

fn cmd_generate(
    cfg: &Config,
    base: &std::path::Path,
    seed: u64,
    verbose: bool,
) -> Result<RunLayout, EngineError> {
    let layout = RunLayout::create(base, cfg.num_groups)?;
    let backends = needed_backends(cfg);

    let mut fingerprints: BTreeMap<String, String> = BTreeMap::new();
    let mut inputs: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let mut counter = 0u64;
    for group in 1..=cfg.num_groups {
        for test in 1..=cfg.tests_per_group {
            let id = RunLayout::program_id(group, test);
            let program = generate(seed.wrapping_add(counter), &cfg.limits);

            let mut signature = Vec::new();
            for backend in &backends {
                let unit = emit(&program, *backend, cfg.real_type);
                let path = layout.source_path(&id, backend.extension());
                std::fs::write(&path, &unit.text).map_err(|e| EngineError::io(path, e))?;
                if *backend == Backend::Plain {
                    fingerprints.insert(id.clone(), source_fingerprint(&unit.text));
                    signature = unit.signature;
                    let descriptor = layout.source_path(&id, "input");
                    std::fs::write(&descriptor, input_descriptor(&program, cfg.real_type))
                        .map_err(|e| EngineError::io(descriptor, e))?;
                }
            }

            let mut sampler = InputSampler::with_seed(
                seed.wrapping_add(counter) ^ INPUT_SEED_SALT,
                cfg.limits.array_size,
            );
            let vectors = (0..cfg.input_samples_per_run)
                .map(|_| sampler.sample(&signature).join(" "))
                .collect();
            inputs.insert(id, vectors);

            counter += 1;
        }
    }

    write_json(&layout.fingerprints_path(), &fingerprints)?;
    write_json(&layout.inputs_path(), &inputs)?;

    if verbose {
        eprintln!(
            "fpdrift: generated {} programs x {} backends under {}",
            counter,
            backends.len(),
            layout.root().display()
        );
    }
    eprintln!("fpdrift: run directory {}", layout.root().display());
    Ok(layout)
}

// ── Compile ─────────────────────────────────────────────────────────────

fn cmd_compile(cfg: &Config, layout: &RunLayout, verbose: bool) -> Result<(), EngineError> {
    let programs = layout.discover_programs("c")?;
    let toolchain = SystemToolchain;

    let mut compiled = 0usize;
    let mut failed = 0usize;
    for spec in &cfg.compilers {
        if !spec.path.exists() {
            eprintln!(
                "fpdrift: skipping {}: {} not found",
                spec.name,
                spec.path.display()
            );
            continue;
        }
        let backend = backend_for(spec.family());
        for id in &programs {
            let source = layout.source_path(id, backend.extension());
            let stem = id.rsplit('/').next().unwrap_or(id);
            for opt in &cfg.opt_levels {
                let key = JobKey {
                    program: id.clone(),
                    compiler: spec.name.clone(),
                    opt: opt.clone(),
                };
                let output = layout.binary_path(id, &key.binary_file_name(stem));
                if output.exists() {
                    continue;
                }
                let req = CompileRequest {
                    compiler: spec.clone(),
                    opt: opt.clone(),
                    source: source.clone(),
                    output,
                };
                match toolchain.compile(&req) {
                    Ok(()) => compiled += 1,
                    // Reported, and the (compiler, opt) cell simply has no
                    // binary; the run step skips it.
                    Err(f) => {
                        eprintln!("fpdrift: {f}");
                        if verbose && !f.stderr.is_empty() {
                            eprintln!("{}", f.stderr.trim_end());
                        }
                        failed += 1;
                    }
                }
            }
        }
    }
    eprintln!("fpdrift: compiled {compiled} binaries ({failed} failures)");
    Ok(())
}

// ── Run ─────────────────────────────────────────────────────────────────

/// Input vectors per program: the set persisted at generation time when
/// present, otherwise fresh samples driven by each program's descriptor
/// file. Resampled vectors are persisted so later resumes replay them.
fn load_or_sample_inputs(
    cfg: &Config,
    layout: &RunLayout,
) -> Result<BTreeMap<String, Vec<String>>, EngineError> {
    let inputs_path = layout.inputs_path();
    if inputs_path.exists() {
        let text =
            std::fs::read_to_string(&inputs_path).map_err(|e| EngineError::io(&inputs_path, e))?;
        return serde_json::from_str(&text).map_err(|e| EngineError::Json {
            path: inputs_path.clone(),
            source: e,
        });
    }

    let mut inputs = BTreeMap::new();
    let mut sampler = InputSampler::with_seed(rand::random(), cfg.limits.array_size);
    for id in layout.discover_programs("c")? {
        let descriptor = layout.source_path(&id, "input");
        let line =
            std::fs::read_to_string(&descriptor).map_err(|e| EngineError::io(descriptor, e))?;
        let signature = signature_from_descriptor(&line)?;
        let vectors = (0..cfg.input_samples_per_run)
            .map(|_| sampler.sample(&signature).join(" "))
            .collect();
        inputs.insert(id, vectors);
    }
    write_json(&inputs_path, &inputs)?;
    Ok(inputs)
}

fn cmd_run(
    cfg: &Config,
    layout: &RunLayout,
    jobs_override: Option<usize>,
    verbose: bool,
) -> Result<(), EngineError> {
    let inputs = load_or_sample_inputs(cfg, layout)?;

    let results_path = layout.results_path();
    let mut store = if results_path.exists() {
        ResultStore::load(&results_path)?
    } else {
        ResultStore::new()
    };

    let mut jobs = Vec::new();
    for (id, vectors) in &inputs {
        let stem = id.rsplit('/').next().unwrap_or(id);
        for spec in &cfg.compilers {
            for opt in &cfg.opt_levels {
                let key = JobKey {
                    program: id.clone(),
                    compiler: spec.name.clone(),
                    opt: opt.clone(),
                };
                let binary = layout.binary_path(id, &key.binary_file_name(stem));
                if !binary.exists() {
                    continue;
                }
                for vector in vectors {
                    jobs.push(ExecJob {
                        key: key.clone(),
                        binary: binary.clone(),
                        args: vector.split_whitespace().map(str::to_string).collect(),
                    });
                }
            }
        }
    }

    let toolchain = SystemToolchain;
    let runner = MatrixRunner::new(
        &toolchain,
        jobs_override.or(cfg.workers),
        cfg.record_runtime,
    );
    let outcome = runner.run(jobs, &mut store);

    // Persist whatever was collected, failure or not, so a re-run resumes.
    store.save(&results_path)?;

    let summary = outcome?;
    eprintln!(
        "fpdrift: executed {} cells ({} resumed from {})",
        summary.executed,
        summary.skipped,
        results_path.display()
    );
    if verbose {
        for (compiler, micros) in &summary.runtime_by_compiler {
            eprintln!("fpdrift: {compiler}: {micros} us total runtime");
        }
    }
    Ok(())
}

// ── Divergence / report ─────────────────────────────────────────────────

fn cmd_analyze(
    cfg: &Config,
    layout: &RunLayout,
    compilers: Option<&str>,
    skip_tokens: bool,
    with_report: bool,
) -> Result<(), EngineError> {
    let store = ResultStore::load(&layout.results_path())?;

    let names: Vec<String> = match compilers {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => cfg
            .compilers
            .iter()
            .map(|c| c.name.clone())
            .filter(|n| store.has_compiler(n))
            .collect(),
    };
    if names.len() < 2 {
        return Err(EngineError::Usage(
            "divergence analysis needs at least two compilers with recorded results".to_string(),
        ));
    }

    let policy = if skip_tokens {
        FilterPolicy::SkipTokens(cfg.skip_values.clone())
    } else {
        FilterPolicy::SignInsensitive
    };
    let analyzer = DivergenceAnalyzer::new(policy);

    let mut records: Vec<DivergenceRecord> = Vec::new();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            records.extend(analyzer.compare(&store, a, b)?);
        }
    }

    write_json(&layout.divergences_path(), &divergences_json(&records))?;
    eprintln!(
        "fpdrift: {} divergent cells across {} compiler pairs",
        records.len(),
        names.len() * (names.len() - 1) / 2
    );

    if with_report {
        let mut sources = BTreeMap::new();
        for r in &records {
            if sources.contains_key(&r.program) {
                continue;
            }
            let path = layout.source_path(&r.program, "c");
            if let Ok(text) = std::fs::read_to_string(&path) {
                sources.insert(r.program.clone(), text);
            }
        }
        let text = render_report(&records, &sources);
        let report_path = layout.report_path();
        std::fs::write(&report_path, &text).map_err(|e| EngineError::io(&report_path, e))?;
        print!("{text}");
    }
    Ok(())
}
