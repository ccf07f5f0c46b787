// matrix.rs — Parallel execution of the compiled test matrix
//
// Runs every (binary, input) cell across a worker pool. Workers only
// execute and send; a single collector thread owns the result store, so
// no execution state is ever shared behind a lock. Results flow over a
// channel and are recorded in arrival order; the store's sorted maps make
// the persisted output deterministic regardless.
//
// A non-zero test exit is fatal: the first failure is surfaced with its
// exact command line, in-flight jobs drain, queued jobs are abandoned.
//
// Preconditions: binaries exist at their job paths (compile step ran).
// Postconditions: on Ok, every pending cell is recorded in the store;
//                 cells already present are never re-executed.
// Failure modes: Execution/Spawn from any worker aborts the run.
// Side effects: spawns processes via the toolchain.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use crate::error::{EngineError, Result};
use crate::job::JobKey;
use crate::store::{ResultCell, ResultStore};
use crate::toolchain::Toolchain;

// ── Jobs ────────────────────────────────────────────────────────────────

/// One executable cell of the matrix.
#[derive(Debug, Clone)]
pub struct ExecJob {
    pub key: JobKey,
    pub binary: PathBuf,
    /// Stringified argument vector, one element per scalar value.
    pub args: Vec<String>,
}

impl ExecJob {
    /// The input vector as a result-store key.
    pub fn input_key(&self) -> String {
        self.args.join(" ")
    }
}

/// Drop jobs whose cell the store already holds. This is the whole resume
/// mechanism: a re-run executes exactly the missing cells.
pub fn missing_jobs(jobs: Vec<ExecJob>, store: &ResultStore) -> Vec<ExecJob> {
    jobs.into_iter()
        .filter(|job| !store.contains(&job.key, &job.input_key()))
        .collect()
}

// ── Runner ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    /// Cells skipped because the store already held them.
    pub skipped: usize,
    /// Total recorded runtime per compiler, microseconds. Empty when
    /// runtime recording is off.
    pub runtime_by_compiler: BTreeMap<String, u64>,
}

pub struct MatrixRunner<'a, T: Toolchain> {
    toolchain: &'a T,
    workers: Option<usize>,
    record_runtime: bool,
}

impl<'a, T: Toolchain> MatrixRunner<'a, T> {
    pub fn new(toolchain: &'a T, workers: Option<usize>, record_runtime: bool) -> Self {
        MatrixRunner {
            toolchain,
            workers,
            record_runtime,
        }
    }

    /// Execute every job not already recorded, collecting into `store`.
    pub fn run(&self, jobs: Vec<ExecJob>, store: &mut ResultStore) -> Result<RunSummary> {
        let total = jobs.len();
        let pending = missing_jobs(jobs, store);
        let skipped = total - pending.len();

        // num_threads(0) lets rayon size the pool to the logical CPUs.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.unwrap_or(0))
            .build()
            .map_err(|e| EngineError::Usage(format!("worker pool: {e}")))?;

        let (tx, rx) = mpsc::channel();
        let failed = AtomicBool::new(false);
        let mut first_error = None;
        let mut executed = 0usize;
        let mut runtime_by_compiler = BTreeMap::new();

        // in_place_scope keeps the collector on the caller thread; every
        // pool thread stays free to execute jobs, so a one-worker pool
        // still drains the queue.
        pool.in_place_scope(|scope| {
            for (idx, job) in pending.iter().enumerate() {
                let tx = tx.clone();
                let failed = &failed;
                scope.spawn(move |_| {
                    // Queued work behind a failure is abandoned, not run.
                    if failed.load(Ordering::Relaxed) {
                        return;
                    }
                    let outcome = self.run_one(job);
                    if outcome.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    let _ = tx.send((idx, outcome));
                });
            }
            drop(tx);

            // Single collector: this thread owns the store.
            for (idx, outcome) in rx {
                match outcome {
                    Ok(cell) => {
                        let job = &pending[idx];
                        if let Some(t) = cell.runtime_micros {
                            *runtime_by_compiler
                                .entry(job.key.compiler.clone())
                                .or_insert(0u64) += t;
                        }
                        store.insert(&job.key, &job.input_key(), cell);
                        executed += 1;
                    }
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(RunSummary {
                executed,
                skipped,
                runtime_by_compiler,
            }),
        }
    }

    fn run_one(&self, job: &ExecJob) -> Result<ResultCell> {
        if self.record_runtime {
            let start = Instant::now();
            let output = self.toolchain.execute(&job.binary, &job.args)?;
            let micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
            Ok(ResultCell::new(output, Some(micros)))
        } else {
            let output = self.toolchain.execute(&job.binary, &job.args)?;
            Ok(ResultCell::new(output, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileFailure;
    use crate::job::{FmaVariant, OptLevel};
    use crate::toolchain::CompileRequest;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    /// Deterministic fake: output is derived from the binary stem and the
    /// first argument; a "crash" stem fails.
    struct FakeToolchain {
        calls: AtomicUsize,
    }

    impl FakeToolchain {
        fn new() -> Self {
            FakeToolchain {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Toolchain for FakeToolchain {
        fn compile(&self, _req: &CompileRequest) -> std::result::Result<(), CompileFailure> {
            Ok(())
        }

        fn execute(&self, binary: &Path, args: &[String]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stem = binary.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if stem.contains("crash") {
                return Err(EngineError::Execution {
                    command: binary.display().to_string(),
                    status: 139,
                });
            }
            Ok(format!("{stem}:{}", args.first().map(String::as_str).unwrap_or("")))
        }
    }

    fn job(program: &str, compiler: &str, binary: &str, arg: &str) -> ExecJob {
        ExecJob {
            key: JobKey {
                program: program.to_string(),
                compiler: compiler.to_string(),
                opt: OptLevel::new("-O0", FmaVariant::On),
            },
            binary: PathBuf::from(binary),
            args: vec![arg.to_string()],
        }
    }

    #[test]
    fn records_every_cell_once() {
        let tc = FakeToolchain::new();
        let runner = MatrixRunner::new(&tc, Some(2), false);
        let jobs = vec![
            job("p1", "gcc", "/t/a.exe", "1.0"),
            job("p1", "clang", "/t/b.exe", "1.0"),
            job("p2", "gcc", "/t/c.exe", "2.0"),
        ];
        let mut store = ResultStore::new();
        let summary = runner.run(jobs, &mut store).unwrap();
        assert_eq!(summary.executed, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(store.len(), 3);
        assert_eq!(tc.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn resume_executes_only_missing_cells() {
        let tc = FakeToolchain::new();
        let runner = MatrixRunner::new(&tc, Some(2), false);
        let jobs = vec![
            job("p1", "gcc", "/t/a.exe", "1.0"),
            job("p1", "clang", "/t/b.exe", "1.0"),
        ];
        let mut store = ResultStore::new();
        runner.run(jobs.clone(), &mut store).unwrap();
        assert_eq!(tc.calls.load(Ordering::SeqCst), 2);

        // Second pass over the same jobs touches nothing.
        let summary = runner.run(jobs, &mut store).unwrap();
        assert_eq!(summary.executed, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(tc.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn single_worker_pool_drains_the_whole_queue() {
        // The collector must not occupy the pool's only thread, or the
        // queued jobs never run and the channel never closes.
        let tc = FakeToolchain::new();
        let runner = MatrixRunner::new(&tc, Some(1), false);
        let jobs = vec![
            job("p1", "gcc", "/t/a.exe", "1.0"),
            job("p1", "clang", "/t/b.exe", "1.0"),
            job("p2", "gcc", "/t/c.exe", "2.0"),
            job("p2", "clang", "/t/d.exe", "2.0"),
        ];
        let mut store = ResultStore::new();
        let summary = runner.run(jobs, &mut store).unwrap();
        assert_eq!(summary.executed, 4);
        assert_eq!(store.len(), 4);
        assert_eq!(tc.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn first_failure_aborts_but_completed_cells_survive() {
        let tc = FakeToolchain::new();
        let runner = MatrixRunner::new(&tc, Some(1), false);
        let jobs = vec![
            job("p1", "gcc", "/t/ok.exe", "1.0"),
            job("p1", "gcc", "/t/crash.exe", "1.0"),
        ];
        let mut store = ResultStore::new();
        let err = runner.run(jobs, &mut store).unwrap_err();
        assert!(matches!(err, EngineError::Execution { status: 139, .. }));
        // The successful cell was still collected.
        assert!(store.len() <= 1);
    }

    #[test]
    fn runtime_totals_grouped_by_compiler() {
        let tc = FakeToolchain::new();
        let runner = MatrixRunner::new(&tc, Some(2), true);
        let jobs = vec![
            job("p1", "gcc", "/t/a.exe", "1.0"),
            job("p1", "clang", "/t/b.exe", "1.0"),
        ];
        let mut store = ResultStore::new();
        let summary = runner.run(jobs, &mut store).unwrap();
        assert!(summary.runtime_by_compiler.contains_key("gcc"));
        assert!(summary.runtime_by_compiler.contains_key("clang"));
        for cell in [
            store.get(&job("p1", "gcc", "", "1.0").key, "1.0").unwrap(),
            store.get(&job("p1", "clang", "", "1.0").key, "1.0").unwrap(),
        ] {
            assert!(cell.runtime_micros.is_some());
        }
    }

    #[test]
    fn input_key_joins_args_with_spaces() {
        let mut j = job("p", "gcc", "/t/a.exe", "1.0");
        j.args.push("5".to_string());
        assert_eq!(j.input_key(), "1.0 5");
    }
}
