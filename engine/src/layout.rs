// layout.rs — On-disk run directory layout
//
// One run lives under a single directory named after the host and the
// generating process, so concurrent runs on a shared filesystem never
// collide:
//
//   <base>/<host>_<pid>/
//     _tests/_group_1/_test_1.c          generated sources (+ .cu/.hip)
//     _tests/_group_1/_test_1-gcc-O0.exe compiled binaries
//     inputs.json                        sampled input vectors
//     results.json                       result store
//     divergences.json                   surviving divergences
//     report.txt                         human-readable summary
//     fingerprints.json                  source digests for resume checks
//
// Program identity is the run-relative path stem ("_tests/_group_1/_test_1");
// every path below is derived from that identity, never the reverse.
//
// Preconditions: base directory is writable (for `create`).
// Postconditions: `create` leaves every group directory in place.
// Failure modes: I/O errors, each carrying the offending path.
// Side effects: creates directories, reads directory trees.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

pub const TESTS_DIR: &str = "_tests";
pub const RESULTS_FILE: &str = "results.json";
pub const DIVERGENCES_FILE: &str = "divergences.json";
pub const REPORT_FILE: &str = "report.txt";
pub const FINGERPRINTS_FILE: &str = "fingerprints.json";
pub const INPUTS_FILE: &str = "inputs.json";

/// `<host>_<pid>` for the current process. The hostname comes from the
/// environment; batch schedulers export it, and a bare fallback keeps the
/// name well-formed elsewhere.
pub fn run_dir_name() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "host".to_string());
    format!("{host}_{}", std::process::id())
}

#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Create a fresh run directory under `base` with `num_groups` group
    /// directories.
    pub fn create(base: &Path, num_groups: usize) -> Result<RunLayout> {
        let layout = RunLayout {
            root: base.join(run_dir_name()),
        };
        for group in 1..=num_groups {
            let dir = layout.group_dir(group);
            std::fs::create_dir_all(&dir).map_err(|e| EngineError::io(dir, e))?;
        }
        Ok(layout)
    }

    /// Open an existing run directory for a resumed or analysis pass.
    pub fn open(root: &Path) -> Result<RunLayout> {
        let tests = root.join(TESTS_DIR);
        if !tests.is_dir() {
            return Err(EngineError::Usage(format!(
                "{} is not a run directory (missing {TESTS_DIR}/)",
                root.display()
            )));
        }
        Ok(RunLayout {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_dir(&self, group: usize) -> PathBuf {
        self.root.join(TESTS_DIR).join(format!("_group_{group}"))
    }

    /// Run-relative program identity for a (group, test) pair.
    pub fn program_id(group: usize, test: usize) -> String {
        format!("{TESTS_DIR}/_group_{group}/_test_{test}")
    }

    /// Absolute path for a program identity plus file extension
    /// ("c", "cu", "hip", or a binary name).
    pub fn source_path(&self, program_id: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{program_id}.{extension}"))
    }

    /// Absolute path for a binary belonging to a program identity; the
    /// file name itself is derived by the job key.
    pub fn binary_path(&self, program_id: &str, file_name: &str) -> PathBuf {
        match self.root.join(program_id).parent() {
            Some(dir) => dir.join(file_name),
            None => self.root.join(file_name),
        }
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    pub fn divergences_path(&self) -> PathBuf {
        self.root.join(DIVERGENCES_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    pub fn fingerprints_path(&self) -> PathBuf {
        self.root.join(FINGERPRINTS_FILE)
    }

    /// Sampled input vectors, program identity → joined value strings.
    /// Written at generation time so every later pass (and every resumed
    /// run) executes the same vectors.
    pub fn inputs_path(&self) -> PathBuf {
        self.root.join(INPUTS_FILE)
    }

    /// All program identities present on disk, by recursive discovery of
    /// `.<extension>` sources under `_tests/`. Sorted for determinism.
    pub fn discover_programs(&self, extension: &str) -> Result<Vec<String>> {
        let mut sources = Vec::new();
        collect_sources(&self.root.join(TESTS_DIR), extension, &mut sources)?;
        let mut ids = Vec::new();
        for path in sources {
            if let Some(id) = self.program_id_for(&path) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Run-relative identity of a source file, extension stripped.
    pub fn program_id_for(&self, source: &Path) -> Option<String> {
        let rel = source.strip_prefix(&self.root).ok()?;
        let stem = rel.with_extension("");
        let mut id = String::new();
        for part in stem.components() {
            if !id.is_empty() {
                id.push('/');
            }
            id.push_str(part.as_os_str().to_str()?);
        }
        Some(id)
    }
}

fn collect_sources(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_sources(&path, extension, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            out.push(path);
        }
    }
    Ok(())
}
