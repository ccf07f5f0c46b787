// error.rs — Engine error taxonomy
//
// One enum per failure class with distinct handling policy:
//   ConfigError       — rejected before any generation begins.
//   CompileFailure    — reported data; the (compiler, opt) combination is
//                       excluded from the matrix, the batch continues.
//   EngineError       — everything that aborts an operation: execution
//                       failures (fatal by design), usage errors, malformed
//                       persisted state, I/O.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid configuration, detected before generation starts.
///
/// PartialEq only: ProbabilityOutOfRange carries an f64.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be >= 1 (got {value})")]
    BoundTooSmall { name: &'static str, value: usize },

    #[error("math_func_probability must be within [0, 1] (got {0})")]
    ProbabilityOutOfRange(f64),

    #[error("at least one compiler must be configured")]
    NoCompilers,

    #[error("at least one optimization level must be configured")]
    NoOptLevels,
}

/// A compiler invocation that exited non-zero or could not be spawned.
///
/// Not fatal: the caller reports it and drops that (compiler, opt)
/// combination from the execution matrix.
#[derive(Debug, Clone)]
pub struct CompileFailure {
    pub command: String,
    pub status: Option<i32>,
    pub stderr: String,
}

impl std::fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "compile failed (exit {}): {}", code, self.command),
            None => write!(f, "compile failed (no exit status): {}", self.command),
        }
    }
}

/// Errors that abort an engine operation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A test binary exited non-zero. Fatal to the whole run: a crashing
    /// binary yields no comparable output, so the run is aborted with the
    /// exact failing command surfaced for manual reproduction.
    #[error("execution failed: `{command}` exited with status {status}")]
    Execution { command: String, status: i32 },

    #[error("execution failed: `{command}` could not be spawned: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Caller asked for something the recorded state cannot answer, e.g. a
    /// divergence comparison against a compiler with zero recorded results.
    #[error("{0}")]
    Usage(String),

    /// A persisted result cell did not have the expected textual shape.
    /// This is a contract violation internal to the pipeline, not a
    /// recoverable runtime condition.
    #[error("malformed result cell: `{text}`")]
    MalformedResult { text: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
