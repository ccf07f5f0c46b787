// cfg.rs — Engine configuration
//
// Generation limits and run options, loadable from a JSON file. Defaults
// mirror the values the tester ships with; `Config::validate` fails fast on
// bounds a generator contract would otherwise hit mid-run.
//
// Preconditions: none.
// Postconditions: a validated Config satisfies every generator contract
//                 (all bounds >= 1, probability within [0, 1]).
// Failure modes: ConfigError on invalid bounds; I/O and JSON errors on load.
// Side effects: `Config::load` reads the filesystem.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EngineError};
use crate::job::{CompilerSpec, FmaVariant, OptLevel};

// ── Real type ───────────────────────────────────────────────────────────

/// The floating-point type every real-typed variable uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RealType {
    Float,
    #[default]
    Double,
}

impl RealType {
    pub fn c_name(self) -> &'static str {
        match self {
            RealType::Float => "float",
            RealType::Double => "double",
        }
    }

    pub fn ptr_name(self) -> &'static str {
        match self {
            RealType::Float => "float*",
            RealType::Double => "double*",
        }
    }
}

// ── Generation limits ───────────────────────────────────────────────────

/// Bounds on generated program shape. All recursive builders decrement a
/// budget against these and switch to a terminal production at zero, so
/// generation terminates by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenLimits {
    pub max_expression_size: usize,
    pub max_nesting_levels: usize,
    pub max_lines_in_block: usize,
    pub array_size: usize,
    pub max_same_level_blocks: usize,
    pub math_func_allowed: bool,
    pub math_func_probability: f64,
}

impl Default for GenLimits {
    fn default() -> Self {
        GenLimits {
            max_expression_size: 5,
            max_nesting_levels: 3,
            max_lines_in_block: 3,
            array_size: 10,
            max_same_level_blocks: 2,
            math_func_allowed: true,
            math_func_probability: 0.05,
        }
    }
}

impl GenLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = [
            ("max_expression_size", self.max_expression_size),
            ("max_lines_in_block", self.max_lines_in_block),
            ("array_size", self.array_size),
            ("max_same_level_blocks", self.max_same_level_blocks),
        ];
        for (name, value) in bounds {
            if value < 1 {
                return Err(ConfigError::BoundTooSmall { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.math_func_probability) {
            return Err(ConfigError::ProbabilityOutOfRange(
                self.math_func_probability,
            ));
        }
        Ok(())
    }
}

// ── Run configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: GenLimits,

    /// Number of test-group directories per run.
    pub num_groups: usize,
    /// Number of generated programs per group.
    pub tests_per_group: usize,

    pub compilers: Vec<CompilerSpec>,
    pub opt_levels: Vec<OptLevel>,

    /// Independent random input vectors per program per run.
    pub input_samples_per_run: usize,

    pub real_type: RealType,

    /// Tokens for the blanket skip-by-token divergence filter.
    pub skip_values: Vec<String>,

    /// Record wall-clock runtime (microseconds) per execution.
    pub record_runtime: bool,

    /// Worker pool size. None = one worker per logical CPU.
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            limits: GenLimits::default(),
            num_groups: 2,
            tests_per_group: 200,
            compilers: vec![
                CompilerSpec::new("gcc", "/usr/bin/gcc"),
                CompilerSpec::new("clang", "/usr/bin/clang"),
            ],
            opt_levels: vec![
                OptLevel::new("-O0", FmaVariant::Off),
                OptLevel::new("-O0", FmaVariant::On),
            ],
            input_samples_per_run: 4,
            real_type: RealType::Double,
            skip_values: vec!["nan".to_string(), "inf".to_string()],
            record_runtime: true,
            workers: None,
        }
    }
}

impl Config {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Config, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let cfg: Config = serde_json::from_str(&text).map_err(|e| EngineError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        for (name, value) in [
            ("num_groups", self.num_groups),
            ("tests_per_group", self.tests_per_group),
            ("input_samples_per_run", self.input_samples_per_run),
        ] {
            if value < 1 {
                return Err(ConfigError::BoundTooSmall { name, value });
            }
        }
        if self.compilers.is_empty() {
            return Err(ConfigError::NoCompilers);
        }
        if self.opt_levels.is_empty() {
            return Err(ConfigError::NoOptLevels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_expression_size_rejected() {
        let mut limits = GenLimits::default();
        limits.max_expression_size = 0;
        assert_eq!(
            limits.validate(),
            Err(ConfigError::BoundTooSmall {
                name: "max_expression_size",
                value: 0
            })
        );
    }

    #[test]
    fn probability_out_of_range_rejected() {
        let mut limits = GenLimits::default();
        limits.math_func_probability = 1.5;
        assert!(matches!(
            limits.validate(),
            Err(ConfigError::ProbabilityOutOfRange(_))
        ));
    }

    #[test]
    fn empty_compiler_list_rejected() {
        let mut cfg = Config::default();
        cfg.compilers.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoCompilers));
    }

    #[test]
    fn partial_json_takes_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"num_groups": 1, "tests_per_group": 5}"#).unwrap();
        assert_eq!(cfg.num_groups, 1);
        assert_eq!(cfg.tests_per_group, 5);
        assert_eq!(cfg.limits.max_expression_size, 5);
        assert_eq!(cfg.real_type, RealType::Double);
    }
}
