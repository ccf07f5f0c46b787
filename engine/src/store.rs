// store.rs — Result aggregation and persistence
//
// Single source of truth for execution results, keyed logically:
// program → input-vector string → compiler → optimization tag → cell.
// Written by the matrix runner's collector, read by the analyzer. On disk
// each cell is the string `"<output> time:<micros>"` (bare `"<output>"`
// when timing is off), inside nested JSON objects, so partial re-runs on
// another machine can merge.
//
// Preconditions: keys come from structured JobKeys, never parsed filenames.
// Postconditions: at most one cell per key; inserts overwrite.
// Failure modes: MalformedResult when a persisted cell string does not
//                split into the documented shape (contract violation).
// Side effects: load/save touch the filesystem.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;
use crate::job::JobKey;

// ── Result cell ─────────────────────────────────────────────────────────

/// One recorded execution: the textual output line and, optionally, the
/// wall-clock runtime in microseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCell {
    pub output: String,
    pub runtime_micros: Option<u64>,
}

impl ResultCell {
    pub fn new(output: impl Into<String>, runtime_micros: Option<u64>) -> Self {
        ResultCell {
            output: output.into(),
            runtime_micros,
        }
    }
}

impl std::fmt::Display for ResultCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.runtime_micros {
            Some(t) => write!(f, "{} time:{}", self.output, t),
            None => write!(f, "{}", self.output),
        }
    }
}

impl FromStr for ResultCell {
    type Err = EngineError;

    /// Split the numeric output from an appended runtime annotation. A
    /// trailing `time:` token must carry a parseable integer; anything
    /// else in that position is a malformed cell.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(' ') {
            Some((output, tail)) if tail.starts_with("time:") => {
                let micros = tail["time:".len()..].parse::<u64>().map_err(|_| {
                    EngineError::MalformedResult {
                        text: s.to_string(),
                    }
                })?;
                Ok(ResultCell::new(output, Some(micros)))
            }
            Some(_) => Err(EngineError::MalformedResult {
                text: s.to_string(),
            }),
            None => Ok(ResultCell::new(s, None)),
        }
    }
}

impl Serialize for ResultCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ResultCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

// ── Store ───────────────────────────────────────────────────────────────

pub type OptMap = BTreeMap<String, ResultCell>;
pub type CompilerMap = BTreeMap<String, OptMap>;
pub type InputMap = BTreeMap<String, CompilerMap>;

/// Nested result mapping. BTreeMaps keep persisted JSON deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultStore {
    programs: BTreeMap<String, InputMap>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one cell. Re-recording an existing key overwrites; the store
    /// never holds duplicates for a key.
    pub fn insert(&mut self, key: &JobKey, input: &str, cell: ResultCell) {
        self.programs
            .entry(key.program.clone())
            .or_default()
            .entry(input.to_string())
            .or_default()
            .entry(key.compiler.clone())
            .or_default()
            .insert(key.opt.tag(), cell);
    }

    pub fn get(&self, key: &JobKey, input: &str) -> Option<&ResultCell> {
        self.programs
            .get(&key.program)?
            .get(input)?
            .get(&key.compiler)?
            .get(&key.opt.tag())
    }

    pub fn contains(&self, key: &JobKey, input: &str) -> bool {
        self.get(key, input).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Number of recorded cells.
    pub fn len(&self) -> usize {
        self.programs
            .values()
            .flat_map(|inputs| inputs.values())
            .flat_map(|compilers| compilers.values())
            .map(|opts| opts.len())
            .sum()
    }

    /// True when at least one cell was recorded for the named compiler.
    pub fn has_compiler(&self, compiler: &str) -> bool {
        self.programs
            .values()
            .flat_map(|inputs| inputs.values())
            .any(|compilers| compilers.contains_key(compiler))
    }

    /// Iterate (program, input, compiler→opt→cell) groups.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String, &CompilerMap)> {
        self.programs.iter().flat_map(|(program, inputs)| {
            inputs
                .iter()
                .map(move |(input, compilers)| (program, input, compilers))
        })
    }

    /// Input vectors recorded for a program, in stored order.
    pub fn inputs_for(&self, program: &str) -> Vec<&String> {
        self.programs
            .get(program)
            .map(|inputs| inputs.keys().collect())
            .unwrap_or_default()
    }

    // ── Persistence ──

    pub fn load(path: &Path) -> Result<ResultStore, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| EngineError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| EngineError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, text).map_err(|e| EngineError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FmaVariant, OptLevel};

    fn key(program: &str, compiler: &str, fma: FmaVariant) -> JobKey {
        JobKey {
            program: program.to_string(),
            compiler: compiler.to_string(),
            opt: OptLevel::new("-O0", fma),
        }
    }

    #[test]
    fn cell_roundtrip_with_time() {
        let cell = ResultCell::new("1.5", Some(245));
        assert_eq!(cell.to_string(), "1.5 time:245");
        assert_eq!("1.5 time:245".parse::<ResultCell>().unwrap(), cell);
    }

    #[test]
    fn cell_roundtrip_without_time() {
        let cell = ResultCell::new("-inf", None);
        assert_eq!(cell.to_string(), "-inf");
        assert_eq!("-inf".parse::<ResultCell>().unwrap(), cell);
    }

    #[test]
    fn malformed_cell_rejected() {
        // Two tokens but no time: annotation — the pipeline never writes
        // this shape, so reading it back is a contract violation.
        assert!(matches!(
            "1.5 garbage".parse::<ResultCell>(),
            Err(EngineError::MalformedResult { .. })
        ));
        assert!(matches!(
            "1.5 time:abc".parse::<ResultCell>(),
            Err(EngineError::MalformedResult { .. })
        ));
    }

    #[test]
    fn insert_overwrites_never_duplicates() {
        let mut store = ResultStore::new();
        let k = key("_tests/_group_1/_test_1", "gcc", FmaVariant::On);
        store.insert(&k, "3.0 5", ResultCell::new("inf", None));
        store.insert(&k, "3.0 5", ResultCell::new("nan", None));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&k, "3.0 5").unwrap().output, "nan");
    }

    #[test]
    fn keys_are_fully_logical() {
        let mut store = ResultStore::new();
        let k1 = key("p", "gcc", FmaVariant::On);
        let k2 = key("p", "gcc", FmaVariant::Off);
        let k3 = key("p", "clang", FmaVariant::On);
        store.insert(&k1, "1.0", ResultCell::new("0", None));
        store.insert(&k2, "1.0", ResultCell::new("-0", None));
        store.insert(&k3, "1.0", ResultCell::new("0", None));
        assert_eq!(store.len(), 3);
        assert!(store.has_compiler("gcc"));
        assert!(store.has_compiler("clang"));
        assert!(!store.has_compiler("nvcc"));
    }

    #[test]
    fn json_shape_is_nested_maps_of_strings() {
        let mut store = ResultStore::new();
        let k = key("_tests/_group_1/_test_2", "clang_17", FmaVariant::Off);
        store.insert(&k, "3.0e0 5", ResultCell::new("nan", Some(120)));

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(
            json["_tests/_group_1/_test_2"]["3.0e0 5"]["clang_17"]["O0_nofma"],
            serde_json::json!("nan time:120")
        );

        let back: ResultStore = serde_json::from_value(json).unwrap();
        assert_eq!(back, store);
    }
}
